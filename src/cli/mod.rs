//! CLI command parsing and output rendering.

use std::io::Read as _;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use stream_protocol::Event;

/// LaunchAgent - growth director with a streaming markup protocol.
#[derive(Parser)]
#[command(name = "launchagent")]
#[command(about = "Growth director with a streaming markup protocol")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decode a recorded transcript into events.
    #[command(visible_alias = "p")]
    Parse {
        /// Transcript file (stdin if not specified).
        file: Option<PathBuf>,

        /// Feed the transcript in chunks of this many characters.
        #[arg(short, long)]
        chunk_size: Option<usize>,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },

    /// Replay a transcript through the director and print its state.
    Replay {
        /// Transcript file (stdin if not specified).
        file: Option<PathBuf>,

        /// Feed the transcript in chunks of this many characters.
        #[arg(short, long)]
        chunk_size: Option<usize>,
    },

    /// Stream one live director turn.
    Chat {
        /// Message to send.
        prompt: String,

        /// System prompt file (overrides `agent.system_prompt`).
        #[arg(long)]
        system: Option<PathBuf>,
    },

    /// Start the HTTP API server.
    Serve {
        /// Host to bind to (overrides `api.host`).
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides `api.port`).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the current configuration.
    Show,

    /// Show the configuration file path.
    Path,

    /// Generate a new API token for remote access.
    GenerateToken {
        /// Write the token to the global config file.
        #[arg(long)]
        save: bool,
    },
}

/// How `parse` prints events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One JSON object per line.
    Json,
    /// Prose inline, structural events as bracketed lines.
    Text,
}

/// Read a transcript from `file`, or stdin when absent.
///
/// # Errors
///
/// Returns [`crate::core::Error::Io`] if the input cannot be read.
pub fn read_input(file: Option<&Path>) -> crate::core::Result<String> {
    let input = match file {
        Some(path) => std::fs::read_to_string(path).inspect_err(|e| {
            tracing::debug!(path = %path.display(), error = %e, "failed to read transcript");
        })?,
        None => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            input
        }
    };
    Ok(input)
}

/// Render one event in the requested format.
///
/// JSON lines end with a newline; text rendering keeps prose verbatim.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_event(event: &Event, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(format!("{}\n", serde_json::to_string(event)?)),
        OutputFormat::Text => Ok(render_text(event)),
    }
}

fn render_text(event: &Event) -> String {
    match event {
        Event::ChatText { text } => text.clone(),
        Event::StreamItem { icon, text } => format!("\n[activity] {icon} {text}\n"),
        Event::StreamComplete { summary } => format!("\n[activity] done: {summary}\n"),
        Event::Output { output_type, data } => format!("\n[card:{output_type}] {data}\n"),
        Event::Progress { step, state } => format!("\n[progress] step {step} {state}\n"),
        Event::WhatsNext { icon, title, desc } => {
            format!("\n[next] {icon} {title}: {desc}\n")
        }
        Event::WhatsNextClear => "\n[next] cleared\n".to_string(),
        Event::Done => "\n".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use crate::core::Error;
    use stream_protocol::ProgressState;

    #[test]
    fn cli_parses_verbose_flag() {
        let cli = Cli::parse_from(["launchagent", "-v", "config", "path"]);
        assert_eq!(cli.verbose, 1);

        let cli = Cli::parse_from(["launchagent", "-vv", "config", "path"]);
        assert_eq!(cli.verbose, 2);

        let cli = Cli::parse_from(["launchagent", "-vvv", "config", "path"]);
        assert_eq!(cli.verbose, 3);
    }

    #[test]
    fn cli_requires_a_command() {
        assert!(Cli::try_parse_from(["launchagent"]).is_err());
    }

    #[test]
    fn cli_parses_parse_with_defaults() {
        let cli = Cli::parse_from(["launchagent", "parse"]);
        match cli.command {
            Commands::Parse {
                file,
                chunk_size,
                format,
            } => {
                assert!(file.is_none());
                assert!(chunk_size.is_none());
                assert_eq!(format, OutputFormat::Json);
            }
            _ => panic!("expected Parse command"),
        }
    }

    #[test]
    fn cli_parses_parse_options() {
        let cli = Cli::parse_from(["launchagent", "p", "run.txt", "-c", "7", "-f", "text"]);
        match cli.command {
            Commands::Parse {
                file,
                chunk_size,
                format,
            } => {
                assert_eq!(file, Some(PathBuf::from("run.txt")));
                assert_eq!(chunk_size, Some(7));
                assert_eq!(format, OutputFormat::Text);
            }
            _ => panic!("expected Parse command"),
        }
    }

    #[test]
    fn cli_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["launchagent", "parse", "-f", "yaml"]).is_err());
    }

    #[test]
    fn cli_parses_replay() {
        let cli = Cli::parse_from(["launchagent", "replay", "run.txt", "--chunk-size", "3"]);
        match cli.command {
            Commands::Replay { file, chunk_size } => {
                assert_eq!(file, Some(PathBuf::from("run.txt")));
                assert_eq!(chunk_size, Some(3));
            }
            _ => panic!("expected Replay command"),
        }
    }

    #[test]
    fn cli_parses_chat_with_system_prompt() {
        let cli = Cli::parse_from(["launchagent", "chat", "grow my app", "--system", "d.md"]);
        match cli.command {
            Commands::Chat { prompt, system } => {
                assert_eq!(prompt, "grow my app");
                assert_eq!(system, Some(PathBuf::from("d.md")));
            }
            _ => panic!("expected Chat command"),
        }
    }

    #[test]
    fn cli_parses_serve_without_overrides() {
        let cli = Cli::parse_from(["launchagent", "serve"]);
        match cli.command {
            Commands::Serve { host, port } => {
                assert!(host.is_none());
                assert!(port.is_none());
            }
            _ => panic!("expected Serve command"),
        }
    }

    #[test]
    fn cli_parses_serve_with_custom_host_port() {
        let cli = Cli::parse_from(["launchagent", "serve", "-H", "0.0.0.0", "-p", "8080"]);
        match cli.command {
            Commands::Serve { host, port } => {
                assert_eq!(host.as_deref(), Some("0.0.0.0"));
                assert_eq!(port, Some(8080));
            }
            _ => panic!("expected Serve command"),
        }
    }

    #[test]
    fn cli_parses_config_commands() {
        let cli = Cli::parse_from(["launchagent", "config", "show"]);
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommands::Show
            }
        ));

        let cli = Cli::parse_from(["launchagent", "config", "generate-token", "--save"]);
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommands::GenerateToken { save: true }
            }
        ));
    }

    #[test]
    fn cli_verbose_is_global() {
        let cli = Cli::parse_from(["launchagent", "parse", "-v"]);
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn cli_debug_assert() {
        Cli::command().debug_assert();
    }

    #[test]
    fn read_input_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("t.txt");
        std::fs::write(&path, "hello <progress").unwrap();
        assert_eq!(read_input(Some(path.as_path())).unwrap(), "hello <progress");
        let err = read_input(Some(dir.path().join("missing.txt").as_path())).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn render_json_is_one_line_per_event() {
        let line = render_event(&Event::WhatsNextClear, OutputFormat::Json).unwrap();
        assert_eq!(line, "{\"type\":\"whats_next_clear\"}\n");
    }

    #[test]
    fn render_text_keeps_prose_verbatim() {
        let prose = render_event(&Event::chat("  two spaces "), OutputFormat::Text).unwrap();
        assert_eq!(prose, "  two spaces ");

        let progress = render_event(
            &Event::Progress {
                step: 2,
                state: ProgressState::Done,
            },
            OutputFormat::Text,
        )
        .unwrap();
        assert_eq!(progress, "\n[progress] step 2 done\n");
    }
}
