use std::io::Write as _;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

use launch_agent::{
    Config,
    cli::{self, Cli, Commands, ConfigCommands, OutputFormat},
    config::{API_TOKEN_ENV, ApiConfig},
    core::{
        self,
        agent::{self, CompletionRequest, Message},
        transcript,
    },
};
use stream_protocol::Event;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(core_err) = e.downcast_ref::<core::Error>() {
                tracing::debug!(error = %core_err, "command failed");
                eprintln!("error: {}", core_err.user_message());
            } else {
                eprintln!("error: {e}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Parse {
            file,
            chunk_size,
            format,
        } => {
            let config = Config::load()?;
            let input = cli::read_input(file.as_deref())?;
            parse(&config, &input, chunk_size, format)?;
        }

        Commands::Replay { file, chunk_size } => {
            let config = Config::load()?;
            let input = cli::read_input(file.as_deref())?;
            let mut session = config.parser.session();
            let events = transcript::run_transcript(
                &mut session,
                transcript::chunk_text(&input, chunk_size),
            )
            .map_err(core::Error::from)?;

            let mut director = config.director.director();
            director.begin_turn();
            director.apply_all(&events);
            println!("{}", serde_json::to_string_pretty(&director)?);
        }

        Commands::Chat { prompt, system } => {
            let config = Config::load()?;
            chat(&config, prompt, system.as_deref()).await?;
        }

        Commands::Serve { host, port } => {
            let config = Config::load()?;
            let host = host.unwrap_or_else(|| config.api.host.clone());
            let port = port.unwrap_or(config.api.port);
            launch_agent::api::serve(&config, &host, port).await?;
        }

        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let config = Config::load()?;
                println!("{}", config.to_display_toml()?);
            }
            ConfigCommands::Path => {
                let path = Config::config_path()?;
                println!("{}", path.display());
            }
            ConfigCommands::GenerateToken { save } => {
                let token = ApiConfig::generate_token();
                if save {
                    let path = Config::config_path()?;
                    Config::save_token_to_path(&token, &path)?;
                    println!("Saved API token to {}", path.display());
                    return Ok(());
                }
                println!("Generated API token:\n");
                println!("  {token}\n");
                println!("Add to your config.toml:");
                println!("  [api]");
                println!("  token = \"{token}\"\n");
                println!("Or set environment variable:");
                println!("  export {API_TOKEN_ENV}=\"{token}\"");
            }
        },
    }

    Ok(())
}

/// Print events as each chunk is decoded.
fn parse(
    config: &Config,
    input: &str,
    chunk_size: Option<usize>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut session = config.parser.session();
    let mut stdout = std::io::stdout().lock();

    for chunk in transcript::chunk_text(input, chunk_size) {
        let events = session.feed(chunk).map_err(core::Error::from)?;
        for event in &events {
            stdout.write_all(cli::render_event(event, format)?.as_bytes())?;
        }
    }

    for event in &session.finish().map_err(core::Error::from)? {
        stdout.write_all(cli::render_event(event, format)?.as_bytes())?;
    }
    stdout.flush()?;
    Ok(())
}

/// Stream one turn: prose to stdout, everything else to the log.
async fn chat(config: &Config, prompt: String, system: Option<&Path>) -> anyhow::Result<()> {
    let provider = config.agent.create_provider()?;
    let system_path = system.or(config.agent.system_prompt.as_deref());
    let system = agent::load_system_prompt(system_path).map_err(core::Error::from)?;

    let request = CompletionRequest {
        model: config.agent.model.clone(),
        max_tokens: config.agent.max_tokens,
        messages: vec![Message::user(prompt)],
        system,
    };

    let mut events = agent::stream_turn(&*provider, request, config.parser.session())
        .await
        .map_err(core::Error::from)?;
    let mut director = config.director.director();
    director.begin_turn();

    while let Some(event) = events.next().await {
        let event = event.map_err(core::Error::from)?;
        match &event {
            Event::ChatText { text } => {
                print!("{text}");
                std::io::stdout().flush().ok();
            }
            Event::Done => println!(),
            other => tracing::info!(event = %serde_json::to_string(other)?, "director event"),
        }
        director.apply(&event);
    }

    tracing::debug!(
        cards = director.cards().len(),
        progress = ?director.progress().steps(),
        "turn finished"
    );
    Ok(())
}
