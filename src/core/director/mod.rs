//! Director state built from protocol events.
//!
//! A [`Director`] is the consumer side of the stream: it folds events into
//! the conversation transcript, activity blocks, output cards, the progress
//! tracker, and the "coming up" hint.

mod ids;

use serde::Serialize;
use stream_protocol::{Event, ProgressState};

pub use ids::IdCounter;

/// Number of steps on the progress tracker.
pub const PROGRESS_STEPS: usize = 5;

/// Card types in display order when none are configured.
pub const DEFAULT_CARD_ORDER: &[&str] = &[
    "company_snapshot",
    "funnel",
    "bottlenecks",
    "channel_strategy",
    "sprint_plan",
];

/// Aggregated state for one conversation.
#[derive(Debug, Clone, Serialize)]
pub struct Director {
    #[serde(skip)]
    ids: IdCounter,
    #[serde(skip)]
    card_order: Vec<String>,
    #[serde(skip)]
    cards_seen: u64,
    turns: Vec<Turn>,
    cards: Vec<Card>,
    progress: ProgressTracker,
    whats_next: Option<WhatsNext>,
}

impl Default for Director {
    fn default() -> Self {
        Self::new(DEFAULT_CARD_ORDER.iter().map(ToString::to_string).collect())
    }
}

impl Director {
    /// Create a director that sorts cards by `card_order`.
    #[must_use]
    pub fn new(card_order: Vec<String>) -> Self {
        Self {
            ids: IdCounter::new(),
            card_order,
            cards_seen: 0,
            turns: Vec::new(),
            cards: Vec::new(),
            progress: ProgressTracker::default(),
            whats_next: None,
        }
    }

    /// Open a new assistant turn and return its id.
    pub fn begin_turn(&mut self) -> String {
        let id = self.ids.next("turn");
        tracing::debug!(turn = %id, "turn started");
        self.turns.push(Turn::new(id.clone()));
        id
    }

    /// Fold one event into the state.
    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::ChatText { text } => self.open_turn().push_text(text),
            Event::StreamItem { icon, text } => {
                let item = ActivityItem {
                    icon: icon.clone(),
                    text: text.clone(),
                };
                self.open_block().items.push(item);
            }
            Event::StreamComplete { summary } => {
                let block = self.open_block();
                block.summary = Some(summary.clone());
                block.complete = true;
            }
            Event::Output { output_type, data } => self.upsert_card(output_type, data),
            Event::Progress { step, state } => {
                if !self.progress.set(*step, *state) {
                    tracing::warn!(step, "progress step out of range, ignoring");
                }
            }
            Event::WhatsNext { icon, title, desc } => {
                self.whats_next = Some(WhatsNext {
                    icon: icon.clone(),
                    title: title.clone(),
                    desc: desc.clone(),
                });
            }
            Event::WhatsNextClear => self.whats_next = None,
            Event::Done => {
                if let Some(turn) = self.turns.last_mut().filter(|t| !t.complete) {
                    turn.complete = true;
                    tracing::debug!(turn = %turn.id, "turn complete");
                }
            }
        }
    }

    /// Fold a sequence of events.
    pub fn apply_all<'a>(&mut self, events: impl IntoIterator<Item = &'a Event>) {
        for event in events {
            self.apply(event);
        }
    }

    /// All turns, oldest first.
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Output cards in display order.
    #[must_use]
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Look up a card by type.
    #[must_use]
    pub fn card(&self, output_type: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.output_type == output_type)
    }

    /// Progress tracker.
    #[must_use]
    pub const fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Current "coming up" hint.
    #[must_use]
    pub const fn whats_next(&self) -> Option<&WhatsNext> {
        self.whats_next.as_ref()
    }

    /// Latest turn that has not received `done`, opening one if needed.
    fn open_turn(&mut self) -> &mut Turn {
        if self.turns.last().is_none_or(|t| t.complete) {
            self.begin_turn();
        }
        let last = self.turns.len() - 1;
        &mut self.turns[last]
    }

    /// Activity block accepting items, opening one if needed.
    fn open_block(&mut self) -> &mut ActivityBlock {
        let needs_block = self
            .turns
            .last()
            .is_none_or(|t| t.complete || t.blocks.last().is_none_or(|b| b.complete));

        if needs_block {
            let id = self.ids.next("block");
            tracing::debug!(block = %id, "activity block opened");
            let turn = self.open_turn();
            turn.segments.push(Segment::Activity {
                block_id: id.clone(),
            });
            turn.blocks.push(ActivityBlock::new(id));
        }

        let turn = self.open_turn();
        let last = turn.blocks.len() - 1;
        &mut turn.blocks[last]
    }

    fn upsert_card(&mut self, output_type: &str, data: &serde_json::Value) {
        if let Some(card) = self.cards.iter_mut().find(|c| c.output_type == output_type) {
            tracing::debug!(output_type, "card replaced");
            card.data = data.clone();
            return;
        }

        self.cards_seen += 1;
        self.cards.push(Card {
            output_type: output_type.to_string(),
            data: data.clone(),
            first_seen: self.cards_seen,
        });

        let order = &self.card_order;
        self.cards.sort_by_key(|card| {
            let rank = order
                .iter()
                .position(|t| *t == card.output_type)
                .unwrap_or(order.len());
            (rank, card.first_seen)
        });
    }
}

/// One assistant turn.
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub id: String,
    pub segments: Vec<Segment>,
    pub blocks: Vec<ActivityBlock>,
    pub complete: bool,
}

impl Turn {
    const fn new(id: String) -> Self {
        Self {
            id,
            segments: Vec::new(),
            blocks: Vec::new(),
            complete: false,
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(Segment::Text { text: tail }) = self.segments.last_mut() {
            tail.push_str(text);
        } else {
            self.segments.push(Segment::Text {
                text: text.to_string(),
            });
        }
    }

    /// All prose of the turn.
    #[must_use]
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Text { text } => Some(text.as_str()),
                Segment::Activity { .. } => None,
            })
            .collect()
    }
}

/// Piece of a turn in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    Text { text: String },
    Activity { block_id: String },
}

/// Research activity shown while the director works.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityBlock {
    pub id: String,
    pub items: Vec<ActivityItem>,
    pub summary: Option<String>,
    pub complete: bool,
}

impl ActivityBlock {
    const fn new(id: String) -> Self {
        Self {
            id,
            items: Vec::new(),
            summary: None,
            complete: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityItem {
    pub icon: String,
    pub text: String,
}

/// Structured output card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Card {
    #[serde(rename = "outputType")]
    pub output_type: String,
    pub data: serde_json::Value,
    #[serde(skip)]
    first_seen: u64,
}

/// State of one tracker step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    #[default]
    Pending,
    Active,
    Done,
}

impl From<ProgressState> for StepState {
    fn from(state: ProgressState) -> Self {
        match state {
            ProgressState::Active => Self::Active,
            ProgressState::Done => Self::Done,
        }
    }
}

/// Five-step progress tracker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ProgressTracker {
    steps: [StepState; PROGRESS_STEPS],
}

impl ProgressTracker {
    /// Update a 1-based step. Returns `false` if the step is out of range.
    pub fn set(&mut self, step: u64, state: ProgressState) -> bool {
        let Some(slot) = usize::try_from(step)
            .ok()
            .and_then(|s| s.checked_sub(1))
            .and_then(|i| self.steps.get_mut(i))
        else {
            return false;
        };
        *slot = state.into();
        true
    }

    /// State of a 1-based step.
    #[must_use]
    pub fn get(&self, step: u64) -> Option<StepState> {
        let index = usize::try_from(step).ok()?.checked_sub(1)?;
        self.steps.get(index).copied()
    }

    #[must_use]
    pub const fn steps(&self) -> &[StepState; PROGRESS_STEPS] {
        &self.steps
    }
}

/// "Coming up" hint panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WhatsNext {
    pub icon: String,
    pub title: String,
    pub desc: String,
}
