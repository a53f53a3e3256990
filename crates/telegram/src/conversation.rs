//! Per-chat conversation state machine.
//!
//! [`transition`] is pure: it maps the current [`SessionState`] and an
//! incoming [`Event`] to the next state and the [`Effect`] the caller has to
//! carry out. It never touches the network or the detector.

use projectp_common::MediaRequest;

pub const WELCOME_TEXT: &str = "Welcome! This is Project P Bot. Send photo(s) or video(s) \
     in order to detect pelicans. Send /stop to stop processing.\n\n\
     [Attached media up to 20 MiB is supported]";

pub const FAREWELL_TEXT: &str = "Bye! I hope we can talk again some day.";

pub const FAILURE_TEXT: &str = "Sorry, something went wrong while processing your media. \
     Please try again.";

/// Prefix of the text-only reply sent when nothing was detected.
pub const NOTHING_TO_SHOW: &str = "Nothing to show.";

/// Label of the single reply-keyboard button offered with the welcome text.
pub const KEYBOARD_OK: &str = "Ok";

pub const KEYBOARD_PLACEHOLDER: &str = "Photo or video";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    AwaitingMedia,
}

/// Slash commands the bot understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
}

impl Command {
    /// Parse the leading `/command` of a message, accepting the
    /// `/command@bot_name` form and trailing arguments.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim_start().strip_prefix('/')?.split_whitespace().next()?;
        let name = word.split('@').next().unwrap_or(word);
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "stop" | "cancel" => Some(Self::Stop),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start,
    Stop,
    /// One message carrying one or more attachments, in attachment order.
    Media(Vec<MediaRequest>),
    /// Plain text, unknown commands, unsupported attachments.
    Other,
}

impl From<Command> for Event {
    fn from(command: Command) -> Self {
        match command {
            Command::Start => Self::Start,
            Command::Stop => Self::Stop,
        }
    }
}

impl Event {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Media(_) => "media",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Welcome,
    Farewell,
    Process(Vec<MediaRequest>),
    Ignore,
}

#[must_use]
pub fn transition(state: SessionState, event: Event) -> (SessionState, Effect) {
    use SessionState::{AwaitingMedia, Idle};

    match (state, event) {
        (Idle | AwaitingMedia, Event::Start) => (AwaitingMedia, Effect::Welcome),
        (AwaitingMedia, Event::Media(requests)) if !requests.is_empty() => {
            (AwaitingMedia, Effect::Process(requests))
        },
        (AwaitingMedia, Event::Stop) => (Idle, Effect::Farewell),
        (state, _) => (state, Effect::Ignore),
    }
}

/// Text-only reply for a detection that found nothing.
#[must_use]
pub fn nothing_to_show(summary: &impl std::fmt::Display) -> String {
    format!("{NOTHING_TO_SHOW} {summary}")
}
