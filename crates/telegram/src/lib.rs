//! Telegram front end for the Project P detection bot.
//!
//! Inbound messages pass through the per-chat [`conversation`] state
//! machine; accepted attachments go through the [`pipeline`] (download,
//! gated detection, reply). [`bot`] owns the long-polling loop and
//! [`outbound::TelegramTransport`] talks to the Bot API through teloxide.

pub mod bot;
pub mod conversation;
pub mod error;
pub mod handlers;
pub mod outbound;
pub mod pipeline;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use {
    conversation::{Effect, Event, SessionState, transition},
    error::{Error, Result, TransferError},
    handlers::{BotContext, InboundMessage, handle_inbound},
    outbound::TelegramTransport,
    pipeline::{MediaPipeline, Outcome},
    session::SessionStore,
    transport::{MediaTransport, ReplyKeyboard},
};
