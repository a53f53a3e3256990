use std::sync::Arc;

use {
    projectp_common::{MediaKind as AttachmentKind, MediaRequest},
    teloxide::types::{MediaKind, Message, MessageKind},
    tracing::{debug, info, warn},
};

use crate::{
    conversation::{
        Command, Effect, Event, FAREWELL_TEXT, SessionState, WELCOME_TEXT, transition,
    },
    error::TransferError,
    pipeline::MediaPipeline,
    session::SessionStore,
    transport::{MediaTransport, ReplyKeyboard},
};

/// Platform-neutral view of one inbound Telegram message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub message_id: i32,
    pub user_name: Option<String>,
    pub event: Event,
}

/// Everything an inbound message needs, shared by all chats.
pub struct BotContext {
    pub sessions: SessionStore,
    pub pipeline: MediaPipeline,
    pub transport: Arc<dyn MediaTransport>,
}

impl BotContext {
    #[must_use]
    pub fn new(pipeline: MediaPipeline, transport: Arc<dyn MediaTransport>) -> Self {
        Self {
            sessions: SessionStore::new(),
            pipeline,
            transport,
        }
    }
}

/// Turn a teloxide message into an [`InboundMessage`].
///
/// Returns `None` for service messages (joins, pins, ...) that carry no
/// user content.
#[must_use]
pub fn inbound_from_message(msg: &Message) -> Option<InboundMessage> {
    let MessageKind::Common(common) = &msg.kind else {
        return None;
    };
    let chat_id = msg.chat.id.0;
    let message_id = msg.id.0;
    let user_name = msg.from.as_ref().and_then(|u| u.username.clone());

    let event = match &common.media_kind {
        MediaKind::Text(text) => Command::parse(&text.text).map_or(Event::Other, Event::from),
        MediaKind::Photo(_) | MediaKind::Video(_) => {
            let requests = extract_media_requests(msg, chat_id, message_id, user_name.as_deref());
            if requests.is_empty() {
                Event::Other
            } else {
                Event::Media(requests)
            }
        },
        _ => Event::Other,
    };

    Some(InboundMessage {
        chat_id,
        message_id,
        user_name,
        event,
    })
}

/// Attachment descriptors carried by a photo or video message.
///
/// Telegram delivers one photo per message as several resolutions; only the
/// largest one is processed.
fn extract_media_requests(
    msg: &Message,
    chat_id: i64,
    message_id: i32,
    user_name: Option<&str>,
) -> Vec<MediaRequest> {
    let MessageKind::Common(common) = &msg.kind else {
        return Vec::new();
    };
    let attachment = match &common.media_kind {
        MediaKind::Photo(p) => p
            .photo
            .last()
            .map(|ps| (AttachmentKind::Photo, ps.file.id.clone(), ps.file.size)),
        MediaKind::Video(v) => Some((
            AttachmentKind::Video,
            v.video.file.id.clone(),
            v.video.file.size,
        )),
        _ => None,
    };

    attachment
        .into_iter()
        .enumerate()
        .map(|(index, (media_kind, file_id, size))| MediaRequest {
            chat_id,
            message_id,
            sequence_index: index as u32,
            user_name: user_name.map(str::to_string),
            media_kind,
            file_id,
            file_size: (size > 0).then_some(size),
        })
        .collect()
}

/// Run one inbound message through the state machine and carry out the
/// resulting effect.
///
/// The chat's session stays locked until the effect is complete, so a
/// chat's messages are handled strictly one after another. Per-attachment
/// failures are reported to the user by the pipeline and never change the
/// session state. Returns the state after the message.
pub async fn handle_inbound(
    ctx: &BotContext,
    inbound: InboundMessage,
) -> Result<SessionState, TransferError> {
    let mut session = ctx.sessions.lock(inbound.chat_id).await;
    let previous = session.state;
    let event_name = inbound.event.name();
    let (next, effect) = transition(previous, inbound.event);
    session.state = next;

    debug!(
        chat_id = inbound.chat_id,
        message_id = inbound.message_id,
        event = event_name,
        from = ?previous,
        to = ?next,
        "session transition"
    );

    match effect {
        Effect::Welcome => {
            info!(
                chat_id = inbound.chat_id,
                user = inbound.user_name.as_deref().unwrap_or("-"),
                "conversation started"
            );
            ctx.transport
                .reply_text(
                    inbound.chat_id,
                    WELCOME_TEXT,
                    None,
                    ReplyKeyboard::MediaPrompt,
                )
                .await?;
        },
        Effect::Farewell => {
            info!(
                chat_id = inbound.chat_id,
                user = inbound.user_name.as_deref().unwrap_or("-"),
                "conversation stopped"
            );
            ctx.transport
                .reply_text(
                    inbound.chat_id,
                    FAREWELL_TEXT,
                    None,
                    ReplyKeyboard::Remove,
                )
                .await?;
        },
        Effect::Process(requests) => {
            let outcomes = ctx.pipeline.process_all(&requests).await;
            let failed = outcomes.iter().filter(|o| o.is_err()).count();
            if failed > 0 {
                warn!(
                    chat_id = inbound.chat_id,
                    message_id = inbound.message_id,
                    failed,
                    total = outcomes.len(),
                    "some attachments failed"
                );
            }
        },
        Effect::Ignore => {
            debug!(
                chat_id = inbound.chat_id,
                event = event_name,
                state = ?next,
                "message ignored in current state"
            );
        },
    }

    Ok(next)
}
