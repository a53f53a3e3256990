use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    projectp_config::TelegramConfig,
    secrecy::ExposeSecret,
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, BotCommand, UpdateKind},
    },
    tokio::{sync::mpsc, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::handlers::{self, BotContext, InboundMessage};

/// Slack on top of the long-polling timeout for the HTTP client.
const CLIENT_TIMEOUT_SLACK: Duration = Duration::from_secs(15);

const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// A chat worker with nothing queued for this long exits. Session state
/// lives in the session store, so a new worker picks up where it left off.
const CHAT_WORKER_IDLE: Duration = Duration::from_secs(600);

/// Build a bot client, verify the token and prepare the account for long
/// polling (webhook cleared, commands registered).
pub async fn connect(config: &TelegramConfig) -> anyhow::Result<Bot> {
    // The client timeout must outlast the long-polling timeout or requests
    // are aborted before Telegram answers.
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(u64::from(config.poll_timeout_secs)) + CLIENT_TIMEOUT_SLACK)
        .build()?;
    let bot = Bot::with_client(config.token.expose_secret(), client);

    let me = bot.get_me().await?;
    bot.delete_webhook().send().await?;

    if let Err(e) = bot.set_my_commands(bot_commands()).await {
        warn!("failed to register bot commands: {e}");
    }

    info!(
        username = ?me.username,
        "telegram bot connected (webhook cleared)"
    );
    Ok(bot)
}

#[must_use]
pub fn bot_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "Start sending photos or videos"),
        BotCommand::new("stop", "Stop processing"),
        BotCommand::new("cancel", "Stop processing"),
    ]
}

/// Spawn the long-polling loop. Updates are handled until the returned
/// token is cancelled.
#[must_use]
pub fn start_polling(bot: Bot, ctx: Arc<BotContext>, poll_timeout_secs: u32) -> CancellationToken {
    let cancel = CancellationToken::new();
    let loop_cancel = cancel.clone();

    tokio::spawn(async move {
        info!("starting telegram polling loop");
        let mut workers = ChatWorkers::new(ctx, CHAT_WORKER_IDLE);
        let mut offset: i32 = 0;

        loop {
            let result = tokio::select! {
                () = loop_cancel.cancelled() => break,
                result = bot
                    .get_updates()
                    .offset(offset)
                    .timeout(poll_timeout_secs)
                    .allowed_updates(vec![AllowedUpdate::Message])
                    .send() => result,
            };

            match result {
                Ok(updates) => {
                    debug!(count = updates.len(), "got telegram updates");
                    for update in updates {
                        offset = update.id.as_offset();
                        match update.kind {
                            UpdateKind::Message(msg) => {
                                match handlers::inbound_from_message(&msg) {
                                    Some(inbound) => workers.dispatch(inbound),
                                    None => debug!(
                                        chat_id = msg.chat.id.0,
                                        "ignoring service message"
                                    ),
                                }
                            },
                            other => {
                                debug!("ignoring non-message update: {other:?}");
                            },
                        }
                    }
                    workers.prune();
                },
                Err(e) => {
                    if matches!(&e, RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) {
                        error!(
                            "telegram polling stopped: another instance is already running with this token"
                        );
                        loop_cancel.cancel();
                        break;
                    }

                    warn!(error = %e, "telegram getUpdates failed");
                    tokio::select! {
                        () = loop_cancel.cancelled() => break,
                        () = tokio::time::sleep(POLL_ERROR_BACKOFF) => {},
                    }
                },
            }
        }
        info!("telegram polling stopped");
    });

    cancel
}

/// One worker task per chat, fed in update order.
///
/// Messages of a chat are handled strictly in arrival order while different
/// chats run concurrently. Workers exit after `idle` without messages.
struct ChatWorkers {
    ctx: Arc<BotContext>,
    idle: Duration,
    workers: HashMap<i64, ChatWorker>,
}

struct ChatWorker {
    tx: mpsc::UnboundedSender<InboundMessage>,
    task: JoinHandle<()>,
}

impl ChatWorkers {
    fn new(ctx: Arc<BotContext>, idle: Duration) -> Self {
        Self {
            ctx,
            idle,
            workers: HashMap::new(),
        }
    }

    fn dispatch(&mut self, inbound: InboundMessage) {
        let chat_id = inbound.chat_id;
        let (inbound, previous) = match self.workers.remove(&chat_id) {
            Some(worker) => match worker.tx.send(inbound) {
                Ok(()) => {
                    self.workers.insert(chat_id, worker);
                    return;
                },
                // Worker went idle; it may still be draining what it had.
                Err(mpsc::error::SendError(inbound)) => (inbound, Some(worker.task)),
            },
            None => (inbound, None),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver was just created, so this send cannot fail.
        let _ = tx.send(inbound);
        let task = tokio::spawn(run_chat_worker(
            Arc::clone(&self.ctx),
            chat_id,
            rx,
            self.idle,
            previous,
        ));
        self.workers.insert(chat_id, ChatWorker { tx, task });
    }

    /// Forget workers that have exited.
    fn prune(&mut self) {
        self.workers.retain(|_, worker| !worker.task.is_finished());
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.workers.len()
    }
}

async fn run_chat_worker(
    ctx: Arc<BotContext>,
    chat_id: i64,
    mut rx: mpsc::UnboundedReceiver<InboundMessage>,
    idle: Duration,
    previous: Option<JoinHandle<()>>,
) {
    // Keep order with messages the previous worker accepted before closing.
    if let Some(previous) = previous {
        let _ = previous.await;
    }
    debug!(chat_id, "chat worker started");

    loop {
        let inbound = match tokio::time::timeout(idle, rx.recv()).await {
            Ok(Some(inbound)) => inbound,
            Ok(None) => break,
            // Stop accepting, then handle whatever was queued meanwhile.
            Err(_) => {
                rx.close();
                continue;
            },
        };
        let message_id = inbound.message_id;
        if let Err(e) = handlers::handle_inbound(&ctx, inbound).await {
            error!(chat_id, message_id, error = %e, "error handling telegram message");
        }
    }
    debug!(chat_id, "chat worker idle, exiting");
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            conversation::{Event, SessionState},
            pipeline::MediaPipeline,
            testing::{FakeDetector, FakeTransport, Sent, photo_request},
            transport::MediaTransport,
        },
        projectp_detect::{AdmissionGate, GatedDetector},
        projectp_media::StagingLayout,
    };

    #[test]
    fn registers_start_stop_cancel() {
        let names: Vec<_> = bot_commands().into_iter().map(|c| c.command).collect();
        assert_eq!(names, vec!["start", "stop", "cancel"]);
    }

    fn context() -> (Arc<BotContext>, Arc<FakeTransport>) {
        let transport = Arc::new(FakeTransport::default());
        let gated = GatedDetector::new(
            Arc::new(FakeDetector::boxes(1, 0.1).with_delay(Duration::from_millis(30))),
            Arc::new(AdmissionGate::new()),
        );
        let pipeline = MediaPipeline::new(
            StagingLayout::new("input", "output", "output"),
            gated,
            Arc::clone(&transport) as Arc<dyn MediaTransport>,
        );
        let ctx = Arc::new(BotContext::new(
            pipeline,
            Arc::clone(&transport) as Arc<dyn MediaTransport>,
        ));
        (ctx, transport)
    }

    async fn wait_for_replies(transport: &FakeTransport, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while transport.sent().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("replies sent");
    }

    #[tokio::test]
    async fn idle_worker_exits_and_session_survives() {
        let (ctx, transport) = context();
        let mut workers = ChatWorkers::new(Arc::clone(&ctx), Duration::from_millis(20));
        let message = |message_id, event| InboundMessage {
            chat_id: 7,
            message_id,
            user_name: None,
            event,
        };

        workers.dispatch(message(1, Event::Start));
        wait_for_replies(&transport, 1).await;
        assert_eq!(workers.len(), 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        workers.prune();
        assert_eq!(workers.len(), 0);

        workers.dispatch(message(2, Event::Media(vec![photo_request(7, 2, 0)])));
        assert_eq!(workers.len(), 1);
        wait_for_replies(&transport, 2).await;
        assert!(matches!(&transport.sent()[1], Sent::Media { chat_id: 7, .. }));
        assert_eq!(ctx.sessions.state(7).await, SessionState::AwaitingMedia);
    }

    #[tokio::test]
    async fn message_after_idle_exit_without_prune_is_handled() {
        let (ctx, transport) = context();
        let mut workers = ChatWorkers::new(Arc::clone(&ctx), Duration::from_millis(20));
        let message = |message_id, event| InboundMessage {
            chat_id: 8,
            message_id,
            user_name: None,
            event,
        };

        workers.dispatch(message(1, Event::Start));
        wait_for_replies(&transport, 1).await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        workers.dispatch(message(2, Event::Stop));
        wait_for_replies(&transport, 2).await;
        assert_eq!(ctx.sessions.state(8).await, SessionState::Idle);
        assert_eq!(workers.len(), 1);
    }

    #[tokio::test]
    async fn workers_keep_per_chat_order() {
        let (ctx, transport) = context();
        let mut workers = ChatWorkers::new(Arc::clone(&ctx), CHAT_WORKER_IDLE);

        let message = |message_id, event| InboundMessage {
            chat_id: 42,
            message_id,
            user_name: Some("alice".into()),
            event,
        };
        workers.dispatch(message(1, Event::Start));
        workers.dispatch(message(2, Event::Media(vec![photo_request(42, 2, 0)])));
        workers.dispatch(message(3, Event::Stop));

        tokio::time::timeout(Duration::from_secs(2), async {
            while ctx.sessions.state(42).await != SessionState::Idle
                || transport.sent().len() < 3
            {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("worker drained the queue");

        let sent = transport.sent();
        assert!(matches!(&sent[0], Sent::Text { .. }));
        assert!(matches!(&sent[1], Sent::Media { .. }));
        assert!(matches!(&sent[2], Sent::Text { .. }));
    }
}
