use std::sync::Arc;

use {
    anyhow::Result,
    projectp_config::ProjectPConfig,
    projectp_telegram::{
        BotContext, MediaPipeline, MediaTransport, TelegramTransport, bot,
    },
    tracing::info,
};

const MIB: u64 = 1024 * 1024;

/// Validate the config, wire detector, gate, transport and pipeline, then
/// poll Telegram until Ctrl-C.
pub async fn run_bot(config: ProjectPConfig) -> Result<()> {
    projectp_config::validate(&config, true)?;

    let layout = crate::staging_layout(&config);
    projectp_media::prepare_directories(&layout).await?;
    info!(
        input_dir = %layout.input_dir().display(),
        output_dir = %layout.output_dir().display(),
        suffix = layout.target_suffix(),
        "staging directories ready"
    );

    let detector = crate::gated_detector(&config);

    let max_attachment_bytes = u64::from(config.telegram.max_attachment_mib) * MIB;
    let bot = bot::connect(&config.telegram).await?;
    let transport: Arc<dyn MediaTransport> = Arc::new(
        TelegramTransport::new(bot.clone()).with_max_attachment_bytes(max_attachment_bytes),
    );
    let pipeline = MediaPipeline::new(layout, detector, Arc::clone(&transport))
        .with_percentile(config.detector.percentile)
        .with_reply_to_message(config.telegram.reply_to_message)
        .with_max_attachment_bytes(max_attachment_bytes);
    let ctx = Arc::new(BotContext::new(pipeline, transport));

    let cancel = bot::start_polling(bot, ctx, config.telegram.poll_timeout_secs);
    info!("bot running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    cancel.cancel();
    Ok(())
}
