use crate::cli::{Cli, Commands};
use anyhow::{Context, Result, bail};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::Config;
use crate::app::relay::{build_summarizer, run_relay};
use crate::links::{Notification, SummaryOutcome, detect_links};
use crate::transport::{DeliveryGateway, MatrixChannel};

/// Summarize one URL and print the notice the relay would post.
async fn summarize_once(config: Arc<Config>, url: &str, post: bool) -> Result<()> {
    config.validate_for_summarize()?;
    if post {
        config.validate_for_relay()?;
    }

    let summarizer = build_summarizer(&config)?;
    let outcome = summarizer.summarize_url(url).await;

    let room = config
        .matrix
        .forwarding_room_id
        .as_deref()
        .unwrap_or_default();
    let notice = match &outcome {
        SummaryOutcome::Summarized(result) => Notification::summary(room, result),
        SummaryOutcome::Unavailable(reason) => {
            Notification::no_summary(room, url, &reason.to_string())
        }
    };
    println!("{}", notice.body);

    if post {
        let channel = MatrixChannel::new(&config.matrix)?;
        channel
            .send(&notice.room_id, &notice.body)
            .await
            .context("post summary to forwarding room")?;
        tracing::info!(room_id = %notice.room_id, "summary posted");
    }

    if let SummaryOutcome::Unavailable(reason) = outcome {
        bail!("no summary for {url}: {reason}");
    }
    Ok(())
}

pub fn render_config(config: &Config) -> Result<String> {
    let body = toml::to_string_pretty(&config.redacted()).context("serialize config")?;
    Ok(match &config.config_path {
        Some(path) => format!("# loaded from {}\n{body}", path.display()),
        None => body,
    })
}

/// Cancelled on the first Ctrl-C.
fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Ctrl-C received, finishing in-flight links"),
            Err(e) => tracing::error!(error = %e, "failed to listen for Ctrl-C"),
        }
        trigger.cancel();
    });
    token
}

pub async fn dispatch(cli: Cli, config: Arc<Config>) -> Result<()> {
    match cli.command {
        Commands::Run => run_relay(config, shutdown_on_ctrl_c()).await,

        Commands::Summarize { url, post } => summarize_once(config, &url, post).await,

        Commands::Extract { text } => {
            for link in detect_links(&text) {
                println!("{link}");
            }
            Ok(())
        }

        Commands::Config => {
            print!("{}", render_config(&config)?);
            Ok(())
        }
    }
}
