use anyhow::Context;
use tokio::io::AsyncReadExt;

use table_mailer::config::ReportConfig;
use table_mailer::mail::DeliveryOutcome;
use table_mailer::runner::run_payload;
use table_mailer::table::demo::demo_request;
use table_mailer::table::encode_request;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ReportConfig::from_env()?;

    eprintln!("📄 Table Mailer v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   SMTP: {}:{} as {:?}",
        config.mail.host, config.mail.port, config.mail.username
    );
    eprintln!("   Recipients: {}", config.mail.to_addresses.join(", "));
    eprintln!(
        "   Page: {}x{} mm, workers: {}",
        config.page.width_mm, config.page.height_mm, config.workers
    );
    if config.mail.to_addresses.is_empty() {
        tracing::warn!("REPORT_TO is empty; delivery will fail to compose");
    }

    // ── Payload ─────────────────────────────────────────────────────────
    let payload = if config.test_mode {
        eprintln!("   Mode: test (built-in demo request)\n");
        encode_request(&demo_request()?).to_string()
    } else {
        read_payload().await?
    };

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    // Delivery failures are already logged by the dispatcher; the run still succeeds.
    match run_payload(&config, &payload, shutdown).await? {
        None => {}
        Some(DeliveryOutcome::Delivered {
            attachments,
            recipients,
        }) => eprintln!("   Sent {attachments} report(s) to {recipients} recipient(s)"),
        Some(DeliveryOutcome::Failed(e)) => eprintln!("   Delivery failed: {e}"),
    }
    Ok(())
}

/// Read the payload from the file named by the first argument, or stdin.
async fn read_payload() -> anyhow::Result<String> {
    match std::env::args().nth(1) {
        Some(path) => {
            eprintln!("   Payload: {path}\n");
            tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read payload from {path}"))
        }
        None => {
            eprintln!("   Payload: stdin\n");
            let mut payload = String::new();
            tokio::io::stdin()
                .read_to_string(&mut payload)
                .await
                .context("Failed to read payload from stdin")?;
            Ok(payload)
        }
    }
}
