use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use ticket_check::acquire;
use ticket_check::api::HttpTicketApi;
use ticket_check::classifier;
use ticket_check::config::VerifierConfig;
use ticket_check::fingerprint::SharedFingerprint;
use ticket_check::session::{SessionState, TracingPresenter, VerificationSession};
use ticket_check::ImageSource;
use tracing::info;

/// Validate environment variables at startup
fn validate_environment_variables() -> Result<()> {
    let base_url = env::var("VERIFY_API_BASE_URL").map_err(|_| {
        anyhow::anyhow!(
            "VERIFY_API_BASE_URL environment variable is required but not set. Please set it to the verification API base URL."
        )
    })?;

    if base_url.trim().is_empty() {
        return Err(anyhow::anyhow!("VERIFY_API_BASE_URL cannot be empty"));
    }

    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(anyhow::anyhow!(
            "VERIFY_API_BASE_URL must start with 'http://' or 'https://'"
        ));
    }

    info!("Environment variables validated successfully");
    Ok(())
}

fn image_path_from_args() -> Result<PathBuf> {
    let mut args = env::args().skip(1);
    match args.next() {
        Some(path) => Ok(PathBuf::from(path)),
        None => Err(anyhow::anyhow!(
            "Usage: ticket-check <image-path>  (set VERIFY_API_BASE_URL, optionally CLIENT_PROFILE=mobile)"
        )),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    validate_environment_variables()?;
    let config = VerifierConfig::from_env()?;
    let image_path = image_path_from_args()?;

    info!(
        base_url = %config.base_url,
        is_mobile = config.is_mobile,
        "Starting ticket verification"
    );

    let api = HttpTicketApi::new(&config)?;

    // The fingerprint is best-effort: use the blob from the environment when
    // present, otherwise run without one (the server treats us as a guest).
    let fingerprint = SharedFingerprint::new();
    match env::var("DEVICE_FINGERPRINT") {
        Ok(blob) if !blob.trim().is_empty() => fingerprint.set_ready(blob),
        _ => info!("No device fingerprint configured, continuing without one"),
    }

    let session = VerificationSession::new(
        api,
        fingerprint,
        config.is_mobile,
        Arc::new(TracingPresenter),
    );
    let asset = acquire::select_from_path(&image_path)?;
    let mime = asset.mime.clone();
    session.select_image(ImageSource::File, &mime, asset.bytes)?;
    session.prepare_image()?;

    if let Err(error) = session.preview().await {
        let recovery = classifier::recovery_for(&error);
        info!(error = %error, recovery = ?recovery, "Preview failed");
    } else if let SessionState::PreviewReady { plays, confidence, .. } = session.snapshot() {
        info!(confidence, "Preview detected {} play(s)", plays.len());
        for play in &plays {
            info!(
                play = %play.play_label,
                valid = play.is_valid,
                "  {:?} + PB {}",
                play.main_numbers,
                play.powerball
            );
        }
    }

    match session.verify(None).await {
        Ok(()) => {}
        Err(error) => {
            let recovery = classifier::recovery_for(&error);
            return Err(anyhow::anyhow!(
                "Verification failed: {} (recovery: {:?})",
                error,
                recovery
            ));
        }
    }

    if let SessionState::VerifySucceeded { outcome, .. } = session.snapshot() {
        info!(
            draw_date = %outcome.draw_date,
            is_winner = outcome.is_winner,
            total_prize = outcome.total_prize_amount,
            "Verification complete"
        );
        for result in &outcome.per_play_results {
            info!(
                line = result.line,
                main_matches = result.main_matches,
                powerball_match = result.powerball_match,
                prize = result.prize_amount,
                "Play result"
            );
        }
    }

    Ok(())
}
