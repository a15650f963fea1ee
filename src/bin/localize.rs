//! Localize binary - translates the bridge UI strings into every configured language
//!
//! Usage:
//!   cargo run --bin localize             # Regenerate base strings and translate
//!   cargo run --bin localize -- --clear  # Drop the whole cache first
//!
//! Required environment variables:
//! - DEEPL_API_KEY
//!
//! Optional:
//! - DEEPL_ACCOUNT_TYPE (defaults to free)
//! - LANGUAGES_FILE (defaults to data/languages.json)
//! - LOCALIZATION_CACHE_DIR (defaults to data/localization)

use anyhow::{Context, Result};
use deepl_bridge::config::Config;
use deepl_bridge::service::{AppContext, ReadinessState, TranslationService};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("deepl_bridge=info".parse()?),
        )
        .init();

    // Load environment from .env file
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let clear_first = std::env::args().any(|arg| arg == "--clear");

    info!("Loading configuration...");
    let config = Config::from_env()?;
    if config.deepl_api_key.is_none() {
        anyhow::bail!("DEEPL_API_KEY not set");
    }

    let cache_dir = config.localization_cache_dir.clone();
    let service = TranslationService::new(AppContext::from_config(config)?)
        .context("Failed to create translation service")?;

    let state = service.verify_api_key().await;
    if state != ReadinessState::Ready {
        anyhow::bail!("DeepL session is not ready (state: {})", state);
    }

    if clear_first {
        let cleared = service
            .clear_localizations(None)
            .context("Failed to clear localization cache")?;
        info!("Cleared {} cached language keys", cleared.len());
    }

    info!(
        "Localizing UI strings for {} languages...",
        service.languages().all().count()
    );
    let report = service
        .localize_all()
        .await
        .context("Localization run failed")?;

    println!("\n========== LOCALIZATION REPORT ==========");
    println!("Cache directory: {}", cache_dir.display());
    println!("Succeeded ({}):", report.succeeded.len());
    for key in &report.succeeded {
        let code = service.current_language_code(key).unwrap_or_default();
        println!("  ✓ {} ({})", key, code);
    }
    if !report.failed.is_empty() {
        println!("Failed ({}):", report.failed.len());
        for (key, err) in &report.failed {
            println!("  ✗ {}: {}", key, err);
        }
    }
    println!("=========================================\n");

    if !report.is_complete() {
        anyhow::bail!("{} languages failed to localize", report.failed.len());
    }

    Ok(())
}
