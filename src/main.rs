//! Entry point: load settings, then run the full refresh pipeline with
//! sanitize enabled.

use tracing_subscriber::EnvFilter;
use upstream_restore::{
    safety, LocalSettings, RestoreResult, ShopifySettings, UpstreamRestorer, UpstreamSettings,
};

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        tracing::error!(error = %err, "Upstream restore failed");
        std::process::exit(1);
    }
}

async fn run() -> RestoreResult<()> {
    // All three bundles load before anything destructive happens; a
    // missing key aborts here.
    let local = LocalSettings::from_env()?;
    let upstream = UpstreamSettings::from_env()?;
    let shopify = ShopifySettings::from_env()?;
    safety::validate_safe(&shopify.shop_url_key)?;

    let mut restorer = UpstreamRestorer::new(local, upstream, shopify);
    restorer.run(true).await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
