use anyhow::Context;
use tracing::info;

use stockledger_api::app;
use stockledger_api::config::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let settings = Settings::load().context("loading configuration")?;
    stockledger_observability::init_with(&settings.log_filter, settings.log_format());

    let services = app::services::AppServices::from_settings(&settings)
        .await
        .context("wiring services")?;
    let router = app::build_app(services);

    let listener = tokio::net::TcpListener::bind(&settings.bind_address)
        .await
        .with_context(|| format!("binding {}", settings.bind_address))?;
    info!(address = %listener.local_addr()?, "listening");

    axum::serve(listener, router).await.context("serving http")?;
    Ok(())
}
