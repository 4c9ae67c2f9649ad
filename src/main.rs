use slvoters::configuration::get_configuration;
use slvoters::startup::Application;
use slvoters::telemetry::get_subscriber;
use slvoters::telemetry::init_subscriber;

/// Initialise telemetry, load config, and start the server
#[tokio::main] // requires tokio features: macros, rt-multi-thread
async fn main() -> Result<(), anyhow::Error> {
    // only logs at the specified level and higher are emitted; `RUST_LOG`
    // overrides
    let subscriber = get_subscriber("slvoters", "info", std::io::stdout);
    init_subscriber(subscriber)?;

    let cfg = get_configuration()?;
    tracing::info!(
        host = %cfg.application.host,
        port = cfg.application.port,
        storage = ?cfg.application.storage,
        sync_fields = cfg.voters.sync_fields,
        "starting"
    );

    let app = Application::build(cfg).await?;
    app.run_until_stopped().await?;
    Ok(())
}
