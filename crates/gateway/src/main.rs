use anyhow::Context;
use classifier::{ClassRegistry, ClassifierService};
use gateway::{
    config::get_configuration, logging::setup_logging, routes::run_server, state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_configuration().context("failed to load configuration")?;
    let _telemetry = setup_logging(&config)?;

    let classifier_config = config.classifier.clone();
    let service = tokio::task::spawn_blocking(move || {
        ClassifierService::new(&classifier_config, ClassRegistry::default())
    })
    .await?
    .context("failed to load models")?;

    let state = AppState::new(service, config.request_timeout());
    run_server(&config.address(), state).await
}
