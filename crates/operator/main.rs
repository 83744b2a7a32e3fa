mod config;
mod handlers;
mod server;

use kube::Client;
use mariadb::controllers::mariadb_controller::{self, State};
use mariadb::util::{defaults::Defaults, telemetry};
use tracing::info;

use crate::config::OperatorConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init().await;

    let config = OperatorConfig::from_env();
    let defaults = Defaults::from_env();
    info!(
        bind_address = %config.bind_address,
        container_image_url = %defaults.container_image_url,
        "starting mariadb operator"
    );

    // Initiatilize Kubernetes controller state
    let state = State::new(defaults, &config.reporter)?;
    let client = Client::try_default().await?;
    let controller = mariadb_controller::run(state.clone(), client);

    // Both runtimes implements graceful shutdown, so poll until both are done
    let (controller, server) = tokio::join!(
        controller,
        server::start_server(state, &config.bind_address)
    );
    controller?;
    server?;
    Ok(())
}
