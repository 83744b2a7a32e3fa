use axum::{extract::State, response::Json, routing::post, Router};
use axum_server::tls_rustls::RustlsConfig;
use kube::core::{admission::AdmissionReview, DynamicObject};
use mariadb::api::v1beta1::mariadb::MariaDB;
use mariadb::util::{defaults::Defaults, telemetry};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

mod cert_reloader;
mod config;
mod defaulter;

use cert_reloader::CertificateReloader;
use config::WebhookConfig;
use defaulter::MariaDBDefaulter;

#[derive(Clone)]
struct AppState {
    defaulter: MariaDBDefaulter,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::CryptoProvider::install_default(rustls::crypto::aws_lc_rs::default_provider()).ok();

    telemetry::init().await;

    let config = WebhookConfig::from_env();
    let defaults = Defaults::from_env();
    info!("Starting MariaDB admission webhook");

    let state = AppState {
        defaulter: MariaDBDefaulter::new(defaults),
    };
    let app = Router::new()
        .route("/mutate", post(mutate_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state));
    let health_app = Router::new().route("/health", axum::routing::get(health_handler));

    // Load TLS configuration, reloaded in place on certificate rotation
    let tls_config = RustlsConfig::from_pem_file(config.cert_path(), config.key_path()).await?;
    CertificateReloader::new(tls_config.clone(), config.cert_path(), config.key_path())
        .start_watching(&config.cert_dir);

    let health_listener = tokio::net::TcpListener::bind(&config.health_address).await?;
    info!("Health server listening on {}", config.health_address);

    let bind_address: SocketAddr = config.bind_address.parse()?;
    info!("Admission webhook listening on {} (HTTPS)", bind_address);

    tokio::try_join!(
        async { axum::serve(health_listener, health_app).await.map_err(anyhow::Error::from) },
        async {
            axum_server::bind_rustls(bind_address, tls_config)
                .serve(app.into_make_service())
                .await
                .map_err(anyhow::Error::from)
        },
    )?;
    Ok(())
}

async fn mutate_handler(
    State(state): State<Arc<AppState>>,
    Json(review): Json<AdmissionReview<MariaDB>>,
) -> Json<AdmissionReview<DynamicObject>> {
    info!("Received admission review request");
    Json(state.defaulter.mutate(review))
}

async fn health_handler() -> &'static str {
    "healthy"
}
