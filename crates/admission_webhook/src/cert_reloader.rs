use anyhow::Result;
use axum_server::tls_rustls::RustlsConfig;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Swaps the serving certificate in place whenever `tls.crt` or `tls.key` changes on disk.
pub struct CertificateReloader {
    tls_config: RustlsConfig,
    cert_path: PathBuf,
    key_path: PathBuf,
}

impl CertificateReloader {
    pub fn new(tls_config: RustlsConfig, cert_path: PathBuf, key_path: PathBuf) -> Self {
        Self {
            tls_config,
            cert_path,
            key_path,
        }
    }

    pub fn start_watching(self, cert_dir: &Path) {
        let cert_dir = cert_dir.to_path_buf();

        tokio::spawn(async move {
            if let Err(e) = self.watch_certificates(&cert_dir).await {
                error!("Certificate watcher failed: {}", e);
            }
        });
    }

    async fn watch_certificates(&self, cert_dir: &Path) -> Result<()> {
        let (tx, mut rx) = mpsc::channel(100);

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Err(e) = tx.blocking_send(res) {
                    error!("Failed to send file watcher event: {}", e);
                }
            },
            Config::default(),
        )?;

        // Secret volumes swap a ..data symlink, so the whole directory is watched
        watcher.watch(cert_dir, RecursiveMode::Recursive)?;
        info!("Started watching certificate directory: {}", cert_dir.display());

        while let Some(event_result) = rx.recv().await {
            match event_result {
                Ok(event) if involves_cert_files(&event) => self.reload().await,
                Ok(_) => {}
                Err(e) => {
                    warn!("File watcher error: {}", e);
                }
            }
        }

        Ok(())
    }

    async fn reload(&self) {
        match self
            .tls_config
            .reload_from_pem_file(&self.cert_path, &self.key_path)
            .await
        {
            Ok(()) => info!("Reloaded serving certificate"),
            // A half-written pair fails here; the next event retries
            Err(e) => warn!("Certificate reload failed, keeping previous certificate: {}", e),
        }
    }
}

fn involves_cert_files(event: &Event) -> bool {
    event.paths.iter().any(|path| {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| name == "tls.crt" || name == "tls.key" || name == "..data")
            .unwrap_or(false)
    })
}
