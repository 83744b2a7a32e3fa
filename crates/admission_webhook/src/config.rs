use mariadb::util::defaults::{env_lookup, get_env_var};
use std::path::PathBuf;

pub const CERT_DIR_ENV: &str = "WEBHOOK_CERT_DIR";
pub const BIND_ADDRESS_ENV: &str = "WEBHOOK_BIND_ADDRESS";
pub const HEALTH_ADDRESS_ENV: &str = "WEBHOOK_HEALTH_ADDRESS";

/// Process settings for the admission webhook binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookConfig {
    /// Directory holding `tls.crt` and `tls.key`
    pub cert_dir: PathBuf,
    /// HTTPS address serving `/mutate`
    pub bind_address: String,
    /// Plain HTTP address serving `/health`
    pub health_address: String,
}

impl WebhookConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        WebhookConfig {
            cert_dir: PathBuf::from(get_env_var(&lookup, CERT_DIR_ENV, "/etc/certs")),
            bind_address: get_env_var(&lookup, BIND_ADDRESS_ENV, "0.0.0.0:8443"),
            health_address: get_env_var(&lookup, HEALTH_ADDRESS_ENV, "0.0.0.0:8080"),
        }
    }

    pub fn cert_path(&self) -> PathBuf {
        self.cert_dir.join("tls.crt")
    }

    pub fn key_path(&self) -> PathBuf {
        self.cert_dir.join("tls.key")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_deployment_manifest() {
        let config = WebhookConfig::from_lookup(|_| None);
        assert_eq!(config.cert_path(), PathBuf::from("/etc/certs/tls.crt"));
        assert_eq!(config.key_path(), PathBuf::from("/etc/certs/tls.key"));
        assert_eq!(config.bind_address, "0.0.0.0:8443");
        assert_eq!(config.health_address, "0.0.0.0:8080");
    }

    #[test]
    fn cert_dir_override() {
        let config = WebhookConfig::from_lookup(|name| {
            (name == CERT_DIR_ENV).then(|| "/tmp/k8s-webhook-server/serving-certs".to_string())
        });
        assert_eq!(
            config.key_path(),
            PathBuf::from("/tmp/k8s-webhook-server/serving-certs/tls.key")
        );
    }
}
