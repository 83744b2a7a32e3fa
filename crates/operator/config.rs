use mariadb::util::defaults::{env_lookup, get_env_var};

pub const BIND_ADDRESS_ENV: &str = "MARIADB_OPERATOR_BIND_ADDRESS";
pub const REPORTER_ENV: &str = "MARIADB_OPERATOR_REPORTER";

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
const DEFAULT_REPORTER: &str = "mariadb-operator";

/// Process settings for the operator binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Address the diagnostics, health and metrics server listens on
    pub bind_address: String,
    /// Controller name stamped on published events
    pub reporter: String,
}

impl OperatorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        OperatorConfig {
            bind_address: get_env_var(&lookup, BIND_ADDRESS_ENV, DEFAULT_BIND_ADDRESS),
            reporter: get_env_var(&lookup, REPORTER_ENV, DEFAULT_REPORTER),
        }
    }
}
