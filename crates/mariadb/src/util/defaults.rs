use serde::Serialize;
use tracing::debug;

use crate::api::v1beta1::mariadb::MariaDBSpec;

/// Fall-back container image for MariaDB/Galera
pub const MARIADB_CONTAINER_IMAGE: &str =
    "quay.io/podified-antelope-centos9/openstack-mariadb:current-podified";

/// Environment variable overriding [`MARIADB_CONTAINER_IMAGE`]
pub const CONTAINER_IMAGE_ENV: &str = "RELATED_IMAGE_MARIADB_IMAGE_URL_DEFAULT";

/// Returns the value `lookup` yields for `name` unless it is missing or blank, in
/// which case `fallback` is returned.
pub fn get_env_var<F>(lookup: F, name: &str, fallback: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => value,
        _ => fallback.to_string(),
    }
}

/// Reads the process environment. Unset and non-unicode variables are both absent.
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Field defaults, resolved once at process start and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Defaults {
    pub container_image_url: String,
}

impl Defaults {
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Defaults {
            container_image_url: get_env_var(&lookup, CONTAINER_IMAGE_ENV, MARIADB_CONTAINER_IMAGE),
        };
        debug!(container_image_url = %defaults.container_image_url, "resolved defaults");
        defaults
    }
}

/// The image a MariaDB runs, falling back to the resolved default.
pub fn effective_container_image<'a>(spec: &'a MariaDBSpec, defaults: &'a Defaults) -> &'a str {
    if spec.container_image.is_empty() {
        &defaults.container_image_url
    } else {
        &spec.container_image
    }
}

/// Fills unset spec fields from `defaults`. Returns whether the spec changed.
pub fn apply_defaults(spec: &mut MariaDBSpec, defaults: &Defaults) -> bool {
    if spec.container_image.is_empty() {
        spec.container_image = defaults.container_image_url.clone();
        return true;
    }
    false
}
