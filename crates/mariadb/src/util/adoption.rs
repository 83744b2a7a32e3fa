use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use std::net::IpAddr;

use crate::api::v1beta1::mariadb::MariaDBSpec;
use crate::util::conditions::true_condition;

/// Reported while the resource carries configuration that cannot be acted upon.
pub const INVALID_CONFIGURATION_CONDITION: &str = "InvalidConfiguration";
pub const INVALID_ADOPTION_HOST_REASON: &str = "InvalidAdoptionHost";

/// Which database instance is authoritative for a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdoptionMode {
    /// The operator provisions and runs the database itself.
    SelfManaged,
    /// An externally managed database is authoritative; provisioning is skipped.
    Redirected { host: String },
}

impl AdoptionMode {
    pub fn is_external(&self) -> bool {
        matches!(self, AdoptionMode::Redirected { .. })
    }

    pub fn host(&self) -> Option<&str> {
        match self {
            AdoptionMode::SelfManaged => None,
            AdoptionMode::Redirected { host } => Some(host),
        }
    }
}

impl From<AdoptionMode> for (bool, String) {
    fn from(mode: AdoptionMode) -> Self {
        match mode {
            AdoptionMode::SelfManaged => (false, String::new()),
            AdoptionMode::Redirected { host } => (true, host),
        }
    }
}

/// Resolves the authoritative instance. The host is passed through as configured.
pub fn resolve_adoption(spec: &MariaDBSpec) -> AdoptionMode {
    let host = &spec.adoption_redirect.host;
    if host.is_empty() {
        AdoptionMode::SelfManaged
    } else {
        AdoptionMode::Redirected { host: host.clone() }
    }
}

/// Checks that `host` is an IP address or an RFC 1123 DNS name.
pub fn validate_host(host: &str) -> Result<(), String> {
    if host.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    let name = host.strip_suffix('.').unwrap_or(host);
    if name.is_empty() || name.len() > 253 {
        return Err(format!("'{host}' is not a valid IP address or DNS name"));
    }

    for label in name.split('.') {
        let valid = !label.is_empty()
            && label.len() <= 63
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-');
        if !valid {
            return Err(format!(
                "'{host}' is not a valid IP address or DNS name: bad label '{label}'"
            ));
        }
    }

    Ok(())
}

/// `InvalidConfiguration` condition for a redirected resource whose host is malformed.
/// `None` means there is nothing to report and any stale entry should be dropped.
pub fn invalid_configuration_condition(mode: &AdoptionMode) -> Option<Condition> {
    let host = mode.host()?;
    validate_host(host).err().map(|message| {
        true_condition(
            INVALID_CONFIGURATION_CONDITION,
            INVALID_ADOPTION_HOST_REASON,
            &format!("adoptionRedirect.host: {message}"),
        )
    })
}
