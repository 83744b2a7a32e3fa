use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::api::v1beta1::conditions_schema;
use crate::util::conditions::Conditions;

pub static MARIADB_FINALIZER: &str = "mariadb.openstack.org/finalizer";

/// Generate the Kubernetes wrapper struct `MariaDB` from our Spec and Status struct
///
/// This provides a hook for generating the CRD yaml (in crdgen)
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    kind = "MariaDB",
    group = "mariadb.openstack.org",
    version = "v1beta1",
    plural = "mariadbs",
    namespaced
)]
#[kube(status = "MariaDBStatus", shortname = "mariadb", derive = "PartialEq")]
#[kube(
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.conditions[0].status","description":"Status"}"#,
    printcolumn = r#"{"name":"Message","type":"string","jsonPath":".status.conditions[0].message","description":"Message"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MariaDBSpec {
    /// Secret containing a RootPassword
    pub secret: String,
    /// Storage class to host the mariadb databases
    pub storage_class: String,
    /// Storage size allocated for the mariadb databases
    pub storage_request: String,
    /// Container Image URL (will be set to environmental default if empty)
    #[serde(default)]
    pub container_image: String,
    /// Adoption configuration
    #[serde(default)]
    pub adoption_redirect: AdoptionRedirectSpec,
}

/// Redirection to a different DB instance during adoption
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct AdoptionRedirectSpec {
    /// MariaDB host to redirect to (IP or name)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,
}

/// The status object of `MariaDB`
#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MariaDBStatus {
    /// Fingerprint of the last applied database initialization
    #[serde(default)]
    pub db_init_hash: String,

    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    #[schemars(schema_with = "conditions_schema")]
    pub conditions: Conditions,
}
