use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;

use crate::api::v1beta1::mariadb::MariaDBStatus;

pub const RBAC_NAME_PREFIX: &str = "mariadb-";

// Condition types reported by the RBAC collaborator
pub const SERVICE_ACCOUNT_READY_CONDITION: &str = "ServiceAccountReady";
pub const ROLE_READY_CONDITION: &str = "RoleReady";
pub const ROLE_BINDING_READY_CONDITION: &str = "RoleBindingReady";

/// Name used for the service account, role and role binding of a MariaDB
pub fn rbac_resource_name(resource_name: &str) -> String {
    format!("{RBAC_NAME_PREFIX}{resource_name}")
}

/// Namespace the RBAC objects live in
pub fn rbac_namespace(resource_namespace: &str) -> String {
    resource_namespace.to_string()
}

/// Records a condition reported for the RBAC objects
pub fn set_rbac_condition(status: &mut MariaDBStatus, condition: Condition) -> bool {
    status.conditions.set(condition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::conditions::true_condition;

    #[test]
    fn rbac_names_are_deterministic() {
        assert_eq!(rbac_resource_name("mydb"), "mariadb-mydb");
        assert_eq!(rbac_resource_name("mydb"), rbac_resource_name("mydb"));

        let other = rbac_resource_name("otherdb");
        assert_eq!(
            other.strip_prefix(RBAC_NAME_PREFIX),
            Some("otherdb")
        );
        assert_ne!(other, rbac_resource_name("mydb"));
    }

    #[test]
    fn rbac_namespace_follows_the_resource() {
        assert_eq!(rbac_namespace("openstack"), "openstack");
    }

    #[test]
    fn rbac_conditions_land_in_status() {
        let mut status = MariaDBStatus::default();
        assert!(set_rbac_condition(
            &mut status,
            true_condition(SERVICE_ACCOUNT_READY_CONDITION, "Ready", "ServiceAccount created")
        ));
        assert!(status.conditions.is_true(SERVICE_ACCOUNT_READY_CONDITION));
    }
}
