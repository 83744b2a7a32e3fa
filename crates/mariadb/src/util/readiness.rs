//! Aggregation of the reported sub-conditions into the single `Ready` verdict.
//!
//! Collaborators report progress through the sub-conditions below. The verdict follows
//! the first required sub-condition, in priority order, that is not `True`, so the
//! earliest blocking stage is shown rather than a downstream symptom.

use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};

use crate::api::v1beta1::mariadb::MariaDB;
use crate::util::adoption::INVALID_CONFIGURATION_CONDITION;
use crate::util::conditions::{ConditionStatus, Conditions, READY_CONDITION};

pub const STORAGE_READY_CONDITION: &str = "StorageReady";
pub const CREDENTIALS_READY_CONDITION: &str = "CredentialsReady";
pub const DB_INIT_READY_CONDITION: &str = "DBInitReady";
pub const DEPLOYMENT_READY_CONDITION: &str = "DeploymentReady";

/// Required sub-conditions, highest priority first.
pub const REQUIRED_CONDITIONS: [&str; 4] = [
    STORAGE_READY_CONDITION,
    CREDENTIALS_READY_CONDITION,
    DB_INIT_READY_CONDITION,
    DEPLOYMENT_READY_CONDITION,
];

pub const READY_REASON: &str = "Ready";
pub const READY_MESSAGE: &str = "Setup complete";
pub const ADOPTION_REDIRECT_REASON: &str = "AdoptionRedirect";

/// Computes `Ready` over [`REQUIRED_CONDITIONS`].
pub fn compute_readiness(conditions: &Conditions) -> Condition {
    compute_readiness_for(conditions, &REQUIRED_CONDITIONS)
}

/// Computes `Ready` over `required`, given highest priority first.
///
/// The result only depends on `conditions`: an unchanged set yields an identical
/// condition, including its transition time. The current time is used only when the set
/// holds nothing to derive a time from.
pub fn compute_readiness_for(conditions: &Conditions, required: &[&str]) -> Condition {
    for condition_type in required {
        match conditions.get(condition_type) {
            Some(c) if ConditionStatus::of(c) == ConditionStatus::True => continue,
            Some(c) => {
                return verdict(
                    conditions,
                    ConditionStatus::False,
                    &c.reason,
                    &c.message,
                    Some(&c.last_transition_time),
                    c.observed_generation,
                );
            }
            None => {
                return verdict(
                    conditions,
                    ConditionStatus::False,
                    &format!("pending: {condition_type}"),
                    &format!("{condition_type} has not been reported yet"),
                    None,
                    None,
                );
            }
        }
    }

    let reported = || required.iter().filter_map(|t| conditions.get(t));
    let latest = reported().map(|c| &c.last_transition_time).max_by_key(|t| t.0);
    let generation = reported().filter_map(|c| c.observed_generation).min();

    verdict(
        conditions,
        ConditionStatus::True,
        READY_REASON,
        READY_MESSAGE,
        latest,
        generation,
    )
}

/// Verdict for a resource redirected to an external host. The self-managed stages are
/// not consulted; only a reported `InvalidConfiguration` blocks readiness.
///
/// Transition times follow [`compute_readiness_for`].
pub fn redirected_readiness(conditions: &Conditions, host: &str) -> Condition {
    match conditions.get(INVALID_CONFIGURATION_CONDITION) {
        Some(invalid) if ConditionStatus::of(invalid) == ConditionStatus::True => verdict(
            conditions,
            ConditionStatus::False,
            &invalid.reason,
            &invalid.message,
            Some(&invalid.last_transition_time),
            invalid.observed_generation,
        ),
        _ => verdict(
            conditions,
            ConditionStatus::True,
            ADOPTION_REDIRECT_REASON,
            &format!("Redirected to external database host {host}"),
            None,
            None,
        ),
    }
}

/// Recomputes `Ready` and stores it. Returns whether the set changed.
pub fn update_readiness(conditions: &mut Conditions) -> bool {
    let ready = compute_readiness(conditions);
    conditions.put_ready(ready)
}

/// Returns true if the database is ready to serve requests
pub fn is_ready(mariadb: &MariaDB) -> bool {
    mariadb
        .status
        .as_ref()
        .is_some_and(|status| status.conditions.is_true(READY_CONDITION))
}

fn verdict(
    conditions: &Conditions,
    status: ConditionStatus,
    reason: &str,
    message: &str,
    derived_time: Option<&Time>,
    observed_generation: Option<i64>,
) -> Condition {
    let last_transition_time = match conditions.get(READY_CONDITION) {
        Some(ready) if ConditionStatus::of(ready) == status => ready.last_transition_time.clone(),
        _ => derived_time
            .or_else(|| latest_reported(conditions))
            .cloned()
            .unwrap_or_else(|| Time(Utc::now())),
    };

    Condition {
        type_: READY_CONDITION.to_string(),
        status: status.to_string(),
        reason: reason.to_string(),
        message: message.to_string(),
        last_transition_time,
        observed_generation,
    }
}

/// Most recent transition among the reported sub-conditions.
fn latest_reported(conditions: &Conditions) -> Option<&Time> {
    conditions
        .iter()
        .filter(|c| c.type_ != READY_CONDITION)
        .map(|c| &c.last_transition_time)
        .max_by_key(|t| t.0)
}
