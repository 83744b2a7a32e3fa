use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// The aggregate condition. Only the readiness aggregator writes it.
pub const READY_CONDITION: &str = "Ready";

/// Reason used for conditions seeded by [`Conditions::init`]
pub const INIT_REASON: &str = "Init";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        }
    }

    /// Reads the status of a stored condition. Anything unrecognised counts as `Unknown`.
    pub fn of(condition: &Condition) -> Self {
        match condition.status.as_str() {
            "True" => ConditionStatus::True,
            "False" => ConditionStatus::False,
            _ => ConditionStatus::Unknown,
        }
    }
}

impl From<bool> for ConditionStatus {
    fn from(value: bool) -> Self {
        if value {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        }
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds a condition stamped with the current time.
pub fn condition(
    condition_type: &str,
    status: ConditionStatus,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        type_: condition_type.to_string(),
        status: status.to_string(),
        reason: reason.to_string(),
        message: message.to_string(),
        last_transition_time: Time(Utc::now()),
        observed_generation: None,
    }
}

pub fn true_condition(condition_type: &str, reason: &str, message: &str) -> Condition {
    condition(condition_type, ConditionStatus::True, reason, message)
}

pub fn false_condition(condition_type: &str, reason: &str, message: &str) -> Condition {
    condition(condition_type, ConditionStatus::False, reason, message)
}

pub fn unknown_condition(condition_type: &str, reason: &str, message: &str) -> Condition {
    condition(condition_type, ConditionStatus::Unknown, reason, message)
}

/// Ordered set of conditions with at most one entry per type.
///
/// Entries keep the position of their first insertion, except `Ready` which always sits
/// at index 0 so printer columns reading `.status.conditions[0]` show the aggregate.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Condition>", into = "Vec<Condition>")]
pub struct Conditions(Vec<Condition>);

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a set with an `Unknown` entry for each type.
    pub fn init<'a>(condition_types: impl IntoIterator<Item = &'a str>) -> Self {
        let mut conditions = Self::new();
        for condition_type in condition_types {
            conditions.set(unknown_condition(
                condition_type,
                INIT_REASON,
                &format!("{condition_type} not started"),
            ));
        }
        conditions
    }

    /// Inserts or replaces the condition with the same type and returns whether anything
    /// changed.
    ///
    /// 1. If the type already exists, reason, message and observed generation are updated
    ///    in place. LastTransitionTime is taken from new_condition only when the status
    ///    differs from the stored one.
    /// 2. Otherwise new_condition is appended as is.
    ///
    /// `Ready` is refused: it is derived by the readiness aggregator.
    pub fn set(&mut self, new_condition: Condition) -> bool {
        if new_condition.type_ == READY_CONDITION {
            warn!(
                reason = %new_condition.reason,
                "refusing to set the {} condition directly",
                READY_CONDITION
            );
            return false;
        }
        self.upsert(new_condition)
    }

    /// Stores the aggregate `Ready` condition at the front of the set.
    pub(crate) fn put_ready(&mut self, ready: Condition) -> bool {
        debug_assert_eq!(ready.type_, READY_CONDITION);
        if let Some(index) = self.position(READY_CONDITION) {
            if index != 0 {
                let existing = self.0.remove(index);
                self.0.insert(0, existing);
            }
        } else {
            self.0.insert(0, ready);
            return true;
        }
        self.upsert(ready)
    }

    fn upsert(&mut self, new_condition: Condition) -> bool {
        let Some(index) = self.position(&new_condition.type_) else {
            self.0.push(new_condition);
            return true;
        };

        let existing = &mut self.0[index];
        let mut changed = false;

        if existing.status != new_condition.status {
            existing.status = new_condition.status;
            existing.last_transition_time = new_condition.last_transition_time;
            changed = true;
        }

        if existing.reason != new_condition.reason {
            existing.reason = new_condition.reason;
            changed = true;
        }

        if existing.message != new_condition.message {
            existing.message = new_condition.message;
            changed = true;
        }

        if existing.observed_generation != new_condition.observed_generation {
            existing.observed_generation = new_condition.observed_generation;
            changed = true;
        }

        changed
    }

    fn position(&self, condition_type: &str) -> Option<usize> {
        self.0.iter().position(|c| c.type_ == condition_type)
    }

    pub fn get(&self, condition_type: &str) -> Option<&Condition> {
        self.0.iter().find(|c| c.type_ == condition_type)
    }

    pub fn has(&self, condition_type: &str) -> bool {
        self.position(condition_type).is_some()
    }

    /// Status of the given type, `None` when it was never reported.
    pub fn status(&self, condition_type: &str) -> Option<ConditionStatus> {
        self.get(condition_type).map(ConditionStatus::of)
    }

    /// Returns true when the condition_type is present and set to `True`
    pub fn is_true(&self, condition_type: &str) -> bool {
        self.status(condition_type) == Some(ConditionStatus::True)
    }

    /// Returns true when the condition_type is present and set to `False`
    pub fn is_false(&self, condition_type: &str) -> bool {
        self.status(condition_type) == Some(ConditionStatus::False)
    }

    /// Returns true when the condition_type is present and set to `Unknown`
    pub fn is_unknown(&self, condition_type: &str) -> bool {
        self.status(condition_type) == Some(ConditionStatus::Unknown)
    }

    /// Removes condition_type if present and returns whether it was removed.
    pub fn remove(&mut self, condition_type: &str) -> bool {
        let original_len = self.0.len();
        self.0.retain(|c| c.type_ != condition_type);
        self.0.len() != original_len
    }

    /// Carries over LastTransitionTime from a previous set for every condition whose
    /// status did not change. Used when a pass rebuilds its conditions from scratch.
    pub fn restore_last_transition_times(&mut self, previous: &Conditions) {
        for condition in &mut self.0 {
            if let Some(old) = previous.get(&condition.type_) {
                if old.status == condition.status {
                    condition.last_transition_time = old.last_transition_time.clone();
                }
            }
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Condition> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Persisted lists are trusted for order but not for uniqueness: the last entry of a
/// duplicated type wins, at the position of the first one.
impl From<Vec<Condition>> for Conditions {
    fn from(list: Vec<Condition>) -> Self {
        let mut conditions = Conditions::new();
        for condition in list {
            match conditions.position(&condition.type_) {
                Some(index) => conditions.0[index] = condition,
                None => conditions.0.push(condition),
            }
        }
        if let Some(index) = conditions.position(READY_CONDITION) {
            let ready = conditions.0.remove(index);
            conditions.0.insert(0, ready);
        }
        conditions
    }
}

impl From<Conditions> for Vec<Condition> {
    fn from(conditions: Conditions) -> Self {
        conditions.0
    }
}

impl<'a> IntoIterator for &'a Conditions {
    type Item = &'a Condition;
    type IntoIter = std::slice::Iter<'a, Condition>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
