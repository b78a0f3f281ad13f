//! # Status
//!
//! Condition type shared by the resources this controller writes.

use serde::{Deserialize, Serialize};

/// Status condition, shaped like `metav1.Condition`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last transition time (RFC 3339)
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Machine-readable reason for the last transition
    #[serde(default)]
    pub reason: Option<String>,
    /// Human-readable message
    #[serde(default)]
    pub message: Option<String>,
    /// Generation of the resource the condition was computed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Condition {
    /// Replace the condition of the same type in `conditions`
    ///
    /// When status and reason are unchanged only the message and observed generation
    /// are refreshed, so the transition time keeps pointing at the real transition.
    /// Returns `true` when `conditions` was modified.
    pub fn apply(conditions: &mut Vec<Condition>, condition: Condition) -> bool {
        match conditions.iter_mut().find(|c| c.r#type == condition.r#type) {
            Some(existing)
                if existing.status == condition.status && existing.reason == condition.reason =>
            {
                let changed = existing.message != condition.message
                    || existing.observed_generation != condition.observed_generation;
                existing.message = condition.message;
                existing.observed_generation = condition.observed_generation;
                changed
            }
            Some(existing) => {
                *existing = condition;
                true
            }
            None => {
                conditions.push(condition);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(status: &str, reason: &str, time: &str) -> Condition {
        Condition {
            r#type: "Synced".to_string(),
            status: status.to_string(),
            last_transition_time: Some(time.to_string()),
            reason: Some(reason.to_string()),
            message: None,
            observed_generation: None,
        }
    }

    #[test]
    fn test_apply_appends_new_type() {
        let mut conditions = Vec::new();
        assert!(Condition::apply(
            &mut conditions,
            condition("True", "AllPathsSynced", "t1")
        ));
        assert_eq!(conditions.len(), 1);
    }

    #[test]
    fn test_apply_keeps_unchanged_condition() {
        let mut conditions = vec![condition("True", "AllPathsSynced", "t1")];
        assert!(!Condition::apply(
            &mut conditions,
            condition("True", "AllPathsSynced", "t2")
        ));
        assert_eq!(conditions[0].last_transition_time.as_deref(), Some("t1"));
    }

    #[test]
    fn test_apply_refreshes_message_on_same_reason() {
        let mut first = condition("False", "PartialSync", "t1");
        first.message = Some("Synced 2/3 paths".to_string());
        first.observed_generation = Some(1);
        let mut conditions = vec![first];

        let mut next = condition("False", "PartialSync", "t2");
        next.message = Some("Synced 3/5 paths".to_string());
        next.observed_generation = Some(2);
        assert!(Condition::apply(&mut conditions, next));

        assert_eq!(conditions[0].message.as_deref(), Some("Synced 3/5 paths"));
        assert_eq!(conditions[0].observed_generation, Some(2));
        assert_eq!(conditions[0].last_transition_time.as_deref(), Some("t1"));
    }

    #[test]
    fn test_apply_replaces_on_reason_change() {
        let mut conditions = vec![condition("False", "PartialSync", "t1")];
        assert!(Condition::apply(
            &mut conditions,
            condition("False", "SyncFailed", "t2")
        ));
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].reason.as_deref(), Some("SyncFailed"));
        assert_eq!(conditions[0].last_transition_time.as_deref(), Some("t2"));
    }
}
