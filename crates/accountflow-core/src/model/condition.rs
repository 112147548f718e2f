//! Typed, deduplicated status conditions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
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

/// Last observed outcome of a check, keyed by `condition_type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition<T> {
    #[serde(rename = "type")]
    pub condition_type: T,

    pub status: ConditionStatus,

    pub reason: String,

    pub message: String,

    pub last_probe_time: DateTime<Utc>,

    pub last_transition_time: DateTime<Utc>,
}

/// Record an observation in `conditions`.
///
/// At most one entry exists per type. Observing the same status and reason
/// again only refreshes `last_probe_time`; a changed status or reason
/// rewrites the entry and moves `last_transition_time`.
pub fn set_condition<T: Copy + PartialEq>(
    conditions: &mut Vec<Condition<T>>,
    condition_type: T,
    status: ConditionStatus,
    reason: &str,
    message: &str,
    now: DateTime<Utc>,
) {
    match conditions
        .iter_mut()
        .find(|c| c.condition_type == condition_type)
    {
        Some(existing) if existing.status == status && existing.reason == reason => {
            existing.last_probe_time = now;
        }
        Some(existing) => {
            existing.status = status;
            existing.reason = reason.to_string();
            existing.message = message.to_string();
            existing.last_probe_time = now;
            existing.last_transition_time = now;
        }
        None => conditions.push(Condition {
            condition_type,
            status,
            reason: reason.to_string(),
            message: message.to_string(),
            last_probe_time: now,
            last_transition_time: now,
        }),
    }
}

pub fn find_condition<T: PartialEq>(
    conditions: &[Condition<T>],
    condition_type: T,
) -> Option<&Condition<T>> {
    conditions.iter().find(|c| c.condition_type == condition_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Kind {
        Ready,
        Failed,
    }

    #[test]
    fn test_repeat_observation_only_refreshes_probe_time() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::minutes(5);
        let mut conditions = Vec::new();

        set_condition(&mut conditions, Kind::Ready, ConditionStatus::True, "Ok", "first", t0);
        set_condition(&mut conditions, Kind::Ready, ConditionStatus::True, "Ok", "second", t1);

        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].last_probe_time, t1);
        assert_eq!(conditions[0].last_transition_time, t0);
        assert_eq!(conditions[0].message, "first");
    }

    #[test]
    fn test_changed_reason_rewrites_entry() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::minutes(1);
        let mut conditions = Vec::new();

        set_condition(&mut conditions, Kind::Ready, ConditionStatus::True, "Ok", "m", t0);
        set_condition(
            &mut conditions,
            Kind::Ready,
            ConditionStatus::False,
            "Broken",
            "went away",
            t1,
        );

        assert_eq!(conditions.len(), 1);
        let c = find_condition(&conditions, Kind::Ready).unwrap();
        assert_eq!(c.status, ConditionStatus::False);
        assert_eq!(c.reason, "Broken");
        assert_eq!(c.last_transition_time, t1);
    }

    #[test]
    fn test_distinct_types_are_kept_apart() {
        let now = Utc::now();
        let mut conditions = Vec::new();
        set_condition(&mut conditions, Kind::Ready, ConditionStatus::True, "Ok", "", now);
        set_condition(&mut conditions, Kind::Failed, ConditionStatus::True, "Bad", "", now);
        assert_eq!(conditions.len(), 2);
        assert!(find_condition(&conditions, Kind::Failed).is_some());
    }
}
