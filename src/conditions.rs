//! # Conditions
//!
//! Maintains the status condition list of a Lockbox: at most one condition per
//! type, transition times that only move when the state actually changes, and a
//! stable order in which `Ready` always comes last.

use std::cmp::Ordering;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

use crate::crd::{Condition, ConditionSeverity, ConditionStatus, READY_CONDITION};

/// Find the condition of the given type
pub fn get<'a>(conditions: &'a [Condition], r#type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == r#type)
}

/// Set a condition using the wall clock for transition times
pub fn set(conditions: &mut Vec<Condition>, condition: Condition) {
    set_with_clock(conditions, condition, Utc::now);
}

/// Set a condition, reading the transition time from `clock`.
///
/// An existing condition in the same state is left untouched, keeping its
/// transition time. A changed condition replaces the old one and is stamped
/// with the current time. A new condition is appended and stamped unless the
/// caller already supplied a transition time.
pub fn set_with_clock<F>(conditions: &mut Vec<Condition>, mut condition: Condition, clock: F)
where
    F: FnOnce() -> DateTime<Utc>,
{
    match conditions.iter_mut().find(|c| c.r#type == condition.r#type) {
        Some(existing) if existing.same_state(&condition) => return,
        Some(existing) => {
            condition.last_transition_time = Some(timestamp(clock()));
            *existing = condition;
        }
        None => {
            if condition.last_transition_time.is_none() {
                condition.last_transition_time = Some(timestamp(clock()));
            }
            conditions.push(condition);
        }
    }
    conditions.sort_by(|a, b| compare_types(&a.r#type, &b.r#type));
}

/// Order condition types ascending, with `Ready` after every other type
pub fn compare_types(a: &str, b: &str) -> Ordering {
    match (a == READY_CONDITION, b == READY_CONDITION) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.cmp(b),
    }
}

pub fn true_condition(r#type: &str) -> Condition {
    Condition {
        r#type: r#type.to_string(),
        status: ConditionStatus::True,
        severity: ConditionSeverity::None,
        last_transition_time: None,
        reason: String::new(),
        message: String::new(),
    }
}

pub fn false_condition(
    r#type: &str,
    severity: ConditionSeverity,
    reason: impl Into<String>,
    message: impl Into<String>,
) -> Condition {
    Condition {
        r#type: r#type.to_string(),
        status: ConditionStatus::False,
        severity,
        last_transition_time: None,
        reason: reason.into(),
        message: message.into(),
    }
}

pub fn unknown_condition(
    r#type: &str,
    reason: impl Into<String>,
    message: impl Into<String>,
) -> Condition {
    Condition {
        r#type: r#type.to_string(),
        status: ConditionStatus::Unknown,
        severity: ConditionSeverity::None,
        last_transition_time: None,
        reason: reason.into(),
        message: message.into(),
    }
}

fn timestamp(now: DateTime<Utc>) -> String {
    now.trunc_subsecs(0).to_rfc3339_opts(SecondsFormat::Secs, true)
}
