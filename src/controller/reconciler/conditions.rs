//! # Status Conditions
//!
//! One condition per type, kept sorted by type. The transition time only moves
//! when the status value changes.

use crate::constants::{CONDITION_RECONCILED, REASON_COMPLETE, REASON_ERROR};
use crate::crd::{Condition, ConditionStatus, ExportStatus};
use chrono::{SecondsFormat, Utc};

/// Insert or replace the condition of `condition_type`.
///
/// Returns whether the collection changed.
pub fn upsert(
    conditions: &mut Option<Vec<Condition>>,
    condition_type: &str,
    status: ConditionStatus,
    reason: &str,
    message: &str,
) -> bool {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    upsert_at(conditions, condition_type, status, reason, message, &now)
}

fn upsert_at(
    conditions: &mut Option<Vec<Condition>>,
    condition_type: &str,
    status: ConditionStatus,
    reason: &str,
    message: &str,
    now: &str,
) -> bool {
    let conditions = conditions.get_or_insert_with(Vec::new);

    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        let same_status = existing.status == status.as_str();
        if same_status
            && existing.reason.as_deref() == Some(reason)
            && existing.message.as_deref() == Some(message)
        {
            return false;
        }
        if !same_status || existing.last_transition_time.is_none() {
            existing.last_transition_time = Some(now.to_string());
        }
        existing.status = status.as_str().to_string();
        existing.reason = Some(reason.to_string());
        existing.message = Some(message.to_string());
        return true;
    }

    conditions.push(Condition {
        r#type: condition_type.to_string(),
        status: status.as_str().to_string(),
        last_transition_time: Some(now.to_string()),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
    });
    conditions.sort_by(|a, b| a.r#type.cmp(&b.r#type));
    true
}

/// Record a failed pass
pub fn mark_error(status: &mut ExportStatus, error: &impl std::fmt::Display) -> bool {
    upsert(
        &mut status.conditions,
        CONDITION_RECONCILED,
        ConditionStatus::False,
        REASON_ERROR,
        &error.to_string(),
    )
}

/// Record the completion transition
pub fn mark_complete(status: &mut ExportStatus) -> bool {
    upsert(
        &mut status.conditions,
        CONDITION_RECONCILED,
        ConditionStatus::True,
        REASON_COMPLETE,
        "Reconcile complete",
    )
}
