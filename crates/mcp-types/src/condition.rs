use serde::{Deserialize, Serialize};

/// The typed pool conditions this core surfaces.
///
/// Every pool carries at most one condition of each type at a time; see
/// [`Condition`] for the tri-state status each one carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionType {
    Ready,
    Updating,
    Degraded,
    PoolOverlap,
    DrainStuck,
}

/// Tri-state condition status, following the usual True/False/Unknown shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// A single typed, human-readable pool condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: ConditionType,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
}

impl Condition {
    pub fn new(
        type_: ConditionType,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_,
            status,
            reason: reason.into(),
            message: message.into(),
        }
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

/// Replaces the condition of the same [`ConditionType`] in `conditions`, or
/// appends it if none is present yet. Pool conditions are keyed by type, so
/// this is the only mutation operation callers need.
pub fn upsert_condition(conditions: &mut Vec<Condition>, new: Condition) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.type_ == new.type_) {
        *existing = new;
    } else {
        conditions.push(new);
    }
}

/// Looks up the condition of a given type, if the pool currently carries one.
pub fn find_condition(conditions: &[Condition], type_: ConditionType) -> Option<&Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}
