use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use drp_core::constants::{
    REPUTATION_FLOOR, REPUTATION_PENALTY, REPUTATION_REWARD, REPUTATION_START,
};
use drp_core::types::{ElderId, ElderPublicKey, ElderStatus, Timestamp};
use drp_core::DrpError;

/// Registry entry for a single committee member.
///
/// Private keys are never held here; the record carries only the public
/// half plus lifecycle bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElderRecord {
    pub elder_id: ElderId,
    pub public_key: ElderPublicKey,
    pub status: ElderStatus,
    /// Starts at 1.0; nudged by signing participation, floored at 0.1.
    pub reputation: f64,
    pub last_activity_ts: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
}

impl ElderRecord {
    pub fn new(elder_id: ElderId, public_key: ElderPublicKey, now: Timestamp) -> Self {
        Self {
            elder_id,
            public_key,
            status: ElderStatus::Active,
            reputation: REPUTATION_START,
            last_activity_ts: now,
            specialization: None,
        }
    }
}

/// The committee for the current process lifetime.
///
/// Members are keyed by id in a `BTreeMap`, so every iteration is already
/// in the lexicographic order signing selection requires. Elders are never
/// removed; status flips instead.
#[derive(Debug, Default)]
pub struct Committee {
    members: BTreeMap<ElderId, ElderRecord>,
}

impl Committee {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new member. Re-registering an existing id is refused.
    pub fn register(&mut self, record: ElderRecord) -> Result<(), DrpError> {
        if self.members.contains_key(&record.elder_id) {
            return Err(DrpError::PreconditionFailed(format!(
                "elder already registered: {}",
                record.elder_id
            )));
        }
        self.members.insert(record.elder_id.clone(), record);
        Ok(())
    }

    pub fn get(&self, id: &ElderId) -> Option<&ElderRecord> {
        self.members.get(id)
    }

    pub fn get_mut(&mut self, id: &ElderId) -> Option<&mut ElderRecord> {
        self.members.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// All members in lexicographic id order.
    pub fn iter(&self) -> impl Iterator<Item = &ElderRecord> {
        self.members.values()
    }

    /// Ids of all `active` members, lexicographically ordered.
    pub fn active_ids(&self) -> Vec<ElderId> {
        self.members
            .values()
            .filter(|m| m.status == ElderStatus::Active)
            .map(|m| m.elder_id.clone())
            .collect()
    }

    /// Find the member owning `public_key`, if any.
    pub fn find_by_public_key(&self, public_key: &ElderPublicKey) -> Option<&ElderRecord> {
        self.members.values().find(|m| &m.public_key == public_key)
    }

    /// Record successful signing participation.
    pub fn note_success(&mut self, id: &ElderId, now: Timestamp) {
        if let Some(m) = self.members.get_mut(id) {
            m.reputation = (m.reputation + REPUTATION_REWARD).min(REPUTATION_START);
            m.last_activity_ts = now;
        }
    }

    /// Record a signing failure.
    pub fn note_failure(&mut self, id: &ElderId) {
        if let Some(m) = self.members.get_mut(id) {
            m.reputation = (m.reputation - REPUTATION_PENALTY).max(REPUTATION_FLOOR);
        }
    }
}
