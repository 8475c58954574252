use std::path::Path;

use drp_core::decision::DecisionRecord;
use drp_core::dispute::{DisputeCase, DisputeStatus};
use drp_core::DrpError;

fn storage_err(e: impl std::fmt::Display) -> DrpError {
    DrpError::InfrastructureUnavailable(format!("storage error: {e}"))
}

fn codec_err(e: impl std::fmt::Display) -> DrpError {
    DrpError::InfrastructureUnavailable(format!("serialization error: {e}"))
}

/// Persistent ledger keyspace backed by sled.
///
/// Named trees, created idempotently at open:
///   decision_records — decision_id utf8 bytes → bincode(DecisionRecord)
///   disputes         — dispute_id utf8 bytes  → bincode(DisputeCase)
pub struct LedgerDb {
    _db: sled::Db,
    decisions: sled::Tree,
    disputes: sled::Tree,
}

impl LedgerDb {
    /// Open or create the ledger database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DrpError> {
        let db = sled::open(path).map_err(storage_err)?;
        let decisions = db.open_tree("decision_records").map_err(storage_err)?;
        let disputes = db.open_tree("disputes").map_err(storage_err)?;
        Ok(Self {
            _db: db,
            decisions,
            disputes,
        })
    }

    // ── Decision records ─────────────────────────────────────────────────────

    /// Insert a finalized record if its id is not already present.
    ///
    /// Returns `true` when the record was written, `false` when an entry
    /// already existed (the write is a no-op; records are immutable).
    pub fn insert_decision_if_absent(&self, record: &DecisionRecord) -> Result<bool, DrpError> {
        let bytes = bincode::serialize(record).map_err(codec_err)?;
        let prev = self
            .decisions
            .compare_and_swap(
                record.decision_id.as_bytes(),
                None as Option<&[u8]>,
                Some(bytes),
            )
            .map_err(storage_err)?;
        Ok(prev.is_ok())
    }

    pub fn get_decision(&self, decision_id: &str) -> Result<Option<DecisionRecord>, DrpError> {
        match self
            .decisions
            .get(decision_id.as_bytes())
            .map_err(storage_err)?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(codec_err)?)),
            None => Ok(None),
        }
    }

    pub fn decision_exists(&self, decision_id: &str) -> bool {
        self.decisions
            .contains_key(decision_id.as_bytes())
            .unwrap_or(false)
    }

    /// Every decision record in the DB (no filter).
    pub fn iter_decisions(&self) -> Result<Vec<DecisionRecord>, DrpError> {
        let mut out = Vec::new();
        for item in self.decisions.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(bincode::deserialize(&bytes).map_err(codec_err)?);
        }
        Ok(out)
    }

    pub fn count_decisions(&self) -> u64 {
        self.decisions.len() as u64
    }

    // ── Disputes ─────────────────────────────────────────────────────────────

    pub fn put_dispute(&self, dispute: &DisputeCase) -> Result<(), DrpError> {
        let bytes = bincode::serialize(dispute).map_err(codec_err)?;
        self.disputes
            .insert(dispute.dispute_id.as_bytes(), bytes)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn get_dispute(&self, dispute_id: &str) -> Result<Option<DisputeCase>, DrpError> {
        match self
            .disputes
            .get(dispute_id.as_bytes())
            .map_err(storage_err)?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(codec_err)?)),
            None => Ok(None),
        }
    }

    pub fn iter_disputes(&self) -> Result<Vec<DisputeCase>, DrpError> {
        let mut out = Vec::new();
        for item in self.disputes.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(bincode::deserialize(&bytes).map_err(codec_err)?);
        }
        Ok(out)
    }

    pub fn iter_disputes_by_status(
        &self,
        status: DisputeStatus,
    ) -> Result<Vec<DisputeCase>, DrpError> {
        Ok(self
            .iter_disputes()?
            .into_iter()
            .filter(|d| d.status == status)
            .collect())
    }

    pub fn count_disputes(&self) -> u64 {
        self.disputes.len() as u64
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), DrpError> {
        self._db.flush().map_err(storage_err)?;
        Ok(())
    }
}
