use super::cache_key::CacheKey;
use super::error::EngineError;
use crate::core::models::ids::ChainId;
use crate::core::models::sequence::SequenceRecord;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkStatus {
    Pending,
    CacheHit,
    Computing,
    Done,
    Failed,
}

impl WorkStatus {
    /// Whether the chain's features are available for assembly.
    pub fn is_resolved(&self) -> bool {
        matches!(self, WorkStatus::CacheHit | WorkStatus::Done)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkStatus::CacheHit | WorkStatus::Done | WorkStatus::Failed
        )
    }

    fn can_become(&self, next: WorkStatus) -> bool {
        matches!(
            (self, next),
            (WorkStatus::Pending, WorkStatus::CacheHit)
                | (WorkStatus::Pending, WorkStatus::Computing)
                | (WorkStatus::Computing, WorkStatus::Done)
                | (WorkStatus::Computing, WorkStatus::Failed)
        )
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WorkStatus::Pending => "pending",
            WorkStatus::CacheHit => "cache-hit",
            WorkStatus::Computing => "computing",
            WorkStatus::Done => "done",
            WorkStatus::Failed => "failed",
        })
    }
}

/// One chain's unit of scheduling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub entity: SequenceRecord,
    pub cache_key: CacheKey,
    status: WorkStatus,
}

impl WorkItem {
    pub fn new(entity: SequenceRecord, cache_key: CacheKey) -> Self {
        Self {
            entity,
            cache_key,
            status: WorkStatus::Pending,
        }
    }

    pub fn status(&self) -> WorkStatus {
        self.status
    }

    pub fn advance(&mut self, next: WorkStatus) -> Result<(), EngineError> {
        if !self.status.can_become(next) {
            return Err(EngineError::Internal(format!(
                "chain {} cannot move from {} to {next}",
                self.entity.id, self.status
            )));
        }
        self.status = next;
        Ok(())
    }
}

/// Every work item of a run, keyed and ordered by chain id.
#[derive(Debug, Default)]
pub struct WorkLedger {
    items: BTreeMap<ChainId, WorkItem>,
}

impl WorkLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item: WorkItem) -> Result<(), EngineError> {
        let id = item.entity.id;
        if self.items.insert(id, item).is_some() {
            return Err(EngineError::Internal(format!(
                "chain {id} was scheduled twice"
            )));
        }
        Ok(())
    }

    pub fn advance(&mut self, chain_id: ChainId, next: WorkStatus) -> Result<(), EngineError> {
        self.items
            .get_mut(&chain_id)
            .ok_or_else(|| EngineError::Internal(format!("chain {chain_id} is not scheduled")))?
            .advance(next)
    }

    pub fn status(&self, chain_id: ChainId) -> Option<WorkStatus> {
        self.items.get(&chain_id).map(WorkItem::status)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn all_terminal(&self) -> bool {
        self.items.values().all(|item| item.status().is_terminal())
    }

    pub fn all_resolved(&self) -> bool {
        self.items.values().all(|item| item.status().is_resolved())
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkItem> {
        self.items.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::engine::cache_key::{KeyTier, RunParameters, resolve};

    fn item(index: usize) -> WorkItem {
        let params = RunParameters {
            use_small_bfd: false,
            max_template_date: "2022-01-01".into(),
            uniref_max_hits: 1,
            mgnify_max_hits: 1,
            uniprot_max_hits: 1,
            skip_search: None,
        };
        let record = SequenceRecord::new(ChainId::from_index(index).unwrap(), "MKV", "");
        WorkItem::new(record, resolve(&params, "MKV", KeyTier::Primary))
    }

    #[test]
    fn allowed_transitions() {
        let mut hit = item(0);
        hit.advance(WorkStatus::CacheHit).unwrap();
        assert!(hit.status().is_resolved());

        let mut computed = item(1);
        computed.advance(WorkStatus::Computing).unwrap();
        assert!(!computed.status().is_terminal());
        computed.advance(WorkStatus::Done).unwrap();
        assert!(computed.status().is_resolved());

        let mut failed = item(2);
        failed.advance(WorkStatus::Computing).unwrap();
        failed.advance(WorkStatus::Failed).unwrap();
        assert!(failed.status().is_terminal());
        assert!(!failed.status().is_resolved());
    }

    #[test]
    fn forbidden_transitions_are_internal_errors() {
        let mut pending = item(0);
        assert!(matches!(
            pending.advance(WorkStatus::Done),
            Err(EngineError::Internal(_))
        ));
        pending.advance(WorkStatus::CacheHit).unwrap();
        assert!(pending.advance(WorkStatus::Computing).is_err());
    }

    #[test]
    fn ledger_tracks_every_chain_once() {
        let mut ledger = WorkLedger::new();
        ledger.insert(item(0)).unwrap();
        ledger.insert(item(1)).unwrap();
        assert!(ledger.insert(item(1)).is_err());

        let a = ChainId::from_index(0).unwrap();
        let b = ChainId::from_index(1).unwrap();
        ledger.advance(a, WorkStatus::CacheHit).unwrap();
        assert!(!ledger.all_terminal());
        ledger.advance(b, WorkStatus::Computing).unwrap();
        ledger.advance(b, WorkStatus::Done).unwrap();
        assert!(ledger.all_terminal());
        assert!(ledger.all_resolved());
        assert_eq!(ledger.status(b), Some(WorkStatus::Done));
    }
}
