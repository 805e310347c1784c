use crate::error::{EngineError, Result};
use crate::hierarchy::Hierarchy;
use crate::record::{RecordId, RecordKind};

use std::collections::BTreeSet;

impl Hierarchy {
    /// Check that `record` may declare `candidate` as its prototype.
    ///
    /// Walks the declared chain starting at `candidate`. Declared prototypes
    /// are followed even when still pending, so a loop through records that
    /// wait on each other is caught as soon as it would close. The walk ends
    /// at a record with no prototype or at an id that is not registered.
    ///
    /// With `instance_cycle_check` off, instances skip the walk, so no record
    /// may inherit from an instance: nothing can then close a loop through one.
    pub fn validate_assignment(
        &self,
        record: &RecordId,
        candidate: Option<&RecordId>,
        kind: RecordKind,
    ) -> Result<()> {
        let Some(candidate) = candidate else {
            return Ok(());
        };
        if candidate == record {
            return Err(EngineError::SelfReference(record.clone()));
        }
        if !self.config().instance_cycle_check {
            if let Some(proto) = self.get(candidate) {
                if proto.kind == RecordKind::Instance {
                    return Err(EngineError::InstancePrototype {
                        record: record.clone(),
                        prototype: candidate.clone(),
                    });
                }
            }
            if kind == RecordKind::Instance {
                return Ok(());
            }
        }

        let mut chain = Vec::new();
        let mut seen = BTreeSet::new();
        let mut cur = Some(candidate.clone());
        while let Some(id) = cur {
            chain.push(id.clone());
            if id == *record || !seen.insert(id.clone()) {
                return Err(EngineError::CycleDetected {
                    record: record.clone(),
                    chain,
                });
            }
            cur = self.get(&id).and_then(|r| r.prototype.clone());
        }
        Ok(())
    }
}
