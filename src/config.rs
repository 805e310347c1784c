//! Engine configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Run the prototype cycle check for `RecordKind::Instance` records too.
    ///
    /// Instances are never referenced as prototypes by other records, so a
    /// host may turn this off. Self-reference is rejected regardless.
    pub instance_cycle_check: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            instance_cycle_check: true,
        }
    }
}
