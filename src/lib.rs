//! Prototype-inheritance override engine.
//!
//! Records declare another record of the same schema as their prototype and
//! inherit every field they do not override locally. The [`Session`] keeps the
//! prototype forest indexed, accepts records in any registration order, and
//! pushes every change down to the descendants that inherit it.

pub mod config;
pub mod doc;
pub mod error;
pub mod hierarchy;
pub mod overrides;
pub mod path;
pub mod record;
pub mod render;
pub mod resolve;
pub mod schema;
pub mod session;
pub mod view;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use hierarchy::{Hierarchy, LinkState, NodeId};
pub use overrides::OverrideSet;
pub use path::FieldPath;
pub use record::{Record, RecordId, RecordKind};
pub use schema::{FieldKind, ScalarKind, Schema};
pub use session::{HierarchyEvent, RebuildReport, Session};
