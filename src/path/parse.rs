use crate::error::{EngineError, Result};
use crate::path::{FieldPath, Segment};

use regex::Regex;

// One dot-separated component: a field name followed by zero or more `[n]`.
// Capture:
// 1) name
// 2) trailing index groups, e.g. "[0][3]"
const COMPONENT_RE: &str = r"^([A-Za-z_][A-Za-z0-9_]*)((?:\[\d+\])*)$";
const INDEX_RE: &str = r"\[(\d+)\]";

/// Parse "items[2].name" into [Field("items"), Index(2), Field("name")].
///
/// The empty string is the root path.
pub fn parse_path(s: &str) -> Result<FieldPath> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(FieldPath::root());
    }

    let component_re = Regex::new(COMPONENT_RE).map_err(|e| invalid(s, e.to_string()))?;
    let index_re = Regex::new(INDEX_RE).map_err(|e| invalid(s, e.to_string()))?;

    let mut segments = Vec::new();
    for component in s.split('.') {
        let caps = component_re
            .captures(component)
            .ok_or_else(|| invalid(s, format!("cannot parse component {:?}", component)))?;

        segments.push(Segment::Field(caps[1].to_string()));

        for idx in index_re.captures_iter(&caps[2]) {
            let i = idx[1]
                .parse::<usize>()
                .map_err(|e| invalid(s, format!("bad index {}: {}", &idx[1], e)))?;
            segments.push(Segment::Index(i));
        }
    }

    Ok(FieldPath::from_segments(segments))
}

fn invalid(path: &str, reason: String) -> EngineError {
    EngineError::InvalidPath {
        path: path.to_string(),
        reason,
    }
}
