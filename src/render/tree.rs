use crate::hierarchy::{Hierarchy, NodeId};

use std::fmt::Write;

const INDENT: &str = "    ";

/// Render the prototype forest, one record per line, children indented under
/// their prototype. Records waiting for an unregistered prototype are listed
/// under a `pending` header for that id.
///
/// Example:
/// base (Enemy) [1 overridden]
///     grunt (Enemy)
///         grunt_red (Enemy) [2 overridden]
/// pending 'boss_base':
///     boss (Enemy)
pub fn render_tree(h: &Hierarchy) -> String {
    let mut out = String::new();

    let mut roots: Vec<NodeId> = h.roots().collect();
    roots.sort_by(|a, b| h.record(*a).id.cmp(&h.record(*b).id));
    for root in roots {
        write_subtree(h, root, 0, &mut out);
    }

    for (missing, waiting) in h.pending() {
        let _ = writeln!(out, "pending '{}':", missing);
        for node in waiting {
            write_subtree(h, node, 1, &mut out);
        }
    }
    out
}

fn write_subtree(h: &Hierarchy, node: NodeId, depth: usize, out: &mut String) {
    let record = h.record(node);
    let _ = write!(
        out,
        "{}{} ({})",
        INDENT.repeat(depth),
        record.id,
        record.schema.name()
    );
    if !record.overrides.is_empty() {
        let _ = write!(out, " [{} overridden]", record.overrides.len());
    }
    out.push('\n');

    let mut children: Vec<NodeId> = h.node(node).children().collect();
    children.sort_by(|a, b| h.record(*a).id.cmp(&h.record(*b).id));
    for child in children {
        write_subtree(h, child, depth + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use crate::schema::{FieldKind, ScalarKind, Schema};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn renders_forest_and_pending() {
        let schema = Arc::new(
            Schema::new("Enemy").with_field("hp", FieldKind::Scalar(ScalarKind::Int)),
        );
        let mut h = Hierarchy::default();
        h.insert(Record::new("grunt_red", schema.clone()).with_prototype("grunt"))
            .unwrap();
        h.insert(Record::new("boss", schema.clone()).with_prototype("boss_base"))
            .unwrap();
        h.insert(Record::new("grunt", schema.clone()).with_prototype("base"))
            .unwrap();
        h.insert(
            Record::new("base", schema.clone())
                .with_local("hp", json!(5))
                .unwrap(),
        )
        .unwrap();

        assert_eq!(
            render_tree(&h),
            "base (Enemy) [1 overridden]\n\
             \x20   grunt (Enemy)\n\
             \x20       grunt_red (Enemy)\n\
             pending 'boss_base':\n\
             \x20   boss (Enemy)\n"
        );
    }
}
