use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A node of the subject taxonomy, e.g. Computer Science (field) ->
/// Artificial Intelligence (subfield). Top-level fields have no parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub sort_order: Option<i32>,
    pub parent_id: Option<Uuid>,
}

impl Field {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewField {
    pub code: String,
    pub name: String,
    pub sort_order: Option<i32>,
    pub parent_id: Option<Uuid>,
}

impl NewField {
    pub fn top_level(code: &str, name: &str, sort_order: Option<i32>) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            sort_order,
            parent_id: None,
        }
    }

    pub fn child_of(parent: &Field, code: &str, name: &str, sort_order: Option<i32>) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            sort_order,
            parent_id: Some(parent.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubField {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldNode {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub sort_order: Option<i32>,
    #[serde(default)]
    pub subfields: Vec<SubField>,
}

impl From<&Field> for SubField {
    fn from(field: &Field) -> Self {
        Self {
            id: field.id,
            code: field.code.clone(),
            name: field.name.clone(),
            sort_order: field.sort_order,
        }
    }
}

impl From<&Field> for FieldNode {
    fn from(field: &Field) -> Self {
        Self {
            id: field.id,
            code: field.code.clone(),
            name: field.name.clone(),
            sort_order: field.sort_order,
            subfields: Vec::new(),
        }
    }
}

/// Display order: `sort_order` ascending with unset values last, then name.
pub fn display_order(a: (Option<i32>, &str), b: (Option<i32>, &str)) -> Ordering {
    match (a.0, b.0) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.1.cmp(b.1))
}

pub fn sort_fields(fields: &mut [Field]) {
    fields.sort_by(|a, b| display_order((a.sort_order, &a.name), (b.sort_order, &b.name)));
}

pub(crate) fn sort_nodes(nodes: &mut [FieldNode]) {
    for node in nodes.iter_mut() {
        node.subfields
            .sort_by(|a, b| display_order((a.sort_order, &a.name), (b.sort_order, &b.name)));
    }
    nodes.sort_by(|a, b| display_order((a.sort_order, &a.name), (b.sort_order, &b.name)));
}

/// Assemble the two-level taxonomy tree. Subfields whose parent is not among
/// `top_level` are dropped.
pub fn build_field_tree(top_level: &[Field], subfields: &[Field]) -> Vec<FieldNode> {
    let mut nodes: Vec<FieldNode> = top_level.iter().map(FieldNode::from).collect();
    let index: HashMap<Uuid, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.id, i))
        .collect();

    for sub in subfields {
        let Some(parent_id) = sub.parent_id else {
            continue;
        };
        if let Some(&i) = index.get(&parent_id) {
            nodes[i].subfields.push(SubField::from(sub));
        }
    }

    sort_nodes(&mut nodes);
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(code: &str, name: &str, sort_order: Option<i32>, parent: Option<&Field>) -> Field {
        Field {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: name.to_string(),
            sort_order,
            parent_id: parent.map(|p| p.id),
        }
    }

    #[test]
    fn test_build_field_tree_orders_both_levels() {
        let physics = field("physics", "Physics", None, None);
        let cs = field("cs", "Computer Science", Some(2), None);
        let math = field("math", "Mathematics", Some(1), None);

        let ai = field("cs.AI", "Artificial Intelligence", None, Some(&cs));
        let cl = field("cs.CL", "Computation and Language", Some(1), Some(&cs));
        let lg = field("cs.LG", "Machine Learning", None, Some(&cs));

        let tree = build_field_tree(
            &[physics.clone(), cs.clone(), math.clone()],
            &[lg.clone(), ai.clone(), cl.clone()],
        );

        let codes: Vec<&str> = tree.iter().map(|n| n.code.as_str()).collect();
        assert_eq!(codes, vec!["math", "cs", "physics"]);

        let sub_codes: Vec<&str> = tree[1].subfields.iter().map(|s| s.code.as_str()).collect();
        assert_eq!(sub_codes, vec!["cs.CL", "cs.AI", "cs.LG"]);
        assert!(tree[0].subfields.is_empty());
    }

    #[test]
    fn test_build_field_tree_drops_orphans() {
        let cs = field("cs", "Computer Science", None, None);
        let stray_parent = field("bio", "Biology", None, None);
        let orphan = field("q-bio.GN", "Genomics", None, Some(&stray_parent));

        let tree = build_field_tree(&[cs], &[orphan]);
        assert_eq!(tree.len(), 1);
        assert!(tree[0].subfields.is_empty());
    }

    #[test]
    fn test_build_field_tree_empty() {
        assert!(build_field_tree(&[], &[]).is_empty());
    }

    #[test]
    fn test_field_node_serializes_sort_order_null() {
        let cs = field("cs", "Computer Science", None, None);
        let value = serde_json::to_value(FieldNode::from(&cs)).unwrap();
        assert!(value["sort_order"].is_null());
        assert_eq!(value["subfields"], serde_json::json!([]));
    }
}
