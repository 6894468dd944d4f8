use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::taxonomy::{sort_nodes, Field, FieldNode, SubField};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFieldInterest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub field_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// An interest joined with its field and, for subfields, the parent field.
#[derive(Debug, Clone)]
pub struct InterestRow {
    pub field: Field,
    pub parent: Option<Field>,
}

/// Group a user's interests under their top-level field. A parent shows up
/// once even when only its subfields were selected.
pub fn nest_interests(rows: &[InterestRow]) -> Vec<FieldNode> {
    let mut nodes: Vec<FieldNode> = Vec::new();
    let mut index: HashMap<Uuid, usize> = HashMap::new();

    for row in rows {
        let top = row.parent.as_ref().unwrap_or(&row.field);
        let slot = *index.entry(top.id).or_insert_with(|| {
            nodes.push(FieldNode::from(top));
            nodes.len() - 1
        });

        if row.parent.is_some() {
            let node = &mut nodes[slot];
            if !node.subfields.iter().any(|s| s.id == row.field.id) {
                node.subfields.push(SubField::from(&row.field));
            }
        }
    }

    sort_nodes(&mut nodes);
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(code: &str, sort_order: Option<i32>, parent: Option<&Field>) -> Field {
        Field {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: code.to_uppercase(),
            sort_order,
            parent_id: parent.map(|p| p.id),
        }
    }

    fn row(field: &Field, parent: Option<&Field>) -> InterestRow {
        InterestRow {
            field: field.clone(),
            parent: parent.cloned(),
        }
    }

    #[test]
    fn test_subfield_interests_grouped_under_parent() {
        let cs = field("cs", Some(1), None);
        let ai = field("cs.ai", Some(2), Some(&cs));
        let lg = field("cs.lg", Some(1), Some(&cs));

        let rows = vec![
            row(&ai, Some(&cs)),
            row(&lg, Some(&cs)),
        ];

        let nested = nest_interests(&rows);
        assert_eq!(nested.len(), 1);
        assert_eq!(nested[0].id, cs.id);
        let subs: Vec<Uuid> = nested[0].subfields.iter().map(|s| s.id).collect();
        assert_eq!(subs, vec![lg.id, ai.id]);
    }

    #[test]
    fn test_top_level_and_subfield_interest_do_not_duplicate_parent() {
        let physics = field("physics", Some(3), None);
        let math = field("math", Some(1), None);
        let ag = field("math.ag", None, Some(&math));

        let rows = vec![
            row(&ag, Some(&math)),
            row(&physics, None),
            row(&math, None),
        ];

        let nested = nest_interests(&rows);
        let codes: Vec<&str> = nested.iter().map(|n| n.code.as_str()).collect();
        assert_eq!(codes, vec!["math", "physics"]);
        assert_eq!(nested[0].subfields.len(), 1);
        assert!(nested[1].subfields.is_empty());
    }

    #[test]
    fn test_no_interests() {
        assert!(nest_interests(&[]).is_empty());
    }
}
