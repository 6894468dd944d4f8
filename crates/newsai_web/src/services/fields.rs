use newsai_core::{build_field_tree, FieldNode, Storage};

use crate::ApiError;

/// The whole taxonomy: top-level fields with their subfields nested.
pub async fn field_tree(storage: &dyn Storage) -> Result<Vec<FieldNode>, ApiError> {
    let top_level = storage.top_level_fields().await?;
    if top_level.is_empty() {
        return Ok(Vec::new());
    }
    let parent_ids: Vec<_> = top_level.iter().map(|f| f.id).collect();
    let subfields = storage.subfields_of(&parent_ids).await?;
    Ok(build_field_tree(&top_level, &subfields))
}
