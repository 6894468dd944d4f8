use std::path::Path;

use newsai_core::arxiv::{split_category, ArxivRecord};
use newsai_core::prelude::*;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub papers: Vec<Uuid>,
    pub authors_linked: usize,
    pub unmapped_categories: usize,
    pub failed: usize,
}

/// Accepts either a JSON array of records or one record per line.
pub fn parse_records(text: &str) -> Result<Vec<ArxivRecord>> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }
    trimmed
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .map_err(|e| Error::Validation(format!("line {}: {}", i + 1, e)))
        })
        .collect()
}

pub async fn load_records(path: &Path) -> Result<Vec<ArxivRecord>> {
    let text = tokio::fs::read_to_string(path).await?;
    parse_records(&text)
}

/// Field and subfield ids for an arXiv category, when the taxonomy knows them.
async fn resolve_category(
    storage: &dyn Storage,
    category: &str,
) -> Result<(Option<Field>, Option<Field>)> {
    let (archive, subject) = split_category(category);
    let Some(field) = storage.field_by_code(None, archive).await? else {
        return Ok((None, None));
    };
    let subfield = match subject {
        Some(code) => storage.field_by_code(Some(field.id), code).await?,
        None => None,
    };
    Ok((Some(field), subfield))
}

async fn ingest_one(
    storage: &dyn Storage,
    record: &ArxivRecord,
    report: &mut IngestReport,
) -> Result<Paper> {
    let mut new_paper = record.to_new_paper();
    if let Some(category) = record.primary_category.as_deref() {
        let (field, subfield) = resolve_category(storage, category).await?;
        if field.is_none() {
            report.unmapped_categories += 1;
            debug!(category = %category, "No taxonomy entry for category");
        }
        new_paper.primary_field_id = field.map(|f| f.id);
        new_paper.primary_subfield_id = subfield.map(|f| f.id);
    }
    let paper = storage.upsert_paper(&new_paper).await?;

    for (i, author) in record.to_new_authors().iter().enumerate() {
        let profile = storage.upsert_author(author).await?;
        let link = PaperAuthor {
            paper_id: paper.id,
            author_id: profile.id,
            author_order: i as i32 + 1,
            corresponding: false,
        };
        match storage.link_author(&link).await {
            Ok(()) => report.authors_linked += 1,
            Err(Error::Duplicate(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(paper)
}

/// Store every record, skipping the ones that fail.
pub async fn ingest(storage: &dyn Storage, records: &[ArxivRecord]) -> IngestReport {
    let mut report = IngestReport::default();
    for record in records {
        match ingest_one(storage, record, &mut report).await {
            Ok(paper) => {
                report.papers.push(paper.id);
                debug!(paper_id = %paper.id, arxiv_id = ?paper.arxiv_id, "Ingested paper");
            }
            Err(e) => {
                report.failed += 1;
                warn!(title = %record.title, error = %e, "Failed to ingest record");
            }
        }
    }
    info!(
        papers = report.papers.len(),
        authors_linked = report.authors_linked,
        unmapped_categories = report.unmapped_categories,
        failed = report.failed,
        "Ingest finished"
    );
    report
}
