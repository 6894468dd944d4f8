//! arXiv metadata records and identifier helpers used by ingestion.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{NewAuthor, NewPaper};

lazy_static! {
    // https://arxiv.org/abs/1234.56789v2, https://arxiv.org/pdf/1234.56789v1.pdf
    static ref ARXIV_URL_RE: Regex =
        Regex::new(r"arxiv\.org/(?:abs|pdf)/(?P<id>\d{4}\.\d{5})(?:v(?P<v>\d+))?").unwrap();
}

/// Extract `(arxiv_id, version)` from an abs/pdf URL, trying `fallback` when
/// the URL does not match. Version defaults to 1.
pub fn parse_arxiv_id_and_version(url: Option<&str>, fallback: Option<&str>) -> (String, i32) {
    for candidate in [url, fallback].into_iter().flatten() {
        if let Some(caps) = ARXIV_URL_RE.captures(candidate) {
            let id = caps["id"].to_string();
            let version = caps
                .name("v")
                .and_then(|v| v.as_str().parse().ok())
                .unwrap_or(1);
            return (id, version);
        }
    }
    (fallback.unwrap_or("unknown").to_string(), 1)
}

/// Split an arXiv category into its archive and, when present, the full
/// subject class: `cs.AI` -> (`cs`, Some(`cs.AI`)), `hep-th` -> (`hep-th`, None).
pub fn split_category(category: &str) -> (&str, Option<&str>) {
    match category.split_once('.') {
        Some((archive, _)) if !archive.is_empty() => (archive, Some(category)),
        _ => (category, None),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArxivAuthor {
    pub name: String,
    #[serde(default)]
    pub affiliation: Option<String>,
}

/// One paper's metadata as exported by the arXiv API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArxivRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub abs_url: Option<String>,
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub authors: Vec<ArxivAuthor>,
    #[serde(default)]
    pub primary_category: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub pdf_url: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl ArxivRecord {
    pub fn identifier(&self) -> (String, i32) {
        parse_arxiv_id_and_version(self.abs_url.as_deref(), self.id.as_deref())
    }

    /// Paper row for this record; taxonomy ids are resolved by the caller.
    pub fn to_new_paper(&self) -> NewPaper {
        let (arxiv_id, version) = self.identifier();
        NewPaper {
            title: collapse_whitespace(&self.title),
            abstract_text: self.summary.as_deref().map(collapse_whitespace),
            doi: self.doi.clone(),
            arxiv_id: Some(arxiv_id),
            arxiv_version: Some(version),
            primary_category: self.primary_category.clone(),
            categories: self.categories.clone(),
            pdf_url: self.pdf_url.clone(),
            published_date: self.published,
            updated_date: self.updated,
            status: Some("ingested".to_string()),
            primary_field_id: None,
            primary_subfield_id: None,
        }
    }

    pub fn to_new_authors(&self) -> Vec<NewAuthor> {
        self.authors
            .iter()
            .filter(|a| !a.name.trim().is_empty())
            .map(|a| NewAuthor {
                name: a.name.trim().to_string(),
                affiliation: a
                    .affiliation
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
                ..Default::default()
            })
            .collect()
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
