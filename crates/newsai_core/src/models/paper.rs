use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub doi: Option<String>,
    pub arxiv_id: Option<String>,
    pub arxiv_version: Option<i32>,
    pub primary_category: Option<String>,
    pub categories: Vec<String>,
    pub pdf_url: Option<String>,
    pub published_date: Option<DateTime<Utc>>,
    pub updated_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub primary_field_id: Option<Uuid>,
    pub primary_subfield_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPaper {
    pub title: String,
    pub abstract_text: Option<String>,
    pub doi: Option<String>,
    pub arxiv_id: Option<String>,
    pub arxiv_version: Option<i32>,
    pub primary_category: Option<String>,
    pub categories: Vec<String>,
    pub pdf_url: Option<String>,
    pub published_date: Option<DateTime<Utc>>,
    pub updated_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub primary_field_id: Option<Uuid>,
    pub primary_subfield_id: Option<Uuid>,
}

impl NewPaper {
    pub fn into_paper(self, id: Uuid, now: DateTime<Utc>) -> Paper {
        Paper {
            id,
            title: self.title,
            abstract_text: self.abstract_text,
            doi: self.doi,
            arxiv_id: self.arxiv_id,
            arxiv_version: self.arxiv_version,
            primary_category: self.primary_category,
            categories: self.categories,
            pdf_url: self.pdf_url,
            published_date: self.published_date,
            updated_date: self.updated_date,
            status: self.status,
            primary_field_id: self.primary_field_id,
            primary_subfield_id: self.primary_subfield_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The slice of a paper embedded in article responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperSummary {
    pub id: Uuid,
    pub title: String,
    pub arxiv_id: Option<String>,
    pub doi: Option<String>,
    pub pdf_url: Option<String>,
    pub primary_category: Option<String>,
    pub published_date: Option<DateTime<Utc>>,
}

impl From<&Paper> for PaperSummary {
    fn from(paper: &Paper) -> Self {
        Self {
            id: paper.id,
            title: paper.title.clone(),
            arxiv_id: paper.arxiv_id.clone(),
            doi: paper.doi.clone(),
            pdf_url: paper.pdf_url.clone(),
            primary_category: paper.primary_category.clone(),
            published_date: paper.published_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorProfile {
    pub id: Uuid,
    pub name: String,
    pub affiliation: Option<String>,
    pub email: Option<String>,
    pub orcid: Option<String>,
    pub website: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAuthor {
    pub name: String,
    pub affiliation: Option<String>,
    pub email: Option<String>,
    pub orcid: Option<String>,
    pub website: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperAuthor {
    pub paper_id: Uuid,
    pub author_id: Uuid,
    pub author_order: i32,
    pub corresponding: bool,
}

/// An author as listed on a specific paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditedAuthor {
    pub id: Uuid,
    pub name: String,
    pub affiliation: Option<String>,
    pub author_order: i32,
    pub corresponding: bool,
}

impl CreditedAuthor {
    pub fn new(link: &PaperAuthor, author: &AuthorProfile) -> Self {
        Self {
            id: author.id,
            name: author.name.clone(),
            affiliation: author.affiliation.clone(),
            author_order: link.author_order,
            corresponding: link.corresponding,
        }
    }
}
