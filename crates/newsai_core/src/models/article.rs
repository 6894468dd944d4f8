use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::paper::{CreditedAuthor, PaperSummary};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Title,
    Paragraph,
    Subheading,
    Quote,
    Image,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Paragraph => "paragraph",
            Self::Subheading => "subheading",
            Self::Quote => "quote",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "title" => Ok(Self::Title),
            "paragraph" => Ok(Self::Paragraph),
            "subheading" => Ok(Self::Subheading),
            "quote" => Ok(Self::Quote),
            "image" => Ok(Self::Image),
            other => Err(Error::Validation(format!("unknown block type: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub paper_id: Uuid,
    pub title: String,
    pub slug: String,
    pub status: Option<String>,
    pub featured_image_url: Option<String>,
    pub is_edited: bool,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewArticle {
    pub paper_id: Uuid,
    pub title: String,
    pub slug: String,
    pub status: Option<String>,
    pub featured_image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleBlock {
    pub id: Uuid,
    pub article_id: Uuid,
    pub block_type: BlockType,
    pub content: Option<String>,
    pub order_index: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBlock {
    pub block_type: BlockType,
    pub content: Option<String>,
    pub order_index: i32,
}

impl NewBlock {
    pub fn new(block_type: BlockType, content: &str, order_index: i32) -> Self {
        Self {
            block_type,
            content: Some(content.to_string()),
            order_index,
        }
    }
}

/// Positions within one article must be distinct.
pub fn validate_blocks(blocks: &[NewBlock]) -> Result<()> {
    let mut seen = HashSet::with_capacity(blocks.len());
    for block in blocks {
        if !seen.insert(block.order_index) {
            return Err(Error::Duplicate(format!(
                "block order_index {} used twice",
                block.order_index
            )));
        }
    }
    Ok(())
}

pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockView {
    pub block_type: BlockType,
    pub content: Option<String>,
    pub order_index: i32,
}

impl From<&ArticleBlock> for BlockView {
    fn from(block: &ArticleBlock) -> Self {
        Self {
            block_type: block.block_type,
            content: block.content.clone(),
            order_index: block.order_index,
        }
    }
}

/// Everything a reader needs to render an article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleDetail {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub status: Option<String>,
    pub featured_image_url: Option<String>,
    pub is_edited: bool,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paper: PaperSummary,
    pub authors: Vec<CreditedAuthor>,
    pub blocks: Vec<BlockView>,
}

impl ArticleDetail {
    pub fn assemble(
        article: Article,
        paper: PaperSummary,
        authors: Vec<CreditedAuthor>,
        blocks: &[ArticleBlock],
    ) -> Self {
        let mut blocks: Vec<BlockView> = blocks.iter().map(BlockView::from).collect();
        blocks.sort_by_key(|b| b.order_index);
        Self {
            id: article.id,
            slug: article.slug,
            title: article.title,
            status: article.status,
            featured_image_url: article.featured_image_url,
            is_edited: article.is_edited,
            view_count: article.view_count,
            created_at: article.created_at,
            updated_at: article.updated_at,
            paper,
            authors,
            blocks,
        }
    }
}
