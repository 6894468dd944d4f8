use newsai_core::{ArticleDetail, Error, PaperSummary, Storage};

use crate::ApiError;

/// An article with its paper, credited authors and ordered blocks.
pub async fn article_detail(storage: &dyn Storage, slug: &str) -> Result<ArticleDetail, ApiError> {
    let article = storage
        .article_by_slug(slug)
        .await?
        .ok_or_else(|| ApiError::ArticleNotFound(format!("Article '{}' not found", slug)))?;

    let paper = storage
        .paper_by_id(article.paper_id)
        .await?
        .ok_or_else(|| {
            Error::NotFound(format!(
                "paper {} of article {}",
                article.paper_id, article.id
            ))
        })?;
    let authors = storage.authors_of(paper.id).await?;
    let blocks = storage.blocks_of(article.id).await?;

    Ok(ArticleDetail::assemble(
        article,
        PaperSummary::from(&paper),
        authors,
        &blocks,
    ))
}
