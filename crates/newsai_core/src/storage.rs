use async_trait::async_trait;
use uuid::Uuid;

use crate::models::*;
use crate::Result;

#[async_trait]
pub trait FieldStore: Send + Sync {
    /// Insert a field. A subfield's parent must itself be top-level.
    async fn insert_field(&self, field: &NewField) -> Result<Field>;

    async fn field_by_id(&self, id: Uuid) -> Result<Option<Field>>;

    async fn field_by_code(&self, parent_id: Option<Uuid>, code: &str) -> Result<Option<Field>>;

    /// Fields without a parent, in display order.
    async fn top_level_fields(&self) -> Result<Vec<Field>>;

    /// Children of any of `parent_ids`, in display order.
    async fn subfields_of(&self, parent_ids: &[Uuid]) -> Result<Vec<Field>>;
}

#[async_trait]
pub trait InterestStore: Send + Sync {
    async fn list_interests(&self, user_id: Uuid) -> Result<Vec<InterestRow>>;

    /// Fails with `Duplicate` when already present and `InvalidReference`
    /// when the user or field does not exist.
    async fn add_interest(&self, user_id: Uuid, field_id: Uuid) -> Result<UserFieldInterest>;

    /// Returns whether a row was removed.
    async fn remove_interest(&self, user_id: Uuid, field_id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait PaperStore: Send + Sync {
    /// Insert or update keyed on `arxiv_id`; papers without one are always inserted.
    async fn upsert_paper(&self, paper: &NewPaper) -> Result<Paper>;

    async fn paper_by_id(&self, id: Uuid) -> Result<Option<Paper>>;

    /// Matches an existing profile by ORCID when given, otherwise by name.
    async fn upsert_author(&self, author: &NewAuthor) -> Result<AuthorProfile>;

    async fn link_author(&self, link: &PaperAuthor) -> Result<()>;

    /// Authors of a paper in credit order.
    async fn authors_of(&self, paper_id: Uuid) -> Result<Vec<CreditedAuthor>>;
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert an article together with its blocks, all or nothing.
    async fn insert_article(&self, article: &NewArticle, blocks: &[NewBlock]) -> Result<Article>;

    async fn article_by_slug(&self, slug: &str) -> Result<Option<Article>>;

    /// Blocks ordered by `order_index`.
    async fn blocks_of(&self, article_id: Uuid) -> Result<Vec<ArticleBlock>>;
}

#[async_trait]
pub trait PromptStore: Send + Sync {
    async fn insert_prompt(&self, prompt: &NewPrompt) -> Result<Prompt>;

    async fn prompt_by_name(&self, name: &str) -> Result<Option<Prompt>>;

    async fn attach_prompt(&self, article_id: Uuid, prompt_id: Uuid) -> Result<ArticlePrompt>;

    async fn prompts_for_article(&self, article_id: Uuid) -> Result<Vec<Prompt>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Get or create a role by name.
    async fn ensure_role(&self, name: &str, description: Option<&str>) -> Result<Role>;

    /// Get or create a permission by name.
    async fn ensure_permission(
        &self,
        name: &str,
        resource: Option<&str>,
        action: Option<&str>,
    ) -> Result<Permission>;

    /// Idempotent.
    async fn grant_permission(&self, role_id: Uuid, permission_id: Uuid) -> Result<()>;

    /// Create a user and assign the named roles. Unknown role names are
    /// skipped with a warning.
    async fn insert_user(&self, user: &NewUser, role_names: &[String]) -> Result<User>;

    /// Idempotent.
    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> Result<()>;

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn roles_of(&self, user_id: Uuid) -> Result<Vec<Role>>;

    async fn mark_email_verified(&self, user_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put_session(&self, sid: &str, session: &SessionData) -> Result<()>;

    /// Expired sessions are treated as absent.
    async fn get_session(&self, sid: &str) -> Result<Option<SessionData>>;

    async fn delete_session(&self, sid: &str) -> Result<()>;
}

/// Everything the API needs from a backend.
#[async_trait]
pub trait Storage:
    FieldStore + InterestStore + PaperStore + ArticleStore + PromptStore + UserStore + SessionStore
{
    fn backend_name(&self) -> &'static str;

    /// Cheap connectivity check.
    async fn ping(&self) -> Result<()>;
}
