use async_trait::async_trait;
use chrono::Utc;
use newsai_core::models::*;
use newsai_core::storage::*;
use newsai_core::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct MemoryStore {
    fields: HashMap<Uuid, Field>,
    interests: Vec<UserFieldInterest>,
    papers: HashMap<Uuid, Paper>,
    authors: HashMap<Uuid, AuthorProfile>,
    paper_authors: Vec<PaperAuthor>,
    articles: HashMap<Uuid, Article>,
    blocks: Vec<ArticleBlock>,
    prompts: Vec<Prompt>,
    article_prompts: Vec<ArticlePrompt>,
    users: HashMap<Uuid, User>,
    roles: Vec<Role>,
    permissions: Vec<Permission>,
    user_roles: HashSet<(Uuid, Uuid)>,
    role_permissions: HashSet<(Uuid, Uuid)>,
    sessions: HashMap<String, SessionData>,
}

impl MemoryStore {
    fn sorted(&self, mut fields: Vec<Field>) -> Vec<Field> {
        sort_fields(&mut fields);
        fields
    }

    fn check_paper_fields(&self, paper: &NewPaper) -> Result<()> {
        if let Some(field_id) = paper.primary_field_id {
            let field = self
                .fields
                .get(&field_id)
                .ok_or_else(|| {
                    Error::InvalidReference(format!("field {} does not exist", field_id))
                })?;
            if !field.is_top_level() {
                return Err(Error::Constraint(
                    "primary_field_id must reference a top-level field".to_string(),
                ));
            }
        }
        if let Some(sub_id) = paper.primary_subfield_id {
            let sub = self
                .fields
                .get(&sub_id)
                .ok_or_else(|| {
                    Error::InvalidReference(format!("field {} does not exist", sub_id))
                })?;
            if paper.primary_field_id.is_none() || sub.parent_id != paper.primary_field_id {
                return Err(Error::Constraint(
                    "primary_subfield_id must be a child of primary_field_id".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Process-local backend. Nothing survives a restart.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FieldStore for InMemoryStorage {
    async fn insert_field(&self, field: &NewField) -> Result<Field> {
        let mut store = self.store.write().await;
        if let Some(parent_id) = field.parent_id {
            let parent = store
                .fields
                .get(&parent_id)
                .ok_or_else(|| {
                    Error::InvalidReference(format!("parent field {} does not exist", parent_id))
                })?;
            if !parent.is_top_level() {
                return Err(Error::Constraint(
                    "subfields cannot have subfields of their own".to_string(),
                ));
            }
        }
        if store
            .fields
            .values()
            .any(|f| f.parent_id == field.parent_id && f.code == field.code)
        {
            return Err(Error::Duplicate(format!("field code {} already exists", field.code)));
        }

        let created = Field {
            id: Uuid::new_v4(),
            code: field.code.clone(),
            name: field.name.clone(),
            sort_order: field.sort_order,
            parent_id: field.parent_id,
        };
        store.fields.insert(created.id, created.clone());
        Ok(created)
    }

    async fn field_by_id(&self, id: Uuid) -> Result<Option<Field>> {
        Ok(self.store.read().await.fields.get(&id).cloned())
    }

    async fn field_by_code(&self, parent_id: Option<Uuid>, code: &str) -> Result<Option<Field>> {
        let store = self.store.read().await;
        Ok(store
            .fields
            .values()
            .find(|f| f.parent_id == parent_id && f.code == code)
            .cloned())
    }

    async fn top_level_fields(&self) -> Result<Vec<Field>> {
        let store = self.store.read().await;
        let fields = store.fields.values().filter(|f| f.is_top_level()).cloned().collect();
        Ok(store.sorted(fields))
    }

    async fn subfields_of(&self, parent_ids: &[Uuid]) -> Result<Vec<Field>> {
        let store = self.store.read().await;
        let fields = store
            .fields
            .values()
            .filter(|f| f.parent_id.map_or(false, |p| parent_ids.contains(&p)))
            .cloned()
            .collect();
        Ok(store.sorted(fields))
    }
}

#[async_trait]
impl InterestStore for InMemoryStorage {
    async fn list_interests(&self, user_id: Uuid) -> Result<Vec<InterestRow>> {
        let store = self.store.read().await;
        Ok(store
            .interests
            .iter()
            .filter(|i| i.user_id == user_id)
            .filter_map(|i| store.fields.get(&i.field_id))
            .map(|field| InterestRow {
                field: field.clone(),
                parent: field.parent_id.and_then(|p| store.fields.get(&p)).cloned(),
            })
            .collect())
    }

    async fn add_interest(&self, user_id: Uuid, field_id: Uuid) -> Result<UserFieldInterest> {
        let mut store = self.store.write().await;
        if !store.users.contains_key(&user_id) || !store.fields.contains_key(&field_id) {
            return Err(Error::InvalidReference(format!(
                "user {} or field {} does not exist",
                user_id, field_id
            )));
        }
        if store
            .interests
            .iter()
            .any(|i| i.user_id == user_id && i.field_id == field_id)
        {
            return Err(Error::Duplicate("interest already exists".to_string()));
        }

        let interest = UserFieldInterest {
            id: Uuid::new_v4(),
            user_id,
            field_id,
            created_at: Utc::now(),
        };
        store.interests.push(interest.clone());
        Ok(interest)
    }

    async fn remove_interest(&self, user_id: Uuid, field_id: Uuid) -> Result<bool> {
        let mut store = self.store.write().await;
        let before = store.interests.len();
        store
            .interests
            .retain(|i| !(i.user_id == user_id && i.field_id == field_id));
        Ok(store.interests.len() != before)
    }
}

#[async_trait]
impl PaperStore for InMemoryStorage {
    async fn upsert_paper(&self, paper: &NewPaper) -> Result<Paper> {
        let mut store = self.store.write().await;
        store.check_paper_fields(paper)?;
        let now = Utc::now();

        let existing = paper.arxiv_id.as_deref().and_then(|arxiv_id| {
            store
                .papers
                .values()
                .find(|p| p.arxiv_id.as_deref() == Some(arxiv_id))
                .map(|p| (p.id, p.created_at))
        });

        let saved = match existing {
            Some((id, created_at)) => {
                let mut updated = paper.clone().into_paper(id, now);
                updated.created_at = created_at;
                updated
            }
            None => paper.clone().into_paper(Uuid::new_v4(), now),
        };
        store.papers.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn paper_by_id(&self, id: Uuid) -> Result<Option<Paper>> {
        Ok(self.store.read().await.papers.get(&id).cloned())
    }

    async fn upsert_author(&self, author: &NewAuthor) -> Result<AuthorProfile> {
        let mut store = self.store.write().await;
        let existing = store
            .authors
            .values()
            .find(|a| match (&author.orcid, &a.orcid) {
                (Some(wanted), Some(have)) => wanted == have,
                (Some(_), None) => false,
                (None, _) => a.name == author.name,
            })
            .cloned();

        // Fields missing from the incoming record keep their stored values.
        let profile = match existing {
            Some(current) => AuthorProfile {
                id: current.id,
                name: author.name.clone(),
                affiliation: author.affiliation.clone().or(current.affiliation),
                email: author.email.clone().or(current.email),
                orcid: author.orcid.clone().or(current.orcid),
                website: author.website.clone().or(current.website),
                created_at: current.created_at,
            },
            None => AuthorProfile {
                id: Uuid::new_v4(),
                name: author.name.clone(),
                affiliation: author.affiliation.clone(),
                email: author.email.clone(),
                orcid: author.orcid.clone(),
                website: author.website.clone(),
                created_at: Utc::now(),
            },
        };
        let id = profile.id;
        store.authors.insert(id, profile.clone());
        Ok(profile)
    }

    async fn link_author(&self, link: &PaperAuthor) -> Result<()> {
        let mut store = self.store.write().await;
        if !store.papers.contains_key(&link.paper_id)
            || !store.authors.contains_key(&link.author_id)
        {
            return Err(Error::InvalidReference(format!(
                "paper {} or author {} does not exist",
                link.paper_id, link.author_id
            )));
        }
        if store.paper_authors.iter().any(|pa| {
            pa.paper_id == link.paper_id
                && (pa.author_id == link.author_id || pa.author_order == link.author_order)
        }) {
            return Err(Error::Duplicate(format!(
                "author {} or order {} already linked to paper {}",
                link.author_id, link.author_order, link.paper_id
            )));
        }
        store.paper_authors.push(link.clone());
        Ok(())
    }

    async fn authors_of(&self, paper_id: Uuid) -> Result<Vec<CreditedAuthor>> {
        let store = self.store.read().await;
        let mut credited: Vec<CreditedAuthor> = store
            .paper_authors
            .iter()
            .filter(|pa| pa.paper_id == paper_id)
            .filter_map(|pa| store.authors.get(&pa.author_id).map(|a| CreditedAuthor::new(pa, a)))
            .collect();
        credited.sort_by_key(|a| a.author_order);
        Ok(credited)
    }
}

#[async_trait]
impl ArticleStore for InMemoryStorage {
    async fn insert_article(&self, article: &NewArticle, blocks: &[NewBlock]) -> Result<Article> {
        validate_blocks(blocks)?;
        let mut store = self.store.write().await;
        if !store.papers.contains_key(&article.paper_id) {
            return Err(Error::InvalidReference(format!(
                "paper {} does not exist",
                article.paper_id
            )));
        }
        if store.articles.values().any(|a| a.slug == article.slug) {
            return Err(Error::Duplicate(format!("slug {} already exists", article.slug)));
        }

        let now = Utc::now();
        let created = Article {
            id: Uuid::new_v4(),
            paper_id: article.paper_id,
            title: article.title.clone(),
            slug: article.slug.clone(),
            status: article.status.clone(),
            featured_image_url: article.featured_image_url.clone(),
            is_edited: false,
            view_count: 0,
            created_at: now,
            updated_at: now,
        };
        for block in blocks {
            store.blocks.push(ArticleBlock {
                id: Uuid::new_v4(),
                article_id: created.id,
                block_type: block.block_type,
                content: block.content.clone(),
                order_index: block.order_index,
            });
        }
        store.articles.insert(created.id, created.clone());
        Ok(created)
    }

    async fn article_by_slug(&self, slug: &str) -> Result<Option<Article>> {
        let store = self.store.read().await;
        Ok(store.articles.values().find(|a| a.slug == slug).cloned())
    }

    async fn blocks_of(&self, article_id: Uuid) -> Result<Vec<ArticleBlock>> {
        let store = self.store.read().await;
        let mut blocks: Vec<ArticleBlock> = store
            .blocks
            .iter()
            .filter(|b| b.article_id == article_id)
            .cloned()
            .collect();
        blocks.sort_by_key(|b| b.order_index);
        Ok(blocks)
    }
}

#[async_trait]
impl PromptStore for InMemoryStorage {
    async fn insert_prompt(&self, prompt: &NewPrompt) -> Result<Prompt> {
        let now = Utc::now();
        let created = Prompt {
            id: Uuid::new_v4(),
            name: prompt.name.clone(),
            prompt_type: prompt.prompt_type,
            image_generation_prompt: prompt.image_generation_prompt.clone(),
            description: prompt.description.clone(),
            created_at: now,
            updated_at: now,
        };
        self.store.write().await.prompts.push(created.clone());
        Ok(created)
    }

    async fn prompt_by_name(&self, name: &str) -> Result<Option<Prompt>> {
        let store = self.store.read().await;
        Ok(store.prompts.iter().find(|p| p.name == name).cloned())
    }

    async fn attach_prompt(&self, article_id: Uuid, prompt_id: Uuid) -> Result<ArticlePrompt> {
        let mut store = self.store.write().await;
        if !store.articles.contains_key(&article_id)
            || !store.prompts.iter().any(|p| p.id == prompt_id)
        {
            return Err(Error::InvalidReference(format!(
                "article {} or prompt {} does not exist",
                article_id, prompt_id
            )));
        }
        if store
            .article_prompts
            .iter()
            .any(|ap| ap.article_id == article_id && ap.prompt_id == prompt_id)
        {
            return Err(Error::Duplicate("prompt already attached to article".to_string()));
        }
        let link = ArticlePrompt {
            article_id,
            prompt_id,
            created_at: Utc::now(),
        };
        store.article_prompts.push(link.clone());
        Ok(link)
    }

    async fn prompts_for_article(&self, article_id: Uuid) -> Result<Vec<Prompt>> {
        let store = self.store.read().await;
        Ok(store
            .article_prompts
            .iter()
            .filter(|ap| ap.article_id == article_id)
            .filter_map(|ap| store.prompts.iter().find(|p| p.id == ap.prompt_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserStore for InMemoryStorage {
    async fn ensure_role(&self, name: &str, description: Option<&str>) -> Result<Role> {
        let mut store = self.store.write().await;
        if let Some(role) = store.roles.iter().find(|r| r.name == name) {
            return Ok(role.clone());
        }
        let role = Role {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.map(str::to_string),
        };
        store.roles.push(role.clone());
        Ok(role)
    }

    async fn ensure_permission(
        &self,
        name: &str,
        resource: Option<&str>,
        action: Option<&str>,
    ) -> Result<Permission> {
        let mut store = self.store.write().await;
        if let Some(permission) = store.permissions.iter().find(|p| p.name == name) {
            return Ok(permission.clone());
        }
        let permission = Permission {
            id: Uuid::new_v4(),
            name: name.to_string(),
            resource: resource.map(str::to_string),
            action: action.map(str::to_string),
        };
        store.permissions.push(permission.clone());
        Ok(permission)
    }

    async fn grant_permission(&self, role_id: Uuid, permission_id: Uuid) -> Result<()> {
        let mut store = self.store.write().await;
        if !store.roles.iter().any(|r| r.id == role_id)
            || !store.permissions.iter().any(|p| p.id == permission_id)
        {
            return Err(Error::InvalidReference(format!(
                "role {} or permission {} does not exist",
                role_id, permission_id
            )));
        }
        store.role_permissions.insert((role_id, permission_id));
        Ok(())
    }

    async fn insert_user(&self, user: &NewUser, role_names: &[String]) -> Result<User> {
        let mut store = self.store.write().await;
        if store.users.values().any(|u| u.email == user.email) {
            return Err(Error::Duplicate(format!("email {} already registered", user.email)));
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            profile_image_url: user.profile_image_url.clone(),
            email_verified_at: None,
            created_at: now,
            updated_at: now,
        };

        for name in role_names {
            match store.roles.iter().find(|r| &r.name == name).map(|r| r.id) {
                Some(role_id) => {
                    store.user_roles.insert((created.id, role_id));
                }
                None => tracing::warn!(role = %name, email = %user.email, "Skipping unknown role"),
            }
        }
        store.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> Result<()> {
        let mut store = self.store.write().await;
        if !store.users.contains_key(&user_id) || !store.roles.iter().any(|r| r.id == role_id) {
            return Err(Error::InvalidReference(format!(
                "user {} or role {} does not exist",
                user_id, role_id
            )));
        }
        store.user_roles.insert((user_id, role_id));
        Ok(())
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.store.read().await.users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let store = self.store.read().await;
        Ok(store.users.values().find(|u| u.email == email).cloned())
    }

    async fn roles_of(&self, user_id: Uuid) -> Result<Vec<Role>> {
        let store = self.store.read().await;
        let mut roles: Vec<Role> = store
            .roles
            .iter()
            .filter(|r| store.user_roles.contains(&(user_id, r.id)))
            .cloned()
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn mark_email_verified(&self, user_id: Uuid) -> Result<()> {
        let mut store = self.store.write().await;
        let user = store
            .users
            .get_mut(&user_id)
            .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))?;
        let now = Utc::now();
        user.email_verified_at = Some(now);
        user.updated_at = now;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for InMemoryStorage {
    async fn put_session(&self, sid: &str, session: &SessionData) -> Result<()> {
        let mut store = self.store.write().await;
        store.sessions.insert(sid.to_string(), session.clone());
        Ok(())
    }

    async fn get_session(&self, sid: &str) -> Result<Option<SessionData>> {
        let store = self.store.read().await;
        Ok(store
            .sessions
            .get(sid)
            .filter(|s| !s.is_expired(Utc::now()))
            .cloned())
    }

    async fn delete_session(&self, sid: &str) -> Result<()> {
        self.store.write().await.sessions.remove(sid);
        Ok(())
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
