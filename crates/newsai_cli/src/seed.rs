use newsai_core::prelude::*;
use tracing::info;

const ROLES: &[(&str, &str)] = &[
    ("reader", "Can read articles and manage their own interests"),
    ("author", "Can edit generated articles"),
    ("admin", "Full access"),
];

const USERS: &[(&str, &str, &str)] = &[
    ("user@example.com", "Demo Reader", "reader"),
    ("admin@example.com", "Demo Admin", "admin"),
];

type Taxonomy = &'static [(&'static str, &'static str, &'static [(&'static str, &'static str)])];

/// A starter slice of the arXiv category taxonomy.
const TAXONOMY: Taxonomy = &[
    (
        "cs",
        "Computer Science",
        &[
            ("cs.AI", "Artificial Intelligence"),
            ("cs.CL", "Computation and Language"),
            ("cs.CV", "Computer Vision and Pattern Recognition"),
            ("cs.LG", "Machine Learning"),
        ],
    ),
    (
        "math",
        "Mathematics",
        &[("math.PR", "Probability"), ("math.ST", "Statistics Theory")],
    ),
    (
        "astro-ph",
        "Astrophysics",
        &[("astro-ph.CO", "Cosmology and Nongalactic Astrophysics")],
    ),
    (
        "q-bio",
        "Quantitative Biology",
        &[("q-bio.NC", "Neurons and Cognition")],
    ),
    ("stat", "Statistics", &[("stat.ML", "Machine Learning")]),
];

const DEMO_SLUG: &str = "attention-is-all-you-need-explained";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub roles: usize,
    pub users_created: usize,
    pub fields: usize,
    pub articles_created: usize,
}

async fn ensure_field(
    storage: &dyn Storage,
    parent: Option<&Field>,
    code: &str,
    name: &str,
    sort_order: i32,
) -> Result<Field> {
    if let Some(existing) = storage.field_by_code(parent.map(|p| p.id), code).await? {
        return Ok(existing);
    }
    let field = match parent {
        Some(parent) => NewField::child_of(parent, code, name, Some(sort_order)),
        None => NewField::top_level(code, name, Some(sort_order)),
    };
    storage.insert_field(&field).await
}

async fn seed_access(storage: &dyn Storage, report: &mut SeedReport) -> Result<()> {
    let me_read = storage
        .ensure_permission("me.read", Some("me"), Some("read"))
        .await?;
    for (name, description) in ROLES {
        let role = storage.ensure_role(name, Some(*description)).await?;
        storage.grant_permission(role.id, me_read.id).await?;
        report.roles += 1;
    }

    for (email, display_name, role) in USERS {
        let user = match storage.user_by_email(email).await? {
            Some(user) => user,
            None => {
                let new_user = NewUser {
                    display_name: Some(display_name.to_string()),
                    ..NewUser::with_email(email)
                };
                let user = storage.insert_user(&new_user, &[role.to_string()]).await?;
                storage.mark_email_verified(user.id).await?;
                report.users_created += 1;
                info!(email = %email, role = %role, "Created user");
                user
            }
        };
        let role = storage.ensure_role(role, None).await?;
        storage.assign_role(user.id, role.id).await?;
    }
    Ok(())
}

async fn seed_taxonomy(storage: &dyn Storage, report: &mut SeedReport) -> Result<()> {
    for (i, (code, name, subfields)) in TAXONOMY.iter().enumerate() {
        let top = ensure_field(storage, None, code, name, i as i32 + 1).await?;
        report.fields += 1;
        for (j, (sub_code, sub_name)) in subfields.iter().enumerate() {
            ensure_field(storage, Some(&top), sub_code, sub_name, j as i32 + 1).await?;
            report.fields += 1;
        }
    }
    Ok(())
}

async fn seed_demo_article(storage: &dyn Storage, report: &mut SeedReport) -> Result<()> {
    if storage.article_by_slug(DEMO_SLUG).await?.is_some() {
        return Ok(());
    }

    let cs = storage.field_by_code(None, "cs").await?;
    let cl = match &cs {
        Some(cs) => storage.field_by_code(Some(cs.id), "cs.CL").await?,
        None => None,
    };
    let paper = storage
        .upsert_paper(&NewPaper {
            title: "Attention Is All You Need".to_string(),
            abstract_text: Some(
                "We propose a new simple network architecture, the Transformer, based solely on \
                 attention mechanisms, dispensing with recurrence and convolutions entirely."
                    .to_string(),
            ),
            arxiv_id: Some("1706.03762".to_string()),
            arxiv_version: Some(7),
            primary_category: Some("cs.CL".to_string()),
            categories: vec!["cs.CL".to_string(), "cs.LG".to_string()],
            pdf_url: Some("https://arxiv.org/pdf/1706.03762v7".to_string()),
            status: Some("ingested".to_string()),
            primary_field_id: cs.as_ref().map(|f| f.id),
            primary_subfield_id: cl.as_ref().map(|f| f.id),
            ..Default::default()
        })
        .await?;

    if storage.authors_of(paper.id).await?.is_empty() {
        for (i, name) in ["Ashish Vaswani", "Noam Shazeer", "Niki Parmar"].iter().enumerate() {
            let author = storage
                .upsert_author(&NewAuthor {
                    name: name.to_string(),
                    affiliation: Some("Google Brain".to_string()),
                    ..Default::default()
                })
                .await?;
            storage
                .link_author(&PaperAuthor {
                    paper_id: paper.id,
                    author_id: author.id,
                    author_order: i as i32 + 1,
                    corresponding: i == 0,
                })
                .await?;
        }
    }

    let title = "Attention Is All You Need, explained";
    let blocks = [
        NewBlock::new(BlockType::Title, title, 0),
        NewBlock::new(
            BlockType::Paragraph,
            "Machine translation systems used to read sentences one word at a time. \
             This paper shows that a model can instead look at every word at once.",
            1,
        ),
        NewBlock::new(BlockType::Subheading, "Why it matters", 2),
        NewBlock::new(
            BlockType::Quote,
            "Attention mechanisms have become an integral part of compelling sequence modeling.",
            3,
        ),
    ];
    let article = storage
        .insert_article(
            &NewArticle {
                paper_id: paper.id,
                title: title.to_string(),
                slug: DEMO_SLUG.to_string(),
                status: Some("published".to_string()),
                featured_image_url: None,
            },
            &blocks,
        )
        .await?;
    report.articles_created += 1;

    let prompt = match storage.prompt_by_name("plain-english-article").await? {
        Some(prompt) => prompt,
        None => {
            storage
                .insert_prompt(&NewPrompt {
                    name: "plain-english-article".to_string(),
                    prompt_type: PromptType::Article,
                    image_generation_prompt: None,
                    description: Some(
                        "Rewrite a paper abstract for a general audience".to_string(),
                    ),
                })
                .await?
        }
    };
    storage.attach_prompt(article.id, prompt.id).await?;
    info!(slug = %article.slug, "Created demo article");
    Ok(())
}

/// Idempotently create roles, demo users, the starter taxonomy and one demo article.
pub async fn seed(storage: &dyn Storage) -> Result<SeedReport> {
    let mut report = SeedReport::default();
    seed_access(storage, &mut report).await?;
    seed_taxonomy(storage, &mut report).await?;
    seed_demo_article(storage, &mut report).await?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsai_core::storage::*;
    use newsai_storage::InMemoryStorage;

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let storage = InMemoryStorage::new();
        let first = seed(&storage).await.unwrap();
        assert_eq!(first.users_created, 2);
        assert_eq!(first.articles_created, 1);
        assert_eq!(first.fields, 14);

        let second = seed(&storage).await.unwrap();
        assert_eq!(second.users_created, 0);
        assert_eq!(second.articles_created, 0);
        assert_eq!(storage.top_level_fields().await.unwrap().len(), TAXONOMY.len());
    }

    #[tokio::test]
    async fn test_seeded_users_have_roles() {
        let storage = InMemoryStorage::new();
        seed(&storage).await.unwrap();

        let admin = storage.user_by_email("admin@example.com").await.unwrap().unwrap();
        assert!(admin.email_verified_at.is_some());
        let roles: Vec<String> = storage
            .roles_of(admin.id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(roles, vec!["admin".to_string()]);
    }

    #[tokio::test]
    async fn test_demo_article_is_complete() {
        let storage = InMemoryStorage::new();
        seed(&storage).await.unwrap();

        let article = storage.article_by_slug(DEMO_SLUG).await.unwrap().unwrap();
        assert_eq!(storage.blocks_of(article.id).await.unwrap().len(), 4);
        assert_eq!(storage.prompts_for_article(article.id).await.unwrap().len(), 1);
        assert_eq!(storage.authors_of(article.paper_id).await.unwrap().len(), 3);
    }
}
