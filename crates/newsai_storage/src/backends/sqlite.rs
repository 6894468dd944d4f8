use async_trait::async_trait;
use chrono::{DateTime, Utc};
use newsai_core::models::*;
use newsai_core::storage::*;
use newsai_core::{Error, Result};
use sqlx::error::ErrorKind;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Prefix of every message raised by the schema triggers.
const TRIGGER_PREFIX: &str = "constraint:";

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS fields (
        id TEXT PRIMARY KEY,
        code TEXT NOT NULL,
        name TEXT NOT NULL,
        sort_order INTEGER,
        parent_id TEXT REFERENCES fields(id) ON DELETE CASCADE,
        UNIQUE (parent_id, code),
        UNIQUE (id, parent_id)
    )
    "#,
    // NULL parents are distinct in UNIQUE, so top-level codes need their own index
    "CREATE UNIQUE INDEX IF NOT EXISTS ux_fields_top_level_code ON fields(code) \
     WHERE parent_id IS NULL",
    "CREATE INDEX IF NOT EXISTS ix_fields_parent_sort ON fields(parent_id, sort_order)",
    r#"
    CREATE TRIGGER IF NOT EXISTS fields_two_levels
    BEFORE INSERT ON fields
    WHEN NEW.parent_id IS NOT NULL
        AND EXISTS (SELECT 1 FROM fields WHERE id = NEW.parent_id AND parent_id IS NOT NULL)
    BEGIN
        SELECT RAISE(ABORT, 'constraint: subfields cannot have subfields of their own');
    END
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        display_name TEXT,
        first_name TEXT,
        last_name TEXT,
        profile_image_url TEXT,
        email_verified_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS roles (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        description TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS permissions (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        resource TEXT,
        action TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_roles (
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        role_id TEXT NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
        PRIMARY KEY (user_id, role_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS role_permissions (
        role_id TEXT NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
        permission_id TEXT NOT NULL REFERENCES permissions(id) ON DELETE CASCADE,
        PRIMARY KEY (role_id, permission_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_field_interests (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        field_id TEXT NOT NULL REFERENCES fields(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL,
        UNIQUE (user_id, field_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS papers (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        abstract TEXT,
        doi TEXT,
        arxiv_id TEXT UNIQUE,
        arxiv_version INTEGER,
        primary_category TEXT,
        categories TEXT NOT NULL DEFAULT '[]',
        pdf_url TEXT,
        published_date TEXT,
        updated_date TEXT,
        status TEXT,
        primary_field_id TEXT REFERENCES fields(id) ON DELETE SET NULL,
        primary_subfield_id TEXT REFERENCES fields(id) ON DELETE SET NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (primary_subfield_id, primary_field_id) REFERENCES fields(id, parent_id)
    )
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS papers_fields_insert
    BEFORE INSERT ON papers
    BEGIN
        SELECT RAISE(ABORT, 'constraint: primary_field_id must reference a top-level field')
        WHERE EXISTS (
            SELECT 1 FROM fields WHERE id = NEW.primary_field_id AND parent_id IS NOT NULL
        );
        SELECT RAISE(ABORT, 'constraint: primary_subfield_id must be a child of primary_field_id')
        WHERE EXISTS (SELECT 1 FROM fields WHERE id = NEW.primary_subfield_id)
            AND NOT EXISTS (
                SELECT 1 FROM fields
                WHERE id = NEW.primary_subfield_id AND parent_id = NEW.primary_field_id
            );
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS papers_fields_update
    BEFORE UPDATE OF primary_field_id, primary_subfield_id ON papers
    BEGIN
        SELECT RAISE(ABORT, 'constraint: primary_field_id must reference a top-level field')
        WHERE EXISTS (
            SELECT 1 FROM fields WHERE id = NEW.primary_field_id AND parent_id IS NOT NULL
        );
        SELECT RAISE(ABORT, 'constraint: primary_subfield_id must be a child of primary_field_id')
        WHERE EXISTS (SELECT 1 FROM fields WHERE id = NEW.primary_subfield_id)
            AND NOT EXISTS (
                SELECT 1 FROM fields
                WHERE id = NEW.primary_subfield_id AND parent_id = NEW.primary_field_id
            );
    END
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS author_profiles (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        affiliation TEXT,
        email TEXT,
        orcid TEXT UNIQUE,
        website TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS paper_authors (
        paper_id TEXT NOT NULL REFERENCES papers(id) ON DELETE CASCADE,
        author_id TEXT NOT NULL REFERENCES author_profiles(id) ON DELETE RESTRICT,
        author_order INTEGER NOT NULL,
        corresponding INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (paper_id, author_id),
        UNIQUE (paper_id, author_order)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id TEXT PRIMARY KEY,
        paper_id TEXT NOT NULL REFERENCES papers(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        slug TEXT NOT NULL UNIQUE,
        status TEXT,
        featured_image_url TEXT,
        is_edited INTEGER NOT NULL DEFAULT 0,
        view_count INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS article_blocks (
        id TEXT PRIMARY KEY,
        article_id TEXT NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
        block_type TEXT NOT NULL
            CHECK (block_type IN ('title', 'paragraph', 'subheading', 'quote', 'image')),
        content TEXT,
        order_index INTEGER NOT NULL,
        UNIQUE (article_id, order_index)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS prompts (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        type TEXT NOT NULL CHECK (type IN ('article', 'image', 'video', 'text-to-speech')),
        image_generation_prompt TEXT,
        description TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS article_prompts (
        article_id TEXT NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
        prompt_id TEXT NOT NULL REFERENCES prompts(id) ON DELETE RESTRICT,
        created_at TEXT NOT NULL,
        PRIMARY KEY (article_id, prompt_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        sid TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        roles TEXT NOT NULL,
        expires_at TEXT NOT NULL
    )
    "#,
    // Add future migrations here
];

const FIELD_COLUMNS: &str = "id, code, name, sort_order, parent_id";
const FIELD_ORDER: &str = "ORDER BY sort_order IS NULL, sort_order, name";
const PAPER_COLUMNS: &str = "id, title, abstract, doi, arxiv_id, arxiv_version, primary_category, \
     categories, pdf_url, published_date, updated_date, status, primary_field_id, \
     primary_subfield_id, created_at, updated_at";
const ARTICLE_COLUMNS: &str = "id, paper_id, title, slug, status, featured_image_url, is_edited, \
     view_count, created_at, updated_at";
const USER_COLUMNS: &str = "id, email, display_name, first_name, last_name, profile_image_url, \
     email_verified_at, created_at, updated_at";
const PROMPT_COLUMNS: &str =
    "id, name, type, image_generation_prompt, description, created_at, updated_at";

/// Classify a sqlx failure into the domain error kinds.
fn map_db_error(context: &str, e: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db) = &e {
        if let Some(reason) = db.message().strip_prefix(TRIGGER_PREFIX) {
            return Error::Constraint(reason.trim().to_string());
        }
        match db.kind() {
            ErrorKind::UniqueViolation => {
                return Error::Duplicate(format!("{}: {}", context, db.message()))
            }
            ErrorKind::ForeignKeyViolation => {
                return Error::InvalidReference(format!("{}: {}", context, db.message()))
            }
            ErrorKind::NotNullViolation | ErrorKind::CheckViolation => {
                return Error::Constraint(format!("{}: {}", context, db.message()))
            }
            _ => {}
        }
    }
    Error::Database(format!("Failed to {}: {}", context, e))
}

fn get<'r, T>(row: &'r SqliteRow, column: &str) -> Result<T>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(column)
        .map_err(|e| Error::Database(format!("Failed to read column {}: {}", column, e)))
}

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Database(format!("Invalid uuid {}: {}", value, e)))
}

fn get_uuid(row: &SqliteRow, column: &str) -> Result<Uuid> {
    parse_uuid(&get::<String>(row, column)?)
}

fn get_opt_uuid(row: &SqliteRow, column: &str) -> Result<Option<Uuid>> {
    get::<Option<String>>(row, column)?
        .as_deref()
        .map(parse_uuid)
        .transpose()
}

fn field_from_row(row: &SqliteRow) -> Result<Field> {
    Ok(Field {
        id: get_uuid(row, "id")?,
        code: get(row, "code")?,
        name: get(row, "name")?,
        sort_order: get(row, "sort_order")?,
        parent_id: get_opt_uuid(row, "parent_id")?,
    })
}

fn paper_from_row(row: &SqliteRow) -> Result<Paper> {
    let categories: String = get(row, "categories")?;
    Ok(Paper {
        id: get_uuid(row, "id")?,
        title: get(row, "title")?,
        abstract_text: get(row, "abstract")?,
        doi: get(row, "doi")?,
        arxiv_id: get(row, "arxiv_id")?,
        arxiv_version: get(row, "arxiv_version")?,
        primary_category: get(row, "primary_category")?,
        categories: serde_json::from_str(&categories)?,
        pdf_url: get(row, "pdf_url")?,
        published_date: get(row, "published_date")?,
        updated_date: get(row, "updated_date")?,
        status: get(row, "status")?,
        primary_field_id: get_opt_uuid(row, "primary_field_id")?,
        primary_subfield_id: get_opt_uuid(row, "primary_subfield_id")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

fn author_from_row(row: &SqliteRow) -> Result<AuthorProfile> {
    Ok(AuthorProfile {
        id: get_uuid(row, "id")?,
        name: get(row, "name")?,
        affiliation: get(row, "affiliation")?,
        email: get(row, "email")?,
        orcid: get(row, "orcid")?,
        website: get(row, "website")?,
        created_at: get(row, "created_at")?,
    })
}

fn article_from_row(row: &SqliteRow) -> Result<Article> {
    Ok(Article {
        id: get_uuid(row, "id")?,
        paper_id: get_uuid(row, "paper_id")?,
        title: get(row, "title")?,
        slug: get(row, "slug")?,
        status: get(row, "status")?,
        featured_image_url: get(row, "featured_image_url")?,
        is_edited: get(row, "is_edited")?,
        view_count: get(row, "view_count")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

fn prompt_from_row(row: &SqliteRow) -> Result<Prompt> {
    Ok(Prompt {
        id: get_uuid(row, "id")?,
        name: get(row, "name")?,
        prompt_type: PromptType::from_str(&get::<String>(row, "type")?)?,
        image_generation_prompt: get(row, "image_generation_prompt")?,
        description: get(row, "description")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

fn user_from_row(row: &SqliteRow) -> Result<User> {
    Ok(User {
        id: get_uuid(row, "id")?,
        email: get(row, "email")?,
        display_name: get(row, "display_name")?,
        first_name: get(row, "first_name")?,
        last_name: get(row, "last_name")?,
        profile_image_url: get(row, "profile_image_url")?,
        email_verified_at: get(row, "email_verified_at")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

fn role_from_row(row: &SqliteRow) -> Result<Role> {
    Ok(Role {
        id: get_uuid(row, "id")?,
        name: get(row, "name")?,
        description: get(row, "description")?,
    })
}

fn permission_from_row(row: &SqliteRow) -> Result<Permission> {
    Ok(Permission {
        id: get_uuid(row, "id")?,
        name: get(row, "name")?,
        resource: get(row, "resource")?,
        action: get(row, "action")?,
    })
}

pub struct SQLiteStorage {
    pool: Arc<SqlitePool>,
    db_path: Option<PathBuf>,
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| Error::Database(format!("Failed to connect to database: {}", e)))?;
        Self::migrate(pool, Some(db_path.clone())).await
    }

    /// Open a `sqlite:` URL; `sqlite::memory:` keeps a single connection so
    /// the database lives as long as the pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| Error::Config(format!("Invalid DATABASE_URL {}: {}", url, e)))?
            .create_if_missing(true)
            .foreign_keys(true);
        let in_memory = url.contains(":memory:");
        let mut pool_options = SqlitePoolOptions::new();
        if in_memory {
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| Error::Database(format!("Failed to connect to database: {}", e)))?;
        let db_path = (!in_memory)
            .then(|| url.trim_start_matches("sqlite://").trim_start_matches("sqlite:"))
            .map(PathBuf::from);
        Self::migrate(pool, db_path).await
    }

    async fn migrate(pool: SqlitePool, db_path: Option<PathBuf>) -> Result<Self> {
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Database(format!("Failed to run migration {}: {}", i, e)))?;
        }
        tracing::debug!(migrations = MIGRATIONS.len(), "SQLite schema ready");

        Ok(Self {
            pool: Arc::new(pool),
            db_path,
        })
    }

    pub fn get_db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    async fn fetch_field(&self, sql: &str, binds: &[Option<String>]) -> Result<Option<Field>> {
        let mut query = sqlx::query(sql);
        for bind in binds {
            query = query.bind(bind.clone());
        }
        query
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_db_error("load field", e))?
            .as_ref()
            .map(field_from_row)
            .transpose()
    }

    async fn author_by_id(&self, id: Uuid) -> Result<AuthorProfile> {
        let row = sqlx::query("SELECT * FROM author_profiles WHERE id = ?")
            .bind(id.to_string())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_db_error("load author", e))?;
        author_from_row(&row)
    }
}

#[async_trait]
impl FieldStore for SQLiteStorage {
    async fn insert_field(&self, field: &NewField) -> Result<Field> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO fields (id, code, name, sort_order, parent_id) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&field.code)
        .bind(&field.name)
        .bind(field.sort_order)
        .bind(field.parent_id.map(|p| p.to_string()))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_db_error("insert field", e))?;

        Ok(Field {
            id,
            code: field.code.clone(),
            name: field.name.clone(),
            sort_order: field.sort_order,
            parent_id: field.parent_id,
        })
    }

    async fn field_by_id(&self, id: Uuid) -> Result<Option<Field>> {
        let sql = format!("SELECT {} FROM fields WHERE id = ?", FIELD_COLUMNS);
        self.fetch_field(&sql, &[Some(id.to_string())]).await
    }

    async fn field_by_code(&self, parent_id: Option<Uuid>, code: &str) -> Result<Option<Field>> {
        let sql = format!(
            "SELECT {} FROM fields WHERE parent_id IS ? AND code = ?",
            FIELD_COLUMNS
        );
        self.fetch_field(&sql, &[parent_id.map(|p| p.to_string()), Some(code.to_string())])
            .await
    }

    async fn top_level_fields(&self) -> Result<Vec<Field>> {
        let sql = format!(
            "SELECT {} FROM fields WHERE parent_id IS NULL {}",
            FIELD_COLUMNS, FIELD_ORDER
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_db_error("list fields", e))?;
        rows.iter().map(field_from_row).collect()
    }

    async fn subfields_of(&self, parent_ids: &[Uuid]) -> Result<Vec<Field>> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM fields WHERE parent_id IN (",
            FIELD_COLUMNS
        ));
        let mut separated = builder.separated(", ");
        for id in parent_ids {
            separated.push_bind(id.to_string());
        }
        separated.push_unseparated(") ");
        builder.push(FIELD_ORDER);

        let rows = builder
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_db_error("list subfields", e))?;
        rows.iter().map(field_from_row).collect()
    }
}

#[async_trait]
impl InterestStore for SQLiteStorage {
    async fn list_interests(&self, user_id: Uuid) -> Result<Vec<InterestRow>> {
        let rows = sqlx::query(
            r#"
            SELECT f.id, f.code, f.name, f.sort_order, f.parent_id,
                   p.id AS p_id, p.code AS p_code, p.name AS p_name, p.sort_order AS p_sort_order
            FROM user_field_interests i
            JOIN fields f ON f.id = i.field_id
            LEFT JOIN fields p ON p.id = f.parent_id
            WHERE i.user_id = ?
            ORDER BY i.created_at
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_db_error("list interests", e))?;

        let mut interests = Vec::with_capacity(rows.len());
        for row in &rows {
            let parent = match get_opt_uuid(row, "p_id")? {
                Some(id) => Some(Field {
                    id,
                    code: get(row, "p_code")?,
                    name: get(row, "p_name")?,
                    sort_order: get(row, "p_sort_order")?,
                    parent_id: None,
                }),
                None => None,
            };
            interests.push(InterestRow {
                field: field_from_row(row)?,
                parent,
            });
        }
        Ok(interests)
    }

    async fn add_interest(&self, user_id: Uuid, field_id: Uuid) -> Result<UserFieldInterest> {
        let interest = UserFieldInterest {
            id: Uuid::new_v4(),
            user_id,
            field_id,
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO user_field_interests (id, user_id, field_id, created_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(interest.id.to_string())
        .bind(user_id.to_string())
        .bind(field_id.to_string())
        .bind(interest.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_db_error("add interest", e))?;
        Ok(interest)
    }

    async fn remove_interest(&self, user_id: Uuid, field_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM user_field_interests WHERE user_id = ? AND field_id = ?",
        )
        .bind(user_id.to_string())
        .bind(field_id.to_string())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_db_error("remove interest", e))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PaperStore for SQLiteStorage {
    async fn upsert_paper(&self, paper: &NewPaper) -> Result<Paper> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let categories = serde_json::to_string(&paper.categories)?;

        sqlx::query(
            r#"
            INSERT INTO papers
            (id, title, abstract, doi, arxiv_id, arxiv_version, primary_category, categories,
             pdf_url, published_date, updated_date, status, primary_field_id, primary_subfield_id,
             created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(arxiv_id) DO UPDATE SET
                title = excluded.title,
                abstract = excluded.abstract,
                doi = excluded.doi,
                arxiv_version = excluded.arxiv_version,
                primary_category = excluded.primary_category,
                categories = excluded.categories,
                pdf_url = excluded.pdf_url,
                published_date = excluded.published_date,
                updated_date = excluded.updated_date,
                status = excluded.status,
                primary_field_id = excluded.primary_field_id,
                primary_subfield_id = excluded.primary_subfield_id,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id.to_string())
        .bind(&paper.title)
        .bind(paper.abstract_text.as_deref())
        .bind(paper.doi.as_deref())
        .bind(paper.arxiv_id.as_deref())
        .bind(paper.arxiv_version)
        .bind(paper.primary_category.as_deref())
        .bind(categories)
        .bind(paper.pdf_url.as_deref())
        .bind(paper.published_date)
        .bind(paper.updated_date)
        .bind(paper.status.as_deref())
        .bind(paper.primary_field_id.map(|f| f.to_string()))
        .bind(paper.primary_subfield_id.map(|f| f.to_string()))
        .bind(now)
        .bind(now)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_db_error("store paper", e))?;

        let row = match paper.arxiv_id.as_deref() {
            Some(arxiv_id) => {
                sqlx::query(&format!("SELECT {} FROM papers WHERE arxiv_id = ?", PAPER_COLUMNS))
                    .bind(arxiv_id)
                    .fetch_one(&*self.pool)
                    .await
            }
            None => {
                sqlx::query(&format!("SELECT {} FROM papers WHERE id = ?", PAPER_COLUMNS))
                    .bind(id.to_string())
                    .fetch_one(&*self.pool)
                    .await
            }
        }
        .map_err(|e| map_db_error("load paper", e))?;
        paper_from_row(&row)
    }

    async fn paper_by_id(&self, id: Uuid) -> Result<Option<Paper>> {
        sqlx::query(&format!("SELECT {} FROM papers WHERE id = ?", PAPER_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_db_error("load paper", e))?
            .as_ref()
            .map(paper_from_row)
            .transpose()
    }

    async fn upsert_author(&self, author: &NewAuthor) -> Result<AuthorProfile> {
        let existing: Option<String> = match author.orcid.as_deref() {
            Some(orcid) => {
                sqlx::query_scalar::<_, String>("SELECT id FROM author_profiles WHERE orcid = ?")
                    .bind(orcid)
                    .fetch_optional(&*self.pool)
                    .await
            }
            None => {
                sqlx::query_scalar::<_, String>(
                    "SELECT id FROM author_profiles WHERE name = ? ORDER BY created_at LIMIT 1",
                )
                .bind(&author.name)
                .fetch_optional(&*self.pool)
                .await
            }
        }
        .map_err(|e| map_db_error("find author", e))?;

        let id = match existing {
            Some(id) => {
                sqlx::query(
                    "UPDATE author_profiles SET name = ?, \
                     affiliation = COALESCE(?, affiliation), \
                     email = COALESCE(?, email), \
                     orcid = COALESCE(?, orcid), \
                     website = COALESCE(?, website) \
                     WHERE id = ?",
                )
                .bind(&author.name)
                .bind(author.affiliation.as_deref())
                .bind(author.email.as_deref())
                .bind(author.orcid.as_deref())
                .bind(author.website.as_deref())
                .bind(&id)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_db_error("update author", e))?;
                parse_uuid(&id)?
            }
            None => {
                let id = Uuid::new_v4();
                sqlx::query(
                    "INSERT INTO author_profiles \
                     (id, name, affiliation, email, orcid, website, created_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(id.to_string())
                .bind(&author.name)
                .bind(author.affiliation.as_deref())
                .bind(author.email.as_deref())
                .bind(author.orcid.as_deref())
                .bind(author.website.as_deref())
                .bind(Utc::now())
                .execute(&*self.pool)
                .await
                .map_err(|e| map_db_error("insert author", e))?;
                id
            }
        };
        self.author_by_id(id).await
    }

    async fn link_author(&self, link: &PaperAuthor) -> Result<()> {
        sqlx::query(
            "INSERT INTO paper_authors (paper_id, author_id, author_order, corresponding) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(link.paper_id.to_string())
        .bind(link.author_id.to_string())
        .bind(link.author_order)
        .bind(link.corresponding)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_db_error("link author", e))?;
        Ok(())
    }

    async fn authors_of(&self, paper_id: Uuid) -> Result<Vec<CreditedAuthor>> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.name, a.affiliation, pa.author_order, pa.corresponding
            FROM paper_authors pa
            JOIN author_profiles a ON a.id = pa.author_id
            WHERE pa.paper_id = ?
            ORDER BY pa.author_order
            "#,
        )
        .bind(paper_id.to_string())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_db_error("list authors", e))?;

        rows.iter()
            .map(|row| {
                Ok(CreditedAuthor {
                    id: get_uuid(row, "id")?,
                    name: get(row, "name")?,
                    affiliation: get(row, "affiliation")?,
                    author_order: get(row, "author_order")?,
                    corresponding: get(row, "corresponding")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ArticleStore for SQLiteStorage {
    async fn insert_article(&self, article: &NewArticle, blocks: &[NewBlock]) -> Result<Article> {
        validate_blocks(blocks)?;
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

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_error("begin transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO articles
            (id, paper_id, title, slug, status, featured_image_url, is_edited, view_count,
             created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(created.id.to_string())
        .bind(created.paper_id.to_string())
        .bind(&created.title)
        .bind(&created.slug)
        .bind(created.status.as_deref())
        .bind(created.featured_image_url.as_deref())
        .bind(created.is_edited)
        .bind(created.view_count)
        .bind(created.created_at)
        .bind(created.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_db_error("insert article", e))?;

        for block in blocks {
            sqlx::query(
                "INSERT INTO article_blocks (id, article_id, block_type, content, order_index) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(created.id.to_string())
            .bind(block.block_type.as_str())
            .bind(block.content.as_deref())
            .bind(block.order_index)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_error("insert article block", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_db_error("commit article", e))?;
        Ok(created)
    }

    async fn article_by_slug(&self, slug: &str) -> Result<Option<Article>> {
        sqlx::query(&format!("SELECT {} FROM articles WHERE slug = ?", ARTICLE_COLUMNS))
            .bind(slug)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_db_error("load article", e))?
            .as_ref()
            .map(article_from_row)
            .transpose()
    }

    async fn blocks_of(&self, article_id: Uuid) -> Result<Vec<ArticleBlock>> {
        let rows = sqlx::query(
            "SELECT id, article_id, block_type, content, order_index FROM article_blocks \
             WHERE article_id = ? ORDER BY order_index",
        )
        .bind(article_id.to_string())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_db_error("list article blocks", e))?;

        rows.iter()
            .map(|row| {
                Ok(ArticleBlock {
                    id: get_uuid(row, "id")?,
                    article_id: get_uuid(row, "article_id")?,
                    block_type: BlockType::from_str(&get::<String>(row, "block_type")?)?,
                    content: get(row, "content")?,
                    order_index: get(row, "order_index")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl PromptStore for SQLiteStorage {
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
        sqlx::query(&format!(
            "INSERT INTO prompts ({}) VALUES (?, ?, ?, ?, ?, ?, ?)",
            PROMPT_COLUMNS
        ))
        .bind(created.id.to_string())
        .bind(&created.name)
        .bind(created.prompt_type.as_str())
        .bind(created.image_generation_prompt.as_deref())
        .bind(created.description.as_deref())
        .bind(created.created_at)
        .bind(created.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_db_error("insert prompt", e))?;
        Ok(created)
    }

    async fn prompt_by_name(&self, name: &str) -> Result<Option<Prompt>> {
        sqlx::query(&format!(
            "SELECT {} FROM prompts WHERE name = ? ORDER BY created_at LIMIT 1",
            PROMPT_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_db_error("load prompt", e))?
        .as_ref()
        .map(prompt_from_row)
        .transpose()
    }

    async fn attach_prompt(&self, article_id: Uuid, prompt_id: Uuid) -> Result<ArticlePrompt> {
        let link = ArticlePrompt {
            article_id,
            prompt_id,
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO article_prompts (article_id, prompt_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(article_id.to_string())
        .bind(prompt_id.to_string())
        .bind(link.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_db_error("attach prompt", e))?;
        Ok(link)
    }

    async fn prompts_for_article(&self, article_id: Uuid) -> Result<Vec<Prompt>> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.name, p.type, p.image_generation_prompt, p.description,
                   p.created_at, p.updated_at
            FROM article_prompts ap
            JOIN prompts p ON p.id = ap.prompt_id
            WHERE ap.article_id = ?
            ORDER BY ap.created_at
            "#,
        )
        .bind(article_id.to_string())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_db_error("list article prompts", e))?;
        rows.iter().map(prompt_from_row).collect()
    }
}

#[async_trait]
impl UserStore for SQLiteStorage {
    async fn ensure_role(&self, name: &str, description: Option<&str>) -> Result<Role> {
        sqlx::query(
            "INSERT INTO roles (id, name, description) VALUES (?, ?, ?) \
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(name)
        .bind(description)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_db_error("insert role", e))?;
        let row = sqlx::query("SELECT id, name, description FROM roles WHERE name = ?")
            .bind(name)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_db_error("load role", e))?;
        role_from_row(&row)
    }

    async fn ensure_permission(
        &self,
        name: &str,
        resource: Option<&str>,
        action: Option<&str>,
    ) -> Result<Permission> {
        sqlx::query(
            "INSERT INTO permissions (id, name, resource, action) VALUES (?, ?, ?, ?) \
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(name)
        .bind(resource)
        .bind(action)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_db_error("insert permission", e))?;
        let row = sqlx::query("SELECT id, name, resource, action FROM permissions WHERE name = ?")
            .bind(name)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_db_error("load permission", e))?;
        permission_from_row(&row)
    }

    async fn grant_permission(&self, role_id: Uuid, permission_id: Uuid) -> Result<()> {
        sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id) VALUES (?, ?) \
             ON CONFLICT DO NOTHING",
        )
        .bind(role_id.to_string())
        .bind(permission_id.to_string())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_db_error("grant permission", e))?;
        Ok(())
    }

    async fn insert_user(&self, user: &NewUser, role_names: &[String]) -> Result<User> {
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

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_error("begin transaction", e))?;

        sqlx::query(&format!(
            "INSERT INTO users ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            USER_COLUMNS
        ))
        .bind(created.id.to_string())
        .bind(&created.email)
        .bind(created.display_name.as_deref())
        .bind(created.first_name.as_deref())
        .bind(created.last_name.as_deref())
        .bind(created.profile_image_url.as_deref())
        .bind(created.email_verified_at)
        .bind(created.created_at)
        .bind(created.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_db_error("insert user", e))?;

        for name in role_names {
            let role_id: Option<String> = sqlx::query_scalar::<_, String>(
                "SELECT id FROM roles WHERE name = ?",
            )
            .bind(name)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_db_error("load role", e))?;
            match role_id {
                Some(role_id) => {
                    sqlx::query(
                        "INSERT INTO user_roles (user_id, role_id) VALUES (?, ?) \
                         ON CONFLICT DO NOTHING",
                    )
                    .bind(created.id.to_string())
                    .bind(role_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_db_error("assign role", e))?;
                }
                None => tracing::warn!(role = %name, email = %user.email, "Skipping unknown role"),
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_db_error("commit user", e))?;
        Ok(created)
    }

    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) VALUES (?, ?) ON CONFLICT DO NOTHING",
        )
        .bind(user_id.to_string())
        .bind(role_id.to_string())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_db_error("assign role", e))?;
        Ok(())
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_db_error("load user", e))?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        sqlx::query(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
            .bind(email)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_db_error("load user", e))?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    async fn roles_of(&self, user_id: Uuid) -> Result<Vec<Role>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.name, r.description
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = ?
            ORDER BY r.name
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_db_error("list roles", e))?;
        rows.iter().map(role_from_row).collect()
    }

    async fn mark_email_verified(&self, user_id: Uuid) -> Result<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE users SET email_verified_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(now)
        .bind(now)
        .bind(user_id.to_string())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_db_error("verify email", e))?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("user {}", user_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SQLiteStorage {
    async fn put_session(&self, sid: &str, session: &SessionData) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (sid, user_id, roles, expires_at) VALUES (?, ?, ?, ?)
            ON CONFLICT(sid) DO UPDATE SET
                user_id = excluded.user_id,
                roles = excluded.roles,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(sid)
        .bind(session.user_id.to_string())
        .bind(serde_json::to_string(&session.roles)?)
        .bind(session.expires_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_db_error("store session", e))?;
        Ok(())
    }

    async fn get_session(&self, sid: &str) -> Result<Option<SessionData>> {
        let row = sqlx::query("SELECT user_id, roles, expires_at FROM sessions WHERE sid = ?")
            .bind(sid)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_db_error("load session", e))?;
        let Some(row) = row else {
            return Ok(None);
        };

        let roles: String = get(&row, "roles")?;
        let expires_at: DateTime<Utc> = get(&row, "expires_at")?;
        let session = SessionData {
            user_id: get_uuid(&row, "user_id")?,
            roles: serde_json::from_str(&roles)?,
            expires_at,
        };
        Ok((!session.is_expired(Utc::now())).then_some(session))
    }

    async fn delete_session(&self, sid: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE sid = ?")
            .bind(sid)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_db_error("delete session", e))?;
        Ok(())
    }
}

#[async_trait]
impl Storage for SQLiteStorage {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&*self.pool)
            .await
            .map_err(|e| map_db_error("ping database", e))?;
        Ok(())
    }
}
