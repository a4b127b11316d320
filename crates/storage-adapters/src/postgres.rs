//! # PostgreSQL backend
//!
//! Maps the relational schema in `migrations/` onto the domain models.
//! Listings keep their review references as an ordered `UUID[]` and their
//! categories as a `TEXT[]` of display names, so a listing is still read
//! and written as one row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    Category, DomainError, DomainResult, ImageRef, Listing, ListingFilter, ListingOrder,
    ListingQuery, ListingRepository, OAuthProvider, OwnedListing, Review, ReviewRepository,
    SessionData, SessionStore, User, UserRepository, UserSummary,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, QueryBuilder};
use tracing::{debug, info};
use uuid::Uuid;

const LISTING_COLUMNS: &str = "l.id, l.title, l.description, l.image_url, l.image_filename, \
     l.price, l.location, l.country, l.categories, l.owner_id, l.review_ids, \
     l.created_at, l.updated_at";

const USER_COLUMNS: &str =
    "id, username, email, password_hash, github_id, google_id, created_at";

#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub async fn connect(uri: &str, max_connections: u32) -> DomainResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(uri)
            .await
            .map_err(db_error)?;
        info!(max_connections, "connected to postgres");
        Ok(Self { pool })
    }

    /// Applies any pending migrations from `migrations/`.
    pub async fn migrate(&self) -> DomainResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DomainError::Storage(format!("migration failed: {e}")))
    }

    pub fn sessions(&self) -> PgSessionStore {
        PgSessionStore {
            pool: self.pool.clone(),
        }
    }

    /// Waits for in-flight queries and closes every connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn db_error(err: sqlx::Error) -> DomainError {
    match err.as_database_error() {
        Some(db) if db.is_unique_violation() => DomainError::Conflict(db.message().to_string()),
        _ => DomainError::Storage(err.to_string()),
    }
}

/// `%term%` with LIKE metacharacters escaped, so the term matches literally.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

// ── Rows ────────────────────────────────────────────────────────────────────

#[derive(Debug, FromRow)]
struct ListingRow {
    id: Uuid,
    title: String,
    description: String,
    image_url: String,
    image_filename: String,
    price: i64,
    location: String,
    country: String,
    categories: Vec<String>,
    owner_id: Option<Uuid>,
    review_ids: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ListingRow> for Listing {
    type Error = DomainError;

    fn try_from(row: ListingRow) -> DomainResult<Self> {
        let categories = row
            .categories
            .iter()
            .map(|c| {
                c.parse::<Category>()
                    .map_err(|_| DomainError::Storage(format!("listing {}: bad category {c:?}", row.id)))
            })
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(Listing {
            id: row.id,
            title: row.title,
            description: row.description,
            image: ImageRef {
                url: row.image_url,
                filename: row.image_filename,
            },
            price: row.price,
            location: row.location,
            country: row.country,
            categories,
            owner_id: row.owner_id,
            review_ids: row.review_ids,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct OwnedRow {
    #[sqlx(flatten)]
    listing: ListingRow,
    owner_ref: Uuid,
    owner_username: String,
    owner_email: String,
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: Option<String>,
    github_id: Option<String>,
    google_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            github_id: row.github_id,
            google_id: row.google_id,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ReviewRow {
    id: Uuid,
    comment: String,
    rating: i16,
    author_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Review {
            id: row.id,
            comment: row.comment,
            rating: row.rating,
            author_id: row.author_id,
            created_at: row.created_at,
        }
    }
}

fn category_names(categories: &[Category]) -> Vec<String> {
    categories.iter().map(|c| c.as_str().to_string()).collect()
}

// ── Listings ────────────────────────────────────────────────────────────────

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ListingFilter) {
    match filter {
        ListingFilter::All => {}
        ListingFilter::TitleContains(term) => {
            qb.push(" WHERE l.title ILIKE ");
            qb.push_bind(like_pattern(term));
            qb.push(" ESCAPE '\\'");
        }
        ListingFilter::CategoryContains(term) => {
            qb.push(" WHERE EXISTS (SELECT 1 FROM unnest(l.categories) AS c WHERE c ILIKE ");
            qb.push_bind(like_pattern(term));
            qb.push(" ESCAPE '\\')");
        }
        ListingFilter::CountryContains(term) => {
            qb.push(" WHERE l.country ILIKE ");
            qb.push_bind(like_pattern(term));
            qb.push(" ESCAPE '\\'");
        }
        ListingFilter::PriceAtMost(limit) => {
            qb.push(" WHERE l.price <= ");
            qb.push_bind(*limit);
        }
        ListingFilter::InCategory(category) => {
            qb.push(" WHERE ");
            qb.push_bind(category.as_str());
            qb.push(" = ANY(l.categories)");
        }
    }
}

fn order_clause(order: ListingOrder) -> &'static str {
    match order {
        ListingOrder::Natural => " ORDER BY l.created_at ASC, l.id ASC",
        ListingOrder::NewestFirst => " ORDER BY l.created_at DESC, l.id DESC",
        ListingOrder::PriceAscending => " ORDER BY l.price ASC, l.created_at ASC, l.id ASC",
    }
}

#[async_trait]
impl ListingRepository for PgDatabase {
    async fn insert(&self, listing: &Listing) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO listings (id, title, description, image_url, image_filename, price, \
             location, country, categories, owner_id, review_ids, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(listing.id)
        .bind(&listing.title)
        .bind(&listing.description)
        .bind(&listing.image.url)
        .bind(&listing.image.filename)
        .bind(listing.price)
        .bind(&listing.location)
        .bind(&listing.country)
        .bind(category_names(&listing.categories))
        .bind(listing.owner_id)
        .bind(&listing.review_ids)
        .bind(listing.created_at)
        .bind(listing.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Listing>> {
        let row: Option<ListingRow> =
            sqlx::query_as(&format!("SELECT {LISTING_COLUMNS} FROM listings l WHERE l.id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        row.map(Listing::try_from).transpose()
    }

    async fn update(&self, listing: &Listing) -> DomainResult<bool> {
        let result = sqlx::query(
            "UPDATE listings SET title = $2, description = $3, image_url = $4, \
             image_filename = $5, price = $6, location = $7, country = $8, categories = $9, \
             updated_at = $10 WHERE id = $1",
        )
        .bind(listing.id)
        .bind(&listing.title)
        .bind(&listing.description)
        .bind(&listing.image.url)
        .bind(&listing.image.filename)
        .bind(listing.price)
        .bind(&listing.location)
        .bind(&listing.country)
        .bind(category_names(&listing.categories))
        .bind(listing.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> DomainResult<Option<Listing>> {
        let row: Option<ListingRow> = sqlx::query_as(&format!(
            "DELETE FROM listings l WHERE l.id = $1 RETURNING {LISTING_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        row.map(Listing::try_from).transpose()
    }

    async fn find_owned(&self, query: &ListingQuery) -> DomainResult<Vec<OwnedListing>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {LISTING_COLUMNS}, u.id AS owner_ref, u.username AS owner_username, \
             u.email AS owner_email FROM listings l JOIN users u ON u.id = l.owner_id"
        ));
        push_filter(&mut qb, &query.filter);
        qb.push(order_clause(query.order));
        debug!(sql = qb.sql(), "listing query");

        let rows: Vec<OwnedRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        rows.into_iter()
            .map(|row| -> DomainResult<OwnedListing> {
                Ok(OwnedListing {
                    listing: Listing::try_from(row.listing)?,
                    owner: UserSummary {
                        id: row.owner_ref,
                        username: row.owner_username,
                        email: row.owner_email,
                    },
                })
            })
            .collect()
    }

    async fn list_all(&self) -> DomainResult<Vec<Listing>> {
        let rows: Vec<ListingRow> = sqlx::query_as(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings l ORDER BY l.created_at ASC, l.id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        rows.into_iter().map(Listing::try_from).collect()
    }

    async fn delete_many(&self, ids: &[Uuid]) -> DomainResult<u64> {
        let result = sqlx::query("DELETE FROM listings WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected())
    }

    async fn push_review(&self, listing_id: Uuid, review_id: Uuid) -> DomainResult<bool> {
        let result = sqlx::query(
            "UPDATE listings SET review_ids = array_append(review_ids, $2), updated_at = now() \
             WHERE id = $1",
        )
        .bind(listing_id)
        .bind(review_id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn pull_review(&self, listing_id: Uuid, review_id: Uuid) -> DomainResult<bool> {
        let result = sqlx::query(
            "UPDATE listings SET review_ids = array_remove(review_ids, $2), updated_at = now() \
             WHERE id = $1",
        )
        .bind(listing_id)
        .bind(review_id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}

// ── Users ───────────────────────────────────────────────────────────────────

#[async_trait]
impl UserRepository for PgDatabase {
    async fn insert(&self, user: &User) -> DomainResult<()> {
        sqlx::query(&format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
        ))
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.github_id)
        .bind(&user.google_id)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(row.map(User::from))
    }

    async fn find_by_username(&self, username: &str) -> DomainResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
                .bind(username)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(row.map(User::from))
    }

    async fn find_by_external_id(
        &self,
        provider: OAuthProvider,
        external_id: &str,
    ) -> DomainResult<Option<User>> {
        let column = match provider {
            OAuthProvider::GitHub => "github_id",
            OAuthProvider::Google => "google_id",
        };
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1"))
                .bind(external_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(row.map(User::from))
    }

    async fn summaries(&self, ids: &[Uuid]) -> DomainResult<Vec<UserSummary>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<(Uuid, String, String)> =
            sqlx::query_as("SELECT id, username, email FROM users WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(rows
            .into_iter()
            .map(|(id, username, email)| UserSummary {
                id,
                username,
                email,
            })
            .collect())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}

// ── Reviews ─────────────────────────────────────────────────────────────────

#[async_trait]
impl ReviewRepository for PgDatabase {
    async fn insert(&self, review: &Review) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO reviews (id, comment, rating, author_id, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(review.id)
        .bind(&review.comment)
        .bind(review.rating)
        .bind(review.author_id)
        .bind(review.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Review>> {
        let row: Option<ReviewRow> = sqlx::query_as(
            "SELECT id, comment, rating, author_id, created_at FROM reviews WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.map(Review::from))
    }

    async fn get_many(&self, ids: &[Uuid]) -> DomainResult<Vec<Review>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<ReviewRow> = sqlx::query_as(
            "SELECT id, comment, rating, author_id, created_at FROM reviews WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows.into_iter().map(Review::from).collect())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<bool> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_many(&self, ids: &[Uuid]) -> DomainResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM reviews WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected())
    }
}

// ── Sessions ────────────────────────────────────────────────────────────────

/// Sessions persisted in the `sessions` table; survives restarts.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn load(&self, id: &str) -> DomainResult<Option<SessionData>> {
        let row: Option<(Json<SessionData>,)> =
            sqlx::query_as("SELECT data FROM sessions WHERE id = $1 AND expires_at > now()")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(row.map(|(Json(data),)| data))
    }

    async fn save(
        &self,
        id: &str,
        data: &SessionData,
        expires_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO sessions (id, data, expires_at) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data, expires_at = EXCLUDED.expires_at",
        )
        .bind(id)
        .bind(Json(data))
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn destroy(&self, id: &str) -> DomainResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn purge_expired(&self) -> DomainResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected())
    }
}
