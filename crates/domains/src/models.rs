//! # Domain Models
//!
//! These structs represent the core entities of Wanderlust.
//! Ids are UUID v7. Listing order is by `created_at`, with the id breaking
//! ties, so "newest first" is descending `(created_at, id)`.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::errors::{DomainError, DomainResult};

/// Width used for the edit-form preview image.
pub const THUMBNAIL_WIDTH: u32 = 250;

/// The enumerated set a listing's categories are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Trending,
    Rooms,
    #[serde(rename = "Iconic Cities")]
    IconicCities,
    Mountains,
    Castles,
    #[serde(rename = "Amazing Pools")]
    AmazingPools,
    Camping,
    Farms,
    Arctic,
    Domes,
    Boats,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Trending,
        Category::Rooms,
        Category::IconicCities,
        Category::Mountains,
        Category::Castles,
        Category::AmazingPools,
        Category::Camping,
        Category::Farms,
        Category::Arctic,
        Category::Domes,
        Category::Boats,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Trending => "Trending",
            Category::Rooms => "Rooms",
            Category::IconicCities => "Iconic Cities",
            Category::Mountains => "Mountains",
            Category::Castles => "Castles",
            Category::AmazingPools => "Amazing Pools",
            Category::Camping => "Camping",
            Category::Farms => "Farms",
            Category::Arctic => "Arctic",
            Category::Domes => "Domes",
            Category::Boats => "Boats",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = DomainError;

    /// Exact match against the display name; membership is case-sensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("Unknown category: {s}")))
    }
}

/// Denormalized reference to a stored image.
///
/// `filename` is the storage identifier used for deletion; `url` is what the
/// browser loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    pub filename: String,
}

impl ImageRef {
    /// Derives a resized variant by rewriting the first `/upload` path segment
    /// (`/upload/x.jpg` -> `/upload/w_250/x.jpg`).
    pub fn thumbnail_url(&self, width: u32) -> String {
        self.url.replacen("/upload", &format!("/upload/w_{width}"), 1)
    }
}

/// A rentable property record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image: ImageRef,
    pub price: i64,
    pub location: String,
    pub country: String,
    pub categories: Vec<Category>,
    /// Must resolve to an existing user for the listing to be visible.
    pub owner_id: Option<Uuid>,
    /// Ordered references to reviews.
    pub review_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    pub fn new(owner_id: Uuid, input: NewListing, image: ImageRef) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            title: input.title,
            description: input.description,
            image,
            price: input.price,
            location: input.location,
            country: input.country,
            categories: input.categories,
            owner_id: Some(owner_id),
            review_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Merges submitted fields into the stored document. The image and the
    /// review list are left untouched.
    pub fn apply(&mut self, changes: ListingChanges) {
        self.title = changes.title;
        self.description = changes.description;
        self.price = changes.price;
        self.location = changes.location;
        self.country = changes.country;
        self.categories = changes.categories;
        self.updated_at = Utc::now();
    }
}

/// A registered account. Credential material never leaves the service layer;
/// views get a [`UserSummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string. `None` for OAuth-only accounts.
    pub password_hash: Option<String>,
    pub github_id: Option<String>,
    pub google_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }
}

/// The "populated" form of a user reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub comment: String,
    /// 1..=5
    pub rating: i16,
    pub author_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Review {
    pub fn new(author_id: Uuid, input: NewReview) -> Self {
        Self {
            id: Uuid::now_v7(),
            comment: input.comment,
            rating: input.rating,
            author_id: Some(author_id),
            created_at: Utc::now(),
        }
    }
}

/// A listing whose owner reference has been resolved. Read paths only ever
/// hand these out, so an orphan cannot reach a view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnedListing {
    pub listing: Listing,
    pub owner: UserSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthoredReview {
    pub review: Review,
    pub author: UserSummary,
}

/// Everything the show page needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingDetail {
    pub listing: Listing,
    pub owner: UserSummary,
    pub reviews: Vec<AuthoredReview>,
}

// ── Boundary input types ────────────────────────────────────────────────────

/// Submitted fields for a new listing, validated before persistence.
#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct NewListing {
    #[validate(custom(function = "not_blank", message = "\"title\" is required"))]
    pub title: String,
    #[validate(custom(function = "not_blank", message = "\"description\" is required"))]
    pub description: String,
    #[validate(range(min = 0, message = "Price must not be negative"))]
    pub price: i64,
    #[validate(custom(function = "not_blank", message = "\"location\" is required"))]
    pub location: String,
    #[validate(custom(function = "not_blank", message = "\"country\" is required"))]
    pub country: String,
    #[serde(default)]
    pub categories: Vec<Category>,
}

impl NewListing {
    pub fn check(&self) -> DomainResult<()> {
        self.validate()
            .map_err(|e| first_failure(&e, &["title", "description", "location", "country", "price"]))
    }
}

/// Edits share the create schema; the image is handled separately.
pub type ListingChanges = NewListing;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Validate)]
pub struct NewReview {
    #[validate(custom(function = "not_blank", message = "\"comment\" is required"))]
    pub comment: String,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i16,
}

impl NewReview {
    pub fn check(&self) -> DomainResult<()> {
        self.validate()
            .map_err(|e| first_failure(&e, &["comment", "rating"]))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Validate)]
pub struct NewUser {
    #[validate(custom(function = "not_blank", message = "\"username\" is required"))]
    pub username: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(custom(function = "not_blank", message = "\"password\" is required"))]
    pub password: String,
}

impl NewUser {
    pub fn check(&self) -> DomainResult<()> {
        self.validate()
            .map_err(|e| first_failure(&e, &["username", "password", "email"]))
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Reports the first failing field, in form order, as the user-facing message.
fn first_failure(errors: &ValidationErrors, order: &[&str]) -> DomainError {
    let fields = errors.field_errors();
    order
        .iter()
        .filter_map(|field| fields.get(*field))
        .flat_map(|failures| failures.iter())
        .find_map(|failure| failure.message.as_ref())
        .map(|message| DomainError::validation(message.to_string()))
        .unwrap_or_else(|| DomainError::validation(errors.to_string()))
}

/// Raw uploaded file as received from a multipart form.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: mime::Mime,
    pub bytes: Bytes,
}

// ── Identity ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    GitHub,
    Google,
}

impl OAuthProvider {
    pub fn slug(&self) -> &'static str {
        match self {
            OAuthProvider::GitHub => "github",
            OAuthProvider::Google => "google",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            OAuthProvider::GitHub => "GitHub",
            OAuthProvider::Google => "Google",
        }
    }
}

impl FromStr for OAuthProvider {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(OAuthProvider::GitHub),
            "google" => Ok(OAuthProvider::Google),
            other => Err(DomainError::not_found("identity provider", other)),
        }
    }
}

/// What an identity provider tells us about the person who just signed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProfile {
    pub provider: OAuthProvider,
    pub external_id: String,
    pub username: String,
    pub email: Option<String>,
}

// ── Queries ─────────────────────────────────────────────────────────────────

/// Predicate half of a listing query. Text terms are literal substrings,
/// matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingFilter {
    All,
    TitleContains(String),
    CategoryContains(String),
    CountryContains(String),
    PriceAtMost(i64),
    InCategory(Category),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingOrder {
    /// Creation order, oldest first.
    Natural,
    NewestFirst,
    PriceAscending,
}

/// A listing query. Every query is implicitly restricted to listings whose
/// owner resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub filter: ListingFilter,
    pub order: ListingOrder,
}

impl ListingQuery {
    pub fn new(filter: ListingFilter, order: ListingOrder) -> Self {
        Self { filter, order }
    }

    pub fn all() -> Self {
        Self::new(ListingFilter::All, ListingOrder::Natural)
    }
}

/// Which stage of the fallback search chain produced the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    Title,
    Category,
    Location,
    MaxPrice(i64),
}

impl SearchStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            SearchStrategy::Title => "title",
            SearchStrategy::Category => "category",
            SearchStrategy::Location => "location",
            SearchStrategy::MaxPrice(_) => "price",
        }
    }

    /// Notice shown above the results.
    pub fn notice(&self) -> String {
        match self {
            SearchStrategy::Title => "Listings searched by Title".to_string(),
            SearchStrategy::Category => "Listings searched by Category".to_string(),
            SearchStrategy::Location => "Listings searched by Location".to_string(),
            SearchStrategy::MaxPrice(limit) => {
                format!("Listings searched for less than Rs {limit}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub strategy: SearchStrategy,
    /// The normalized, title-cased term that was matched.
    pub term: String,
    pub listings: Vec<OwnedListing>,
}

/// Result of one orphan-cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub scanned: usize,
    pub orphaned: usize,
    pub deleted: u64,
    pub remaining: usize,
}
