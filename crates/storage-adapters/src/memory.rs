//! # In-memory backend
//!
//! `DashMap`-backed implementation of every persistence port. Selected with
//! `DATABASE_URI=memory://` for local development and used throughout the
//! test suites. Like the document store it stands in for, it keeps no
//! referential integrity: deleting a user leaves their listings and reviews
//! pointing at nothing.

use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use domains::{
    DomainError, DomainResult, Listing, ListingFilter, ListingOrder, ListingQuery,
    ListingRepository, OAuthProvider, OwnedListing, Review, ReviewRepository, SessionData,
    SessionStore, User, UserRepository, UserSummary,
};
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryDatabase {
    listings: DashMap<Uuid, Listing>,
    users: DashMap<Uuid, User>,
    reviews: DashMap<Uuid, Review>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn owner_of(&self, listing: &Listing) -> Option<UserSummary> {
        let owner_id = listing.owner_id?;
        self.users.get(&owner_id).map(|u| u.summary())
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn matches(listing: &Listing, filter: &ListingFilter) -> bool {
    match filter {
        ListingFilter::All => true,
        ListingFilter::TitleContains(term) => contains_ci(&listing.title, term),
        ListingFilter::CategoryContains(term) => listing
            .categories
            .iter()
            .any(|c| contains_ci(c.as_str(), term)),
        ListingFilter::CountryContains(term) => contains_ci(&listing.country, term),
        ListingFilter::PriceAtMost(limit) => listing.price <= *limit,
        ListingFilter::InCategory(category) => listing.categories.contains(category),
    }
}

fn creation_order(a: &Listing, b: &Listing) -> Ordering {
    a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))
}

fn sort_listings(found: &mut [OwnedListing], order: ListingOrder) {
    match order {
        ListingOrder::Natural => found.sort_by(|a, b| creation_order(&a.listing, &b.listing)),
        ListingOrder::NewestFirst => {
            found.sort_by(|a, b| creation_order(&b.listing, &a.listing))
        }
        ListingOrder::PriceAscending => found.sort_by(|a, b| {
            a.listing
                .price
                .cmp(&b.listing.price)
                .then_with(|| creation_order(&a.listing, &b.listing))
        }),
    }
}

#[async_trait]
impl ListingRepository for MemoryDatabase {
    async fn insert(&self, listing: &Listing) -> DomainResult<()> {
        if self.listings.contains_key(&listing.id) {
            return Err(DomainError::Conflict(format!("listing {} exists", listing.id)));
        }
        self.listings.insert(listing.id, listing.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Listing>> {
        Ok(self.listings.get(&id).map(|l| l.clone()))
    }

    async fn update(&self, listing: &Listing) -> DomainResult<bool> {
        match self.listings.get_mut(&listing.id) {
            Some(mut stored) => {
                *stored = listing.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> DomainResult<Option<Listing>> {
        Ok(self.listings.remove(&id).map(|(_, l)| l))
    }

    async fn find_owned(&self, query: &ListingQuery) -> DomainResult<Vec<OwnedListing>> {
        // Snapshot first so no shard lock is held while resolving owners.
        let candidates: Vec<Listing> = self
            .listings
            .iter()
            .filter(|entry| matches(entry.value(), &query.filter))
            .map(|entry| entry.value().clone())
            .collect();

        let mut found: Vec<OwnedListing> = candidates
            .into_iter()
            .filter_map(|listing| {
                let owner = self.owner_of(&listing)?;
                Some(OwnedListing { listing, owner })
            })
            .collect();
        sort_listings(&mut found, query.order);
        Ok(found)
    }

    async fn list_all(&self) -> DomainResult<Vec<Listing>> {
        let mut all: Vec<Listing> = self.listings.iter().map(|e| e.value().clone()).collect();
        all.sort_by(creation_order);
        Ok(all)
    }

    async fn delete_many(&self, ids: &[Uuid]) -> DomainResult<u64> {
        Ok(ids
            .iter()
            .filter(|id| self.listings.remove(id).is_some())
            .count() as u64)
    }

    async fn push_review(&self, listing_id: Uuid, review_id: Uuid) -> DomainResult<bool> {
        match self.listings.get_mut(&listing_id) {
            Some(mut listing) => {
                listing.review_ids.push(review_id);
                listing.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn pull_review(&self, listing_id: Uuid, review_id: Uuid) -> DomainResult<bool> {
        match self.listings.get_mut(&listing_id) {
            Some(mut listing) => {
                listing.review_ids.retain(|id| *id != review_id);
                listing.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl UserRepository for MemoryDatabase {
    async fn insert(&self, user: &User) -> DomainResult<()> {
        let clash = self.users.iter().any(|existing| {
            let existing = existing.value();
            existing.id == user.id
                || existing.username == user.username
                || (user.github_id.is_some() && existing.github_id == user.github_id)
                || (user.google_id.is_some() && existing.google_id == user.google_id)
        });
        if clash {
            return Err(DomainError::Conflict(format!(
                "user {} already exists",
                user.username
            )));
        }
        self.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_by_username(&self, username: &str) -> DomainResult<Option<User>> {
        Ok(self
            .users
            .iter()
            .find(|u| u.username == username)
            .map(|u| u.value().clone()))
    }

    async fn find_by_external_id(
        &self,
        provider: OAuthProvider,
        external_id: &str,
    ) -> DomainResult<Option<User>> {
        Ok(self
            .users
            .iter()
            .find(|u| {
                let linked = match provider {
                    OAuthProvider::GitHub => u.github_id.as_deref(),
                    OAuthProvider::Google => u.google_id.as_deref(),
                };
                linked == Some(external_id)
            })
            .map(|u| u.value().clone()))
    }

    async fn summaries(&self, ids: &[Uuid]) -> DomainResult<Vec<UserSummary>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.users.get(id).map(|u| u.summary()))
            .collect())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<bool> {
        Ok(self.users.remove(&id).is_some())
    }
}

#[async_trait]
impl ReviewRepository for MemoryDatabase {
    async fn insert(&self, review: &Review) -> DomainResult<()> {
        self.reviews.insert(review.id, review.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Review>> {
        Ok(self.reviews.get(&id).map(|r| r.clone()))
    }

    async fn get_many(&self, ids: &[Uuid]) -> DomainResult<Vec<Review>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.reviews.get(id).map(|r| r.clone()))
            .collect())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<bool> {
        Ok(self.reviews.remove(&id).is_some())
    }

    async fn delete_many(&self, ids: &[Uuid]) -> DomainResult<u64> {
        Ok(ids
            .iter()
            .filter(|id| self.reviews.remove(id).is_some())
            .count() as u64)
    }
}

/// Session store that forgets everything on restart.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, (SessionData, DateTime<Utc>)>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> DomainResult<Option<SessionData>> {
        let expired = match self.sessions.get(id) {
            None => return Ok(None),
            Some(entry) if entry.1 > Utc::now() => return Ok(Some(entry.0.clone())),
            Some(_) => true,
        };
        if expired {
            self.sessions.remove(id);
        }
        Ok(None)
    }

    async fn save(
        &self,
        id: &str,
        data: &SessionData,
        expires_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.sessions
            .insert(id.to_string(), (data.clone(), expires_at));
        Ok(())
    }

    async fn destroy(&self, id: &str) -> DomainResult<()> {
        self.sessions.remove(id);
        Ok(())
    }

    async fn purge_expired(&self) -> DomainResult<u64> {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, (_, expires_at)| *expires_at > now);
        Ok((before - self.sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use domains::{Category, ImageRef};

    fn user(name: &str) -> User {
        User {
            id: Uuid::now_v7(),
            username: name.into(),
            email: format!("{name}@example.com"),
            password_hash: None,
            github_id: None,
            google_id: None,
            created_at: Utc::now(),
        }
    }

    fn listing(owner: &User, title: &str, price: i64, age_minutes: i64) -> Listing {
        let created = Utc::now() - Duration::minutes(age_minutes);
        Listing {
            id: Uuid::now_v7(),
            title: title.into(),
            description: "d".into(),
            image: ImageRef {
                url: "/media/upload/x.png".into(),
                filename: "x.png".into(),
            },
            price,
            location: "Somewhere".into(),
            country: "Italy".into(),
            categories: vec![Category::Castles],
            owner_id: Some(owner.id),
            review_ids: vec![],
            created_at: created,
            updated_at: created,
        }
    }

    #[tokio::test]
    async fn orphans_never_come_back_from_queries() {
        let db = MemoryDatabase::new();
        let (alice, bob) = (user("alice"), user("bob"));
        UserRepository::insert(&db, &alice).await.unwrap();
        UserRepository::insert(&db, &bob).await.unwrap();
        ListingRepository::insert(&db, &listing(&alice, "Castle A", 10, 2)).await.unwrap();
        ListingRepository::insert(&db, &listing(&bob, "Castle B", 20, 1)).await.unwrap();

        UserRepository::delete(&db, bob.id).await.unwrap();

        let found = db.find_owned(&ListingQuery::all()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].owner.username, "alice");
        // the raw document is still there until cleanup runs
        assert_eq!(db.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn orders_are_applied() {
        let db = MemoryDatabase::new();
        let alice = user("alice");
        UserRepository::insert(&db, &alice).await.unwrap();
        let old = listing(&alice, "Old", 300, 30);
        let new = listing(&alice, "New", 100, 1);
        ListingRepository::insert(&db, &new).await.unwrap();
        ListingRepository::insert(&db, &old).await.unwrap();

        let newest = db
            .find_owned(&ListingQuery::new(
                ListingFilter::CountryContains("ital".into()),
                ListingOrder::NewestFirst,
            ))
            .await
            .unwrap();
        assert_eq!(newest[0].listing.id, new.id);

        let natural = db.find_owned(&ListingQuery::all()).await.unwrap();
        assert_eq!(natural[0].listing.id, old.id);

        let cheap = db
            .find_owned(&ListingQuery::new(
                ListingFilter::PriceAtMost(300),
                ListingOrder::PriceAscending,
            ))
            .await
            .unwrap();
        assert_eq!(cheap[0].listing.price, 100);
    }

    #[tokio::test]
    async fn text_filters_are_literal() {
        let db = MemoryDatabase::new();
        let alice = user("alice");
        UserRepository::insert(&db, &alice).await.unwrap();
        ListingRepository::insert(&db, &listing(&alice, "Tower House", 10, 1))
            .await
            .unwrap();

        let wildcard = db
            .find_owned(&ListingQuery::new(
                ListingFilter::TitleContains(".*".into()),
                ListingOrder::Natural,
            ))
            .await
            .unwrap();
        assert!(wildcard.is_empty());
    }

    #[tokio::test]
    async fn duplicate_usernames_conflict() {
        let db = MemoryDatabase::new();
        UserRepository::insert(&db, &user("alice")).await.unwrap();
        let err = UserRepository::insert(&db, &user("alice")).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn expired_sessions_are_dropped() {
        let store = MemorySessionStore::new();
        store
            .save("s1", &SessionData::default(), Utc::now() - Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(store.load("s1").await.unwrap(), None);
        store
            .save("s2", &SessionData::default(), Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        assert!(store.load("s2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn purge_sweeps_only_expired_sessions() {
        let store = MemorySessionStore::new();
        for (id, offset) in [("old-1", -60), ("old-2", -1), ("live", 3600)] {
            store
                .save(id, &SessionData::default(), Utc::now() + Duration::seconds(offset))
                .await
                .unwrap();
        }

        assert_eq!(store.purge_expired().await.unwrap(), 2);
        assert!(store.load("live").await.unwrap().is_some());
        assert_eq!(store.purge_expired().await.unwrap(), 0);
    }
}
