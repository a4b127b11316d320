//! # ListingService
//!
//! CRUD for listings plus the fallback search chain.
//!
//! Every read path goes through [`ListingRepository::find_owned`] or resolves
//! the owner explicitly, so a listing whose owner was deleted is never handed
//! to a view.

use std::collections::HashMap;
use std::sync::Arc;

use domains::{
    AuthoredReview, Category, DomainError, DomainResult, ImageRef, Listing, ListingChanges,
    ListingDetail, ListingFilter, ListingOrder, ListingQuery, ListingRepository, MediaStorage,
    NewListing, OwnedListing, OwnershipPolicy, Review, ReviewRepository, SearchOutcome,
    SearchStrategy, Upload, UserRepository, UserSummary, THUMBNAIL_WIDTH,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::text;

pub const INVALID_LISTING_ID: &str = "Invalid listing ID!";
pub const EMPTY_SEARCH: &str = "Search value empty !!!";
pub const IMAGE_REQUIRED: &str = "Listing image is required";

/// Parses a path id, rejecting malformed ids before any query runs.
pub fn parse_listing_id(raw: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| DomainError::validation(INVALID_LISTING_ID))
}

/// Builds the ordered strategy list for an already normalized, title-cased
/// term. Nothing is queried here.
pub fn search_plan(term: &str) -> Vec<(SearchStrategy, ListingQuery)> {
    let mut plan = vec![
        (
            SearchStrategy::Title,
            ListingQuery::new(ListingFilter::TitleContains(term.to_string()), ListingOrder::Natural),
        ),
        (
            SearchStrategy::Category,
            ListingQuery::new(
                ListingFilter::CategoryContains(term.to_string()),
                ListingOrder::NewestFirst,
            ),
        ),
        (
            SearchStrategy::Location,
            ListingQuery::new(
                ListingFilter::CountryContains(term.to_string()),
                ListingOrder::NewestFirst,
            ),
        ),
    ];

    if let Some(limit) = text::parse_price_ceiling(term) {
        plan.push((
            SearchStrategy::MaxPrice(limit),
            ListingQuery::new(ListingFilter::PriceAtMost(limit), ListingOrder::PriceAscending),
        ));
    }

    plan
}

#[derive(Clone)]
pub struct ListingService {
    listings: Arc<dyn ListingRepository>,
    users: Arc<dyn UserRepository>,
    reviews: Arc<dyn ReviewRepository>,
    media: Arc<dyn MediaStorage>,
    policy: OwnershipPolicy,
}

impl ListingService {
    pub fn new(
        listings: Arc<dyn ListingRepository>,
        users: Arc<dyn UserRepository>,
        reviews: Arc<dyn ReviewRepository>,
        media: Arc<dyn MediaStorage>,
        policy: OwnershipPolicy,
    ) -> Self {
        Self {
            listings,
            users,
            reviews,
            media,
            policy,
        }
    }

    /// All listings with a resolvable owner, in creation order.
    pub async fn index(&self) -> DomainResult<Vec<OwnedListing>> {
        self.listings.find_owned(&ListingQuery::all()).await
    }

    /// Loads a listing for the show page with its owner and the reviews whose
    /// author still exists, in the listing's review order.
    pub async fn show(&self, raw_id: &str) -> DomainResult<ListingDetail> {
        let id = parse_listing_id(raw_id)?;
        let listing = self
            .listings
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("listing", id))?;
        let owner_id = listing.owner_id.ok_or(DomainError::MissingOwner(id))?;

        let reviews = self.reviews.get_many(&listing.review_ids).await?;

        // 1. Resolve owner and review authors in a single lookup
        let mut people: Vec<Uuid> = reviews.iter().filter_map(|r| r.author_id).collect();
        people.push(owner_id);
        people.sort_unstable();
        people.dedup();
        let resolved: HashMap<Uuid, UserSummary> = self
            .users
            .summaries(&people)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let owner = resolved
            .get(&owner_id)
            .cloned()
            .ok_or(DomainError::MissingOwner(id))?;

        // 2. Keep the listing's order, drop reviews whose author is gone
        let mut by_id: HashMap<Uuid, Review> = reviews.into_iter().map(|r| (r.id, r)).collect();
        let reviews: Vec<AuthoredReview> = listing
            .review_ids
            .iter()
            .filter_map(|rid| by_id.remove(rid))
            .filter_map(|review| {
                let author = review.author_id.and_then(|a| resolved.get(&a)).cloned()?;
                Some(AuthoredReview { review, author })
            })
            .collect();

        Ok(ListingDetail {
            listing,
            owner,
            reviews,
        })
    }

    pub async fn create(
        &self,
        owner_id: Uuid,
        input: NewListing,
        image: Option<Upload>,
    ) -> DomainResult<Listing> {
        input.check()?;
        let upload = image.ok_or_else(|| DomainError::validation(IMAGE_REQUIRED))?;
        ensure_image(&upload)?;

        let image = self.media.store(upload).await?;
        let listing = Listing::new(owner_id, input, image);

        if let Err(err) = self.listings.insert(&listing).await {
            self.discard_image(&listing.image).await;
            return Err(err);
        }

        info!(listing_id = %listing.id, owner_id = %owner_id, "listing created");
        Ok(listing)
    }

    /// Returns the stored listing plus the preview URL for its current image.
    pub async fn edit_form(&self, actor: Uuid, raw_id: &str) -> DomainResult<(Listing, String)> {
        let listing = self.load(raw_id).await?;
        self.policy.authorize_listing(actor, &listing)?;
        let preview = listing.image.thumbnail_url(THUMBNAIL_WIDTH);
        Ok((listing, preview))
    }

    /// Merges submitted fields; a new upload replaces the image reference.
    pub async fn update(
        &self,
        actor: Uuid,
        raw_id: &str,
        changes: ListingChanges,
        image: Option<Upload>,
    ) -> DomainResult<Listing> {
        let mut listing = self.load(raw_id).await?;
        changes.check()?;
        self.policy.authorize_listing(actor, &listing)?;

        listing.apply(changes);

        let replaced = match image {
            Some(upload) => {
                ensure_image(&upload)?;
                let stored = self.media.store(upload).await?;
                Some(std::mem::replace(&mut listing.image, stored))
            }
            None => None,
        };

        let saved = match self.listings.update(&listing).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(DomainError::not_found("listing", listing.id)),
            Err(err) => Err(err),
        };
        if let Err(err) = saved {
            // the new upload was never referenced
            if replaced.is_some() {
                self.discard_image(&listing.image).await;
            }
            return Err(err);
        }

        if let Some(old) = replaced {
            self.discard_image(&old).await;
        }

        info!(listing_id = %listing.id, actor = %actor, "listing updated");
        Ok(listing)
    }

    /// Deletes the listing, the reviews it references and its stored image.
    pub async fn delete(&self, actor: Uuid, raw_id: &str) -> DomainResult<Listing> {
        let listing = self.load(raw_id).await?;
        self.policy.authorize_listing(actor, &listing)?;

        let deleted = self
            .listings
            .delete(listing.id)
            .await?
            .ok_or_else(|| DomainError::not_found("listing", listing.id))?;

        if !deleted.review_ids.is_empty() {
            let removed = self.reviews.delete_many(&deleted.review_ids).await?;
            debug!(listing_id = %deleted.id, removed, "deleted listing reviews");
        }
        self.discard_image(&deleted.image).await;

        info!(listing_id = %deleted.id, actor = %actor, "listing deleted");
        Ok(deleted)
    }

    /// Exact category membership. Unknown categories behave like empty ones.
    pub async fn by_category(&self, raw: &str) -> DomainResult<Vec<OwnedListing>> {
        let Ok(category) = raw.parse::<Category>() else {
            return Err(DomainError::NoMatches);
        };
        let found = self
            .listings
            .find_owned(&ListingQuery::new(
                ListingFilter::InCategory(category),
                ListingOrder::Natural,
            ))
            .await?;
        if found.is_empty() {
            return Err(DomainError::NoMatches);
        }
        Ok(found)
    }

    /// Runs the fallback chain: title, category, country, then price. The
    /// first stage with any hit wins; later stages are never queried.
    pub async fn search(&self, raw: &str) -> DomainResult<SearchOutcome> {
        let normalized =
            text::normalize_query(raw).ok_or_else(|| DomainError::validation(EMPTY_SEARCH))?;
        let term = text::title_case(&normalized);

        for (strategy, query) in search_plan(&term) {
            let listings = self.listings.find_owned(&query).await?;
            if listings.is_empty() {
                debug!(strategy = strategy.label(), term = %term, "search stage empty");
                continue;
            }
            info!(
                strategy = strategy.label(),
                term = %term,
                hits = listings.len(),
                "search matched"
            );
            return Ok(SearchOutcome {
                strategy,
                term,
                listings,
            });
        }

        Err(DomainError::NoMatches)
    }

    async fn load(&self, raw_id: &str) -> DomainResult<Listing> {
        let id = parse_listing_id(raw_id)?;
        self.listings
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("listing", id))
    }

    async fn discard_image(&self, image: &ImageRef) {
        if let Err(err) = self.media.delete(image).await {
            warn!(filename = %image.filename, error = %err, "failed to delete stored image");
        }
    }
}

fn ensure_image(upload: &Upload) -> DomainResult<()> {
    if upload.bytes.is_empty() {
        return Err(DomainError::validation(IMAGE_REQUIRED));
    }
    if upload.content_type.type_() != mime::IMAGE {
        return Err(DomainError::validation("Uploaded file must be an image"));
    }
    Ok(())
}
