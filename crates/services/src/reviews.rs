//! Reviews are a nested resource of a listing: the review document lives in
//! its own collection and the listing keeps the ordered id list.

use std::sync::Arc;

use domains::{
    DomainError, DomainResult, ListingRepository, NewReview, OwnershipPolicy, Review,
    ReviewRepository,
};
use tracing::info;
use uuid::Uuid;

use crate::listings::parse_listing_id;

pub const INVALID_REVIEW_ID: &str = "Invalid review ID!";

#[derive(Clone)]
pub struct ReviewService {
    listings: Arc<dyn ListingRepository>,
    reviews: Arc<dyn ReviewRepository>,
    policy: OwnershipPolicy,
}

impl ReviewService {
    pub fn new(
        listings: Arc<dyn ListingRepository>,
        reviews: Arc<dyn ReviewRepository>,
        policy: OwnershipPolicy,
    ) -> Self {
        Self {
            listings,
            reviews,
            policy,
        }
    }

    pub async fn create(
        &self,
        author_id: Uuid,
        raw_listing_id: &str,
        input: NewReview,
    ) -> DomainResult<Review> {
        let listing_id = parse_listing_id(raw_listing_id)?;
        input.check()?;

        if self.listings.get(listing_id).await?.is_none() {
            return Err(DomainError::not_found("listing", listing_id));
        }

        let review = Review::new(author_id, input);
        self.reviews.insert(&review).await?;
        if !self.listings.push_review(listing_id, review.id).await? {
            // listing vanished between the check and the push
            self.reviews.delete(review.id).await?;
            return Err(DomainError::not_found("listing", listing_id));
        }

        info!(listing_id = %listing_id, review_id = %review.id, "review created");
        Ok(review)
    }

    pub async fn delete(
        &self,
        actor: Uuid,
        raw_listing_id: &str,
        raw_review_id: &str,
    ) -> DomainResult<()> {
        let listing_id = parse_listing_id(raw_listing_id)?;
        let review_id = Uuid::parse_str(raw_review_id.trim())
            .map_err(|_| DomainError::validation(INVALID_REVIEW_ID))?;

        let review = self
            .reviews
            .get(review_id)
            .await?
            .ok_or_else(|| DomainError::not_found("review", review_id))?;
        self.policy.authorize_review(actor, &review)?;

        self.listings.pull_review(listing_id, review_id).await?;
        self.reviews.delete(review_id).await?;

        info!(listing_id = %listing_id, review_id = %review_id, "review deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{MockListingRepository, MockReviewRepository};
    use mockall::predicate::eq;

    #[tokio::test]
    async fn review_on_missing_listing_is_not_found() {
        let mut listings = MockListingRepository::new();
        listings.expect_get().returning(|_| Ok(None));
        let mut reviews = MockReviewRepository::new();
        reviews.expect_insert().times(0);

        let svc = ReviewService::new(
            Arc::new(listings),
            Arc::new(reviews),
            OwnershipPolicy::Permissive,
        );
        let id = Uuid::now_v7();
        let result = svc
            .create(
                Uuid::now_v7(),
                &id.to_string(),
                NewReview {
                    comment: "Nice".into(),
                    rating: 4,
                },
            )
            .await;
        assert_eq!(result, Err(DomainError::not_found("listing", id)));
    }

    #[tokio::test]
    async fn delete_pulls_reference_then_removes_review() {
        let listing_id = Uuid::now_v7();
        let author = Uuid::now_v7();
        let review = Review::new(
            author,
            NewReview {
                comment: "Nice".into(),
                rating: 4,
            },
        );
        let review_id = review.id;

        let mut reviews = MockReviewRepository::new();
        reviews
            .expect_get()
            .with(eq(review_id))
            .returning(move |_| Ok(Some(review.clone())));
        reviews
            .expect_delete()
            .with(eq(review_id))
            .times(1)
            .returning(|_| Ok(true));
        let mut listings = MockListingRepository::new();
        listings
            .expect_pull_review()
            .with(eq(listing_id), eq(review_id))
            .times(1)
            .returning(|_, _| Ok(true));

        let svc = ReviewService::new(
            Arc::new(listings),
            Arc::new(reviews),
            OwnershipPolicy::Enforced,
        );
        svc.delete(author, &listing_id.to_string(), &review_id.to_string())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn malformed_review_id_is_rejected() {
        let svc = ReviewService::new(
            Arc::new(MockListingRepository::new()),
            Arc::new(MockReviewRepository::new()),
            OwnershipPolicy::Permissive,
        );
        let result = svc
            .delete(Uuid::now_v7(), &Uuid::now_v7().to_string(), "42")
            .await;
        assert_eq!(result, Err(DomainError::Validation(INVALID_REVIEW_ID.into())));
    }
}
