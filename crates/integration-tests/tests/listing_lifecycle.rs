use domains::{Category, DomainError, ListingRepository, NewReview, OwnershipPolicy};
use integration_tests::{accepting_media, listing_input, world, world_with};

#[tokio::test]
async fn delete_then_read_is_not_found() {
    let w = world();
    let host = w.user("host").await;
    let listing = w
        .listing(&host, listing_input("Cozy Cottage", "Canada", 1200, &[Category::Farms]))
        .await;
    let id = listing.id.to_string();

    let detail = w.listings.show(&id).await.unwrap();
    assert_eq!(detail.owner.username, "host");

    w.listings.delete(host.id, &id).await.unwrap();
    assert_eq!(
        w.listings.show(&id).await,
        Err(DomainError::not_found("listing", listing.id))
    );
    assert_eq!(
        w.listings.delete(host.id, &id).await,
        Err(DomainError::not_found("listing", listing.id))
    );
}

#[tokio::test]
async fn show_rejects_malformed_ids() {
    let w = world();
    assert_eq!(
        w.listings.show("12345").await,
        Err(DomainError::Validation("Invalid listing ID!".into()))
    );
}

#[tokio::test]
async fn reviews_keep_order_and_drop_missing_authors() {
    let w = world();
    let host = w.user("host").await;
    let alice = w.user("alice").await;
    let bob = w.user("bob").await;
    let listing = w
        .listing(&host, listing_input("Sea View", "Portugal", 2200, &[Category::AmazingPools]))
        .await;
    let id = listing.id.to_string();

    let first = w
        .reviews
        .create(alice.id, &id, NewReview { comment: "Wonderful".into(), rating: 5 })
        .await
        .unwrap();
    w.reviews
        .create(bob.id, &id, NewReview { comment: "Noisy".into(), rating: 2 })
        .await
        .unwrap();
    let third = w
        .reviews
        .create(alice.id, &id, NewReview { comment: "Came back".into(), rating: 4 })
        .await
        .unwrap();

    w.remove_user(bob.id).await;

    let detail = w.listings.show(&id).await.unwrap();
    let shown: Vec<_> = detail.reviews.iter().map(|r| r.review.id).collect();
    assert_eq!(shown, vec![first.id, third.id]);
    assert!(detail.reviews.iter().all(|r| r.author.id == alice.id));
}

#[tokio::test]
async fn deleting_a_listing_removes_its_reviews() {
    let w = world();
    let host = w.user("host").await;
    let guest = w.user("guest").await;
    let listing = w
        .listing(&host, listing_input("Treehouse", "Costa Rica", 1800, &[Category::Camping]))
        .await;
    let id = listing.id.to_string();
    let review = w
        .reviews
        .create(guest.id, &id, NewReview { comment: "Magical".into(), rating: 5 })
        .await
        .unwrap();

    w.listings.delete(host.id, &id).await.unwrap();
    assert_eq!(
        w.reviews.delete(guest.id, &id, &review.id.to_string()).await,
        Err(DomainError::not_found("review", review.id))
    );
}

#[tokio::test]
async fn update_merges_fields_and_keeps_reviews() {
    let w = world();
    let host = w.user("host").await;
    let listing = w
        .listing(&host, listing_input("Old Name", "Peru", 1000, &[Category::Mountains]))
        .await;
    let id = listing.id.to_string();
    w.reviews
        .create(host.id, &id, NewReview { comment: "Fine".into(), rating: 3 })
        .await
        .unwrap();

    let changes = listing_input("New Name", "Peru", 1100, &[Category::Mountains, Category::Trending]);
    let updated = w.listings.update(host.id, &id, changes, None).await.unwrap();
    assert_eq!(updated.title, "New Name");
    assert_eq!(updated.image, listing.image);

    let stored = w.stored(listing.id).await.unwrap();
    assert_eq!(stored.price, 1100);
    assert_eq!(stored.review_ids.len(), 1);
}

#[tokio::test]
async fn enforced_policy_guards_listing_changes() {
    let w = world_with(accepting_media(), OwnershipPolicy::Enforced);
    let host = w.user("host").await;
    let intruder = w.user("intruder").await;
    let listing = w
        .listing(&host, listing_input("Guarded", "Japan", 3000, &[Category::IconicCities]))
        .await;
    let id = listing.id.to_string();

    assert!(matches!(
        w.listings.delete(intruder.id, &id).await,
        Err(DomainError::Forbidden(_))
    ));
    assert!(w.stored(listing.id).await.is_some());

    assert!(matches!(
        w.listings.edit_form(intruder.id, &id).await,
        Err(DomainError::Forbidden(_))
    ));
    let (_, preview) = w.listings.edit_form(host.id, &id).await.unwrap();
    assert!(preview.contains("/upload/w_250/"));

    w.listings.delete(host.id, &id).await.unwrap();
    assert!(ListingRepository::get(&*w.db, listing.id).await.unwrap().is_none());
}

#[tokio::test]
async fn missing_image_is_a_validation_error() {
    let w = world();
    let host = w.user("host").await;
    let result = w
        .listings
        .create(host.id, listing_input("No Photo", "Chad", 10, &[]), None)
        .await;
    assert_eq!(
        result,
        Err(DomainError::Validation("Listing image is required".into()))
    );
}
