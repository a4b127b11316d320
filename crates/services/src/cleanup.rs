//! Out-of-band removal of listings whose owner no longer exists.
//!
//! Not part of the request path; run by the `cleanup` binary. Deletes are by
//! id, so a second pass (or a concurrent one) finds nothing further to do.

use std::collections::HashSet;
use std::sync::Arc;

use domains::{CleanupReport, DomainResult, ListingRepository, UserRepository};
use tracing::info;
use uuid::Uuid;

pub struct OrphanCleanup {
    listings: Arc<dyn ListingRepository>,
    users: Arc<dyn UserRepository>,
}

impl OrphanCleanup {
    pub fn new(listings: Arc<dyn ListingRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { listings, users }
    }

    pub async fn run(&self) -> DomainResult<CleanupReport> {
        // 1. Scan
        let all = self.listings.list_all().await?;
        info!(total = all.len(), "scanning listings for orphaned owners");

        // 2. Resolve every distinct owner once
        let mut owner_ids: Vec<Uuid> = all.iter().filter_map(|l| l.owner_id).collect();
        owner_ids.sort_unstable();
        owner_ids.dedup();
        let existing: HashSet<Uuid> = self
            .users
            .summaries(&owner_ids)
            .await?
            .into_iter()
            .map(|u| u.id)
            .collect();

        let orphans: Vec<Uuid> = all
            .iter()
            .filter(|l| !l.owner_id.is_some_and(|owner| existing.contains(&owner)))
            .map(|l| l.id)
            .collect();

        if orphans.is_empty() {
            info!("no orphaned listings found");
            return Ok(CleanupReport {
                scanned: all.len(),
                orphaned: 0,
                deleted: 0,
                remaining: all.len(),
            });
        }

        // 3. One batch delete
        info!(count = orphans.len(), "deleting listings without a valid owner");
        let deleted = self.listings.delete_many(&orphans).await?;
        let remaining = self.listings.list_all().await?.len();

        info!(deleted, remaining, "cleanup completed");
        Ok(CleanupReport {
            scanned: all.len(),
            orphaned: orphans.len(),
            deleted,
            remaining,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domains::{
        ImageRef, Listing, MockListingRepository, MockUserRepository, UserSummary,
    };

    fn listing(owner: Option<Uuid>) -> Listing {
        Listing {
            id: Uuid::now_v7(),
            title: "Cabin".into(),
            description: "Woods".into(),
            image: ImageRef {
                url: "/media/upload/c.png".into(),
                filename: "c.png".into(),
            },
            price: 10,
            location: "Banff".into(),
            country: "Canada".into(),
            categories: vec![],
            owner_id: owner,
            review_ids: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn deletes_unset_and_dangling_owners_in_one_batch() {
        let alive = Uuid::now_v7();
        let kept = listing(Some(alive));
        let dangling = listing(Some(Uuid::now_v7()));
        let unset = listing(None);
        let expected = vec![dangling.id, unset.id];

        let mut listings = MockListingRepository::new();
        let first_scan = vec![kept.clone(), dangling, unset];
        let mut scans = vec![vec![kept], first_scan];
        listings
            .expect_list_all()
            .times(2)
            .returning(move || Ok(scans.pop().unwrap_or_default()));
        listings
            .expect_delete_many()
            .withf(move |ids| ids.to_vec() == expected)
            .times(1)
            .returning(|ids| Ok(ids.len() as u64));

        let mut users = MockUserRepository::new();
        users.expect_summaries().returning(move |_| {
            Ok(vec![UserSummary {
                id: alive,
                username: "alice".into(),
                email: "a@example.com".into(),
            }])
        });

        let report = OrphanCleanup::new(Arc::new(listings), Arc::new(users))
            .run()
            .await
            .unwrap();
        assert_eq!(
            report,
            CleanupReport {
                scanned: 3,
                orphaned: 2,
                deleted: 2,
                remaining: 1
            }
        );
    }

    #[tokio::test]
    async fn nothing_to_do_skips_delete() {
        let mut listings = MockListingRepository::new();
        listings.expect_list_all().returning(|| Ok(vec![]));
        listings.expect_delete_many().times(0);
        let mut users = MockUserRepository::new();
        users.expect_summaries().returning(|_| Ok(vec![]));

        let report = OrphanCleanup::new(Arc::new(listings), Arc::new(users))
            .run()
            .await
            .unwrap();
        assert_eq!(report.deleted, 0);
    }
}
