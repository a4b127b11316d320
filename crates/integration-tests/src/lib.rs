//! Shared fixtures for the cross-crate test suites.
//!
//! Everything runs against the in-memory store; media either goes to a
//! mock or to a temporary directory.

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use domains::{
    Category, ImageRef, Listing, ListingRepository, MediaStorage, MockMediaStorage, NewListing,
    OwnershipPolicy, Upload, User, UserRepository, UserSummary,
};
use fake::faker::address::en::CityName;
use fake::faker::internet::en::SafeEmail;
use fake::faker::lorem::en::Sentence;
use fake::Fake;
use services::{ListingService, OrphanCleanup, ReviewService};
use storage_adapters::MemoryDatabase;
use uuid::Uuid;

pub struct World {
    pub db: Arc<MemoryDatabase>,
    pub listings: ListingService,
    pub reviews: ReviewService,
    pub cleanup: OrphanCleanup,
}

/// Media that accepts anything and hands back a predictable reference.
pub fn accepting_media() -> Arc<dyn MediaStorage> {
    let mut media = MockMediaStorage::new();
    media.expect_store().returning(|upload| {
        let filename = format!("{}-{}", Uuid::now_v7().simple(), upload.file_name);
        Ok(ImageRef {
            url: format!("https://cdn.example.com/image/upload/{filename}"),
            filename,
        })
    });
    media.expect_delete().returning(|_| Ok(()));
    Arc::new(media)
}

pub fn world() -> World {
    world_with(accepting_media(), OwnershipPolicy::Permissive)
}

pub fn world_with(media: Arc<dyn MediaStorage>, policy: OwnershipPolicy) -> World {
    let db = Arc::new(MemoryDatabase::new());
    World {
        listings: ListingService::new(db.clone(), db.clone(), db.clone(), media, policy),
        reviews: ReviewService::new(db.clone(), db.clone(), policy),
        cleanup: OrphanCleanup::new(db.clone(), db.clone()),
        db,
    }
}

impl World {
    /// Stores an account directly, skipping password hashing.
    pub async fn user(&self, username: &str) -> UserSummary {
        let user = User {
            id: Uuid::now_v7(),
            username: username.to_string(),
            email: SafeEmail().fake(),
            password_hash: None,
            github_id: None,
            google_id: None,
            created_at: Utc::now(),
        };
        UserRepository::insert(&*self.db, &user)
            .await
            .expect("insert user");
        user.summary()
    }

    pub async fn remove_user(&self, id: Uuid) {
        UserRepository::delete(&*self.db, id)
            .await
            .expect("delete user");
    }

    /// Creates a listing through the service, as the web layer would.
    pub async fn listing(&self, owner: &UserSummary, input: NewListing) -> Listing {
        self.listings
            .create(owner.id, input, Some(png_upload(320, 200)))
            .await
            .expect("create listing")
    }

    pub async fn stored(&self, id: Uuid) -> Option<Listing> {
        ListingRepository::get(&*self.db, id)
            .await
            .expect("read listing")
    }
}

/// A listing with the fields that matter to a test pinned and the rest
/// filled with plausible noise.
pub fn listing_input(title: &str, country: &str, price: i64, categories: &[Category]) -> NewListing {
    NewListing {
        title: title.to_string(),
        description: Sentence(4..9).fake(),
        price,
        location: CityName().fake(),
        country: country.to_string(),
        categories: categories.to_vec(),
    }
}

/// A real PNG, so image sniffing and thumbnailing have something to chew on.
pub fn png_upload(width: u32, height: u32) -> Upload {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([180, 120, 60]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode png");
    Upload {
        file_name: "house.png".into(),
        content_type: mime::IMAGE_PNG,
        bytes: Bytes::from(bytes),
    }
}
