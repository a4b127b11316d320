//! # Views
//!
//! Askama page templates and the flattened view models they render. Anything
//! that needs formatting (prices, links, thumbnails) is done here so the
//! templates stay logic-free.

use askama::Template;
use domains::{
    Category, FlashKind, FlashMessage, Listing, ListingDetail, OwnedListing, UserSummary,
};
use uuid::Uuid;

/// Formats a whole-rupee amount with Indian digit grouping
/// (`1234567` -> `"12,34,567"`).
pub fn format_inr(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let sign = if amount < 0 { "-" } else { "" };
    if digits.len() <= 3 {
        return format!("{sign}{digits}");
    }

    let (head, last3) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(2);
        groups.push(&head[start..end]);
        end = start;
    }
    groups.reverse();
    format!("{sign}{},{last3}", groups.join(","))
}

fn category_href(category: Category) -> String {
    format!("/listings/category/{}", category.as_str().replace(' ', "%20"))
}

// ── Layout ──────────────────────────────────────────────────────────────────

pub struct FlashView {
    pub class: &'static str,
    pub text: String,
}

impl From<FlashMessage> for FlashView {
    fn from(msg: FlashMessage) -> Self {
        let class = match msg.kind {
            FlashKind::Success => "alert-success",
            FlashKind::Error => "alert-danger",
        };
        FlashView {
            class,
            text: msg.text,
        }
    }
}

/// Shared chrome: navbar user and one-shot flash messages.
#[derive(Default)]
pub struct Layout {
    pub current_user: Option<UserSummary>,
    pub flashes: Vec<FlashView>,
    pub github_login: bool,
    pub google_login: bool,
}

impl Layout {
    pub fn new(current_user: Option<UserSummary>, flashes: Vec<FlashMessage>) -> Self {
        Self {
            current_user,
            flashes: flashes.into_iter().map(FlashView::from).collect(),
            ..Self::default()
        }
    }

    pub fn with_providers(mut self, github: bool, google: bool) -> Self {
        self.github_login = github;
        self.google_login = google;
        self
    }

    fn is(&self, user: Option<Uuid>) -> bool {
        match (&self.current_user, user) {
            (Some(me), Some(them)) => me.id == them,
            _ => false,
        }
    }
}

// ── View models ─────────────────────────────────────────────────────────────

pub struct CategoryLink {
    pub name: &'static str,
    pub href: String,
    pub active: bool,
}

pub fn category_links(active: Option<&str>) -> Vec<CategoryLink> {
    Category::ALL
        .into_iter()
        .map(|c| CategoryLink {
            name: c.as_str(),
            href: category_href(c),
            active: active == Some(c.as_str()),
        })
        .collect()
}

pub struct CategoryOption {
    pub name: &'static str,
    pub checked: bool,
}

pub fn category_options(selected: &[Category]) -> Vec<CategoryOption> {
    Category::ALL
        .into_iter()
        .map(|c| CategoryOption {
            name: c.as_str(),
            checked: selected.contains(&c),
        })
        .collect()
}

pub struct ListingCard {
    pub href: String,
    pub title: String,
    pub image_url: String,
    pub price: String,
    pub location: String,
    pub country: String,
}

impl From<&OwnedListing> for ListingCard {
    fn from(owned: &OwnedListing) -> Self {
        let l = &owned.listing;
        ListingCard {
            href: format!("/listings/{}", l.id),
            title: l.title.clone(),
            image_url: l.image.url.clone(),
            price: format_inr(l.price),
            location: l.location.clone(),
            country: l.country.clone(),
        }
    }
}

pub struct ListingView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub price: String,
    pub raw_price: i64,
    pub location: String,
    pub country: String,
    pub categories: Vec<&'static str>,
}

impl From<&Listing> for ListingView {
    fn from(l: &Listing) -> Self {
        ListingView {
            id: l.id.to_string(),
            title: l.title.clone(),
            description: l.description.clone(),
            image_url: l.image.url.clone(),
            price: format_inr(l.price),
            raw_price: l.price,
            location: l.location.clone(),
            country: l.country.clone(),
            categories: l.categories.iter().map(|c| c.as_str()).collect(),
        }
    }
}

pub struct ReviewView {
    pub id: String,
    pub comment: String,
    pub rating: i16,
    pub stars: String,
    pub author: String,
    pub posted: String,
    pub can_delete: bool,
}

// ── Pages ───────────────────────────────────────────────────────────────────

#[derive(Template)]
#[template(path = "listings/index.html")]
pub struct IndexPage {
    pub layout: Layout,
    pub notice: Option<String>,
    pub categories: Vec<CategoryLink>,
    pub listings: Vec<ListingCard>,
}

impl IndexPage {
    pub fn new(layout: Layout, listings: &[OwnedListing], notice: Option<String>) -> Self {
        Self {
            layout,
            notice,
            categories: category_links(None),
            listings: listings.iter().map(ListingCard::from).collect(),
        }
    }

    pub fn for_category(mut self, name: &str) -> Self {
        self.categories = category_links(Some(name));
        self
    }
}

#[derive(Template)]
#[template(path = "listings/show.html")]
pub struct ShowPage {
    pub layout: Layout,
    pub listing: ListingView,
    pub owner: String,
    pub logged_in: bool,
    pub can_manage: bool,
    pub reviews: Vec<ReviewView>,
}

impl ShowPage {
    pub fn new(layout: Layout, detail: &ListingDetail) -> Self {
        let can_manage = layout.is(detail.listing.owner_id);
        let reviews = detail
            .reviews
            .iter()
            .map(|r| ReviewView {
                id: r.review.id.to_string(),
                comment: r.review.comment.clone(),
                rating: r.review.rating,
                stars: "★".repeat(r.review.rating.clamp(0, 5) as usize),
                author: r.author.username.clone(),
                posted: r.review.created_at.format("%d %b %Y").to_string(),
                can_delete: layout.is(r.review.author_id),
            })
            .collect();
        Self {
            listing: ListingView::from(&detail.listing),
            owner: detail.owner.username.clone(),
            logged_in: layout.current_user.is_some(),
            can_manage,
            reviews,
            layout,
        }
    }
}

#[derive(Template)]
#[template(path = "listings/new.html")]
pub struct NewPage {
    pub layout: Layout,
    pub categories: Vec<CategoryOption>,
}

impl NewPage {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            categories: category_options(&[]),
        }
    }
}

#[derive(Template)]
#[template(path = "listings/edit.html")]
pub struct EditPage {
    pub layout: Layout,
    pub listing: ListingView,
    pub preview_url: String,
    pub categories: Vec<CategoryOption>,
}

impl EditPage {
    pub fn new(layout: Layout, listing: &Listing, preview_url: String) -> Self {
        Self {
            layout,
            listing: ListingView::from(listing),
            preview_url,
            categories: category_options(&listing.categories),
        }
    }
}

#[derive(Template)]
#[template(path = "users/login.html")]
pub struct LoginPage {
    pub layout: Layout,
}

#[derive(Template)]
#[template(path = "users/signup.html")]
pub struct SignupPage {
    pub layout: Layout,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorPage {
    pub layout: Layout,
    pub status: u16,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indian_grouping() {
        assert_eq!(format_inr(0), "0");
        assert_eq!(format_inr(999), "999");
        assert_eq!(format_inr(1200), "1,200");
        assert_eq!(format_inr(123456), "1,23,456");
        assert_eq!(format_inr(1234567), "12,34,567");
        assert_eq!(format_inr(123456789), "12,34,56,789");
        assert_eq!(format_inr(-25000), "-25,000");
    }

    #[test]
    fn category_links_escape_spaces() {
        let links = category_links(Some("Iconic Cities"));
        let iconic = links.iter().find(|l| l.name == "Iconic Cities").unwrap();
        assert_eq!(iconic.href, "/listings/category/Iconic%20Cities");
        assert!(iconic.active);
        assert_eq!(links.iter().filter(|l| l.active).count(), 1);
    }

    #[test]
    fn error_page_renders_message() {
        let page = ErrorPage {
            layout: Layout::default(),
            status: 404,
            message: "Page not found!".into(),
        };
        let html = page.render().unwrap();
        assert!(html.contains("Page not found!"));
        assert!(html.contains("404"));
    }
}
