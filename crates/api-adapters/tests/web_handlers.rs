use std::sync::Arc;

use api_adapters::{build_router, AppState, Metrics, RouterConfig};
use auth_adapters::{session_key, Argon2Hasher, OAuthProviders};
use axum::body::{to_bytes, Body};
use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use domains::{ImageRef, ListingRepository, MediaStorage, MockMediaStorage, OwnershipPolicy};
use services::{AccountService, ListingService, ReviewService};
use storage_adapters::{MemoryDatabase, MemorySessionStore};
use tower::util::ServiceExt; // for `oneshot`

const BOUNDARY: &str = "wanderlust-test-boundary";

fn app() -> (Router, Arc<MemoryDatabase>) {
    let db = Arc::new(MemoryDatabase::new());

    let mut media = MockMediaStorage::new();
    media.expect_store().returning(|upload| {
        Ok(ImageRef {
            url: format!("/media/upload/{}", upload.file_name),
            filename: upload.file_name,
        })
    });
    media.expect_delete().returning(|_| Ok(()));
    let media: Arc<dyn MediaStorage> = Arc::new(media);

    let policy = OwnershipPolicy::Permissive;
    let state = AppState {
        listings: ListingService::new(db.clone(), db.clone(), db.clone(), media, policy),
        reviews: ReviewService::new(db.clone(), db.clone(), policy),
        accounts: AccountService::new(db.clone(), Arc::new(Argon2Hasher::default())),
        sessions: Arc::new(MemorySessionStore::new()),
        cookie_key: session_key(b"router-test-secret-0123456789"),
        oauth: OAuthProviders::new(),
        metrics: Arc::new(Metrics::new()),
    };
    let config = RouterConfig {
        public_dir: "public".into(),
        upload_dir: None,
        max_upload_bytes: 1024 * 1024,
    };
    (build_router(state, config), db)
}

/// Replays the session cookie like a browser would.
struct Browser {
    app: Router,
    cookie: Option<String>,
}

impl Browser {
    fn new(app: Router) -> Self {
        Self { app, cookie: None }
    }

    async fn send(&mut self, mut req: Request<Body>) -> Response {
        if let Some(cookie) = &self.cookie {
            req.headers_mut().insert(COOKIE, cookie.parse().unwrap());
        }
        let response = self.app.clone().oneshot(req).await.unwrap();
        if let Some(set) = response.headers().get(SET_COOKIE) {
            let pair = set.to_str().unwrap().split(';').next().unwrap();
            self.cookie = Some(pair.to_string());
        }
        response
    }

    async fn get(&mut self, uri: &str) -> Response {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn post_form(&mut self, uri: &str, body: &str) -> Response {
        let req = Request::post(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    async fn post_multipart(&mut self, uri: &str, body: Vec<u8>) -> Response {
        let req = Request::post(uri)
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap();
        self.send(req).await
    }

    async fn page(&mut self, uri: &str) -> String {
        let response = self.get(uri).await;
        assert_eq!(response.status(), StatusCode::OK, "GET {uri}");
        body_text(response).await
    }

    async fn sign_up(&mut self, username: &str) {
        let body = format!("username={username}&email={username}%40example.com&password=hunter22");
        let response = self.post_form("/signup", &body).await;
        assert_eq!(location(&response), "/listings");
    }
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &Response) -> &str {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    response.headers().get(LOCATION).unwrap().to_str().unwrap()
}

fn listing_multipart(title: &str, price: &str, with_image: bool) -> Vec<u8> {
    let mut body = Vec::new();
    let fields = [
        ("listing[title]", title),
        ("listing[description]", "Quiet place by the water"),
        ("listing[price]", price),
        ("listing[location]", "Lakeside"),
        ("listing[country]", "Canada"),
        ("listing[categories]", "Farms"),
    ];
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if with_image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"listing[image]\"; filename=\"cottage.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(&[0x89, b'P', b'N', b'G', 1, 2, 3]);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

#[tokio::test]
async fn root_redirects_to_index() {
    let (app, _) = app();
    let mut browser = Browser::new(app);
    let response = browser.get("/").await;
    assert_eq!(location(&response), "/listings");
}

#[tokio::test]
async fn invalid_id_flashes_once() {
    let (app, _) = app();
    let mut browser = Browser::new(app);

    let response = browser.get("/listings/not-a-uuid").await;
    assert_eq!(location(&response), "/listings");

    let html = browser.page("/listings").await;
    assert!(html.contains("Invalid listing ID!"));

    let again = browser.page("/listings").await;
    assert!(!again.contains("Invalid listing ID!"));
}

#[tokio::test]
async fn session_cookie_is_signed_and_locked_down() {
    let (app, _) = app();
    let mut browser = Browser::new(app);

    let response = browser.get("/listings/not-a-uuid").await;
    let set = response.headers()[SET_COOKIE].to_str().unwrap().to_string();
    assert!(set.starts_with("wanderlust.sid="));
    assert!(set.contains("HttpOnly"));
    assert!(set.contains("SameSite=Lax"));
    assert!(set.contains("Path=/"));
    assert!(set.contains("Max-Age=604800"));

    // a cookie whose id was altered no longer matches its signature
    let genuine = browser.cookie.clone().unwrap();
    browser.cookie = Some(format!("{genuine}0"));
    let html = browser.page("/listings").await;
    assert!(!html.contains("Invalid listing ID!"));

    browser.cookie = Some(genuine);
    let html = browser.page("/listings").await;
    assert!(html.contains("Invalid listing ID!"));
}

#[tokio::test]
async fn unknown_listing_reports_missing() {
    let (app, _) = app();
    let mut browser = Browser::new(app);

    let response = browser.get("/listings/0190f5d2-8a7c-7cc3-9a5e-3f1b2c4d5e6f").await;
    assert_eq!(location(&response), "/listings");
    let html = browser.page("/listings").await;
    assert!(html.contains("Listing you requested for does not exist!"));
}

#[tokio::test]
async fn blank_search_flashes_and_redirects() {
    let (app, _) = app();
    let mut browser = Browser::new(app);

    let response = browser.get("/listings/search?q=%20%20%20").await;
    assert_eq!(location(&response), "/listings");
    let html = browser.page("/listings").await;
    assert!(html.contains("Search value empty !!!"));
}

#[tokio::test]
async fn anonymous_visitor_is_sent_to_login_and_back() {
    let (app, _) = app();
    let mut browser = Browser::new(app);

    let response = browser.get("/listings/new").await;
    assert_eq!(location(&response), "/login");
    let html = browser.page("/login").await;
    assert!(html.contains("you must be logged in to create listing!"));

    // register through the form, log out, then log in again
    browser.sign_up("wanderer").await;
    let response = browser.get("/logout").await;
    assert_eq!(location(&response), "/listings");
    assert!(browser.page("/listings").await.contains("you are logged out!"));

    let response = browser.get("/listings/new").await;
    assert_eq!(location(&response), "/login");
    let response = browser
        .post_form("/login", "username=wanderer&password=hunter22")
        .await;
    assert_eq!(location(&response), "/listings/new");
    let html = browser.page("/listings/new").await;
    assert!(html.contains("Welcome back to Wanderlust!"));
    assert!(html.contains("Create a New Listing"));
}

#[tokio::test]
async fn wrong_password_returns_to_login() {
    let (app, _) = app();
    let mut browser = Browser::new(app);
    browser.sign_up("traveller").await;
    browser.get("/logout").await;

    let response = browser
        .post_form("/login", "username=traveller&password=wrong")
        .await;
    assert_eq!(location(&response), "/login");
    assert!(browser
        .page("/login")
        .await
        .contains("Password or username is incorrect"));
}

#[tokio::test]
async fn listing_lifecycle_through_forms() {
    let (app, db) = app();
    let mut browser = Browser::new(app);
    browser.sign_up("host").await;

    // missing image is a validation error, not a crash
    let response = browser
        .post_multipart("/listings", listing_multipart("Cozy Cottage", "1500", false))
        .await;
    assert_eq!(location(&response), "/listings/new");
    assert!(browser
        .page("/listings/new")
        .await
        .contains("Listing image is required"));

    let response = browser
        .post_multipart("/listings", listing_multipart("Cozy Cottage", "1500", true))
        .await;
    assert_eq!(location(&response), "/listings");
    let html = browser.page("/listings").await;
    assert!(html.contains("New Listing Created!"));
    assert!(html.contains("Cozy Cottage"));
    assert!(html.contains("1,500"));

    let id = db.list_all().await.unwrap()[0].id;

    let html = browser.page("/listings/search?q=cozy").await;
    assert!(html.contains("Listings searched by Title"));

    let html = browser.page(&format!("/listings/{id}")).await;
    assert!(html.contains("Owned by <i>host</i>"));

    // edit through the POST tunnel
    let response = browser
        .post_multipart(
            &format!("/listings/{id}?_method=PUT"),
            listing_multipart("Cozy Cabin", "900", false),
        )
        .await;
    assert_eq!(location(&response), format!("/listings/{id}"));
    let html = browser.page(&format!("/listings/{id}")).await;
    assert!(html.contains("Listing Updated !!"));
    assert!(html.contains("Cozy Cabin"));

    let response = browser
        .post_form(
            &format!("/listings/{id}/reviews"),
            "review%5Bcomment%5D=Lovely+stay&review%5Brating%5D=5",
        )
        .await;
    assert_eq!(location(&response), format!("/listings/{id}"));
    let html = browser.page(&format!("/listings/{id}")).await;
    assert!(html.contains("New Review Created!"));
    assert!(html.contains("Lovely stay"));

    let response = browser
        .post_form(&format!("/listings/{id}?_method=DELETE"), "")
        .await;
    assert_eq!(location(&response), "/listings");
    assert!(browser.page("/listings").await.contains("Listing Deleted!"));

    let response = browser.get(&format!("/listings/{id}")).await;
    assert_eq!(location(&response), "/listings");
    assert!(browser
        .page("/listings")
        .await
        .contains("Listing you requested for does not exist!"));
}

#[tokio::test]
async fn category_without_listings_flashes() {
    let (app, _) = app();
    let mut browser = Browser::new(app);

    let response = browser.get("/listings/category/Arctic").await;
    assert_eq!(location(&response), "/listings");
    assert!(browser
        .page("/listings")
        .await
        .contains("Listings is not here !!!"));
}

#[tokio::test]
async fn unconfigured_provider_bounces_to_login() {
    let (app, _) = app();
    let mut browser = Browser::new(app);

    let response = browser.get("/auth/github").await;
    assert_eq!(location(&response), "/login");
    assert!(browser
        .page("/login")
        .await
        .contains("GitHub login is not available"));

    let response = browser.get("/auth/myspace").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_route_renders_not_found_page() {
    let (app, _) = app();
    let mut browser = Browser::new(app);

    let response = browser.get("/definitely/not/here").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("Page not found!"));
}

#[tokio::test]
async fn request_ids_are_generated_and_propagated() {
    let (app, _) = app();
    let response = app
        .clone()
        .oneshot(Request::get("/listings").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.headers().get("x-request-id").is_some());

    let response = app
        .oneshot(
            Request::get("/listings")
                .header("x-request-id", "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers().get("x-request-id").unwrap(), "abc-123");
}

#[tokio::test]
async fn metrics_are_exposed() {
    let (app, _) = app();
    let mut browser = Browser::new(app);
    browser.page("/listings").await;

    let response = browser.get("/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("application/openmetrics-text"));
    let text = body_text(response).await;
    assert!(text.contains("wanderlust_http_requests_total{method=\"GET\",status=\"200\"} 1"));
}
