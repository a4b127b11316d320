//! Prometheus counters for the HTTP surface, rendered at `/metrics` in the
//! OpenMetrics text format.

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

pub const CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RequestLabels {
    pub method: String,
    pub status: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct StrategyLabels {
    pub strategy: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct LoginLabels {
    pub method: String,
}

pub struct Metrics {
    registry: Registry,
    pub http_requests: Family<RequestLabels, Counter>,
    pub search_matches: Family<StrategyLabels, Counter>,
    pub search_misses: Counter,
    pub listings_created: Counter,
    pub listings_deleted: Counter,
    pub reviews_created: Counter,
    pub logins: Family<LoginLabels, Counter>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("wanderlust");

        let http_requests = Family::<RequestLabels, Counter>::default();
        registry.register(
            "http_requests",
            "HTTP requests by method and response status",
            http_requests.clone(),
        );
        let search_matches = Family::<StrategyLabels, Counter>::default();
        registry.register(
            "search_matches",
            "Searches answered, by the strategy that matched",
            search_matches.clone(),
        );
        let search_misses = Counter::default();
        registry.register(
            "search_misses",
            "Searches where no strategy matched",
            search_misses.clone(),
        );
        let listings_created = Counter::default();
        registry.register("listings_created", "Listings created", listings_created.clone());
        let listings_deleted = Counter::default();
        registry.register("listings_deleted", "Listings deleted", listings_deleted.clone());
        let reviews_created = Counter::default();
        registry.register("reviews_created", "Reviews created", reviews_created.clone());
        let logins = Family::<LoginLabels, Counter>::default();
        registry.register("logins", "Successful sign-ins by method", logins.clone());

        Self {
            registry,
            http_requests,
            search_matches,
            search_misses,
            listings_created,
            listings_deleted,
            reviews_created,
            logins,
        }
    }

    pub fn record_request(&self, method: &str, status: u16) {
        self.http_requests
            .get_or_create(&RequestLabels {
                method: method.to_string(),
                status: status.to_string(),
            })
            .inc();
    }

    pub fn record_search(&self, strategy: &str) {
        self.search_matches
            .get_or_create(&StrategyLabels {
                strategy: strategy.to_string(),
            })
            .inc();
    }

    pub fn record_login(&self, method: &str) {
        self.logins
            .get_or_create(&LoginLabels {
                method: method.to_string(),
            })
            .inc();
    }

    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        encode(&mut out, &self.registry)?;
        Ok(out)
    }
}
