//! ESP integration: endpoint discovery, pagination, record normalization,
//! webhook counter overlay and the caller-facing analytics service.

#![warn(clippy::unwrap_used)]

pub mod endpoints;
pub mod fanout;
pub mod fetcher;
pub mod normalize;
pub mod pagination;
pub mod payload;
pub mod service;
pub mod test_support;
pub mod transport;
pub mod webhook;

pub use endpoints::{EndpointCandidate, EndpointCatalog, EndpointContext, ResourceKind};
pub use fanout::BoundedConcurrencyRunner;
pub use fetcher::{EndpointFailure, EndpointFallbackFetcher};
pub use pagination::PaginatedResourceFetcher;
pub use service::{ContactSummary, EspAnalyticsService};
pub use transport::{EspTransport, HttpResponse, ReqwestTransport};
pub use webhook::{InMemoryWebhookCounterStore, WebhookCounterStore};
