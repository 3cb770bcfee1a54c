#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod models;
pub mod query;
pub mod rate_limit;
pub mod rest;
pub mod traits;

#[cfg(any(test, feature = "test-util"))]
pub use memory::{CatalogCall, InMemoryCatalog};
pub use query::{Filter, QueryOptions};
pub use rate_limit::RequestThrottle;
pub use rest::RestCatalogClient;
pub use traits::CatalogService;
