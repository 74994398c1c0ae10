//! HTTP fetch primitives, raw payload archive and the reconciliation store.

mod artifact;
mod http;
mod postgres;
mod store;

pub use artifact::{ArchivedPayload, ArchivingFetcher, PayloadArchive};
pub use http::{retry, Fetch, FetchError, HttpClientConfig, HttpFetcher, RetryPolicy};
pub use postgres::PgStore;
pub use store::{MemoryStore, ReconciliationStore, StoreError};

pub const CRATE_NAME: &str = "judgesync-storage";
