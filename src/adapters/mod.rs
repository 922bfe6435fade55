// Adapters layer: concrete implementations for external systems (http, cache, storage).

pub mod cache;
pub mod http;
pub mod storage;

pub use cache::ItemCache;
pub use http::{DownloadOutcome, HttpClient, RequestFailure};
pub use storage::LocalStorage;
