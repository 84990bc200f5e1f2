//! Image webhook receiver
//!
//! Accepts a source image URL, mirrors the image into object storage and
//! answers with a public serving URL.

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    dead_code
)]

/// Remote image fetching
pub mod fetcher;

/// Object storage writes
pub mod media_storage;

/// Object naming
pub mod naming;

/// HTTP routes
pub mod routes;

/// Server setup
pub mod server;

/// Serving URL registration
pub mod serving_url;

/// Configuration, errors and extractors
pub mod types;

/// Upload orchestration
pub mod uploader;
