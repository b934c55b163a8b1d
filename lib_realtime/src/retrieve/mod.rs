//! # Data Retrieval Module
//!
//! REST side of the sync layer. The live socket only delivers what happens
//! while connected; everything else (initial load, missed pushes, mutations)
//! goes through the collaborators defined here.
//!
//! ## Contained Modules:
//!
//! - **`backend`**: the `NotificationBackend` and `MessagingBackend` traits the
//!   synchronizer and views are written against, plus `ApiError`.
//! - **`ky_http`**: a generic HTTP `ApiClient` built on `reqwest` and
//!   `reqwest-middleware`, with exponential-backoff retries on transient
//!   failures.
//! - **`rest_backend`**: the marketplace REST implementation of both traits.

/// Collaborator traits and the REST error type.
pub mod backend;
/// Generic HTTP API client with retry middleware.
#[cfg(feature = "rest")]
pub mod ky_http;
/// Marketplace REST endpoints.
#[cfg(feature = "rest")]
pub mod rest_backend;

pub use backend::{ApiError, MessagingBackend, NotificationBackend, NotificationQuery};
#[cfg(feature = "rest")]
pub use rest_backend::RestBackend;
