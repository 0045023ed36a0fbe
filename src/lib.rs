//! # facedir
//!
//! An HTTP service that treats a flat directory of face images as a registry of
//! identities. Images are registered, renamed, deleted and listed through a REST
//! API, and query images are matched against the directory by an external face
//! recognition backend.
//!
//! ## Architecture
//!
//! - **Axum**: HTTP server and routing
//! - **Tokio**: async runtime; filesystem work runs on the blocking pool
//! - **image**: optional resize / grayscale preprocessing of uploads
//! - **config** + **dotenvy**: layered configuration
//!
//! ## Core Components
//!
//! - [`store`]: the image directory, its naming rules and derived-index invalidation
//! - [`recognition`]: the lookup gateway, ranking policy and backend port
//! - [`preprocess`]: upload preprocessing
//! - [`routes`]: HTTP handlers
//! - [`middleware`]: rate limiting, request validation, security headers
//! - [`config`], [`error`], [`metrics`], [`state`], [`types`]: the ambient plumbing

pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod preprocess;
pub mod recognition;
pub mod routes;
pub mod state;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;
