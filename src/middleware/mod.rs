//! Middleware components for HTTP request processing.
//!
//! Cross-cutting concerns layered around the routes: client identification,
//! rate limiting, request validation and security headers.

pub mod ip;
pub mod rate_limit;
pub mod security_headers;
pub mod validation;

pub use rate_limit::{EndpointRateLimiter, RateLimiter};
