//! Transport module for the rental booking REST API.
//!
//! This module provides:
//! - `ApiError`: the transport failure taxonomy (never thrown across the
//!   cache boundary - failures are recovered into cache entry state)
//! - `Transport`: the seam between endpoint dispatch and HTTP
//! - `HttpTransport`: the reqwest-backed production transport
//!
//! The API uses opaque bearer tokens sent as the raw `Authorization` header
//! value, obtained through the login endpoint.

pub mod error;
pub mod transport;

pub use error::ApiError;
pub use transport::{ApiRequest, HttpTransport, Transport};
