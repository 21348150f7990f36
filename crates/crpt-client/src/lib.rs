//! Rate-limited client for the CRPT document creation API.
//!
//! Builds document payloads, serializes them as JSON and POSTs them with a
//! `Signature` header. Submissions pass through a
//! [`crpt_limiter::RateLimiter`] first, so the service never sees more than
//! the configured number of requests per window.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod client;
pub mod config;
pub mod document;
pub mod error;

pub use client::{CrptClient, Submission};
pub use config::{Config, TimeUnit};
pub use document::{Description, Document, Product};
pub use error::{ClientError, ClientResult};
