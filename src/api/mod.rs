//! Compliance API interaction module
//!
//! This module provides the core functionality for talking to the compliance
//! service's REST API: credential resolution, an HTTP wrapper aware of the
//! concurrency-token headers, and the typed rule client.
//!
//! # Module Structure
//!
//! - [`auth`] - API key resolution from the environment or credentials file
//! - [`client`] - Typed client for the rule endpoints
//! - [`http`] - HTTP utilities (etag capture, If-Match, error sanitization)
//!
//! # Example
//!
//! ```ignore
//! use crate::api::client::ComplianceClient;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = ComplianceClient::new("https://compliance.example.com")?;
//!     let revision = client.get_rule("inst-1", "rule-9").await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
