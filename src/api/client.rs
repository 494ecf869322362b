//! Compliance API client
//!
//! Typed client for the service's rule endpoints, combining credentials and
//! HTTP functionality.

use super::auth::Credentials;
use super::http::HttpClient;
use crate::model::{Rule, RulePayload};
use anyhow::{Context, Result};
use url::Url;

/// A rule read from the service together with its concurrency token.
pub struct RuleRevision {
    pub rule: Rule,
    pub etag: Option<String>,
}

/// Main client for the compliance service's rule API
#[derive(Clone)]
pub struct ComplianceClient {
    pub credentials: Credentials,
    pub http: HttpClient,
    base_url: String,
}

impl ComplianceClient {
    /// Create a new client for the given service endpoint
    pub fn new(endpoint: &str) -> Result<Self> {
        let credentials = Credentials::resolve().context("Failed to initialize credentials")?;
        Self::with_credentials(endpoint, credentials)
    }

    /// Create a client with explicit credentials (used by tests)
    pub fn with_credentials(endpoint: &str, credentials: Credentials) -> Result<Self> {
        let url = Url::parse(endpoint)
            .with_context(|| format!("Invalid service endpoint: {endpoint}"))?;

        let http = HttpClient::new()?;

        Ok(Self {
            credentials,
            http,
            base_url: url.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// Build the rules collection URL for an instance
    pub fn rules_url(&self, instance_id: &str) -> String {
        format!("{}/instances/{}/v3/rules", self.base_url, instance_id)
    }

    /// Build the URL of a single rule
    pub fn rule_url(&self, instance_id: &str, rule_id: &str) -> String {
        format!("{}/{}", self.rules_url(instance_id), rule_id)
    }

    /// Create a rule. The service assigns its identity and metadata.
    pub async fn create_rule(&self, instance_id: &str, payload: &RulePayload) -> Result<Rule> {
        let body = serde_json::to_value(payload).context("Failed to serialize rule payload")?;
        let response = self
            .http
            .post(&self.rules_url(instance_id), self.credentials.token(), &body)
            .await
            .context("Create rule failed")?;

        serde_json::from_value(response).context("Failed to parse created rule")
    }

    /// Fetch a rule by ID. Returns `None` when the rule no longer exists.
    /// The revision carries the `ETag` header needed for a later replace.
    pub async fn get_rule(&self, instance_id: &str, rule_id: &str) -> Result<Option<RuleRevision>> {
        let response = self
            .http
            .get(&self.rule_url(instance_id, rule_id), self.credentials.token())
            .await
            .context("Get rule failed")?;

        let Some(response) = response else {
            return Ok(None);
        };

        let rule = serde_json::from_value(response.body).context("Failed to parse rule")?;
        Ok(Some(RuleRevision {
            rule,
            etag: response.etag,
        }))
    }

    /// Replace a rule in full. `if_match` must be the etag from the latest
    /// read; the service rejects stale tokens with a conflict.
    pub async fn replace_rule(
        &self,
        instance_id: &str,
        rule_id: &str,
        if_match: &str,
        payload: &RulePayload,
    ) -> Result<Rule> {
        let body = serde_json::to_value(payload).context("Failed to serialize rule payload")?;
        let response = self
            .http
            .put(
                &self.rule_url(instance_id, rule_id),
                self.credentials.token(),
                if_match,
                &body,
            )
            .await
            .context("Replace rule failed")?;

        serde_json::from_value(response).context("Failed to parse replaced rule")
    }

    /// Delete a rule by ID.
    pub async fn delete_rule(&self, instance_id: &str, rule_id: &str) -> Result<()> {
        self.http
            .delete(&self.rule_url(instance_id, rule_id), self.credentials.token())
            .await
            .context("Delete rule failed")?;
        Ok(())
    }
}
