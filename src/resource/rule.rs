//! Rule resource lifecycle
//!
//! The four operations translate between the attribute map and the typed API
//! model via [`crate::codec`], call the remote client, and reconcile the
//! result back into the map. Create and Update finish with a Read so local
//! state always reflects server truth, including server-assigned metadata and
//! the concurrency token.

use crate::api::client::ComplianceClient;
use crate::codec::{self, AttrMap};
use crate::model::RulePayload;
use crate::resource::parse_composite_id;
use crate::schema::{self, validate};
use anyhow::{bail, Context, Result};
use serde_json::{json, Value};

/// Top-level fields whose change triggers a full replace on update.
const TRACKED_FIELDS: &[&str] = &[
    "description",
    "target",
    "required_config",
    "version",
    "import",
    "labels",
];

/// Lifecycle adapter for the rule resource.
pub struct RuleResource<'a> {
    client: &'a ComplianceClient,
}

impl<'a> RuleResource<'a> {
    pub fn new(client: &'a ComplianceClient) -> Self {
        Self { client }
    }

    /// Create the rule described by `data`, then re-read to normalize state.
    /// On success `data` carries the composite `id` and all computed fields.
    pub async fn create(&self, data: &mut AttrMap) -> Result<()> {
        let instance_id = require_string(data, "instance_id")?;
        let payload = build_payload(data)?;

        let rule = self
            .client
            .create_rule(&instance_id, &payload)
            .await
            .context("Create failed")?;

        data.insert("id".to_string(), json!(format!("{}/{}", instance_id, rule.id)));
        tracing::info!("Created rule {}/{}", instance_id, rule.id);

        self.read(data).await
    }

    /// Refresh `data` from the service. A vanished rule clears the `id` key
    /// and returns Ok, so callers can treat the resource as deleted.
    pub async fn read(&self, data: &mut AttrMap) -> Result<()> {
        let id = require_string(data, "id")?;
        let (instance_id, rule_id) = parse_composite_id(&id)?;

        let revision = match self.client.get_rule(&instance_id, &rule_id).await? {
            Some(revision) => revision,
            None => {
                tracing::info!("Rule {} no longer exists, clearing local identity", id);
                data.remove("id");
                return Ok(());
            }
        };

        let rule = revision.rule;
        data.insert("instance_id".to_string(), json!(instance_id));
        data.insert("rule_id".to_string(), json!(rule_id));
        data.insert(
            "etag".to_string(),
            json!(revision.etag.unwrap_or_default()),
        );

        if let Some(description) = rule.description {
            data.insert("description".to_string(), json!(description));
        }
        if let Some(version) = rule.version {
            data.insert("version".to_string(), json!(version));
        }
        if let Some(import) = rule.import {
            data.insert(
                "import".to_string(),
                json!([Value::Object(codec::import_to_map(&import))]),
            );
        }
        data.insert(
            "target".to_string(),
            json!([Value::Object(codec::target_to_map(&rule.target))]),
        );
        data.insert(
            "required_config".to_string(),
            json!([Value::Object(codec::required_config_to_map(&rule.required_config))]),
        );
        if let Some(labels) = rule.labels {
            data.insert("labels".to_string(), json!(labels));
        }
        if let Some(created_on) = rule.created_on {
            data.insert("created_on".to_string(), json!(created_on));
        }
        if let Some(created_by) = rule.created_by {
            data.insert("created_by".to_string(), json!(created_by));
        }
        if let Some(updated_on) = rule.updated_on {
            data.insert("updated_on".to_string(), json!(updated_on));
        }
        if let Some(updated_by) = rule.updated_by {
            data.insert("updated_by".to_string(), json!(updated_by));
        }
        if let Some(account_id) = rule.account_id {
            data.insert("account_id".to_string(), json!(account_id));
        }
        if let Some(rule_type) = rule.rule_type {
            data.insert("type".to_string(), json!(rule_type));
        }

        Ok(())
    }

    /// Replace the rule if any tracked field changed relative to `prior`.
    /// The replace carries the etag from the latest read; the service rejects
    /// stale tokens. Always finishes with a Read.
    pub async fn update(&self, data: &mut AttrMap, prior: &AttrMap) -> Result<()> {
        let id = require_string(data, "id")?;
        let (instance_id, rule_id) = parse_composite_id(&id)?;

        let has_change = TRACKED_FIELDS
            .iter()
            .any(|field| data.get(*field) != prior.get(*field));

        if has_change {
            let etag = data
                .get("etag")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let payload = build_payload(data)?;

            self.client
                .replace_rule(&instance_id, &rule_id, &etag, &payload)
                .await
                .context("Update failed")?;
            tracing::info!("Replaced rule {}", id);
        } else {
            tracing::debug!("No tracked field changed for rule {}, skipping replace", id);
        }

        self.read(data).await
    }

    /// Delete the rule and clear the local identity.
    pub async fn delete(&self, data: &mut AttrMap) -> Result<()> {
        let id = require_string(data, "id")?;
        let (instance_id, rule_id) = parse_composite_id(&id)?;

        self.client
            .delete_rule(&instance_id, &rule_id)
            .await
            .context("Delete failed")?;

        tracing::info!("Deleted rule {}", id);
        data.remove("id");
        Ok(())
    }
}

/// Build the create/replace payload from the attribute map, validating the
/// map's shape and field values first so malformed input fails with named
/// fields instead of surfacing mid-request.
pub fn build_payload(data: &AttrMap) -> Result<RulePayload> {
    let problems = schema::validate_map(&schema::rule_schema(), data);
    if !problems.is_empty() {
        bail!("Rule definition is invalid:\n  {}", problems.join("\n  "));
    }

    let description = require_string(data, "description")?;
    validate::validate_description(&description)?;

    let target_block = single_block(data, "target")?;
    let target = codec::target_from_map(target_block).context("target")?;

    let config_block = single_block(data, "required_config")?;
    let required_config =
        codec::required_config_from_map(config_block).context("required_config")?;
    validate::validate_config_operators(&required_config)?;

    let version = optional_string(data, "version");
    if let Some(version) = &version {
        validate::validate_version(version)?;
    }

    let import = match data.get("import").and_then(|v| v.as_array()) {
        Some(blocks) if !blocks.is_empty() => {
            let block = blocks[0]
                .as_object()
                .context("import.0: expected a block")?;
            Some(codec::import_from_map(block).context("import")?)
        }
        _ => None,
    };

    let labels = string_list(data, "labels")?;

    Ok(RulePayload {
        description,
        target,
        required_config,
        version,
        import,
        labels,
    })
}

fn require_string(data: &AttrMap, key: &str) -> Result<String> {
    match data.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(other) if !other.is_string() => bail!("{key}: expected a string, got {other}"),
        _ => bail!("{key}: missing required attribute"),
    }
}

fn optional_string(data: &AttrMap, key: &str) -> Option<String> {
    data.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Fetch the single nested block of a `max_items = 1` list attribute.
fn single_block<'m>(data: &'m AttrMap, key: &str) -> Result<&'m AttrMap> {
    data.get(key)
        .and_then(|v| v.as_array())
        .and_then(|blocks| blocks.first())
        .and_then(|block| block.as_object())
        .with_context(|| format!("{key}: missing required block"))
}

fn string_list(data: &AttrMap, key: &str) -> Result<Option<Vec<String>>> {
    match data.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => {
            let mut values = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match item {
                    Value::String(s) => values.push(s.clone()),
                    other => bail!("{key}.{i}: expected a string, got {other}"),
                }
            }
            Ok(Some(values))
        }
        Some(other) => bail!("{key}: expected a list of strings, got {other}"),
    }
}
