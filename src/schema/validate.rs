//! Field validators applied at the map-decode boundary.

use crate::model::RequiredConfig;
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Maximum length of a rule description.
const MAX_DESCRIPTION_LENGTH: usize = 512;

/// Operators accepted by the service for property comparisons.
const OPERATORS: &[&str] = &[
    "string_equals",
    "string_not_equals",
    "string_match",
    "string_not_match",
    "string_contains",
    "string_not_contains",
    "strings_in_list",
    "strings_allowed",
    "strings_required",
    "num_equals",
    "num_not_equals",
    "num_less_than",
    "num_less_than_equals",
    "num_greater_than",
    "num_greater_than_equals",
    "days_less_than",
    "is_empty",
    "is_not_empty",
    "is_true",
    "is_false",
    "ips_in_range",
    "ips_equals",
    "ips_not_equals",
];

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9][0-9.]*$").expect("version regex is valid"))
}

/// Validate a rule description (non-empty, bounded length).
pub fn validate_description(description: &str) -> Result<()> {
    if description.is_empty() {
        bail!("description must not be empty");
    }
    if description.len() > MAX_DESCRIPTION_LENGTH {
        bail!(
            "description must be at most {} characters, got {}",
            MAX_DESCRIPTION_LENGTH,
            description.len()
        );
    }
    Ok(())
}

/// Validate a rule version string, e.g. `1.0.0`.
pub fn validate_version(version: &str) -> Result<()> {
    if version.len() < 5 || version.len() > 10 {
        bail!("version must be 5 to 10 characters, got {:?}", version);
    }
    if !version_regex().is_match(version) {
        bail!("version must match `^[0-9][0-9.]*$`, got {:?}", version);
    }
    Ok(())
}

/// Validate a condition operator against the service's known operator set.
pub fn validate_operator(operator: &str) -> Result<()> {
    if !OPERATORS.contains(&operator) {
        bail!("unknown operator {:?}", operator);
    }
    Ok(())
}

/// Validate every operator appearing in a condition tree, including those
/// inside quantified sub-rules.
pub fn validate_config_operators(config: &RequiredConfig) -> Result<()> {
    if let Some(operator) = &config.operator {
        validate_operator(operator)?;
    }
    for (key, children) in [("and", &config.and), ("or", &config.or)] {
        if let Some(children) = children {
            for (i, child) in children.iter().enumerate() {
                validate_config_operators(child).with_context(|| format!("{key}.{i}"))?;
            }
        }
    }
    for (key, sub) in [
        ("all", &config.all),
        ("all_if", &config.all_if),
        ("any", &config.any),
        ("any_if", &config.any_if),
    ] {
        if let Some(sub) = sub {
            validate_config_operators(&sub.required_config).context(key)?;
        }
    }
    Ok(())
}
