//! Tree codec
//!
//! Converts between the generic attribute map (`serde_json::Map`) and the typed
//! API model. The attribute map is the declarative configuration/state
//! representation; the typed model is what goes over the wire.
//!
//! Nesting convention, identical in both directions: a quantified combinator
//! key (`all`, `all_if`, `any`, `any_if`) holds a one-element list of sub-rule
//! maps, and inside a sub-rule, `target` and `required_config` each hold a
//! one-element list of maps. `and`/`or` hold plain lists of condition maps.
//!
//! Malformed maps produce errors naming the offending field; they never panic.

use crate::model::{
    AdditionalTargetAttribute, Import, Parameter, RequiredConfig, RuleValue, SubRule, Target,
};
use anyhow::{bail, Context, Result};
use serde_json::{json, Map, Value};

/// The generic attribute map: field name to string/bool/list/nested-map value.
pub type AttrMap = Map<String, Value>;

// ---------------------------------------------------------------------------
// Map access helpers
// ---------------------------------------------------------------------------

/// Read an optional string field. Empty strings count as absent, matching how
/// declarative state represents unset attributes.
fn get_str(map: &AttrMap, key: &str) -> Result<Option<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => bail!("{key}: expected a string, got {other}"),
    }
}

/// Read a required, non-empty string field.
fn require_str(map: &AttrMap, key: &str) -> Result<String> {
    get_str(map, key)?.with_context(|| format!("{key}: missing required attribute"))
}

/// Read a list-of-blocks field as object references.
fn get_blocks<'a>(map: &'a AttrMap, key: &str) -> Result<Option<Vec<&'a AttrMap>>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => {
            let mut blocks = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match item {
                    Value::Object(obj) => blocks.push(obj),
                    other => bail!("{key}.{i}: expected a block, got {other}"),
                }
            }
            Ok(Some(blocks))
        }
        Some(other) => bail!("{key}: expected a list of blocks, got {other}"),
    }
}

/// Read a single-element block field (`max_items = 1` in the schema). An empty
/// list counts as absent.
fn get_single_block<'a>(map: &'a AttrMap, key: &str) -> Result<Option<&'a AttrMap>> {
    match get_blocks(map, key)? {
        None => Ok(None),
        Some(blocks) if blocks.is_empty() => Ok(None),
        Some(blocks) if blocks.len() == 1 => Ok(Some(blocks[0])),
        Some(blocks) => bail!("{key}: expected at most one block, got {}", blocks.len()),
    }
}

// ---------------------------------------------------------------------------
// Value polymorphism
// ---------------------------------------------------------------------------

/// Flatten a condition value to its attribute-map string form.
///
/// Lists render as `[a,b,c]`. This is lossy when an element contains a comma;
/// the service's rule language does not use such values.
pub fn encode_value(value: &RuleValue) -> Value {
    match value {
        RuleValue::Scalar(s) => Value::String(s.clone()),
        RuleValue::List(items) => Value::String(format!("[{}]", items.join(","))),
    }
}

/// Parse the attribute-map string form back into a condition value.
///
/// One surrounding bracket pair is stripped before splitting on commas. A
/// single remaining element decodes as a scalar, so `"[x]"` comes back as
/// scalar `x` rather than a one-element list. Documented round-trip asymmetry.
pub fn decode_value(raw: &str) -> RuleValue {
    let inner = match raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        Some(inner) => inner,
        None => raw,
    };
    let parts: Vec<&str> = inner.split(',').collect();
    if parts.len() == 1 {
        RuleValue::Scalar(parts[0].to_string())
    } else {
        RuleValue::List(parts.iter().map(|s| s.to_string()).collect())
    }
}

// ---------------------------------------------------------------------------
// Required-config tree
// ---------------------------------------------------------------------------

/// Encode a condition tree into its attribute-map form.
pub fn required_config_to_map(config: &RequiredConfig) -> AttrMap {
    let mut map = AttrMap::new();

    if let Some(description) = &config.description {
        map.insert("description".to_string(), json!(description));
    }
    if let Some(children) = &config.and {
        let items: Vec<Value> = children
            .iter()
            .map(|c| Value::Object(required_config_to_map(c)))
            .collect();
        map.insert("and".to_string(), Value::Array(items));
    }
    if let Some(children) = &config.or {
        let items: Vec<Value> = children
            .iter()
            .map(|c| Value::Object(required_config_to_map(c)))
            .collect();
        map.insert("or".to_string(), Value::Array(items));
    }
    if let Some(sub) = &config.all {
        map.insert("all".to_string(), sub_rule_to_value(sub));
    }
    if let Some(sub) = &config.all_if {
        map.insert("all_if".to_string(), sub_rule_to_value(sub));
    }
    if let Some(sub) = &config.any {
        map.insert("any".to_string(), sub_rule_to_value(sub));
    }
    if let Some(sub) = &config.any_if {
        map.insert("any_if".to_string(), sub_rule_to_value(sub));
    }
    if let Some(property) = &config.property {
        map.insert("property".to_string(), json!(property));
    }
    if let Some(operator) = &config.operator {
        map.insert("operator".to_string(), json!(operator));
    }
    if let Some(value) = &config.value {
        map.insert("value".to_string(), encode_value(value));
    }

    map
}

fn sub_rule_to_value(sub: &SubRule) -> Value {
    json!([{
        "target": [Value::Object(target_to_map(&sub.target))],
        "required_config": [Value::Object(required_config_to_map(&sub.required_config))],
    }])
}

/// Decode an attribute map into a condition tree.
pub fn required_config_from_map(map: &AttrMap) -> Result<RequiredConfig> {
    let mut config = RequiredConfig {
        description: get_str(map, "description")?,
        ..RequiredConfig::default()
    };

    if let Some(blocks) = get_blocks(map, "or")? {
        let mut children = Vec::with_capacity(blocks.len());
        for (i, block) in blocks.iter().enumerate() {
            children.push(required_config_from_map(block).with_context(|| format!("or.{i}"))?);
        }
        config.or = Some(children);
    }
    if let Some(blocks) = get_blocks(map, "and")? {
        let mut children = Vec::with_capacity(blocks.len());
        for (i, block) in blocks.iter().enumerate() {
            children.push(required_config_from_map(block).with_context(|| format!("and.{i}"))?);
        }
        config.and = Some(children);
    }

    if let Some(block) = get_single_block(map, "all")? {
        config.all = Some(Box::new(sub_rule_from_map(block).context("all")?));
    }
    if let Some(block) = get_single_block(map, "all_if")? {
        config.all_if = Some(Box::new(sub_rule_from_map(block).context("all_if")?));
    }
    if let Some(block) = get_single_block(map, "any")? {
        config.any = Some(Box::new(sub_rule_from_map(block).context("any")?));
    }
    if let Some(block) = get_single_block(map, "any_if")? {
        config.any_if = Some(Box::new(sub_rule_from_map(block).context("any_if")?));
    }

    config.property = get_str(map, "property")?;
    config.operator = get_str(map, "operator")?;
    if let Some(raw) = get_str(map, "value")? {
        config.value = Some(decode_value(&raw));
    }

    Ok(config)
}

fn sub_rule_from_map(map: &AttrMap) -> Result<SubRule> {
    let target_block = get_single_block(map, "target")?
        .context("target: missing required block")?;
    let config_block = get_single_block(map, "required_config")?
        .context("required_config: missing required block")?;

    Ok(SubRule {
        target: target_from_map(target_block).context("target")?,
        required_config: Box::new(
            required_config_from_map(config_block).context("required_config")?,
        ),
    })
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// Encode a rule target into its attribute-map form.
pub fn target_to_map(target: &Target) -> AttrMap {
    let mut map = AttrMap::new();
    map.insert("service_name".to_string(), json!(target.service_name));
    if let Some(display_name) = &target.service_display_name {
        map.insert("service_display_name".to_string(), json!(display_name));
    }
    if let Some(reference_name) = &target.reference_name {
        map.insert("reference_name".to_string(), json!(reference_name));
    }
    map.insert("resource_kind".to_string(), json!(target.resource_kind));
    if let Some(attributes) = &target.additional_target_attributes {
        let items: Vec<Value> = attributes
            .iter()
            .map(|a| Value::Object(additional_target_attribute_to_map(a)))
            .collect();
        map.insert("additional_target_attributes".to_string(), Value::Array(items));
    }
    map
}

/// Decode an attribute map into a rule target. `service_name` and
/// `resource_kind` must be present and non-empty.
pub fn target_from_map(map: &AttrMap) -> Result<Target> {
    let mut target = Target {
        service_name: require_str(map, "service_name")?,
        service_display_name: get_str(map, "service_display_name")?,
        reference_name: get_str(map, "reference_name")?,
        resource_kind: require_str(map, "resource_kind")?,
        additional_target_attributes: None,
    };

    if let Some(blocks) = get_blocks(map, "additional_target_attributes")? {
        let mut attributes = Vec::with_capacity(blocks.len());
        for (i, block) in blocks.iter().enumerate() {
            attributes.push(
                additional_target_attribute_from_map(block)
                    .with_context(|| format!("additional_target_attributes.{i}"))?,
            );
        }
        target.additional_target_attributes = Some(attributes);
    }

    Ok(target)
}

fn additional_target_attribute_to_map(attribute: &AdditionalTargetAttribute) -> AttrMap {
    let mut map = AttrMap::new();
    if let Some(name) = &attribute.name {
        map.insert("name".to_string(), json!(name));
    }
    if let Some(operator) = &attribute.operator {
        map.insert("operator".to_string(), json!(operator));
    }
    if let Some(value) = &attribute.value {
        map.insert("value".to_string(), json!(value));
    }
    map
}

fn additional_target_attribute_from_map(map: &AttrMap) -> Result<AdditionalTargetAttribute> {
    Ok(AdditionalTargetAttribute {
        name: get_str(map, "name")?,
        operator: get_str(map, "operator")?,
        value: get_str(map, "value")?,
    })
}

// ---------------------------------------------------------------------------
// Import parameters
// ---------------------------------------------------------------------------

/// Encode the import-parameter collection into its attribute-map form.
pub fn import_to_map(import: &Import) -> AttrMap {
    let mut map = AttrMap::new();
    if let Some(parameters) = &import.parameters {
        let items: Vec<Value> = parameters
            .iter()
            .map(|p| Value::Object(parameter_to_map(p)))
            .collect();
        map.insert("parameters".to_string(), Value::Array(items));
    }
    map
}

/// Decode an attribute map into the import-parameter collection.
pub fn import_from_map(map: &AttrMap) -> Result<Import> {
    let mut import = Import { parameters: None };
    if let Some(blocks) = get_blocks(map, "parameters")? {
        let mut parameters = Vec::with_capacity(blocks.len());
        for (i, block) in blocks.iter().enumerate() {
            parameters.push(parameter_from_map(block).with_context(|| format!("parameters.{i}"))?);
        }
        import.parameters = Some(parameters);
    }
    Ok(import)
}

fn parameter_to_map(parameter: &Parameter) -> AttrMap {
    let mut map = AttrMap::new();
    if let Some(name) = &parameter.name {
        map.insert("name".to_string(), json!(name));
    }
    if let Some(display_name) = &parameter.display_name {
        map.insert("display_name".to_string(), json!(display_name));
    }
    if let Some(description) = &parameter.description {
        map.insert("description".to_string(), json!(description));
    }
    if let Some(parameter_type) = &parameter.parameter_type {
        map.insert("type".to_string(), json!(parameter_type));
    }
    map
}

fn parameter_from_map(map: &AttrMap) -> Result<Parameter> {
    Ok(Parameter {
        name: get_str(map, "name")?,
        display_name: get_str(map, "display_name")?,
        description: get_str(map, "description")?,
        parameter_type: get_str(map, "type")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(property: &str, operator: &str, value: RuleValue) -> RequiredConfig {
        RequiredConfig {
            property: Some(property.to_string()),
            operator: Some(operator.to_string()),
            value: Some(value),
            ..RequiredConfig::default()
        }
    }

    fn sample_target() -> Target {
        Target {
            service_name: "cloud-object-storage".to_string(),
            resource_kind: "bucket".to_string(),
            ..Target::default()
        }
    }

    #[test]
    fn test_and_or_leaf_round_trip() {
        let tree = RequiredConfig {
            description: Some("bucket checks".to_string()),
            and: Some(vec![
                leaf("location", "string_equals", RuleValue::Scalar("us-south".to_string())),
                RequiredConfig {
                    or: Some(vec![
                        leaf("storage_class", "string_equals", RuleValue::Scalar("smart".to_string())),
                        leaf("storage_class", "string_equals", RuleValue::Scalar("cold".to_string())),
                    ]),
                    ..RequiredConfig::default()
                },
            ]),
            ..RequiredConfig::default()
        };

        let map = required_config_to_map(&tree);
        let decoded = required_config_from_map(&map).unwrap();
        assert_eq!(decoded, tree);
    }

    #[test]
    fn test_each_combinator_decodes_into_its_own_field() {
        for key in ["all", "all_if", "any", "any_if"] {
            let mut tree = RequiredConfig::default();
            let sub = Box::new(SubRule {
                target: sample_target(),
                required_config: Box::new(leaf(
                    "location",
                    "string_equals",
                    RuleValue::Scalar("us-south".to_string()),
                )),
            });
            match key {
                "all" => tree.all = Some(sub),
                "all_if" => tree.all_if = Some(sub),
                "any" => tree.any = Some(sub),
                "any_if" => tree.any_if = Some(sub),
                _ => unreachable!(),
            }

            let map = required_config_to_map(&tree);
            assert!(map.contains_key(key), "{key} missing from encoded map");

            let decoded = required_config_from_map(&map).unwrap();
            assert_eq!(decoded, tree, "{key} did not survive the round trip");

            // The other three combinator fields must stay empty.
            let populated = [
                decoded.all.is_some(),
                decoded.all_if.is_some(),
                decoded.any.is_some(),
                decoded.any_if.is_some(),
            ];
            assert_eq!(populated.iter().filter(|p| **p).count(), 1, "{key} leaked");
        }
    }

    #[test]
    fn test_sub_rule_unwrapping_matches_encode_nesting() {
        let tree = RequiredConfig {
            any: Some(Box::new(SubRule {
                target: sample_target(),
                required_config: Box::new(leaf(
                    "firewall",
                    "is_true",
                    RuleValue::Scalar("true".to_string()),
                )),
            })),
            ..RequiredConfig::default()
        };

        let map = required_config_to_map(&tree);

        // Combinator key -> one-element list; target/required_config inside ->
        // one-element lists as well.
        let any = map["any"].as_array().unwrap();
        assert_eq!(any.len(), 1);
        let sub = any[0].as_object().unwrap();
        assert_eq!(sub["target"].as_array().unwrap().len(), 1);
        assert_eq!(sub["required_config"].as_array().unwrap().len(), 1);

        assert_eq!(required_config_from_map(&map).unwrap(), tree);
    }

    #[test]
    fn test_value_list_encodes_to_bracketed_string() {
        let value = RuleValue::List(vec!["x".to_string(), "y".to_string()]);
        assert_eq!(encode_value(&value), Value::String("[x,y]".to_string()));
    }

    #[test]
    fn test_value_decoding() {
        assert_eq!(
            decode_value("[x,y]"),
            RuleValue::List(vec!["x".to_string(), "y".to_string()])
        );
        assert_eq!(decode_value("us-south"), RuleValue::Scalar("us-south".to_string()));
        // Documented asymmetry: a bracketed single element decodes as a scalar.
        assert_eq!(decode_value("[x]"), RuleValue::Scalar("x".to_string()));
        // Unbracketed comma lists still decode as lists.
        assert_eq!(
            decode_value("a,b,c"),
            RuleValue::List(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
    }

    #[test]
    fn test_empty_strings_decode_as_absent() {
        let map = serde_json::json!({
            "description": "",
            "property": "location",
            "operator": "string_equals",
            "value": ""
        });
        let decoded = required_config_from_map(map.as_object().unwrap()).unwrap();
        assert_eq!(decoded.description, None);
        assert_eq!(decoded.value, None);
        assert_eq!(decoded.property.as_deref(), Some("location"));
    }

    #[test]
    fn test_malformed_maps_produce_field_errors() {
        let not_a_list = serde_json::json!({"and": "nope"});
        let err = required_config_from_map(not_a_list.as_object().unwrap()).unwrap_err();
        assert!(err.to_string().contains("and"));

        let bad_child = serde_json::json!({"or": [{"property": 7}]});
        let err = required_config_from_map(bad_child.as_object().unwrap()).unwrap_err();
        assert!(format!("{err:#}").contains("or.0"));

        let missing_kind = serde_json::json!({"service_name": "s"});
        let err = target_from_map(missing_kind.as_object().unwrap()).unwrap_err();
        assert!(err.to_string().contains("resource_kind"));
    }

    #[test]
    fn test_target_round_trip_with_attributes() {
        let target = Target {
            service_name: "kms".to_string(),
            service_display_name: Some("Key Protect".to_string()),
            reference_name: None,
            resource_kind: "key".to_string(),
            additional_target_attributes: Some(vec![AdditionalTargetAttribute {
                name: Some("location".to_string()),
                operator: Some("string_equals".to_string()),
                value: Some("us-south".to_string()),
            }]),
        };

        let map = target_to_map(&target);
        assert_eq!(target_from_map(&map).unwrap(), target);
    }

    #[test]
    fn test_import_round_trip() {
        let import = Import {
            parameters: Some(vec![Parameter {
                name: Some("allowed_locations".to_string()),
                display_name: Some("Allowed locations".to_string()),
                description: None,
                parameter_type: Some("string_list".to_string()),
            }]),
        };

        let map = import_to_map(&import);
        assert_eq!(map["parameters"][0]["type"], "string_list");
        assert_eq!(import_from_map(&map).unwrap(), import);
    }
}
