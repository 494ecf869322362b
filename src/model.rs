//! Typed API model
//!
//! Request/response structs for the compliance service's rule API. These mirror
//! the wire format; the conversion to and from the generic attribute map lives
//! in [`crate::codec`].

use serde::{Deserialize, Serialize};

/// A leaf-condition value: either a single scalar or a list of scalars.
///
/// The service accepts any JSON here; in the attribute map the list form is
/// flattened to a `[a,b,c]` string (see [`crate::codec::encode_value`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    Scalar(String),
    List(Vec<String>),
}

/// An extra name/operator/value triple narrowing a rule target.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AdditionalTargetAttribute {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// The resource class a rule applies to.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Target {
    pub service_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_name: Option<String>,
    pub resource_kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_target_attributes: Option<Vec<AdditionalTargetAttribute>>,
}

/// The body of a quantified combinator: one target paired with one nested
/// condition tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubRule {
    pub target: Target,
    pub required_config: Box<RequiredConfig>,
}

/// A node of the recursive boolean-condition tree.
///
/// Either a leaf comparison (`property`/`operator`/`value`) or a combinator
/// over child conditions. The service does not enforce mutual exclusivity
/// between the two shapes, and neither do we.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RequiredConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub and: Option<Vec<RequiredConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub or: Option<Vec<RequiredConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all: Option<Box<SubRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_if: Option<Box<SubRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub any: Option<Box<SubRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub any_if: Option<Box<SubRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<RuleValue>,
}

/// A named, typed import parameter referenced by the condition tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub parameter_type: Option<String>,
}

/// The collection of import parameters attached to a rule.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Import {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<Parameter>>,
}

/// The client-supplied part of a rule, sent on create and replace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RulePayload {
    pub description: String,
    pub target: Target,
    pub required_config: RequiredConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import: Option<Import>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

/// A rule as returned by the service, including server-assigned metadata.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Rule {
    pub id: String,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub rule_type: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub import: Option<Import>,
    #[serde(default)]
    pub target: Target,
    #[serde(default)]
    pub required_config: RequiredConfig,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    #[serde(default)]
    pub created_on: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub updated_on: Option<String>,
    #[serde(default)]
    pub updated_by: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_value_deserializes_scalar_and_list() {
        let scalar: RuleValue = serde_json::from_value(json!("enabled")).unwrap();
        assert_eq!(scalar, RuleValue::Scalar("enabled".to_string()));

        let list: RuleValue = serde_json::from_value(json!(["a", "b"])).unwrap();
        assert_eq!(
            list,
            RuleValue::List(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_payload_omits_empty_optionals() {
        let payload = RulePayload {
            description: "desc".to_string(),
            target: Target {
                service_name: "cloud-object-storage".to_string(),
                resource_kind: "bucket".to_string(),
                ..Target::default()
            },
            required_config: RequiredConfig::default(),
            version: None,
            import: None,
            labels: None,
        };

        let body = serde_json::to_value(&payload).unwrap();
        assert!(body.get("version").is_none());
        assert!(body.get("import").is_none());
        assert!(body.get("labels").is_none());
        assert_eq!(body["target"]["service_name"], "cloud-object-storage");
    }

    #[test]
    fn test_rule_deserializes_nested_tree() {
        let body = json!({
            "id": "rule-1",
            "description": "bucket rules",
            "target": {"service_name": "cloud-object-storage", "resource_kind": "bucket"},
            "required_config": {
                "and": [
                    {"property": "location", "operator": "string_equals", "value": "us-south"}
                ]
            }
        });

        let rule: Rule = serde_json::from_value(body).unwrap();
        let and = rule.required_config.and.unwrap();
        assert_eq!(and.len(), 1);
        assert_eq!(and[0].property.as_deref(), Some("location"));
        assert_eq!(
            and[0].value,
            Some(RuleValue::Scalar("us-south".to_string()))
        );
    }
}
