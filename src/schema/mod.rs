//! Attribute schema layer
//!
//! Declares the shape of the rule resource's attribute map: which field names
//! are recognized, their types, and whether they are required, optional,
//! computed, or deprecated. The `required_config` condition tree is recursive,
//! so its schema is built by a recursive function bounded by
//! [`MAX_REQUIRED_CONFIG_DEPTH`] rather than by hand-written nested literals.
//!
//! The same schema doubles as a validation surface: [`validate_map`] walks an
//! attribute map against a schema and reports every shape mismatch, so malformed
//! input surfaces as structured errors instead of faults deep in the codec.

pub mod validate;

use std::collections::BTreeMap;

/// Maximum nesting depth of the `required_config` tree that the schema can
/// describe. Deeper trees returned by the service will not round-trip.
pub const MAX_REQUIRED_CONFIG_DEPTH: u32 = 5;

/// Schema map for one block level, keyed by attribute name.
pub type SchemaMap = BTreeMap<&'static str, AttrSchema>;

/// The type of a single attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrType {
    String,
    Bool,
    /// A flat list of strings.
    StringList,
    /// A repeated nested block with its own schema.
    Block(BlockDef),
}

/// Element schema and cardinality for a nested block attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockDef {
    pub schema: SchemaMap,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
}

/// Declaration of one attribute: type, description, and lifecycle flags.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrSchema {
    pub attr_type: AttrType,
    pub description: &'static str,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    /// Changing this field forces recreation of the resource.
    pub force_new: bool,
    /// Deprecation message, if the field is kept only for compatibility.
    pub deprecated: Option<&'static str>,
}

impl AttrSchema {
    fn new(attr_type: AttrType, description: &'static str) -> Self {
        Self {
            attr_type,
            description,
            required: false,
            optional: false,
            computed: false,
            force_new: false,
            deprecated: None,
        }
    }

    /// A required, user-supplied attribute.
    pub fn required(attr_type: AttrType, description: &'static str) -> Self {
        Self {
            required: true,
            ..Self::new(attr_type, description)
        }
    }

    /// An optional, user-supplied attribute.
    pub fn optional(attr_type: AttrType, description: &'static str) -> Self {
        Self {
            optional: true,
            ..Self::new(attr_type, description)
        }
    }

    /// A server-assigned attribute, populated on read.
    pub fn computed(attr_type: AttrType, description: &'static str) -> Self {
        Self {
            computed: true,
            ..Self::new(attr_type, description)
        }
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn deprecated(mut self, message: &'static str) -> Self {
        self.deprecated = Some(message);
        self
    }
}

/// Convenience constructor for a single-element nested block.
fn single_block(schema: SchemaMap) -> AttrType {
    AttrType::Block(BlockDef {
        schema,
        min_items: Some(1),
        max_items: Some(1),
    })
}

/// Schema for a `required_config` node at recursion depth `depth`.
///
/// The four leaf fields are always present. Combinator fields are only exposed
/// while `depth` is within [`MAX_REQUIRED_CONFIG_DEPTH`]; past the bound a node
/// can only be a leaf comparison.
pub fn required_config_schema(depth: u32) -> SchemaMap {
    let mut map = SchemaMap::new();
    map.insert(
        "description",
        AttrSchema::optional(AttrType::String, "The condition description."),
    );
    map.insert(
        "property",
        AttrSchema::optional(
            AttrType::String,
            "The resource property the condition checks.",
        ),
    );
    map.insert(
        "operator",
        AttrSchema::optional(
            AttrType::String,
            "How the property is compared to the value. Operators are string, numeric, or boolean.",
        ),
    );
    map.insert(
        "value",
        AttrSchema::optional(
            AttrType::String,
            "The value the property is compared against. Lists are written as `[a,b,c]`.",
        ),
    );

    if depth > MAX_REQUIRED_CONFIG_DEPTH {
        return map;
    }

    map.insert(
        "and",
        AttrSchema::optional(
            AttrType::Block(BlockDef {
                schema: required_config_schema(depth + 1),
                min_items: None,
                max_items: None,
            }),
            "A list of conditions that must all be satisfied.",
        ),
    );
    map.insert(
        "or",
        AttrSchema::optional(
            AttrType::Block(BlockDef {
                schema: required_config_schema(depth + 1),
                min_items: None,
                max_items: None,
            }),
            "A list of conditions where any one must be satisfied.",
        ),
    );
    map.insert(
        "all",
        AttrSchema::optional(
            single_block(sub_rule_schema(depth + 1)),
            "A sub-rule that every matching target resource must satisfy.",
        ),
    );
    map.insert(
        "all_if",
        AttrSchema::optional(
            single_block(sub_rule_schema(depth + 1)),
            "A sub-rule that every matching target resource must satisfy, if any exist.",
        ),
    );
    map.insert(
        "any",
        AttrSchema::optional(
            single_block(sub_rule_schema(depth + 1)),
            "A sub-rule that at least one matching target resource must satisfy.",
        ),
    );
    map.insert(
        "any_if",
        AttrSchema::optional(
            single_block(sub_rule_schema(depth + 1)),
            "A sub-rule that at least one matching target resource must satisfy, if any exist.",
        ),
    );
    map
}

/// Schema for a quantified-combinator sub-rule: exactly one target paired with
/// one nested condition tree.
pub fn sub_rule_schema(depth: u32) -> SchemaMap {
    let mut map = SchemaMap::new();
    map.insert(
        "target",
        AttrSchema::required(
            single_block(target_schema()),
            "The resource class the sub-rule applies to.",
        ),
    );
    map.insert(
        "required_config",
        AttrSchema::required(
            single_block(required_config_schema(depth + 1)),
            "The conditions the sub-rule's targets must meet.",
        ),
    );
    map
}

/// Schema for a rule target.
pub fn target_schema() -> SchemaMap {
    let mut map = SchemaMap::new();
    map.insert(
        "service_name",
        AttrSchema::required(AttrType::String, "The target service name."),
    );
    map.insert(
        "service_display_name",
        AttrSchema::optional(AttrType::String, "The display name of the target service."),
    );
    map.insert(
        "reference_name",
        AttrSchema::optional(AttrType::String, "The target reference name."),
    );
    map.insert(
        "resource_kind",
        AttrSchema::required(AttrType::String, "The target resource kind."),
    );
    map.insert(
        "additional_target_attributes",
        AttrSchema::optional(
            AttrType::Block(BlockDef {
                schema: additional_target_attribute_schema(),
                min_items: None,
                max_items: None,
            }),
            "Extra properties narrowing which resources the rule targets.",
        ),
    );
    map
}

fn additional_target_attribute_schema() -> SchemaMap {
    let mut map = SchemaMap::new();
    map.insert(
        "name",
        AttrSchema::optional(AttrType::String, "The attribute name."),
    );
    map.insert(
        "operator",
        AttrSchema::optional(AttrType::String, "The operator."),
    );
    map.insert(
        "value",
        AttrSchema::optional(AttrType::String, "The value."),
    );
    map
}

fn enforcement_action_schema() -> SchemaMap {
    let mut map = SchemaMap::new();
    map.insert(
        "action",
        AttrSchema::required(AttrType::String, "To block a request, use `disallow`."),
    );
    map
}

fn import_schema() -> SchemaMap {
    let mut parameter = SchemaMap::new();
    parameter.insert(
        "name",
        AttrSchema::optional(AttrType::String, "The import parameter name."),
    );
    parameter.insert(
        "display_name",
        AttrSchema::optional(AttrType::String, "The display name of the parameter."),
    );
    parameter.insert(
        "description",
        AttrSchema::optional(AttrType::String, "The parameter description."),
    );
    parameter.insert(
        "type",
        AttrSchema::optional(AttrType::String, "The parameter type."),
    );

    let mut map = SchemaMap::new();
    map.insert(
        "parameters",
        AttrSchema::optional(
            AttrType::Block(BlockDef {
                schema: parameter,
                min_items: None,
                max_items: None,
            }),
            "The list of import parameters.",
        ),
    );
    map
}

/// The full top-level schema of the rule resource.
pub fn rule_schema() -> SchemaMap {
    let mut map = SchemaMap::new();

    // Deprecated fields, kept for compatibility with older rule definitions.
    map.insert(
        "name",
        AttrSchema::optional(AttrType::String, "A human-readable alias for the rule.")
            .deprecated("name is now deprecated"),
    );
    map.insert(
        "rule_type",
        AttrSchema::computed(AttrType::String, "The type of rule.").deprecated("use type instead"),
    );
    map.insert(
        "creation_date",
        AttrSchema::computed(AttrType::String, "The date the rule was created.")
            .deprecated("use created_on instead"),
    );
    map.insert(
        "modification_date",
        AttrSchema::computed(AttrType::String, "The date the rule was last modified.")
            .deprecated("use updated_on instead"),
    );
    map.insert(
        "modified_by",
        AttrSchema::computed(AttrType::String, "Who last modified the rule.")
            .deprecated("use updated_by instead"),
    );
    map.insert(
        "enforcement_actions",
        AttrSchema::optional(
            AttrType::Block(BlockDef {
                schema: enforcement_action_schema(),
                min_items: None,
                max_items: Some(1),
            }),
            "Actions the service runs when a resource does not comply.",
        )
        .deprecated("enforcement_actions is now deprecated"),
    );

    map.insert(
        "instance_id",
        AttrSchema::required(AttrType::String, "The ID of the compliance service instance.")
            .force_new(),
    );
    map.insert(
        "rule_id",
        AttrSchema::computed(AttrType::String, "The rule ID."),
    );
    map.insert(
        "account_id",
        AttrSchema::computed(AttrType::String, "The account ID."),
    );
    map.insert(
        "description",
        AttrSchema::required(AttrType::String, "The details of the rule's purpose."),
    );
    map.insert(
        "etag",
        AttrSchema::computed(AttrType::String, "The concurrency token of the rule."),
    );
    map.insert(
        "import",
        AttrSchema::optional(single_block(import_schema()), "The collection of import parameters."),
    );
    map.insert(
        "labels",
        AttrSchema::optional(AttrType::StringList, "The list of labels."),
    );
    map.insert(
        "required_config",
        AttrSchema::required(
            single_block(required_config_schema(0)),
            "The conditions a resource must meet to comply with the rule.",
        ),
    );
    map.insert(
        "target",
        AttrSchema::required(single_block(target_schema()), "The rule target."),
    );
    map.insert(
        "type",
        AttrSchema::computed(
            AttrType::String,
            "The rule type (`user_defined` or `system_defined`).",
        ),
    );
    map.insert(
        "created_on",
        AttrSchema::computed(AttrType::String, "The date the rule was created."),
    );
    map.insert(
        "created_by",
        AttrSchema::computed(AttrType::String, "The user who created the rule."),
    );
    map.insert(
        "updated_on",
        AttrSchema::computed(AttrType::String, "The date the rule was last modified."),
    );
    map.insert(
        "updated_by",
        AttrSchema::computed(AttrType::String, "The user who last modified the rule."),
    );
    map.insert(
        "version",
        AttrSchema::optional(AttrType::String, "The version number of the rule."),
    );

    map
}

/// Validate an attribute map against a schema, collecting every problem found.
///
/// Computed fields may be absent; the `id` key (the composite identifier) is
/// always accepted at the top level. Returns an empty vec when the map
/// conforms.
pub fn validate_map(schema: &SchemaMap, map: &serde_json::Map<String, serde_json::Value>) -> Vec<String> {
    let mut problems = Vec::new();
    validate_block(schema, map, "", &mut problems);
    problems
}

fn validate_block(
    schema: &SchemaMap,
    map: &serde_json::Map<String, serde_json::Value>,
    path: &str,
    problems: &mut Vec<String>,
) {
    for (key, value) in map {
        let at = join_path(path, key);
        if path.is_empty() && key == "id" {
            continue;
        }
        let Some(attr) = schema.get(key.as_str()) else {
            problems.push(format!("{at}: unknown attribute"));
            continue;
        };
        validate_value(attr, value, &at, problems);
    }

    for (key, attr) in schema {
        if attr.required && !map.contains_key(*key) {
            problems.push(format!("{}: missing required attribute", join_path(path, key)));
        }
    }
}

fn validate_value(
    attr: &AttrSchema,
    value: &serde_json::Value,
    path: &str,
    problems: &mut Vec<String>,
) {
    use serde_json::Value;

    match &attr.attr_type {
        AttrType::String => {
            if !value.is_string() {
                problems.push(format!("{path}: expected a string"));
            }
        }
        AttrType::Bool => {
            if !value.is_boolean() {
                problems.push(format!("{path}: expected a boolean"));
            }
        }
        AttrType::StringList => match value {
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if !item.is_string() {
                        problems.push(format!("{path}.{i}: expected a string"));
                    }
                }
            }
            _ => problems.push(format!("{path}: expected a list of strings")),
        },
        AttrType::Block(block) => match value {
            Value::Array(items) => {
                if let Some(min) = block.min_items {
                    if items.len() < min {
                        problems.push(format!("{path}: expected at least {min} block(s)"));
                    }
                }
                if let Some(max) = block.max_items {
                    if items.len() > max {
                        problems.push(format!("{path}: expected at most {max} block(s)"));
                    }
                }
                for (i, item) in items.iter().enumerate() {
                    match item {
                        Value::Object(obj) => {
                            validate_block(&block.schema, obj, &format!("{path}.{i}"), problems);
                        }
                        _ => problems.push(format!("{path}.{i}: expected a block")),
                    }
                }
            }
            _ => problems.push(format!("{path}: expected a list of blocks")),
        },
    }
}

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}
