//! Resource lifecycle layer
//!
//! Maps the declarative attribute-map representation of a rule onto the
//! service's create/read/update/delete operations. The attribute map is the
//! local state; the only persisted key is the composite identifier
//! `<instance_id>/<rule_id>`.
//!
//! # Module Structure
//!
//! - [`rule`] - The rule resource's four lifecycle operations

pub mod rule;

use anyhow::{bail, Result};

/// Parse a composite identifier of the form `<instance_id>/<rule_id>`.
/// Anything other than exactly two non-empty segments is a hard error.
pub fn parse_composite_id(id: &str) -> Result<(String, String)> {
    let mut parts = id.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(instance_id), Some(rule_id), None)
            if !instance_id.is_empty() && !rule_id.is_empty() =>
        {
            Ok((instance_id.to_string(), rule_id.to_string()))
        }
        _ => bail!("Invalid composite ID {id:?}: expected <instance_id>/<rule_id>"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_composite_id() {
        assert_eq!(
            parse_composite_id("abc/def").unwrap(),
            ("abc".to_string(), "def".to_string())
        );
    }

    #[test]
    fn test_parse_composite_id_rejects_bad_shapes() {
        assert!(parse_composite_id("abc").is_err());
        assert!(parse_composite_id("").is_err());
        assert!(parse_composite_id("a/b/c").is_err());
        assert!(parse_composite_id("/def").is_err());
        assert!(parse_composite_id("abc/").is_err());
    }
}
