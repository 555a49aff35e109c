//! Evaluates compiled rules against a target document's field index.

use cdr_linkrule::{Connector, Relation, Relator, RuleNode};

use crate::descriptor::DocId;
use crate::error::LinkResult;
use crate::traits::FieldIndex;

/// Evaluates rules with short-circuiting, left operand first.
pub struct RuleEvaluator<'a, I: FieldIndex + ?Sized> {
    index: &'a I,
}

impl<'a, I: FieldIndex + ?Sized> RuleEvaluator<'a, I> {
    /// Creates an evaluator over `index`.
    pub fn new(index: &'a I) -> Self {
        Self { index }
    }

    /// Evaluates one field test against `target`.
    ///
    /// Picklist relators always hold and never touch the index.
    pub fn eval_relation(&self, relation: &Relation, target: DocId) -> LinkResult<bool> {
        if relation.relator.is_picklist_only() {
            return Ok(true);
        }
        let found = self
            .index
            .has_field(target, &relation.tag, relation.value.as_deref())?;
        Ok(match relation.relator {
            Relator::Equal => found,
            _ => !found,
        })
    }

    /// Evaluates a rule tree against `target`.
    pub fn eval_rule(&self, node: &RuleNode, target: DocId) -> LinkResult<bool> {
        let pair = match node {
            RuleNode::Relation(relation) => return self.eval_relation(relation, target),
            RuleNode::Pair(pair) => pair,
        };

        let left = self.eval_rule(&pair.left, target)?;
        let Some(right) = &pair.right else {
            return Ok(left);
        };

        match pair.connector {
            Connector::And => {
                if !left {
                    return Ok(false);
                }
                self.eval_rule(right, target)
            }
            Connector::AndNot => {
                if !left {
                    return Ok(false);
                }
                Ok(!self.eval_rule(right, target)?)
            }
            Connector::Or => {
                if left {
                    return Ok(true);
                }
                self.eval_rule(right, target)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LinkCheckError;
    use cdr_linkrule::parse_rule;
    use parking_lot::Mutex;
    use std::collections::HashSet;

    /// Field index that records every lookup and fails on the tag `boom`.
    struct MockIndex {
        fields: HashSet<(DocId, String, String)>,
        lookups: Mutex<Vec<String>>,
    }

    impl MockIndex {
        fn new(fields: &[(DocId, &str, &str)]) -> Self {
            Self {
                fields: fields
                    .iter()
                    .map(|(d, p, v)| (*d, p.to_string(), v.to_string()))
                    .collect(),
                lookups: Mutex::new(Vec::new()),
            }
        }

        fn lookups(&self) -> Vec<String> {
            self.lookups.lock().clone()
        }
    }

    impl FieldIndex for MockIndex {
        fn has_field(&self, doc_id: DocId, path: &str, value: Option<&str>) -> LinkResult<bool> {
            self.lookups.lock().push(path.to_string());
            if path == "boom" {
                return Err(LinkCheckError::Store("index unavailable".into()));
            }
            Ok(self
                .fields
                .iter()
                .any(|(d, p, v)| *d == doc_id && p == path && value.map_or(true, |want| want == v)))
        }
    }

    fn eval(index: &MockIndex, rule: &str, target: DocId) -> LinkResult<bool> {
        let tree = parse_rule(rule).unwrap();
        RuleEvaluator::new(index).eval_rule(&tree, target)
    }

    fn index() -> MockIndex {
        MockIndex::new(&[
            (7, "/Term/Status", "Active"),
            (7, "/Term/Type", "Index term"),
            (8, "/Term/Status", "Retired"),
        ])
    }

    #[test]
    fn test_tag_with_several_values() {
        let index = MockIndex::new(&[(1, "/T", "a"), (1, "/T", "b")]);
        assert!(eval(&index, r#"/T == "a""#, 1).unwrap());
        assert!(eval(&index, r#"/T == "b""#, 1).unwrap());
        assert!(!eval(&index, r#"/T != "a""#, 1).unwrap());
        assert!(!eval(&index, r#"/T == "c""#, 1).unwrap());
        assert!(eval(&index, r#"/T != "c""#, 1).unwrap());
        assert!(eval(&index, "/T == *", 1).unwrap());
        assert!(!eval(&index, "/T != *", 1).unwrap());
    }

    #[test]
    fn test_value_match() {
        let index = index();
        assert!(eval(&index, r#"/Term/Status == "Active""#, 7).unwrap());
        assert!(!eval(&index, r#"/Term/Status == "Active""#, 8).unwrap());
        assert!(eval(&index, r#"/Term/Status != "Active""#, 8).unwrap());
    }

    #[test]
    fn test_wildcard_checks_presence_only() {
        let index = index();
        assert!(eval(&index, "/Term/Status == *", 8).unwrap());
        assert!(!eval(&index, "/Term/Type == *", 8).unwrap());
        assert!(eval(&index, "/Term/Type != *", 8).unwrap());
    }

    #[test]
    fn test_connectors() {
        let index = index();
        assert!(eval(&index, r#"/Term/Status == "Active" and /Term/Type == *"#, 7).unwrap());
        assert!(!eval(&index, r#"/Term/Status == "Active" and not /Term/Type == *"#, 7).unwrap());
        assert!(eval(&index, r#"/Term/Status == "Retired" and not /Term/Type == *"#, 8).unwrap());
        assert!(eval(&index, r#"/Term/Status == "Gone" or /Term/Type == *"#, 7).unwrap());
        assert!(!eval(&index, r#"/Term/Status == "Gone" or /Term/Type == *"#, 8).unwrap());
    }

    #[test]
    fn test_grouping_changes_result() {
        let index = MockIndex::new(&[(9, "/Term/Status", "Retired"), (9, "/Term/Type", "Index term")]);
        let flat = r#"/Term/Status == "Retired" or /Term/Status == "Active" and not /Term/Type == *"#;
        let grouped = r#"/Term/Status == "Retired" or (/Term/Status == "Active" and not /Term/Type == *)"#;
        assert!(!eval(&index, flat, 9).unwrap());
        assert!(eval(&index, grouped, 9).unwrap());
    }

    #[test]
    fn test_picklist_relators_never_query() {
        let index = index();
        assert!(eval(&index, r#"boom += "x" and boom -= *"#, 7).unwrap());
        assert!(index.lookups().is_empty());
    }

    #[test]
    fn test_and_short_circuits() {
        let index = index();
        assert!(!eval(&index, r#"/Term/Status == "Gone" and boom == *"#, 7).unwrap());
        assert!(!eval(&index, r#"/Term/Status == "Gone" and not boom == *"#, 7).unwrap());
        assert_eq!(index.lookups(), vec!["/Term/Status", "/Term/Status"]);
    }

    #[test]
    fn test_or_short_circuits() {
        let index = index();
        assert!(eval(&index, r#"/Term/Status == "Active" or boom == *"#, 7).unwrap());
        assert_eq!(index.lookups(), vec!["/Term/Status"]);
    }

    #[test]
    fn test_store_failure_propagates() {
        let index = index();
        let err = eval(&index, r#"/Term/Status == "Active" and boom == *"#, 7).unwrap_err();
        assert!(matches!(err, LinkCheckError::Store(_)));
    }
}
