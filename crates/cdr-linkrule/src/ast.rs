//! Parse tree for custom link-check rules.
//!
//! A rule is a boolean combination of relations. Each relation tests whether
//! the target document carries a field at a given path, optionally with a
//! given value. `Display` renders canonical rule text that parses back to a
//! structurally equal tree.

use std::fmt;

/// Comparison applied to a field tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Relator {
    /// `==`: the target has the field (with the value, if one is given).
    Equal,
    /// `!=`: the target does not have the field.
    NotEqual,
    /// `+=`: picklist-only inclusion, always true during validation.
    PicklistEqual,
    /// `-=`: picklist-only exclusion, always true during validation.
    PicklistNotEqual,
}

impl Relator {
    /// All relators in the order the parser tries them.
    pub const ALL: [Relator; 4] = [
        Relator::Equal,
        Relator::NotEqual,
        Relator::PicklistEqual,
        Relator::PicklistNotEqual,
    ];

    /// Source text of the relator.
    pub fn symbol(&self) -> &'static str {
        match self {
            Relator::Equal => "==",
            Relator::NotEqual => "!=",
            Relator::PicklistEqual => "+=",
            Relator::PicklistNotEqual => "-=",
        }
    }

    /// True for relators that only affect picklist queries.
    pub fn is_picklist_only(&self) -> bool {
        matches!(self, Relator::PicklistEqual | Relator::PicklistNotEqual)
    }

    /// True for relators that test for absence.
    pub fn is_negated(&self) -> bool {
        matches!(self, Relator::NotEqual | Relator::PicklistNotEqual)
    }
}

impl fmt::Display for Relator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Boolean operator joining two terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Connector {
    /// Both sides must hold.
    And,
    /// Either side may hold.
    Or,
    /// Left holds and right does not.
    AndNot,
}

impl Connector {
    /// Keyword form used when rendering rules.
    pub fn keyword(&self) -> &'static str {
        match self {
            Connector::And => "and",
            Connector::Or => "or",
            Connector::AndNot => "and not",
        }
    }
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A single field test, e.g. `/Term/Status == "Active"`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Relation {
    /// Field path in the target document's index.
    pub tag: String,
    /// Comparison to apply.
    pub relator: Relator,
    /// Required field value; `None` (written `*`) only checks the field exists.
    pub value: Option<String>,
}

impl Relation {
    /// Creates a relation.
    pub fn new(tag: impl Into<String>, relator: Relator, value: Option<String>) -> Self {
        Self {
            tag: tag.into(),
            relator,
            value,
        }
    }

    /// Whether the value takes part in the test.
    pub fn check_value(&self) -> bool {
        self.value.is_some()
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ", self.tag, self.relator)?;
        match &self.value {
            None => f.write_str("*"),
            Some(value) => {
                f.write_str("\"")?;
                for c in value.chars() {
                    if c == '"' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{c}")?;
                }
                f.write_str("\"")
            }
        }
    }
}

/// Two terms joined by a connector, or a single term when `right` is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pair {
    /// Left operand, always evaluated first.
    pub left: Box<RuleNode>,
    /// Right operand.
    pub right: Option<Box<RuleNode>>,
    /// How the operands combine. Ignored when `right` is absent.
    pub connector: Connector,
}

/// A compiled rule.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RuleNode {
    /// Leaf field test.
    Relation(Relation),
    /// Boolean combination.
    Pair(Pair),
}

impl RuleNode {
    /// Creates a leaf node.
    pub fn relation(tag: impl Into<String>, relator: Relator, value: Option<&str>) -> Self {
        RuleNode::Relation(Relation::new(tag, relator, value.map(str::to_string)))
    }

    /// Creates a pair with both operands.
    pub fn pair(left: RuleNode, connector: Connector, right: RuleNode) -> Self {
        RuleNode::Pair(Pair {
            left: Box::new(left),
            right: Some(Box::new(right)),
            connector,
        })
    }

    /// Creates a single-term pair.
    pub fn single(term: RuleNode) -> Self {
        RuleNode::Pair(Pair {
            left: Box::new(term),
            right: None,
            connector: Connector::And,
        })
    }

    /// Leaf relations in evaluation order.
    pub fn relations(&self) -> Vec<&Relation> {
        let mut out = Vec::new();
        self.collect_relations(&mut out);
        out
    }

    fn collect_relations<'a>(&'a self, out: &mut Vec<&'a Relation>) {
        match self {
            RuleNode::Relation(relation) => out.push(relation),
            RuleNode::Pair(pair) => {
                pair.left.collect_relations(out);
                if let Some(right) = &pair.right {
                    right.collect_relations(out);
                }
            }
        }
    }

    /// Whether this node is a pair with no right operand.
    fn is_single(&self) -> bool {
        matches!(self, RuleNode::Pair(Pair { right: None, .. }))
    }
}

impl fmt::Display for RuleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleNode::Relation(relation) => write!(f, "{relation}"),
            RuleNode::Pair(pair) => {
                // A bare pair on the left re-folds into the chain; anything
                // else needs parentheses to keep its shape.
                let wrap_left = matches!(*pair.left, RuleNode::Pair(_))
                    && (pair.left.is_single() || pair.right.is_none());
                if wrap_left {
                    write!(f, "({})", pair.left)?;
                } else {
                    write!(f, "{}", pair.left)?;
                }
                if let Some(right) = &pair.right {
                    write!(f, " {} ", pair.connector)?;
                    match **right {
                        RuleNode::Pair(_) => write!(f, "({right})")?,
                        RuleNode::Relation(_) => write!(f, "{right}")?,
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active() -> RuleNode {
        RuleNode::relation("/Term/Status", Relator::Equal, Some("Active"))
    }

    #[test]
    fn test_relator_symbols() {
        let symbols: Vec<_> = Relator::ALL.iter().map(Relator::symbol).collect();
        assert_eq!(symbols, vec!["==", "!=", "+=", "-="]);
        assert!(Relator::PicklistNotEqual.is_picklist_only());
        assert!(Relator::PicklistNotEqual.is_negated());
        assert!(!Relator::Equal.is_negated());
    }

    #[test]
    fn test_relation_display_escapes_value() {
        let relation = Relation::new("Title", Relator::NotEqual, Some(r#"say "hi" \ bye"#.into()));
        assert_eq!(relation.to_string(), r#"Title != "say \"hi\" \\ bye""#);
    }

    #[test]
    fn test_wildcard_display() {
        let node = RuleNode::relation("/Summary/Type", Relator::Equal, None);
        assert_eq!(node.to_string(), "/Summary/Type == *");
    }

    #[test]
    fn test_chain_display_is_flat() {
        let chain = RuleNode::pair(
            RuleNode::pair(active(), Connector::Or, RuleNode::relation("A", Relator::Equal, None)),
            Connector::AndNot,
            RuleNode::relation("B", Relator::PicklistEqual, Some("x")),
        );
        assert_eq!(
            chain.to_string(),
            r#"/Term/Status == "Active" or A == * and not B += "x""#
        );
    }

    #[test]
    fn test_nested_right_is_parenthesized() {
        let inner = RuleNode::pair(
            RuleNode::relation("A", Relator::Equal, None),
            Connector::Or,
            RuleNode::relation("B", Relator::Equal, None),
        );
        let node = RuleNode::pair(active(), Connector::And, inner);
        assert_eq!(node.to_string(), r#"/Term/Status == "Active" and (A == * or B == *)"#);
    }

    #[test]
    fn test_single_left_is_parenthesized() {
        let node = RuleNode::pair(
            RuleNode::single(active()),
            Connector::Or,
            RuleNode::relation("A", Relator::Equal, None),
        );
        assert_eq!(node.to_string(), r#"(/Term/Status == "Active") or A == *"#);
        assert_eq!(RuleNode::single(active()).to_string(), r#"/Term/Status == "Active""#);
    }

    #[test]
    fn test_relations_in_order() {
        let node = RuleNode::pair(
            active(),
            Connector::And,
            RuleNode::relation("A", Relator::NotEqual, None),
        );
        let tags: Vec<_> = node.relations().iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(tags, vec!["/Term/Status", "A"]);
    }
}
