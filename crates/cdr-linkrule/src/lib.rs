//! # cdr-linkrule
//!
//! Parser for the custom link-check rule language used by CDR link types.
//!
//! A link type may carry a `LinkTargetContains` property whose value is a
//! rule describing what the target of a link must contain, for example:
//!
//! ```text
//! /Term/TermType/TermTypeName == "Index term" and not /Term/TermStatus == "Retired"
//! ```
//!
//! Rules are boolean combinations of field tests against the target
//! document's query index. This crate turns the text into an immutable
//! [`RuleNode`] tree; evaluation and SQL generation live in `cdr-linkcheck`.
//!
//! ## Example
//!
//! ```rust
//! use cdr_linkrule::{parse_rule, Relator, RuleNode};
//!
//! let rule = parse_rule(r#"/Term/Status == "Active" or /Term/Status == "Pending""#).unwrap();
//! assert_eq!(rule.relations().len(), 2);
//! assert!(rule.relations().iter().all(|r| r.relator == Relator::Equal));
//!
//! // Display gives back canonical rule text.
//! assert_eq!(
//!     rule.to_string(),
//!     r#"/Term/Status == "Active" or /Term/Status == "Pending""#
//! );
//! ```
//!
//! ## Relators
//!
//! | Relator | Meaning during validation |
//! |---------|---------------------------|
//! | `==` | field present (with the value, unless `*`) |
//! | `!=` | field absent |
//! | `+=` | always true, picklist only |
//! | `-=` | always true, picklist only |

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod ast;
pub mod error;
pub mod parser;

pub use ast::{Connector, Pair, Relation, Relator, RuleNode};
pub use error::{RuleResult, SyntaxError, SyntaxErrorKind};
pub use parser::{parse_rule, RuleParser, DEFAULT_MAX_DEPTH, DEFAULT_MAX_TAG_LEN};
