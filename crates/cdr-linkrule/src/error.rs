//! Error types for link-check rule parsing.

use thiserror::Error;

/// What went wrong while parsing a rule.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SyntaxErrorKind {
    /// The rule text was empty or only whitespace.
    #[error("empty link check rule")]
    EmptyRule,

    /// A field tag was expected but not found.
    #[error("missing field tag")]
    MissingTag,

    /// A field tag was longer than the parser accepts.
    #[error("field tag longer than {max} characters")]
    TagTooLong {
        /// Maximum accepted tag length.
        max: usize,
    },

    /// No `==`, `!=`, `+=` or `-=` after a tag.
    #[error("missing relational operator")]
    MissingRelator,

    /// Neither a quoted value nor `*` after a relator.
    #[error("missing leading quote for value")]
    MissingValue,

    /// A quoted value ran to the end of the input.
    #[error("missing trailing quote")]
    UnterminatedValue,

    /// Two terms were not joined by a boolean operator.
    #[error("missing boolean operator")]
    MissingConnector,

    /// Parentheses do not balance.
    #[error("unbalanced parentheses")]
    UnbalancedParentheses,

    /// Parentheses nested deeper than the parser accepts.
    #[error("parentheses nested deeper than {max} levels")]
    NestingTooDeep {
        /// Maximum accepted nesting depth.
        max: usize,
    },

    /// Input the grammar does not account for.
    #[error("unexpected input")]
    Unexpected,
}

/// A rule failed to parse.
///
/// `position` is the byte offset into the rule text where parsing stopped.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("link check rule syntax error at position {position}: {kind}")]
pub struct SyntaxError {
    /// Byte offset of the failure.
    pub position: usize,
    /// Kind of failure.
    pub kind: SyntaxErrorKind,
}

impl SyntaxError {
    /// Creates a syntax error.
    pub fn new(position: usize, kind: SyntaxErrorKind) -> Self {
        Self { position, kind }
    }
}

/// Result type for rule parsing.
pub type RuleResult<T> = std::result::Result<T, SyntaxError>;
