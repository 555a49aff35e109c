//! Link-check rule parser implementation using nom.
//!
//! Grammar (one precedence level, left associative):
//!
//! ```text
//! rule     := term (connector term)*
//! term     := '(' rule ')' | relation
//! relation := tag relator (value | '*')
//! tag      := [A-Za-z0-9._:/@-]+
//! relator  := '==' | '!=' | '+=' | '-='
//! value    := '"' ( '\' any | any-but-quote )* '"'
//! connector:= '|'+ | '&'+ | 'and' ['not'] | 'or'
//! ```
//!
//! Whitespace, including line breaks, may appear between any two tokens.
//! Keywords are case-insensitive and must stand as whole words. A `not`
//! directly followed by a relator is a field tag, not a negation.

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while1},
    character::complete::{char, multispace0, satisfy},
    combinator::{map, not, opt, value},
    error::{ErrorKind, ParseError},
    multi::many1_count,
    sequence::{preceded, terminated},
    IResult,
};

use crate::ast::{Connector, Pair, Relation, Relator, RuleNode};
use crate::error::{RuleResult, SyntaxError, SyntaxErrorKind};

/// Longest field tag accepted by default.
pub const DEFAULT_MAX_TAG_LEN: usize = 512;

/// Deepest parenthesis nesting accepted by default.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Parse a link-check rule with default limits.
///
/// The result is always a [`RuleNode::Pair`]; a rule with a single term has
/// no right operand.
///
/// # Examples
///
/// ```rust
/// use cdr_linkrule::{parse_rule, Connector, RuleNode};
///
/// let rule = parse_rule(r#"/Term/Status == "Active" and not /Term/Type == *"#).unwrap();
/// match rule {
///     RuleNode::Pair(pair) => assert_eq!(pair.connector, Connector::AndNot),
///     _ => unreachable!(),
/// }
///
/// assert!(parse_rule(r#"/Term/Status == "Active"#).is_err());
/// ```
pub fn parse_rule(input: &str) -> RuleResult<RuleNode> {
    RuleParser::new().parse(input)
}

/// Rule parser with configurable limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleParser {
    max_tag_len: usize,
    max_depth: usize,
}

impl Default for RuleParser {
    fn default() -> Self {
        Self {
            max_tag_len: DEFAULT_MAX_TAG_LEN,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl RuleParser {
    /// Creates a parser with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the longest accepted field tag. Longer tags are rejected.
    pub fn with_max_tag_len(mut self, max_tag_len: usize) -> Self {
        self.max_tag_len = max_tag_len;
        self
    }

    /// Sets the deepest accepted parenthesis nesting.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Longest accepted field tag.
    pub fn max_tag_len(&self) -> usize {
        self.max_tag_len
    }

    /// Parses rule text into a tree.
    pub fn parse(&self, input: &str) -> RuleResult<RuleNode> {
        if input.trim().is_empty() {
            return Err(SyntaxError::new(0, SyntaxErrorKind::EmptyRule));
        }

        let parsed = self.rule(input, 0).and_then(|(rest, node)| {
            if rest.is_empty() {
                Ok((rest, node))
            } else {
                fail(rest, SyntaxErrorKind::UnbalancedParentheses)
            }
        });

        match parsed {
            Ok((_, node)) => Ok(node),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                Err(SyntaxError::new(input.len() - e.input.len(), e.kind))
            }
            Err(nom::Err::Incomplete(_)) => {
                Err(SyntaxError::new(input.len(), SyntaxErrorKind::Unexpected))
            }
        }
    }

    // ========================================================================
    // Rules and terms
    // ========================================================================

    fn rule<'a>(&self, input: &'a str, depth: usize) -> PResult<'a, RuleNode> {
        let (input, _) = ws(input)?;
        let (mut input, first) = self.term(input, depth)?;
        let mut pair = Pair {
            left: Box::new(first),
            right: None,
            connector: Connector::And,
        };

        loop {
            let (rest, _) = ws(input)?;
            if rest.is_empty() || rest.starts_with(')') {
                return Ok((rest, RuleNode::Pair(pair)));
            }
            let (rest, connector) = connector(rest)?;
            let (rest, _) = ws(rest)?;
            let (rest, term) = self.term(rest, depth)?;

            pair = if pair.right.is_none() {
                Pair {
                    left: pair.left,
                    right: Some(Box::new(term)),
                    connector,
                }
            } else {
                Pair {
                    left: Box::new(RuleNode::Pair(pair)),
                    right: Some(Box::new(term)),
                    connector,
                }
            };
            input = rest;
        }
    }

    fn term<'a>(&self, input: &'a str, depth: usize) -> PResult<'a, RuleNode> {
        if let Some(inner) = input.strip_prefix('(') {
            if depth >= self.max_depth {
                return fail(
                    input,
                    SyntaxErrorKind::NestingTooDeep {
                        max: self.max_depth,
                    },
                );
            }
            let (rest, node) = self.rule(inner, depth + 1)?;
            let (rest, _) = expect(char(')'), SyntaxErrorKind::UnbalancedParentheses)(rest)?;
            return Ok((rest, node));
        }

        let (rest, relation) = self.relation(input)?;
        Ok((rest, RuleNode::Relation(relation)))
    }

    // ========================================================================
    // Relations
    // ========================================================================

    fn relation<'a>(&self, input: &'a str) -> PResult<'a, Relation> {
        let (input, tag) = self.field_tag(input)?;
        let (input, _) = ws(input)?;
        let (input, relator) = relator(input)?;
        let (input, _) = ws(input)?;
        let (input, expected) = alt((value(None, char('*')), map(quoted_value, Some)))(input)?;
        Ok((input, Relation::new(tag, relator, expected)))
    }

    fn field_tag<'a>(&self, input: &'a str) -> PResult<'a, &'a str> {
        let (rest, text) = expect(take_while1(is_tag_char), SyntaxErrorKind::MissingTag)(input)?;
        if text.len() > self.max_tag_len {
            return fail(
                input,
                SyntaxErrorKind::TagTooLong {
                    max: self.max_tag_len,
                },
            );
        }
        Ok((rest, text))
    }
}

fn relator(input: &str) -> PResult<'_, Relator> {
    expect(relator_symbol, SyntaxErrorKind::MissingRelator)(input)
}

fn relator_symbol(input: &str) -> PResult<'_, Relator> {
    alt((
        value(Relator::Equal, tag("==")),
        value(Relator::NotEqual, tag("!=")),
        value(Relator::PicklistEqual, tag("+=")),
        value(Relator::PicklistNotEqual, tag("-=")),
    ))(input)
}

/// Double-quoted value; a backslash takes the next character literally.
fn quoted_value(input: &str) -> PResult<'_, String> {
    let (mut rest, _) = expect(char('"'), SyntaxErrorKind::MissingValue)(input)?;
    let mut text = String::new();

    loop {
        let mut chars = rest.chars();
        match chars.next() {
            None => return fail(input, SyntaxErrorKind::UnterminatedValue),
            Some('"') => return Ok((chars.as_str(), text)),
            Some('\\') => match chars.next() {
                Some(escaped) => text.push(escaped),
                None => return fail(input, SyntaxErrorKind::UnterminatedValue),
            },
            Some(c) => text.push(c),
        }
        rest = chars.as_str();
    }
}

// ============================================================================
// Connectors
// ============================================================================

fn connector(input: &str) -> PResult<'_, Connector> {
    expect(
        alt((
            value(Connector::Or, many1_count(char('|'))),
            value(Connector::And, many1_count(char('&'))),
            and_keyword,
            value(Connector::Or, keyword("or")),
        )),
        SyntaxErrorKind::MissingConnector,
    )(input)
}

fn and_keyword(input: &str) -> PResult<'_, Connector> {
    let (input, _) = keyword("and")(input)?;
    // `and not == *` tests a field named `not`.
    let (input, negated) = opt(preceded(
        ws,
        terminated(keyword("not"), not(preceded(ws, relator_symbol))),
    ))(input)?;
    let connector = if negated.is_some() {
        Connector::AndNot
    } else {
        Connector::And
    };
    Ok((input, connector))
}

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    terminated(tag_no_case(word), not(satisfy(is_tag_char)))
}

// ============================================================================
// Helpers
// ============================================================================

/// nom error carrying the rule-level failure kind.
#[derive(Debug, Clone, PartialEq)]
struct RuleFailure<'a> {
    input: &'a str,
    kind: SyntaxErrorKind,
}

impl<'a> ParseError<&'a str> for RuleFailure<'a> {
    fn from_error_kind(input: &'a str, _kind: ErrorKind) -> Self {
        Self {
            input,
            kind: SyntaxErrorKind::Unexpected,
        }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

type PResult<'a, T> = IResult<&'a str, T, RuleFailure<'a>>;

fn fail<T>(input: &str, kind: SyntaxErrorKind) -> PResult<'_, T> {
    Err(nom::Err::Failure(RuleFailure { input, kind }))
}

/// Turns a recoverable error from `parser` into a positioned failure.
fn expect<'a, T, P>(mut parser: P, kind: SyntaxErrorKind) -> impl FnMut(&'a str) -> PResult<'a, T>
where
    P: FnMut(&'a str) -> PResult<'a, T>,
{
    move |input| match parser(input) {
        Err(nom::Err::Error(_)) => fail(input, kind),
        other => other,
    }
}

fn ws(input: &str) -> PResult<'_, &str> {
    multispace0(input)
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ':' | '/' | '@')
}
