//! Link descriptors and CDR document identifiers.

use std::fmt;

/// Numeric CDR document id.
pub type DocId = u64;

/// Numeric document type id.
pub type DocTypeId = u32;

/// Numeric link type id.
pub type LinkTypeId = u32;

/// Ordered set of `cdr:id` values defined in one document.
pub type FragmentSet = std::collections::BTreeSet<String>;

/// Prefix of textual document ids.
pub const DOC_ID_PREFIX: &str = "CDR";

/// Parses `CDR0000012345` (any number of digits) into a numeric id.
///
/// The prefix is case-sensitive. Returns `None` for anything else.
pub fn parse_doc_id(text: &str) -> Option<DocId> {
    let digits = text.strip_prefix(DOC_ID_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Formats a numeric id as `CDR` plus ten zero-padded digits.
pub fn format_doc_id(id: DocId) -> String {
    format!("{DOC_ID_PREFIX}{id:010}")
}

/// Splits a reference into its document part and optional fragment.
///
/// An empty fragment after `#` counts as no fragment.
pub fn split_reference(reference: &str) -> (&str, Option<&str>) {
    match reference.split_once('#') {
        Some((doc, frag)) if !frag.is_empty() => (doc, Some(frag)),
        Some((doc, _)) => (doc, None),
        None => (reference, None),
    }
}

/// Attribute style that made an element a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LinkStyle {
    /// `cdr:ref`: reference to another CDR document.
    InternalRef,
    /// `cdr:href`: reference to a CDR document outside the markup flow.
    ExternalRef,
    /// `cdr:xref`: URL outside the CDR. Never validated or stored.
    ExternalHref,
}

impl LinkStyle {
    /// Styles in the order elements are checked for them.
    pub const ALL: [LinkStyle; 3] = [
        LinkStyle::InternalRef,
        LinkStyle::ExternalRef,
        LinkStyle::ExternalHref,
    ];

    /// Attribute carrying this style of link.
    pub fn attribute(&self) -> &'static str {
        match self {
            LinkStyle::InternalRef => "cdr:ref",
            LinkStyle::ExternalRef => "cdr:href",
            LinkStyle::ExternalHref => "cdr:xref",
        }
    }

    /// Whether links of this style point at CDR documents.
    pub fn targets_cdr_document(&self) -> bool {
        !matches!(self, LinkStyle::ExternalHref)
    }
}

/// The source document whose links are being processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// Document id; `None` for a document not yet stored.
    pub id: Option<DocId>,
    /// Document type id.
    pub doc_type: DocTypeId,
    /// Document type name, used in messages.
    pub doc_type_name: String,
}

impl SourceDocument {
    /// Creates a source document description.
    pub fn new(id: Option<DocId>, doc_type: DocTypeId, doc_type_name: impl Into<String>) -> Self {
        Self {
            id,
            doc_type,
            doc_type_name: doc_type_name.into(),
        }
    }
}

/// One reference found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDescriptor {
    /// Id of the document holding the link.
    pub source_doc_id: Option<DocId>,
    /// Type of the document holding the link.
    pub source_doc_type: DocTypeId,
    /// Name of that document type.
    pub source_doc_type_name: String,
    /// Element name carrying the link attribute.
    pub source_field: String,
    /// Which attribute made this a link.
    pub style: LinkStyle,
    /// Attribute value as written.
    pub raw_reference: String,
    /// Target document id, if the reference names one.
    pub target_doc_id: Option<DocId>,
    /// Fragment within the target.
    pub target_fragment: Option<String>,
    /// Target document type, once resolved.
    pub target_doc_type: Option<DocTypeId>,
    /// Name of the target document type, once resolved.
    pub target_doc_type_name: Option<String>,
    /// Whether the resolved target is marked deleted.
    pub target_deleted: bool,
    /// Link type permitted for this source field.
    pub link_type_id: Option<LinkTypeId>,
    /// Validation failures in the order found.
    pub errors: Vec<String>,
    /// False for a repeat of an earlier (field, reference) pair.
    pub keep: bool,
    pub(crate) resolved: bool,
}

impl LinkDescriptor {
    /// Creates an unresolved descriptor for a reference found in `source`.
    pub fn new(
        source: &SourceDocument,
        field: impl Into<String>,
        style: LinkStyle,
        raw_reference: impl Into<String>,
    ) -> Self {
        let raw_reference = raw_reference.into();
        let (doc_part, fragment) = split_reference(&raw_reference);
        let target_doc_id = if doc_part.is_empty() {
            source.id
        } else {
            parse_doc_id(doc_part)
        };
        let target_fragment = fragment.map(str::to_string);

        Self {
            source_doc_id: source.id,
            source_doc_type: source.doc_type,
            source_doc_type_name: source.doc_type_name.clone(),
            source_field: field.into(),
            style,
            target_doc_id,
            target_fragment,
            raw_reference,
            target_doc_type: None,
            target_doc_type_name: None,
            target_deleted: false,
            link_type_id: None,
            errors: Vec::new(),
            keep: true,
            resolved: false,
        }
    }

    /// Whether the reference points into the source document itself.
    pub fn is_self_link(&self) -> bool {
        self.raw_reference.starts_with('#')
            || (self.source_doc_id.is_some() && self.target_doc_id == self.source_doc_id)
    }

    /// Records a validation failure.
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Number of recorded failures.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Whether any failure was recorded.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Whether this link can become a link-net row.
    pub fn is_persistable(&self) -> bool {
        self.keep
            && self.link_type_id.is_some()
            && self.target_doc_id.is_some()
            && self.target_doc_type.is_some()
    }
}

impl fmt::Display for LinkDescriptor {
    /// `SrcType/Field=TrgType:CDR0000000042#frag`, followed by each error.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}=", self.source_doc_type_name, self.source_field)?;
        match (&self.target_doc_type_name, self.target_doc_id) {
            (Some(type_name), Some(id)) => {
                write!(f, "{type_name}:{}", format_doc_id(id))?;
                if let Some(frag) = &self.target_fragment {
                    write!(f, "#{frag}")?;
                }
            }
            _ => f.write_str(&self.raw_reference)?,
        }
        for error in &self.errors {
            write!(f, " ERROR: {error}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> SourceDocument {
        SourceDocument::new(Some(100), 1, "Summary")
    }

    #[test]
    fn test_parse_doc_id() {
        assert_eq!(parse_doc_id("CDR0000012345"), Some(12345));
        assert_eq!(parse_doc_id("CDR42"), Some(42));
        assert_eq!(parse_doc_id("CDR"), None);
        assert_eq!(parse_doc_id("cdr42"), None);
        assert_eq!(parse_doc_id("CDR42x"), None);
        assert_eq!(parse_doc_id("42"), None);
    }

    #[test]
    fn test_format_doc_id() {
        assert_eq!(format_doc_id(12345), "CDR0000012345");
        assert_eq!(parse_doc_id(&format_doc_id(7)), Some(7));
    }

    #[test]
    fn test_split_reference() {
        assert_eq!(split_reference("CDR1#_3"), ("CDR1", Some("_3")));
        assert_eq!(split_reference("#_3"), ("", Some("_3")));
        assert_eq!(split_reference("CDR1#"), ("CDR1", None));
        assert_eq!(split_reference("CDR1"), ("CDR1", None));
    }

    #[test]
    fn test_new_descriptor_targets() {
        let link = LinkDescriptor::new(&summary(), "Ref", LinkStyle::InternalRef, "CDR0000000200#_1");
        assert_eq!(link.target_doc_id, Some(200));
        assert_eq!(link.target_fragment.as_deref(), Some("_1"));
        assert!(link.keep);
        assert!(!link.is_self_link());
        assert!(!link.is_persistable());
    }

    #[test]
    fn test_self_link_uses_source_id() {
        let link = LinkDescriptor::new(&summary(), "Ref", LinkStyle::InternalRef, "#_9");
        assert_eq!(link.target_doc_id, Some(100));
        assert!(link.is_self_link());
    }

    #[test]
    fn test_bad_reference_has_no_target() {
        let link = LinkDescriptor::new(&summary(), "Ref", LinkStyle::ExternalRef, "Term 42");
        assert_eq!(link.target_doc_id, None);
    }

    #[test]
    fn test_display_resolved_with_errors() {
        let mut link = LinkDescriptor::new(&summary(), "TermRef", LinkStyle::InternalRef, "CDR200#_1");
        link.target_doc_type_name = Some("Term".into());
        link.add_error("Target link is to deleted document");
        assert_eq!(
            link.to_string(),
            "Summary/TermRef=Term:CDR0000000200#_1 ERROR: Target link is to deleted document"
        );
        assert_eq!(link.error_count(), 1);
    }

    #[test]
    fn test_display_unresolved_uses_raw_reference() {
        let mut link = LinkDescriptor::new(&summary(), "TermRef", LinkStyle::InternalRef, "CDR999");
        link.add_error("a");
        link.add_error("b");
        assert_eq!(link.to_string(), "Summary/TermRef=CDR999 ERROR: a ERROR: b");
    }

    #[test]
    fn test_style_attributes() {
        let names: Vec<_> = LinkStyle::ALL.iter().map(LinkStyle::attribute).collect();
        assert_eq!(names, vec!["cdr:ref", "cdr:href", "cdr:xref"]);
        assert!(!LinkStyle::ExternalHref.targets_cdr_document());
    }
}
