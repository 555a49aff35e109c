//! Store interfaces used by link checking.
//!
//! The link checker never talks to a database directly. Reads go through
//! [`DocumentStore`], [`FieldIndex`], [`LinkCatalog`] and [`LinkNetReader`],
//! bundled as [`LinkStore`]. Writes go through a [`LinkNetWriter`], which is
//! the caller's transaction handle so that link-net changes commit or roll
//! back together with the document save.
//!
//! # Example: Implementing the read side over SQL
//!
//! ```ignore
//! use cdr_linkcheck::{DocumentStore, DocId, DocTypeId, FragmentSet, LinkResult, TargetDocument};
//!
//! impl DocumentStore for SqlStore {
//!     fn doc_type_id(&self, name: &str) -> LinkResult<Option<DocTypeId>> {
//!         self.query_opt("SELECT id FROM doc_type WHERE name = ?", name)
//!     }
//!
//!     fn target_document(&self, doc_id: DocId) -> LinkResult<Option<TargetDocument>> {
//!         // SELECT d.doc_type, t.name, d.active_status FROM all_docs d JOIN doc_type t ...
//!     }
//!
//!     fn fragment_ids(&self, doc_id: DocId) -> LinkResult<FragmentSet> {
//!         // SELECT fragment FROM link_fragment WHERE doc_id = ?
//!     }
//! }
//! ```

use std::collections::BTreeSet;

use crate::descriptor::{DocId, DocTypeId, FragmentSet, LinkTypeId};
use crate::error::LinkResult;

// =============================================================================
// Row types
// =============================================================================

/// What the store knows about a link target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDocument {
    /// Document type id.
    pub doc_type: DocTypeId,
    /// Document type name.
    pub doc_type_name: String,
    /// False when the document is marked deleted.
    pub active: bool,
}

/// A property attached to a link type, naming a custom check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkProperty {
    /// Custom rule name, e.g. `LinkTargetContains`.
    pub name: String,
    /// Rule argument.
    pub value: String,
}

impl LinkProperty {
    /// Creates a link property.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A stored link to a fragment of some document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentLink {
    /// Fragment the link points at.
    pub fragment: String,
    /// Document holding the link.
    pub source_doc: DocId,
}

/// A stored link into a document, with the linking document's title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundLink {
    /// Document holding the link.
    pub source_doc: DocId,
    /// Title of that document.
    pub source_title: String,
    /// Fragment the link points at.
    pub fragment: Option<String>,
}

/// One row of the link net.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkNetRow {
    /// Link type.
    pub link_type: LinkTypeId,
    /// Linking document.
    pub source_doc: DocId,
    /// Element holding the link.
    pub source_field: String,
    /// Linked document.
    pub target_doc: DocId,
    /// Fragment within the linked document.
    pub target_fragment: Option<String>,
    /// Reference as written.
    pub raw_reference: String,
}

// =============================================================================
// Read side
// =============================================================================

/// Document and fragment lookups.
pub trait DocumentStore: Send + Sync {
    /// Id of a document type by name.
    fn doc_type_id(&self, name: &str) -> LinkResult<Option<DocTypeId>>;

    /// Type and status of a document, or `None` if it does not exist.
    fn target_document(&self, doc_id: DocId) -> LinkResult<Option<TargetDocument>>;

    /// Fragment identifiers recorded for a document.
    fn fragment_ids(&self, doc_id: DocId) -> LinkResult<FragmentSet>;

    /// Whether a document has a fragment.
    ///
    /// Default implementation loads the whole set. Override with a single-row
    /// lookup where the store supports one.
    fn fragment_exists(&self, doc_id: DocId, fragment: &str) -> LinkResult<bool> {
        Ok(self.fragment_ids(doc_id)?.contains(fragment))
    }
}

/// Inverted index of field paths and values per document.
pub trait FieldIndex: Send + Sync {
    /// Whether `doc_id` has a field at `path`, with `value` if given.
    fn has_field(&self, doc_id: DocId, path: &str, value: Option<&str>) -> LinkResult<bool>;
}

/// Link type definitions.
pub trait LinkCatalog: Send + Sync {
    /// Link type allowed for `field` in documents of `doc_type`.
    fn link_type(&self, doc_type: DocTypeId, field: &str) -> LinkResult<Option<LinkTypeId>>;

    /// Document types a link type may point at.
    fn permitted_target_types(&self, link_type: LinkTypeId) -> LinkResult<BTreeSet<DocTypeId>>;

    /// Custom checks attached to a link type, in declaration order.
    fn link_properties(&self, link_type: LinkTypeId) -> LinkResult<Vec<LinkProperty>> {
        let _ = link_type;
        Ok(Vec::new())
    }
}

/// Queries over the stored link net.
pub trait LinkNetReader: Send + Sync {
    /// Stored links from other documents into fragments of `doc_id`,
    /// ordered by fragment.
    fn fragment_links_to(&self, doc_id: DocId) -> LinkResult<Vec<FragmentLink>>;

    /// All stored links into `doc_id`.
    fn inbound_links(&self, doc_id: DocId) -> LinkResult<Vec<InboundLink>>;
}

/// Everything the link checker reads.
pub trait LinkStore: DocumentStore + FieldIndex + LinkCatalog + LinkNetReader {}

impl<T> LinkStore for T where T: DocumentStore + FieldIndex + LinkCatalog + LinkNetReader {}

// =============================================================================
// Write side
// =============================================================================

/// Transactional writes to the link tables.
///
/// Implemented by the caller's transaction handle. Nothing here commits.
pub trait LinkNetWriter {
    /// Removes every link-net row whose source is `doc_id`.
    fn delete_links_from(&mut self, doc_id: DocId) -> LinkResult<()>;

    /// Adds one link-net row.
    fn insert_link(&mut self, row: &LinkNetRow) -> LinkResult<()>;

    /// Removes every fragment row of `doc_id`.
    fn delete_fragments(&mut self, doc_id: DocId) -> LinkResult<()>;

    /// Adds one fragment row.
    fn insert_fragment(&mut self, doc_id: DocId, fragment: &str) -> LinkResult<()>;

    /// Marks a document as failing validation.
    fn mark_invalid(&mut self, doc_id: DocId) -> LinkResult<()>;
}
