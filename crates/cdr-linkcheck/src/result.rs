//! Result types for link checking.

use crate::descriptor::{DocId, FragmentSet, LinkDescriptor};
use crate::updater::ValidationPolicy;
use crate::validator::MissingFragmentReport;

/// Outcome of checking (and possibly storing) one document's links.
///
/// # Example
///
/// ```ignore
/// let report = checker.set_links(&mut txn, &tree, &source, ValidationPolicy::UpdateIfValid)?;
/// if !report.is_valid() {
///     for message in report.messages() {
///         println!("{message}");
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReport {
    /// Document the links came from.
    pub doc_id: Option<DocId>,
    /// Policy the document was checked under.
    pub policy: ValidationPolicy,
    /// Every CDR link in document order.
    pub links: Vec<LinkDescriptor>,
    /// `cdr:id` values defined in the document.
    pub fragments: FragmentSet,
    /// Problems not tied to a single link.
    pub structural_errors: Vec<String>,
    /// Other documents pointing at fragments this version lacks.
    pub missing_fragments: MissingFragmentReport,
    /// Total number of errors.
    pub error_count: usize,
    /// Whether the link tables were written.
    pub persisted: bool,
}

impl LinkReport {
    /// True when no errors were found.
    pub fn is_valid(&self) -> bool {
        self.error_count == 0
    }

    /// Links carrying at least one error.
    pub fn links_with_errors(&self) -> impl Iterator<Item = &LinkDescriptor> {
        self.links.iter().filter(|link| link.has_errors())
    }

    /// Links that become link-net rows when the report is committed.
    pub fn persistable_links(&self) -> impl Iterator<Item = &LinkDescriptor> {
        self.links.iter().filter(|link| link.is_persistable())
    }

    /// Human-readable errors: structural errors, then one line per failing
    /// link, then missing-fragment errors.
    pub fn messages(&self) -> Vec<String> {
        self.structural_errors
            .iter()
            .cloned()
            .chain(self.links_with_errors().map(ToString::to_string))
            .chain(self.missing_fragments.errors.iter().cloned())
            .collect()
    }
}

/// Outcome of removing a document's links.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    /// One message per stored link into the document.
    pub messages: Vec<String>,
    /// Whether the document's link rows were removed.
    pub removed: bool,
}
