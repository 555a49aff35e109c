//! Writes a document's links and fragments to the link tables.

use tracing::{info, warn};

use crate::descriptor::{DocId, LinkDescriptor};
use crate::error::LinkResult;
use crate::result::LinkReport;
use crate::traits::{LinkNetRow, LinkNetWriter};

/// What to do with the link tables after checking a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValidationPolicy {
    /// Validate and report; never write.
    ValidateOnly,
    /// Write only if validation found no errors.
    #[default]
    UpdateIfValid,
    /// Validate, then write regardless of errors.
    UpdateUnconditionally,
    /// Write without validating.
    UpdateLinkTablesOnly,
}

impl ValidationPolicy {
    /// Whether links are validated under this policy.
    pub fn validates(&self) -> bool {
        !matches!(self, ValidationPolicy::UpdateLinkTablesOnly)
    }

    /// Whether the link tables are written given `error_count` errors.
    pub fn should_persist(&self, error_count: usize) -> bool {
        match self {
            ValidationPolicy::ValidateOnly => false,
            ValidationPolicy::UpdateIfValid => error_count == 0,
            ValidationPolicy::UpdateUnconditionally | ValidationPolicy::UpdateLinkTablesOnly => true,
        }
    }
}

/// Replaces a document's link-net and fragment rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkNetUpdater;

impl LinkNetUpdater {
    /// Creates an updater.
    pub fn new() -> Self {
        Self
    }

    /// Writes the checked links of `report` if its policy allows.
    ///
    /// All of the document's link rows are deleted and the persistable ones
    /// inserted, then the same for fragment rows. Under
    /// [`ValidationPolicy::UpdateUnconditionally`] documents whose links
    /// into vanished fragments were reported are marked invalid. Returns
    /// whether anything was written.
    pub fn commit<W: LinkNetWriter + ?Sized>(&self, writer: &mut W, report: &LinkReport) -> LinkResult<bool> {
        if !report.policy.should_persist(report.error_count) {
            return Ok(false);
        }
        let Some(doc_id) = report.doc_id else {
            warn!("link tables not updated for a document without an id");
            return Ok(false);
        };

        writer.delete_links_from(doc_id)?;
        let mut rows = 0usize;
        for row in report.links.iter().filter_map(|link| link_row(doc_id, link)) {
            writer.insert_link(&row)?;
            rows += 1;
        }

        writer.delete_fragments(doc_id)?;
        for fragment in &report.fragments {
            writer.insert_fragment(doc_id, fragment)?;
        }

        if report.policy == ValidationPolicy::UpdateUnconditionally {
            for source in &report.missing_fragments.broken_sources {
                writer.mark_invalid(*source)?;
            }
        }

        info!(
            doc = doc_id,
            links = rows,
            fragments = report.fragments.len(),
            policy = ?report.policy,
            "link net updated"
        );
        Ok(true)
    }

    /// Removes every link and fragment row of a document.
    pub fn remove<W: LinkNetWriter + ?Sized>(&self, writer: &mut W, doc_id: DocId) -> LinkResult<()> {
        writer.delete_links_from(doc_id)?;
        writer.delete_fragments(doc_id)?;
        info!(doc = doc_id, "link net rows removed");
        Ok(())
    }
}

/// Link-net row for a persistable link.
fn link_row(doc_id: DocId, link: &LinkDescriptor) -> Option<LinkNetRow> {
    if !link.is_persistable() {
        return None;
    }
    Some(LinkNetRow {
        link_type: link.link_type_id?,
        source_doc: doc_id,
        source_field: link.source_field.clone(),
        target_doc: link.target_doc_id?,
        target_fragment: link.target_fragment.clone(),
        raw_reference: link.raw_reference.clone(),
    })
}
