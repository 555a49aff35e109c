//! In-memory store implementing every store trait.
//!
//! Useful for embedding and for tests. Writes go through a
//! [`MemoryTransaction`] that buffers them until [`commit`](MemoryTransaction::commit);
//! dropping the transaction discards them.

use std::collections::{BTreeSet, HashMap, HashSet};

use parking_lot::RwLock;
use tracing::debug;

use crate::descriptor::{DocId, DocTypeId, FragmentSet, LinkTypeId};
use crate::error::LinkResult;
use crate::traits::{
    DocumentStore, FieldIndex, FragmentLink, InboundLink, LinkCatalog, LinkNetReader,
    LinkNetRow, LinkNetWriter, LinkProperty, TargetDocument,
};

#[derive(Debug, Clone)]
struct StoredDocument {
    doc_type: DocTypeId,
    title: String,
    active: bool,
    invalid: bool,
}

#[derive(Debug, Clone)]
struct StoredLinkType {
    name: String,
    targets: BTreeSet<DocTypeId>,
    properties: Vec<LinkProperty>,
}

#[derive(Debug, Default)]
struct MemoryData {
    doc_types: Vec<String>,
    documents: HashMap<DocId, StoredDocument>,
    fragments: HashMap<DocId, FragmentSet>,
    fields: HashSet<(DocId, String, String)>,
    link_types: Vec<StoredLinkType>,
    link_fields: HashMap<(DocTypeId, String), LinkTypeId>,
    link_net: Vec<LinkNetRow>,
}

impl MemoryData {
    fn doc_type_id(&self, name: &str) -> Option<DocTypeId> {
        self.doc_types
            .iter()
            .position(|t| t == name)
            .map(|index| index as DocTypeId + 1)
    }

    fn doc_type_name(&self, id: DocTypeId) -> Option<&str> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.doc_types.get(index).map(String::as_str)
    }

    fn ensure_doc_type(&mut self, name: &str) -> DocTypeId {
        match self.doc_type_id(name) {
            Some(id) => id,
            None => {
                self.doc_types.push(name.to_string());
                self.doc_types.len() as DocTypeId
            }
        }
    }

    fn link_type(&self, id: LinkTypeId) -> Option<&StoredLinkType> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.link_types.get(index)
    }

    fn apply(&mut self, op: WriteOp) {
        match op {
            WriteOp::DeleteLinks(doc) => self.link_net.retain(|row| row.source_doc != doc),
            WriteOp::InsertLink(row) => self.link_net.push(row),
            WriteOp::DeleteFragments(doc) => {
                self.fragments.remove(&doc);
            }
            WriteOp::InsertFragment(doc, fragment) => {
                self.fragments.entry(doc).or_default().insert(fragment);
            }
            WriteOp::MarkInvalid(doc) => {
                if let Some(document) = self.documents.get_mut(&doc) {
                    document.invalid = true;
                }
            }
        }
    }
}

/// Thread-safe in-memory document, index, catalog and link-net store.
///
/// # Example
///
/// ```rust
/// use cdr_linkcheck::MemoryStore;
///
/// let store = MemoryStore::new();
/// store.add_document(200, "Term", "Breast cancer");
/// store.add_field(200, "/Term/TermStatus", "Reviewed");
/// let link_type = store.add_link_type("SummaryTermRef", &["Term"]);
/// store.add_link_field("Summary", "TermRef", link_type);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<MemoryData>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of a document type, creating it if needed.
    pub fn add_doc_type(&self, name: &str) -> DocTypeId {
        self.data.write().ensure_doc_type(name)
    }

    /// Adds or replaces an active document.
    pub fn add_document(&self, id: DocId, doc_type: &str, title: &str) {
        let mut data = self.data.write();
        let doc_type = data.ensure_doc_type(doc_type);
        data.documents.insert(
            id,
            StoredDocument {
                doc_type,
                title: title.to_string(),
                active: true,
                invalid: false,
            },
        );
    }

    /// Marks a document active or deleted.
    pub fn set_active(&self, id: DocId, active: bool) {
        if let Some(document) = self.data.write().documents.get_mut(&id) {
            document.active = active;
        }
    }

    /// Records a stored fragment of a document.
    pub fn add_fragment(&self, id: DocId, fragment: &str) {
        self.data
            .write()
            .fragments
            .entry(id)
            .or_default()
            .insert(fragment.to_string());
    }

    /// Adds an index entry for a document.
    pub fn add_field(&self, id: DocId, path: &str, value: &str) {
        self.data
            .write()
            .fields
            .insert((id, path.to_string(), value.to_string()));
    }

    /// Defines a link type permitted to point at documents of `targets`.
    pub fn add_link_type(&self, name: &str, targets: &[&str]) -> LinkTypeId {
        let mut data = self.data.write();
        let targets = targets.iter().map(|t| data.ensure_doc_type(t)).collect();
        data.link_types.push(StoredLinkType {
            name: name.to_string(),
            targets,
            properties: Vec::new(),
        });
        data.link_types.len() as LinkTypeId
    }

    /// Allows links of `link_type` from `field` in documents of `doc_type`.
    pub fn add_link_field(&self, doc_type: &str, field: &str, link_type: LinkTypeId) {
        let mut data = self.data.write();
        let doc_type = data.ensure_doc_type(doc_type);
        data.link_fields.insert((doc_type, field.to_string()), link_type);
    }

    /// Attaches a custom check to a link type.
    pub fn add_link_property(&self, link_type: LinkTypeId, name: &str, value: &str) {
        let mut data = self.data.write();
        let index = (link_type as usize).checked_sub(1);
        if let Some(stored) = index.and_then(|i| data.link_types.get_mut(i)) {
            stored.properties.push(LinkProperty::new(name, value));
        }
    }

    /// Name of a link type.
    pub fn link_type_name(&self, link_type: LinkTypeId) -> Option<String> {
        self.data.read().link_type(link_type).map(|t| t.name.clone())
    }

    /// Seeds a link-net row directly.
    pub fn add_link(&self, row: LinkNetRow) {
        self.data.write().link_net.push(row);
    }

    /// Stored link-net rows from a document, in insertion order.
    pub fn links_from(&self, doc_id: DocId) -> Vec<LinkNetRow> {
        self.data
            .read()
            .link_net
            .iter()
            .filter(|row| row.source_doc == doc_id)
            .cloned()
            .collect()
    }

    /// Whether a document has been marked as failing validation.
    pub fn is_invalid(&self, doc_id: DocId) -> bool {
        self.data
            .read()
            .documents
            .get(&doc_id)
            .is_some_and(|d| d.invalid)
    }

    /// Starts a write transaction.
    pub fn begin(&self) -> MemoryTransaction<'_> {
        MemoryTransaction {
            store: self,
            ops: Vec::new(),
        }
    }
}

impl DocumentStore for MemoryStore {
    fn doc_type_id(&self, name: &str) -> LinkResult<Option<DocTypeId>> {
        Ok(self.data.read().doc_type_id(name))
    }

    fn target_document(&self, doc_id: DocId) -> LinkResult<Option<TargetDocument>> {
        let data = self.data.read();
        Ok(data.documents.get(&doc_id).map(|doc| TargetDocument {
            doc_type: doc.doc_type,
            doc_type_name: data.doc_type_name(doc.doc_type).unwrap_or_default().to_string(),
            active: doc.active,
        }))
    }

    fn fragment_ids(&self, doc_id: DocId) -> LinkResult<FragmentSet> {
        Ok(self
            .data
            .read()
            .fragments
            .get(&doc_id)
            .cloned()
            .unwrap_or_default())
    }

    fn fragment_exists(&self, doc_id: DocId, fragment: &str) -> LinkResult<bool> {
        Ok(self
            .data
            .read()
            .fragments
            .get(&doc_id)
            .is_some_and(|set| set.contains(fragment)))
    }
}

impl FieldIndex for MemoryStore {
    fn has_field(&self, doc_id: DocId, path: &str, value: Option<&str>) -> LinkResult<bool> {
        let data = self.data.read();
        Ok(match value {
            Some(value) => data
                .fields
                .contains(&(doc_id, path.to_string(), value.to_string())),
            None => data
                .fields
                .iter()
                .any(|(doc, p, _)| *doc == doc_id && p == path),
        })
    }
}

impl LinkCatalog for MemoryStore {
    fn link_type(&self, doc_type: DocTypeId, field: &str) -> LinkResult<Option<LinkTypeId>> {
        Ok(self
            .data
            .read()
            .link_fields
            .get(&(doc_type, field.to_string()))
            .copied())
    }

    fn permitted_target_types(&self, link_type: LinkTypeId) -> LinkResult<BTreeSet<DocTypeId>> {
        Ok(self
            .data
            .read()
            .link_type(link_type)
            .map(|t| t.targets.clone())
            .unwrap_or_default())
    }

    fn link_properties(&self, link_type: LinkTypeId) -> LinkResult<Vec<LinkProperty>> {
        Ok(self
            .data
            .read()
            .link_type(link_type)
            .map(|t| t.properties.clone())
            .unwrap_or_default())
    }
}

impl LinkNetReader for MemoryStore {
    fn fragment_links_to(&self, doc_id: DocId) -> LinkResult<Vec<FragmentLink>> {
        let mut links: Vec<_> = self
            .data
            .read()
            .link_net
            .iter()
            .filter(|row| row.target_doc == doc_id)
            .filter_map(|row| {
                row.target_fragment.as_ref().map(|fragment| FragmentLink {
                    fragment: fragment.clone(),
                    source_doc: row.source_doc,
                })
            })
            .collect();
        links.sort_by(|a, b| (&a.fragment, a.source_doc).cmp(&(&b.fragment, b.source_doc)));
        Ok(links)
    }

    fn inbound_links(&self, doc_id: DocId) -> LinkResult<Vec<InboundLink>> {
        let data = self.data.read();
        let mut links: Vec<_> = data
            .link_net
            .iter()
            .filter(|row| row.target_doc == doc_id)
            .map(|row| InboundLink {
                source_doc: row.source_doc,
                source_title: data
                    .documents
                    .get(&row.source_doc)
                    .map(|d| d.title.clone())
                    .unwrap_or_default(),
                fragment: row.target_fragment.clone(),
            })
            .collect();
        links.sort_by(|a, b| (a.source_doc, &a.fragment).cmp(&(b.source_doc, &b.fragment)));
        Ok(links)
    }
}

#[derive(Debug, Clone)]
enum WriteOp {
    DeleteLinks(DocId),
    InsertLink(LinkNetRow),
    DeleteFragments(DocId),
    InsertFragment(DocId, String),
    MarkInvalid(DocId),
}

/// Buffered writes against a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    ops: Vec<WriteOp>,
}

impl MemoryTransaction<'_> {
    /// Applies every buffered write atomically.
    pub fn commit(self) {
        let mut data = self.store.data.write();
        debug!(writes = self.ops.len(), "committing link transaction");
        for op in self.ops {
            data.apply(op);
        }
    }

    /// Discards every buffered write.
    pub fn rollback(self) {
        debug!(writes = self.ops.len(), "rolling back link transaction");
    }

    /// Number of buffered writes.
    pub fn pending(&self) -> usize {
        self.ops.len()
    }
}

impl LinkNetWriter for MemoryTransaction<'_> {
    fn delete_links_from(&mut self, doc_id: DocId) -> LinkResult<()> {
        self.ops.push(WriteOp::DeleteLinks(doc_id));
        Ok(())
    }

    fn insert_link(&mut self, row: &LinkNetRow) -> LinkResult<()> {
        self.ops.push(WriteOp::InsertLink(row.clone()));
        Ok(())
    }

    fn delete_fragments(&mut self, doc_id: DocId) -> LinkResult<()> {
        self.ops.push(WriteOp::DeleteFragments(doc_id));
        Ok(())
    }

    fn insert_fragment(&mut self, doc_id: DocId, fragment: &str) -> LinkResult<()> {
        self.ops
            .push(WriteOp::InsertFragment(doc_id, fragment.to_string()));
        Ok(())
    }

    fn mark_invalid(&mut self, doc_id: DocId) -> LinkResult<()> {
        self.ops.push(WriteOp::MarkInvalid(doc_id));
        Ok(())
    }
}
