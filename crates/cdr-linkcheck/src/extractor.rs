//! Finds links and fragment identifiers in a document tree.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::config::LinkCheckConfig;
use crate::descriptor::{FragmentSet, LinkDescriptor, LinkStyle, LinkTypeId, SourceDocument};
use crate::dom::{NodeKind, TreeNode};
use crate::error::LinkResult;
use crate::traits::LinkCatalog;

/// Attribute holding an element's fragment identifier.
pub const FRAGMENT_ATTRIBUTE: &str = "cdr:id";

/// Everything found in one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedLinks {
    /// One descriptor per CDR reference, in document order.
    pub links: Vec<LinkDescriptor>,
    /// `cdr:id` values defined in the document.
    pub fragments: FragmentSet,
    /// Problems not tied to a single link, in document order.
    pub errors: Vec<String>,
}

/// Walks a document tree depth-first collecting links and fragments.
pub struct LinkExtractor<'a, C: LinkCatalog + ?Sized> {
    catalog: &'a C,
    config: &'a LinkCheckConfig,
}

/// Per-walk state.
#[derive(Default)]
struct Walk {
    found: ExtractedLinks,
    seen: HashSet<(String, String)>,
    link_types: HashMap<String, Option<LinkTypeId>>,
}

impl<'a, C: LinkCatalog + ?Sized> LinkExtractor<'a, C> {
    /// Creates an extractor resolving link types through `catalog`.
    pub fn new(catalog: &'a C, config: &'a LinkCheckConfig) -> Self {
        Self { catalog, config }
    }

    /// Extracts links and fragments from the tree rooted at `root`.
    ///
    /// Problems with individual links are recorded on their descriptors;
    /// only store failures abort the walk.
    pub fn extract<N: TreeNode>(&self, root: &N, source: &SourceDocument) -> LinkResult<ExtractedLinks> {
        let mut walk = Walk::default();
        self.visit(root, source, &mut walk)?;

        debug!(
            doc = ?source.id,
            doc_type = %source.doc_type_name,
            links = walk.found.links.len(),
            fragments = walk.found.fragments.len(),
            "extracted links"
        );
        Ok(walk.found)
    }

    fn visit<N: TreeNode>(&self, node: &N, source: &SourceDocument, walk: &mut Walk) -> LinkResult<()> {
        if node.kind() != NodeKind::Element {
            return Ok(());
        }

        let mut styles = LinkStyle::ALL
            .into_iter()
            .filter_map(|style| node.attribute(style.attribute()).map(|value| (style, value)))
            .filter(|(_, value)| !value.is_empty());
        let first = styles.next();
        let extra_links = styles.next().is_some();

        if let Some((style, reference)) = first {
            if style.targets_cdr_document() {
                let link = self.describe(node.name(), style, reference, extra_links, source, walk)?;
                walk.found.links.push(link);
            }
        }

        if let Some(fragment) = node.attribute(FRAGMENT_ATTRIBUTE).filter(|f| !f.is_empty()) {
            self.record_fragment(fragment, walk);
        }

        for child in node.children() {
            self.visit(child, source, walk)?;
        }
        Ok(())
    }

    fn describe(
        &self,
        field: &str,
        style: LinkStyle,
        reference: &str,
        extra_links: bool,
        source: &SourceDocument,
        walk: &mut Walk,
    ) -> LinkResult<LinkDescriptor> {
        let reference = reference.trim();
        let mut link = LinkDescriptor::new(source, field, style, reference);

        if extra_links {
            link.add_error("Can only have one link from a single element");
        }

        let key = (field.to_string(), reference.to_string());
        if !walk.seen.insert(key) {
            link.keep = false;
        }

        if reference.len() > self.config.max_reference_len {
            link.add_error(format!(
                "Link reference exceeds {} characters",
                self.config.max_reference_len
            ));
            link.keep = false;
        }
        if let Some(fragment) = &link.target_fragment {
            if fragment.len() > self.config.max_fragment_len {
                let message = format!(
                    "Fragment '{fragment}' exceeds {} characters",
                    self.config.max_fragment_len
                );
                link.add_error(message);
                link.keep = false;
            }
        }

        link.link_type_id = match walk.link_types.get(field) {
            Some(cached) => *cached,
            None => {
                let found = self.catalog.link_type(source.doc_type, field)?;
                walk.link_types.insert(field.to_string(), found);
                found
            }
        };
        if link.link_type_id.is_none() && link.keep {
            link.add_error(format!(
                "No link type is defined for field {field} in document type {}",
                source.doc_type_name
            ));
        }

        Ok(link)
    }

    fn record_fragment(&self, fragment: &str, walk: &mut Walk) {
        if fragment.len() > self.config.max_fragment_len {
            walk.found.errors.push(format!(
                "cdr:id \"{fragment}\" exceeds {} characters",
                self.config.max_fragment_len
            ));
        } else if !walk.found.fragments.insert(fragment.to_string()) {
            walk.found
                .errors
                .push(format!("cdr:id \"{fragment}\" used more than once"));
        }
    }
}
