//! Link checker: the entry point used when documents are saved,
//! validated or deleted.

use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::RuleCache;
use crate::config::LinkCheckConfig;
use crate::custom::{CustomRuleRegistry, RuleContext};
use crate::descriptor::{format_doc_id, DocId, SourceDocument};
use crate::dom::TreeNode;
use crate::error::{LinkCheckError, LinkResult};
use crate::extractor::{ExtractedLinks, LinkExtractor};
use crate::result::{DeleteReport, LinkReport};
use crate::subquery::{PicklistQuery, SubqueryGenerator};
use crate::traits::{LinkNetWriter, LinkStore};
use crate::updater::{LinkNetUpdater, ValidationPolicy};
use crate::validator::{LinkValidator, MissingFragmentReport};

/// Column holding candidate document ids in picklist queries.
const PICKLIST_ID_COLUMN: &str = "d.id";

/// Extracts, validates and stores document links.
///
/// The rule cache is shared across checkers (and threads) through an `Arc`;
/// everything else is per checker.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use cdr_linkcheck::{LinkChecker, MemoryStore, RuleCache, ValidationPolicy, XmlNode};
///
/// let store = MemoryStore::new();
/// store.add_document(100, "Summary", "Lung cancer treatment");
/// store.add_document(200, "Term", "Lung cancer");
/// let link_type = store.add_link_type("SummaryTermRef", &["Term"]);
/// store.add_link_field("Summary", "TermRef", link_type);
///
/// let cache = Arc::new(RuleCache::default());
/// let checker = LinkChecker::new(&store, cache);
///
/// let tree = XmlNode::parse(r#"<Summary><TermRef cdr:ref="CDR0000000200"/></Summary>"#).unwrap();
/// let source = checker.source_document(Some(100), "Summary").unwrap();
///
/// let mut txn = store.begin();
/// let report = checker
///     .set_links(&mut txn, &tree, &source, ValidationPolicy::UpdateIfValid)
///     .unwrap();
/// txn.commit();
///
/// assert!(report.is_valid());
/// assert!(report.persisted);
/// assert_eq!(store.links_from(100).len(), 1);
/// ```
pub struct LinkChecker<'a> {
    /// Read access to documents, index, catalog and link net.
    store: &'a dyn LinkStore,
    /// Shared compiled-rule cache.
    cache: Arc<RuleCache>,
    /// Custom checks by property name.
    registry: Arc<CustomRuleRegistry>,
    /// SQL generator for picklist queries.
    subqueries: SubqueryGenerator,
    /// Limits.
    config: LinkCheckConfig,
}

impl<'a> LinkChecker<'a> {
    /// Creates a checker with default configuration and built-in custom checks.
    pub fn new(store: &'a dyn LinkStore, cache: Arc<RuleCache>) -> Self {
        Self::with_config(store, cache, LinkCheckConfig::default())
    }

    /// Creates a checker with custom configuration.
    ///
    /// The rule cache keeps the settings it was built with; use
    /// `config.rule_cache` when building it.
    pub fn with_config(store: &'a dyn LinkStore, cache: Arc<RuleCache>, config: LinkCheckConfig) -> Self {
        Self {
            store,
            cache,
            registry: Arc::new(CustomRuleRegistry::default()),
            subqueries: SubqueryGenerator::default(),
            config,
        }
    }

    /// Replaces the custom check registry.
    pub fn with_registry(mut self, registry: Arc<CustomRuleRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Replaces the SQL generator used for picklists.
    pub fn with_subqueries(mut self, subqueries: SubqueryGenerator) -> Self {
        self.subqueries = subqueries;
        self
    }

    /// Returns the checker configuration.
    pub fn config(&self) -> &LinkCheckConfig {
        &self.config
    }

    /// Returns the shared rule cache.
    pub fn cache(&self) -> &RuleCache {
        &self.cache
    }

    /// Describes a document by id and type name.
    ///
    /// # Errors
    ///
    /// [`LinkCheckError::UnknownDocType`] if the type does not exist.
    pub fn source_document(&self, id: Option<DocId>, doc_type_name: &str) -> LinkResult<SourceDocument> {
        let doc_type = self
            .store
            .doc_type_id(doc_type_name)?
            .ok_or_else(|| LinkCheckError::UnknownDocType(doc_type_name.to_string()))?;
        Ok(SourceDocument::new(id, doc_type, doc_type_name))
    }

    fn validator(&self) -> LinkValidator<'_> {
        LinkValidator::new(
            self.store,
            &self.cache,
            &self.registry,
            &self.subqueries,
            &self.config,
        )
    }

    /// Finds links and fragments in a document without validating them.
    pub fn extract_links<N: TreeNode>(&self, root: &N, source: &SourceDocument) -> LinkResult<ExtractedLinks> {
        LinkExtractor::new(self.store, &self.config).extract(root, source)
    }

    /// Extracts and validates a document's links. Writes nothing.
    ///
    /// Under [`ValidationPolicy::UpdateLinkTablesOnly`] targets are resolved
    /// but not validated.
    pub fn check_links<N: TreeNode>(
        &self,
        root: &N,
        source: &SourceDocument,
        policy: ValidationPolicy,
    ) -> LinkResult<LinkReport> {
        let ExtractedLinks {
            mut links,
            fragments,
            errors,
        } = self.extract_links(root, source)?;

        let validator = self.validator();
        let missing_fragments = if policy.validates() {
            validator.validate(&mut links, &fragments)?;
            validator.check_missing_fragment_targets(source.id, &fragments)?
        } else {
            validator.resolve_targets(&mut links)?;
            MissingFragmentReport::default()
        };

        let link_errors: usize = links.iter().map(|link| link.error_count()).sum();
        let error_count = errors.len() + link_errors + missing_fragments.error_count();
        debug!(
            doc = ?source.id,
            links = links.len(),
            errors = error_count,
            "checked links"
        );

        Ok(LinkReport {
            doc_id: source.id,
            policy,
            links,
            fragments,
            structural_errors: errors,
            missing_fragments,
            error_count,
            persisted: false,
        })
    }

    /// Checks a document's links and, if the policy allows, replaces its
    /// rows in the link tables through `writer`.
    ///
    /// Nothing is committed here; the caller commits or rolls back `writer`
    /// together with the document itself.
    pub fn set_links<N: TreeNode, W: LinkNetWriter + ?Sized>(
        &self,
        writer: &mut W,
        root: &N,
        source: &SourceDocument,
        policy: ValidationPolicy,
    ) -> LinkResult<LinkReport> {
        let mut report = self.check_links(root, source, policy)?;
        report.persisted = LinkNetUpdater::new().commit(writer, &report)?;
        Ok(report)
    }

    /// Lists the documents that link to `doc_id`, one message per link.
    ///
    /// Links from the document to itself are not listed.
    pub fn inbound_links(&self, doc_id: DocId) -> LinkResult<Vec<String>> {
        let messages = self
            .store
            .inbound_links(doc_id)?
            .into_iter()
            .filter(|link| link.source_doc != doc_id)
            .map(|link| {
                let mut message = format!(
                    "Document {}: ({}) links to this document",
                    format_doc_id(link.source_doc),
                    link.source_title
                );
                if let Some(fragment) = link.fragment {
                    message.push_str(&format!(" Fragment({fragment})"));
                }
                message
            })
            .collect();
        Ok(messages)
    }

    /// Removes a document's link and fragment rows unless other documents
    /// still link to it and the policy forbids it.
    ///
    /// `ValidateOnly` never removes; `UpdateIfValid` removes only when nothing
    /// links in; the other policies always remove.
    pub fn delete_links<W: LinkNetWriter + ?Sized>(
        &self,
        writer: &mut W,
        doc_id: DocId,
        policy: ValidationPolicy,
    ) -> LinkResult<DeleteReport> {
        let messages = self.inbound_links(doc_id)?;
        let blocked = match policy {
            ValidationPolicy::ValidateOnly => true,
            ValidationPolicy::UpdateIfValid => !messages.is_empty(),
            ValidationPolicy::UpdateUnconditionally | ValidationPolicy::UpdateLinkTablesOnly => false,
        };

        if blocked {
            info!(doc = doc_id, inbound = messages.len(), ?policy, "link rows kept");
            return Ok(DeleteReport {
                messages,
                removed: false,
            });
        }

        LinkNetUpdater::new().remove(writer, doc_id)?;
        Ok(DeleteReport {
            messages,
            removed: true,
        })
    }

    /// Builds the picklist query for links from `field` in documents of
    /// `doc_type_name`: candidate targets whose title matches
    /// `title_pattern`, narrowed by the link type's custom checks.
    pub fn picklist_query(
        &self,
        doc_type_name: &str,
        field: &str,
        title_pattern: &str,
        max_rows: Option<usize>,
    ) -> LinkResult<PicklistQuery> {
        let source = self.source_document(None, doc_type_name)?;
        let link_type = self
            .store
            .link_type(source.doc_type, field)?
            .ok_or_else(|| LinkCheckError::UnknownLinkField {
                doc_type: doc_type_name.to_string(),
                field: field.to_string(),
            })?;

        let ctx = RuleContext {
            store: self.store,
            cache: &self.cache,
            subqueries: &self.subqueries,
        };
        let mut predicates = Vec::new();
        for property in self.store.link_properties(link_type)? {
            let rule = self.registry.get(&property.name)?;
            if let Some(predicate) = rule.picklist_predicate(&ctx, &property.value, PICKLIST_ID_COLUMN)? {
                predicates.push(predicate);
            }
        }

        Ok(self
            .subqueries
            .picklist_query(link_type, &predicates, title_pattern, max_rows))
    }
}

impl std::fmt::Debug for LinkChecker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkChecker")
            .field("cache", &self.cache)
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}
