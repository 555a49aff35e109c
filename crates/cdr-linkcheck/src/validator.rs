//! Validates extracted links against the store and link type rules.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::cache::RuleCache;
use crate::config::LinkCheckConfig;
use crate::custom::{CustomRuleRegistry, RuleContext};
use crate::descriptor::{format_doc_id, split_reference, DocId, FragmentSet, LinkDescriptor};
use crate::error::LinkResult;
use crate::subquery::SubqueryGenerator;
use crate::traits::LinkStore;

/// Documents pointing at fragments the new version no longer defines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingFragmentReport {
    /// Error messages, grouped by fragment.
    pub errors: Vec<String>,
    /// Every document holding a link to a missing fragment.
    pub broken_sources: BTreeSet<DocId>,
}

impl MissingFragmentReport {
    /// Number of error messages, including the summary line. Referencing
    /// documents beyond the cap are not counted individually.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

/// Checks links against targets, link types and custom rules.
pub struct LinkValidator<'a> {
    store: &'a dyn LinkStore,
    cache: &'a RuleCache,
    registry: &'a CustomRuleRegistry,
    subqueries: &'a SubqueryGenerator,
    config: &'a LinkCheckConfig,
}

impl<'a> LinkValidator<'a> {
    /// Creates a validator.
    pub fn new(
        store: &'a dyn LinkStore,
        cache: &'a RuleCache,
        registry: &'a CustomRuleRegistry,
        subqueries: &'a SubqueryGenerator,
        config: &'a LinkCheckConfig,
    ) -> Self {
        Self {
            store,
            cache,
            registry,
            subqueries,
            config,
        }
    }

    /// Looks up target type and status for each kept link.
    ///
    /// Self links take the source document's type. Links already resolved
    /// are left alone.
    pub fn resolve_targets(&self, links: &mut [LinkDescriptor]) -> LinkResult<()> {
        for link in links.iter_mut() {
            self.resolve(link)?;
        }
        Ok(())
    }

    fn resolve(&self, link: &mut LinkDescriptor) -> LinkResult<()> {
        if link.resolved || !link.keep {
            return Ok(());
        }
        link.resolved = true;

        if link.is_self_link() {
            link.target_doc_type = Some(link.source_doc_type);
            link.target_doc_type_name = Some(link.source_doc_type_name.clone());
            return Ok(());
        }
        let Some(target) = link.target_doc_id else {
            return Ok(());
        };
        if let Some(doc) = self.store.target_document(target)? {
            link.target_doc_type = Some(doc.doc_type);
            link.target_doc_type_name = Some(doc.doc_type_name);
            link.target_deleted = !doc.active;
        }
        Ok(())
    }

    /// Validates every link, recording failures on the descriptors.
    ///
    /// `fragments` is the source document's own fragment set, used for self
    /// links. Returns the total number of errors on the descriptors.
    pub fn validate(&self, links: &mut [LinkDescriptor], fragments: &FragmentSet) -> LinkResult<usize> {
        for link in links.iter_mut() {
            self.resolve(link)?;
            self.validate_link(link, fragments)?;
        }
        Ok(links.iter().map(LinkDescriptor::error_count).sum())
    }

    fn validate_link(&self, link: &mut LinkDescriptor, fragments: &FragmentSet) -> LinkResult<()> {
        // Repeats were checked on first sight.
        if !link.keep {
            return Ok(());
        }

        let self_link = link.is_self_link();
        if link.target_doc_id.is_none() && !self_link {
            let (doc_part, _) = split_reference(&link.raw_reference);
            let message = if doc_part.is_empty() {
                "No target document id specified in link".to_string()
            } else {
                format!("Invalid document id '{doc_part}' in link")
            };
            link.add_error(message);
            return Ok(());
        }

        let Some(target_type) = link.target_doc_type else {
            link.add_error("Target document not found in CDR");
            return Ok(());
        };
        let Some(link_type) = link.link_type_id else {
            return Ok(());
        };

        if link.target_deleted {
            link.add_error("Target link is to deleted document");
        }

        if let Some(fragment) = link.target_fragment.clone() {
            let (exists, place) = match link.target_doc_id {
                Some(target) if !self_link => (self.store.fragment_exists(target, &fragment)?, "target"),
                _ => (fragments.contains(&fragment), "this"),
            };
            if !exists {
                link.add_error(format!(
                    "cdr:id matching fragment '{fragment}' not found in {place} document"
                ));
            }
        }

        let permitted = self.store.permitted_target_types(link_type)?;
        if permitted.is_empty() {
            link.add_error("System Error: This link type has no target document type defined");
        } else if !permitted.contains(&target_type) {
            let target_name = link
                .target_doc_type_name
                .clone()
                .unwrap_or_else(|| target_type.to_string());
            let message = format!(
                "Link from {}.{} to document type {target_name} is illegal",
                link.source_doc_type_name, link.source_field
            );
            link.add_error(message);
        }

        let ctx = RuleContext {
            store: self.store,
            cache: self.cache,
            subqueries: self.subqueries,
        };
        for property in self.store.link_properties(link_type)? {
            let rule = self.registry.get(&property.name)?;
            if let Some(message) = rule.check(&ctx, link, &property.value)? {
                link.add_error(message);
            }
        }

        if link.has_errors() {
            debug!(
                field = %link.source_field,
                reference = %link.raw_reference,
                errors = link.error_count(),
                "link failed validation"
            );
        }
        Ok(())
    }

    /// Finds stored links from other documents into fragments of `doc_id`
    /// that are absent from `fragments`.
    ///
    /// At most `max_fragment_miss_reports` referencing documents are listed
    /// per missing fragment; the rest are summarized in one message.
    pub fn check_missing_fragment_targets(
        &self,
        doc_id: Option<DocId>,
        fragments: &FragmentSet,
    ) -> LinkResult<MissingFragmentReport> {
        let mut report = MissingFragmentReport::default();
        let Some(doc_id) = doc_id else {
            return Ok(report);
        };

        let mut missing: BTreeMap<String, BTreeSet<DocId>> = BTreeMap::new();
        for link in self.store.fragment_links_to(doc_id)? {
            if link.source_doc == doc_id || fragments.contains(&link.fragment) {
                continue;
            }
            missing.entry(link.fragment).or_default().insert(link.source_doc);
        }

        let cap = self.config.max_fragment_miss_reports;
        for (fragment, sources) in missing {
            for source in sources.iter().take(cap) {
                report.errors.push(format!(
                    "Document {} expects cdr:id='{fragment}' but no such id found",
                    format_doc_id(*source)
                ));
            }
            if sources.len() > cap {
                report.errors.push(format!(
                    "{} documents link to missing cdr:id '{fragment}'. \
                     Stopped listing them after {cap} errors reported",
                    sources.len()
                ));
            }
            report.broken_sources.extend(sources);
        }

        if !report.errors.is_empty() {
            debug!(doc = doc_id, errors = report.error_count(), "fragments still referenced");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{LinkStyle, SourceDocument};
    use crate::error::LinkCheckError;
    use crate::memory::MemoryStore;
    use crate::traits::{DocumentStore, LinkNetRow};

    struct Fixture {
        store: MemoryStore,
        cache: RuleCache,
        registry: CustomRuleRegistry,
        subqueries: SubqueryGenerator,
        config: LinkCheckConfig,
        source: SourceDocument,
        term_ref: u32,
    }

    impl Fixture {
        fn new() -> Self {
            let store = MemoryStore::new();
            store.add_document(100, "Summary", "Lung cancer treatment");
            store.add_document(200, "Term", "Lung cancer");
            store.add_fragment(200, "_1");
            store.add_field(200, "/Term/Status", "Active");
            store.add_document(201, "Term", "Old term");
            store.set_active(201, false);
            store.add_field(201, "/Term/Status", "Active");
            store.add_document(300, "Citation", "Some paper");

            let term_ref = store.add_link_type("SummaryTermRef", &["Term"]);
            store.add_link_field("Summary", "TermRef", term_ref);
            let summary_type = store.doc_type_id("Summary").unwrap().unwrap();

            Self {
                store,
                cache: RuleCache::default(),
                registry: CustomRuleRegistry::default(),
                subqueries: SubqueryGenerator::default(),
                config: LinkCheckConfig::default(),
                source: SourceDocument::new(Some(100), summary_type, "Summary"),
                term_ref,
            }
        }

        fn validator(&self) -> LinkValidator<'_> {
            LinkValidator::new(&self.store, &self.cache, &self.registry, &self.subqueries, &self.config)
        }

        fn link(&self, field: &str, reference: &str) -> LinkDescriptor {
            let mut link = LinkDescriptor::new(&self.source, field, LinkStyle::InternalRef, reference);
            link.link_type_id = Some(self.term_ref);
            link
        }

        fn errors(&self, reference: &str, fragments: &FragmentSet) -> Vec<String> {
            let mut links = vec![self.link("TermRef", reference)];
            self.validator().validate(&mut links, fragments).unwrap();
            links.remove(0).errors
        }
    }

    #[test]
    fn test_valid_link() {
        let fx = Fixture::new();
        let mut links = vec![fx.link("TermRef", "CDR0000000200#_1")];
        let count = fx.validator().validate(&mut links, &FragmentSet::new()).unwrap();
        assert_eq!(count, 0);
        assert_eq!(links[0].target_doc_type_name.as_deref(), Some("Term"));
        assert!(links[0].is_persistable());
    }

    #[test]
    fn test_missing_target() {
        let fx = Fixture::new();
        assert_eq!(
            fx.errors("CDR999", &FragmentSet::new()),
            vec!["Target document not found in CDR"]
        );
    }

    #[test]
    fn test_invalid_reference() {
        let fx = Fixture::new();
        assert_eq!(
            fx.errors("Term200", &FragmentSet::new()),
            vec!["Invalid document id 'Term200' in link"]
        );
    }

    #[test]
    fn test_deleted_target() {
        let fx = Fixture::new();
        assert_eq!(
            fx.errors("CDR201", &FragmentSet::new()),
            vec!["Target link is to deleted document"]
        );
    }

    #[test]
    fn test_missing_fragment_in_target() {
        let fx = Fixture::new();
        assert_eq!(
            fx.errors("CDR200#_9", &FragmentSet::new()),
            vec!["cdr:id matching fragment '_9' not found in target document"]
        );
    }

    #[test]
    fn test_self_link_uses_local_fragments() {
        let fx = Fixture::new();
        let local: FragmentSet = ["_4".to_string()].into_iter().collect();
        let summary_ref = fx.store.add_link_type("SummaryRef", &["Summary"]);

        let mut links = vec![
            LinkDescriptor::new(&fx.source, "SummaryRef", LinkStyle::InternalRef, "#_4"),
            LinkDescriptor::new(&fx.source, "SummaryRef", LinkStyle::InternalRef, "#_5"),
        ];
        for link in &mut links {
            link.link_type_id = Some(summary_ref);
        }
        let count = fx.validator().validate(&mut links, &local).unwrap();
        assert_eq!(count, 1);
        assert!(links[0].errors.is_empty());
        assert_eq!(
            links[1].errors,
            vec!["cdr:id matching fragment '_5' not found in this document"]
        );
    }

    #[test]
    fn test_illegal_target_type() {
        let fx = Fixture::new();
        assert_eq!(
            fx.errors("CDR300", &FragmentSet::new()),
            vec!["Link from Summary.TermRef to document type Citation is illegal"]
        );
    }

    #[test]
    fn test_link_type_without_targets() {
        let fx = Fixture::new();
        let orphan = fx.store.add_link_type("Orphan", &[]);
        let mut links = vec![fx.link("TermRef", "CDR200")];
        links[0].link_type_id = Some(orphan);
        fx.validator().validate(&mut links, &FragmentSet::new()).unwrap();
        assert_eq!(
            links[0].errors,
            vec!["System Error: This link type has no target document type defined"]
        );
    }

    #[test]
    fn test_link_target_contains() {
        let fx = Fixture::new();
        fx.store
            .add_link_property(fx.term_ref, "LinkTargetContains", r#"/Term/Status == "Active""#);
        assert!(fx.errors("CDR200", &FragmentSet::new()).is_empty());

        fx.store.add_document(202, "Term", "Draft term");
        assert_eq!(
            fx.errors("CDR202", &FragmentSet::new()),
            vec![r#"Failed link target rule: /Term/Status == "Active""#]
        );
    }

    #[test]
    fn test_malformed_rule_is_link_error() {
        let fx = Fixture::new();
        fx.store.add_link_property(fx.term_ref, "LinkTargetContains", "/Term/Status ==");
        let errors = fx.errors("CDR200", &FragmentSet::new());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("malformed"));
    }

    #[test]
    fn test_unknown_custom_rule_aborts() {
        let fx = Fixture::new();
        fx.store.add_link_property(fx.term_ref, "LinkTargetIsShiny", "yes");
        let mut links = vec![fx.link("TermRef", "CDR200")];
        let err = fx.validator().validate(&mut links, &FragmentSet::new()).unwrap_err();
        assert!(matches!(err, LinkCheckError::UnknownCustomRule(name) if name == "LinkTargetIsShiny"));
    }

    #[test]
    fn test_duplicates_are_not_rechecked() {
        let fx = Fixture::new();
        let mut links = vec![fx.link("TermRef", "CDR999"), fx.link("TermRef", "CDR999")];
        links[1].keep = false;
        let count = fx.validator().validate(&mut links, &FragmentSet::new()).unwrap();
        assert_eq!(count, 1);
        assert!(links[1].errors.is_empty());
    }

    fn seed_fragment_link(store: &MemoryStore, source: DocId, fragment: &str) {
        store.add_link(LinkNetRow {
            link_type: 1,
            source_doc: source,
            source_field: "TermRef".into(),
            target_doc: 200,
            target_fragment: Some(fragment.to_string()),
            raw_reference: format!("CDR200#{fragment}"),
        });
    }

    #[test]
    fn test_missing_fragment_targets_capped() {
        let fx = Fixture::new();
        for source in 1..=7 {
            seed_fragment_link(&fx.store, source, "_gone");
        }
        seed_fragment_link(&fx.store, 8, "_kept");
        seed_fragment_link(&fx.store, 9, "_lost");
        seed_fragment_link(&fx.store, 200, "_self");

        let fragments: FragmentSet = ["_kept".to_string()].into_iter().collect();
        let report = fx
            .validator()
            .check_missing_fragment_targets(Some(200), &fragments)
            .unwrap();

        // 5 listed + 1 summary for `_gone`, 1 for `_lost`.
        assert_eq!(report.error_count(), 7);
        assert_eq!(
            report.errors[0],
            "Document CDR0000000001 expects cdr:id='_gone' but no such id found"
        );
        assert_eq!(
            report.errors[5],
            "7 documents link to missing cdr:id '_gone'. Stopped listing them after 5 errors reported"
        );
        assert_eq!(
            report.errors[6],
            "Document CDR0000000009 expects cdr:id='_lost' but no such id found"
        );
        assert_eq!(report.broken_sources.len(), 8);
        assert!(!report.broken_sources.contains(&200));
    }

    #[test]
    fn test_missing_fragment_targets_unsaved_document() {
        let fx = Fixture::new();
        let report = fx
            .validator()
            .check_missing_fragment_targets(None, &FragmentSet::new())
            .unwrap();
        assert_eq!(report, MissingFragmentReport::default());
    }
}
