//! # cdr-linkcheck
//!
//! Link extraction, validation and link-net maintenance for CDR documents.
//!
//! Every time a document is saved its links to other documents (and to
//! fragments within documents) are found, checked and recorded in the link
//! tables, so that later edits elsewhere can be checked against them.
//!
//! ## Key Features
//!
//! - **Link extraction** - `cdr:ref`, `cdr:href` and `cdr:xref` attributes plus `cdr:id` fragments
//! - **Target validation** - existence, deletion, fragments, permitted document types
//! - **Custom rules** - per-link-type checks such as `LinkTargetContains`
//! - **Shared rule cache** - compiled rules shared across threads with bounded lock waits
//! - **Picklists** - SQL generation for candidate-target queries
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use cdr_linkcheck::{LinkChecker, MemoryStore, RuleCache, ValidationPolicy, XmlNode};
//!
//! let store = MemoryStore::new();
//! store.add_document(100, "Summary", "Breast cancer screening");
//! store.add_document(200, "Term", "Breast cancer");
//! store.add_field(200, "/Term/TermStatus", "Reviewed");
//! let link_type = store.add_link_type("SummaryTermRef", &["Term"]);
//! store.add_link_field("Summary", "TermRef", link_type);
//! store.add_link_property(link_type, "LinkTargetContains", r#"/Term/TermStatus != "Retired""#);
//!
//! let checker = LinkChecker::new(&store, Arc::new(RuleCache::default()));
//! let source = checker.source_document(Some(100), "Summary")?;
//! let tree = XmlNode::parse(r#"<Summary><TermRef cdr:ref="CDR0000000200"/></Summary>"#)?;
//!
//! let report = checker.check_links(&tree, &source, ValidationPolicy::ValidateOnly)?;
//! assert!(report.is_valid());
//! # Ok::<(), cdr_linkcheck::LinkCheckError>(())
//! ```
//!
//! ## Validation Policies
//!
//! | Policy | Validates | Writes link tables |
//! |--------|-----------|--------------------|
//! | `ValidateOnly` | Yes | Never |
//! | `UpdateIfValid` | Yes | When no errors were found |
//! | `UpdateUnconditionally` | Yes | Always |
//! | `UpdateLinkTablesOnly` | No | Always |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       cdr-linkcheck                          │
//! │                                                              │
//! │  LinkChecker                                                 │
//! │  ├── walk document tree → LinkDescriptors (LinkExtractor)   │
//! │  ├── check targets and link types (LinkValidator)           │
//! │  ├── run custom rules (CustomRuleRegistry + RuleCache)      │
//! │  └── replace link-net rows (LinkNetUpdater)                 │
//! │                                                              │
//! │  Dependencies:                                               │
//! │  ├── cdr-linkrule - rule parser (AST)                       │
//! │  └── store traits - DocumentStore, FieldIndex, LinkCatalog, │
//! │                     LinkNetReader, LinkNetWriter            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod cache;
mod checker;
mod config;
mod custom;
mod descriptor;
mod dom;
mod error;
mod evaluator;
mod extractor;
mod memory;
mod result;
mod subquery;
mod traits;
mod updater;
mod validator;

// Public re-exports
pub use cache::{RuleCache, RuleCacheStats};
pub use checker::LinkChecker;
pub use config::{LinkCheckConfig, LinkCheckConfigBuilder, RuleCacheConfig};
pub use custom::{CustomRule, CustomRuleRegistry, LinkTargetContains, RuleContext};
pub use descriptor::{
    format_doc_id, parse_doc_id, split_reference, DocId, DocTypeId, FragmentSet, LinkDescriptor,
    LinkStyle, LinkTypeId, SourceDocument, DOC_ID_PREFIX,
};
pub use dom::{NodeKind, TreeNode, XmlNode};
pub use error::{LinkCheckError, LinkResult};
pub use evaluator::RuleEvaluator;
pub use extractor::{ExtractedLinks, LinkExtractor, FRAGMENT_ATTRIBUTE};
pub use memory::{MemoryStore, MemoryTransaction};
pub use result::{DeleteReport, LinkReport};
pub use subquery::{sql_literal, PicklistQuery, SubqueryGenerator};
pub use traits::{
    DocumentStore, FieldIndex, FragmentLink, InboundLink, LinkCatalog, LinkNetReader, LinkNetRow,
    LinkNetWriter, LinkProperty, LinkStore, TargetDocument,
};
pub use updater::{LinkNetUpdater, ValidationPolicy};
pub use validator::{LinkValidator, MissingFragmentReport};

// Re-export the rule language for convenience
pub use cdr_linkrule::{parse_rule, Connector, Relation, Relator, RuleNode, SyntaxError};
