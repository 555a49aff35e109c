//! Custom link checks named by link type properties.
//!
//! A link type property `(name, value)` asks for the custom check `name` to
//! be run with argument `value` on every link of that type. Checks are looked
//! up in a [`CustomRuleRegistry`]; the built-in [`LinkTargetContains`] treats
//! its argument as a rule the target document must satisfy.

use std::collections::HashMap;

use tracing::debug;

use crate::cache::RuleCache;
use crate::descriptor::LinkDescriptor;
use crate::error::{LinkCheckError, LinkResult};
use crate::evaluator::RuleEvaluator;
use crate::subquery::SubqueryGenerator;
use crate::traits::LinkStore;

/// What a custom check may use.
pub struct RuleContext<'a> {
    /// Read access to the store.
    pub store: &'a dyn LinkStore,
    /// Shared compiled-rule cache.
    pub cache: &'a RuleCache,
    /// SQL generator for picklist predicates.
    pub subqueries: &'a SubqueryGenerator,
}

/// A named per-link-type check.
pub trait CustomRule: Send + Sync {
    /// Property name that selects this check.
    fn name(&self) -> &str;

    /// Checks one link. Returns a failure message, or `None` if the link passes.
    fn check(
        &self,
        ctx: &RuleContext<'_>,
        link: &LinkDescriptor,
        argument: &str,
    ) -> LinkResult<Option<String>>;

    /// SQL predicate restricting picklist candidates in `id_column`, if this
    /// check can be expressed as one.
    fn picklist_predicate(
        &self,
        ctx: &RuleContext<'_>,
        argument: &str,
        id_column: &str,
    ) -> LinkResult<Option<String>> {
        let _ = (ctx, argument, id_column);
        Ok(None)
    }
}

/// Requires the link target to satisfy a rule, e.g.
/// `/Term/TermStatus != "Retired"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkTargetContains;

impl LinkTargetContains {
    /// Property name of this check.
    pub const NAME: &'static str = "LinkTargetContains";
}

impl CustomRule for LinkTargetContains {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn check(
        &self,
        ctx: &RuleContext<'_>,
        link: &LinkDescriptor,
        argument: &str,
    ) -> LinkResult<Option<String>> {
        let Some(target) = link.target_doc_id else {
            return Ok(None);
        };
        let tree = match ctx.cache.get_or_compile(argument) {
            Ok(tree) => tree,
            Err(LinkCheckError::Syntax(err)) => {
                return Ok(Some(format!(
                    "Link target rule '{argument}' of this link type is malformed: {}",
                    err.kind
                )));
            }
            Err(err) => return Err(err),
        };

        if RuleEvaluator::new(ctx.store).eval_rule(&tree, target)? {
            Ok(None)
        } else {
            debug!(target, rule = argument, "link target rule failed");
            Ok(Some(format!("Failed link target rule: {argument}")))
        }
    }

    fn picklist_predicate(
        &self,
        ctx: &RuleContext<'_>,
        argument: &str,
        id_column: &str,
    ) -> LinkResult<Option<String>> {
        let tree = ctx.cache.get_or_compile(argument)?;
        Ok(Some(ctx.subqueries.to_sql_predicate(&tree, id_column)))
    }
}

/// Custom checks by property name.
pub struct CustomRuleRegistry {
    rules: HashMap<String, Box<dyn CustomRule>>,
}

impl CustomRuleRegistry {
    /// Creates a registry with no checks.
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// Adds a check, replacing any check with the same name.
    pub fn register(&mut self, rule: impl CustomRule + 'static) {
        self.rules.insert(rule.name().to_string(), Box::new(rule));
    }

    /// Looks up a check by property name.
    pub fn get(&self, name: &str) -> LinkResult<&dyn CustomRule> {
        self.rules
            .get(name)
            .map(|rule| rule.as_ref())
            .ok_or_else(|| LinkCheckError::UnknownCustomRule(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.rules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for CustomRuleRegistry {
    /// Registry holding the built-in checks.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(LinkTargetContains);
        registry
    }
}

impl std::fmt::Debug for CustomRuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomRuleRegistry")
            .field("rules", &self.names())
            .finish()
    }
}
