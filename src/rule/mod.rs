// src/rule/mod.rs

//! Conditional rule table
//!
//! A formula's rules are `(predicate -> effect)` pairs evaluated in
//! declaration order in a single pass. Predicates are pure, so the same
//! options and platform always select the same rules.

mod effect;
mod predicate;

pub use effect::{flag_key, DependencyTag, Effect, EffectKey, InvokeStep, Phase};
pub use predicate::{CmpOp, EvalContext, EvalError, OptionRef, Predicate};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// One entry of a rule table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,

    /// Condition, `true` when omitted
    #[serde(default = "Predicate::always")]
    pub when: Predicate,

    pub effect: Effect,
}

impl Rule {
    pub fn new(id: impl Into<String>, when: Predicate, effect: Effect) -> Self {
        Self {
            id: id.into(),
            when,
            effect,
        }
    }

    /// Whether the rule applies in this context
    pub fn matches(&self, ctx: &EvalContext<'_>) -> Result<bool> {
        self.when
            .eval(ctx)
            .map_err(|e| Error::rule(&self.id, e.to_string()))
    }
}

/// Select the rules whose predicates hold, in declaration order
///
/// Fails on the first rule whose predicate cannot be evaluated; no partial
/// selection is returned.
pub fn evaluate<'a>(rules: &'a [Rule], ctx: &EvalContext<'_>) -> Result<Vec<&'a Rule>> {
    let mut selected = Vec::new();
    for rule in rules {
        if rule.matches(ctx)? {
            trace!("Rule {} matched", rule.id);
            selected.push(rule);
        } else {
            trace!("Rule {} skipped", rule.id);
        }
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::option::{OptionDecl, OptionSet, OptionTable};
    use crate::platform::PlatformDescriptor;

    fn flag(id: &str, when: &str, flag: &str) -> Rule {
        Rule::new(
            id,
            Predicate::parse(when).unwrap(),
            Effect::AddConfigureFlag {
                flag: flag.to_string(),
            },
        )
    }

    fn table() -> OptionTable {
        OptionTable {
            declare: vec![OptionDecl {
                name: "with-graphviz".to_string(),
                description: None,
                default: false,
                requires_multi_arch: false,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_evaluate_keeps_declaration_order() {
        let options = OptionSet::resolve(&["with-graphviz"], &table()).unwrap();
        let platform = PlatformDescriptor::from_override("lion is: x86_64").unwrap();
        let ctx = EvalContext {
            options: &options,
            platform: &platform,
            build_archs: platform.architectures(),
            compiler: platform.compiler(),
        };

        let rules = vec![
            flag("c", "true", "--c"),
            flag("a", "with(graphviz)", "--a"),
            flag("skip", "os < leopard", "--old"),
            flag("b", "arch(x86_64)", "--b"),
        ];
        let ids: Vec<&str> = evaluate(&rules, &ctx)
            .unwrap()
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_evaluate_reports_rule_id() {
        let options = OptionSet::resolve::<&str>(&[], &table()).unwrap();
        let platform = PlatformDescriptor::from_override("lion is: x86_64").unwrap();
        let ctx = EvalContext {
            options: &options,
            platform: &platform,
            build_archs: platform.architectures(),
            compiler: platform.compiler(),
        };

        let rules = vec![flag("ok", "true", "--ok"), flag("broken", "with(qt)", "--qt")];
        match evaluate(&rules, &ctx) {
            Err(Error::RuleEvaluation { rule, reason }) => {
                assert_eq!(rule, "broken");
                assert!(reason.contains("qt"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_rule_from_toml_defaults_to_always() {
        let rule: Rule = toml::from_str(
            r#"
id = "dep-makedepend"
effect = { kind = "add-dependency", name = "makedepend", tag = "build" }
"#,
        )
        .unwrap();
        assert_eq!(rule.when, Predicate::Const(true));
        assert_eq!(
            rule.effect,
            Effect::AddDependency {
                name: "makedepend".to_string(),
                constraint: None,
                tag: DependencyTag::Build,
            }
        );
    }
}
