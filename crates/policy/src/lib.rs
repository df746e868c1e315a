//! Declarative trust policies
//!
//! A policy is an ordered rule list plus a default action. Each rule pairs
//! a [`TrustRequirement`] (optional predicates over an evaluation context)
//! with the action taken when the requirement fails. Evaluation walks the
//! rules by descending priority; the first failing rule decides. If every
//! rule passes the decision is ALLOW, and a policy with no rules returns
//! its default. Evaluation is pure: no clock reads, no I/O.

use serde::{Deserialize, Serialize};

/// What to do when a rule fails (or as a policy default).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    Allow,
    Deny,
    RequireReview,
    RateLimit,
}

/// A single trust condition. Every predicate is optional; an empty
/// requirement always passes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrustRequirement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_trust_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_endorsements: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_chain_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_scopes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_issuer_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_seconds: Option<u64>,
}

impl TrustRequirement {
    /// Whether the context satisfies every present predicate.
    pub fn evaluate(&self, context: &EvaluationContext) -> bool {
        if let Some(min) = self.min_trust_score {
            if context.trust_score < min {
                return false;
            }
        }
        if let Some(min) = self.min_endorsements {
            if context.endorsement_count < min {
                return false;
            }
        }
        if let Some(max) = self.max_chain_length {
            if context.chain_length > max {
                return false;
            }
        }
        if let Some(required) = &self.required_scopes {
            if !required.iter().all(|s| context.scopes.contains(s)) {
                return false;
            }
        }
        if let Some(required) = &self.required_issuer_ids {
            if !required.iter().any(|i| context.issuer_ids.contains(i)) {
                return false;
            }
        }
        if let Some(max) = self.max_age_seconds {
            if context.chain_age_seconds > max {
                return false;
            }
        }
        true
    }
}

/// Data available to policy evaluation, assembled by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationContext {
    pub agent_id: String,
    #[serde(default)]
    pub trust_score: f64,
    #[serde(default)]
    pub endorsement_count: usize,
    #[serde(default)]
    pub chain_length: usize,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub issuer_ids: Vec<String>,
    #[serde(default)]
    pub chain_age_seconds: u64,
}

/// A named rule with a requirement and failure action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    pub name: String,
    pub requirement: TrustRequirement,
    #[serde(default = "default_deny")]
    pub on_fail: PolicyAction,
    #[serde(default)]
    pub description: String,
    /// Higher priority rules are evaluated first.
    #[serde(default)]
    pub priority: i32,
}

fn default_deny() -> PolicyAction {
    PolicyAction::Deny
}

/// Result of evaluating a policy against one context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub action: PolicyAction,
    pub rule_name: String,
    pub matched: bool,
    pub reason: String,
    pub agent_id: String,
}

impl PolicyDecision {
    pub fn allowed(&self) -> bool {
        self.action == PolicyAction::Allow
    }
}

/// An ordered rule list with a default action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustPolicy {
    pub name: String,
    pub default_action: PolicyAction,
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

impl TrustPolicy {
    pub fn new(name: &str, default_action: PolicyAction) -> Self {
        Self {
            name: name.to_string(),
            default_action,
            rules: Vec::new(),
        }
    }

    /// Add a rule, keeping the list sorted by descending priority.
    pub fn add_rule(mut self, rule: PolicyRule) -> Self {
        self.rules.push(rule);
        self.rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        self
    }

    /// Evaluate the rules against a context. First failing rule wins.
    pub fn evaluate(&self, context: &EvaluationContext) -> PolicyDecision {
        for rule in &self.rules {
            if !rule.requirement.evaluate(context) {
                let reason = if rule.description.is_empty() {
                    format!("Failed requirement: {}", rule.name)
                } else {
                    format!("Failed requirement: {} ({})", rule.name, rule.description)
                };
                return PolicyDecision {
                    action: rule.on_fail,
                    rule_name: rule.name.clone(),
                    matched: false,
                    reason,
                    agent_id: context.agent_id.clone(),
                };
            }
        }

        if !self.rules.is_empty() {
            return PolicyDecision {
                action: PolicyAction::Allow,
                rule_name: "all_passed".to_string(),
                matched: true,
                reason: "All policy rules satisfied".to_string(),
                agent_id: context.agent_id.clone(),
            };
        }

        PolicyDecision {
            action: self.default_action,
            rule_name: "default".to_string(),
            matched: false,
            reason: "No rules defined, using default action".to_string(),
            agent_id: context.agent_id.clone(),
        }
    }

    /// Evaluate against many contexts at once.
    pub fn evaluate_batch(&self, contexts: &[EvaluationContext]) -> Vec<PolicyDecision> {
        contexts.iter().map(|ctx| self.evaluate(ctx)).collect()
    }
}

/// High-trust policy for financial transactions.
pub fn strict_commerce_policy() -> TrustPolicy {
    TrustPolicy::new("strict-commerce", PolicyAction::Deny)
        .add_rule(PolicyRule {
            name: "high-trust-score".into(),
            requirement: TrustRequirement {
                min_trust_score: Some(0.8),
                ..Default::default()
            },
            on_fail: PolicyAction::Deny,
            description: "Commerce requires high trust score".into(),
            priority: 10,
        })
        .add_rule(PolicyRule {
            name: "endorsed".into(),
            requirement: TrustRequirement {
                min_endorsements: Some(3),
                ..Default::default()
            },
            on_fail: PolicyAction::Deny,
            description: "Must have at least 3 endorsements".into(),
            priority: 5,
        })
        .add_rule(PolicyRule {
            name: "short-chain".into(),
            requirement: TrustRequirement {
                max_chain_length: Some(5),
                ..Default::default()
            },
            on_fail: PolicyAction::Deny,
            description: "Attestation chain must be reasonably short".into(),
            priority: 3,
        })
        .add_rule(PolicyRule {
            name: "fresh-attestation".into(),
            requirement: TrustRequirement {
                max_age_seconds: Some(86_400),
                ..Default::default()
            },
            on_fail: PolicyAction::Deny,
            description: "Attestations must be less than 24h old".into(),
            priority: 2,
        })
}

/// Permissive policy for discovery and browsing.
pub fn open_discovery_policy() -> TrustPolicy {
    TrustPolicy::new("open-discovery", PolicyAction::Allow).add_rule(PolicyRule {
        name: "minimal-trust".into(),
        requirement: TrustRequirement {
            min_trust_score: Some(0.3),
            ..Default::default()
        },
        on_fail: PolicyAction::RateLimit,
        description: "Basic trust threshold for discovery".into(),
        priority: 1,
    })
}

/// Policy requiring specific delegation scopes.
pub fn scoped_delegation_policy(required_scopes: Vec<String>) -> TrustPolicy {
    let description = format!("Requires scopes: {}", required_scopes.join(", "));
    TrustPolicy::new("scoped-delegation", PolicyAction::Deny)
        .add_rule(PolicyRule {
            name: "scope-check".into(),
            requirement: TrustRequirement {
                required_scopes: Some(required_scopes),
                ..Default::default()
            },
            on_fail: PolicyAction::Deny,
            description,
            priority: 10,
        })
        .add_rule(PolicyRule {
            name: "basic-trust".into(),
            requirement: TrustRequirement {
                min_trust_score: Some(0.5),
                ..Default::default()
            },
            on_fail: PolicyAction::Deny,
            description: "Minimum trust for scoped operations".into(),
            priority: 5,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(trust: f64, endorsements: usize) -> EvaluationContext {
        EvaluationContext {
            agent_id: "agent:test".into(),
            trust_score: trust,
            endorsement_count: endorsements,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_requirement_passes() {
        let requirement = TrustRequirement::default();
        assert!(requirement.evaluate(&context(0.0, 0)));
    }

    #[test]
    fn test_first_failing_rule_wins() {
        let policy = TrustPolicy::new("test", PolicyAction::Deny)
            .add_rule(PolicyRule {
                name: "low-priority-review".into(),
                requirement: TrustRequirement {
                    min_endorsements: Some(100),
                    ..Default::default()
                },
                on_fail: PolicyAction::RequireReview,
                description: String::new(),
                priority: 1,
            })
            .add_rule(PolicyRule {
                name: "high-priority-deny".into(),
                requirement: TrustRequirement {
                    min_trust_score: Some(0.9),
                    ..Default::default()
                },
                on_fail: PolicyAction::Deny,
                description: String::new(),
                priority: 10,
            });

        // Both rules fail; the higher-priority one decides.
        let decision = policy.evaluate(&context(0.1, 0));
        assert_eq!(decision.action, PolicyAction::Deny);
        assert_eq!(decision.rule_name, "high-priority-deny");
    }

    #[test]
    fn test_all_pass_allows() {
        let policy = TrustPolicy::new("test", PolicyAction::Deny).add_rule(PolicyRule {
            name: "min-trust".into(),
            requirement: TrustRequirement {
                min_trust_score: Some(0.5),
                ..Default::default()
            },
            on_fail: PolicyAction::Deny,
            description: String::new(),
            priority: 0,
        });

        let decision = policy.evaluate(&context(0.8, 0));
        assert!(decision.allowed());
        assert!(decision.matched);
        assert_eq!(decision.rule_name, "all_passed");
    }

    #[test]
    fn test_no_rules_returns_default() {
        let allow = TrustPolicy::new("open", PolicyAction::Allow);
        assert!(allow.evaluate(&context(0.0, 0)).allowed());

        let deny = TrustPolicy::new("closed", PolicyAction::Deny);
        assert_eq!(deny.evaluate(&context(1.0, 9)).action, PolicyAction::Deny);
    }

    #[test]
    fn test_scope_requirement_needs_all() {
        let requirement = TrustRequirement {
            required_scopes: Some(vec!["trade".into(), "review".into()]),
            ..Default::default()
        };

        let mut ctx = context(1.0, 5);
        ctx.scopes = vec!["trade".into()];
        assert!(!requirement.evaluate(&ctx));

        ctx.scopes = vec!["trade".into(), "review".into(), "extra".into()];
        assert!(requirement.evaluate(&ctx));
    }

    #[test]
    fn test_issuer_requirement_needs_any() {
        let requirement = TrustRequirement {
            required_issuer_ids: Some(vec!["agent:a".into(), "agent:b".into()]),
            ..Default::default()
        };

        let mut ctx = context(1.0, 5);
        ctx.issuer_ids = vec!["agent:b".into()];
        assert!(requirement.evaluate(&ctx));

        ctx.issuer_ids = vec!["agent:c".into()];
        assert!(!requirement.evaluate(&ctx));
    }

    #[test]
    fn test_age_requirement() {
        let requirement = TrustRequirement {
            max_age_seconds: Some(3600),
            ..Default::default()
        };

        let mut ctx = context(1.0, 5);
        ctx.chain_age_seconds = 100;
        assert!(requirement.evaluate(&ctx));
        ctx.chain_age_seconds = 7200;
        assert!(!requirement.evaluate(&ctx));
    }

    #[test]
    fn test_strict_commerce_preset() {
        let policy = strict_commerce_policy();

        let mut good = context(0.9, 5);
        good.chain_length = 2;
        good.chain_age_seconds = 60;
        assert!(policy.evaluate(&good).allowed());

        let weak = context(0.5, 5);
        let decision = policy.evaluate(&weak);
        assert_eq!(decision.action, PolicyAction::Deny);
        assert_eq!(decision.rule_name, "high-trust-score");
    }

    #[test]
    fn test_open_discovery_rate_limits() {
        let policy = open_discovery_policy();
        let decision = policy.evaluate(&context(0.1, 0));
        assert_eq!(decision.action, PolicyAction::RateLimit);
    }

    #[test]
    fn test_batch_evaluation() {
        let policy = open_discovery_policy();
        let decisions = policy.evaluate_batch(&[context(0.9, 0), context(0.1, 0)]);
        assert_eq!(decisions.len(), 2);
        assert!(decisions[0].allowed());
        assert!(!decisions[1].allowed());
    }

    #[test]
    fn test_policy_serde_roundtrip() {
        let policy = strict_commerce_policy();
        let json = serde_json::to_string(&policy).unwrap();
        let back: TrustPolicy = serde_json::from_str(&json).unwrap();

        assert_eq!(back.name, policy.name);
        assert_eq!(back.rules.len(), policy.rules.len());
        assert_eq!(back.rules[0].name, "high-trust-score");
    }
}
