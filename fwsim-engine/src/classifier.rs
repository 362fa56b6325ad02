use std::fmt;

use log::trace;

use crate::{
    error::InvalidPacket,
    packet,
    rule::{Action, Rule, RuleId},
    Classifiable,
};

/// Outcome for a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Allowed,
    Blocked,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Decision::Allowed => "allowed",
            Decision::Blocked => "blocked",
        })
    }
}

/// The rule that decided a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleMatch {
    pub id: RuleId,
    pub priority: u32,
}

/// Verdict of one evaluation. `matched` is `None` when the default policy applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Verdict {
    pub decision: Decision,
    pub matched: Option<RuleMatch>,
}

impl Verdict {
    #[inline]
    pub fn is_allowed(&self) -> bool {
        self.decision == Decision::Allowed
    }

    #[inline]
    pub fn rule_id(&self) -> Option<RuleId> {
        self.matched.map(|m| m.id)
    }

    #[inline]
    pub fn is_default_policy(&self) -> bool {
        self.matched.is_none()
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.matched {
            Some(m) => write!(f, "{} by rule {} (priority {})", self.decision, m.id, m.priority),
            None => write!(f, "{} by default policy", self.decision),
        }
    }
}

/// Evaluates packets against ordered rules, falling back to a default policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Classifier {
    default_policy: Action,
}

impl Classifier {
    pub fn new(default_policy: Action) -> Self {
        Self { default_policy }
    }

    #[inline]
    pub fn default_policy(&self) -> Action {
        self.default_policy
    }

    pub fn evaluate<P: Classifiable + ?Sized>(
        &self,
        rules: &[Rule],
        packet: &P,
    ) -> Result<Verdict, InvalidPacket> {
        evaluate(rules, packet, self.default_policy)
    }
}

/// Returns the action of the first rule, in ascending priority, whose four
/// matchers accept `packet`, or `default_policy` if none does.
///
/// `rules` must be sorted by priority, as returned by [`RuleStore::list`](crate::RuleStore::list).
pub fn evaluate<P: Classifiable + ?Sized>(
    rules: &[Rule],
    packet: &P,
    default_policy: Action,
) -> Result<Verdict, InvalidPacket> {
    packet::validate(packet)?;

    debug_assert!(
        rules.windows(2).all(|w| w[0].priority() < w[1].priority()),
        "rules are not in priority order"
    );

    let verdict = match rules.iter().find(|rule| rule.matches(packet)) {
        Some(rule) => {
            trace!("rule {} matched: {}", rule.id(), rule);
            Verdict {
                decision: rule.action().decision(),
                matched: Some(RuleMatch {
                    id: rule.id(),
                    priority: rule.priority(),
                }),
            }
        }
        None => {
            trace!("no rule matched, default policy {}", default_policy);
            Verdict {
                decision: default_policy.decision(),
                matched: None,
            }
        }
    };

    Ok(verdict)
}
