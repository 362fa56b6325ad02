use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;

use crate::{
    error::ValidationError,
    rule::{NewRule, Rule, RuleDraft, RuleId},
};

/// Direction of a [`RuleStore::move_rule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Towards priority 1.
    Up,
    Down,
}

/// Ordered set of firewall rules.
///
/// Rules are kept in a dense vector sorted by priority. After every mutation the
/// priorities are exactly `1..=N` in vector order; a violation is a bug and panics.
#[derive(Debug, Default)]
pub struct RuleStore {
    rules: Vec<Rule>,
    last_id: u64,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the draft and appends it with the lowest precedence.
    pub fn add(&mut self, draft: &RuleDraft) -> Result<Rule, ValidationError> {
        let rule = draft.validate()?;
        Ok(self.insert(rule))
    }

    /// Appends an already validated rule with the lowest precedence.
    pub fn insert(&mut self, rule: NewRule) -> Rule {
        self.last_id += 1;

        let rule = Rule {
            id: RuleId(self.last_id),
            priority: self.next_priority(),
            definition: rule,
        };
        self.rules.push(rule);
        self.check_invariants();

        debug!("rule {} added at priority {}: {}", rule.id, rule.priority, rule);
        rule
    }

    /// Deletes the rule, does nothing if `id` is unknown.
    pub fn remove(&mut self, id: RuleId) -> Option<Rule> {
        let index = self.position(id)?;
        let rule = self.rules.remove(index);
        self.renumber();

        debug!("rule {} removed: {}", rule.id, rule);
        Some(rule)
    }

    /// Swaps the rule with its neighbour. Returns `false` if nothing moved,
    /// either because the rule is unknown or already at the boundary.
    pub fn move_rule(&mut self, id: RuleId, direction: Direction) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };

        let other = match direction {
            Direction::Up => index.checked_sub(1),
            Direction::Down => Some(index + 1).filter(|other| *other < self.rules.len()),
        };
        let Some(other) = other else {
            return false;
        };

        self.rules.swap(index, other);
        self.renumber();

        debug!("rule {} moved {:?} to priority {}", id, direction, other + 1);
        true
    }

    /// Rules in ascending priority order.
    #[inline]
    pub fn list(&self) -> &[Rule] {
        &self.rules
    }

    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.position(id).map(|index| &self.rules[index])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn position(&self, id: RuleId) -> Option<usize> {
        self.rules.iter().position(|rule| rule.id == id)
    }

    fn next_priority(&self) -> u32 {
        priority_at(self.rules.len())
    }

    fn renumber(&mut self) {
        for (index, rule) in self.rules.iter_mut().enumerate() {
            rule.priority = priority_at(index);
        }
        self.check_invariants();
    }

    fn check_invariants(&self) {
        for (index, rule) in self.rules.iter().enumerate() {
            assert_eq!(
                priority_at(index),
                rule.priority,
                "rule {} out of sequence",
                rule.id
            );
        }
    }
}

#[inline]
fn priority_at(index: usize) -> u32 {
    u32::try_from(index + 1).expect("rule count exceeds u32")
}

/// A [`RuleStore`] shared between threads.
///
/// Mutations are serialized behind a single writer lock. Readers take a
/// [`snapshot`](SharedRuleStore::snapshot) and evaluate against it without
/// holding the lock, so they never see a half renumbered sequence.
#[derive(Debug, Default)]
pub struct SharedRuleStore(RwLock<RuleStore>);

impl SharedRuleStore {
    pub fn new(store: RuleStore) -> Self {
        Self(RwLock::new(store))
    }

    pub fn add(&self, draft: &RuleDraft) -> Result<Rule, ValidationError> {
        self.write().add(draft)
    }

    pub fn insert(&self, rule: NewRule) -> Rule {
        self.write().insert(rule)
    }

    pub fn remove(&self, id: RuleId) -> Option<Rule> {
        self.write().remove(id)
    }

    pub fn move_rule(&self, id: RuleId, direction: Direction) -> bool {
        self.write().move_rule(id, direction)
    }

    /// An immutable copy of the rules in ascending priority order.
    pub fn snapshot(&self) -> Arc<[Rule]> {
        Arc::from(self.read().list())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, RuleStore> {
        match self.0.read() {
            Ok(guard) => guard,
            Err(e) => panic!("poisoned lock {}", e),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, RuleStore> {
        match self.0.write() {
            Ok(guard) => guard,
            Err(e) => panic!("poisoned lock {}", e),
        }
    }
}

impl From<RuleStore> for SharedRuleStore {
    fn from(store: RuleStore) -> Self {
        Self::new(store)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{Action, ProtocolMatcher};

    fn rule(line: &str) -> NewRule {
        line.parse().unwrap()
    }

    fn priorities(store: &RuleStore) -> Vec<u32> {
        store.list().iter().map(Rule::priority).collect()
    }

    fn ids(store: &RuleStore) -> Vec<RuleId> {
        store.list().iter().map(Rule::id).collect()
    }

    fn assert_dense(store: &RuleStore) {
        let expected: Vec<u32> = (1..=store.len() as u32).collect();
        assert_eq!(expected, priorities(store));
    }

    #[test]
    fn add_assigns_increasing_priority() {
        let mut store = RuleStore::new();
        assert!(store.is_empty());

        let first = store.insert(rule("allow tcp from 192.168.1.0/24 to any port 80"));
        let second = store
            .add(&RuleDraft {
                action: Action::Deny,
                source: "any".into(),
                destination: "10.0.0.1".into(),
                port: "22".into(),
                protocol: ProtocolMatcher::Any,
            })
            .unwrap();

        assert_eq!(1, first.priority());
        assert_eq!(2, second.priority());
        assert_ne!(first.id(), second.id());
        assert_eq!(Some(&second), store.get(second.id()));
    }

    #[test]
    fn add_rejects_invalid_draft() {
        let mut store = RuleStore::new();
        let draft = RuleDraft {
            source: "10.0.0.0/64".into(),
            destination: "any".into(),
            port: "any".into(),
            ..RuleDraft::default()
        };

        assert!(matches!(
            store.add(&draft),
            Err(ValidationError::PrefixLength { prefix: 64, max: 32 })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn remove_renumbers() {
        let mut store = RuleStore::new();
        let a = store.insert(rule("allow from any to any"));
        let b = store.insert(rule("deny from any to any"));
        let c = store.insert(rule("allow tcp from any to any"));

        assert_eq!(Some(b), store.remove(b.id()));
        assert_eq!(vec![a.id(), c.id()], ids(&store));
        assert_dense(&store);

        assert_eq!(None, store.remove(b.id()));
        assert_eq!(2, store.len());
    }

    #[test]
    fn ids_are_never_reused() {
        let mut store = RuleStore::new();
        let a = store.insert(rule("allow from any to any"));
        store.remove(a.id());
        let b = store.insert(rule("allow from any to any"));

        assert_ne!(a.id(), b.id());
        assert_eq!(1, b.priority());
    }

    #[test]
    fn move_swaps_neighbours() {
        let mut store = RuleStore::new();
        let a = store.insert(rule("allow from any to any"));
        let b = store.insert(rule("deny from any to any"));
        let c = store.insert(rule("allow tcp from any to any"));

        assert!(store.move_rule(c.id(), Direction::Up));
        assert_eq!(vec![a.id(), c.id(), b.id()], ids(&store));
        assert_dense(&store);

        assert!(store.move_rule(a.id(), Direction::Down));
        assert_eq!(vec![c.id(), a.id(), b.id()], ids(&store));
        assert_dense(&store);
        assert_eq!(Some(1), store.get(c.id()).map(Rule::priority));
    }

    #[test]
    fn move_is_noop_at_boundaries() {
        let mut store = RuleStore::new();
        let a = store.insert(rule("allow from any to any"));
        let b = store.insert(rule("deny from any to any"));

        assert!(!store.move_rule(a.id(), Direction::Up));
        assert!(!store.move_rule(b.id(), Direction::Down));
        assert!(!store.move_rule(RuleId(42), Direction::Up));
        assert_eq!(vec![a.id(), b.id()], ids(&store));
    }

    #[test]
    fn priorities_stay_dense_under_mixed_operations() {
        let mut store = RuleStore::new();
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;

        for _ in 0..500 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;

            let pick = store
                .list()
                .get((state >> 8) as usize % store.len().max(1))
                .map(Rule::id);

            match (state % 4, pick) {
                (0, _) | (_, None) => {
                    store.insert(rule("deny udp from 10.0.0.0/8 to any port 53"));
                }
                (1, Some(id)) => {
                    store.remove(id);
                }
                (2, Some(id)) => {
                    store.move_rule(id, Direction::Up);
                }
                (_, Some(id)) => {
                    store.move_rule(id, Direction::Down);
                }
            }

            assert_dense(&store);
        }
    }

    #[test]
    fn shared_snapshot_is_detached() {
        let shared = SharedRuleStore::default();
        let a = shared.insert(rule("allow from any to any"));
        let snapshot = shared.snapshot();

        let b = shared.insert(rule("deny from any to any"));
        assert!(shared.move_rule(b.id(), Direction::Up));

        assert_eq!(1, snapshot.len());
        assert_eq!(a, snapshot[0]);
        assert_eq!(
            vec![b.id(), a.id()],
            shared.snapshot().iter().map(Rule::id).collect::<Vec<_>>()
        );
    }

    #[test]
    fn shared_store_concurrent_writers() {
        let shared = SharedRuleStore::default();

        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..50 {
                        let rule = shared.insert(rule("allow tcp from any to any port 443"));
                        shared.move_rule(rule.id(), Direction::Up);
                        let snapshot = shared.snapshot();
                        for (index, rule) in snapshot.iter().enumerate() {
                            assert_eq!(index as u32 + 1, rule.priority());
                        }
                    }
                });
            }
        });

        assert_eq!(200, shared.len());
    }
}
