//! Rule storage and the safe-deletion protocol.
//!
//! Three insertion-ordered collections (one per category) share a single
//! mutex; every critical section is a short scan plus a pointer fixup, so
//! the hot matching path never stalls behind an administrative caller for
//! long. Matched rules are handed out as [`MatchGuard`]s: the guard keeps
//! the record alive while the caller acts on it, and dropping the guard is
//! the release. Removal unlinks under the lock, then waits (bounded) for
//! outstanding guards to drain before reporting completion.

use std::ops::Deref;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::warn;
use parking_lot::Mutex;

use crate::error::Error;
use crate::rule::{Category, Rule};

/// How long `remove` waits for in-flight matches to release an unlinked
/// record before deferring the free to the last holder.
pub const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// A matched rule, held alive for as long as the guard lives.
///
/// The store's own reference is the baseline; each guard is one
/// outstanding hold. Dropping the guard releases it.
#[derive(Debug)]
pub struct MatchGuard {
    entry: Arc<Rule>,
}

impl Deref for MatchGuard {
    type Target = Rule;

    fn deref(&self) -> &Rule {
        &self.entry
    }
}

#[derive(Default)]
struct Lists {
    exec: Vec<Arc<Rule>>,
    dns: Vec<Arc<Rule>>,
    network: Vec<Arc<Rule>>,
}

impl Lists {
    fn list(&self, category: Category) -> &Vec<Arc<Rule>> {
        match category {
            Category::Exec => &self.exec,
            Category::Dns => &self.dns,
            Category::Network => &self.network,
        }
    }

    fn list_mut(&mut self, category: Category) -> &mut Vec<Arc<Rule>> {
        match category {
            Category::Exec => &mut self.exec,
            Category::Dns => &mut self.dns,
            Category::Network => &mut self.network,
        }
    }

    fn all(&self) -> impl Iterator<Item = &Arc<Rule>> {
        self.exec.iter().chain(self.dns.iter()).chain(self.network.iter())
    }

    fn total(&self) -> usize {
        self.exec.len() + self.dns.len() + self.network.len()
    }

    /// Unlink and return the entry with this id, if present anywhere.
    fn take(&mut self, id: u32) -> Option<Arc<Rule>> {
        for list in [&mut self.exec, &mut self.dns, &mut self.network] {
            if let Some(pos) = list.iter().position(|r| r.id == id) {
                return Some(list.remove(pos));
            }
        }
        None
    }
}

/// The rule store: per-category collections, id assignment, matching.
pub struct RuleStore {
    lists: Mutex<Lists>,
    next_id: AtomicU32,
    /// Soft cap on the total rule count; 0 means unlimited.
    capacity: AtomicU32,
}

impl RuleStore {
    pub fn new(capacity: u32) -> Self {
        Self {
            lists: Mutex::new(Lists::default()),
            next_id: AtomicU32::new(0),
            capacity: AtomicU32::new(capacity),
        }
    }

    /// Insert a rule, assigning an id when `rule.id == 0`.
    ///
    /// Explicit ids must be unique across all categories; collisions are
    /// rejected with [`Error::Exists`]. An accepted explicit id advances
    /// the auto-assign counter past itself, so ids are never reused within
    /// a process lifetime.
    pub fn add(&self, rule: Rule) -> Result<u32, Error> {
        rule.validate().map_err(Error::Invalid)?;
        let mut lists = self.lists.lock();
        self.check_capacity(&lists, 1)?;
        let rule = self.assign_id(&lists, rule)?;
        let id = rule.id;
        lists.list_mut(rule.category).push(Arc::new(rule));
        Ok(id)
    }

    /// Insert a whole batch, or nothing: every rule is validated and the
    /// capacity checked before the first insert, all under one lock hold.
    pub fn add_batch(&self, rules: Vec<Rule>) -> Result<usize, Error> {
        for rule in &rules {
            rule.validate().map_err(Error::Invalid)?;
        }
        let mut lists = self.lists.lock();
        self.check_capacity(&lists, rules.len())?;
        let mut explicit: Vec<u32> = Vec::new();
        for rule in &rules {
            if rule.id != 0 {
                if lists.all().any(|r| r.id == rule.id) || explicit.contains(&rule.id) {
                    return Err(Error::Exists(rule.id));
                }
                explicit.push(rule.id);
            }
        }
        let count = rules.len();
        for mut rule in rules {
            if rule.id == 0 {
                rule.id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
            } else {
                self.next_id.fetch_max(rule.id, Ordering::Relaxed);
            }
            lists.list_mut(rule.category).push(Arc::new(rule));
        }
        Ok(count)
    }

    fn check_capacity(&self, lists: &Lists, adding: usize) -> Result<(), Error> {
        let cap = self.capacity.load(Ordering::Relaxed);
        if cap != 0 && lists.total() + adding > cap as usize {
            return Err(Error::Capacity(cap));
        }
        Ok(())
    }

    fn assign_id(&self, lists: &Lists, mut rule: Rule) -> Result<Rule, Error> {
        if rule.id == 0 {
            rule.id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        } else {
            if lists.all().any(|r| r.id == rule.id) {
                return Err(Error::Exists(rule.id));
            }
            self.next_id.fetch_max(rule.id, Ordering::Relaxed);
        }
        Ok(rule)
    }

    /// Unlink the rule with this id and wait for in-flight matches to
    /// release it.
    ///
    /// The unlink happens under the lock, so no new match can find the
    /// record afterwards; the reference drain happens outside the lock and
    /// is bounded by [`DRAIN_TIMEOUT`]. If a holder is still live at the
    /// deadline, the record's free is deferred to that holder's guard drop
    /// and the removal reports success.
    pub fn remove(&self, id: u32) -> Result<(), Error> {
        let entry = self.lists.lock().take(id).ok_or(Error::NotFound(id))?;

        let deadline = Instant::now() + DRAIN_TIMEOUT;
        while Arc::strong_count(&entry) > 1 {
            if Instant::now() >= deadline {
                warn!(
                    "rule {} still referenced after {:?}; free deferred to last holder",
                    id, DRAIN_TIMEOUT
                );
                break;
            }
            std::thread::yield_now();
        }
        Ok(())
    }

    /// Copy out the rule with this id. Does not count as a hold.
    pub fn get(&self, id: u32) -> Result<Rule, Error> {
        let lists = self.lists.lock();
        let result = lists
            .all()
            .find(|r| r.id == id)
            .map(|r| Rule::clone(r))
            .ok_or(Error::NotFound(id));
        result
    }

    /// First rule in the category whose pattern matches the target,
    /// in insertion order. The guard holds the record alive until dropped.
    pub fn match_rule(&self, category: Category, target: &str) -> Option<MatchGuard> {
        let lists = self.lists.lock();
        lists
            .list(category)
            .iter()
            .find(|r| r.matches(target))
            .map(|r| MatchGuard {
                entry: Arc::clone(r),
            })
    }

    /// Unlink every rule in all three collections. Outstanding guards keep
    /// their records alive until dropped.
    pub fn clear_all(&self) {
        let mut lists = self.lists.lock();
        lists.exec.clear();
        lists.dns.clear();
        lists.network.clear();
    }

    pub fn len(&self) -> usize {
        self.lists.lock().total()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies of all rules, exec then dns then network, each in
    /// insertion order.
    pub fn snapshot(&self) -> Vec<Rule> {
        let lists = self.lists.lock();
        lists.all().map(|r| Rule::clone(r)).collect()
    }

    pub fn set_capacity(&self, capacity: u32) {
        self.capacity.store(capacity, Ordering::Relaxed);
    }
}
