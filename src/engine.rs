//! The prevention engine: decision pipeline and control plane.
//!
//! One [`GuardEngine`] instance owns the rule store, audit log and stats.
//! Interceptors call the per-category check methods on their own execution
//! context and enforce the returned verdict; the control plane mutates and
//! inspects the same state concurrently from an administrative caller.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::audit::{AuditLog, LogEntry, DEFAULT_LOG_CAPACITY};
use crate::config::Config;
use crate::error::Error;
use crate::rule::{Action, Category, Rule};
use crate::stats::{Stats, StatsSnapshot};
use crate::store::RuleStore;

/// The subject process on whose behalf an event is evaluated.
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
}

impl ProcessInfo {
    pub fn new(pid: u32, name: impl Into<String>) -> Self {
        Self {
            pid,
            name: name.into(),
        }
    }
}

/// Outcome of one event evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Let the operation proceed; nothing recorded.
    Allow,

    /// Fail the operation.
    Deny { rule_id: u32 },

    /// Let the operation proceed; the decision was recorded.
    Logged { rule_id: u32 },
}

impl Verdict {
    /// True when the operation may proceed (including `Logged`).
    pub fn is_allow(&self) -> bool {
        !self.is_deny()
    }

    pub fn is_deny(&self) -> bool {
        matches!(self, Verdict::Deny { .. })
    }

    /// The rule that fired, if any.
    pub fn rule_id(&self) -> Option<u32> {
        match self {
            Verdict::Allow => None,
            Verdict::Deny { rule_id } | Verdict::Logged { rule_id } => Some(*rule_id),
        }
    }
}

/// The engine instance. Construct one at startup and share it by reference
/// between the interceptors and the administrative channel.
pub struct GuardEngine {
    store: RuleStore,
    audit: AuditLog,
    stats: Stats,
    enabled: AtomicBool,
    config: Mutex<Config>,
}

impl GuardEngine {
    pub fn new(config: Config) -> Self {
        Self::with_log_capacity(config, DEFAULT_LOG_CAPACITY)
    }

    /// Construct with an explicit audit-ring capacity.
    pub fn with_log_capacity(config: Config, log_capacity: usize) -> Self {
        Self {
            store: RuleStore::new(config.max_rules),
            audit: AuditLog::new(log_capacity),
            stats: Stats::new(),
            enabled: AtomicBool::new(config.enabled),
            config: Mutex::new(config),
        }
    }

    // --- decision pipeline (hot path) ---------------------------------

    /// Evaluate a process-execution attempt. A `Deny` verdict means the
    /// caller must fail the execution with permission-denied semantics.
    pub fn check_exec(&self, path: &str, process: &ProcessInfo) -> Verdict {
        self.check(Category::Exec, path, process)
    }

    /// Evaluate a DNS query for `domain`. A `Deny` verdict means the
    /// caller must drop the packet instead of forwarding it.
    pub fn check_dns(&self, domain: &str, process: &ProcessInfo) -> Verdict {
        self.check(Category::Dns, domain, process)
    }

    /// Evaluate an outbound connection to `addr` (address:port). A `Deny`
    /// verdict means the caller must drop the packet.
    pub fn check_network(&self, addr: &str, process: &ProcessInfo) -> Verdict {
        self.check(Category::Network, addr, process)
    }

    fn check(&self, category: Category, target: &str, process: &ProcessInfo) -> Verdict {
        if !self.enabled.load(Ordering::Relaxed) {
            return Verdict::Allow;
        }

        self.stats.touch();
        debug!("{} check: {} (pid {})", category.as_str(), target, process.pid);

        let Some(matched) = self.store.match_rule(category, target) else {
            return Verdict::Allow;
        };

        match matched.action {
            Action::Block => {
                warn!(
                    "blocked {} {} (rule {})",
                    category.as_str(),
                    target,
                    matched.id
                );
                self.audit.append(LogEntry::new(
                    matched.id,
                    category,
                    Action::Block,
                    process.pid,
                    &process.name,
                    target,
                    details(category, Action::Block),
                ));
                self.stats.record_block(category);
                Verdict::Deny {
                    rule_id: matched.id,
                }
            }
            Action::Log => {
                info!(
                    "logged {} {} (rule {})",
                    category.as_str(),
                    target,
                    matched.id
                );
                self.audit.append(LogEntry::new(
                    matched.id,
                    category,
                    Action::Log,
                    process.pid,
                    &process.name,
                    target,
                    details(category, Action::Log),
                ));
                Verdict::Logged {
                    rule_id: matched.id,
                }
            }
            Action::Allow => Verdict::Allow,
        }
        // the match guard drops here, releasing the record
    }

    // --- control plane ------------------------------------------------

    /// Insert a rule; returns the (possibly auto-assigned) id.
    pub fn add_rule(&self, rule: Rule) -> Result<u32, Error> {
        let id = self.store.add(rule)?;
        info!("rule {} added", id);
        Ok(id)
    }

    /// Remove a rule by id, waiting (bounded) for in-flight matches.
    pub fn delete_rule(&self, id: u32) -> Result<(), Error> {
        self.store.remove(id)?;
        info!("rule {} deleted", id);
        Ok(())
    }

    /// Copy out a rule by id.
    pub fn get_rule(&self, id: u32) -> Result<Rule, Error> {
        self.store.get(id)
    }

    /// Copies of all rules, exec then dns then network, insertion order.
    pub fn rules(&self) -> Vec<Rule> {
        self.store.snapshot()
    }

    pub fn rule_count(&self) -> usize {
        self.store.len()
    }

    /// Replace the configuration; applies the enabled flag and rule cap
    /// immediately.
    pub fn set_config(&self, config: Config) {
        self.enabled.store(config.enabled, Ordering::Relaxed);
        self.store.set_capacity(config.max_rules);
        *self.config.lock() = config;
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> Config {
        self.config.lock().clone()
    }

    /// Persist the current configuration to its `config_file` path.
    pub fn save_config(&self) -> Result<(), Error> {
        let config = self.config.lock().clone();
        config.save()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Remove and return up to `max` oldest audit entries.
    pub fn drain_logs(&self, max: usize) -> Vec<LogEntry> {
        self.audit.drain(max)
    }

    pub fn audit_len(&self) -> usize {
        self.audit.len()
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
        self.config.lock().enabled = true;
        info!("engine enabled");
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
        self.config.lock().enabled = false;
        info!("engine disabled");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Clear every rule and re-populate from the configured rules file.
    /// Audit log and stats are untouched. Returns the number of rules
    /// loaded.
    pub fn reload(&self) -> Result<usize, Error> {
        let rules_path = self.config.lock().rules_path();
        self.store.clear_all();

        let Some(path) = rules_path else {
            info!("reload: no rules file configured");
            return Ok(0);
        };
        let text = std::fs::read_to_string(&path)?;
        let count = self.load_rules(&text)?;
        info!("reload: {} rules loaded from {}", count, path.display());
        Ok(count)
    }

    /// Bulk rule ingestion, one rule per line
    /// (`category|action|priority|target|description`; `#` comments and
    /// blank lines skipped). Transactional: a line that fails to parse
    /// reports its 1-based number and nothing from the batch is applied.
    pub fn load_rules(&self, text: &str) -> Result<usize, Error> {
        let mut staged = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            match Rule::parse_line(line) {
                Ok(Some(rule)) => staged.push(rule),
                Ok(None) => {}
                Err(reason) => {
                    return Err(Error::Parse {
                        line: idx + 1,
                        reason,
                    })
                }
            }
        }
        self.store.add_batch(staged)
    }
}

/// Fixed descriptive text recorded with each audited decision.
fn details(category: Category, action: Action) -> &'static str {
    match (category, action) {
        (Category::Exec, Action::Block) => "process execution blocked",
        (Category::Exec, _) => "process execution logged",
        (Category::Dns, Action::Block) => "dns query blocked",
        (Category::Dns, _) => "dns query logged",
        (Category::Network, Action::Block) => "network connection blocked",
        (Category::Network, _) => "network connection logged",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> GuardEngine {
        GuardEngine::new(Config::default())
    }

    fn proc_info() -> ProcessInfo {
        ProcessInfo::new(4242, "bash")
    }

    #[test]
    fn test_no_rules_allows() {
        let engine = engine();
        assert!(engine.check_exec("/usr/bin/ls", &proc_info()).is_allow());
        assert!(engine.audit_len() == 0);
    }

    #[test]
    fn test_block_rule_denies() {
        let engine = engine();
        let id = engine
            .add_rule(Rule::new(Category::Exec, Action::Block, 10, "/usr/bin/nc", ""))
            .unwrap();
        let verdict = engine.check_exec("/usr/bin/nc", &proc_info());
        assert_eq!(verdict, Verdict::Deny { rule_id: id });
    }

    #[test]
    fn test_log_rule_allows_but_records() {
        let engine = engine();
        let id = engine
            .add_rule(Rule::new(Category::Dns, Action::Log, 0, "telemetry.example", ""))
            .unwrap();
        let verdict = engine.check_dns("telemetry.example", &proc_info());
        assert_eq!(verdict, Verdict::Logged { rule_id: id });
        assert!(verdict.is_allow());

        let logs = engine.drain_logs(10);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, Action::Log);
        assert_eq!(logs[0].rule_id, id);
    }

    #[test]
    fn test_explicit_allow_not_audited() {
        let engine = engine();
        engine
            .add_rule(Rule::new(Category::Network, Action::Allow, 0, "10.0.0.1:443", ""))
            .unwrap();
        let verdict = engine.check_network("10.0.0.1:443", &proc_info());
        assert_eq!(verdict, Verdict::Allow);
        assert_eq!(engine.audit_len(), 0);
        assert_eq!(engine.stats().total_events, 0);
    }

    #[test]
    fn test_disabled_engine_bypasses_everything() {
        let engine = engine();
        engine
            .add_rule(Rule::new(Category::Exec, Action::Block, 0, "*", "block all"))
            .unwrap();
        engine.disable();

        assert!(engine.check_exec("/usr/bin/anything", &proc_info()).is_allow());
        assert_eq!(engine.audit_len(), 0);
        assert_eq!(engine.stats().last_event_ms, 0);

        engine.enable();
        assert!(engine.check_exec("/usr/bin/anything", &proc_info()).is_deny());
    }

    #[test]
    fn test_verdict_accessors() {
        assert!(Verdict::Allow.is_allow());
        assert_eq!(Verdict::Allow.rule_id(), None);
        assert!(Verdict::Deny { rule_id: 3 }.is_deny());
        assert_eq!(Verdict::Deny { rule_id: 3 }.rule_id(), Some(3));
        assert!(Verdict::Logged { rule_id: 9 }.is_allow());
        assert_eq!(Verdict::Logged { rule_id: 9 }.rule_id(), Some(9));
    }

    #[test]
    fn test_load_rules_transactional() {
        let engine = engine();
        let batch = "\
# staged batch
exec|block|10|/usr/bin/nc|no netcat
dns|bogus|0|evil.example|bad action keyword
";
        let err = engine.load_rules(batch).unwrap_err();
        match err {
            Error::Parse { line, .. } => assert_eq!(line, 3),
            other => panic!("expected parse error, got {other:?}"),
        }
        assert_eq!(engine.rule_count(), 0);
    }

    #[test]
    fn test_load_rules_counts_applied() {
        let engine = engine();
        let batch = "\
# comment
exec|block|10|/usr/bin/nc|no netcat

dns|log|0|telemetry.example|watch
network|block|5|10.0.0.1:4444|c2
";
        assert_eq!(engine.load_rules(batch).unwrap(), 3);
        assert_eq!(engine.rule_count(), 3);
    }

    #[test]
    fn test_set_config_applies_enabled_and_cap() {
        let engine = engine();
        let mut config = engine.config();
        config.enabled = false;
        config.max_rules = 1;
        engine.set_config(config);

        assert!(!engine.is_enabled());
        engine
            .add_rule(Rule::new(Category::Exec, Action::Block, 0, "/bin/a", ""))
            .unwrap();
        assert!(matches!(
            engine.add_rule(Rule::new(Category::Exec, Action::Block, 0, "/bin/b", "")),
            Err(Error::Capacity(1))
        ));
    }
}
