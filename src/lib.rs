//! hostguard - host intrusion-prevention engine
//!
//! This library is the core of a host intrusion-prevention system: it
//! decides, per intercepted event, whether to allow, block or merely audit
//! it, based on administrator-defined rules matched against the event's
//! target.
//!
//! # Features
//!
//! - **Three event categories**: process execution, DNS resolution,
//!   outbound network connection
//! - **Rule matching**: exact targets or trailing-`*` prefix patterns,
//!   first-inserted match wins per category
//! - **Safe concurrent mutation**: rules can be added and removed while
//!   the hot matching path runs; deletion never frees a rule a concurrent
//!   match still holds
//! - **Audit logging**: bounded in-memory ring of decisions, drained by
//!   the control plane
//! - **Stats**: per-category block counters and a last-event timestamp
//! - **Bulk ingestion**: transactional `category|action|priority|target|description`
//!   rule batches, also used by reload
//!
//! # Example
//!
//! ```
//! use hostguard::{Action, Category, Config, GuardEngine, ProcessInfo, Rule};
//!
//! let engine = GuardEngine::new(Config::default());
//! engine
//!     .add_rule(Rule::new(Category::Exec, Action::Block, 10, "/usr/bin/nc", "no netcat"))
//!     .unwrap();
//!
//! let process = ProcessInfo::new(4242, "bash");
//! let verdict = engine.check_exec("/usr/bin/nc", &process);
//! assert!(verdict.is_deny());
//! ```

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod rule;
pub mod stats;
pub mod store;

// Re-exports for convenience
pub use audit::{AuditLog, LogEntry};
pub use config::Config;
pub use engine::{GuardEngine, ProcessInfo, Verdict};
pub use error::Error;
pub use rule::{Action, Category, Rule};
pub use stats::StatsSnapshot;
pub use store::{MatchGuard, RuleStore};
