//! Rule records and target pattern matching.
//!
//! A rule binds a target pattern to an action for one event category.
//! Patterns are literal strings, optionally ending in a single `*` for a
//! prefix match. `*` or `?` anywhere else never matches; the grammar is
//! deliberately not a glob (see DESIGN.md).

use serde::{Deserialize, Serialize};

/// Maximum byte length of a rule target pattern.
pub const TARGET_MAX: usize = 255;

/// Maximum byte length of a rule description.
pub const DESCRIPTION_MAX: usize = 511;

/// Event class a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Process execution (target is the executable path).
    Exec,
    /// DNS resolution (target is the queried domain).
    Dns,
    /// Outbound network connection (target is address:port).
    Network,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Exec => "exec",
            Category::Dns => "dns",
            Category::Network => "network",
        }
    }

    /// Parse from the keyword used by the rule text format.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "exec" => Some(Category::Exec),
            "dns" => Some(Category::Dns),
            "network" => Some(Category::Network),
            _ => None,
        }
    }
}

/// What to do when a rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Fail the operation.
    Block,
    /// Let the operation proceed, without recording it.
    Allow,
    /// Let the operation proceed, but record it in the audit log.
    Log,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Block => "block",
            Action::Allow => "allow",
            Action::Log => "log",
        }
    }

    /// Parse from the keyword used by the rule text format.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "block" => Some(Action::Block),
            "allow" => Some(Action::Allow),
            "log" => Some(Action::Log),
            _ => None,
        }
    }
}

/// One policy rule. Immutable once inserted into the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique id; 0 means "auto-assign on insert".
    pub id: u32,
    pub category: Category,
    pub action: Action,
    /// Administrator-supplied; stored but not consulted for match ordering.
    pub priority: u32,
    /// Pattern compared against event targets (≤255 bytes).
    pub target: String,
    /// Free text for display and audit (≤511 bytes).
    pub description: String,
}

impl Rule {
    /// Create a rule with an auto-assigned id.
    pub fn new(
        category: Category,
        action: Action,
        priority: u32,
        target: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            category,
            action,
            priority,
            target: target.into(),
            description: description.into(),
        }
    }

    /// Check the field bounds the store enforces on insert.
    pub fn validate(&self) -> Result<(), String> {
        if self.target.is_empty() {
            return Err("empty target".to_string());
        }
        if self.target.len() > TARGET_MAX {
            return Err(format!("target exceeds {} bytes", TARGET_MAX));
        }
        if self.description.len() > DESCRIPTION_MAX {
            return Err(format!("description exceeds {} bytes", DESCRIPTION_MAX));
        }
        Ok(())
    }

    /// Whether this rule's pattern matches the given target.
    pub fn matches(&self, target: &str) -> bool {
        pattern_matches(&self.target, target)
    }

    /// Parse one line of the rule text format:
    /// `category|action|priority|target|description`.
    ///
    /// Returns `Ok(None)` for comment (`#`) and blank lines. The
    /// description field is optional and may itself contain `|`.
    pub fn parse_line(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim_start();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let mut fields = line.splitn(5, '|');

        let category = fields
            .next()
            .and_then(Category::from_str)
            .ok_or("unknown category (expected exec, dns or network)")?;
        let action = fields
            .next()
            .and_then(Action::from_str)
            .ok_or("unknown action (expected block, allow or log)")?;
        let priority = fields
            .next()
            .ok_or("missing priority field")?
            .parse::<u32>()
            .map_err(|e| format!("bad priority: {}", e))?;
        let target = fields.next().ok_or("missing target field")?.to_string();
        let description = fields.next().unwrap_or("").to_string();

        let rule = Rule {
            id: 0,
            category,
            action,
            priority,
            target,
            description,
        };
        rule.validate()?;
        Ok(Some(rule))
    }
}

/// Pattern comparison used by the matcher, in priority order:
/// exact equality, then trailing-`*` prefix match. A `*` or `?` anywhere
/// but the very end disqualifies the pattern.
pub fn pattern_matches(pattern: &str, target: &str) -> bool {
    if pattern == target {
        return true;
    }
    match pattern.strip_suffix('*') {
        Some(prefix) if !prefix.contains(['*', '?']) => target.starts_with(prefix),
        _ => false,
    }
}
