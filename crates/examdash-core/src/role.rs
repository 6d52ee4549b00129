//! Role gate: decides which feeds a session may subscribe to.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::FeedKey;

/// Dashboard role of the signed-in account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Teacher, Role::Student];
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Teacher => write!(f, "teacher"),
            Self::Student => write!(f, "student"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" | "administrator" => Ok(Self::Admin),
            "teacher" | "lecturer" => Ok(Self::Teacher),
            "student" => Ok(Self::Student),
            _ => Err(Error::Config(format!("Invalid role: {}", s))),
        }
    }
}

/// Pure predicate over (feed, role).
///
/// Feeds without a rule are open to every role.
#[derive(Debug, Clone)]
pub struct RoleGate {
    rules: HashMap<FeedKey, HashSet<Role>>,
}

impl Default for RoleGate {
    /// Notifications for everyone, activity logs for admins only.
    fn default() -> Self {
        Self::open().restrict(FeedKey::ActivityLogs, [Role::Admin])
    }
}

impl RoleGate {
    /// Gate that allows every feed for every role.
    pub fn open() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// Limit `feed` to the given roles, replacing any previous rule.
    pub fn restrict(mut self, feed: FeedKey, roles: impl IntoIterator<Item = Role>) -> Self {
        self.rules.insert(feed, roles.into_iter().collect());
        self
    }

    pub fn allows(&self, feed: FeedKey, role: Role) -> bool {
        self.rules
            .get(&feed)
            .map_or(true, |roles| roles.contains(&role))
    }

    /// Feeds `role` may subscribe to, in mount order.
    pub fn allowed_feeds(&self, role: Role) -> Vec<FeedKey> {
        FeedKey::ALL
            .into_iter()
            .filter(|feed| self.allows(*feed, role))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_gate() {
        let gate = RoleGate::default();
        for role in Role::ALL {
            assert!(gate.allows(FeedKey::Notifications, role));
        }
        assert!(gate.allows(FeedKey::ActivityLogs, Role::Admin));
        assert!(!gate.allows(FeedKey::ActivityLogs, Role::Teacher));
        assert!(!gate.allows(FeedKey::ActivityLogs, Role::Student));
    }

    #[test]
    fn test_allowed_feeds() {
        let gate = RoleGate::default();
        assert_eq!(gate.allowed_feeds(Role::Admin), FeedKey::ALL.to_vec());
        assert_eq!(gate.allowed_feeds(Role::Student), vec![FeedKey::Notifications]);
    }

    #[test]
    fn test_open_gate_and_restrict_replaces() {
        let gate = RoleGate::open();
        assert!(gate.allows(FeedKey::ActivityLogs, Role::Student));

        let gate = RoleGate::default().restrict(FeedKey::ActivityLogs, [Role::Teacher]);
        assert!(!gate.allows(FeedKey::ActivityLogs, Role::Admin));
        assert!(gate.allows(FeedKey::ActivityLogs, Role::Teacher));
    }

    #[test]
    fn test_empty_rule_denies_everyone() {
        let gate = RoleGate::open().restrict(FeedKey::Notifications, Vec::<Role>::new());
        assert!(Role::ALL.iter().all(|r| !gate.allows(FeedKey::Notifications, *r)));
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(" teacher ".parse::<Role>().unwrap(), Role::Teacher);
        assert_eq!("STUDENT".parse::<Role>().unwrap(), Role::Student);
        assert!(matches!("guest".parse::<Role>(), Err(Error::Config(_))));
    }

    #[test]
    fn test_role_display_roundtrip() {
        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
    }
}
