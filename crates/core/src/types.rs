use std::fmt;

use serde::{Deserialize, Serialize};

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Identity that owns a set of job pointers.
///
/// Distinct signed-in users sharing one device (and the anonymous guest)
/// never see each other's pointers. The `:` character is reserved as the
/// storage key separator, so ids are escaped reversibly: `%` becomes `%25`
/// and `:` becomes `%3A`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountScope(String);

impl AccountScope {
    /// Scope used when nobody is signed in.
    pub const GUEST: &'static str = "guest";

    /// Build a scope from a user id. Blank ids map to the guest scope.
    pub fn new(user_id: impl AsRef<str>) -> Self {
        let id = user_id.as_ref().trim();
        if id.is_empty() {
            return Self::guest();
        }
        Self(escape(id))
    }

    pub fn guest() -> Self {
        Self(Self::GUEST.to_string())
    }

    pub fn is_guest(&self) -> bool {
        self.0 == Self::GUEST
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn escape(id: &str) -> String {
    let mut escaped = String::with_capacity(id.len());
    for c in id.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            ':' => escaped.push_str("%3A"),
            other => escaped.push(other),
        }
    }
    escaped
}

impl Default for AccountScope {
    fn default() -> Self {
        Self::guest()
    }
}

impl fmt::Display for AccountScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_user_id_is_guest() {
        assert!(AccountScope::new("   ").is_guest());
        assert_eq!(AccountScope::default(), AccountScope::guest());
    }

    #[test]
    fn separator_is_escaped() {
        assert_eq!(AccountScope::new("org:17").as_str(), "org%3A17");
        assert_eq!(AccountScope::new("50%").as_str(), "50%25");
    }

    #[test]
    fn escaped_ids_stay_distinct() {
        let colon = AccountScope::new("org:17");
        assert_ne!(colon, AccountScope::new("org_17"));
        assert_ne!(colon, AccountScope::new("org%3A17"));
        assert!(!colon.as_str().contains(':'));
    }

    #[test]
    fn user_id_is_trimmed() {
        assert_eq!(AccountScope::new(" 42 ").to_string(), "42");
    }
}
