//! Shared types for the roster user service.
//!
//! These are the shapes that cross the storage/HTTP boundary: the stored
//! [`User`] record, the create and update parameter sets, and the aggregate
//! [`UserStats`]. Both `roster-db` and `roster-server` depend on this crate
//! so neither has to depend on the other for a type definition.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Role assigned to a user when the create request omits one.
pub const DEFAULT_ROLE: &str = "user";

/// Status assigned to a user when the create request omits one.
pub const DEFAULT_STATUS: &str = "active";

/// A stored user row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Primary key, generated by the database on insert.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Email address. Unique across all users.
    pub email: String,
    /// Free-form role label (e.g. `user`, `admin`).
    pub role: String,
    /// Free-form status label; `active` counts as active in statistics.
    pub status: String,
    /// Creation timestamp (ISO 8601, UTC).
    pub created_at: String,
    /// Last modification timestamp (ISO 8601, UTC).
    pub updated_at: String,
}

/// Parameters for creating a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    /// Falls back to [`DEFAULT_ROLE`].
    pub role: Option<String>,
    /// Falls back to [`DEFAULT_STATUS`].
    pub status: Option<String>,
}

impl NewUser {
    /// Creates a parameter set with only the required fields.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            role: None,
            status: None,
        }
    }

    /// The role that will be stored.
    pub fn effective_role(&self) -> &str {
        self.role.as_deref().unwrap_or(DEFAULT_ROLE)
    }

    /// The status that will be stored.
    pub fn effective_status(&self) -> &str {
        self.status.as_deref().unwrap_or(DEFAULT_STATUS)
    }
}

/// A partial update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
}

impl UserPatch {
    /// Returns `true` when no field is supplied.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.role.is_none() && self.status.is_none()
    }

    /// Supplied fields as `(column, value)` pairs, in a fixed column order.
    pub fn assignments(&self) -> Vec<(&'static str, &str)> {
        [
            ("name", self.name.as_deref()),
            ("email", self.email.as_deref()),
            ("role", self.role.as_deref()),
            ("status", self.status.as_deref()),
        ]
        .into_iter()
        .filter_map(|(column, value)| value.map(|v| (column, v)))
        .collect()
    }
}

/// Aggregate user counts.
///
/// `inactive_users` is derived as `total_users - active_users`, so any
/// status other than `active` counts as inactive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_users: i64,
    pub active_users: i64,
    pub inactive_users: i64,
    /// User count per role. Sums to `total_users`.
    pub by_role: BTreeMap<String, i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_defaults() {
        let user = NewUser::new("Ada", "ada@example.com");
        assert_eq!(user.effective_role(), "user");
        assert_eq!(user.effective_status(), "active");

        let user = NewUser {
            role: Some("admin".to_string()),
            status: Some("inactive".to_string()),
            ..NewUser::new("Ada", "ada@example.com")
        };
        assert_eq!(user.effective_role(), "admin");
        assert_eq!(user.effective_status(), "inactive");
    }

    #[test]
    fn empty_patch_has_no_assignments() {
        let patch = UserPatch::default();
        assert!(patch.is_empty());
        assert!(patch.assignments().is_empty());
    }

    #[test]
    fn patch_assignments_only_include_supplied_fields() {
        let patch = UserPatch {
            email: Some("new@example.com".to_string()),
            status: Some("inactive".to_string()),
            ..UserPatch::default()
        };
        assert!(!patch.is_empty());
        assert_eq!(
            patch.assignments(),
            vec![("email", "new@example.com"), ("status", "inactive")]
        );
    }

    #[test]
    fn stats_serialize_with_wire_field_names() {
        let mut by_role = BTreeMap::new();
        by_role.insert("user".to_string(), 2);
        let stats = UserStats {
            total_users: 2,
            active_users: 1,
            inactive_users: 1,
            by_role,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["total_users"], 2);
        assert_eq!(json["inactive_users"], 1);
        assert_eq!(json["by_role"]["user"], 2);
    }
}
