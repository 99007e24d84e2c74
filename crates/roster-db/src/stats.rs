//! Aggregate user statistics.

use crate::UserError;
use roster_types::{UserStats, DEFAULT_STATUS};
use rusqlite::Connection;
use std::collections::BTreeMap;

/// Computes total, active, inactive and per-role user counts.
///
/// All queries run inside one read transaction, so the counts describe a
/// single snapshot: `by_role` always sums to `total_users`.
pub fn user_stats(conn: &Connection) -> Result<UserStats, UserError> {
    let tx = conn.unchecked_transaction()?;

    let total_users: i64 = tx.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    let active_users: i64 = tx.query_row(
        "SELECT COUNT(*) FROM users WHERE status = ?1",
        [DEFAULT_STATUS],
        |row| row.get(0),
    )?;

    let by_role = {
        let mut stmt = tx.prepare("SELECT role, COUNT(*) FROM users GROUP BY role")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        rows.collect::<Result<BTreeMap<_, _>, _>>()?
    };

    tx.commit()?;

    Ok(UserStats {
        total_users,
        active_users,
        inactive_users: total_users - active_users,
        by_role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_user, run_migrations};
    use roster_types::NewUser;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        run_migrations(&conn).expect("migrations should succeed");
        conn
    }

    #[test]
    fn empty_table_is_all_zero() {
        let conn = setup();
        assert_eq!(user_stats(&conn).unwrap(), UserStats::default());
    }

    #[test]
    fn counts_active_inactive_and_roles() {
        let conn = setup();
        for i in 0..7 {
            let user = NewUser {
                role: (i % 3 == 0).then(|| "admin".to_string()),
                status: (i < 3).then(|| "inactive".to_string()),
                ..NewUser::new(format!("user {i}"), format!("user{i}@example.com"))
            };
            create_user(&conn, &user).unwrap();
        }

        let stats = user_stats(&conn).unwrap();
        assert_eq!(stats.total_users, 7);
        assert_eq!(stats.inactive_users, 3);
        assert_eq!(stats.active_users, 4);
        assert_eq!(stats.by_role.get("admin"), Some(&3));
        assert_eq!(stats.by_role.get("user"), Some(&4));
        assert_eq!(stats.by_role.values().sum::<i64>(), stats.total_users);
    }
}
