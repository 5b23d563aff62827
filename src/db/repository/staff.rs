use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::enums::StaffRole;
use crate::models::StaffToken;

use super::{fmt_datetime, parse_datetime, parse_uuid};

pub fn insert_staff_token(conn: &Connection, token: &StaffToken) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO staff_tokens (id, staff_name, role, token_hash, created_at, revoked)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            token.id.to_string(),
            token.staff_name,
            token.role.as_str(),
            token.token_hash,
            fmt_datetime(&token.created_at),
            token.revoked as i32,
        ],
    )?;
    Ok(())
}

/// Look up a non-revoked token by its hex SHA-256 digest.
pub fn find_active_token(
    conn: &Connection,
    token_hash: &str,
) -> Result<Option<StaffToken>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, staff_name, role, token_hash, created_at, revoked
             FROM staff_tokens WHERE token_hash = ?1 AND revoked = 0",
            params![token_hash],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i32>(5)?,
                ))
            },
        )
        .optional()?;

    row.map(|(id, staff_name, role, token_hash, created_at, revoked)| {
        Ok(StaffToken {
            id: parse_uuid(&id)?,
            staff_name,
            role: StaffRole::from_str(&role)?,
            token_hash,
            created_at: parse_datetime(&created_at)?,
            revoked: revoked != 0,
        })
    })
    .transpose()
}

pub fn revoke_staff_token(conn: &Connection, id: &uuid::Uuid) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE staff_tokens SET revoked = 1 WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(updated > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_support::test_db;
    use uuid::Uuid;

    fn token(hash: &str) -> StaffToken {
        StaffToken {
            id: Uuid::new_v4(),
            staff_name: "Front Desk".into(),
            role: StaffRole::Clinician,
            token_hash: hash.into(),
            created_at: crate::db::now(),
            revoked: false,
        }
    }

    #[test]
    fn active_token_found_by_hash() {
        let conn = test_db();
        insert_staff_token(&conn, &token("abc")).unwrap();
        let found = find_active_token(&conn, "abc").unwrap().unwrap();
        assert_eq!(found.staff_name, "Front Desk");
        assert_eq!(found.role, StaffRole::Clinician);
        assert!(find_active_token(&conn, "zzz").unwrap().is_none());
    }

    #[test]
    fn revoked_token_not_found() {
        let conn = test_db();
        let t = token("abc");
        insert_staff_token(&conn, &t).unwrap();
        assert!(revoke_staff_token(&conn, &t.id).unwrap());
        assert!(find_active_token(&conn, "abc").unwrap().is_none());
    }
}
