// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Staff record operations.

use rusqlite::{Connection, OptionalExtension, Row, params};
use tidyhq_core::{Staff, StaffId, TidyError};

use crate::database::{Database, map_tr_err};

fn staff_from_row(row: &Row<'_>) -> rusqlite::Result<Staff> {
    Ok(Staff {
        id: StaffId(row.get(0)?),
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        active: row.get(4)?,
        color: row.get(5)?,
    })
}

pub fn find(conn: &Connection, id: &str) -> rusqlite::Result<Option<Staff>> {
    conn.query_row(
        "SELECT id, name, email, phone, active, color FROM staff WHERE id = ?1",
        params![id],
        staff_from_row,
    )
    .optional()
}

/// Insert a staff member or replace the stored record with the same id.
pub async fn upsert_staff(db: &Database, staff: &Staff) -> Result<(), TidyError> {
    let staff = staff.clone();
    db.connection()
        .call(move |conn| -> rusqlite::Result<()> {
            conn.execute(
                "INSERT INTO staff (id, name, email, phone, active, color)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     email = excluded.email,
                     phone = excluded.phone,
                     active = excluded.active,
                     color = excluded.color",
                params![
                    staff.id.0,
                    staff.name,
                    staff.email,
                    staff.phone,
                    staff.active,
                    staff.color
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_staff(db: &Database, id: &StaffId) -> Result<Option<Staff>, TidyError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| find(conn, &id))
        .await
        .map_err(map_tr_err)
}

/// List staff ordered by name.
pub async fn list_staff(db: &Database, active_only: bool) -> Result<Vec<Staff>, TidyError> {
    db.connection()
        .call(move |conn| -> rusqlite::Result<Vec<Staff>> {
            let mut stmt = conn.prepare(
                "SELECT id, name, email, phone, active, color FROM staff
                 WHERE (?1 = 0 OR active = 1)
                 ORDER BY name ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![active_only], staff_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn member(id: &str, name: &str, active: bool) -> Staff {
        Staff {
            id: StaffId(id.into()),
            name: name.into(),
            email: Some(format!("{}@example.com", id.to_lowercase())),
            phone: None,
            active,
            color: "#10b981".into(),
        }
    }

    #[tokio::test]
    async fn upsert_replaces_and_list_filters_inactive() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("staff.db").to_str().unwrap())
            .await
            .unwrap();

        upsert_staff(&db, &member("S2", "Bo", true)).await.unwrap();
        upsert_staff(&db, &member("S1", "Ana", true)).await.unwrap();
        upsert_staff(&db, &member("S3", "Cy", false)).await.unwrap();
        upsert_staff(&db, &member("S2", "Bo Park", true)).await.unwrap();

        let stored = get_staff(&db, &"S2".into()).await.unwrap().unwrap();
        assert_eq!(stored.name, "Bo Park");

        let active: Vec<_> = list_staff(&db, true)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id.0)
            .collect();
        assert_eq!(active, ["S1", "S2"]);
        assert_eq!(list_staff(&db, false).await.unwrap().len(), 3);
        db.close().await.unwrap();
    }
}
