use rusqlite::{params, Connection};
use uuid::Uuid;

use super::parse_uuid;
use crate::db::DatabaseError;
use crate::models::Practitioner;

pub fn insert_practitioner(
    conn: &Connection,
    practitioner: &Practitioner,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO practitioners (id, name, specialty)
         VALUES (?1, ?2, ?3)",
        params![
            practitioner.id.to_string(),
            practitioner.name,
            practitioner.specialty,
        ],
    )?;
    Ok(())
}

pub fn get_practitioner(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<Practitioner>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT id, name, specialty FROM practitioners WHERE id = ?1")?;

    let result = stmt.query_row(params![id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
        ))
    });

    match result {
        Ok((id, name, specialty)) => Ok(Some(Practitioner {
            id: parse_uuid(&id)?,
            name,
            specialty,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
