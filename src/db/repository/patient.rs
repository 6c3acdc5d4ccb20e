use chrono::NaiveDate;
use rusqlite::{params, Connection};

use super::parse_uuid;
use crate::db::DatabaseError;
use crate::models::Patient;
use uuid::Uuid;

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, name, date_of_birth, phone)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            patient.id.to_string(),
            patient.name,
            patient.date_of_birth.map(|d| d.to_string()),
            patient.phone,
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, date_of_birth, phone FROM patients WHERE id = ?1",
    )?;

    let result = stmt.query_row(params![id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<String>>(3)?,
        ))
    });

    match result {
        Ok((id, name, dob, phone)) => Ok(Some(Patient {
            id: parse_uuid(&id)?,
            name,
            date_of_birth: dob.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
            phone,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn insert_and_get_round_trip() {
        let conn = open_memory_database().unwrap();
        let patient = Patient {
            id: Uuid::new_v4(),
            name: "Ana Souza".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1987, 4, 12),
            phone: Some("+55 11 99999-0000".into()),
        };
        insert_patient(&conn, &patient).unwrap();

        let found = get_patient(&conn, &patient.id).unwrap().unwrap();
        assert_eq!(found.name, "Ana Souza");
        assert_eq!(found.date_of_birth, patient.date_of_birth);
    }

    #[test]
    fn get_missing_patient_is_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_patient(&conn, &Uuid::new_v4()).unwrap().is_none());
    }
}
