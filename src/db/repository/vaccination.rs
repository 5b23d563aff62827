use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{VaccinationRecord, VaccineInventoryFilter, VaccineLot};

use super::{fmt_datetime, parse_date, parse_datetime, parse_uuid};

const LOT_COLUMNS: &str =
    "id, vaccine_name, cvx_code, lot_number, manufacturer, doses_available, expiration_date, created_at";

pub fn insert_vaccine_lot(conn: &Connection, lot: &VaccineLot) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO vaccine_inventory (id, vaccine_name, cvx_code, lot_number, manufacturer,
         doses_available, expiration_date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            lot.id.to_string(),
            lot.vaccine_name,
            lot.cvx_code,
            lot.lot_number,
            lot.manufacturer,
            lot.doses_available,
            lot.expiration_date.to_string(),
            fmt_datetime(&lot.created_at),
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DatabaseError::ConstraintViolation(format!(
                "lot {} of {} already stocked",
                lot.lot_number, lot.vaccine_name
            ))
        }
        other => DatabaseError::Sqlite(other),
    })?;
    Ok(())
}

pub fn get_vaccine_lot(conn: &Connection, id: &Uuid) -> Result<Option<VaccineLot>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {LOT_COLUMNS} FROM vaccine_inventory WHERE id = ?1"),
            params![id.to_string()],
            lot_row,
        )
        .optional()?;
    row.map(lot_from_row).transpose()
}

/// Inventory ordered by expiration so the lot to use first comes first.
pub fn list_vaccine_inventory(
    conn: &Connection,
    filter: &VaccineInventoryFilter,
    today: NaiveDate,
) -> Result<Vec<VaccineLot>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LOT_COLUMNS} FROM vaccine_inventory
         WHERE (?1 IS NULL OR doses_available < ?1)
           AND (?2 = 1 OR expiration_date >= ?3)
         ORDER BY expiration_date, vaccine_name, lot_number"
    ))?;
    let rows = stmt.query_map(
        params![filter.low_stock, filter.include_expired as i32, today.to_string()],
        lot_row,
    )?;
    let mut out = Vec::new();
    for row in rows {
        out.push(lot_from_row(row?)?);
    }
    Ok(out)
}

/// Decrement the lot by one dose and store the administration record in a
/// single transaction. The caller validates expiry and stock beforehand; the
/// conditional update guards against a concurrent administration emptying
/// the lot in between.
pub fn record_vaccination(conn: &Connection, record: &VaccinationRecord) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let updated = tx.execute(
        "UPDATE vaccine_inventory SET doses_available = doses_available - 1
         WHERE id = ?1 AND doses_available > 0",
        params![record.inventory_id.to_string()],
    )?;
    if updated == 0 {
        return Err(DatabaseError::ConstraintViolation(format!(
            "lot {} has no doses available",
            record.lot_number
        )));
    }
    tx.execute(
        "INSERT INTO vaccination_records (id, patient_id, inventory_id, vaccine_name, lot_number,
         dose_number, administered_on, administered_by, site, route, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            record.id.to_string(),
            record.patient_id.to_string(),
            record.inventory_id.to_string(),
            record.vaccine_name,
            record.lot_number,
            record.dose_number,
            record.administered_on.to_string(),
            record.administered_by,
            record.site,
            record.route,
            fmt_datetime(&record.created_at),
        ],
    )?;
    tx.commit()?;
    Ok(())
}

/// Prior doses of the same vaccine for a patient, used to number the next dose.
pub fn count_prior_doses(conn: &Connection, patient_id: &Uuid, vaccine_name: &str) -> Result<i32, DatabaseError> {
    let n: i32 = conn.query_row(
        "SELECT COUNT(*) FROM vaccination_records WHERE patient_id = ?1 AND vaccine_name = ?2",
        params![patient_id.to_string(), vaccine_name],
        |row| row.get(0),
    )?;
    Ok(n)
}

pub fn list_vaccination_records(
    conn: &Connection,
    patient_id: Option<&Uuid>,
) -> Result<Vec<VaccinationRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, inventory_id, vaccine_name, lot_number, dose_number,
                administered_on, administered_by, site, route, created_at
         FROM vaccination_records
         WHERE (?1 IS NULL OR patient_id = ?1)
         ORDER BY administered_on DESC, created_at DESC",
    )?;
    let rows = stmt.query_map(params![patient_id.map(|id| id.to_string())], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, i32>(5)?,
            row.get::<_, String>(6)?,
            row.get::<_, String>(7)?,
            row.get::<_, String>(8)?,
            row.get::<_, String>(9)?,
            row.get::<_, String>(10)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, patient_id, inventory_id, vaccine_name, lot_number, dose_number, administered_on,
            administered_by, site, route, created_at) = row?;
        out.push(VaccinationRecord {
            id: parse_uuid(&id)?,
            patient_id: parse_uuid(&patient_id)?,
            inventory_id: parse_uuid(&inventory_id)?,
            vaccine_name,
            lot_number,
            dose_number,
            administered_on: parse_date(&administered_on)?,
            administered_by,
            site,
            route,
            created_at: parse_datetime(&created_at)?,
        });
    }
    Ok(out)
}

type LotRow = (String, String, String, String, String, i32, String, String);

fn lot_row(row: &Row<'_>) -> rusqlite::Result<LotRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn lot_from_row(row: LotRow) -> Result<VaccineLot, DatabaseError> {
    let (id, vaccine_name, cvx_code, lot_number, manufacturer, doses_available, expiration_date, created_at) =
        row;
    Ok(VaccineLot {
        id: parse_uuid(&id)?,
        vaccine_name,
        cvx_code,
        lot_number,
        manufacturer,
        doses_available,
        expiration_date: parse_date(&expiration_date)?,
        created_at: parse_datetime(&created_at)?,
    })
}
