use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::*;
use crate::models::*;

use super::{fmt_datetime, parse_date, parse_datetime, parse_opt_date, parse_opt_uuid, parse_uuid};

const POLICY_COLUMNS: &str = "id, patient_id, payer_name, payer_type, member_id, group_number,
     coverage_priority, effective_date, termination_date, created_at";

pub fn insert_policy(conn: &Connection, policy: &InsurancePolicy) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO insurance_policies (id, patient_id, payer_name, payer_type, member_id,
         group_number, coverage_priority, effective_date, termination_date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            policy.id.to_string(),
            policy.patient_id.to_string(),
            policy.payer_name,
            policy.payer_type.as_str(),
            policy.member_id,
            policy.group_number,
            policy.coverage_priority.as_str(),
            policy.effective_date.to_string(),
            policy.termination_date.map(|d| d.to_string()),
            fmt_datetime(&policy.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_policy(conn: &Connection, id: &Uuid) -> Result<Option<InsurancePolicy>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {POLICY_COLUMNS} FROM insurance_policies WHERE id = ?1"),
            params![id.to_string()],
            policy_row,
        )
        .optional()?;
    row.map(policy_from_row).transpose()
}

/// All policies on file for a patient, primary coverage first.
pub fn list_policies_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<InsurancePolicy>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {POLICY_COLUMNS} FROM insurance_policies WHERE patient_id = ?1
         ORDER BY CASE coverage_priority
                    WHEN 'primary' THEN 0 WHEN 'secondary' THEN 1 ELSE 2 END,
                  effective_date DESC"
    ))?;
    let rows = stmt.query_map(params![patient_id.to_string()], policy_row)?;

    let mut policies = Vec::new();
    for row in rows {
        policies.push(policy_from_row(row?)?);
    }
    Ok(policies)
}

pub fn insert_eligibility_check(conn: &Connection, check: &EligibilityCheck) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO eligibility_checks (id, patient_id, policy_id, service_date, status,
         dual_eligible, reason, checked_by, checked_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            check.id.to_string(),
            check.patient_id.to_string(),
            check.policy_id.map(|id| id.to_string()),
            check.service_date.to_string(),
            check.status.as_str(),
            check.dual_eligible as i32,
            check.reason,
            check.checked_by,
            fmt_datetime(&check.checked_at),
        ],
    )?;
    Ok(())
}

pub fn list_eligibility_checks(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<EligibilityCheck>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, policy_id, service_date, status, dual_eligible, reason,
                checked_by, checked_at
         FROM eligibility_checks WHERE patient_id = ?1 ORDER BY checked_at DESC",
    )?;
    let rows = stmt.query_map(params![patient_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, i32>(5)?,
            row.get::<_, String>(6)?,
            row.get::<_, String>(7)?,
            row.get::<_, String>(8)?,
        ))
    })?;

    let mut checks = Vec::new();
    for row in rows {
        let (id, patient_id, policy_id, service_date, status, dual, reason, checked_by, checked_at) = row?;
        checks.push(EligibilityCheck {
            id: parse_uuid(&id)?,
            patient_id: parse_uuid(&patient_id)?,
            policy_id: parse_opt_uuid(policy_id)?,
            service_date: parse_date(&service_date)?,
            status: EligibilityStatus::from_str(&status)?,
            dual_eligible: dual != 0,
            reason,
            checked_by,
            checked_at: parse_datetime(&checked_at)?,
        });
    }
    Ok(checks)
}

struct PolicyRow {
    id: String,
    patient_id: String,
    payer_name: String,
    payer_type: String,
    member_id: String,
    group_number: Option<String>,
    coverage_priority: String,
    effective_date: String,
    termination_date: Option<String>,
    created_at: String,
}

fn policy_row(row: &Row<'_>) -> rusqlite::Result<PolicyRow> {
    Ok(PolicyRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        payer_name: row.get(2)?,
        payer_type: row.get(3)?,
        member_id: row.get(4)?,
        group_number: row.get(5)?,
        coverage_priority: row.get(6)?,
        effective_date: row.get(7)?,
        termination_date: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn policy_from_row(row: PolicyRow) -> Result<InsurancePolicy, DatabaseError> {
    Ok(InsurancePolicy {
        id: parse_uuid(&row.id)?,
        patient_id: parse_uuid(&row.patient_id)?,
        payer_name: row.payer_name,
        payer_type: PayerType::from_str(&row.payer_type)?,
        member_id: row.member_id,
        group_number: row.group_number,
        coverage_priority: CoveragePriority::from_str(&row.coverage_priority)?,
        effective_date: parse_date(&row.effective_date)?,
        termination_date: parse_opt_date(row.termination_date)?,
        created_at: parse_datetime(&row.created_at)?,
    })
}

#[cfg(test)]
pub(crate) mod test_policies {
    use chrono::NaiveDate;
    use rusqlite::Connection;
    use uuid::Uuid;

    use crate::models::enums::*;
    use crate::models::InsurancePolicy;

    pub fn add_policy(
        conn: &Connection,
        patient_id: Uuid,
        payer_type: PayerType,
        priority: CoveragePriority,
        effective: NaiveDate,
        termination: Option<NaiveDate>,
    ) -> InsurancePolicy {
        let policy = InsurancePolicy {
            id: Uuid::new_v4(),
            patient_id,
            payer_name: format!("{} plan", payer_type.as_str()),
            payer_type,
            member_id: "M123456".into(),
            group_number: None,
            coverage_priority: priority,
            effective_date: effective,
            termination_date: termination,
            created_at: crate::db::now(),
        };
        super::insert_policy(conn, &policy).unwrap();
        policy
    }
}

#[cfg(test)]
mod tests {
    use super::test_policies::add_policy;
    use super::*;
    use crate::db::repository::test_support::{make_patient, test_db};
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn policies_listed_primary_first() {
        let conn = test_db();
        let p = make_patient(&conn, "MRN-I");
        add_policy(&conn, p.id, PayerType::Medicaid, CoveragePriority::Secondary, d(2024, 1, 1), None);
        add_policy(&conn, p.id, PayerType::Medicare, CoveragePriority::Primary, d(2023, 1, 1), None);

        let policies = list_policies_for_patient(&conn, &p.id).unwrap();
        assert_eq!(policies.len(), 2);
        assert_eq!(policies[0].payer_type, PayerType::Medicare);
        assert_eq!(policies[1].payer_type, PayerType::Medicaid);
    }

    #[test]
    fn eligibility_check_round_trip() {
        let conn = test_db();
        let p = make_patient(&conn, "MRN-E");
        let policy = add_policy(&conn, p.id, PayerType::Commercial, CoveragePriority::Primary, d(2024, 1, 1), None);
        insert_eligibility_check(&conn, &EligibilityCheck {
            id: Uuid::new_v4(),
            patient_id: p.id,
            policy_id: Some(policy.id),
            service_date: d(2024, 6, 1),
            status: EligibilityStatus::Eligible,
            dual_eligible: false,
            reason: "active policy".into(),
            checked_by: "billing".into(),
            checked_at: crate::db::now(),
        })
        .unwrap();

        let checks = list_eligibility_checks(&conn, &p.id).unwrap();
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].policy_id, Some(policy.id));
        assert_eq!(checks[0].status, EligibilityStatus::Eligible);
    }
}
