use crate::catalog::OutcomeItem;
use crate::ipc::helpers::{
    db_conn, opt_bool, opt_str, required_array, required_str, respond, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::store::now_ts;
use crate::weeks::parse_term_date;
use rusqlite::{Connection, OptionalExtension};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

fn ensure_subject_exists(conn: &Connection, subject_id: &str) -> Result<(), HandlerErr> {
    let exists = conn
        .query_row("SELECT 1 FROM subjects WHERE id = ?", [subject_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()
        .map_err(HandlerErr::db_query)?;
    match exists {
        Some(_) => Ok(()),
        None => Err(HandlerErr::new("not_found", "subject not found")),
    }
}

fn term_date(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    let Some(raw) = opt_str(params, key)? else {
        return Ok(None);
    };
    if parse_term_date(&raw).is_none() {
        return Err(HandlerErr::bad_params(format!("{} must be dd-mm-yyyy", key)));
    }
    Ok(Some(raw))
}

fn handle_subjects_upsert(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let p = &req.params;
    let id = opt_str(p, "id")?.unwrap_or_else(|| Uuid::new_v4().to_string());
    let code = required_str(p, "code")?;
    let name = required_str(p, "name")?;
    let department_id = opt_str(p, "departmentId")?;
    let is_theory = opt_bool(p, "isTheory")?.unwrap_or(true);
    let is_practical = opt_bool(p, "isPractical")?.unwrap_or(false);
    let term_start = term_date(p, "termStartDate")?;
    let term_end = term_date(p, "termEndDate")?;

    conn.execute(
        "INSERT INTO subjects(id, code, name, department_id, is_theory, is_practical, term_start_date, term_end_date, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           code = excluded.code,
           name = excluded.name,
           department_id = excluded.department_id,
           is_theory = excluded.is_theory,
           is_practical = excluded.is_practical,
           term_start_date = excluded.term_start_date,
           term_end_date = excluded.term_end_date,
           updated_at = excluded.updated_at",
        (
            &id,
            &code,
            &name,
            &department_id,
            is_theory as i64,
            is_practical as i64,
            &term_start,
            &term_end,
            now_ts(),
        ),
    )
    .map_err(HandlerErr::db_update)?;
    info!(subject_id = %id, code = %code, "subject upserted");
    Ok(json!({ "subjectId": id }))
}

fn handle_units_set(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let subject_id = required_str(&req.params, "subjectId")?;
    ensure_subject_exists(conn, &subject_id)?;

    let mut units = Vec::new();
    for (i, raw) in required_array(&req.params, "units")?.iter().enumerate() {
        let id = opt_str(raw, "id")?.unwrap_or_else(|| Uuid::new_v4().to_string());
        let name = raw
            .get("name")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| HandlerErr::bad_params(format!("units[{}].name must be string", i)))?;
        units.push((id, name));
    }

    let tx = conn.unchecked_transaction().map_err(HandlerErr::db_update)?;
    tx.execute("DELETE FROM subject_units WHERE subject_id = ?", [&subject_id])
        .map_err(HandlerErr::db_update)?;
    for (i, (id, name)) in units.iter().enumerate() {
        tx.execute(
            "INSERT INTO subject_units(id, subject_id, sort_order, unit_name) VALUES(?, ?, ?, ?)",
            (id, &subject_id, i as i64, name),
        )
        .map_err(HandlerErr::db_update)?;
    }
    tx.commit().map_err(HandlerErr::db_update)?;

    Ok(json!({
        "units": units
            .iter()
            .map(|(id, name)| json!({ "id": id, "name": name }))
            .collect::<Vec<_>>()
    }))
}

fn handle_outcomes_set(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let subject_id = required_str(&req.params, "subjectId")?;
    ensure_subject_exists(conn, &subject_id)?;

    let mut outcomes = Vec::new();
    for (i, raw) in required_array(&req.params, "outcomes")?.iter().enumerate() {
        outcomes.push(OutcomeItem {
            id: opt_str(raw, "id")?.unwrap_or_else(|| Uuid::new_v4().to_string()),
            label: opt_str(raw, "label")?,
            description: raw
                .get("description")
                .and_then(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .ok_or_else(|| {
                    HandlerErr::bad_params(format!("outcomes[{}].description must be string", i))
                })?,
        });
    }

    let tx = conn.unchecked_transaction().map_err(HandlerErr::db_update)?;
    tx.execute(
        "DELETE FROM subject_course_outcomes WHERE subject_id = ?",
        [&subject_id],
    )
    .map_err(HandlerErr::db_update)?;
    for (i, o) in outcomes.iter().enumerate() {
        tx.execute(
            "INSERT INTO subject_course_outcomes(id, subject_id, sort_order, label, description)
             VALUES(?, ?, ?, ?, ?)",
            (&o.id, &subject_id, i as i64, &o.label, &o.description),
        )
        .map_err(HandlerErr::db_update)?;
    }
    tx.commit().map_err(HandlerErr::db_update)?;
    Ok(json!({ "outcomes": outcomes }))
}

/// `null` or absent clears a list so readers use the defaults.
fn outcome_list_json(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => {
            let items: Vec<OutcomeItem> = serde_json::from_value(v.clone())
                .map_err(|e| HandlerErr::bad_params(format!("{}: {}", key, e)))?;
            serde_json::to_string(&items)
                .map(Some)
                .map_err(|e| HandlerErr::bad_params(e.to_string()))
        }
    }
}

fn handle_pso_peo_set(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let department_id = required_str(&req.params, "departmentId")?;
    let pso = outcome_list_json(&req.params, "pso")?;
    let peo = outcome_list_json(&req.params, "peo")?;
    conn.execute(
        "INSERT INTO department_pso_peo(department_id, pso_json, peo_json, updated_at)
         VALUES(?, ?, ?, ?)
         ON CONFLICT(department_id) DO UPDATE SET
           pso_json = excluded.pso_json,
           peo_json = excluded.peo_json,
           updated_at = excluded.updated_at",
        (&department_id, &pso, &peo, now_ts()),
    )
    .map_err(HandlerErr::db_update)?;
    Ok(json!({ "departmentId": department_id }))
}

fn handle_faculty_upsert(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let id = required_str(&req.params, "id")?;
    let first = opt_str(&req.params, "firstName")?.unwrap_or_default();
    let last = opt_str(&req.params, "lastName")?.unwrap_or_default();
    conn.execute(
        "INSERT INTO faculty(id, first_name, last_name, updated_at) VALUES(?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           first_name = excluded.first_name,
           last_name = excluded.last_name,
           updated_at = excluded.updated_at",
        (&id, &first, &last, now_ts()),
    )
    .map_err(HandlerErr::db_update)?;
    Ok(json!({ "facultyId": id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "subjects.upsert" => handle_subjects_upsert(state, req),
        "subjects.units.set" => handle_units_set(state, req),
        "subjects.outcomes.set" => handle_outcomes_set(state, req),
        "departments.psoPeo.set" => handle_pso_peo_set(state, req),
        "faculty.upsert" => handle_faculty_upsert(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
