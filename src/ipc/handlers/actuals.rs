use crate::comparison::{build_comparison, resolve_document, ActualCie, DocumentKind, PlannedCieForm};
use crate::config::load_documents_setup;
use crate::ipc::helpers::{db_conn, opt_str, required_str, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::{now_ts, StorageLinkResolver};
use rusqlite::{Connection, OptionalExtension};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

fn load_form(conn: &Connection, form_id: &str) -> Result<PlannedCieForm, HandlerErr> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT form_json FROM cie_planning_forms WHERE id = ?",
            [form_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(HandlerErr::db_query)?;
    let Some(raw) = raw else {
        return Err(HandlerErr::new("not_found", "CIE planning form not found"));
    };
    serde_json::from_str(&raw)
        .map_err(|e| HandlerErr::new("store_failed", format!("stored CIE form is corrupt: {}", e)))
}

/// Actuals recorded against a form, ordered by CIE number. Unreadable rows
/// are skipped so one bad record cannot hide the others.
fn list_actuals(conn: &Connection, form_id: &str) -> Result<Vec<ActualCie>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT id, record_json FROM actual_cies WHERE form_id = ? ORDER BY cie_number",
        )
        .map_err(HandlerErr::db_query)?;
    let rows = stmt
        .query_map([form_id], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::db_query)?;
    let mut out = Vec::with_capacity(rows.len());
    for (id, raw) in rows {
        match serde_json::from_str::<ActualCie>(&raw) {
            Ok(a) => out.push(a),
            Err(e) => warn!(actual_id = %id, error = %e, "skipping unreadable actual CIE"),
        }
    }
    Ok(out)
}

fn handle_forms_save(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let id = opt_str(&req.params, "id")?.unwrap_or_else(|| Uuid::new_v4().to_string());
    let faculty_id = opt_str(&req.params, "facultyId")?;
    let subject_id = opt_str(&req.params, "subjectId")?;
    let raw = req
        .params
        .get("form")
        .cloned()
        .ok_or_else(|| HandlerErr::bad_params("missing form"))?;
    let form: PlannedCieForm =
        serde_json::from_value(raw).map_err(|e| HandlerErr::bad_params(format!("form: {}", e)))?;
    let form_json = serde_json::to_string(&form).map_err(HandlerErr::db_update)?;

    conn.execute(
        "INSERT INTO cie_planning_forms(id, faculty_id, subject_id, form_json, updated_at)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           faculty_id = excluded.faculty_id,
           subject_id = excluded.subject_id,
           form_json = excluded.form_json,
           updated_at = excluded.updated_at",
        (&id, &faculty_id, &subject_id, form_json, now_ts()),
    )
    .map_err(HandlerErr::db_update)?;
    Ok(json!({ "formId": id, "cieCount": form.cies.len() }))
}

fn handle_actuals_upsert(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let form_id = required_str(&req.params, "formId")?;
    load_form(conn, &form_id)?;

    let mut raw = req
        .params
        .get("actual")
        .filter(|v| v.is_object())
        .cloned()
        .ok_or_else(|| HandlerErr::bad_params("actual must be an object"))?;
    let has_id = raw
        .get("id")
        .and_then(|v| v.as_str())
        .is_some_and(|s| !s.trim().is_empty());
    if !has_id {
        raw["id"] = json!(Uuid::new_v4().to_string());
    }
    let actual: ActualCie =
        serde_json::from_value(raw).map_err(|e| HandlerErr::bad_params(format!("actual: {}", e)))?;
    if actual.cie_number < 1 {
        return Err(HandlerErr::bad_params("cie_number must be at least 1"));
    }
    let record = serde_json::to_string(&actual).map_err(HandlerErr::db_update)?;

    // Replaces both a row with the same id and one with the same CIE number.
    conn.execute(
        "INSERT OR REPLACE INTO actual_cies(id, form_id, cie_number, record_json, updated_at)
         VALUES(?, ?, ?, ?, ?)",
        (&actual.id, &form_id, actual.cie_number, record, now_ts()),
    )
    .map_err(HandlerErr::db_update)?;
    info!(form_id = %form_id, cie_number = actual.cie_number, "actual CIE recorded");
    Ok(json!({ "actualId": actual.id }))
}

fn handle_documents_register(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let path = required_str(&req.params, "path")?;
    let bucket = match opt_str(&req.params, "bucket")? {
        Some(b) => b,
        None => load_documents_setup(conn).bucket,
    };
    conn.execute(
        "INSERT INTO stored_documents(bucket, path, registered_at) VALUES(?, ?, ?)
         ON CONFLICT(bucket, path) DO UPDATE SET registered_at = excluded.registered_at",
        (&bucket, &path, now_ts()),
    )
    .map_err(HandlerErr::db_update)?;
    Ok(json!({ "bucket": bucket, "path": path }))
}

fn handle_actuals_compare(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let form_id = required_str(&req.params, "formId")?;
    let form = load_form(conn, &form_id)?;
    let actuals = list_actuals(conn, &form_id)?;
    let blocks = build_comparison(&form, &actuals);
    Ok(json!({
        "formId": form_id,
        "plannedCount": form.cies.len(),
        "actualCount": actuals.len(),
        "blocks": blocks,
    }))
}

fn handle_documents_resolve(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let actual_id = required_str(&req.params, "actualId")?;
    let kind_raw = required_str(&req.params, "document")?;
    let kind = DocumentKind::parse(&kind_raw).ok_or_else(|| {
        HandlerErr::bad_params(
            "document must be one of: marks_display, question_paper, evaluation_analysis",
        )
    })?;

    let raw: Option<String> = conn
        .query_row(
            "SELECT record_json FROM actual_cies WHERE id = ?",
            [&actual_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(HandlerErr::db_query)?;
    let Some(raw) = raw else {
        return Err(HandlerErr::new("not_found", "actual CIE not found"));
    };
    let actual: ActualCie = serde_json::from_str(&raw)
        .map_err(|e| HandlerErr::new("store_failed", format!("stored actual CIE is corrupt: {}", e)))?;

    let resolver = StorageLinkResolver::new(conn, load_documents_setup(conn));
    let link = resolve_document(&resolver, kind.path_in(&actual), kind.label());
    Ok(json!({
        "actualId": actual_id,
        "document": kind.key(),
        "label": kind.label(),
        "link": link,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "cie.forms.save" => handle_forms_save(state, req),
        "actuals.upsert" => handle_actuals_upsert(state, req),
        "documents.register" => handle_documents_register(state, req),
        "actuals.compare" => handle_actuals_compare(state, req),
        "actuals.documents.resolve" => handle_documents_resolve(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
