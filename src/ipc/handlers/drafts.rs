use crate::draft::{DraftKey, DraftStore, SectionKind};
use crate::ipc::helpers::{db_conn, opt_str, required_str, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::SqliteDraftStore;
use serde_json::{json, Value};

fn draft_key(params: &Value) -> Result<DraftKey, HandlerErr> {
    let kind_raw = required_str(params, "sectionKind")?;
    let kind = SectionKind::parse(&kind_raw)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown sectionKind: {}", kind_raw)))?;
    let faculty_id = opt_str(params, "facultyId")?;
    let subject_id = opt_str(params, "subjectId")?;
    Ok(DraftKey::new(faculty_id.as_deref(), subject_id.as_deref(), kind)?)
}

fn handle_drafts_load(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let key = draft_key(&req.params)?;
    let record = SqliteDraftStore::new(conn).load(&key)?;
    Ok(match record {
        Some(r) => json!({ "found": true, "data": r.data, "savedAt": r.saved_at }),
        None => json!({ "found": false, "data": null, "savedAt": null }),
    })
}

fn handle_drafts_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let key = draft_key(&req.params)?;
    SqliteDraftStore::new(conn).delete(&key)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "drafts.load" => handle_drafts_load(state, req),
        "drafts.delete" => handle_drafts_delete(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
