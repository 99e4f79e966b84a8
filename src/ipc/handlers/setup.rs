use crate::config::{self, SetupSection};
use crate::ipc::helpers::{db_conn, required_str, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Map, Value};
use tracing::info;

fn handle_setup_get(state: &mut AppState, _req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let mut out = Map::new();
    for section in SetupSection::ALL {
        let value = config::load_section(conn, section).map_err(HandlerErr::db_query)?;
        out.insert(section.name().to_string(), value);
    }
    Ok(Value::Object(out))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let section_raw = required_str(&req.params, "section")?;
    let section = SetupSection::parse(&section_raw)
        .ok_or_else(|| HandlerErr::bad_params("unknown section"))?;
    let patch_obj = req
        .params
        .get("patch")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerErr::bad_params("patch must be an object"))?;

    let mut current = config::load_section(conn, section).map_err(HandlerErr::db_query)?;
    config::merge_section_patch(section, &mut current, patch_obj).map_err(HandlerErr::bad_params)?;
    config::save_section(conn, section, &current).map_err(HandlerErr::db_update)?;
    info!(section = section.name(), "setup updated");
    Ok(json!({ "ok": true, "section": current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "setup.get" => handle_setup_get(state, req),
        "setup.update" => handle_setup_update(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
