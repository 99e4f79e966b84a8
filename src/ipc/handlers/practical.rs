use crate::catalog::{load_pso_peo, ReferenceCatalogues, UnitCatalogue};
use crate::config::load_practical_setup;
use crate::draft::ReconcileOutcome;
use crate::ipc::helpers::{
    db_conn, opt_bool, opt_str, required_index, required_str, respond, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::practical::{
    normalize_item, SubjectFlags, BLOOMS_OPTIONS, EVALUATION_METHOD_OPTIONS,
    PRACTICAL_PEDAGOGY_OPTIONS, SKILL_MAPPING_OPTIONS,
};
use crate::section::{SectionController, SectionIdentity, SectionState};
use crate::store::{SqliteCatalogues, SqliteDraftStore, SqlitePermanentStore};
use crate::weeks::generate_week_options;
use rusqlite::Connection;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

fn mounted<'a>(
    state: &'a mut AppState,
    params: &Value,
) -> Result<(&'a Connection, String, &'a mut SectionController), HandlerErr> {
    let section_id = required_str(params, "sectionId")?;
    let AppState { db, sections, .. } = state;
    let conn = db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))?;
    let section = sections
        .get_mut(&section_id)
        .ok_or_else(|| HandlerErr::new("not_found", "section not mounted"))?;
    Ok((conn, section_id, section))
}

fn section_view(section_id: &str, section: &mut SectionController) -> Value {
    json!({
        "sectionId": section_id,
        "snapshot": section.snapshot(),
        "notices": section.take_notices(),
    })
}

/// Controller failures still carry the snapshot and any queued notices.
fn section_failure(
    section_id: &str,
    section: &mut SectionController,
    e: crate::error::SectionError,
) -> HandlerErr {
    HandlerErr::from(e).with_details(section_view(section_id, section))
}

fn with_view(mut view: Value, key: &str, extra: Value) -> Value {
    if let Some(obj) = view.as_object_mut() {
        obj.insert(key.to_string(), extra);
    }
    view
}

fn subject_flags(catalogues: &dyn ReferenceCatalogues, subject_id: Option<&str>) -> SubjectFlags {
    let Some(subject_id) = subject_id else {
        return SubjectFlags::default();
    };
    match catalogues.subject(subject_id) {
        Ok(Some(s)) => s.flags,
        Ok(None) => SubjectFlags::default(),
        Err(e) => {
            warn!(subject_id, error = %e, "subject lookup failed");
            SubjectFlags::default()
        }
    }
}

fn subject_units(catalogues: &dyn ReferenceCatalogues, subject_id: Option<&str>) -> UnitCatalogue {
    let Some(subject_id) = subject_id else {
        return UnitCatalogue::default();
    };
    catalogues.units(subject_id).unwrap_or_else(|e| {
        warn!(subject_id, error = %e, "unit catalogue unavailable");
        UnitCatalogue::default()
    })
}

/// Stamps the faculty's display name only when their row is found; a failed
/// or empty lookup leaves the practicals as reconciliation left them.
fn stamp_faculty(catalogues: &dyn ReferenceCatalogues, section: &mut SectionController) {
    let Some(id) = section.identity().effective_faculty_id().map(str::to_string) else {
        return;
    };
    match catalogues.faculty_name(&id) {
        Ok(Some(name)) => section.stamp_faculty_name(&name),
        Ok(None) => debug!(faculty_id = %id, "faculty not found; name left as loaded"),
        Err(e) => warn!(faculty_id = %id, error = %e, "faculty name lookup failed"),
    }
}

fn handle_catalogue(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let subject_id = required_str(&req.params, "subjectId")?;
    let catalogues = SqliteCatalogues::new(conn);
    let setup = load_practical_setup(conn);
    let mut notices = Vec::new();

    let subject = catalogues.subject(&subject_id).map_err(HandlerErr::from)?;
    let units = catalogues.units(&subject_id).unwrap_or_else(|e| {
        warn!(subject_id = %subject_id, error = %e, "unit catalogue unavailable");
        notices.push(json!({ "level": "error", "message": "Failed to load units" }));
        UnitCatalogue::default()
    });
    let course_outcomes = catalogues.course_outcomes(&subject_id).unwrap_or_else(|e| {
        warn!(subject_id = %subject_id, error = %e, "course outcomes unavailable");
        notices.push(json!({ "level": "error", "message": "Failed to load course outcomes" }));
        Vec::new()
    });
    let pso_peo = load_pso_peo(&catalogues, &subject_id);
    if let Some(msg) = &pso_peo.fallback {
        notices.push(json!({ "level": "warning", "message": msg }));
    }
    let weeks = subject
        .as_ref()
        .and_then(|s| Some((s.term_start_date.as_deref()?, s.term_end_date.as_deref()?)))
        .map(|(start, end)| generate_week_options(start, end, setup.max_weeks))
        .unwrap_or_default();

    Ok(json!({
        "subject": subject.as_ref().map(|s| json!({
            "id": s.id,
            "code": s.code,
            "name": s.name,
            "departmentId": s.department_id,
            "isTheory": s.flags.is_theory,
            "isPractical": s.flags.is_practical,
            "practicalOnly": s.flags.practical_only(),
            "termStartDate": s.term_start_date,
            "termEndDate": s.term_end_date,
        })),
        "units": units.units(),
        "courseOutcomes": course_outcomes,
        "psoPeo": pso_peo,
        "weeks": weeks,
        "options": {
            "practicalPedagogy": PRACTICAL_PEDAGOGY_OPTIONS,
            "evaluationMethods": EVALUATION_METHOD_OPTIONS,
            "bloomsTaxonomy": BLOOMS_OPTIONS,
            "skillMapping": SKILL_MAPPING_OPTIONS,
        },
        "defaultLabHours": setup.default_lab_hours,
        "notices": notices,
    }))
}

fn handle_mount(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let p = &req.params;
    let identity = SectionIdentity {
        faculty_id: opt_str(p, "facultyId")?,
        user_id: opt_str(p, "userId")?,
        subject_id: opt_str(p, "subjectId")?,
    };
    let remarks = opt_str(p, "remarks")?.unwrap_or_default();

    let AppState { db, sections, .. } = state;
    let conn = db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))?;
    let setup = load_practical_setup(conn);
    let initial = match p.get("practicals") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(arr)) => arr
            .iter()
            .enumerate()
            .map(|(i, raw)| normalize_item(raw, i, setup.default_lab_hours))
            .collect(),
        Some(_) => return Err(HandlerErr::bad_params("practicals must be an array")),
    };

    let catalogues = SqliteCatalogues::new(conn);
    let subject_id = identity.subject_id.clone();
    let flags = subject_flags(&catalogues, subject_id.as_deref());
    let units = subject_units(&catalogues, subject_id.as_deref());

    let mut section = SectionController::new(
        identity,
        flags,
        setup.section_settings(),
        initial,
        remarks,
    );
    let outcome = section
        .reconcile(&SqliteDraftStore::new(conn), &units)
        .map_err(HandlerErr::from)?;
    stamp_faculty(&catalogues, &mut section);

    let section_id = Uuid::new_v4().to_string();
    info!(section_id = %section_id, outcome = outcome.label(), "practical section mounted");
    let view = section_view(&section_id, &mut section);
    sections.insert(section_id, section);
    Ok(with_view(view, "outcome", json!(outcome.label())))
}

fn handle_reconcile(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let reset = opt_bool(&req.params, "reset")?.unwrap_or(false);
    let (conn, section_id, section) = mounted(state, &req.params)?;
    if reset {
        section.reset_draft_decision();
    }
    let catalogues = SqliteCatalogues::new(conn);
    let units = subject_units(&catalogues, section.identity().subject_id.as_deref());
    let outcome = match section.reconcile(&SqliteDraftStore::new(conn), &units) {
        Ok(o) => o,
        Err(e) => return Err(section_failure(&section_id, section, e)),
    };
    if matches!(outcome, ReconcileOutcome::Loaded(_)) {
        stamp_faculty(&catalogues, section);
    }
    Ok(with_view(
        section_view(&section_id, section),
        "outcome",
        json!(outcome.label()),
    ))
}

fn handle_snapshot(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let (_, section_id, section) = mounted(state, &req.params)?;
    Ok(section_view(&section_id, section))
}

fn handle_set_active(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let index = required_index(&req.params, "index")?;
    let (_, section_id, section) = mounted(state, &req.params)?;
    if !section.set_active_item(index) {
        let len = section.items().len();
        return Err(HandlerErr::bad_params(format!(
            "index {} out of range (len {})",
            index, len
        )));
    }
    Ok(section_view(&section_id, section))
}

fn handle_update_field(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let index = required_index(&req.params, "index")?;
    let field = required_str(&req.params, "field")?;
    let value = req.params.get("value").cloned().unwrap_or(Value::Null);
    let (_, section_id, section) = mounted(state, &req.params)?;
    if let Err(e) = section.update_field(index, &field, &value) {
        return Err(section_failure(&section_id, section, e));
    }
    debug!(section_id = %section_id, index, field = %field, active = section.active_index(), "practical field updated");
    Ok(section_view(&section_id, section))
}

fn handle_add_item(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let (_, section_id, section) = mounted(state, &req.params)?;
    let index = section.add_item();
    Ok(with_view(section_view(&section_id, section), "index", json!(index)))
}

fn handle_remove_item(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let index = required_index(&req.params, "index")?;
    let (_, section_id, section) = mounted(state, &req.params)?;
    match section.remove_item(index) {
        Ok(removed) => Ok(with_view(
            section_view(&section_id, section),
            "removed",
            json!(removed),
        )),
        Err(e) => Err(section_failure(&section_id, section, e)),
    }
}

fn handle_set_remarks(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let remarks = match req.params.get("remarks") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(HandlerErr::bad_params("remarks must be string")),
    };
    let (_, section_id, section) = mounted(state, &req.params)?;
    section.set_remarks(remarks);
    Ok(section_view(&section_id, section))
}

fn handle_validate(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let (_, section_id, section) = mounted(state, &req.params)?;
    if let Err(e) = section.validate_active_item() {
        return Err(section_failure(&section_id, section, e));
    }
    let valid = section.errors().is_empty();
    Ok(with_view(section_view(&section_id, section), "valid", json!(valid)))
}

fn handle_save_draft(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let (conn, section_id, section) = mounted(state, &req.params)?;
    if let Err(e) = section.save_draft(&SqliteDraftStore::new(conn)) {
        return Err(section_failure(&section_id, section, e));
    }
    Ok(section_view(&section_id, section))
}

fn handle_submit(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let (conn, section_id, section) = mounted(state, &req.params)?;
    let permanent = SqlitePermanentStore::new(conn);
    let drafts = SqliteDraftStore::new(conn);
    if let Err(e) = section.submit(&permanent, &drafts) {
        return Err(section_failure(&section_id, section, e));
    }
    Ok(section_view(&section_id, section))
}

fn handle_unmount(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let section_id = required_str(&req.params, "sectionId")?;
    let removed = state.sections.remove(&section_id);
    if let Some(section) = &removed {
        if section.state() != SectionState::Completed && section.last_saved().is_none() {
            warn!(section_id = %section_id, "section unmounted with unsaved edits");
        }
    }
    Ok(json!({ "sectionId": section_id, "removed": removed.is_some() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "practical.catalogue" => handle_catalogue(state, req),
        "practical.mount" => handle_mount(state, req),
        "practical.reconcile" => handle_reconcile(state, req),
        "practical.snapshot" => handle_snapshot(state, req),
        "practical.setActive" => handle_set_active(state, req),
        "practical.updateField" => handle_update_field(state, req),
        "practical.addItem" => handle_add_item(state, req),
        "practical.removeItem" => handle_remove_item(state, req),
        "practical.setRemarks" => handle_set_remarks(state, req),
        "practical.validate" => handle_validate(state, req),
        "practical.saveDraft" => handle_save_draft(state, req),
        "practical.submit" => handle_submit(state, req),
        "practical.unmount" => handle_unmount(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
