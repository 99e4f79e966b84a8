mod test_support;

use serde_json::json;
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};
use test_support::{
    complete_practical, error_code, notice_messages, request_err, request_ok, spawn_sidecar,
    temp_dir,
};

fn open_section(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    prefix: &str,
    practical_only: bool,
    practicals: serde_json::Value,
) -> String {
    let workspace = temp_dir(prefix);
    let _ = request_ok(
        stdin,
        reader,
        "w",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "s",
        "subjects.upsert",
        json!({
            "id": "sub-1",
            "code": "CS310",
            "name": "Systems Lab",
            "isTheory": !practical_only,
            "isPractical": true
        }),
    );
    let mounted = request_ok(
        stdin,
        reader,
        "m",
        "practical.mount",
        json!({ "facultyId": "fac-1", "subjectId": "sub-1", "practicals": practicals }),
    );
    mounted["sectionId"].as_str().expect("sectionId").to_string()
}

#[test]
fn add_and_remove_keep_a_valid_active_index() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let section_id = open_section(&mut stdin, &mut reader, "labplannerd-edit-add", false, json!(null));

    let added = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "practical.addItem",
        json!({ "sectionId": section_id }),
    );
    assert_eq!(added["index"], json!(1));
    assert_eq!(added["snapshot"]["activeIndex"], json!(1));
    assert_eq!(added["snapshot"]["practicals"][1]["id"], json!("practical2"));
    assert_eq!(added["snapshot"]["practicals"][1]["lab_hours"], json!(2));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "practical.addItem",
        json!({ "sectionId": section_id }),
    );
    let removed = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "practical.removeItem",
        json!({ "sectionId": section_id, "index": 0 }),
    );
    assert_eq!(removed["removed"], json!(true));
    assert_eq!(removed["snapshot"]["activeIndex"], json!(1));

    let added_again = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "practical.addItem",
        json!({ "sectionId": section_id }),
    );
    // practical2 and practical3 remain, so the next id skips ahead.
    assert_eq!(added_again["snapshot"]["practicals"][2]["id"], json!("practical4"));

    for id in ["5", "6"] {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            id,
            "practical.removeItem",
            json!({ "sectionId": section_id, "index": 0 }),
        );
    }
    let last = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "practical.removeItem",
        json!({ "sectionId": section_id, "index": 0 }),
    );
    assert_eq!(last["removed"], json!(false));
    assert_eq!(last["snapshot"]["practicals"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(
        notice_messages(&last),
        vec!["At least one practical is required".to_string()]
    );
}

#[test]
fn field_updates_are_type_checked() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let section_id = open_section(&mut stdin, &mut reader, "labplannerd-edit-fields", false, json!(null));

    let unknown = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "practical.updateField",
        json!({ "sectionId": section_id, "index": 0, "field": "colour", "value": "red" }),
    );
    assert_eq!(error_code(&unknown), "bad_params");

    let wrong_type = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "practical.updateField",
        json!({ "sectionId": section_id, "index": 0, "field": "co_mapping", "value": "co-1" }),
    );
    assert_eq!(error_code(&wrong_type), "bad_params");

    let out_of_range = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "practical.updateField",
        json!({ "sectionId": section_id, "index": 4, "field": "practical_aim", "value": "x" }),
    );
    assert_eq!(error_code(&out_of_range), "bad_params");
    assert!(out_of_range["details"]["snapshot"].is_object());

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "practical.updateField",
        json!({ "sectionId": section_id, "index": 0, "field": "lab_hours", "value": 0 }),
    );
    assert_eq!(updated["snapshot"]["practicals"][0]["lab_hours"], json!(0));
    assert_eq!(
        updated["snapshot"]["errors"]["lab_hours"],
        json!("Lab hours must be at least 1")
    );
}

#[test]
fn submit_blocks_on_validation_errors_without_storing() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let section_id = open_section(&mut stdin, &mut reader, "labplannerd-edit-submit", false, json!(null));

    let error = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "practical.submit",
        json!({ "sectionId": section_id }),
    );
    assert_eq!(error_code(&error), "validation_failed");
    let details = &error["details"];
    assert_eq!(details["snapshot"]["state"], json!("ready"));
    assert_eq!(
        details["snapshot"]["errors"]["practical_aim"],
        json!("Practical aim is required")
    );
    assert_eq!(
        details["snapshot"]["errors"]["associated_units"],
        json!("Associated units are required")
    );
    assert_eq!(
        notice_messages(details),
        vec!["Please fix validation errors before saving".to_string()]
    );
}

#[test]
fn practical_only_subjects_do_not_require_units() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let mut item = complete_practical("practical1", "u1");
    item["associated_units"] = json!([]);
    let section_id = open_section(
        &mut stdin,
        &mut reader,
        "labplannerd-edit-practical-only",
        true,
        json!([item]),
    );

    let validated = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "practical.validate",
        json!({ "sectionId": section_id }),
    );
    assert_eq!(validated["valid"], json!(true));
    assert_eq!(validated["snapshot"]["practicalOnly"], json!(true));

    let submitted = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "practical.submit",
        json!({ "sectionId": section_id }),
    );
    assert_eq!(submitted["snapshot"]["state"], json!("completed"));

    // Editing after submission reopens the section.
    let reopened = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "practical.setRemarks",
        json!({ "sectionId": section_id, "remarks": "revised" }),
    );
    assert_eq!(reopened["snapshot"]["state"], json!("ready"));
}

#[test]
fn switching_items_clears_field_errors() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let section_id = open_section(&mut stdin, &mut reader, "labplannerd-edit-switch", false, json!(null));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "practical.addItem",
        json!({ "sectionId": section_id }),
    );
    let validated = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "practical.validate",
        json!({ "sectionId": section_id }),
    );
    assert_eq!(validated["valid"], json!(false));

    let switched = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "practical.setActive",
        json!({ "sectionId": section_id, "index": 0 }),
    );
    assert_eq!(switched["snapshot"]["activeIndex"], json!(0));
    assert_eq!(switched["snapshot"]["errors"], json!({}));

    let bad = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "practical.setActive",
        json!({ "sectionId": section_id, "index": 9 }),
    );
    assert_eq!(error_code(&bad), "bad_params");
}
