use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "labplanner.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS workspace_settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS faculty(
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            department_id TEXT,
            is_theory INTEGER NOT NULL DEFAULT 1,
            is_practical INTEGER NOT NULL DEFAULT 0,
            term_start_date TEXT,
            term_end_date TEXT,
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subject_units(
            id TEXT PRIMARY KEY,
            subject_id TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            unit_name TEXT NOT NULL,
            FOREIGN KEY(subject_id) REFERENCES subjects(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subject_units_subject_sort ON subject_units(subject_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subject_course_outcomes(
            id TEXT PRIMARY KEY,
            subject_id TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            label TEXT,
            description TEXT NOT NULL,
            FOREIGN KEY(subject_id) REFERENCES subjects(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subject_course_outcomes_subject ON subject_course_outcomes(subject_id, sort_order)",
        [],
    )?;

    // Either list may be NULL; readers fall back to the built-in defaults.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS department_pso_peo(
            department_id TEXT PRIMARY KEY,
            pso_json TEXT,
            peo_json TEXT,
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS form_drafts(
            faculty_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            form_type TEXT NOT NULL,
            form_data TEXT NOT NULL,
            saved_at TEXT,
            PRIMARY KEY(faculty_id, subject_id, form_type)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS practical_planning_forms(
            faculty_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            practicals_json TEXT NOT NULL,
            remarks TEXT NOT NULL DEFAULT '',
            submitted_at TEXT NOT NULL,
            PRIMARY KEY(faculty_id, subject_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS cie_planning_forms(
            id TEXT PRIMARY KEY,
            faculty_id TEXT,
            subject_id TEXT,
            form_json TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS actual_cies(
            id TEXT PRIMARY KEY,
            form_id TEXT NOT NULL,
            cie_number INTEGER NOT NULL,
            record_json TEXT NOT NULL,
            updated_at TEXT,
            FOREIGN KEY(form_id) REFERENCES cie_planning_forms(id),
            UNIQUE(form_id, cie_number)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_actual_cies_form ON actual_cies(form_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS stored_documents(
            bucket TEXT NOT NULL,
            path TEXT NOT NULL,
            registered_at TEXT NOT NULL,
            PRIMARY KEY(bucket, path)
        )",
        [],
    )?;

    Ok(conn)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM workspace_settings WHERE key = ?",
            [key],
            |row| row.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    let raw = serde_json::to_string(value)?;
    conn.execute(
        "INSERT INTO workspace_settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, raw),
    )?;
    Ok(())
}
