//! SQLite-backed collaborators. Each borrows the workspace connection for the
//! duration of one request.

use crate::catalog::{OutcomeItem, ReferenceCatalogues, StoredPsoPeo, SubjectInfo, UnitCatalogue, UnitRef};
use crate::comparison::DocumentLinkResolver;
use crate::config::DocumentsSetup;
use crate::draft::{DraftKey, DraftRecord, DraftStore, PermanentStore, PracticalSubmission};
use crate::error::StoreError;
use crate::practical::SubjectFlags;
use rusqlite::{Connection, OptionalExtension};
use serde_json::Value as JsonValue;
use tracing::{debug, info};

pub fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub struct SqliteDraftStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteDraftStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl DraftStore for SqliteDraftStore<'_> {
    fn load(&self, key: &DraftKey) -> Result<Option<DraftRecord>, StoreError> {
        let row: Option<(String, Option<String>)> = self
            .conn
            .query_row(
                "SELECT form_data, saved_at FROM form_drafts
                 WHERE faculty_id = ? AND subject_id = ? AND form_type = ?",
                (&key.faculty_id, &key.subject_id, key.kind.as_str()),
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        let Some((raw, saved_at)) = row else {
            return Ok(None);
        };
        let data: JsonValue = serde_json::from_str(&raw)?;
        Ok(Some(DraftRecord { data, saved_at }))
    }

    fn save(&self, key: &DraftKey, payload: &JsonValue) -> Result<(), StoreError> {
        let saved_at = payload
            .get("savedAt")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(now_ts);
        let raw = serde_json::to_string(payload)?;
        self.conn.execute(
            "INSERT INTO form_drafts(faculty_id, subject_id, form_type, form_data, saved_at)
             VALUES(?, ?, ?, ?, ?)
             ON CONFLICT(faculty_id, subject_id, form_type) DO UPDATE SET
               form_data = excluded.form_data,
               saved_at = excluded.saved_at",
            (&key.faculty_id, &key.subject_id, key.kind.as_str(), raw, saved_at),
        )?;
        debug!(faculty_id = %key.faculty_id, subject_id = %key.subject_id, kind = key.kind.as_str(), "draft written");
        Ok(())
    }

    fn delete(&self, key: &DraftKey) -> Result<(), StoreError> {
        self.conn.execute(
            "DELETE FROM form_drafts WHERE faculty_id = ? AND subject_id = ? AND form_type = ?",
            (&key.faculty_id, &key.subject_id, key.kind.as_str()),
        )?;
        Ok(())
    }
}

pub struct SqlitePermanentStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqlitePermanentStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl PermanentStore for SqlitePermanentStore<'_> {
    fn submit_practicals(&self, submission: &PracticalSubmission) -> Result<(), StoreError> {
        let subject_known: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM subjects WHERE id = ?",
                [&submission.subject_id],
                |r| r.get(0),
            )
            .optional()?;
        if subject_known.is_none() {
            return Err(StoreError::NotFound(format!("subject {}", submission.subject_id)));
        }
        let practicals = serde_json::to_string(&submission.practicals)?;
        self.conn.execute(
            "INSERT INTO practical_planning_forms(faculty_id, subject_id, practicals_json, remarks, submitted_at)
             VALUES(?, ?, ?, ?, ?)
             ON CONFLICT(faculty_id, subject_id) DO UPDATE SET
               practicals_json = excluded.practicals_json,
               remarks = excluded.remarks,
               submitted_at = excluded.submitted_at",
            (
                &submission.faculty_id,
                &submission.subject_id,
                practicals,
                &submission.remarks,
                now_ts(),
            ),
        )?;
        info!(
            faculty_id = %submission.faculty_id,
            subject_id = %submission.subject_id,
            count = submission.practicals.len(),
            "practical plan stored"
        );
        Ok(())
    }
}

pub struct SqliteCatalogues<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteCatalogues<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

fn parse_outcome_list(raw: Option<String>) -> Result<Option<Vec<OutcomeItem>>, StoreError> {
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

impl ReferenceCatalogues for SqliteCatalogues<'_> {
    fn subject(&self, subject_id: &str) -> Result<Option<SubjectInfo>, StoreError> {
        let info = self
            .conn
            .query_row(
                "SELECT id, code, name, department_id, is_theory, is_practical, term_start_date, term_end_date
                 FROM subjects WHERE id = ?",
                [subject_id],
                |r| {
                    Ok(SubjectInfo {
                        id: r.get(0)?,
                        code: r.get(1)?,
                        name: r.get(2)?,
                        department_id: r.get(3)?,
                        flags: SubjectFlags {
                            is_theory: r.get::<_, i64>(4)? != 0,
                            is_practical: r.get::<_, i64>(5)? != 0,
                        },
                        term_start_date: r.get(6)?,
                        term_end_date: r.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(info)
    }

    fn units(&self, subject_id: &str) -> Result<UnitCatalogue, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, unit_name FROM subject_units WHERE subject_id = ? ORDER BY sort_order",
        )?;
        let units = stmt
            .query_map([subject_id], |r| {
                Ok(UnitRef {
                    id: r.get(0)?,
                    name: r.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(UnitCatalogue::new(units))
    }

    fn course_outcomes(&self, subject_id: &str) -> Result<Vec<OutcomeItem>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, label, description FROM subject_course_outcomes
             WHERE subject_id = ? ORDER BY sort_order",
        )?;
        let outcomes = stmt
            .query_map([subject_id], |r| {
                Ok(OutcomeItem {
                    id: r.get(0)?,
                    label: r.get(1)?,
                    description: r.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(outcomes)
    }

    fn department_pso_peo(&self, department_id: &str) -> Result<Option<StoredPsoPeo>, StoreError> {
        let row: Option<(Option<String>, Option<String>)> = self
            .conn
            .query_row(
                "SELECT pso_json, peo_json FROM department_pso_peo WHERE department_id = ?",
                [department_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        let Some((pso, peo)) = row else {
            return Ok(None);
        };
        Ok(Some(StoredPsoPeo {
            pso: parse_outcome_list(pso)?,
            peo: parse_outcome_list(peo)?,
        }))
    }

    fn faculty_name(&self, faculty_id: &str) -> Result<Option<String>, StoreError> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT first_name, last_name FROM faculty WHERE id = ?",
                [faculty_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        Ok(row.map(|(first, last)| format!("{} {}", first.trim(), last.trim()).trim().to_string()))
    }
}

/// Public links for files in the configured bucket. A path resolves only if
/// it was registered and a public base URL is configured.
pub struct StorageLinkResolver<'a> {
    conn: &'a Connection,
    setup: DocumentsSetup,
}

impl<'a> StorageLinkResolver<'a> {
    pub fn new(conn: &'a Connection, setup: DocumentsSetup) -> Self {
        Self { conn, setup }
    }
}

impl DocumentLinkResolver for StorageLinkResolver<'_> {
    fn public_url(&self, path: &str) -> Result<Option<String>, StoreError> {
        let Some(base) = self.setup.public_base_url.as_deref() else {
            return Ok(None);
        };
        let registered: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM stored_documents WHERE bucket = ? AND path = ?",
                (&self.setup.bucket, path),
                |r| r.get(0),
            )
            .optional()?;
        if registered.is_none() {
            return Ok(None);
        }
        Ok(Some(format!(
            "{}/{}/{}",
            base.trim_end_matches('/'),
            self.setup.bucket,
            path.trim_start_matches('/')
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::draft::SectionKind;
    use serde_json::json;

    fn temp_conn(prefix: &str) -> (std::path::PathBuf, Connection) {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let ws = std::env::temp_dir().join(format!("{}-{}", prefix, nanos));
        let conn = db::open_db(&ws).expect("open db");
        (ws, conn)
    }

    fn key() -> DraftKey {
        DraftKey::new(Some("f1"), Some("s1"), SectionKind::PracticalPlanning).expect("key")
    }

    #[test]
    fn draft_upsert_is_last_write_wins() {
        let (ws, conn) = temp_conn("labplannerd-store-draft");
        let store = SqliteDraftStore::new(&conn);
        assert_eq!(store.load(&key()).expect("load"), None);

        store
            .save(&key(), &json!({ "practicals": [{ "id": "practical1" }], "savedAt": "t1" }))
            .expect("save");
        store
            .save(&key(), &json!({ "practicals": [], "savedAt": "t2" }))
            .expect("save again");
        let rec = store.load(&key()).expect("load").expect("present");
        assert_eq!(rec.saved_at.as_deref(), Some("t2"));
        assert_eq!(rec.data["practicals"], json!([]));

        store.delete(&key()).expect("delete");
        store.delete(&key()).expect("delete missing is fine");
        assert_eq!(store.load(&key()).expect("load"), None);
        let _ = std::fs::remove_dir_all(&ws);
    }

    #[test]
    fn corrupt_draft_reports_store_error() {
        let (ws, conn) = temp_conn("labplannerd-store-corrupt");
        conn.execute(
            "INSERT INTO form_drafts(faculty_id, subject_id, form_type, form_data) VALUES('f1','s1','practical_planning','{oops')",
            [],
        )
        .expect("insert");
        let err = SqliteDraftStore::new(&conn).load(&key()).expect_err("corrupt");
        assert!(matches!(err, StoreError::Corrupt(_)));
        let _ = std::fs::remove_dir_all(&ws);
    }

    #[test]
    fn submission_requires_known_subject() {
        let (ws, conn) = temp_conn("labplannerd-store-submit");
        let store = SqlitePermanentStore::new(&conn);
        let submission = PracticalSubmission {
            faculty_id: "f1".into(),
            subject_id: "s1".into(),
            practicals: Vec::new(),
            remarks: String::new(),
        };
        assert!(matches!(
            store.submit_practicals(&submission),
            Err(StoreError::NotFound(_))
        ));
        conn.execute(
            "INSERT INTO subjects(id, code, name) VALUES('s1', 'EE201', 'Circuits Lab')",
            [],
        )
        .expect("subject");
        store.submit_practicals(&submission).expect("submit");
        store.submit_practicals(&submission).expect("resubmit overwrites");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM practical_planning_forms", [], |r| r.get(0))
            .expect("count");
        assert_eq!(count, 1);
        let _ = std::fs::remove_dir_all(&ws);
    }

    #[test]
    fn catalogues_read_ordered_units_and_faculty_name() {
        let (ws, conn) = temp_conn("labplannerd-store-catalogue");
        conn.execute(
            "INSERT INTO subjects(id, code, name, department_id, is_theory, is_practical)
             VALUES('s1', 'EE201', 'Circuits Lab', 'd1', 0, 1)",
            [],
        )
        .expect("subject");
        conn.execute(
            "INSERT INTO subject_units(id, subject_id, sort_order, unit_name) VALUES
             ('u2', 's1', 1, 'Signals'), ('u1', 's1', 0, 'Circuits')",
            [],
        )
        .expect("units");
        conn.execute(
            "INSERT INTO faculty(id, first_name, last_name) VALUES('f1', 'Asha', ' Rao '), ('f2', ' ', '')",
            [],
        )
        .expect("faculty");
        conn.execute(
            "INSERT INTO department_pso_peo(department_id, pso_json) VALUES('d1', '[{\"id\":\"p\",\"description\":\"x\"}]')",
            [],
        )
        .expect("pso");

        let cats = SqliteCatalogues::new(&conn);
        let subject = cats.subject("s1").expect("subject").expect("present");
        assert!(subject.flags.practical_only());
        let units = cats.units("s1").expect("units");
        assert_eq!(units.name_at(1), Some("Circuits"));
        assert_eq!(cats.faculty_name("f1").expect("name").as_deref(), Some("Asha Rao"));
        assert_eq!(cats.faculty_name("f2").expect("name").as_deref(), Some(""));
        assert_eq!(cats.faculty_name("nobody").expect("name"), None);
        let stored = cats.department_pso_peo("d1").expect("pso").expect("row");
        assert_eq!(stored.pso.map(|p| p.len()), Some(1));
        assert!(stored.peo.is_none());
        let _ = std::fs::remove_dir_all(&ws);
    }

    #[test]
    fn links_need_base_url_and_registration() {
        let (ws, conn) = temp_conn("labplannerd-store-links");
        conn.execute(
            "INSERT INTO stored_documents(bucket, path, registered_at) VALUES('actual-cies', 'f/a.pdf', 'now')",
            [],
        )
        .expect("doc");
        let unconfigured = StorageLinkResolver::new(&conn, DocumentsSetup::default());
        assert_eq!(unconfigured.public_url("f/a.pdf").expect("url"), None);

        let setup = DocumentsSetup {
            public_base_url: Some("https://files.example.edu".into()),
            ..DocumentsSetup::default()
        };
        let resolver = StorageLinkResolver::new(&conn, setup);
        assert_eq!(
            resolver.public_url("f/a.pdf").expect("url").as_deref(),
            Some("https://files.example.edu/actual-cies/f/a.pdf")
        );
        assert_eq!(resolver.public_url("f/b.pdf").expect("url"), None);
        let _ = std::fs::remove_dir_all(&ws);
    }
}
