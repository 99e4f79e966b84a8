use crate::catalog::UnitCatalogue;
use crate::error::{SectionError, StoreError};
use crate::practical::{normalize_loaded, PracticalItem};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    PracticalPlanning,
    UnitPlanning,
    CiePlanning,
    AdditionalPlanning,
}

impl SectionKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "practical_planning" => Some(Self::PracticalPlanning),
            "unit_planning" => Some(Self::UnitPlanning),
            "cie_planning" => Some(Self::CiePlanning),
            "additional_planning" => Some(Self::AdditionalPlanning),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PracticalPlanning => "practical_planning",
            Self::UnitPlanning => "unit_planning",
            Self::CiePlanning => "cie_planning",
            Self::AdditionalPlanning => "additional_planning",
        }
    }
}

/// Identity of a stored draft: (faculty, subject, section kind).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DraftKey {
    pub faculty_id: String,
    pub subject_id: String,
    pub kind: SectionKind,
}

impl DraftKey {
    /// Both ids must be non-blank; blank ids mean "no identity yet".
    pub fn new(
        faculty_id: Option<&str>,
        subject_id: Option<&str>,
        kind: SectionKind,
    ) -> Result<Self, SectionError> {
        let faculty_id = faculty_id.map(str::trim).filter(|s| !s.is_empty());
        let subject_id = subject_id.map(str::trim).filter(|s| !s.is_empty());
        match (faculty_id, subject_id) {
            (Some(f), Some(s)) => Ok(Self {
                faculty_id: f.to_string(),
                subject_id: s.to_string(),
                kind,
            }),
            _ => Err(SectionError::MissingIdentity),
        }
    }
}

/// A persisted draft as returned by a [`DraftStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct DraftRecord {
    pub data: JsonValue,
    /// Store-side save time, used when the payload carries no `savedAt`.
    pub saved_at: Option<String>,
}

pub trait DraftStore {
    fn load(&self, key: &DraftKey) -> Result<Option<DraftRecord>, StoreError>;
    fn save(&self, key: &DraftKey, payload: &JsonValue) -> Result<(), StoreError>;
    fn delete(&self, key: &DraftKey) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct PracticalSubmission {
    pub faculty_id: String,
    pub subject_id: String,
    pub practicals: Vec<PracticalItem>,
    pub remarks: String,
}

pub trait PermanentStore {
    fn submit_practicals(&self, submission: &PracticalSubmission) -> Result<(), StoreError>;
}

/// Draft payload for the practical section, validated at the store boundary.
#[derive(Debug, Clone)]
pub struct PracticalDraft {
    pub practicals: Vec<JsonValue>,
    pub remarks: String,
    pub saved_at: Option<String>,
}

impl PracticalDraft {
    /// `None` unless the payload holds a non-empty `practicals` array.
    pub fn from_record(record: &DraftRecord) -> Option<Self> {
        let practicals = record
            .data
            .get("practicals")
            .and_then(|v| v.as_array())
            .filter(|arr| !arr.is_empty())?
            .clone();
        let remarks = record
            .data
            .get("remarks")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let saved_at = record
            .data
            .get("savedAt")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .or_else(|| record.saved_at.clone());
        Some(Self {
            practicals,
            remarks,
            saved_at,
        })
    }

    pub fn payload(items: &[PracticalItem], remarks: &str, saved_at: &str) -> JsonValue {
        json!({
            "practicals": items,
            "remarks": remarks,
            "savedAt": saved_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDraft {
    pub items: Vec<PracticalItem>,
    pub remarks: String,
    pub saved_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    AlreadyDecided,
    Disabled,
    SkippedMissingIdentity,
    SkippedExistingWork,
    NoDraft,
    Loaded(LoadedDraft),
    Failed(String),
}

impl ReconcileOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::AlreadyDecided => "already_decided",
            Self::Disabled => "disabled",
            Self::SkippedMissingIdentity => "skipped_missing_identity",
            Self::SkippedExistingWork => "skipped_existing_work",
            Self::NoDraft => "no_draft",
            Self::Loaded(_) => "loaded",
            Self::Failed(_) => "failed",
        }
    }
}

pub struct ReconcileInput<'a> {
    pub faculty_id: Option<&'a str>,
    pub subject_id: Option<&'a str>,
    pub kind: SectionKind,
    pub items: &'a [PracticalItem],
    pub units: &'a UnitCatalogue,
    pub default_lab_hours: i64,
    pub enabled: bool,
}

/// One-shot draft loader for a section mount. After the first call returns,
/// later calls report `AlreadyDecided` until [`DraftReconciler::reset`].
#[derive(Debug, Default)]
pub struct DraftReconciler {
    decided: bool,
}

impl DraftReconciler {
    pub fn is_decided(&self) -> bool {
        self.decided
    }

    pub fn reset(&mut self) {
        self.decided = false;
    }

    pub fn reconcile(&mut self, input: ReconcileInput<'_>, store: &dyn DraftStore) -> ReconcileOutcome {
        if self.decided {
            debug!("draft already decided for this mount");
            return ReconcileOutcome::AlreadyDecided;
        }
        self.decided = true;

        if !input.enabled {
            return ReconcileOutcome::Disabled;
        }
        let key = match DraftKey::new(input.faculty_id, input.subject_id, input.kind) {
            Ok(k) => k,
            Err(_) => {
                debug!("missing faculty or subject id; draft load skipped");
                return ReconcileOutcome::SkippedMissingIdentity;
            }
        };
        if input.items.iter().any(PracticalItem::has_aim) {
            debug!(subject_id = %key.subject_id, "in-memory practicals present; draft load skipped");
            return ReconcileOutcome::SkippedExistingWork;
        }

        let record = match store.load(&key) {
            Ok(Some(r)) => r,
            Ok(None) => return ReconcileOutcome::NoDraft,
            Err(e) => {
                warn!(subject_id = %key.subject_id, error = %e, "draft load failed");
                return ReconcileOutcome::Failed(e.to_string());
            }
        };
        let Some(draft) = PracticalDraft::from_record(&record) else {
            debug!(subject_id = %key.subject_id, "stored draft has no practicals");
            return ReconcileOutcome::NoDraft;
        };

        let items = normalize_loaded(&draft.practicals, input.units, input.default_lab_hours);
        info!(
            subject_id = %key.subject_id,
            kind = key.kind.as_str(),
            count = items.len(),
            "draft loaded"
        );
        ReconcileOutcome::Loaded(LoadedDraft {
            items,
            remarks: draft.remarks,
            saved_at: draft
                .saved_at
                .unwrap_or_else(|| chrono::Utc::now().to_rfc3339()),
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    /// In-memory draft store that counts calls and can be told to fail.
    #[derive(Default)]
    pub struct MemoryDraftStore {
        pub drafts: RefCell<HashMap<DraftKey, DraftRecord>>,
        pub loads: Cell<usize>,
        pub saves: Cell<usize>,
        pub deletes: Cell<usize>,
        pub fail_load: Cell<bool>,
        pub fail_save: Cell<bool>,
        pub fail_delete: Cell<bool>,
    }

    impl MemoryDraftStore {
        pub fn with_draft(key: DraftKey, data: JsonValue) -> Self {
            let store = Self::default();
            store
                .drafts
                .borrow_mut()
                .insert(key, DraftRecord { data, saved_at: None });
            store
        }
    }

    impl DraftStore for MemoryDraftStore {
        fn load(&self, key: &DraftKey) -> Result<Option<DraftRecord>, StoreError> {
            self.loads.set(self.loads.get() + 1);
            if self.fail_load.get() {
                return Err(StoreError::Backend("connection reset".into()));
            }
            Ok(self.drafts.borrow().get(key).cloned())
        }

        fn save(&self, key: &DraftKey, payload: &JsonValue) -> Result<(), StoreError> {
            self.saves.set(self.saves.get() + 1);
            if self.fail_save.get() {
                return Err(StoreError::Backend("quota exceeded".into()));
            }
            self.drafts.borrow_mut().insert(
                key.clone(),
                DraftRecord {
                    data: payload.clone(),
                    saved_at: None,
                },
            );
            Ok(())
        }

        fn delete(&self, key: &DraftKey) -> Result<(), StoreError> {
            self.deletes.set(self.deletes.get() + 1);
            if self.fail_delete.get() {
                return Err(StoreError::Backend("delete failed".into()));
            }
            self.drafts.borrow_mut().remove(key);
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct MemoryPermanentStore {
        pub submitted: RefCell<Vec<PracticalSubmission>>,
        pub fail: Cell<bool>,
    }

    impl PermanentStore for MemoryPermanentStore {
        fn submit_practicals(&self, submission: &PracticalSubmission) -> Result<(), StoreError> {
            if self.fail.get() {
                return Err(StoreError::Backend("Failed to save practical details".into()));
            }
            self.submitted.borrow_mut().push(submission.clone());
            Ok(())
        }
    }

    pub fn key(faculty: &str, subject: &str) -> DraftKey {
        DraftKey {
            faculty_id: faculty.into(),
            subject_id: subject.into(),
            kind: SectionKind::PracticalPlanning,
        }
    }
}
