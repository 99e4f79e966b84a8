use crate::catalog::UnitCatalogue;
use crate::draft::{
    DraftKey, DraftReconciler, DraftStore, PermanentStore, PracticalDraft, PracticalSubmission,
    ReconcileInput, ReconcileOutcome, SectionKind,
};
use crate::error::SectionError;
use crate::practical::{validate_item, FieldErrors, PracticalField, PracticalItem, SubjectFlags};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

const CURRENT_FACULTY: &str = "Current Faculty";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionState {
    Uninitialized,
    Reconciling,
    Ready,
    Validating,
    Submitting,
    Completed,
}

impl SectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Reconciling => "reconciling",
            Self::Ready => "ready",
            Self::Validating => "validating",
            Self::Submitting => "submitting",
            Self::Completed => "completed",
        }
    }

    fn allowed_next(self) -> &'static [SectionState] {
        use SectionState::*;
        match self {
            Uninitialized => &[Reconciling, Ready],
            Reconciling => &[Ready],
            Ready => &[Reconciling, Validating],
            Validating => &[Ready, Submitting],
            Submitting => &[Ready, Completed],
            Completed => &[Ready, Reconciling],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// Transient message for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct SectionIdentity {
    pub faculty_id: Option<String>,
    pub user_id: Option<String>,
    pub subject_id: Option<String>,
}

impl SectionIdentity {
    /// Explicit faculty id, else the signed-in user's id.
    pub fn effective_faculty_id(&self) -> Option<&str> {
        self.faculty_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or(self.user_id.as_deref())
    }

    pub fn draft_key(&self) -> Result<DraftKey, SectionError> {
        DraftKey::new(
            self.effective_faculty_id(),
            self.subject_id.as_deref(),
            SectionKind::PracticalPlanning,
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SectionSettings {
    pub default_lab_hours: i64,
    pub auto_load_drafts: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSnapshot {
    pub state: SectionState,
    pub faculty_id: Option<String>,
    pub subject_id: Option<String>,
    pub practicals: Vec<PracticalItem>,
    pub active_index: usize,
    pub remarks: String,
    pub errors: FieldErrors,
    pub last_saved: Option<String>,
    pub practical_only: bool,
    pub draft_decided: bool,
}

/// Owns one practical-planning section for the lifetime of a mount.
#[derive(Debug)]
pub struct SectionController {
    identity: SectionIdentity,
    flags: SubjectFlags,
    settings: SectionSettings,
    items: Vec<PracticalItem>,
    active: usize,
    remarks: String,
    errors: FieldErrors,
    state: SectionState,
    reconciler: DraftReconciler,
    last_saved: Option<String>,
    notices: Vec<Notice>,
}

impl SectionController {
    /// An empty `initial` list is replaced with one blank practical.
    pub fn new(
        identity: SectionIdentity,
        flags: SubjectFlags,
        settings: SectionSettings,
        initial: Vec<PracticalItem>,
        remarks: String,
    ) -> Self {
        let items = if initial.is_empty() {
            vec![PracticalItem::with_defaults(
                "practical1",
                settings.default_lab_hours,
            )]
        } else {
            initial
        };
        Self {
            identity,
            flags,
            settings,
            items,
            active: 0,
            remarks,
            errors: FieldErrors::new(),
            state: SectionState::Uninitialized,
            reconciler: DraftReconciler::default(),
            last_saved: None,
            notices: Vec::new(),
        }
    }

    pub fn state(&self) -> SectionState {
        self.state
    }

    pub fn items(&self) -> &[PracticalItem] {
        &self.items
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn last_saved(&self) -> Option<&str> {
        self.last_saved.as_deref()
    }

    pub fn identity(&self) -> &SectionIdentity {
        &self.identity
    }

    fn transition(&mut self, to: SectionState) -> Result<(), SectionError> {
        if self.state.allowed_next().contains(&to) {
            self.state = to;
            Ok(())
        } else {
            Err(SectionError::IllegalTransition {
                from: self.state.as_str(),
                to: to.as_str(),
            })
        }
    }

    /// Editing a completed or never-reconciled section makes it ready again.
    fn reopen(&mut self) {
        if matches!(self.state, SectionState::Completed | SectionState::Uninitialized) {
            self.state = SectionState::Ready;
        }
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice {
            level,
            message: message.into(),
        });
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Mount effect. Hydrates from a stored draft at most once per mount.
    pub fn reconcile(
        &mut self,
        store: &dyn DraftStore,
        units: &UnitCatalogue,
    ) -> Result<ReconcileOutcome, SectionError> {
        if self.reconciler.is_decided() {
            return Ok(ReconcileOutcome::AlreadyDecided);
        }
        self.transition(SectionState::Reconciling)?;

        let faculty_id = self.identity.effective_faculty_id().map(str::to_string);
        let outcome = self.reconciler.reconcile(
            ReconcileInput {
                faculty_id: faculty_id.as_deref(),
                subject_id: self.identity.subject_id.as_deref(),
                kind: SectionKind::PracticalPlanning,
                items: &self.items,
                units,
                default_lab_hours: self.settings.default_lab_hours,
                enabled: self.settings.auto_load_drafts,
            },
            store,
        );

        match &outcome {
            ReconcileOutcome::Loaded(draft) => {
                self.items = draft.items.clone();
                self.remarks = draft.remarks.clone();
                self.last_saved = Some(draft.saved_at.clone());
                self.active = 0;
                self.errors.clear();
                let count = self.items.len();
                self.notify(
                    NoticeLevel::Success,
                    format!("Draft loaded with {} practical(s)", count),
                );
            }
            ReconcileOutcome::Failed(msg) => {
                let msg = format!("Failed to auto-load draft: {}", msg);
                self.notify(NoticeLevel::Error, msg);
            }
            _ => {}
        }
        self.transition(SectionState::Ready)?;
        debug!(outcome = outcome.label(), "reconciliation finished");
        Ok(outcome)
    }

    /// Allow the next [`Self::reconcile`] call to hit the store again.
    pub fn reset_draft_decision(&mut self) {
        self.reconciler.reset();
    }

    pub fn set_active_item(&mut self, index: usize) -> bool {
        if index >= self.items.len() {
            return false;
        }
        if index != self.active {
            self.active = index;
            self.errors.clear();
        }
        true
    }

    pub fn update_field(
        &mut self,
        index: usize,
        field: &str,
        value: &JsonValue,
    ) -> Result<(), SectionError> {
        let Some(parsed) = PracticalField::parse(field) else {
            return Err(SectionError::InvalidField {
                field: field.to_string(),
                reason: "unknown field".to_string(),
            });
        };
        let len = self.items.len();
        let current = self
            .items
            .get(index)
            .ok_or(SectionError::IndexOutOfRange { index, len })?;
        let next = current
            .with_field(parsed, value)
            .map_err(|reason| SectionError::InvalidField {
                field: field.to_string(),
                reason,
            })?;
        self.items[index] = next;
        self.reopen();
        self.errors = validate_item(&self.items[self.active], self.flags);
        Ok(())
    }

    pub fn set_remarks(&mut self, remarks: impl Into<String>) {
        self.remarks = remarks.into();
        self.reopen();
    }

    /// Appends a blank practical and makes it active. Returns its index.
    pub fn add_item(&mut self) -> usize {
        let mut n = self.items.len() + 1;
        while self.items.iter().any(|p| p.id == format!("practical{}", n)) {
            n += 1;
        }
        let mut item = PracticalItem::with_defaults(
            format!("practical{}", n),
            self.settings.default_lab_hours,
        );
        if let Some(name) = self.items.first().map(|p| p.faculty_name.clone()) {
            item.faculty_name = name;
        }
        self.items.push(item);
        self.active = self.items.len() - 1;
        self.errors.clear();
        self.reopen();
        self.active
    }

    /// Removes the practical at `index`. The last remaining practical cannot be
    /// removed; that case raises a warning and returns `Ok(false)`.
    pub fn remove_item(&mut self, index: usize) -> Result<bool, SectionError> {
        let len = self.items.len();
        if len <= 1 {
            self.notify(NoticeLevel::Warning, "At least one practical is required");
            return Ok(false);
        }
        if index >= len {
            return Err(SectionError::IndexOutOfRange { index, len });
        }
        self.items.remove(index);
        if self.active >= index && self.active > 0 {
            self.active -= 1;
        }
        self.active = self.active.min(self.items.len() - 1);
        self.errors.clear();
        self.reopen();
        Ok(true)
    }

    pub fn validate_active_item(&mut self) -> Result<&FieldErrors, SectionError> {
        self.reopen();
        self.transition(SectionState::Validating)?;
        self.errors = validate_item(&self.items[self.active], self.flags);
        self.transition(SectionState::Ready)?;
        Ok(&self.errors)
    }

    /// Sets the display name on every practical. A blank name falls back to
    /// `Current Faculty`.
    pub fn stamp_faculty_name(&mut self, name: &str) {
        let name = name.trim();
        let name = if name.is_empty() { CURRENT_FACULTY } else { name };
        self.items = self
            .items
            .iter()
            .map(|p| PracticalItem {
                faculty_name: name.to_string(),
                ..p.clone()
            })
            .collect();
    }

    pub fn save_draft(&mut self, store: &dyn DraftStore) -> Result<(), SectionError> {
        let key = self.identity.draft_key()?;
        let saved_at = chrono::Utc::now().to_rfc3339();
        let payload = PracticalDraft::payload(&self.items, &self.remarks, &saved_at);
        match store.save(&key, &payload) {
            Ok(()) => {
                info!(subject_id = %key.subject_id, count = self.items.len(), "practical draft saved");
                self.last_saved = Some(saved_at);
                self.reopen();
                self.notify(NoticeLevel::Success, "Draft saved successfully");
                Ok(())
            }
            Err(e) => {
                warn!(subject_id = %key.subject_id, error = %e, "practical draft save failed");
                self.notify(NoticeLevel::Error, format!("Failed to save draft: {}", e));
                Err(e.into())
            }
        }
    }

    /// Validates the active practical, stores the whole section permanently
    /// and then clears the draft. Draft deletion failures are only logged.
    pub fn submit(
        &mut self,
        permanent: &dyn PermanentStore,
        drafts: &dyn DraftStore,
    ) -> Result<(), SectionError> {
        self.reopen();
        self.transition(SectionState::Validating)?;
        self.errors = validate_item(&self.items[self.active], self.flags);
        if !self.errors.is_empty() {
            let count = self.errors.len();
            self.notify(NoticeLevel::Error, "Please fix validation errors before saving");
            self.transition(SectionState::Ready)?;
            return Err(SectionError::Validation { count });
        }
        let key = match self.identity.draft_key() {
            Ok(k) => k,
            Err(e) => {
                self.transition(SectionState::Ready)?;
                return Err(e);
            }
        };

        self.transition(SectionState::Submitting)?;
        let submission = PracticalSubmission {
            faculty_id: key.faculty_id.clone(),
            subject_id: key.subject_id.clone(),
            practicals: self.items.clone(),
            remarks: self.remarks.clone(),
        };
        if let Err(e) = permanent.submit_practicals(&submission) {
            warn!(subject_id = %key.subject_id, error = %e, "practical submit failed");
            self.notify(NoticeLevel::Error, e.to_string());
            self.transition(SectionState::Ready)?;
            return Err(e.into());
        }

        info!(subject_id = %key.subject_id, count = self.items.len(), "practical planning submitted");
        self.notify(NoticeLevel::Success, "Practical details saved successfully");
        if let Err(e) = drafts.delete(&key) {
            warn!(subject_id = %key.subject_id, error = %e, "draft cleanup after submit failed");
        }
        self.transition(SectionState::Completed)
    }

    pub fn snapshot(&self) -> SectionSnapshot {
        SectionSnapshot {
            state: self.state,
            faculty_id: self.identity.effective_faculty_id().map(str::to_string),
            subject_id: self.identity.subject_id.clone(),
            practicals: self.items.clone(),
            active_index: self.active,
            remarks: self.remarks.clone(),
            errors: self.errors.clone(),
            last_saved: self.last_saved.clone(),
            practical_only: self.flags.practical_only(),
            draft_decided: self.reconciler.is_decided(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::UnitRef;
    use crate::draft::testing::{key, MemoryDraftStore, MemoryPermanentStore};
    use crate::practical::{complete_item, normalize_loaded, DEFAULT_LAB_HOURS};
    use serde_json::json;

    fn settings() -> SectionSettings {
        SectionSettings {
            default_lab_hours: DEFAULT_LAB_HOURS,
            auto_load_drafts: true,
        }
    }

    fn identity() -> SectionIdentity {
        SectionIdentity {
            faculty_id: None,
            user_id: Some("f1".into()),
            subject_id: Some("s1".into()),
        }
    }

    fn flags() -> SubjectFlags {
        SubjectFlags {
            is_theory: true,
            is_practical: true,
        }
    }

    fn controller(initial: Vec<PracticalItem>) -> SectionController {
        SectionController::new(identity(), flags(), settings(), initial, String::new())
    }

    fn units() -> UnitCatalogue {
        UnitCatalogue::new(vec![UnitRef {
            id: "u1".into(),
            name: "Unit 1: Circuits".into(),
        }])
    }

    #[test]
    fn new_controller_has_one_blank_practical() {
        let c = controller(Vec::new());
        assert_eq!(c.items().len(), 1);
        assert_eq!(c.items()[0].id, "practical1");
        assert_eq!(c.state(), SectionState::Uninitialized);
    }

    #[test]
    fn reconcile_hydrates_from_draft_once() {
        let store = MemoryDraftStore::with_draft(
            key("f1", "s1"),
            json!({ "practicals": [{ "practical_aim": "Measure voltage", "associated_units": ["u1"] }] }),
        );
        let mut c = controller(Vec::new());
        let out = c.reconcile(&store, &units()).expect("reconcile");
        assert_eq!(out.label(), "loaded");
        assert_eq!(c.state(), SectionState::Ready);
        let active = &c.items()[c.active_index()];
        assert_eq!(active.practical_aim, "Measure voltage");
        assert_eq!(active.associated_units, vec!["Unit 1: Circuits"]);
        assert!(c.last_saved().is_some());
        let notices = c.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].message, "Draft loaded with 1 practical(s)");

        let again = c.reconcile(&store, &units()).expect("reconcile");
        assert_eq!(again, ReconcileOutcome::AlreadyDecided);
        assert_eq!(store.loads.get(), 1);
        assert!(c.take_notices().is_empty());
    }

    #[test]
    fn reconcile_failure_leaves_section_usable() {
        let store = MemoryDraftStore::default();
        store.fail_load.set(true);
        let mut c = controller(Vec::new());
        c.reconcile(&store, &units()).expect("reconcile");
        assert_eq!(c.state(), SectionState::Ready);
        assert_eq!(c.items().len(), 1);
        let notices = c.take_notices();
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(notices[0].message.starts_with("Failed to auto-load draft"));
    }

    #[test]
    fn reconcile_never_overwrites_typed_aim() {
        let store = MemoryDraftStore::with_draft(
            key("f1", "s1"),
            json!({ "practicals": [{ "practical_aim": "From draft" }] }),
        );
        let mut typed = PracticalItem::with_defaults("practical1", DEFAULT_LAB_HOURS);
        typed.practical_aim = "Mine".into();
        let mut c = controller(vec![typed]);
        c.reconcile(&store, &units()).expect("reconcile");
        assert_eq!(c.items()[0].practical_aim, "Mine");
    }

    #[test]
    fn disabled_autoload_never_reads_store() {
        let store = MemoryDraftStore::default();
        let mut c = SectionController::new(
            identity(),
            flags(),
            SectionSettings {
                default_lab_hours: 2,
                auto_load_drafts: false,
            },
            Vec::new(),
            String::new(),
        );
        assert_eq!(
            c.reconcile(&store, &units()).expect("reconcile"),
            ReconcileOutcome::Disabled
        );
        assert_eq!(store.loads.get(), 0);
    }

    #[test]
    fn update_field_changes_only_the_target() {
        let mut c = controller(Vec::new());
        c.add_item();
        let before = c.items().to_vec();
        c.update_field(0, "practical_aim", &json!("Measure current"))
            .expect("update");
        assert_eq!(c.items()[0].practical_aim, "Measure current");
        assert_eq!(c.items()[1], before[1]);
        let mut expected = before[0].clone();
        expected.practical_aim = "Measure current".into();
        assert_eq!(c.items()[0], expected);
        // earlier snapshot is unaffected
        assert_eq!(before[0].practical_aim, "");
    }

    #[test]
    fn update_field_rejects_bad_input() {
        let mut c = controller(Vec::new());
        assert!(matches!(
            c.update_field(3, "practical_aim", &json!("x")),
            Err(SectionError::IndexOutOfRange { index: 3, len: 1 })
        ));
        assert!(matches!(
            c.update_field(0, "colour", &json!("x")),
            Err(SectionError::InvalidField { .. })
        ));
        assert!(matches!(
            c.update_field(0, "co_mapping", &json!("co-1")),
            Err(SectionError::InvalidField { .. })
        ));
    }

    #[test]
    fn add_item_activates_new_item_with_unique_id() {
        let mut c = controller(Vec::new());
        c.add_item();
        c.add_item();
        c.remove_item(1).expect("remove");
        let idx = c.add_item();
        assert_eq!(idx, 2);
        assert_eq!(c.active_index(), 2);
        let ids: Vec<&str> = c.items().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["practical1", "practical3", "practical4"]);
        assert_eq!(c.items()[2].lab_hours, DEFAULT_LAB_HOURS);
    }

    #[test]
    fn remove_last_item_is_refused() {
        let mut c = controller(Vec::new());
        assert!(!c.remove_item(0).expect("remove"));
        assert_eq!(c.items().len(), 1);
        let notices = c.take_notices();
        assert_eq!(notices[0].level, NoticeLevel::Warning);
        assert_eq!(notices[0].message, "At least one practical is required");
    }

    #[test]
    fn remove_keeps_active_index_valid() {
        let mut c = controller(Vec::new());
        c.add_item();
        c.add_item();
        assert_eq!(c.active_index(), 2);
        c.remove_item(2).expect("remove");
        assert_eq!(c.active_index(), 1);
        c.set_active_item(0);
        c.remove_item(1).expect("remove");
        assert_eq!(c.active_index(), 0);
        c.add_item();
        c.set_active_item(0);
        c.remove_item(0).expect("remove");
        assert_eq!(c.active_index(), 0);
    }

    #[test]
    fn set_active_ignores_out_of_range() {
        let mut c = controller(Vec::new());
        assert!(!c.set_active_item(1));
        assert_eq!(c.active_index(), 0);
    }

    #[test]
    fn validate_reports_blank_fields() {
        let mut c = controller(Vec::new());
        let errors = c.validate_active_item().expect("validate");
        assert!(errors.contains_key("practical_aim"));
        assert!(errors.contains_key("associated_units"));
        assert_eq!(c.state(), SectionState::Ready);
    }

    #[test]
    fn save_draft_round_trips_through_normalize() {
        let store = MemoryDraftStore::default();
        let mut c = controller(vec![complete_item("practical1")]);
        c.add_item();
        c.set_remarks("Lab B only");
        c.save_draft(&store).expect("save");
        assert!(c.last_saved().is_some());

        let record = store.load(&key("f1", "s1")).expect("load").expect("some");
        let draft = PracticalDraft::from_record(&record).expect("draft");
        assert_eq!(draft.remarks, "Lab B only");
        let round = normalize_loaded(&draft.practicals, &units(), DEFAULT_LAB_HOURS);
        assert_eq!(round, c.items().to_vec());
    }

    #[test]
    fn save_draft_failure_keeps_items() {
        let store = MemoryDraftStore::default();
        store.fail_save.set(true);
        let mut c = controller(vec![complete_item("practical1")]);
        let err = c.save_draft(&store).expect_err("should fail");
        assert!(matches!(err, SectionError::Store(_)));
        assert_eq!(c.items()[0].practical_aim, "Measure voltage");
        assert!(c.last_saved().is_none());
        let notices = c.take_notices();
        assert_eq!(notices[0].message, "Failed to save draft: storage backend error: quota exceeded");
    }

    #[test]
    fn save_draft_without_identity_does_not_touch_store() {
        let store = MemoryDraftStore::default();
        let mut c = SectionController::new(
            SectionIdentity::default(),
            flags(),
            settings(),
            Vec::new(),
            String::new(),
        );
        assert!(matches!(
            c.save_draft(&store),
            Err(SectionError::MissingIdentity)
        ));
        assert_eq!(store.saves.get(), 0);
    }

    #[test]
    fn submit_with_missing_fields_calls_nothing() {
        let drafts = MemoryDraftStore::default();
        let permanent = MemoryPermanentStore::default();
        let mut c = controller(Vec::new());
        let err = c.submit(&permanent, &drafts).expect_err("invalid");
        assert!(matches!(err, SectionError::Validation { count: 12 }));
        assert!(permanent.submitted.borrow().is_empty());
        assert_eq!(drafts.deletes.get(), 0);
        assert_eq!(c.state(), SectionState::Ready);
        assert_eq!(c.errors().len(), 12);
    }

    #[test]
    fn submit_success_stores_once_and_clears_draft_once() {
        let drafts = MemoryDraftStore::with_draft(key("f1", "s1"), json!({ "practicals": [{}] }));
        let permanent = MemoryPermanentStore::default();
        let mut c = controller(vec![complete_item("practical1")]);
        c.set_remarks("ok");
        c.submit(&permanent, &drafts).expect("submit");
        assert_eq!(permanent.submitted.borrow().len(), 1);
        assert_eq!(permanent.submitted.borrow()[0].remarks, "ok");
        assert_eq!(drafts.deletes.get(), 1);
        assert!(drafts.drafts.borrow().is_empty());
        assert_eq!(c.state(), SectionState::Completed);
    }

    #[test]
    fn submit_validates_only_the_active_item() {
        let drafts = MemoryDraftStore::default();
        let permanent = MemoryPermanentStore::default();
        let mut c = controller(vec![complete_item("practical1")]);
        c.add_item();
        c.set_active_item(0);
        c.submit(&permanent, &drafts).expect("submit");
        assert_eq!(permanent.submitted.borrow()[0].practicals.len(), 2);
    }

    #[test]
    fn draft_delete_failure_does_not_fail_submit() {
        let drafts = MemoryDraftStore::default();
        drafts.fail_delete.set(true);
        let permanent = MemoryPermanentStore::default();
        let mut c = controller(vec![complete_item("practical1")]);
        c.submit(&permanent, &drafts).expect("submit");
        assert_eq!(c.state(), SectionState::Completed);
    }

    #[test]
    fn failed_submit_returns_to_ready_with_data() {
        let drafts = MemoryDraftStore::default();
        let permanent = MemoryPermanentStore::default();
        permanent.fail.set(true);
        let mut c = controller(vec![complete_item("practical1")]);
        assert!(c.submit(&permanent, &drafts).is_err());
        assert_eq!(c.state(), SectionState::Ready);
        assert_eq!(drafts.deletes.get(), 0);
        assert_eq!(c.items()[0].practical_aim, "Measure voltage");
    }

    #[test]
    fn editing_completed_section_reopens_it() {
        let drafts = MemoryDraftStore::default();
        let permanent = MemoryPermanentStore::default();
        let mut c = controller(vec![complete_item("practical1")]);
        c.submit(&permanent, &drafts).expect("submit");
        c.update_field(0, "lab_hours", &json!(3)).expect("update");
        assert_eq!(c.state(), SectionState::Ready);
    }

    #[test]
    fn faculty_name_stamped_on_all_items() {
        let mut c = controller(Vec::new());
        c.add_item();
        c.stamp_faculty_name("  ");
        assert!(c.items().iter().all(|p| p.faculty_name == "Current Faculty"));
        c.stamp_faculty_name("Asha Rao");
        assert!(c.items().iter().all(|p| p.faculty_name == "Asha Rao"));
    }

    #[test]
    fn explicit_faculty_id_wins_over_user_id() {
        let id = SectionIdentity {
            faculty_id: Some("fac".into()),
            user_id: Some("user".into()),
            subject_id: Some("s".into()),
        };
        assert_eq!(id.effective_faculty_id(), Some("fac"));
        let id = SectionIdentity {
            faculty_id: Some(" ".into()),
            ..id
        };
        assert_eq!(id.effective_faculty_id(), Some("user"));
    }
}
