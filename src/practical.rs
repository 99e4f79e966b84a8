use crate::catalog::UnitCatalogue;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

pub const DEFAULT_LAB_HOURS: i64 = 2;

pub const PRACTICAL_PEDAGOGY_OPTIONS: &[&str] = &[
    "Problem-Based/Case Study Learning",
    "Project-Based Learning",
    "Collaborative Learning",
    "Code Walkthroughs",
    "Self-Learning with Guidance",
    "Experiential Learning",
    "Flipped Laboratory",
    "Pair Programming",
    "Peer Learning",
    "Research-Oriented Practical",
    "Other",
];

pub const EVALUATION_METHOD_OPTIONS: &[&str] = &[
    "Viva",
    "Lab Performance",
    "File Submission",
    "Mini-Project",
    "Code Review",
    "Peer Evaluation",
    "Presentation",
    "Other",
];

pub const BLOOMS_OPTIONS: &[&str] = &["Apply", "Analyze", "Evaluate", "Create"];

pub const SKILL_MAPPING_OPTIONS: &[&str] = &[
    "Technical Skills",
    "Cognitive Skills",
    "Professional Skills",
    "Research and Innovation Skills",
    "Entrepreneurial or Managerial Skills",
    "Communication Skills",
    "Leadership and Teamwork Skills",
    "Creativity and Design Thinking Skills",
    "Ethical, Social, and Environmental Awareness Skills",
];

/// Field name -> message. Any entry blocks submission.
pub type FieldErrors = BTreeMap<String, String>;

/// One planned lab session. Every field is always present; absent input is
/// filled from defaults by [`normalize_item`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticalItem {
    pub id: String,
    pub practical_aim: String,
    pub associated_units: Vec<String>,
    pub probable_week: String,
    pub lab_hours: i64,
    pub software_hardware_requirements: String,
    pub practical_tasks: String,
    pub evaluation_methods: Vec<String>,
    pub other_evaluation_method: String,
    pub practical_pedagogy: String,
    pub other_pedagogy: String,
    pub reference_material: String,
    pub co_mapping: Vec<String>,
    pub pso_mapping: Vec<String>,
    pub peo_mapping: Vec<String>,
    pub blooms_taxonomy: Vec<String>,
    pub skill_mapping: Vec<String>,
    pub skill_objectives: String,
    pub faculty_name: String,
}

impl PracticalItem {
    pub fn with_defaults(id: impl Into<String>, lab_hours: i64) -> Self {
        PracticalItem {
            id: id.into(),
            practical_aim: String::new(),
            associated_units: Vec::new(),
            probable_week: String::new(),
            lab_hours,
            software_hardware_requirements: String::new(),
            practical_tasks: String::new(),
            evaluation_methods: Vec::new(),
            other_evaluation_method: String::new(),
            practical_pedagogy: String::new(),
            other_pedagogy: String::new(),
            reference_material: String::new(),
            co_mapping: Vec::new(),
            pso_mapping: Vec::new(),
            peo_mapping: Vec::new(),
            blooms_taxonomy: Vec::new(),
            skill_mapping: Vec::new(),
            skill_objectives: String::new(),
            faculty_name: String::new(),
        }
    }

    pub fn has_aim(&self) -> bool {
        !self.practical_aim.trim().is_empty()
    }

    /// Returns a patched copy; `self` is left untouched.
    pub fn with_field(&self, field: PracticalField, value: &JsonValue) -> Result<Self, String> {
        let mut next = self.clone();
        match field.kind() {
            FieldKind::Text => {
                let s = value.as_str().ok_or("must be string")?.to_string();
                if let Some(slot) = next.text_mut(field) {
                    *slot = s;
                }
            }
            FieldKind::List => {
                let arr = value.as_array().ok_or("must be array of strings")?;
                let mut out = Vec::with_capacity(arr.len());
                for v in arr {
                    out.push(v.as_str().ok_or("must be array of strings")?.to_string());
                }
                if let Some(slot) = next.list_mut(field) {
                    *slot = out;
                }
            }
            FieldKind::Hours => {
                next.lab_hours = parse_hours(value).ok_or("must be integer")?;
            }
        }
        Ok(next)
    }

    fn text_mut(&mut self, field: PracticalField) -> Option<&mut String> {
        let slot = match field {
            PracticalField::PracticalAim => &mut self.practical_aim,
            PracticalField::ProbableWeek => &mut self.probable_week,
            PracticalField::SoftwareHardwareRequirements => &mut self.software_hardware_requirements,
            PracticalField::PracticalTasks => &mut self.practical_tasks,
            PracticalField::OtherEvaluationMethod => &mut self.other_evaluation_method,
            PracticalField::PracticalPedagogy => &mut self.practical_pedagogy,
            PracticalField::OtherPedagogy => &mut self.other_pedagogy,
            PracticalField::ReferenceMaterial => &mut self.reference_material,
            PracticalField::SkillObjectives => &mut self.skill_objectives,
            _ => return None,
        };
        Some(slot)
    }

    fn list_mut(&mut self, field: PracticalField) -> Option<&mut Vec<String>> {
        let slot = match field {
            PracticalField::AssociatedUnits => &mut self.associated_units,
            PracticalField::EvaluationMethods => &mut self.evaluation_methods,
            PracticalField::CoMapping => &mut self.co_mapping,
            PracticalField::PsoMapping => &mut self.pso_mapping,
            PracticalField::PeoMapping => &mut self.peo_mapping,
            PracticalField::BloomsTaxonomy => &mut self.blooms_taxonomy,
            PracticalField::SkillMapping => &mut self.skill_mapping,
            _ => return None,
        };
        Some(slot)
    }
}

#[derive(Clone, Copy)]
enum FieldKind {
    Text,
    List,
    Hours,
}

/// Editable fields of a practical. `id` and `faculty_name` are owned by the
/// controller and cannot be patched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PracticalField {
    PracticalAim,
    AssociatedUnits,
    ProbableWeek,
    LabHours,
    SoftwareHardwareRequirements,
    PracticalTasks,
    EvaluationMethods,
    OtherEvaluationMethod,
    PracticalPedagogy,
    OtherPedagogy,
    ReferenceMaterial,
    CoMapping,
    PsoMapping,
    PeoMapping,
    BloomsTaxonomy,
    SkillMapping,
    SkillObjectives,
}

impl PracticalField {
    pub const ALL: [PracticalField; 17] = [
        Self::PracticalAim,
        Self::AssociatedUnits,
        Self::ProbableWeek,
        Self::LabHours,
        Self::SoftwareHardwareRequirements,
        Self::PracticalTasks,
        Self::EvaluationMethods,
        Self::OtherEvaluationMethod,
        Self::PracticalPedagogy,
        Self::OtherPedagogy,
        Self::ReferenceMaterial,
        Self::CoMapping,
        Self::PsoMapping,
        Self::PeoMapping,
        Self::BloomsTaxonomy,
        Self::SkillMapping,
        Self::SkillObjectives,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == s)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::PracticalAim => "practical_aim",
            Self::AssociatedUnits => "associated_units",
            Self::ProbableWeek => "probable_week",
            Self::LabHours => "lab_hours",
            Self::SoftwareHardwareRequirements => "software_hardware_requirements",
            Self::PracticalTasks => "practical_tasks",
            Self::EvaluationMethods => "evaluation_methods",
            Self::OtherEvaluationMethod => "other_evaluation_method",
            Self::PracticalPedagogy => "practical_pedagogy",
            Self::OtherPedagogy => "other_pedagogy",
            Self::ReferenceMaterial => "reference_material",
            Self::CoMapping => "co_mapping",
            Self::PsoMapping => "pso_mapping",
            Self::PeoMapping => "peo_mapping",
            Self::BloomsTaxonomy => "blooms_taxonomy",
            Self::SkillMapping => "skill_mapping",
            Self::SkillObjectives => "skill_objectives",
        }
    }

    fn kind(self) -> FieldKind {
        match self {
            Self::LabHours => FieldKind::Hours,
            Self::AssociatedUnits
            | Self::EvaluationMethods
            | Self::CoMapping
            | Self::PsoMapping
            | Self::PeoMapping
            | Self::BloomsTaxonomy
            | Self::SkillMapping => FieldKind::List,
            _ => FieldKind::Text,
        }
    }
}

/// Subject flags that decide which fields are required.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubjectFlags {
    pub is_theory: bool,
    pub is_practical: bool,
}

impl SubjectFlags {
    /// Practical-only subjects have no theory units to associate with.
    pub fn practical_only(self) -> bool {
        self.is_practical && !self.is_theory
    }
}

/// Whole hours only: `3`, `3.0` and `"3"` parse, `1.5` does not.
fn parse_hours(v: &JsonValue) -> Option<i64> {
    if let Some(n) = v.as_i64() {
        return Some(n);
    }
    if let Some(f) = v.as_f64() {
        return (f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64);
    }
    v.as_str().and_then(|s| s.trim().parse::<i64>().ok())
}

fn text_or_default(obj: &serde_json::Map<String, JsonValue>, key: &str) -> String {
    obj.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_default()
}

fn list_or_default(obj: &serde_json::Map<String, JsonValue>, key: &str) -> Vec<String> {
    obj.get(key)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

/// Fill every field of a loosely-typed practical from `raw`, falling back to
/// defaults. `position` is the 0-based index used for a missing id.
pub fn normalize_item(raw: &JsonValue, position: usize, default_lab_hours: i64) -> PracticalItem {
    let fallback_id = format!("practical{}", position + 1);
    let Some(obj) = raw.as_object() else {
        return PracticalItem::with_defaults(fallback_id, default_lab_hours);
    };
    let id = obj
        .get("id")
        .and_then(|v| v.as_str())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or(fallback_id);
    let lab_hours = obj
        .get("lab_hours")
        .filter(|v| v.is_number())
        .and_then(parse_hours)
        .unwrap_or(default_lab_hours);

    PracticalItem {
        id,
        practical_aim: text_or_default(obj, "practical_aim"),
        associated_units: list_or_default(obj, "associated_units"),
        probable_week: text_or_default(obj, "probable_week"),
        lab_hours,
        software_hardware_requirements: text_or_default(obj, "software_hardware_requirements"),
        practical_tasks: text_or_default(obj, "practical_tasks"),
        evaluation_methods: list_or_default(obj, "evaluation_methods"),
        other_evaluation_method: text_or_default(obj, "other_evaluation_method"),
        practical_pedagogy: text_or_default(obj, "practical_pedagogy"),
        other_pedagogy: text_or_default(obj, "other_pedagogy"),
        reference_material: text_or_default(obj, "reference_material"),
        co_mapping: list_or_default(obj, "co_mapping"),
        pso_mapping: list_or_default(obj, "pso_mapping"),
        peo_mapping: list_or_default(obj, "peo_mapping"),
        blooms_taxonomy: list_or_default(obj, "blooms_taxonomy"),
        skill_mapping: list_or_default(obj, "skill_mapping"),
        skill_objectives: text_or_default(obj, "skill_objectives"),
        faculty_name: text_or_default(obj, "faculty_name"),
    }
}

/// Normalize a loaded list and resolve unit ids to display names.
pub fn normalize_loaded(
    raw: &[JsonValue],
    units: &UnitCatalogue,
    default_lab_hours: i64,
) -> Vec<PracticalItem> {
    raw.iter()
        .enumerate()
        .map(|(i, v)| {
            let mut item = normalize_item(v, i, default_lab_hours);
            item.associated_units = item
                .associated_units
                .iter()
                .map(|u| units.display_name(u))
                .collect();
            item
        })
        .collect()
}

fn require_text(errors: &mut FieldErrors, field: PracticalField, value: &str, msg: &str) {
    if value.trim().is_empty() {
        errors.insert(field.name().to_string(), msg.to_string());
    }
}

fn require_list(errors: &mut FieldErrors, field: PracticalField, value: &[String], msg: &str) {
    if value.is_empty() {
        errors.insert(field.name().to_string(), msg.to_string());
    }
}

pub fn validate_item(item: &PracticalItem, flags: SubjectFlags) -> FieldErrors {
    use PracticalField as F;
    let mut errors = FieldErrors::new();
    require_text(&mut errors, F::PracticalAim, &item.practical_aim, "Practical aim is required");
    if !flags.practical_only() {
        require_list(
            &mut errors,
            F::AssociatedUnits,
            &item.associated_units,
            "Associated units are required",
        );
    }
    require_text(&mut errors, F::ProbableWeek, &item.probable_week, "Probable week is required");
    if item.lab_hours < 1 {
        errors.insert(
            F::LabHours.name().to_string(),
            "Lab hours must be at least 1".to_string(),
        );
    }
    require_text(
        &mut errors,
        F::SoftwareHardwareRequirements,
        &item.software_hardware_requirements,
        "Software/hardware requirements are required",
    );
    require_text(&mut errors, F::PracticalTasks, &item.practical_tasks, "Practical tasks are required");
    require_list(
        &mut errors,
        F::EvaluationMethods,
        &item.evaluation_methods,
        "At least one evaluation method is required",
    );
    require_text(
        &mut errors,
        F::PracticalPedagogy,
        &item.practical_pedagogy,
        "Practical pedagogy is required",
    );
    require_text(
        &mut errors,
        F::ReferenceMaterial,
        &item.reference_material,
        "Reference material is required",
    );
    require_list(&mut errors, F::CoMapping, &item.co_mapping, "CO mapping is required");
    require_list(
        &mut errors,
        F::BloomsTaxonomy,
        &item.blooms_taxonomy,
        "At least one Bloom's taxonomy level is required",
    );
    require_list(
        &mut errors,
        F::SkillMapping,
        &item.skill_mapping,
        "At least one skill must be mapped",
    );
    require_text(
        &mut errors,
        F::SkillObjectives,
        &item.skill_objectives,
        "Skill objectives are required",
    );
    errors
}

#[cfg(test)]
pub(crate) fn complete_item(id: &str) -> PracticalItem {
    let mut item = PracticalItem::with_defaults(id, DEFAULT_LAB_HOURS);
    item.practical_aim = "Measure voltage".into();
    item.associated_units = vec!["Unit 1: Circuits".into()];
    item.probable_week = "Week 1 (01-07-2026 - 07-07-2026)".into();
    item.software_hardware_requirements = "Multimeter".into();
    item.practical_tasks = "Measure across R1".into();
    item.evaluation_methods = vec!["Viva".into()];
    item.practical_pedagogy = "Experiential Learning".into();
    item.reference_material = "Lab manual ch. 2".into();
    item.co_mapping = vec!["co-1".into()];
    item.blooms_taxonomy = vec!["Apply".into()];
    item.skill_mapping = vec!["Technical Skills".into()];
    item.skill_objectives = "Use a multimeter".into();
    item
}
