use crate::error::StoreError;
use crate::practical::SubjectFlags;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const PSO_PEO_FALLBACK_MESSAGE: &str = "Failed to load PSO/PEO. Default values used.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRef {
    pub id: String,
    pub name: String,
}

/// Ordered curriculum units of one subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnitCatalogue {
    units: Vec<UnitRef>,
}

impl UnitCatalogue {
    pub fn new(units: Vec<UnitRef>) -> Self {
        Self { units }
    }

    pub fn units(&self) -> &[UnitRef] {
        &self.units
    }

    /// Display value for a stored unit reference. Known ids become the unit
    /// name (or `Unit N` for an unnamed unit); anything else is returned as-is.
    pub fn display_name(&self, entry: &str) -> String {
        match self.units.iter().position(|u| u.id == entry) {
            Some(pos) => {
                let name = self.units[pos].name.trim();
                if name.is_empty() {
                    format!("Unit {}", pos + 1)
                } else {
                    name.to_string()
                }
            }
            None => entry.to_string(),
        }
    }

    /// Name of the unit at a 1-based position, as recorded in actuals.
    pub fn name_at(&self, number: usize) -> Option<&str> {
        number
            .checked_sub(1)
            .and_then(|i| self.units.get(i))
            .map(|u| u.name.as_str())
    }

    pub fn name_for_id(&self, id: &str) -> Option<&str> {
        self.units
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeItem {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl OutcomeItem {
    fn new(id: &str, label: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            label: Some(label.to_string()),
            description: description.to_string(),
        }
    }
}

pub fn default_pso_options() -> Vec<OutcomeItem> {
    (1..=5)
        .map(|i| {
            OutcomeItem::new(
                &format!("pso-{i}"),
                &format!("PSO{i}"),
                &format!("Program Specific Outcome {i}"),
            )
        })
        .collect()
}

pub fn default_peo_options() -> Vec<OutcomeItem> {
    (1..=5)
        .map(|i| {
            OutcomeItem::new(
                &format!("peo-{i}"),
                &format!("PEO{i}"),
                &format!("Program Educational Objective {i}"),
            )
        })
        .collect()
}

/// Stored department lists; either may be absent.
#[derive(Debug, Clone, Default)]
pub struct StoredPsoPeo {
    pub pso: Option<Vec<OutcomeItem>>,
    pub peo: Option<Vec<OutcomeItem>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PsoPeoCatalogue {
    pub pso: Vec<OutcomeItem>,
    pub peo: Vec<OutcomeItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SubjectInfo {
    pub id: String,
    pub code: String,
    pub name: String,
    pub department_id: Option<String>,
    pub flags: SubjectFlags,
    pub term_start_date: Option<String>,
    pub term_end_date: Option<String>,
}

/// Read-only lookups keyed by subject, department or faculty id.
pub trait ReferenceCatalogues {
    fn subject(&self, subject_id: &str) -> Result<Option<SubjectInfo>, StoreError>;
    fn units(&self, subject_id: &str) -> Result<UnitCatalogue, StoreError>;
    fn course_outcomes(&self, subject_id: &str) -> Result<Vec<OutcomeItem>, StoreError>;
    fn department_pso_peo(&self, department_id: &str) -> Result<Option<StoredPsoPeo>, StoreError>;
    fn faculty_name(&self, faculty_id: &str) -> Result<Option<String>, StoreError>;
}

/// PSO/PEO for a subject's department. The fallback message is raised only
/// when the subject's department cannot be determined; a missing department
/// row or list is filled from the built-in lists without one.
pub fn load_pso_peo(catalogues: &dyn ReferenceCatalogues, subject_id: &str) -> PsoPeoCatalogue {
    let department_id = match catalogues.subject(subject_id) {
        Ok(Some(s)) => s.department_id.filter(|d| !d.trim().is_empty()),
        Ok(None) => None,
        Err(e) => {
            warn!(subject_id, error = %e, "subject lookup failed; using default PSO/PEO");
            None
        }
    };
    let Some(department_id) = department_id else {
        return PsoPeoCatalogue {
            pso: default_pso_options(),
            peo: default_peo_options(),
            fallback: Some(PSO_PEO_FALLBACK_MESSAGE.to_string()),
        };
    };

    let stored = match catalogues.department_pso_peo(&department_id) {
        Ok(Some(stored)) => stored,
        Ok(None) => {
            warn!(department_id = %department_id, "no department PSO/PEO; using defaults");
            StoredPsoPeo::default()
        }
        Err(e) => {
            warn!(department_id = %department_id, error = %e, "department PSO/PEO lookup failed");
            StoredPsoPeo::default()
        }
    };
    PsoPeoCatalogue {
        pso: stored.pso.unwrap_or_else(default_pso_options),
        peo: stored.peo.unwrap_or_else(default_peo_options),
        fallback: None,
    }
}
