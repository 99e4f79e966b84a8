//! Planned vs. actual CIE comparison. Everything here is a pure projection
//! except [`resolve_document`], which asks a resolver for a link on demand.

use crate::catalog::{UnitCatalogue, UnitRef};
use crate::error::StoreError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::warn;

const NONE_SHOWN: &str = "-";
const NOT_UPLOADED: &str = "Not Uploaded";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PlannedCie {
    pub id: String,
    #[serde(default)]
    pub units_covered: Vec<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub marks: Option<JsonValue>,
    #[serde(default)]
    pub duration: Option<JsonValue>,
    #[serde(default)]
    pub co_mapping: Vec<JsonValue>,
    #[serde(default)]
    pub pso_mapping: Vec<JsonValue>,
    #[serde(default)]
    pub evaluation_pedagogy: Option<String>,
    #[serde(default)]
    pub custom_pedagogy: Option<String>,
    #[serde(default)]
    pub other_pedagogy: Option<String>,
    #[serde(default)]
    pub blooms_taxonomy: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PlannedCieForm {
    pub cies: Vec<PlannedCie>,
    #[serde(default)]
    pub units: Vec<UnitRef>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ActualCie {
    pub id: String,
    pub cie_number: i64,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub actual_units: Option<String>,
    #[serde(default)]
    pub actual_date: Option<String>,
    #[serde(default)]
    pub actual_marks: Option<JsonValue>,
    #[serde(default)]
    pub actual_duration: Option<JsonValue>,
    #[serde(default)]
    pub co: Option<String>,
    #[serde(default)]
    pub pso: Option<String>,
    #[serde(default)]
    pub actual_pedagogy: Option<String>,
    #[serde(default)]
    pub actual_blooms: Option<String>,
    #[serde(default)]
    pub quality_review_date: Option<String>,
    #[serde(default)]
    pub marks_display_document: Option<String>,
    #[serde(default)]
    pub cie_paper_document: Option<String>,
    #[serde(default, alias = "evalution_analysis_document")]
    pub evaluation_analysis_document: Option<String>,
    #[serde(default)]
    pub reason_for_change: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    MarksDisplay,
    QuestionPaper,
    EvaluationAnalysis,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 3] = [
        Self::MarksDisplay,
        Self::QuestionPaper,
        Self::EvaluationAnalysis,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "marks_display" => Some(Self::MarksDisplay),
            "question_paper" => Some(Self::QuestionPaper),
            "evaluation_analysis" => Some(Self::EvaluationAnalysis),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::MarksDisplay => "marks_display",
            Self::QuestionPaper => "question_paper",
            Self::EvaluationAnalysis => "evaluation_analysis",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::MarksDisplay => "Marks Display Document",
            Self::QuestionPaper => "CIE Question Paper",
            Self::EvaluationAnalysis => "Evaluation Analysis Report",
        }
    }

    pub fn path_in(self, actual: &ActualCie) -> Option<&str> {
        let raw = match self {
            Self::MarksDisplay => actual.marks_display_document.as_deref(),
            Self::QuestionPaper => actual.cie_paper_document.as_deref(),
            Self::EvaluationAnalysis => actual.evaluation_analysis_document.as_deref(),
        };
        raw.map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRow {
    pub units: String,
    pub date: String,
    pub marks: String,
    pub duration: String,
    pub co_pso: String,
    pub pedagogy: String,
    pub blooms: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSlot {
    pub kind: &'static str,
    pub label: &'static str,
    pub uploaded: bool,
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonBlock {
    pub title: String,
    pub planned_id: String,
    pub actual_id: String,
    pub caption: Option<String>,
    pub planned: ComparisonRow,
    pub actual: ComparisonRow,
    pub quality_review_date: String,
    pub reason_for_gap: String,
    pub documents: Vec<DocumentSlot>,
}

/// `cie3` -> 3. Leading digits after the optional `cie` prefix.
pub fn cie_sequence(id: &str) -> Option<i64> {
    let rest = id.trim();
    let rest = rest.strip_prefix("cie").unwrap_or(rest);
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn or_dash(s: String) -> String {
    if s.trim().is_empty() {
        NONE_SHOWN.to_string()
    } else {
        s
    }
}

/// Empty strings, zero and null all show as `-`.
fn scalar_display(v: Option<&JsonValue>) -> String {
    match v {
        Some(JsonValue::String(s)) => or_dash(s.clone()),
        Some(JsonValue::Number(n)) if n.as_f64() != Some(0.0) => n.to_string(),
        Some(JsonValue::Bool(true)) => "true".to_string(),
        _ => NONE_SHOWN.to_string(),
    }
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// ISO date or timestamp as `dd-mm-yyyy`; unparsable input is shown as-is.
pub fn format_display_date(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return NONE_SHOWN.to_string();
    };
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|d| d.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|d| d.date())
        });
    match date {
        Some(d) => d.format("%d-%m-%Y").to_string(),
        None => raw.to_string(),
    }
}

fn outcome_labels(co: usize, pso: usize) -> Vec<String> {
    (1..=co)
        .map(|i| format!("CO{}", i))
        .chain((1..=pso).map(|i| format!("PSO{}", i)))
        .collect()
}

fn planned_pedagogy(cie: &PlannedCie) -> String {
    let pedagogy = cie.evaluation_pedagogy.clone().unwrap_or_default();
    if pedagogy == "Other" {
        let custom = cie
            .custom_pedagogy
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or(cie.other_pedagogy.as_deref())
            .filter(|s| !s.trim().is_empty());
        if let Some(c) = custom {
            return c.to_string();
        }
    }
    or_dash(pedagogy)
}

fn planned_row(cie: &PlannedCie, units: &UnitCatalogue) -> ComparisonRow {
    let unit_names = if cie.units_covered.is_empty() {
        NONE_SHOWN.to_string()
    } else {
        cie.units_covered
            .iter()
            .map(|id| units.name_for_id(id).unwrap_or(NONE_SHOWN))
            .collect::<Vec<_>>()
            .join(", ")
    };
    ComparisonRow {
        units: unit_names,
        date: or_dash(cie.date.clone().unwrap_or_default()),
        marks: scalar_display(cie.marks.as_ref()),
        duration: scalar_display(cie.duration.as_ref()),
        co_pso: outcome_labels(cie.co_mapping.len(), cie.pso_mapping.len()).join(", "),
        pedagogy: planned_pedagogy(cie),
        blooms: cie.blooms_taxonomy.join(", "),
    }
}

fn actual_row(actual: &ActualCie, units: &UnitCatalogue) -> ComparisonRow {
    let unit_names: Vec<&str> = split_list(actual.actual_units.as_deref())
        .iter()
        .filter_map(|n| n.parse::<usize>().ok())
        .filter_map(|n| units.name_at(n))
        .collect();
    let blooms = split_list(actual.actual_blooms.as_deref());
    ComparisonRow {
        units: or_dash(unit_names.join(", ")),
        date: format_display_date(actual.actual_date.as_deref()),
        marks: scalar_display(actual.actual_marks.as_ref()),
        duration: scalar_display(actual.actual_duration.as_ref()),
        co_pso: outcome_labels(
            split_list(actual.co.as_deref()).len(),
            split_list(actual.pso.as_deref()).len(),
        )
        .join(","),
        pedagogy: or_dash(actual.actual_pedagogy.clone().unwrap_or_default()),
        blooms: or_dash(blooms.join(", ")),
    }
}

fn document_slots(actual: &ActualCie) -> Vec<DocumentSlot> {
    DocumentKind::ALL
        .into_iter()
        .map(|kind| {
            let path = kind.path_in(actual).map(str::to_string);
            DocumentSlot {
                kind: kind.key(),
                label: kind.label(),
                uploaded: path.is_some(),
                path,
            }
        })
        .collect()
}

/// One block per planned CIE that has a recorded actual with the same
/// sequence number, in planned order.
pub fn build_comparison(form: &PlannedCieForm, actuals: &[ActualCie]) -> Vec<ComparisonBlock> {
    let units = UnitCatalogue::new(form.units.clone());
    form.cies
        .iter()
        .enumerate()
        .filter_map(|(index, cie)| {
            let seq = cie_sequence(&cie.id)?;
            let actual = actuals.iter().find(|a| a.cie_number == seq)?;
            Some(ComparisonBlock {
                title: format!("CIE {}", index + 1),
                planned_id: cie.id.clone(),
                actual_id: actual.id.clone(),
                caption: actual.number.clone(),
                planned: planned_row(cie, &units),
                actual: actual_row(actual, &units),
                quality_review_date: format_display_date(actual.quality_review_date.as_deref()),
                reason_for_gap: actual
                    .reason_for_change
                    .clone()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| NOT_UPLOADED.to_string()),
                documents: document_slots(actual),
            })
        })
        .collect()
}

pub trait DocumentLinkResolver {
    /// Public URL for a stored document path, `None` if it cannot be served.
    fn public_url(&self, path: &str) -> Result<Option<String>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentLink {
    Available { url: String },
    Unavailable { message: String },
}

pub fn resolve_document(
    resolver: &dyn DocumentLinkResolver,
    path: Option<&str>,
    label: &str,
) -> DocumentLink {
    let Some(path) = path.map(str::trim).filter(|p| !p.is_empty()) else {
        return DocumentLink::Unavailable {
            message: format!("No {} available", label),
        };
    };
    match resolver.public_url(path) {
        Ok(Some(url)) => DocumentLink::Available { url },
        Ok(None) => DocumentLink::Unavailable {
            message: format!("Unable to access {}", label),
        },
        Err(e) => {
            warn!(path, error = %e, "document link resolution failed");
            DocumentLink::Unavailable {
                message: format!("Error accessing {}", label),
            }
        }
    }
}
