//! Workspace setup sections stored as JSON in `workspace_settings`.

use crate::db;
use crate::practical::DEFAULT_LAB_HOURS;
use crate::section::SectionSettings;
use crate::weeks::DEFAULT_MAX_WEEKS;
use rusqlite::Connection;
use serde_json::{json, Map, Value};
use tracing::warn;

pub const DEFAULT_DOCUMENT_BUCKET: &str = "actual-cies";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupSection {
    Practical,
    Documents,
}

impl SetupSection {
    pub const ALL: [SetupSection; 2] = [Self::Practical, Self::Documents];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "practical" => Some(Self::Practical),
            "documents" => Some(Self::Documents),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Practical => "practical",
            Self::Documents => "documents",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Practical => "setup.practical",
            Self::Documents => "setup.documents",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Practical => json!({
            "defaultLabHours": DEFAULT_LAB_HOURS,
            "maxWeeks": DEFAULT_MAX_WEEKS,
            "autoLoadDrafts": true
        }),
        SetupSection::Documents => json!({
            "publicBaseUrl": null,
            "bucket": DEFAULT_DOCUMENT_BUCKET
        }),
    }
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.len() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

/// Applies `patch` onto `current`, rejecting unknown keys and bad values.
/// Nothing is written on error.
pub fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let mut next = current.clone();
    let obj = next
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Practical => match k.as_str() {
                "defaultLabHours" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 12)?));
                }
                "maxWeeks" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 52)?));
                }
                "autoLoadDrafts" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown practical field: {}", k)),
            },
            SetupSection::Documents => match k.as_str() {
                "publicBaseUrl" => {
                    let url = if v.is_null() {
                        Value::Null
                    } else {
                        let s = parse_string_max(v, k, 500)?;
                        if s.is_empty() {
                            Value::Null
                        } else if !(s.starts_with("http://") || s.starts_with("https://")) {
                            return Err("publicBaseUrl must start with http:// or https://".into());
                        } else {
                            Value::String(s.trim_end_matches('/').to_string())
                        }
                    };
                    obj.insert(k.clone(), url);
                }
                "bucket" => {
                    let s = parse_string_max(v, k, 63)?;
                    if s.is_empty() || s.contains('/') {
                        return Err("bucket must be a non-empty name without '/'".into());
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                _ => return Err(format!("unknown documents field: {}", k)),
            },
        }
    }
    *current = next;
    Ok(())
}

pub fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed historical values fall back to defaults.
            if let Err(e) = merge_section_patch(section, &mut current, saved_obj) {
                warn!(section = section.name(), error = %e, "ignoring saved setup");
            }
        }
    }
    Ok(current)
}

pub fn save_section(conn: &Connection, section: SetupSection, value: &Value) -> anyhow::Result<()> {
    db::settings_set_json(conn, section.key(), value)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PracticalSetup {
    pub default_lab_hours: i64,
    pub max_weeks: usize,
    pub auto_load_drafts: bool,
}

impl Default for PracticalSetup {
    fn default() -> Self {
        Self {
            default_lab_hours: DEFAULT_LAB_HOURS,
            max_weeks: DEFAULT_MAX_WEEKS,
            auto_load_drafts: true,
        }
    }
}

impl PracticalSetup {
    pub fn section_settings(self) -> SectionSettings {
        SectionSettings {
            default_lab_hours: self.default_lab_hours,
            auto_load_drafts: self.auto_load_drafts,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentsSetup {
    pub public_base_url: Option<String>,
    pub bucket: String,
}

impl Default for DocumentsSetup {
    fn default() -> Self {
        Self {
            public_base_url: None,
            bucket: DEFAULT_DOCUMENT_BUCKET.to_string(),
        }
    }
}

/// Read failures degrade to defaults; the editor must stay usable.
pub fn load_practical_setup(conn: &Connection) -> PracticalSetup {
    let obj = match load_section(conn, SetupSection::Practical) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "practical setup unreadable; using defaults");
            return PracticalSetup::default();
        }
    };
    let defaults = PracticalSetup::default();
    PracticalSetup {
        default_lab_hours: obj
            .get("defaultLabHours")
            .and_then(|v| v.as_i64())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.default_lab_hours),
        max_weeks: obj
            .get("maxWeeks")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .filter(|v| *v > 0)
            .unwrap_or(defaults.max_weeks),
        auto_load_drafts: obj
            .get("autoLoadDrafts")
            .and_then(|v| v.as_bool())
            .unwrap_or(defaults.auto_load_drafts),
    }
}

pub fn load_documents_setup(conn: &Connection) -> DocumentsSetup {
    let obj = match load_section(conn, SetupSection::Documents) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "documents setup unreadable; using defaults");
            return DocumentsSetup::default();
        }
    };
    DocumentsSetup {
        public_base_url: obj
            .get("publicBaseUrl")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        bucket: obj
            .get("bucket")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_DOCUMENT_BUCKET)
            .to_string(),
    }
}
