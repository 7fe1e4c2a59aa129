//! Flat output rows for the `applications` and `medications` tables.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single table cell. `None` is an explicit missing value.
pub type Cell = Option<String>;

/// Render text as a cell. Empty text is missing, since CSV cannot tell the
/// two apart and loaded tables must compare equal to freshly built ones.
pub fn text_cell(text: &str) -> Cell {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Render a JSON scalar as a cell.
pub fn value_cell(value: &Value) -> Cell {
    match value {
        Value::Null => None,
        Value::String(s) => text_cell(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn flag_cell(flag: bool) -> Cell {
    Some(flag.to_string())
}

/// A row type with a fixed, ordered column set.
pub trait TableRecord {
    const COLUMNS: &'static [&'static str];

    /// Cells in `COLUMNS` order.
    fn cells(&self) -> Vec<Cell>;
}

/// One row per applicant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub uid: String,
    pub check_it: bool,
    pub reason_checking: String,
    pub status: String,
    pub true_tier: String,
    pub applicant_id: Value,
    pub is_main_applicant: bool,
    pub first_name: String,
    pub last_name: String,
    pub mid_name: String,
    pub phone: String,
    pub gender: String,
    pub dob: String,
    pub nicotine: bool,
    pub weight: Value,
    pub height: Value,
    pub height_ft: Value,
    pub height_in: Value,
    /// Aggregates over the applicant's medications; `None` when no matching
    /// medication carries a value for the field.
    pub medications: Option<String>,
    pub dosages: Option<String>,
    pub dosage_units: Option<String>,
    pub frequencies: Option<String>,
    pub descriptions: Option<String>,
    pub reason_checking_logs: String,
    pub reason_checking_med: String,
    pub reason_checking_dosage_unit: String,
}

impl TableRecord for ApplicationRecord {
    const COLUMNS: &'static [&'static str] = &[
        "uid",
        "check_it",
        "reason_checking",
        "status",
        "true_tier",
        "applicant_id",
        "is_main_applicant",
        "firstName",
        "lastName",
        "midName",
        "phone",
        "gender",
        "dob",
        "nicotine",
        "weight",
        "height",
        "heightFt",
        "heightIn",
        "medications",
        "dosages",
        "dosage_unit",
        "frequencies",
        "descriptions",
        "reason_checking_logs",
        "reason_checking_med",
        "reason_checking_dosage_unit",
    ];

    fn cells(&self) -> Vec<Cell> {
        vec![
            text_cell(&self.uid),
            flag_cell(self.check_it),
            text_cell(&self.reason_checking),
            text_cell(&self.status),
            text_cell(&self.true_tier),
            value_cell(&self.applicant_id),
            flag_cell(self.is_main_applicant),
            text_cell(&self.first_name),
            text_cell(&self.last_name),
            text_cell(&self.mid_name),
            text_cell(&self.phone),
            text_cell(&self.gender),
            text_cell(&self.dob),
            flag_cell(self.nicotine),
            value_cell(&self.weight),
            value_cell(&self.height),
            value_cell(&self.height_ft),
            value_cell(&self.height_in),
            self.medications.clone(),
            self.dosages.clone(),
            self.dosage_units.clone(),
            self.frequencies.clone(),
            self.descriptions.clone(),
            text_cell(&self.reason_checking_logs),
            text_cell(&self.reason_checking_med),
            text_cell(&self.reason_checking_dosage_unit),
        ]
    }
}

/// One row per medication entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationRecord {
    pub uid: String,
    pub applicant_id: Value,
    pub medication: String,
    pub rxcui: String,
    pub dosage: String,
    pub dosage_unit: String,
    pub frequency: String,
    pub description: String,
    pub standardized_dose: Option<String>,
    pub standardized_unit: Option<String>,
    pub check_it: bool,
    pub reason_checking: String,
    pub reason_checking_dosage_unit: String,
}

impl TableRecord for MedicationRecord {
    const COLUMNS: &'static [&'static str] = &[
        "uid",
        "applicant_id",
        "medication",
        "rxcui",
        "dosage",
        "dosage_unit",
        "frequency",
        "description",
        "standardized_dose",
        "standardized_unit",
        "check_it",
        "reason_checking",
        "reason_checking_dosage_unit",
    ];

    fn cells(&self) -> Vec<Cell> {
        vec![
            text_cell(&self.uid),
            value_cell(&self.applicant_id),
            text_cell(&self.medication),
            text_cell(&self.rxcui),
            text_cell(&self.dosage),
            text_cell(&self.dosage_unit),
            text_cell(&self.frequency),
            text_cell(&self.description),
            self.standardized_dose.as_deref().and_then(text_cell),
            self.standardized_unit.as_deref().and_then(text_cell),
            flag_cell(self.check_it),
            text_cell(&self.reason_checking),
            text_cell(&self.reason_checking_dosage_unit),
        ]
    }
}
