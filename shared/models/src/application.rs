//! Insurance application document as returned by the extraction model.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lenient;

/// One parsed extraction result for a single PDF.
///
/// Fields mirror the JSON schema handed to the model. Only the parts the
/// record builders read are typed; clinical fields nobody consumes are kept
/// as raw JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDocument {
    #[serde(default)]
    pub uid: Option<Value>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub check_it: bool,
    #[serde(default, deserialize_with = "lenient::text")]
    pub reason_checking: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub true_tier: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub reason_checking_logs: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub reason_checking_med: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub reason_checking_dosage_unit: String,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub applicants: Vec<Applicant>,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub plans: Vec<Plan>,
    #[serde(default, deserialize_with = "lenient::section")]
    pub phq: Option<Phq>,
    #[serde(default)]
    pub income: Option<Value>,
    #[serde(default, deserialize_with = "lenient::section")]
    pub address: Option<Address>,
}

/// A person listed on the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Applicant {
    #[serde(default)]
    pub applicant: Option<Value>,
    #[serde(default, deserialize_with = "lenient::optional_flag")]
    pub is_main_applicant: Option<bool>,
    #[serde(default, rename = "firstName", deserialize_with = "lenient::text")]
    pub first_name: String,
    #[serde(default, rename = "lastName", deserialize_with = "lenient::text")]
    pub last_name: String,
    #[serde(default, rename = "midName", deserialize_with = "lenient::text")]
    pub mid_name: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub phone: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub gender: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub dob: String,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub nicotine: bool,
    #[serde(default)]
    pub weight: Option<Value>,
    #[serde(default)]
    pub height: Option<Value>,
    #[serde(default, rename = "heightFt")]
    pub height_ft: Option<Value>,
    #[serde(default, rename = "heightIn")]
    pub height_in: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, rename = "priceId")]
    pub price_id: Option<Value>,
}

/// Personal health questionnaire section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Phq {
    #[serde(default, deserialize_with = "lenient::flag")]
    pub treatment: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub invalid: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub pregnancy: bool,
    #[serde(default, rename = "effectiveDate", deserialize_with = "lenient::text")]
    pub effective_date: String,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub disclaimer: bool,
    #[serde(default, deserialize_with = "lenient::text")]
    pub signature: String,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub medications: Vec<Medication>,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub issues: Vec<Value>,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub conditions: Vec<Value>,
}

/// A medication entry from `phq.medications`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    #[serde(default)]
    pub applicant: Option<Value>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub rxcui: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub dosage: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub dosage_unit: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub frequency: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, deserialize_with = "lenient::text")]
    pub address1: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub address2: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub city: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub state: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub zipcode: String,
}

impl ApplicationDocument {
    /// Decode a parsed JSON value. Fails only when the value is not an
    /// object; badly shaped sections decode as absent or empty.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Medications listed in the questionnaire, empty when `phq` is absent.
    pub fn medications(&self) -> &[Medication] {
        self.phq
            .as_ref()
            .map(|phq| phq.medications.as_slice())
            .unwrap_or(&[])
    }

    /// Identity medications fall back to when they name no applicant: the
    /// first applicant's explicit id, or `0`.
    pub fn main_applicant_id(&self) -> Value {
        self.applicants
            .first()
            .and_then(|a| a.applicant.clone())
            .unwrap_or_else(|| Value::from(0))
    }
}

impl Applicant {
    /// Explicit `applicant` id, else the position in the `applicants` list.
    pub fn resolved_id(&self, position: usize) -> Value {
        self.applicant
            .clone()
            .unwrap_or_else(|| Value::from(position))
    }

    /// Explicit flag, else `true` only for the first entry.
    pub fn resolved_is_main(&self, position: usize) -> bool {
        self.is_main_applicant.unwrap_or(position == 0)
    }
}

impl Medication {
    /// Applicant this entry belongs to, using `fallback` when none is named.
    pub fn applicant_id_or(&self, fallback: &Value) -> Value {
        self.applicant.clone().unwrap_or_else(|| fallback.clone())
    }
}
