//! Record Normalizer
//!
//! Flattens one extraction document into application rows (one per
//! applicant) and medication rows (one per medication entry).

use serde_json::Value;
use tracing::warn;

use intake_models::{
    value_cell, Applicant, ApplicationDocument, ApplicationRecord, Medication, MedicationRecord,
};

use super::dosage::DosagePolicy;

/// Stand-in for a blank value inside an aggregate column.
pub const PLACEHOLDER: &str = "NaN";

/// Delimiter between entries of an aggregate column.
pub const SEPARATOR: &str = " | ";

/// A medication whose applicant id matches no applicant on the document.
#[derive(Debug, Clone, PartialEq)]
pub struct UnassociatedMedication {
    pub position: usize,
    pub applicant_id: Value,
    pub name: String,
}

/// Everything derived from one document.
#[derive(Debug, Clone, Default)]
pub struct NormalizedDocument {
    pub applications: Vec<ApplicationRecord>,
    pub medications: Vec<MedicationRecord>,
    pub unassociated: Vec<UnassociatedMedication>,
}

/// Builds table rows from extraction documents
#[derive(Debug, Clone, Default)]
pub struct RecordNormalizer {
    dosage_policy: DosagePolicy,
}

impl RecordNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure how standardized dose columns are filled
    pub fn with_dosage_policy(mut self, policy: DosagePolicy) -> Self {
        self.dosage_policy = policy;
        self
    }

    /// Build both tables' rows and collect medications no applicant claims.
    pub fn normalize(&self, doc: &ApplicationDocument) -> NormalizedDocument {
        let unassociated = self.find_unassociated(doc);
        for orphan in &unassociated {
            warn!(
                applicant_id = %orphan.applicant_id,
                medication = %orphan.name,
                "medication references an unknown applicant"
            );
        }

        NormalizedDocument {
            applications: self.build_application_records(doc),
            medications: self.build_medication_records(doc),
            unassociated,
        }
    }

    /// One row per applicant; a document without applicants still yields one
    /// placeholder row.
    pub fn build_application_records(&self, doc: &ApplicationDocument) -> Vec<ApplicationRecord> {
        let placeholder = [Applicant::default()];
        let applicants: &[Applicant] = if doc.applicants.is_empty() {
            &placeholder
        } else {
            &doc.applicants
        };

        let main_id = doc.main_applicant_id();
        let uid = render_uid(doc);

        applicants
            .iter()
            .enumerate()
            .map(|(idx, applicant)| {
                let applicant_id = applicant.resolved_id(idx);
                let matching: Vec<&Medication> = doc
                    .medications()
                    .iter()
                    .filter(|m| m.applicant_id_or(&main_id) == applicant_id)
                    .collect();

                ApplicationRecord {
                    uid: uid.clone(),
                    check_it: doc.check_it,
                    reason_checking: doc.reason_checking.clone(),
                    status: doc.status.clone(),
                    true_tier: doc.true_tier.clone(),
                    is_main_applicant: applicant.resolved_is_main(idx),
                    applicant_id,
                    first_name: applicant.first_name.clone(),
                    last_name: applicant.last_name.clone(),
                    mid_name: applicant.mid_name.clone(),
                    phone: applicant.phone.clone(),
                    gender: applicant.gender.clone(),
                    dob: applicant.dob.clone(),
                    nicotine: applicant.nicotine,
                    weight: number_or_zero(&applicant.weight),
                    height: number_or_zero(&applicant.height),
                    height_ft: number_or_zero(&applicant.height_ft),
                    height_in: number_or_zero(&applicant.height_in),
                    medications: aggregate(&matching, |m| &m.name),
                    dosages: aggregate(&matching, |m| &m.dosage),
                    dosage_units: aggregate(&matching, |m| &m.dosage_unit),
                    frequencies: aggregate(&matching, |m| &m.frequency),
                    descriptions: aggregate(&matching, |m| &m.description),
                    reason_checking_logs: doc.reason_checking_logs.clone(),
                    reason_checking_med: doc.reason_checking_med.clone(),
                    reason_checking_dosage_unit: doc.reason_checking_dosage_unit.clone(),
                }
            })
            .collect()
    }

    /// One row per medication entry, independent of applicant matching.
    pub fn build_medication_records(&self, doc: &ApplicationDocument) -> Vec<MedicationRecord> {
        let main_id = doc.main_applicant_id();
        let uid = render_uid(doc);

        doc.medications()
            .iter()
            .map(|med| {
                let (standardized_dose, standardized_unit) =
                    self.dosage_policy.apply(&med.dosage, &med.dosage_unit);

                MedicationRecord {
                    uid: uid.clone(),
                    applicant_id: med.applicant_id_or(&main_id),
                    medication: med.name.clone(),
                    rxcui: med.rxcui.clone(),
                    dosage: med.dosage.clone(),
                    dosage_unit: med.dosage_unit.clone(),
                    frequency: med.frequency.clone(),
                    description: med.description.clone(),
                    standardized_dose,
                    standardized_unit,
                    check_it: doc.check_it,
                    reason_checking: doc.reason_checking.clone(),
                    reason_checking_dosage_unit: doc.reason_checking_dosage_unit.clone(),
                }
            })
            .collect()
    }

    fn find_unassociated(&self, doc: &ApplicationDocument) -> Vec<UnassociatedMedication> {
        let known: Vec<Value> = if doc.applicants.is_empty() {
            vec![Value::from(0)]
        } else {
            doc.applicants
                .iter()
                .enumerate()
                .map(|(idx, a)| a.resolved_id(idx))
                .collect()
        };
        let main_id = doc.main_applicant_id();

        doc.medications()
            .iter()
            .enumerate()
            .filter_map(|(position, med)| {
                let applicant_id = med.applicant_id_or(&main_id);
                if known.contains(&applicant_id) {
                    None
                } else {
                    Some(UnassociatedMedication {
                        position,
                        applicant_id,
                        name: med.name.clone(),
                    })
                }
            })
            .collect()
    }
}

/// Join one field across medications. Blank entries become [`PLACEHOLDER`];
/// when every entry is blank (or there are none) the aggregate is missing.
fn aggregate<F>(medications: &[&Medication], field: F) -> Option<String>
where
    F: Fn(&Medication) -> &String,
{
    if medications.iter().all(|m| field(*m).trim().is_empty()) {
        return None;
    }

    let parts: Vec<&str> = medications
        .iter()
        .map(|m| match field(*m).trim() {
            "" => PLACEHOLDER,
            value => value,
        })
        .collect();

    Some(parts.join(SEPARATOR))
}

fn render_uid(doc: &ApplicationDocument) -> String {
    doc.uid.as_ref().and_then(value_cell).unwrap_or_default()
}

fn number_or_zero(value: &Option<Value>) -> Value {
    match value {
        Some(Value::Null) | None => Value::from(0),
        Some(v) => v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> ApplicationDocument {
        ApplicationDocument::from_value(value).unwrap()
    }

    #[test]
    fn test_empty_applicants_yield_placeholder_row() {
        let records = RecordNormalizer::new().build_application_records(&doc(json!({ "uid": "U" })));

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].applicant_id, json!(0));
        assert!(records[0].is_main_applicant);
        assert_eq!(records[0].weight, json!(0));
        assert!(!records[0].nicotine);
        assert_eq!(records[0].first_name, "");
    }

    #[test]
    fn test_positional_ids_and_main_flag() {
        let records = RecordNormalizer::new().build_application_records(&doc(json!({
            "applicants": [{ "firstName": "A" }, { "firstName": "B" }, { "applicant": 7 }]
        })));

        let ids: Vec<Value> = records.iter().map(|r| r.applicant_id.clone()).collect();
        assert_eq!(ids, vec![json!(0), json!(1), json!(7)]);
        assert!(records[0].is_main_applicant);
        assert!(!records[1].is_main_applicant);
        assert!(!records[2].is_main_applicant);
    }

    #[test]
    fn test_aggregate_join_with_placeholder() {
        let records = RecordNormalizer::new().build_application_records(&doc(json!({
            "applicants": [{ "applicant": 0 }],
            "phq": { "medications": [
                { "name": "A", "dosage": "5mg" },
                { "name": "", "dosage": "10mg" }
            ]}
        })));

        assert_eq!(records[0].medications.as_deref(), Some("A | NaN"));
        assert_eq!(records[0].dosages.as_deref(), Some("5mg | 10mg"));
        assert_eq!(records[0].frequencies, None);
        assert_eq!(records[0].descriptions, None);
    }

    #[test]
    fn test_no_matching_medications_are_missing() {
        let records = RecordNormalizer::new().build_application_records(&doc(json!({
            "applicants": [{ "applicant": 0 }, { "applicant": 1 }],
            "phq": { "medications": [{ "applicant": 0, "name": "Metformin" }] }
        })));

        assert_eq!(records[0].medications.as_deref(), Some("Metformin"));
        let dependent = &records[1];
        assert_eq!(dependent.medications, None);
        assert_eq!(dependent.dosages, None);
        assert_eq!(dependent.dosage_units, None);
        assert_eq!(dependent.frequencies, None);
        assert_eq!(dependent.descriptions, None);
    }

    #[test]
    fn test_medications_default_to_first_applicant_id() {
        let document = doc(json!({
            "applicants": [{ "applicant": 5 }, { "applicant": 6 }],
            "phq": { "medications": [
                { "name": "Aspirin" },
                { "applicant": 6, "name": "Insulin" }
            ]}
        }));
        let normalizer = RecordNormalizer::new();

        let apps = normalizer.build_application_records(&document);
        assert_eq!(apps[0].medications.as_deref(), Some("Aspirin"));
        assert_eq!(apps[1].medications.as_deref(), Some("Insulin"));

        let meds = normalizer.build_medication_records(&document);
        assert_eq!(meds[0].applicant_id, json!(5));
        assert_eq!(meds[1].applicant_id, json!(6));
    }

    #[test]
    fn test_mixed_id_types_do_not_associate() {
        let document = doc(json!({
            "applicants": [{ "applicant": 0 }],
            "phq": { "medications": [{ "applicant": "0", "name": "Lisinopril" }] }
        }));

        let normalized = RecordNormalizer::new().normalize(&document);
        assert_eq!(normalized.applications[0].medications, None);
        assert_eq!(normalized.medications.len(), 1);
        assert_eq!(normalized.unassociated.len(), 1);
        assert_eq!(normalized.unassociated[0].applicant_id, json!("0"));
        assert_eq!(normalized.unassociated[0].name, "Lisinopril");
    }

    #[test]
    fn test_document_fields_copied_to_every_row() {
        let document = doc(json!({
            "uid": 42,
            "check_it": true,
            "reason_checking": "dependents listed without names",
            "reason_checking_dosage_unit": "unit unclear",
            "applicants": [{}, {}],
            "phq": { "medications": [{ "name": "A" }] }
        }));
        let normalized = RecordNormalizer::new().normalize(&document);

        for row in &normalized.applications {
            assert_eq!(row.uid, "42");
            assert!(row.check_it);
            assert_eq!(row.reason_checking, "dependents listed without names");
        }
        assert!(normalized.medications[0].check_it);
        assert_eq!(normalized.medications[0].reason_checking_dosage_unit, "unit unclear");
    }

    #[test]
    fn test_absent_phq() {
        let normalized = RecordNormalizer::new().normalize(&doc(json!({
            "applicants": [{ "applicant": 0 }]
        })));

        assert!(normalized.medications.is_empty());
        assert!(normalized.unassociated.is_empty());
        assert_eq!(normalized.applications[0].medications, None);
    }

    #[test]
    fn test_standardized_columns_follow_policy() {
        let document = doc(json!({
            "phq": { "medications": [{ "name": "B12", "dosage": "2000", "dosage_unit": "mcg" }] }
        }));

        let verbatim = RecordNormalizer::new().build_medication_records(&document);
        assert_eq!(verbatim[0].standardized_dose.as_deref(), Some("2000"));
        assert_eq!(verbatim[0].standardized_unit.as_deref(), Some("mcg"));

        let normalized = RecordNormalizer::new()
            .with_dosage_policy(DosagePolicy::Normalize)
            .build_medication_records(&document);
        assert_eq!(normalized[0].standardized_dose.as_deref(), Some("2.0"));
        assert_eq!(normalized[0].standardized_unit.as_deref(), Some("mg"));
    }

    #[test]
    fn test_end_to_end_document() {
        let document = doc(json!({
            "uid": "X1",
            "applicants": [{ "applicant": 0, "is_main_applicant": true }],
            "phq": { "medications": [{
                "applicant": 0,
                "name": "Lisinopril",
                "dosage": "10mg",
                "dosage_unit": "mg",
                "frequency": "Once daily"
            }]}
        }));
        let normalized = RecordNormalizer::new().normalize(&document);

        assert_eq!(normalized.applications.len(), 1);
        let app = &normalized.applications[0];
        assert_eq!(app.uid, "X1");
        assert_eq!(app.medications.as_deref(), Some("Lisinopril"));
        assert_eq!(app.dosages.as_deref(), Some("10mg"));
        assert_eq!(app.frequencies.as_deref(), Some("Once daily"));

        assert_eq!(normalized.medications.len(), 1);
        assert_eq!(normalized.medications[0].medication, "Lisinopril");
    }
}
