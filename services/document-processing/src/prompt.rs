//! Extraction Prompt
//!
//! Handlebars rendering of the instruction sent to the model.

use handlebars::Handlebars;
use serde_json::json;
use std::fs;
use std::path::Path;

use intake_utils::{IntakeError, IntakeResult};

const TEMPLATE_NAME: &str = "extraction";

/// Description of the JSON object the model must return.
pub const TARGET_JSON_FORMAT: &str = r#"{
  "uid": "string (optional)",
  "check_it": bool,
  "reason_checking": "string",
  "applicants": [
    {
      "applicant": 0,
      "is_main_applicant": bool,
      "firstName": "string (optional)",
      "lastName": "string (optional)",
      "midName": "string (optional)",
      "phone": "string (optional)",
      "gender": "string (optional)",
      "dob": "YYYY-MM-DD (optional)",
      "nicotine": bool (optional),
      "weight": float (optional), (0 default)
      "height": int (optional), (0 default)
      "heightFt": int (optional), (0 default)
      "heightIn": int (optional) (0 default)
    }
  ],
  "plans": [
    {
      "id": int, (0 default)
      "priceId": int (0 default)
    }
  ],
  "phq": {
    "treatment": bool,
    "invalid": bool,
    "pregnancy": bool,
    "effectiveDate": "YYYY-MM-DD",
    "disclaimer": bool,
    "signature": "string",
    "medications": [
      {
        "applicant": int,
        "name": "string",
        "rxcui": "string",
        "dosage": "string",
        "dosage_unit": "string",
        "frequency": "string",
        "description": "string"
      }
    ],
    "issues": [
      {
        "key": "string",
        "details": [
          {
            "key": "string",
            "description": "string"
          }
        ]
      }
    ],
    "conditions": [
      {
        "key": "string",
        "description": "string"
      }
    ]
  },
  "income": float,
  "address": {
    "address1": "string (optional)",
    "address2": "string (optional)",
    "city": "string (optional)",
    "state": "string (optional)",
    "zipcode": "string (optional)"
  }
}"#;

/// Built-in instruction template. Variables: `target_json_format`, `pdf_text`.
pub const DEFAULT_TEMPLATE: &str = r#"You are an expert in processing insurance documents. Your task is to **precisely extract data** from the provided PDF and convert it into JSON.
Key Requirements:
1. Data Accuracy:
   - Preserve all original values exactly as written, even if they appear incorrect.
   - Do not correct, reformat, or infer missing data.
   - When filling out fields and descriptions, avoid using the direct names of applicants, as this is confidential.

2. Special Field Handling:
   - Information about the primary applicant is at the very beginning of the document, for example, in the Member Information section. For them, set "is_main_applicant": true.
   - Weight: Extract numeric value only (remove "kg", "lbs" etc.) and convert to integer
   - Height:
     * "heightFt" must be integer (feet portion only, no units)
     * "heightIn" must be integer (inches portion only, no units)
   - Gender: Must be strictly "male" or "female" (convert if needed: "m" -> "male", "f" -> "female")
   - Medications:
      "frequency" must be one of: ["Once daily", "Twice daily", "Three times daily", "Four times daily", "Weekly", "Monthly", "Every other day", "At bedtime", "After meals", "Before meals", "As needed"]
      "dosage": no units
      "dosage_unit": unit of measurement, eg mg
   - Income is usually indicated in the Yearly Income section.

3. Family Members:
   - Usually, information about additional applicants is located in the Dependent Information section. If you see that this section exists but no individuals are listed, set the flag "check_it": true.
   In the "reason_checking" field, briefly describe what is wrong and why this data needs to be checked.
   - If the PDF lists additional family members under the insurance policy, include them in the `applicants` array.
   - Maintain their names, relationships, and other details verbatim.

4. Medications:
   - Extract all mentioned medications, including dosage and frequency, and map them to the `medications` field.
   - Retain original spelling/phrasing
   - In the name field, specify only the name of the medicine

5. Missing Data:
   - Use empty strings (`""`), `false`, or empty arrays/objects where fields are absent.
   - Never guess or populate placeholder values.

6. Strict Structure Compliance:
   - Adhere **exactly** to the provided JSON schema.
   - No additional fields, alterations, or deviations allowed.

Target JSON Schema:
{{target_json_format}}

PDF Content:
{{pdf_text}}

Output **only the raw JSON object** without explanations or annotations.
"#;

/// Renders the extraction instruction for one document.
pub struct PromptBuilder {
    handlebars: Handlebars<'static>,
}

impl PromptBuilder {
    /// Builder with the built-in template.
    pub fn new() -> IntakeResult<Self> {
        Self::from_template(DEFAULT_TEMPLATE)
    }

    /// Builder with a caller-supplied template string.
    pub fn from_template(template: &str) -> IntakeResult<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.set_strict_mode(true);
        handlebars
            .register_template_string(TEMPLATE_NAME, template)
            .map_err(|e| IntakeError::configuration(format!("invalid prompt template: {}", e)))?;
        Ok(Self { handlebars })
    }

    /// Builder with the template stored at `path`.
    pub fn from_file(path: &Path) -> IntakeResult<Self> {
        let template = fs::read_to_string(path).map_err(|e| {
            IntakeError::configuration(format!(
                "cannot read prompt template {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_template(&template)
    }

    /// Configured template file if any, else the built-in one.
    pub fn from_config(path: Option<&Path>) -> IntakeResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::new(),
        }
    }

    pub fn build(&self, pdf_text: &str) -> IntakeResult<String> {
        let prompt = self.handlebars.render(
            TEMPLATE_NAME,
            &json!({
                "target_json_format": TARGET_JSON_FORMAT,
                "pdf_text": pdf_text,
            }),
        )?;
        Ok(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_contains_schema_and_text() {
        let builder = PromptBuilder::new().unwrap();
        let prompt = builder.build("Member: J. Doe <b>&</b>").unwrap();

        assert!(prompt.contains("\"heightFt\": int"));
        assert!(prompt.contains("Member: J. Doe <b>&</b>"));
        assert!(prompt.ends_with("without explanations or annotations.\n"));
    }

    #[test]
    fn test_custom_template() {
        let builder = PromptBuilder::from_template("TEXT={{pdf_text}}").unwrap();
        assert_eq!(builder.build("abc").unwrap(), "TEXT=abc");
    }

    #[test]
    fn test_unknown_variable_rejected_by_strict_mode() {
        let builder = PromptBuilder::from_template("{{pdf_txt}}").unwrap();
        let err = builder.build("abc").unwrap_err();
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_template_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.hbs");
        std::fs::write(&path, "Schema first:\n{{target_json_format}}\n---\n{{pdf_text}}").unwrap();

        let prompt = PromptBuilder::from_config(Some(&path)).unwrap().build("body").unwrap();
        assert!(prompt.starts_with("Schema first:\n{"));
        assert!(prompt.ends_with("---\nbody"));
    }

    #[test]
    fn test_missing_template_file_is_configuration_error() {
        let err = PromptBuilder::from_file(Path::new("/no/such/template.hbs"))
            .err()
            .unwrap();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }
}
