use serde::{Serialize, de::DeserializeOwned};

use crate::error::SchemaValidationError;
use crate::models::{
    ExtractionKind, GraphData, HealthScore, MAX_GRAPH_PARAMETERS, RawExtraction,
};

/// A typed record the model is asked to produce.
pub trait StructuredOutput: DeserializeOwned + Serialize + Send + Sync + 'static {
    const KIND: ExtractionKind;

    /// Schema description appended to the prompt.
    fn format_instructions() -> &'static str;

    /// Constraints serde cannot express.
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

impl StructuredOutput for RawExtraction {
    const KIND: ExtractionKind = ExtractionKind::RawExtraction;

    fn format_instructions() -> &'static str {
        r#"The output must be a JSON object with exactly one top-level key, "data", whose value is an object holding every extracted key-value pair:
{"data": {"patientName": "...", "hemoglobin": 13.5, "medications": ["..."]}}"#
    }
}

impl StructuredOutput for HealthScore {
    const KIND: ExtractionKind = ExtractionKind::HealthScore;

    fn format_instructions() -> &'static str {
        r#"The output must be a JSON object of this form:
{
  "score": <number between 0 and 100>,
  "summary_reasoning": "<short explanation of the score and main concerns>",
  "detailed_breakdown": [
    {
      "parameter": "<lab test name>",
      "value": <reported value, number or string>,
      "status": "Normal" | "Mildly Abnormal" | "Significantly Abnormal",
      "analysis": "<why the value is normal or concerning and its impact on the score>"
    }
  ]
}"#
    }

    fn check(&self) -> Result<(), String> {
        if !self.score.is_finite() || !(0.0..=100.0).contains(&self.score) {
            return Err(format!("score {} is outside 0..=100", self.score));
        }
        Ok(())
    }
}

impl StructuredOutput for GraphData {
    const KIND: ExtractionKind = ExtractionKind::GraphData;

    fn format_instructions() -> &'static str {
        r#"The output must be a JSON object of this form:
{
  "reportDate": "YYYY-MM-DD",
  "healthParameters": {"<camelCaseParameterName>": <number>, ...}
}
healthParameters holds at most four entries and every value is a plain number without units."#
    }

    fn check(&self) -> Result<(), String> {
        if self.health_parameters.len() > MAX_GRAPH_PARAMETERS {
            return Err(format!(
                "{} health parameters returned, at most {} allowed",
                self.health_parameters.len(),
                MAX_GRAPH_PARAMETERS
            ));
        }
        if let Some((name, _)) = self.health_parameters.iter().find(|(_, v)| !v.is_finite()) {
            return Err(format!("health parameter '{name}' is not a finite number"));
        }
        Ok(())
    }
}

/// Locate the JSON object inside a model reply.
///
/// Models like to wrap JSON in prose or ```json fences; everything outside the
/// first `{` and the last `}` is dropped.
pub fn extract_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}

/// Parse a model reply into `T`, rejecting anything that does not conform.
pub fn parse_structured<T: StructuredOutput>(response: &str) -> Result<T, SchemaValidationError> {
    let invalid = |reason: String| SchemaValidationError {
        kind: T::KIND,
        reason,
        raw_output: response.to_string(),
    };

    let json = extract_json_object(response)
        .ok_or_else(|| invalid("no JSON object found in the response".to_string()))?;

    let parsed: T = serde_json::from_str(json).map_err(|e| invalid(e.to_string()))?;
    parsed.check().map_err(invalid)?;

    Ok(parsed)
}
