//! Prompt templates for the three extraction steps.
//!
//! Placeholders use `{name}` syntax and are substituted verbatim by
//! [`PromptTemplate::render`]. Literal braces in the instructions (JSON
//! examples) are left untouched because only known keys are replaced.

use serde::Serialize;

use crate::models::ExtractionKind;

/// A rendered request: system preamble plus the user message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatPrompt {
    pub kind: ExtractionKind,
    pub system: String,
    pub user: String,
}

#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub kind: ExtractionKind,
    pub system: &'static str,
    pub user: &'static str,
}

impl PromptTemplate {
    pub fn render(&self, vars: &[(&str, &str)]) -> ChatPrompt {
        ChatPrompt {
            kind: self.kind,
            system: substitute(self.system, vars),
            user: substitute(self.user, vars),
        }
    }
}

fn substitute(template: &str, vars: &[(&str, &str)]) -> String {
    let mut rendered = template.to_string();
    for (key, value) in vars {
        rendered = rendered.replace(&format!("{{{key}}}"), value);
    }
    rendered
}

pub const RAW_EXTRACTION: PromptTemplate = PromptTemplate {
    kind: ExtractionKind::RawExtraction,
    system: "You are a meticulous data extraction assistant for medical documents. \
You convert lab reports into structured JSON and never add commentary.",
    user: r#"Extract every relevant key-value pair from the medical report below and return them as a JSON object.

Report text:
{context}

Rules:
1. Read the whole report and capture every fact that can be expressed as a key-value pair: patient details, dates, test names with their results, units, reference ranges, remarks.
2. Keys are descriptive, concise and written in camelCase (patientName, dateOfBirth, hemoglobin, referenceRange).
3. Values keep their natural type: numbers as numbers, yes/no as booleans, text as strings. Several items of the same kind (for example medications) become a JSON array.
4. Respond with the JSON object only. No introduction, no explanation, no text after it.

{format_instructions}"#,
};

pub const HEALTH_SCORE: PromptTemplate = PromptTemplate {
    kind: ExtractionKind::HealthScore,
    system: r#"You are an expert medical AI assistant with deep clinical knowledge. You receive a patient's lab report together with the patient's age and gender.
1. Interpret every lab parameter, recognising synonyms and alternative spellings of test names.
2. Using trusted clinical reference ranges for the given age and gender, classify each value as "Normal", "Mildly Abnormal" or "Significantly Abnormal".
3. Start from a health score of 100 and deduct points for each abnormal value according to its severity and clinical significance, weighting critical parameters more heavily. The score never goes below 0.
4. Quote each parameter's reported value exactly as it appears in the report.
5. Reply with a single valid JSON object and nothing else.

{format_instructions}

Prioritise clinical validity, clarity and patient safety."#,
    user: "Patient Age: {age}\nPatient Gender: {gender}\nLab Report:\n{context}",
};

pub const GRAPH_DATA: PromptTemplate = PromptTemplate {
    kind: ExtractionKind::GraphData,
    system: "You are a medical data extraction assistant preparing lab results for time-series charts. \
You answer with JSON only.",
    user: r#"From the medical report below, extract the report date and the key parameters worth tracking over time.

Report text:
{context}

Rules:
1. Find the date the report was issued or the sample was collected and write it as YYYY-MM-DD.
2. Work out the report type from its content (for example Complete Blood Count, Lipid Profile, Liver Function Test, Kidney Function Test, Routine Urine Examination).
3. Pick at most four of the most clinically relevant parameters for that report type. Only use parameters that are present in the report and have a numeric result; never invent values.
4. Parameter names are camelCase and values are plain numbers without units.
5. Respond with the JSON object only.

{format_instructions}"#,
};
