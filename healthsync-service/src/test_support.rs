//! Fixtures shared by the unit tests.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::LlmError;
use crate::llm::CompletionBackend;
use crate::models::ExtractionKind;
use crate::prompts::ChatPrompt;

/// Build a one-page PDF whose text layer holds `lines` (Helvetica, one per row).
pub fn text_pdf(lines: &[&str]) -> Vec<u8> {
    let mut content = String::from("BT\n/F1 12 Tf\n72 720 Td\n16 TL\n");
    for line in lines {
        let escaped = line
            .replace('\\', "\\\\")
            .replace('(', "\\(")
            .replace(')', "\\)");
        content.push_str(&format!("({escaped}) Tj T*\n"));
    }
    content.push_str("ET\n");

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}endstream",
            content.len(),
            content
        ),
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", index + 1, body).as_bytes());
    }

    let xref_offset = pdf.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        xref.push_str(&format!("{offset:010} 00000 n \n"));
    }
    pdf.extend_from_slice(xref.as_bytes());
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );
    pdf
}

pub const RAW_REPLY: &str = r#"{"data": {"patientName": "Jane Doe", "age": "34 Years", "hemoglobin": 13.5, "hemoglobinUnit": "g/dL"}}"#;

pub const SCORE_REPLY: &str = r#"```json
{
  "score": 92,
  "summary_reasoning": "Hemoglobin is within the normal range.",
  "detailed_breakdown": [
    {"parameter": "Hemoglobin", "value": "13.5 g/dL", "status": "Normal", "analysis": "Within 12.0-15.5 g/dL for an adult female."}
  ]
}
```"#;

pub const GRAPH_REPLY: &str =
    r#"{"reportDate": "2024-03-15", "healthParameters": {"hemoglobin": 13.5}}"#;

/// Answers each extraction kind with a canned reply and records every prompt.
pub struct ScriptedBackend {
    raw: String,
    score: String,
    graph: String,
    failure: Option<LlmError>,
    pub prompts: Mutex<Vec<(String, ChatPrompt)>>,
}

impl ScriptedBackend {
    pub fn new(raw: &str, score: &str, graph: &str) -> Self {
        Self {
            raw: raw.to_string(),
            score: score.to_string(),
            graph: graph.to_string(),
            failure: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn well_behaved() -> Self {
        Self::new(RAW_REPLY, SCORE_REPLY, GRAPH_REPLY)
    }

    /// Every call fails with `error`, as an unreachable or refusing endpoint would.
    pub fn failing_with(error: LlmError) -> Self {
        Self {
            failure: Some(error),
            ..Self::well_behaved()
        }
    }

    pub fn prompt_for(&self, kind: ExtractionKind) -> Option<ChatPrompt> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .find(|(_, prompt)| prompt.kind == kind)
            .map(|(_, prompt)| prompt.clone())
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, model: &str, prompt: &ChatPrompt) -> Result<String, LlmError> {
        self.prompts
            .lock()
            .unwrap()
            .push((model.to_string(), prompt.clone()));

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let reply = match prompt.kind {
            ExtractionKind::RawExtraction => &self.raw,
            ExtractionKind::HealthScore => &self.score,
            ExtractionKind::GraphData => &self.graph,
        };
        Ok(reply.clone())
    }
}
