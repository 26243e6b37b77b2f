use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Upper bound on the parameters kept for charting.
pub const MAX_GRAPH_PARAMETERS: usize = 4;

/// The three structured outputs produced per report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionKind {
    RawExtraction,
    HealthScore,
    GraphData,
}

impl ExtractionKind {
    pub fn download_file_name(&self) -> &'static str {
        match self {
            ExtractionKind::RawExtraction => "raw_extracted_data.json",
            ExtractionKind::HealthScore => "health_analysis_report.json",
            ExtractionKind::GraphData => "graph_data.json",
        }
    }
}

impl fmt::Display for ExtractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExtractionKind::RawExtraction => "raw extraction",
            ExtractionKind::HealthScore => "health score",
            ExtractionKind::GraphData => "graph data",
        };
        f.write_str(name)
    }
}

/// Every key/value pair the model found in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawExtraction {
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterStatus {
    #[serde(alias = "normal", alias = "NORMAL")]
    Normal,
    #[serde(rename = "Mildly Abnormal", alias = "mildly abnormal", alias = "Mildly abnormal")]
    MildlyAbnormal,
    #[serde(
        rename = "Significantly Abnormal",
        alias = "significantly abnormal",
        alias = "Significantly abnormal"
    )]
    SignificantlyAbnormal,
}

/// A reported lab value, either numeric or free text ("Nil", "13.5 g/dL").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportedValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for ReportedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportedValue::Number(n) => write!(f, "{n}"),
            ReportedValue::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownEntry {
    pub parameter: String,
    pub value: ReportedValue,
    pub status: ParameterStatus,
    pub analysis: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthScore {
    pub score: f64,
    pub summary_reasoning: String,
    #[serde(default)]
    pub detailed_breakdown: Vec<BreakdownEntry>,
}

/// Report date plus a handful of numeric parameters for time-series charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphData {
    pub report_date: NaiveDate,
    pub health_parameters: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub file_name: Option<String>,
    pub size_bytes: usize,
    pub text_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Downloads {
    pub raw_extraction: String,
    pub health_score: String,
    pub graph_data: String,
}

impl Default for Downloads {
    fn default() -> Self {
        Self {
            raw_extraction: ExtractionKind::RawExtraction.download_file_name().to_string(),
            health_score: ExtractionKind::HealthScore.download_file_name().to_string(),
            graph_data: ExtractionKind::GraphData.download_file_name().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepStatus {
    pub task_id: String,
    pub status_message: Option<String>,
}

/// Response body of a completed analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub analysis_id: Uuid,
    pub model: String,
    pub document: DocumentSummary,
    pub raw_extraction: RawExtraction,
    pub health_score: HealthScore,
    pub graph_data: GraphData,
    pub steps: Vec<StepStatus>,
    pub downloads: Downloads,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub analysis_enabled: bool,
    pub provider: String,
    pub models: Vec<String>,
    pub default_model: String,
    pub message: Option<String>,
}
