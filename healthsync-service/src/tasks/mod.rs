pub mod graph_data;
pub mod health_score;
pub mod raw_extraction;
pub mod utils;

pub use graph_data::GraphDataTask;
pub use health_score::HealthScoreTask;
pub use raw_extraction::RawExtractionTask;

pub const RAW_EXTRACTION_TASK: &str = "raw_extraction";
pub const HEALTH_SCORE_TASK: &str = "health_score";
pub const GRAPH_DATA_TASK: &str = "graph_data";

/// Analysis steps in report order.
pub const ANALYSIS_TASKS: [&str; 3] = [RAW_EXTRACTION_TASK, HEALTH_SCORE_TASK, GRAPH_DATA_TASK];

pub mod session_keys {
    pub const EXTRACTED_TEXT: &str = "extracted_text";
    pub const MODEL: &str = "model";
    pub const RAW_EXTRACTION: &str = "raw_extraction";
    pub const HEALTH_SCORE: &str = "health_score";
    pub const GRAPH_DATA: &str = "graph_data";

    pub fn step_status(task_id: &str) -> String {
        format!("{task_id}.status")
    }

    pub fn step_failure(task_id: &str) -> String {
        format!("{task_id}.failure")
    }
}
