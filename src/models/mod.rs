pub mod analysis;
pub mod record;
pub mod workflow;

pub use analysis::{AnalysisFields, AnalysisSummary, WorkflowAnalysis, ANALYSIS_COLUMNS};
pub use record::{ExtractionRecord, FailedRecord, PaperContent, ProcessedPaper};
pub use workflow::{WorkflowDescription, WorkflowStep};
