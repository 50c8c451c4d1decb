pub mod result_writer;
pub mod workflow_classifier;
pub mod workflow_extractor;

pub use result_writer::ResultWriter;
pub use workflow_classifier::WorkflowClassifier;
pub use workflow_extractor::WorkflowExtractor;
