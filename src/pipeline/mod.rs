pub mod executor;
pub mod prompts;
pub mod rich_text;

pub use executor::{AnalysisExecutor, AnalysisRequest, ExecutionResult, PreparedAnalysis};
