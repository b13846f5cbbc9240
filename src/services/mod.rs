pub mod clause_analyzer;
pub mod model_selector;
pub mod rate_limiter;
pub mod response_parser;
pub mod sheet_store;

pub use clause_analyzer::{AnalyzerSettings, ClauseAnalysis, ClauseAnalyzer};
pub use model_selector::{ModelSelector, SelectedProvider};
pub use rate_limiter::RequestLimiter;
pub use response_parser::{parse_classification, Classification, NOT_AVAILABLE, UNKNOWN_RISK};
pub use sheet_store::{SheetStore, TsvSheet};
