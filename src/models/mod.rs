pub mod clause;
pub mod loaders;
pub mod provider;

pub use clause::{
    ClauseFailure, ClauseResult, ClauseStatus, RewriteSuggestion, RiskLevel, SheetRow,
    SHEET_HEADER,
};
pub use loaders::{chunk_clauses, load_contract_text};
pub use provider::{Credential, ProviderConfig, ProviderKind, ProviderRegistry, TransportSpec};
