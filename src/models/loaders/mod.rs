pub mod text_loader;

pub use text_loader::{chunk_clauses, load_contract_text, MIN_CLAUSE_CHARS};
