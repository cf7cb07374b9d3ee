//! Built-in capability variants.
//!
//! Each variant owns its input schema and validation; the actual data access
//! lives behind a narrow collaborator trait (`SqlExecutor`, `VectorIndex`)
//! so production backends can be swapped in without touching the loop.

pub mod data_analysis;
pub mod sql;
pub mod vector_search;

pub use data_analysis::DataAnalysisAgent;
pub use sql::{SqlAgent, SqlExecutor, SqlExecutorError};
pub use vector_search::{
    InMemoryIndex, ScoredDocument, VectorIndex, VectorIndexError, VectorSearchAgent,
};
