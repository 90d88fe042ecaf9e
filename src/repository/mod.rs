//! Repository contracts, paging, and the error taxonomy
//!
//! The traits here are backend-neutral; the `postgres` and `surreal`
//! modules provide the two adapters.

pub mod error;
pub mod page;
pub mod traits;

pub use error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
pub use page::{PageRequest, PageSummary};
pub use traits::{
    CommandRepository, IsolationLevel, QueryRepository, RawExecute, RawQuery, RepositoryResult,
};
