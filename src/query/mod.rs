//! Query text construction
//!
//! [`EntityQuery`] selects entity ids by field conditions. The functions in
//! [`update`] build the fixed statements the storage issues: bulk fetch,
//! existence checks, inserts and graph-scoped deletes.

mod builder;
mod condition;
pub mod update;

pub use builder::{EntityQuery, QueryBuildError, QueryBuildResult, SortDirection};
pub use condition::{Condition, ConditionGroup, Conjunction, Operator};
