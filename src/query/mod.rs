pub mod builder;
pub mod pager;
pub mod search;

pub use builder::{build_log_query, LogQueryPlan, PageRange, Predicate, QuerySpec, Sort};
pub use pager::Pager;
