//! Compiles declarative match trees and retry/ignore stanzas into pure,
//! total predicates and binders.

mod ast;
mod binder;
mod canonical;
mod compile;
mod error;
mod matcher;
mod predicate;
mod retry_cond;

pub use ast::MatchNode;
pub use error::MatchError;
pub use matcher::Matcher;
pub use retry_cond::{compile as compile_retry_condition, default_ignore, default_retry_on, RetryCondition};
