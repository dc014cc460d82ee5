//! Rule, option, and template model.

mod error;
mod option;
mod registry;
mod rule;
mod template;

pub use error::RuleError;
pub use option::CompiledOption;
pub use registry::RuleRegistry;
pub use rule::{error_topic, OptionSpec, Rule, RuleSpec};
pub use template::{ExecSpec, JsonTemplate, RenderedRequest, Template};
