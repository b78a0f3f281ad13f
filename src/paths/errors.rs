//! Errors raised while compiling or rendering a path template.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// The template could not be compiled
    #[error("invalid path template {template:?}: {reason}")]
    Syntax { template: String, reason: String },

    /// The template compiled but could not be rendered
    #[error("failed to render path template {template:?}: {reason}")]
    Execution { template: String, reason: String },
}
