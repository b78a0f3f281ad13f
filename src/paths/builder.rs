//! PathTemplateBuilder implementation
//!
//! A template is literal text interleaved with `{{ .Field }}` references. Supported
//! fields are `Region`, `Hostname` and `Username`. Field names are resolved when the
//! template is rendered, so a reference to an unknown field compiles but fails to render.

use crate::paths::errors::TemplateError;
use regex::Regex;
use std::sync::LazyLock;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

static FIELD_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\.([A-Za-z_][A-Za-z0-9_]*)$").expect("field reference pattern is valid")
});

/// Values substituted into a path template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathVariables {
    pub region: String,
    pub hostname: String,
    pub username: String,
}

impl PathVariables {
    pub fn new(
        region: impl Into<String>,
        hostname: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            hostname: hostname.into(),
            username: username.into(),
        }
    }

    fn lookup(&self, field: &str) -> Option<&str> {
        match field {
            "Region" => Some(&self.region),
            "Hostname" => Some(&self.hostname),
            "Username" => Some(&self.username),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// A compiled path template
///
/// Immutable once built; `render` takes `&self` and has no side effects, so one
/// builder can be shared across any number of concurrent reconciliations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplateBuilder {
    source: String,
    segments: Vec<Segment>,
}

impl PathTemplateBuilder {
    /// Compile a template
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Syntax`] when a `{{` is never closed or an action is
    /// anything other than a single field reference.
    pub fn new(template: &str) -> Result<Self, TemplateError> {
        let syntax_error = |reason: String| TemplateError::Syntax {
            template: template.to_string(),
            reason,
        };

        let mut segments = Vec::new();
        let mut rest = template;

        while let Some(start) = rest.find(OPEN) {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let after_open = &rest[start + OPEN.len()..];
            let end = after_open
                .find(CLOSE)
                .ok_or_else(|| syntax_error("unclosed action".to_string()))?;

            let action = after_open[..end].trim();
            let field = FIELD_REFERENCE
                .captures(action)
                .and_then(|captures| captures.get(1))
                .ok_or_else(|| syntax_error(format!("unsupported action {{{{{action}}}}}")))?;
            segments.push(Segment::Field(field.as_str().to_string()));

            rest = &after_open[end + CLOSE.len()..];
        }

        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    /// Render the template
    ///
    /// Empty variables are substituted as-is and yield an empty path segment.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Execution`] when the template references a field that
    /// [`PathVariables`] does not provide.
    pub fn render(&self, variables: &PathVariables) -> Result<String, TemplateError> {
        let mut path = String::with_capacity(self.source.len() + 32);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => path.push_str(text),
                Segment::Field(name) => {
                    let value =
                        variables
                            .lookup(name)
                            .ok_or_else(|| TemplateError::Execution {
                                template: self.source.clone(),
                                reason: format!("can't evaluate field {name}"),
                            })?;
                    path.push_str(value);
                }
            }
        }
        Ok(path)
    }

    /// The template text this builder was compiled from
    pub fn template(&self) -> &str {
        &self.source
    }
}
