//! Diagnostics produced by the checker.

use cirrus_ast::span::Span;
use std::fmt;

/// A single checking failure.
///
/// `Display` output never contains spans so that messages stay stable across
/// formatting changes of the source; spans are carried as fields instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CheckError {
    /// Decorator shape/target/value-type violations and ordinary type mismatches
    #[error("{message}")]
    TypeError { message: String, span: Span },
    /// Unresolved identifier or reference
    #[error("'{name}' is not defined")]
    NotFound { name: String, span: Span },
    /// Duplicate binding in one scope
    #[error("'{name}' is already declared in this scope")]
    DeclarationExists { name: String, span: Span },
    /// Dependency cycle; `path` starts and ends with the same node
    #[error("dependency cycle detected: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },
    /// Evaluation-time decorator check against a concrete value
    #[error("@{decorator} on '{target}': {message}")]
    Validation {
        decorator: String,
        target: String,
        message: String,
    },
}

impl CheckError {
    pub fn type_error(message: impl Into<String>, span: Span) -> Self {
        CheckError::TypeError {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            CheckError::TypeError { span, .. }
            | CheckError::NotFound { span, .. }
            | CheckError::DeclarationExists { span, .. } => Some(*span),
            CheckError::Cycle { .. } | CheckError::Validation { .. } => None,
        }
    }

    pub fn is_type_error(&self) -> bool {
        matches!(self, CheckError::TypeError { .. })
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self, CheckError::Cycle { .. })
    }
}

/// Every error found while checking one compilation unit, in discovery order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics(pub Vec<CheckError>);

impl Diagnostics {
    pub fn errors(&self) -> &[CheckError] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if any error's message contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.0.iter().any(|e| e.to_string().contains(needle))
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostics {}

impl From<CheckError> for Diagnostics {
    fn from(err: CheckError) -> Self {
        Diagnostics(vec![err])
    }
}
