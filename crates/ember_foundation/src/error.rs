//! Error types for the Ember system.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.

use std::fmt;

use thiserror::Error;

use crate::handle::FactHandle;
use crate::types::Type;

/// The main error type for Ember operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates a type mismatch error.
    #[must_use]
    pub fn type_mismatch(expected: Type, actual: Type) -> Self {
        Self::new(ErrorKind::TypeMismatch { expected, actual })
    }

    /// Creates an unknown fact type error.
    #[must_use]
    pub fn unknown_type(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownFactType(name.into()))
    }

    /// Creates an unknown field error.
    #[must_use]
    pub fn unknown_field(fact_type: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownField {
            fact_type: fact_type.into(),
            field: field.into(),
        })
    }

    /// Creates an unresolved field reference error.
    #[must_use]
    pub fn unresolved(reference: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnresolvedReference(reference.into()))
    }

    /// Creates a duplicate declaration error.
    #[must_use]
    pub fn duplicate(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicateDeclaration(name.into()))
    }

    /// Creates a rule compilation error.
    #[must_use]
    pub fn compile(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Compile(message.into()))
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config(message.into()))
    }

    /// Creates an unknown fact error.
    #[must_use]
    pub fn unknown_fact(handle: FactHandle) -> Self {
        Self::new(ErrorKind::UnknownFact(handle))
    }

    /// Creates a stale fact handle error.
    #[must_use]
    pub fn stale_fact(handle: FactHandle) -> Self {
        Self::new(ErrorKind::StaleFact(handle))
    }

    /// Creates a session inactive error.
    #[must_use]
    pub fn session_inactive() -> Self {
        Self::new(ErrorKind::SessionInactive)
    }

    /// Creates an unsupported operation error.
    #[must_use]
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unsupported(operation.into()))
    }

    /// Creates a semantic limit exceeded error.
    #[must_use]
    pub fn limit_exceeded(limit: SemanticLimit) -> Self {
        Self::new(ErrorKind::LimitExceeded(limit))
    }

    /// Creates an action failure error.
    #[must_use]
    pub fn rhs(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Rhs(message.into()))
    }

    /// Returns true if this is a compile-time error.
    #[must_use]
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::UnknownFactType(_)
                | ErrorKind::UnknownField { .. }
                | ErrorKind::UnresolvedReference(_)
                | ErrorKind::DuplicateDeclaration(_)
                | ErrorKind::Compile(_)
        )
    }
}

/// Categorized error kinds.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// A field value does not match its declared type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The expected type.
        expected: Type,
        /// The actual type encountered.
        actual: Type,
    },

    /// Fact type was never declared.
    #[error("unknown fact type: {0}")]
    UnknownFactType(String),

    /// Field was not declared on the fact type.
    #[error("unknown field: {field} on fact type {fact_type}")]
    UnknownField {
        /// The fact type that was queried.
        fact_type: String,
        /// The field name that was not found.
        field: String,
    },

    /// A field reference names an undeclared fact variable or is malformed.
    #[error("unresolved field reference: {0}")]
    UnresolvedReference(String),

    /// A type, rule, or fact variable was declared twice.
    #[error("duplicate declaration: {0}")]
    DuplicateDeclaration(String),

    /// Malformed rule or condition.
    #[error("rule compilation failed: {0}")]
    Compile(String),

    /// Invalid engine configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Fact handle is not known to the session.
    #[error("unknown fact: {0:?}")]
    UnknownFact(FactHandle),

    /// Fact handle refers to an outdated version.
    #[error("stale fact handle: {0:?}")]
    StaleFact(FactHandle),

    /// The session has been closed.
    #[error("session inactive")]
    SessionInactive,

    /// Operation is not supported by this session.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Semantic limit exceeded (kill switch triggered).
    #[error("limit exceeded: {0}")]
    LimitExceeded(SemanticLimit),

    /// A rule action reported a failure.
    #[error("rule action failed: {0}")]
    Rhs(String),
}

/// Semantic limits (kill switches) that can be exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticLimit {
    /// Maximum rule activations per `fire()` call exceeded.
    MaxActivations {
        /// The configured limit.
        limit: usize,
        /// Additional context about which rule caused the issue.
        context: Option<String>,
    },
    /// Maximum alpha evaluators on a single fact type exceeded.
    MaxAlphaConditions {
        /// The configured limit.
        limit: usize,
        /// The fact type that exceeded the limit.
        fact_type: String,
    },
}

impl fmt::Display for SemanticLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxActivations { limit, context } => {
                write!(f, "max activations ({limit}) exceeded")?;
                if let Some(ctx) = context {
                    write!(f, ": {ctx}")?;
                }
                Ok(())
            }
            Self::MaxAlphaConditions { limit, fact_type } => {
                write!(
                    f,
                    "max alpha conditions ({limit}) exceeded for fact type {fact_type}"
                )
            }
        }
    }
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Rule name or other source of the failure.
    pub source: Option<String>,
    /// Stack of enclosing operations, innermost last.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Adds a stack frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "at {source}")?;
        }
        if !self.stack.is_empty() {
            writeln!(f)?;
            for frame in &self.stack {
                writeln!(f, "  in {frame}")?;
            }
        }
        Ok(())
    }
}
