//! Fault values handed to the error path.
//!
//! Every error input is reduced once, at the facade boundary, to an
//! [`ErrorInput`]: either a [`Fault`] (name, message, optional stack,
//! optional cause) or a raw value coerced to a readable string. Downstream
//! code dispatches on the variant and never inspects the original type.

use std::backtrace::BacktraceStatus;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Shared, thread-safe error handle used for causes.
pub type SharedError = Arc<dyn Error + Send + Sync + 'static>;

/// A structured fault: the error shape the diagnostics engine understands.
#[derive(Clone, Debug)]
pub struct Fault {
    name: String,
    message: String,
    stack: Option<String>,
    cause: Option<Cause>,
}

#[derive(Clone, Debug)]
enum Cause {
    /// The held error is the first cause.
    Direct(SharedError),
    /// The held error is the fault itself; its source is the first cause.
    Delegate(SharedError),
}

impl Fault {
    /// Create a fault with a name (e.g. the error kind) and a message.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
            cause: None,
        }
    }

    /// Attach raw stack trace text.
    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Attach an error as the direct cause.
    #[must_use]
    pub fn with_cause<E>(self, cause: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        self.with_shared_cause(Arc::new(cause))
    }

    /// Attach an already shared error as the direct cause.
    #[must_use]
    pub fn with_shared_cause(mut self, cause: SharedError) -> Self {
        self.cause = Some(Cause::Direct(cause));
        self
    }

    /// Attach a non-error value (string, number, object) as the cause.
    #[must_use]
    pub fn with_cause_value(self, value: impl Into<Value>) -> Self {
        self.with_cause(RawCause(value.into()))
    }

    /// Wrap any error. The name is the error's type name; its `source()`
    /// chain is preserved.
    pub fn from_error<E>(error: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        let name = short_type_name(std::any::type_name::<E>());
        Self::from_boxed_named(Box::new(error), name)
    }

    /// Wrap a boxed error, keeping its `source()` chain.
    pub fn from_boxed(error: Box<dyn Error + Send + Sync + 'static>) -> Self {
        Self::from_boxed_named(error, "Error")
    }

    fn from_boxed_named(error: Box<dyn Error + Send + Sync + 'static>, name: &str) -> Self {
        match error.downcast::<Self>() {
            Ok(fault) => *fault,
            Err(error) => Self {
                name: name.to_owned(),
                message: error.to_string(),
                stack: None,
                cause: Some(Cause::Delegate(Arc::from(error))),
            },
        }
    }

    /// Wrap an [`anyhow::Error`]. A captured backtrace becomes the stack.
    pub fn from_anyhow(error: anyhow::Error) -> Self {
        let error = match error.downcast::<Self>() {
            Ok(fault) => return fault,
            Err(error) => error,
        };
        let stack = (error.backtrace().status() == BacktraceStatus::Captured)
            .then(|| error.backtrace().to_string());
        let message = error.to_string();
        let boxed: Box<dyn Error + Send + Sync + 'static> = error.into();
        Self {
            name: "Error".to_owned(),
            message,
            stack,
            cause: Some(Cause::Delegate(Arc::from(boxed))),
        }
    }

    /// Fault name (may be empty).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fault message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Raw stack trace text, if any.
    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    /// `"{name}: {message}"`, or just the message when unnamed.
    pub fn title(&self) -> String {
        if self.name.is_empty() {
            self.message.clone()
        } else {
            format!("{}: {}", self.name, self.message)
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for Fault {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self.cause.as_ref()? {
            Cause::Direct(cause) => Some(&**cause),
            Cause::Delegate(inner) => inner.source(),
        }
    }
}

/// A non-error value used as a cause.
#[derive(Clone, Debug, PartialEq)]
pub struct RawCause(pub Value);

impl RawCause {
    /// Best-effort readable string: strings unquoted, everything else as
    /// compact JSON.
    #[must_use]
    pub fn describe(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for RawCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Self::describe(&self.0))
    }
}

impl Error for RawCause {}

/// What the error path receives, decided once at the boundary.
#[derive(Clone, Debug)]
pub enum ErrorInput {
    /// A structured fault with message, optional stack and cause.
    Structured(Fault),
    /// Any other value, already coerced to a readable string.
    Raw(String),
}

impl ErrorInput {
    /// Wrap any error as a structured input.
    pub fn from_error<E>(error: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self::Structured(Fault::from_error(error))
    }

    /// The human-readable message of this input.
    pub fn message(&self) -> &str {
        match self {
            Self::Structured(fault) => fault.message(),
            Self::Raw(text) => text,
        }
    }
}

impl From<Fault> for ErrorInput {
    fn from(fault: Fault) -> Self {
        Self::Structured(fault)
    }
}

impl From<anyhow::Error> for ErrorInput {
    fn from(error: anyhow::Error) -> Self {
        Self::Structured(Fault::from_anyhow(error))
    }
}

impl From<Box<dyn Error + Send + Sync + 'static>> for ErrorInput {
    fn from(error: Box<dyn Error + Send + Sync + 'static>) -> Self {
        Self::Structured(Fault::from_boxed(error))
    }
}

impl From<&str> for ErrorInput {
    fn from(text: &str) -> Self {
        Self::Raw(text.to_owned())
    }
}

impl From<String> for ErrorInput {
    fn from(text: String) -> Self {
        Self::Raw(text)
    }
}

impl From<Value> for ErrorInput {
    fn from(value: Value) -> Self {
        Self::Raw(RawCause::describe(&value))
    }
}

/// `a::b::Thing<c::D>` → `Thing`.
fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
