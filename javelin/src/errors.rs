use std::fmt;
use std::sync::Arc;

use crate::class::Class;
use crate::heap::Gc;

/// Name of the built-in root type every class descends from.
pub const ROOT_CLASS: &str = "Object";

/// Name of the built-in root of all catchable errors.
pub const ERROR_CLASS: &str = "Error";

/// Built-in error categories raised by implicit runtime checks. `User`
/// covers errors constructed and thrown by interpreted code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NullDereference,
    IndexOutOfBounds,
    NegativeSize,
    ArrayStoreTypeMismatch,
    CastMismatch,
    Arithmetic,
    ClassNotFound,
    Linkage,
    UnresolvedNativeMethod,
    InitializationFailure,
    StackOverflow,
    User,
}

impl ErrorKind {
    /// Registry name of the built-in class representing this kind.
    #[must_use]
    pub fn class_name(self) -> &'static str {
        match self {
            ErrorKind::NullDereference => "NullDereference",
            ErrorKind::IndexOutOfBounds => "IndexOutOfBounds",
            ErrorKind::NegativeSize => "NegativeSize",
            ErrorKind::ArrayStoreTypeMismatch => "ArrayStoreTypeMismatch",
            ErrorKind::CastMismatch => "CastMismatch",
            ErrorKind::Arithmetic => "ArithmeticError",
            ErrorKind::ClassNotFound => "ClassNotFound",
            ErrorKind::Linkage => "LinkageError",
            ErrorKind::UnresolvedNativeMethod => "UnresolvedNativeMethod",
            ErrorKind::InitializationFailure => "InitializationFailure",
            ErrorKind::StackOverflow => "StackOverflow",
            ErrorKind::User => ERROR_CLASS,
        }
    }

    /// All kinds with a dedicated built-in class, for registry bootstrap.
    pub const BUILTIN: [ErrorKind; 11] = [
        ErrorKind::NullDereference,
        ErrorKind::IndexOutOfBounds,
        ErrorKind::NegativeSize,
        ErrorKind::ArrayStoreTypeMismatch,
        ErrorKind::CastMismatch,
        ErrorKind::Arithmetic,
        ErrorKind::ClassNotFound,
        ErrorKind::Linkage,
        ErrorKind::UnresolvedNativeMethod,
        ErrorKind::InitializationFailure,
        ErrorKind::StackOverflow,
    ];
}

/// One line of a diagnostic trace, appended as an error propagates out of
/// a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub class: String,
    pub method: String,
    pub line: Option<u32>,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "at {}.{} (line {})", self.class, self.method, line),
            None => write!(f, "at {}.{}", self.class, self.method),
        }
    }
}

/// An in-flight error: the thrown heap object plus the propagation state
/// the unwinder accumulates. Catchability is decided by the runtime class.
#[derive(Debug)]
pub struct VmError {
    pub kind: ErrorKind,
    pub class: Arc<Class>,
    pub exception: Gc,
    pub message: String,
    pub trace: Vec<TraceEntry>,
}

impl VmError {
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.class.name
    }
}

impl fmt::Display for VmError {
    /// Terminal (uncaught) report: type, message, full trace from the
    /// faulting frame to the entry point.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.class.name)?;
        } else {
            write!(f, "{}: {}", self.class.name, self.message)?;
        }
        for entry in &self.trace {
            write!(f, "\n    {entry}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_kinds_have_distinct_class_names() {
        let mut names: Vec<&str> = ErrorKind::BUILTIN.iter().map(|k| k.class_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ErrorKind::BUILTIN.len());
    }

    #[test]
    fn trace_entry_formats_with_and_without_line() {
        let with = TraceEntry {
            class: "Main".to_string(),
            method: "run".to_string(),
            line: Some(12),
        };
        assert_eq!(with.to_string(), "at Main.run (line 12)");

        let without = TraceEntry {
            class: "Main".to_string(),
            method: "run".to_string(),
            line: None,
        };
        assert_eq!(without.to_string(), "at Main.run");
    }
}
