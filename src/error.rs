//! Error types for the C runtime shim
//!
//! Only fatal conditions surface as `Err`: a guest pointer outside the
//! current memory extent, an operation with no implementation, or a failure
//! to wire up the guest module itself. Domain and range errors from the math
//! layer are recorded as sticky flags in [`crate::fenv::FloatEnv`] and never
//! appear here.

use std::fmt;

/// Result type for runtime shim operations
pub type CrtResult<T> = Result<T, CrtError>;

/// Errors that can occur while servicing a guest host-function call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrtError {
    /// A pointer argument resolves outside the current linear memory extent.
    /// The guest's memory contract has been violated; the call chain must
    /// abort.
    OutOfBounds {
        address: u32,
        size: u32,
        memory_size: u32,
    },

    /// A C string starting at `address` has no NUL terminator before the end
    /// of memory
    UnterminatedString {
        address: u32,
    },

    /// Operation the shim deliberately does not implement (lgamma, tgamma)
    Unimplemented {
        name: &'static str,
    },

    /// Import name the registry does not know
    UnknownImport {
        name: String,
    },

    /// Host-function invoked with the wrong argument shape
    BadArguments {
        op: &'static str,
        expected: &'static str,
    },

    /// Required guest export is missing
    MissingExport {
        name: &'static str,
    },

    /// Guest export has the wrong type
    WrongExportType {
        name: &'static str,
        expected: &'static str,
    },

    /// Guest module compilation or instantiation failed
    InstantiationFailed {
        reason: String,
    },

    /// The guest requested termination via exit()/abort()
    GuestExit {
        code: i32,
    },

    /// The guest trapped with a runtime error the shim did not raise
    Trap {
        reason: String,
    },
}

impl fmt::Display for CrtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds {
                address,
                size,
                memory_size,
            } => {
                write!(
                    f,
                    "memory access out of bounds: address {} + size {} > memory size {}",
                    address, size, memory_size
                )
            }
            Self::UnterminatedString { address } => {
                write!(f, "unterminated C string at address {}", address)
            }
            Self::Unimplemented { name } => {
                write!(f, "'{}' is not implemented", name)
            }
            Self::UnknownImport { name } => {
                write!(f, "unknown import: '{}'", name)
            }
            Self::BadArguments { op, expected } => {
                write!(f, "'{}' called with wrong arguments: expected {}", op, expected)
            }
            Self::MissingExport { name } => {
                write!(f, "missing required export: '{}'", name)
            }
            Self::WrongExportType { name, expected } => {
                write!(f, "export '{}' has wrong type: expected {}", name, expected)
            }
            Self::InstantiationFailed { reason } => {
                write!(f, "module instantiation failed: {}", reason)
            }
            Self::GuestExit { code } => {
                write!(f, "guest exited with status {}", code)
            }
            Self::Trap { reason } => {
                write!(f, "guest trapped: {}", reason)
            }
        }
    }
}

impl std::error::Error for CrtError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CrtError::OutOfBounds {
            address: 1000,
            size: 8,
            memory_size: 1004,
        };
        assert!(err.to_string().contains("1000"));
        assert!(err.to_string().contains("1004"));

        let err = CrtError::Unimplemented { name: "tgamma" };
        assert_eq!(err.to_string(), "'tgamma' is not implemented");

        let err = CrtError::GuestExit { code: 3 };
        assert_eq!(err.to_string(), "guest exited with status 3");
    }
}
