//! Error types.
//!
//! Two classes of failure exist in this crate:
//!
//! - [`IrError`]: reported conditions a translator propagates with `?`
//!   (duplicate/unknown parameter names, operands with no common type,
//!   config files that cannot be read) plus the one environment fault, a
//!   metadata provider that lacks a mandatory primitive type.
//! - contract violations: malformed IR construction (arity mismatch, a
//!   replaced var dereferenced, a foreign node/table id). These go through
//!   [`contract_violation`] and panic; the Command is unusable afterwards.
//!
//! Neither class is retried. A Command that produced an error is discarded.

use querytree_md::PrimitiveKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IrError {
    #[error("parameter `{0}` is already defined")]
    DuplicateParameter(String),

    #[error("unknown parameter `{0}`")]
    UnknownParameter(String),

    /// The metadata provider cannot supply a primitive the IR depends on.
    #[error("incompatible metadata provider: missing primitive type {}", .missing.name())]
    IncompatibleProvider { missing: PrimitiveKind },

    #[error("no common type for comparison operands `{left}` and `{right}`")]
    NoCommonType { left: String, right: String },

    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, IrError>;

/// Abort IR construction after a caller-contract violation.
#[track_caller]
#[cold]
pub(crate) fn contract_violation(message: impl std::fmt::Display) -> ! {
    let location = std::panic::Location::caller();
    tracing::error!(%location, "ir contract violation: {message}");
    panic!("ir contract violation: {message}");
}

/// Panic through [`contract_violation`] unless `$cond` holds.
macro_rules! ir_assert {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::error::contract_violation(format_args!($($arg)+));
        }
    };
}

pub(crate) use ir_assert;
