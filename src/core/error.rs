// This module defines error types for sycl-post-link using the thiserror crate for
// idiomatic Rust error handling. PostLinkError is the main error enum covering every
// fatal condition of a run: contradictory or missing options, malformed input IR (text
// or binary), I/O failures on any input or output path, manifest column mismatches,
// malformed specialization constant intrinsic uses, and refusing to dump binary IR to a
// terminal. Each variant carries the path or symbol involved so the single diagnostic
// printed by the binary is actionable. PostLinkResult<T> is the convenience alias used
// by every stage.

//! Error types for the post-link tool.
//!
//! Using thiserror for more idiomatic error handling.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::ir::bitcode::BitcodeError;
use crate::ir::ParseError;
use crate::output::table::TableError;

/// Main error type for a post-link run.
#[derive(Error, Debug)]
pub enum PostLinkError {
    #[error("{0}")]
    Usage(String),

    #[error("{path}:{source}")]
    Parse {
        path: String,
        #[source]
        source: ParseError,
    },

    #[error("{path}: invalid binary module: {source}")]
    Bitcode {
        path: String,
        #[source]
        source: BitcodeError,
    },

    #[error("failed to encode module for '{path}': {source}")]
    Encode {
        path: String,
        #[source]
        source: BitcodeError,
    },

    #[error("error opening the file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("file table: {0}")]
    Table(#[from] TableError),

    #[error("specialization constant in '{function}': {reason}")]
    SpecConst { function: String, reason: String },

    #[error("refusing to write binary IR to a terminal; use -f to force it")]
    BinaryToTerminal,
}

impl PostLinkError {
    /// Wrap an I/O failure on `path`.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PostLinkError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for post-link operations.
pub type PostLinkResult<T> = Result<T, PostLinkError>;
