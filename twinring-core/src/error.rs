// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for twinring.
//!
//! Explicit enum error types only. No `Box<dyn Error>`, no `anyhow::Result`.
//! Ring capacity exhaustion is not an error: `push` returns `false` and
//! `alloc` returns `None`.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for twinring.
#[derive(Debug, Error)]
pub enum TwinRingError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Hard validation error: {0}")]
    HardValidation(#[from] HardValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Shared Memory Errors
    // =========================================================================
    #[error("Shared memory error: {0}")]
    SharedMemory(#[from] SharedMemoryError),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Hard validation errors reject a value before any OS resource is touched.
#[derive(Debug, Error)]
pub enum HardValidationError {
    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid region name: {name:?} - {reason}")]
    InvalidRegionName { name: String, reason: String },
}

/// Shared memory lifecycle errors.
///
/// Resource failures name the OS call that failed and carry its error.
/// Every resource failure is reported after rollback has already released
/// whatever was acquired before it.
#[derive(Debug, Error)]
pub enum SharedMemoryError {
    #[error("{step} failed for region {name}: {source}")]
    Os {
        step: &'static str,
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Region {name} does not exist")]
    NotFound { name: String },

    #[error("Region {name} is not fully initialized yet")]
    NotReady { name: String },

    #[error("Metadata initializer failed for region {name}: {reason}")]
    MetadataInit { name: String, reason: String },

    #[error("Invalid capacity {capacity}: must be a non-zero multiple of the page size {page_size}")]
    InvalidCapacity { capacity: usize, page_size: usize },

    #[error("Region size mismatch for {name}: expected at least {expected} bytes, found {actual}")]
    SizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("The {role} end of this queue is already claimed")]
    RoleInUse { role: &'static str },
}

impl SharedMemoryError {
    /// Build an [`SharedMemoryError::Os`] from the calling thread's `errno`.
    pub(crate) fn last_os(step: &'static str, name: &str) -> Self {
        Self::Os {
            step,
            name: name.to_string(),
            source: std::io::Error::last_os_error(),
        }
    }

    /// The region is absent or still being created; polling again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotReady { .. } | Self::NotFound { .. })
    }

    /// The underlying OS error, if this is a resource failure.
    pub fn os_error(&self) -> Option<&std::io::Error> {
        match self {
            Self::Os { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias using TwinRingError.
pub type TwinRingResult<T> = Result<T, TwinRingError>;
