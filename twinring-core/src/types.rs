// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! All types validate their invariants at creation time.

use std::ffi::CString;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::HardValidationError;

/// Longest POSIX shared memory name accepted (NAME_MAX on Linux).
pub const MAX_REGION_NAME_LEN: usize = 255;

/// Validated POSIX shared memory object name.
///
/// Must start with `/`, contain no other `/` and no NUL byte, and be
/// between 2 and [`MAX_REGION_NAME_LEN`] bytes long.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegionName(String);

impl RegionName {
    /// Create a new RegionName with validation.
    pub fn new(name: impl Into<String>) -> Result<Self, HardValidationError> {
        let name = name.into();

        let reason = if !name.starts_with('/') {
            Some("Region name must start with '/'".to_string())
        } else if name.len() < 2 {
            Some("Region name cannot be empty after '/'".to_string())
        } else if name.len() > MAX_REGION_NAME_LEN {
            Some(format!(
                "Region name too long: {} bytes (max {})",
                name.len(),
                MAX_REGION_NAME_LEN
            ))
        } else if name[1..].contains('/') {
            Some("Region name cannot contain '/' after the leading one".to_string())
        } else if name.contains('\0') {
            Some("Region name cannot contain NUL bytes".to_string())
        } else {
            None
        };

        match reason {
            Some(reason) => Err(HardValidationError::InvalidRegionName { name, reason }),
            None => Ok(Self(name)),
        }
    }

    /// Create a RegionName without validation (for internally generated names).
    pub(crate) fn new_unchecked(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name as a C string for the `shm_*` calls.
    pub(crate) fn to_c_string(&self) -> CString {
        // Interior NUL bytes are rejected in `new`.
        CString::new(self.0.as_bytes()).unwrap_or_default()
    }
}

impl fmt::Display for RegionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RegionName {
    type Error = HardValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for RegionName {
    type Error = HardValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RegionName> for String {
    fn from(name: RegionName) -> Self {
        name.0
    }
}

impl AsRef<str> for RegionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
