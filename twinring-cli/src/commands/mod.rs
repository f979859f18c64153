// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI command modules.

pub mod pingpong;
pub mod probe;
pub mod unlink;
pub mod validate;
