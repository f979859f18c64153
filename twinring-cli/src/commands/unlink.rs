// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `twinring unlink` command - Remove a stale region name.

use twinring_core::{shm, RegionName};

pub fn execute(name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let name = RegionName::new(name)?;
    tracing::info!(name = %name, "Removing region name");

    shm::delete_shared(&name)?;
    println!("✓ Removed {}", name);
    Ok(())
}
