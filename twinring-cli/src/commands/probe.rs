// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `twinring probe` command - Inspect an existing queue.

use twinring_core::{shm, QueueFactory, RegionName};

pub fn execute(name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let name = RegionName::new(name)?;
    tracing::debug!(name = %name, "Probing region");

    let mut factory = QueueFactory::attach(name.clone());
    let queue = match factory.get() {
        Ok(queue) => queue,
        Err(e) if e.is_retryable() => {
            println!("✗ {} is not ready: {}", name, e);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    println!("✓ {} is ready", name);
    println!();
    println!("  Capacity:     {} bytes", queue.capacity());
    println!("  Footprint:    {} bytes", shm::footprint(queue.capacity()));
    println!("  Synchronized: {}", queue.is_sync());
    println!("  Available:    {} bytes", queue.available());
    println!("  Free Space:   {} bytes", queue.space());
    println!("  Metadata:     {} bytes", queue.metadata().len());
    Ok(())
}
