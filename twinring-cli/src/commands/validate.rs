// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `twinring validate` command - Validate configuration file.

use twinring_core::{shm, ConfigLoader};

pub fn execute(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = %file, "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Channel Settings:");
            println!("  Ping Region:      {}", config.channel.ping);
            println!("  Pong Region:      {}", config.channel.pong);
            println!(
                "  Capacity:         {} bytes ({} pages)",
                config.channel.capacity,
                config.channel.capacity / shm::page_size()
            );
            println!(
                "  Region Footprint: {} bytes",
                shm::footprint(config.channel.capacity)
            );
            println!("  Synchronized:     {}", config.channel.sync);
            println!();
            println!("Round Trip Settings:");
            println!("  Iterations:       {}", config.pingpong.iterations);
            println!(
                "  Attach Attempts:  {} every {}ms",
                config.pingpong.attach_attempts,
                config.pingpong.attach_interval.as_millis()
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
