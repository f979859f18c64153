// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! twinring Benchmarking Framework
//!
//! Helpers shared by the criterion benches.
//!
//! # Benchmark Categories
//!
//! - **Ring Buffer**: push/peek/pop microbenchmarks at various payload sizes
//! - **IPC**: round trips through an echo thread, compared with Unix sockets

pub mod echo;
pub mod metrics;

pub use echo::{receive_exact, round_trip, sample_round_trips, send_all, with_echo};
pub use metrics::{LatencyMetrics, ThroughputMetrics};
