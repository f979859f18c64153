// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared Memory IPC module.
//!
//! Zero-copy inter-process communication using POSIX shared memory.
//! Provides a lock-free SPSC byte queue whose data region is mapped twice
//! and which is written and read through separate producer and consumer
//! handles. The lifecycle functions create, map and remove its regions, and
//! [`QueueFactory`] wraps them with get-or-create semantics.

mod factory;
mod footprint;
mod queue;
mod region;

pub use factory::{MetadataInitializer, QueueFactory, QueueMode};
pub use footprint::{footprint, mapping_len, page_size};
pub use queue::{
    CircularQueue, Consumer, MetadataInit, Producer, QueueProperties, CACHE_LINE_SIZE,
};
pub use region::{
    create_private, create_shared, delete_private, delete_shared, map_shared, probe_shared,
    unmap_shared, MappedQueue,
};
