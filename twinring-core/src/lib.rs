//! twinring Core Library
//!
//! Single-producer single-consumer byte queues in POSIX shared memory.
//! The data region is mapped twice back to back, so reads and writes that
//! wrap around the end of the ring are still one contiguous slice.
//! Provides the ring core, region lifecycle management, queue handles,
//! configuration parsing and validated name types.

pub mod config;
pub mod error;
pub mod shm;
pub mod types;

// Re-export commonly used types
pub use config::{ChannelConfig, Config, ConfigLoader, PingPongConfig};
pub use error::{HardValidationError, SharedMemoryError, TwinRingError, TwinRingResult};
pub use shm::{CircularQueue, Consumer, MappedQueue, Producer, QueueFactory, QueueMode};
pub use types::RegionName;
