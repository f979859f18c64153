// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Queue handles with lazy get-or-create semantics.
//!
//! A [`QueueFactory`] owns at most one mapped queue. The first successful
//! [`QueueFactory::get`] creates and/or maps the region; later calls return
//! the same queue. Dropping the factory unmaps the queue and, if the factory
//! created a named region, removes the name.

use std::fmt;

use crate::error::SharedMemoryError;
use crate::shm::queue::{CircularQueue, QueueProperties};
use crate::shm::region::{self, MappedQueue};
use crate::types::RegionName;

/// Metadata hook stored by a factory until the region is created.
///
/// See [`crate::shm::MetadataInit`].
pub type MetadataInitializer =
    Box<dyn FnMut(&QueueProperties, &mut [u8]) -> Result<(), String> + Send>;

/// How a factory obtains its queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueMode {
    /// Create a named region and own it.
    Create { name: RegionName, capacity: usize },
    /// Map a named region created by someone else.
    Attach { name: RegionName },
    /// Create an anonymous region.
    Private { capacity: usize },
}

/// Handle to a circular queue in shared memory.
pub struct QueueFactory {
    mode: QueueMode,
    sync: bool,
    initializer: MetadataInitializer,
    queue: Option<MappedQueue>,
    /// Set once this factory has created its named region.
    created: bool,
}

impl QueueFactory {
    fn new(mode: QueueMode) -> Self {
        Self {
            mode,
            sync: true,
            initializer: Box::new(|_, _| Ok(())),
            queue: None,
            created: false,
        }
    }

    /// Handle that creates and owns the named region `name`.
    ///
    /// `capacity` must be a non-zero multiple of the page size.
    pub fn create(name: RegionName, capacity: usize) -> Self {
        Self::new(QueueMode::Create { name, capacity })
    }

    /// Handle that maps the existing named region `name`.
    pub fn attach(name: RegionName) -> Self {
        Self::new(QueueMode::Attach { name })
    }

    /// Handle that creates an anonymous region.
    pub fn private(capacity: usize) -> Self {
        Self::new(QueueMode::Private { capacity })
    }

    /// Select release/acquire publication (default) or relaxed ordering.
    ///
    /// Only meaningful for creating handles; an attaching handle uses
    /// whatever the creator chose.
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Run `initializer` against the metadata span when the region is created.
    pub fn with_metadata<F>(mut self, initializer: F) -> Self
    where
        F: FnMut(&QueueProperties, &mut [u8]) -> Result<(), String> + Send + 'static,
    {
        self.initializer = Box::new(initializer);
        self
    }

    pub fn mode(&self) -> &QueueMode {
        &self.mode
    }

    /// Region name, or `None` for private queues.
    pub fn name(&self) -> Option<&RegionName> {
        match &self.mode {
            QueueMode::Create { name, .. } | QueueMode::Attach { name } => Some(name),
            QueueMode::Private { .. } => None,
        }
    }

    /// Whether [`get`](Self::get) has already bound a queue.
    pub fn is_bound(&self) -> bool {
        self.queue.is_some()
    }

    /// Whether the named region exists and is initialized, without mapping it.
    ///
    /// Always true for bound handles and private queues.
    pub fn can_get(&self) -> bool {
        if self.queue.is_some() {
            return true;
        }

        match self.name() {
            Some(name) => region::probe_shared(name).is_ok(),
            None => true,
        }
    }

    /// The queue, creating and mapping it on first use.
    ///
    /// Bytes move through the queue's [`producer`](CircularQueue::producer)
    /// and [`consumer`](CircularQueue::consumer) handles.
    ///
    /// An attaching handle fails with a retryable error while the region is
    /// missing or still being initialized.
    pub fn get(&mut self) -> Result<&CircularQueue, SharedMemoryError> {
        let queue = match self.queue.take() {
            Some(queue) => queue,
            None => self.bind()?,
        };
        Ok(self.queue.insert(queue).queue())
    }

    fn bind(&mut self) -> Result<MappedQueue, SharedMemoryError> {
        match &self.mode {
            QueueMode::Create { name, capacity } => {
                if !self.created {
                    region::create_shared(name, *capacity, self.sync, &mut *self.initializer)?;
                    self.created = true;
                }
                region::map_shared(name)
            }
            QueueMode::Attach { name } => region::map_shared(name),
            QueueMode::Private { capacity } => {
                region::create_private(*capacity, self.sync, &mut *self.initializer)
            }
        }
    }
}

impl fmt::Debug for QueueFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueFactory")
            .field("mode", &self.mode)
            .field("sync", &self.sync)
            .field("bound", &self.is_bound())
            .field("created", &self.created)
            .finish()
    }
}

impl Drop for QueueFactory {
    fn drop(&mut self) {
        // MappedQueue unmaps itself.
        self.queue = None;

        if let (true, QueueMode::Create { name, .. }) = (self.created, &self.mode) {
            if let Err(e) = region::delete_shared(name) {
                tracing::error!(name = %name, error = %e, "Failed to remove owned region");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shm::footprint::page_size;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn test_name(tag: &str) -> RegionName {
        RegionName::new(format!("/twinring.factory.{}.{}", std::process::id(), tag)).unwrap()
    }

    #[test]
    fn test_get_is_lazy_and_idempotent() {
        let mut factory = QueueFactory::create(test_name("lazy"), 10 * page_size());
        assert!(!factory.is_bound());

        let first = factory.get().unwrap().as_ptr();
        assert!(factory.is_bound());
        let second = factory.get().unwrap().as_ptr();
        assert_eq!(first, second);
    }

    #[test]
    fn test_attach_sees_creator_writes() {
        let name = test_name("shared");
        let mut producer = QueueFactory::create(name.clone(), 10 * page_size());
        let mut consumer = QueueFactory::attach(name);

        let mut tx = producer.get().unwrap().producer().unwrap();
        assert!(tx.push(b"Hello World!"));

        let queue = consumer.get().unwrap();
        assert_eq!(queue.available(), 12);
        assert_eq!(queue.consumer().unwrap().peek(), Some(&b"Hello World!"[..]));
    }

    #[test]
    fn test_attach_to_missing_region() {
        let mut factory = QueueFactory::attach(test_name("missing"));

        assert!(!factory.can_get());
        let err = factory.get().err().unwrap();
        assert!(matches!(err, SharedMemoryError::NotFound { .. }));
        assert!(err.is_retryable());
        assert!(!factory.is_bound());
    }

    #[test]
    fn test_can_get_after_creation() {
        let name = test_name("canget");
        let mut creator = QueueFactory::create(name.clone(), page_size());
        let observer = QueueFactory::attach(name.clone());

        assert!(!observer.can_get());
        creator.get().unwrap();
        assert!(observer.can_get());

        drop(creator);
        assert!(!observer.can_get());
    }

    #[test]
    fn test_same_name_new_creator_gives_new_queue() {
        let name = test_name("recreate");
        let mut original = QueueFactory::create(name.clone(), page_size());
        let mut original_reader = QueueFactory::attach(name.clone());
        original.get().unwrap();
        original_reader.get().unwrap();

        let mut another = QueueFactory::create(name.clone(), page_size());
        let mut another_reader = QueueFactory::attach(name);

        assert!(original.get().unwrap().producer().unwrap().push_value(&b'a'));
        assert!(another.get().unwrap().producer().unwrap().push_value(&b'b'));

        let mut orig = original_reader.get().unwrap().consumer().unwrap();
        assert_eq!(orig.peek(), Some(&b"a"[..]));
        let mut other = another_reader.get().unwrap().consumer().unwrap();
        assert_eq!(other.peek(), Some(&b"b"[..]));
    }

    #[test]
    fn test_private_factory_with_metadata() {
        let capacity = 10 * page_size();
        let mut factory = QueueFactory::private(capacity).with_metadata(|properties, metadata| {
            assert!(properties.sync);
            metadata[..8].copy_from_slice(&(properties.capacity as u64).to_le_bytes());
            metadata[8..20].copy_from_slice(b"Hello World!");
            Ok(())
        });
        assert!(factory.name().is_none());

        let queue = factory.get().unwrap();
        assert_eq!(queue.capacity(), capacity);
        assert_eq!(&queue.metadata()[..8], &(capacity as u64).to_le_bytes());
        assert_eq!(&queue.metadata()[8..20], b"Hello World!");
        assert_eq!(queue.available(), 0);
        assert_eq!(queue.space(), capacity - 1);
    }

    #[test]
    fn test_initializer_runs_on_get() {
        let called = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&called);
        let mut factory = QueueFactory::create(test_name("mdinit"), page_size())
            .with_metadata(move |_, _| {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            });

        assert!(!called.load(Ordering::SeqCst));
        factory.get().unwrap();
        assert!(called.load(Ordering::SeqCst));
    }

    #[test]
    fn test_failed_initializer_can_be_retried() {
        let mut attempts = 0;
        let mut factory = QueueFactory::create(test_name("retry"), page_size())
            .with_metadata(move |_, _| {
                attempts += 1;
                if attempts == 1 {
                    Err("first attempt refused".to_string())
                } else {
                    Ok(())
                }
            });

        assert!(matches!(
            factory.get().err(),
            Some(SharedMemoryError::MetadataInit { .. })
        ));
        assert!(!factory.is_bound());
        assert!(factory.get().is_ok());
    }

    #[test]
    fn test_relaxed_queue_via_factory() {
        let mut factory = QueueFactory::private(page_size()).with_sync(false);
        let queue = factory.get().unwrap();
        assert!(!queue.is_sync());
        assert!(queue.producer().unwrap().push(b"relaxed"));
        assert_eq!(queue.consumer().unwrap().peek(), Some(&b"relaxed"[..]));
    }

    #[test]
    fn test_attach_only_handle_does_not_remove_name() {
        let name = test_name("attachonly");
        let mut creator = QueueFactory::create(name.clone(), page_size());
        creator.get().unwrap();

        {
            let mut reader = QueueFactory::attach(name.clone());
            reader.get().unwrap();
        }

        assert!(QueueFactory::attach(name).can_get());
    }
}
