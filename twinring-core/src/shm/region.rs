// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared memory lifecycle for circular queues.
//!
//! Creates, maps, double-maps and removes the POSIX shared memory objects
//! that back [`CircularQueue`]s. Every resource acquired on the way is held
//! by a guard, so a failure at any step releases everything acquired before
//! it: mappings are unmapped, descriptors closed and a freshly created name
//! removed.

use std::ops::Deref;
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::SharedMemoryError;
use crate::shm::footprint::{footprint, mapping_len, page_size};
use crate::shm::queue::{CircularQueue, MetadataInit};
use crate::types::RegionName;

/// Permission bits for new objects (owner read/write/execute).
const REGION_MODE: libc::mode_t = 0o700;

/// Sequence for private region names, combined with the process id.
static PRIVATE_SEQ: AtomicUsize = AtomicUsize::new(0);

/// A queue mapped into this process with its data region doubled.
///
/// Unmaps the whole view on drop. Never removes the region name; that is the
/// owning [`crate::shm::QueueFactory`]'s job.
pub struct MappedQueue {
    queue: CircularQueue,
    name: String,
    released: bool,
}

impl MappedQueue {
    /// The queue bound onto this mapping.
    pub fn queue(&self) -> &CircularQueue {
        &self.queue
    }

    /// Name the region was mapped from. Private regions keep their transient name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes of address space this mapping reserves.
    pub fn mapping_len(&self) -> usize {
        mapping_len(self.queue.capacity())
    }

    /// Release the mapping now and report failure instead of logging it.
    pub fn unmap(mut self) -> Result<(), SharedMemoryError> {
        self.released = true;
        self.munmap()
    }

    fn munmap(&self) -> Result<(), SharedMemoryError> {
        // The capacity is immutable, so this is exactly the length mapped.
        let len = self.mapping_len();

        // SAFETY: the queue was bound onto a mapping of `len` bytes that this
        // value exclusively owns; the doubled data lies inside that range.
        let result = unsafe { libc::munmap(self.queue.as_ptr().cast(), len) };
        if result != 0 {
            return Err(SharedMemoryError::last_os("munmap", &self.name));
        }

        tracing::debug!(name = %self.name, len = len, "Unmapped circular queue");
        Ok(())
    }
}

impl Deref for MappedQueue {
    type Target = CircularQueue;

    fn deref(&self) -> &CircularQueue {
        &self.queue
    }
}

impl Drop for MappedQueue {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        if let Err(e) = self.munmap() {
            tracing::error!(name = %self.name, error = %e, "Failed to unmap circular queue");
        }
    }
}

/// A mapping that is unmapped on drop unless handed over.
struct Mapping {
    ptr: NonNull<u8>,
    len: usize,
}

impl Mapping {
    /// Map `len` bytes of `fd` starting at `offset`.
    fn new(
        fd: &OwnedFd,
        len: usize,
        offset: usize,
        prot: libc::c_int,
        name: &RegionName,
    ) -> Result<Self, SharedMemoryError> {
        // SAFETY: fd is an open shared memory object; the kernel picks the address.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                prot,
                libc::MAP_SHARED,
                fd.as_raw_fd(),
                offset as libc::off_t,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(SharedMemoryError::last_os("mmap", name.as_str()));
        }

        match NonNull::new(ptr.cast::<u8>()) {
            Some(ptr) => Ok(Self { ptr, len }),
            None => Err(SharedMemoryError::Os {
                step: "mmap",
                name: name.to_string(),
                source: std::io::Error::other("mmap returned a null mapping"),
            }),
        }
    }

    /// Replace the `len` bytes at `self.ptr + at` with `len` bytes of `fd`
    /// starting at `offset`.
    fn overlay(
        &self,
        fd: &OwnedFd,
        at: usize,
        len: usize,
        offset: usize,
        name: &RegionName,
    ) -> Result<(), SharedMemoryError> {
        debug_assert!(at + len <= self.len);

        // SAFETY: the target range lies inside a mapping this value owns, so
        // MAP_FIXED only replaces our own pages.
        let ptr = unsafe {
            let target = self.ptr.as_ptr().add(at);
            libc::mmap(
                target.cast(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_FIXED,
                fd.as_raw_fd(),
                offset as libc::off_t,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(SharedMemoryError::last_os("mmap", name.as_str()));
        }
        Ok(())
    }

    /// Unmap now, reporting failure.
    fn unmap(self, name: &RegionName) -> Result<(), SharedMemoryError> {
        let (ptr, len) = self.into_raw();
        // SAFETY: ptr/len describe a mapping we own and nobody references.
        if unsafe { libc::munmap(ptr.as_ptr().cast(), len) } != 0 {
            return Err(SharedMemoryError::last_os("munmap", name.as_str()));
        }
        Ok(())
    }

    /// Hand the mapping over without unmapping it.
    fn into_raw(self) -> (NonNull<u8>, usize) {
        let this = std::mem::ManuallyDrop::new(self);
        (this.ptr, this.len)
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        // SAFETY: ptr/len describe a mapping we own.
        if unsafe { libc::munmap(self.ptr.as_ptr().cast(), self.len) } != 0 {
            tracing::warn!(
                len = self.len,
                error = %std::io::Error::last_os_error(),
                "Failed to unmap during rollback"
            );
        }
    }
}

/// Removes a freshly created name on drop unless disarmed.
struct NameGuard<'a> {
    name: &'a RegionName,
    armed: bool,
}

impl<'a> NameGuard<'a> {
    fn new(name: &'a RegionName) -> Self {
        Self { name, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for NameGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        tracing::warn!(name = %self.name, "Rolling back region creation");
        if let Err(e) = delete_shared(self.name) {
            tracing::warn!(name = %self.name, error = %e, "Failed to remove region during rollback");
        }
    }
}

fn open_region(name: &RegionName, flags: libc::c_int) -> Result<OwnedFd, SharedMemoryError> {
    let c_name = name.to_c_string();

    // SAFETY: c_name is a valid NUL-terminated string.
    let fd = unsafe { libc::shm_open(c_name.as_ptr(), flags, REGION_MODE) };
    if fd < 0 {
        let source = std::io::Error::last_os_error();
        if flags & libc::O_CREAT == 0 && source.raw_os_error() == Some(libc::ENOENT) {
            return Err(SharedMemoryError::NotFound {
                name: name.to_string(),
            });
        }
        return Err(SharedMemoryError::Os {
            step: "shm_open",
            name: name.to_string(),
            source,
        });
    }

    // SAFETY: shm_open returned a fresh descriptor that nothing else owns.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

fn close_region(fd: OwnedFd, name: &RegionName) -> Result<(), SharedMemoryError> {
    // SAFETY: into_raw_fd transfers ownership, so the descriptor is closed once.
    if unsafe { libc::close(fd.into_raw_fd()) } != 0 {
        return Err(SharedMemoryError::last_os("close", name.as_str()));
    }
    Ok(())
}

fn region_size(fd: &OwnedFd, name: &RegionName) -> Result<usize, SharedMemoryError> {
    let mut stat = std::mem::MaybeUninit::<libc::stat>::uninit();

    // SAFETY: fd is open and stat points to writable storage.
    if unsafe { libc::fstat(fd.as_raw_fd(), stat.as_mut_ptr()) } != 0 {
        return Err(SharedMemoryError::last_os("fstat", name.as_str()));
    }

    // SAFETY: fstat succeeded and filled the struct.
    let size = unsafe { stat.assume_init() }.st_size;
    Ok(size.max(0) as usize)
}

fn check_capacity(capacity: usize) -> Result<(), SharedMemoryError> {
    let page = page_size();
    if capacity == 0 || capacity % page != 0 {
        return Err(SharedMemoryError::InvalidCapacity {
            capacity,
            page_size: page,
        });
    }
    Ok(())
}

/// Read the published capacity through a one-page probe mapping.
///
/// Returns the capacity and the object size. The probe is unmapped before
/// returning.
fn read_capacity(
    fd: &OwnedFd,
    prot: libc::c_int,
    name: &RegionName,
) -> Result<(usize, usize), SharedMemoryError> {
    let page = page_size();

    // An object that has not been sized yet would fault on first access.
    let size = region_size(fd, name)?;
    if size <= page {
        return Err(SharedMemoryError::NotReady {
            name: name.to_string(),
        });
    }

    let probe = Mapping::new(fd, footprint(0), 0, prot, name)?;
    // SAFETY: the probe maps the whole control page.
    let capacity = unsafe { CircularQueue::published_capacity_at(probe.ptr) };
    probe.unmap(name)?;

    if capacity == 0 {
        return Err(SharedMemoryError::NotReady {
            name: name.to_string(),
        });
    }

    Ok((capacity, size))
}

/// Create a named region for a queue of `capacity` bytes.
///
/// Removes any stale object with the same name first, then creates the new
/// one exclusively, initializes the control block, runs `initializer` against
/// the metadata span and publishes the capacity last. The creator does not
/// stay mapped.
///
/// `capacity` must be a non-zero multiple of the page size so the second view
/// of the data lands right after the first.
pub fn create_shared(
    name: &RegionName,
    capacity: usize,
    sync: bool,
    initializer: &mut MetadataInit<'_>,
) -> Result<(), SharedMemoryError> {
    check_capacity(capacity)?;
    delete_shared(name)?;

    // Nothing to roll back if this fails: the object is not ours.
    let fd = open_region(name, libc::O_RDWR | libc::O_CREAT | libc::O_EXCL)?;
    let guard = NameGuard::new(name);

    let len = mapping_len(capacity);
    // SAFETY: fd is open for writing.
    if unsafe { libc::ftruncate(fd.as_raw_fd(), len as libc::off_t) } != 0 {
        return Err(SharedMemoryError::last_os("ftruncate", name.as_str()));
    }

    let mapping = Mapping::new(&fd, len, 0, libc::PROT_READ | libc::PROT_WRITE, name)?;
    {
        // SAFETY: the mapping covers the control page and 2 * capacity bytes
        // after it, and outlives `queue`. The object was created exclusively
        // and attachers ignore it until the capacity is published.
        let queue = unsafe { CircularQueue::from_raw(mapping.ptr) };
        unsafe { queue.init(capacity, sync, initializer) }.map_err(|reason| {
            SharedMemoryError::MetadataInit {
                name: name.to_string(),
                reason,
            }
        })?;
    }
    mapping.unmap(name)?;
    close_region(fd, name)?;
    guard.disarm();

    tracing::debug!(name = %name, capacity = capacity, sync = sync, len = len, "Created shared circular queue");
    Ok(())
}

/// Remove a region name. A missing name is not an error.
///
/// Existing mappings stay valid; the memory is released with the last one.
pub fn delete_shared(name: &RegionName) -> Result<(), SharedMemoryError> {
    let c_name = name.to_c_string();

    // SAFETY: c_name is a valid NUL-terminated string.
    if unsafe { libc::shm_unlink(c_name.as_ptr()) } != 0 {
        let source = std::io::Error::last_os_error();
        if source.raw_os_error() == Some(libc::ENOENT) {
            return Ok(());
        }
        return Err(SharedMemoryError::Os {
            step: "shm_unlink",
            name: name.to_string(),
            source,
        });
    }

    tracing::debug!(name = %name, "Removed shared circular queue name");
    Ok(())
}

/// Attach to an initialized named region.
///
/// Reads the capacity through a one-page probe, then maps
/// `footprint + capacity` bytes and maps the data pages a second time right
/// after the footprint:
///
/// ```text
/// object:  | control | data |
/// view:    | control | data | pad | data |
///          0         page        footprint
/// ```
///
/// Returns [`SharedMemoryError::NotFound`] if the name does not exist and
/// [`SharedMemoryError::NotReady`] if its creator has not published the
/// capacity yet. Both are worth retrying.
pub fn map_shared(name: &RegionName) -> Result<MappedQueue, SharedMemoryError> {
    let fd = open_region(name, libc::O_RDWR)?;
    let (capacity, size) = read_capacity(&fd, libc::PROT_READ | libc::PROT_WRITE, name)?;
    check_capacity(capacity)?;

    let footprint = footprint(capacity);
    let len = footprint + capacity;
    if size < len {
        return Err(SharedMemoryError::SizeMismatch {
            name: name.to_string(),
            expected: len,
            actual: size,
        });
    }

    let mapping = Mapping::new(&fd, len, 0, libc::PROT_READ | libc::PROT_WRITE, name)?;
    mapping.overlay(&fd, footprint, capacity, page_size(), name)?;
    close_region(fd, name)?;

    let (ptr, _) = mapping.into_raw();
    // SAFETY: the view is one page plus 2 * capacity bytes with the second
    // capacity bytes aliasing the first; MappedQueue owns it from here on.
    let queue = unsafe { CircularQueue::from_raw(ptr) };

    tracing::debug!(name = %name, capacity = capacity, len = len, "Mapped shared circular queue");
    Ok(MappedQueue {
        queue,
        name: name.to_string(),
        released: false,
    })
}

/// Report the capacity of an initialized named region without keeping it mapped.
///
/// Fails with the same retryable conditions as [`map_shared`].
pub fn probe_shared(name: &RegionName) -> Result<usize, SharedMemoryError> {
    let fd = open_region(name, libc::O_RDONLY)?;
    let (capacity, _) = read_capacity(&fd, libc::PROT_READ, name)?;
    close_region(fd, name)?;
    Ok(capacity)
}

/// Release a mapping obtained from [`map_shared`].
pub fn unmap_shared(queue: MappedQueue) -> Result<(), SharedMemoryError> {
    queue.unmap()
}

/// Create an anonymous queue visible only through the returned mapping.
///
/// The region gets a transient process-unique name which is removed as soon
/// as the creator has mapped it.
pub fn create_private(
    capacity: usize,
    sync: bool,
    initializer: &mut MetadataInit<'_>,
) -> Result<MappedQueue, SharedMemoryError> {
    let seq = PRIVATE_SEQ.fetch_add(1, Ordering::Relaxed);
    let name = RegionName::new_unchecked(format!(
        "/.twinring.{}.{}",
        nix::unistd::getpid().as_raw(),
        seq
    ));

    create_shared(&name, capacity, sync, initializer)?;

    let queue = match map_shared(&name) {
        Ok(queue) => queue,
        Err(e) => {
            if let Err(unlink) = delete_shared(&name) {
                tracing::warn!(name = %name, error = %unlink, "Failed to remove private region");
            }
            return Err(e);
        }
    };

    // On failure `queue` is dropped and unmapped here.
    delete_shared(&name)?;

    tracing::debug!(name = %name, capacity = capacity, "Created private circular queue");
    Ok(queue)
}

/// Release a queue obtained from [`create_private`].
pub fn delete_private(queue: MappedQueue) -> Result<(), SharedMemoryError> {
    queue.unmap()
}
