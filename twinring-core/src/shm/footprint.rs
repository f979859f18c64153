// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Page-aligned layout sizes.
//!
//! The first page of every region holds the control block. The data pages
//! follow it, rounded up to whole pages.

use std::sync::OnceLock;

static PAGE_SIZE: OnceLock<usize> = OnceLock::new();

/// System page size in bytes, queried once per process.
///
/// # Panics
/// Panics if the page size cannot be determined. Nothing in this crate can
/// lay out a region without it.
pub fn page_size() -> usize {
    *PAGE_SIZE.get_or_init(|| {
        // SAFETY: sysconf has no memory safety preconditions.
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size <= 0 {
            panic!(
                "cannot determine system page size: {}",
                std::io::Error::last_os_error()
            );
        }
        size as usize
    })
}

/// Size of the control page plus the data pages for `capacity` bytes.
///
/// ```text
/// capacity == 0             => page
/// capacity == 1             => 2 * page
/// capacity == page          => 2 * page
/// capacity == page + 1      => 3 * page
/// ```
pub fn footprint(capacity: usize) -> usize {
    footprint_with_page(capacity, page_size())
}

fn footprint_with_page(capacity: usize, page: usize) -> usize {
    if capacity == 0 {
        return page;
    }
    page + capacity.div_ceil(page) * page
}

/// Bytes of address space reserved by one full mapping of a queue.
///
/// The backing object has this size too: the tail past the data pages is
/// what the second view of the data replaces.
pub fn mapping_len(capacity: usize) -> usize {
    footprint(capacity) + capacity
}
