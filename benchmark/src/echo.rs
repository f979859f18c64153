// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Echo peer for round-trip measurements.
//!
//! [`with_echo`] runs a thread that copies everything it reads from a
//! request queue into a reply queue, so a benchmark can time a full
//! request/reply cycle through two rings.

use std::hint::spin_loop;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use twinring_core::{Consumer, Producer, QueueFactory, SharedMemoryError};

/// Raises the stop flag when dropped, including while unwinding.
struct StopOnDrop<'a>(&'a AtomicBool);

impl Drop for StopOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Run `body` with the request producer and the reply consumer while an echo
/// thread serves the other two ends.
///
/// The echo thread stops once `body` returns or panics.
pub fn with_echo<R, F>(capacity: usize, body: F) -> Result<R, SharedMemoryError>
where
    F: FnOnce(&mut Producer<'_>, &mut Consumer<'_>) -> R,
{
    let mut request_factory = QueueFactory::private(capacity);
    let mut reply_factory = QueueFactory::private(capacity);
    let requests = request_factory.get()?;
    let replies = reply_factory.get()?;

    let mut client_tx = requests.producer()?;
    let mut client_rx = replies.consumer()?;
    let echo_rx = requests.consumer()?;
    let echo_tx = replies.producer()?;
    let stop = AtomicBool::new(false);

    Ok(thread::scope(|s| {
        let stop = &stop;
        s.spawn(move || echo(echo_rx, echo_tx, stop));
        let _guard = StopOnDrop(stop);
        body(&mut client_tx, &mut client_rx)
    }))
}

fn echo(mut input: Consumer<'_>, mut output: Producer<'_>, stop: &AtomicBool) {
    while !stop.load(Ordering::Acquire) {
        let copied = match input.peek() {
            Some(bytes) => copy_into(&mut output, bytes),
            None => 0,
        };

        if copied > 0 {
            input.pop(copied);
        } else {
            spin_loop();
        }
    }
}

/// Copy as much of `bytes` as fits; returns the number of bytes published.
fn copy_into(output: &mut Producer<'_>, bytes: &[u8]) -> usize {
    let len = bytes.len().min(output.space());
    if len == 0 {
        return 0;
    }

    match output.alloc(len) {
        Some(span) => {
            span.copy_from_slice(&bytes[..len]);
            output.commit(len);
            len
        }
        None => 0,
    }
}

/// Write all of `payload`, waiting for space as needed.
pub fn send_all(tx: &mut Producer<'_>, payload: &[u8]) {
    let mut sent = 0;
    while sent < payload.len() {
        let copied = copy_into(tx, &payload[sent..]);
        if copied == 0 {
            spin_loop();
        }
        sent += copied;
    }
}

/// Fill `buf` from `rx`, waiting for data as needed.
pub fn receive_exact(rx: &mut Consumer<'_>, buf: &mut [u8]) {
    let mut received = 0;
    while received < buf.len() {
        let len = match rx.peek() {
            Some(bytes) => {
                let len = bytes.len().min(buf.len() - received);
                buf[received..received + len].copy_from_slice(&bytes[..len]);
                len
            }
            None => {
                spin_loop();
                continue;
            }
        };
        rx.pop(len);
        received += len;
    }
}

/// Send `payload` and wait for the echoed copy in `scratch`.
pub fn round_trip(
    tx: &mut Producer<'_>,
    rx: &mut Consumer<'_>,
    payload: &[u8],
    scratch: &mut [u8],
) {
    send_all(tx, payload);
    receive_exact(rx, &mut scratch[..payload.len()]);
}

/// Time `iterations` round trips of `payload` after `warmup` untimed ones.
///
/// Returns one latency sample in nanoseconds per timed round trip.
pub fn sample_round_trips(
    tx: &mut Producer<'_>,
    rx: &mut Consumer<'_>,
    payload: &[u8],
    warmup: usize,
    iterations: usize,
) -> Vec<u64> {
    let mut scratch = vec![0u8; payload.len()];
    for _ in 0..warmup {
        round_trip(tx, rx, payload, &mut scratch);
    }

    (0..iterations)
        .map(|_| {
            let start = Instant::now();
            round_trip(tx, rx, payload, &mut scratch);
            start.elapsed().as_nanos() as u64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use twinring_core::shm::page_size;

    #[test]
    fn test_echo_returns_payload() {
        let payload: Vec<u8> = (0..200u8).collect();
        let echoed = with_echo(page_size(), |tx, rx| {
            let mut scratch = vec![0u8; payload.len()];
            round_trip(tx, rx, &payload, &mut scratch);
            scratch
        })
        .unwrap();

        assert_eq!(echoed, payload);
    }

    #[test]
    fn test_echo_handles_payload_larger_than_ring() {
        let payload: Vec<u8> = (0..3 * page_size()).map(|i| (i % 251) as u8).collect();
        let echoed = with_echo(page_size(), |tx, rx| {
            let mut scratch = vec![0u8; payload.len()];
            thread::scope(|s| {
                s.spawn(|| send_all(tx, &payload));
                receive_exact(rx, &mut scratch);
            });
            scratch
        })
        .unwrap();

        assert_eq!(echoed, payload);
    }

    #[test]
    fn test_sample_round_trips_counts_timed_iterations() {
        let samples = with_echo(page_size(), |tx, rx| {
            sample_round_trips(tx, rx, b"sample", 10, 50)
        })
        .unwrap();

        assert_eq!(samples.len(), 50);
        assert!(samples.iter().all(|&ns| ns > 0));
    }

    #[test]
    fn test_panicking_body_stops_echo_thread() {
        let result = catch_unwind(AssertUnwindSafe(|| {
            with_echo(page_size(), |tx, _rx| {
                // Leave unread replies behind so the echo thread is busy.
                send_all(tx, &[1u8; 64]);
                panic!("body failed");
            })
        }));

        assert!(result.is_err());
    }
}
