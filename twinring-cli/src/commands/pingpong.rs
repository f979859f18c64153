// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `twinring ping` / `twinring pong` commands - Cross-process round trips.
//!
//! Each side creates the queue it reads from and attaches to the queue it
//! writes to, so the two processes can start in any order. Ping seeds the
//! exchange with 0; whichever side receives k answers with k + 1.

use std::mem::size_of;
use std::thread;
use std::time::Instant;

use thiserror::Error;
use twinring_core::{Config, ConfigLoader, Consumer, Producer, QueueFactory, RegionName};

/// Which end of the exchange this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Ping,
    Pong,
}

#[derive(Debug, Error)]
pub enum PingPongError {
    #[error("Peer queue {name} not ready after {attempts} attempts")]
    PeerNotReady { name: RegionName, attempts: u32 },

    #[error("Out of order message: expected {expected}, got {actual}")]
    OutOfOrder { expected: u64, actual: u64 },
}

pub fn execute(
    config_path: Option<&str>,
    role: Role,
    iterations: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = match config_path {
        Some(path) => ConfigLoader::load_file(path)?,
        None => Config::default(),
    };
    let channel = &config.channel;
    let messages = iterations.unwrap_or(config.pingpong.iterations);

    let (read_name, write_name) = match role {
        Role::Ping => (&channel.pong, &channel.ping),
        Role::Pong => (&channel.ping, &channel.pong),
    };

    let mut inbox =
        QueueFactory::create(read_name.clone(), channel.capacity).with_sync(channel.sync);
    let mut outbox = QueueFactory::attach(write_name.clone());

    tracing::info!(role = ?role, inbox = %read_name, outbox = %write_name, "Creating inbox");
    let mut rx = inbox.get()?.consumer()?;

    let attempts = config.pingpong.attach_attempts;
    let mut ready = false;
    for attempt in 1..=attempts {
        if outbox.can_get() {
            ready = true;
            break;
        }
        tracing::debug!(name = %write_name, attempt = attempt, "Waiting for peer queue");
        thread::sleep(config.pingpong.attach_interval);
    }
    if !ready && !outbox.can_get() {
        return Err(PingPongError::PeerNotReady {
            name: write_name.clone(),
            attempts,
        }
        .into());
    }
    let mut tx = outbox.get()?.producer()?;
    tracing::info!(name = %write_name, "Attached to peer queue");

    let start = Instant::now();
    let received = exchange(&mut rx, &mut tx, role == Role::Ping, messages)?;
    let elapsed = start.elapsed();

    let rate = received as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    tracing::info!(
        received = received,
        elapsed_ms = elapsed.as_millis() as u64,
        "Exchange complete"
    );
    println!("✓ Sent and received {} messages in {:?}", messages, elapsed);
    println!("  {:.0} messages/s received", rate);
    Ok(())
}

/// Run the sequence exchange until `messages` numbers have been used.
///
/// Returns how many messages this side received.
pub fn exchange(
    rx: &mut Consumer<'_>,
    tx: &mut Producer<'_>,
    seed: bool,
    messages: u64,
) -> Result<u64, PingPongError> {
    let mut seq = 0u64;
    let mut received = 0u64;

    if seed {
        send(tx, seq);
        seq += 1;
    }

    while seq < messages {
        // SAFETY: both sides only ever push u64 sequence numbers.
        let Some(value) = (unsafe { rx.front_value::<u64>() }) else {
            std::hint::spin_loop();
            continue;
        };

        if value != seq {
            return Err(PingPongError::OutOfOrder {
                expected: seq,
                actual: value,
            });
        }
        rx.pop(size_of::<u64>());
        received += 1;
        seq += 1;

        if seq < messages {
            send(tx, seq);
            seq += 1;
        }
    }

    Ok(received)
}

fn send(tx: &mut Producer<'_>, value: u64) {
    while !tx.push_value(&value) {
        std::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twinring_core::shm::page_size;

    #[test]
    fn test_exchange_between_threads() {
        let mut ping = QueueFactory::private(page_size());
        let mut pong = QueueFactory::private(page_size());
        let ping_q = ping.get().unwrap();
        let pong_q = pong.get().unwrap();

        let (ping_received, pong_received) = thread::scope(|s| {
            let pong_side = s.spawn(|| {
                let mut rx = ping_q.consumer().unwrap();
                let mut tx = pong_q.producer().unwrap();
                exchange(&mut rx, &mut tx, false, 10_000)
            });
            let mut rx = pong_q.consumer().unwrap();
            let mut tx = ping_q.producer().unwrap();
            let ping_received = exchange(&mut rx, &mut tx, true, 10_000).unwrap();
            (ping_received, pong_side.join().unwrap().unwrap())
        });

        assert_eq!(ping_received, 5_000);
        assert_eq!(pong_received, 5_000);
        assert!(ping_q.is_empty());
        assert!(pong_q.is_empty());
    }

    #[test]
    fn test_exchange_detects_out_of_order() {
        let mut inbox = QueueFactory::private(page_size());
        let mut outbox = QueueFactory::private(page_size());
        let rq = inbox.get().unwrap();
        let wq = outbox.get().unwrap();

        assert!(rq.producer().unwrap().push_value(&5u64));
        let result = exchange(
            &mut rq.consumer().unwrap(),
            &mut wq.producer().unwrap(),
            true,
            10,
        );
        assert!(matches!(
            result,
            Err(PingPongError::OutOfOrder {
                expected: 1,
                actual: 5
            })
        ));
    }
}
