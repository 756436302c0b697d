use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use log::debug;

use crate::core_channel::error::ChannelError;

/// Bounded pool of local ports for master-hosted passive listeners, shared
/// by every session. Acquisition hands back a guard that returns the port
/// to the pool when dropped, so a port can never be released twice or leak
/// across an error path.
pub struct PassivePortPool {
    min: u16,
    max: u16,
    state: Mutex<PoolState>,
}

struct PoolState {
    next: u16,
    in_use: HashSet<u16>,
}

impl PassivePortPool {
    pub fn new(min: u16, max: u16) -> Self {
        assert!(min <= max, "empty passive port range");
        Self {
            min,
            max,
            state: Mutex::new(PoolState {
                next: min,
                in_use: HashSet::new(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        (self.max - self.min) as usize + 1
    }

    /// Ports currently free.
    pub fn available(&self) -> usize {
        let state = self.state.lock().unwrap();
        self.capacity() - state.in_use.len()
    }

    /// Picks the next free port, walking the range round-robin so a port
    /// that just failed to bind is not handed straight back.
    pub fn acquire(self: &Arc<Self>) -> Result<PooledPort, ChannelError> {
        let mut state = self.state.lock().unwrap();
        let span = self.capacity() as u32;
        let start = state.next;
        for step in 0..span {
            let offset = (u32::from(start - self.min) + step) % span;
            let port = self.min + offset as u16;
            if state.in_use.insert(port) {
                state.next = if port == self.max { self.min } else { port + 1 };
                debug!("Passive port {} acquired", port);
                return Ok(PooledPort {
                    port,
                    pool: Arc::clone(self),
                });
            }
        }
        Err(ChannelError::NoPortsAvailable)
    }

    fn release(&self, port: u16) {
        let mut state = self.state.lock().unwrap();
        state.in_use.remove(&port);
        debug!("Passive port {} released", port);
    }
}

/// Exclusive hold on one pool port. The port stays reserved for exactly as
/// long as this guard is alive.
pub struct PooledPort {
    port: u16,
    pool: Arc<PassivePortPool>,
}

impl PooledPort {
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for PooledPort {
    fn drop(&mut self) {
        self.pool.release(self.port);
    }
}
