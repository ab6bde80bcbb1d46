//! Acknowledgment engine.
//!
//! Server-side state changes reach the client one round trip later. To know
//! when the client actually observed a change, the change is queued as a
//! closure in the current batch. When the batch is flushed the client gets a
//! latency probe carrying the batch's timestamp. The client echoes probes in
//! order, so an echo acknowledges its own batch and every batch sent before it.
//!
//! The engine is generic over the context the closures mutate, which keeps it
//! free of any back-reference to the player that owns it.

use crate::error::{ProxyError, Result};
use log::trace;
use rand::rngs::StdRng;
use rand::Rng;
use shared::{DeviceOs, Packet, DOUBLE_LATENCY_SCALING_PROTOCOL};
use std::collections::VecDeque;

pub type AckAction<C> = Box<dyn FnOnce(&mut C) + Send>;

/// Attempts at drawing a nonce that no queued batch uses.
const MAX_NONCE_ATTEMPTS: usize = 16;

/// One scaling layer applied by the client to echoed latency timestamps.
pub const SCALE_LAYER: i64 = 1000;

pub struct AckBatch<C> {
    nonce: i64,
    actions: Vec<AckAction<C>>,
}

impl<C> AckBatch<C> {
    fn new(nonce: i64) -> Self {
        Self {
            nonce,
            actions: Vec::new(),
        }
    }
}

pub struct AckEngine<C> {
    current: AckBatch<C>,
    pending: VecDeque<AckBatch<C>>,
    rng: StdRng,
    scale: i64,
    non_response_ticks: u32,
    timeout_ticks: u32,
}

/// Factor applied to nonces before they go on the wire.
///
/// PlayStation clients and every client on a legacy protocol echo with one
/// layer of scaling; everyone else echoes with two.
pub fn timestamp_scale(device_os: DeviceOs, protocol: i32) -> i64 {
    if device_os == DeviceOs::PlayStation || protocol < DOUBLE_LATENCY_SCALING_PROTOCOL {
        SCALE_LAYER
    } else {
        SCALE_LAYER * SCALE_LAYER
    }
}

impl<C> AckEngine<C> {
    pub fn new(device_os: DeviceOs, protocol: i32, timeout_ticks: u32, mut rng: StdRng) -> Self {
        let nonce = rng.gen_range(1..=u32::MAX as i64);
        Self {
            current: AckBatch::new(nonce),
            pending: VecDeque::new(),
            rng,
            scale: timestamp_scale(device_os, protocol),
            non_response_ticks: 0,
            timeout_ticks,
        }
    }

    pub fn scale(&self) -> i64 {
        self.scale
    }

    /// Queues an action for the current batch.
    pub fn add(&mut self, action: impl FnOnce(&mut C) + Send + 'static) {
        self.current.actions.push(Box::new(action));
    }

    pub fn current_len(&self) -> usize {
        self.current.actions.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn non_response_ticks(&self) -> u32 {
        self.non_response_ticks
    }

    /// Wire timestamp of the batch currently being filled.
    pub fn current_timestamp(&self) -> i64 {
        self.current.nonce * self.scale
    }

    fn nonce_in_use(&self, nonce: i64) -> bool {
        self.current.nonce == nonce || self.pending.iter().any(|b| b.nonce == nonce)
    }

    fn fresh_nonce(&mut self) -> Result<i64> {
        for _ in 0..MAX_NONCE_ATTEMPTS {
            let nonce = self.rng.gen_range(1..=u32::MAX as i64);
            if !self.nonce_in_use(nonce) {
                return Ok(nonce);
            }
        }
        Err(ProxyError::Internal("ack nonce space exhausted".into()))
    }

    /// Sends the current batch if it holds any action.
    ///
    /// Returns the latency probe to write to the client. The batch moves to the
    /// pending queue and a new current batch with an unused nonce takes its place.
    pub fn flush(&mut self) -> Result<Option<Packet>> {
        if self.current.actions.is_empty() {
            return Ok(None);
        }
        let nonce = self.fresh_nonce()?;
        self.refresh_with(nonce);
        let sent = self
            .pending
            .back()
            .map(|b| b.nonce * self.scale)
            .unwrap_or_default();
        trace!("Flushed ack batch {} ({} pending)", sent, self.pending.len());
        Ok(Some(Packet::NetworkStackLatency {
            timestamp: sent,
            needs_response: true,
        }))
    }

    /// Moves the current batch to the pending queue and starts a new one with `nonce`.
    pub(crate) fn refresh_with(&mut self, nonce: i64) {
        let sent = std::mem::replace(&mut self.current, AckBatch::new(nonce));
        self.pending.push_back(sent);
    }

    /// Renames the batch being filled. Fails when `nonce` is already outstanding.
    pub fn set_current_nonce(&mut self, nonce: i64) -> bool {
        if nonce <= 0 || self.pending.iter().any(|b| b.nonce == nonce) {
            return false;
        }
        self.current.nonce = nonce;
        true
    }

    fn unscale(&self, echoed: i64) -> Option<i64> {
        if echoed <= 0 || echoed % self.scale != 0 {
            return None;
        }
        Some(echoed / self.scale)
    }

    /// Matches an echoed timestamp against the pending queue.
    ///
    /// On a match every batch up to and including the matching one is removed
    /// and their actions are returned oldest first; the probe must then not be
    /// forwarded. `None` means the echo belongs to someone else.
    pub fn acknowledge(&mut self, echoed: i64) -> Option<Vec<AckAction<C>>> {
        let nonce = self.unscale(echoed)?;
        let index = self.pending.iter().position(|b| b.nonce == nonce)?;

        let mut actions = Vec::new();
        for batch in self.pending.drain(..=index) {
            actions.extend(batch.actions);
        }
        self.non_response_ticks = 0;
        trace!("Acknowledged ack batch {} ({} actions)", echoed, actions.len());
        Some(actions)
    }

    /// Counts one client tick without an echo while batches are outstanding.
    pub fn tick(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            self.non_response_ticks = 0;
            return Ok(());
        }
        self.non_response_ticks += 1;
        if self.non_response_ticks >= self.timeout_ticks {
            return Err(ProxyError::NetworkTimeout);
        }
        Ok(())
    }

    /// Forfeits every outstanding batch, used when the upstream changes.
    pub fn invalidate(&mut self) {
        self.pending.clear();
        self.current.actions.clear();
        self.non_response_ticks = 0;
    }
}
