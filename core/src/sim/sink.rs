//! Tick-snapshot sinks. The channel sink hands snapshots to the data
//! pipeline over a bounded buffer; a full buffer blocks the scheduler
//! between ticks, never mid-tick.

use anyhow::{Result, anyhow};
use crossbeam::channel::{Receiver, Sender, bounded};

use super::tick_state::TickState;

pub trait TickSink: Send {
    /// Blocks under backpressure.
    fn send(&mut self, state: TickState) -> Result<()>;
    fn close(&mut self);
}

/// Discards every snapshot.
#[derive(Debug, Default)]
pub struct NullSink;

impl TickSink for NullSink {
    fn send(&mut self, _state: TickState) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) {}
}

/// Accumulates snapshots in memory; used by tests and the CLI.
#[derive(Debug, Default)]
pub struct CollectSink {
    pub states: Vec<TickState>,
}

impl TickSink for CollectSink {
    fn send(&mut self, state: TickState) -> Result<()> {
        self.states.push(state);
        Ok(())
    }

    fn close(&mut self) {}
}

/// Single-producer sink over a bounded crossbeam channel.
pub struct ChannelSink {
    tx: Option<Sender<TickState>>,
}

impl ChannelSink {
    pub fn bounded(capacity: usize) -> (Self, Receiver<TickState>) {
        let (tx, rx) = bounded(capacity);
        (Self { tx: Some(tx) }, rx)
    }
}

impl TickSink for ChannelSink {
    fn send(&mut self, state: TickState) -> Result<()> {
        match &self.tx {
            Some(tx) => tx
                .send(state)
                .map_err(|_| anyhow!("tick consumer disconnected")),
            None => Err(anyhow!("sink already closed")),
        }
    }

    fn close(&mut self) {
        self.tx.take();
    }
}
