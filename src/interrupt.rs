//! Demultiplexing of the shared interrupt line into per-pin edge events.
//!
//! The MCP23017 raises one interrupt for any watched pin.  On each delivery the driver reads the
//! interrupt flag (INTF) and interrupt capture (INTCAP) registers of both ports and turns them
//! into [`EdgeEvent`]s, one per pin that changed in a direction it asked to hear about.
use crate::common::{Edge, Level, PIN_COUNT};

/// A change observed on one pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    /// Logical pin index, 0..16.
    pub pin: u8,
    /// Hardware level captured when the change was latched.
    ///
    /// This is the raw pin level; the pin's active-low setting is not applied.
    pub level: Level,
}

/// Observer receiving the events of one interrupt delivery.
pub trait EdgeListener {
    fn on_edge(&mut self, event: EdgeEvent);
}

impl<F: FnMut(EdgeEvent)> EdgeListener for F {
    fn on_edge(&mut self, event: EdgeEvent) {
        self(event)
    }
}

/// Events of one interrupt delivery, in ascending pin order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvents {
    pending: u16,
    captured: u16,
}

impl EdgeEvents {
    /// Combine the flag and capture words (port B in the upper byte) with the edge setting of
    /// every registered pin.  Unregistered pins map to `None` and never produce events.
    pub(crate) fn demux<F>(flags: u16, captured: u16, edge_of: F) -> Self
    where
        F: Fn(u8) -> Option<Edge>,
    {
        let mut pending = 0u16;
        for pin in 0..PIN_COUNT {
            let mask = 1 << pin;
            if flags & mask == 0 {
                continue;
            }
            let Some(edge) = edge_of(pin) else {
                continue;
            };
            let level = captured & mask != 0;
            if edge.accepts(level) {
                pending |= mask;
            } else {
                log::trace!("io-{}: {:?} edge suppressed (level {})", pin, edge, level as u8);
            }
        }
        Self { pending, captured }
    }
}

impl Iterator for EdgeEvents {
    type Item = EdgeEvent;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pending == 0 {
            return None;
        }
        let pin = self.pending.trailing_zeros() as u8;
        self.pending &= self.pending - 1;
        Some(EdgeEvent {
            pin,
            level: Level::from(self.captured & (1 << pin) != 0),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.pending.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for EdgeEvents {}
