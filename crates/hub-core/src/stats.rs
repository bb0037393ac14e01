//! Cumulative hub counters: uptime, connect/disconnect, message and byte
//! throughput. Each field is a monotonic unsigned 64-bit counter under its
//! own atomic, mirroring the bucket of independently-lockable counters
//! this implementation's stat tracker used.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug)]
pub struct Stats {
    start: Instant,
    clients_connected: AtomicU64,
    clients_disconnected: AtomicU64,
    incoming_messages: AtomicU64,
    outgoing_messages: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
}

/// Point-in-time snapshot of every counter, suitable for printing or
/// shipping to a load simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub uptime_millis: u64,
    pub clients_connected: u64,
    pub clients_disconnected: u64,
    pub incoming_messages: u64,
    pub outgoing_messages: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            clients_connected: AtomicU64::new(0),
            clients_disconnected: AtomicU64::new(0),
            incoming_messages: AtomicU64::new(0),
            outgoing_messages: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
        }
    }

    pub fn record_connect(&self) {
        self.clients_connected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disconnect(&self) {
        self.clients_disconnected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_incoming(&self) {
        self.incoming_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outgoing(&self) {
        self.outgoing_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes_read(&self, n: u64) {
        self.bytes_read.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_bytes_written(&self, n: u64) {
        self.bytes_written.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_millis: self.start.elapsed().as_millis() as u64,
            clients_connected: self.clients_connected.load(Ordering::Relaxed),
            clients_disconnected: self.clients_disconnected.load(Ordering::Relaxed),
            incoming_messages: self.incoming_messages.load(Ordering::Relaxed),
            outgoing_messages: self.outgoing_messages.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let seconds = self.uptime_millis as f64 / 1000.0;
        writeln!(f)?;
        writeln!(f, "Time alive: {seconds:.3}s")?;
        writeln!(f, "Clients Connected: {}", self.clients_connected)?;
        writeln!(f, "Clients Disconnected: {}", self.clients_disconnected)?;
        writeln!(f, "Incoming Messages: {}", self.incoming_messages)?;
        writeln!(f, "Outgoing Messages: {}", self.outgoing_messages)?;
        writeln!(f, "Bytes Read: {}", self.bytes_read)?;
        writeln!(f, "Bytes Written: {}", self.bytes_written)?;
        if seconds > 0.0 {
            writeln!(f)?;
            writeln!(f, "*** Average values over lifetime ***")?;
            writeln!(
                f,
                "Incoming Messages/Second: {:.2}",
                self.incoming_messages as f64 / seconds
            )?;
            writeln!(
                f,
                "Outgoing Messages/Second: {:.2}",
                self.outgoing_messages as f64 / seconds
            )?;
            writeln!(f, "Bytes Read/Second: {:.2}", self.bytes_read as f64 / seconds)?;
            writeln!(
                f,
                "Bytes Written/Second: {:.2}",
                self.bytes_written as f64 / seconds
            )?;
        }
        Ok(())
    }
}
