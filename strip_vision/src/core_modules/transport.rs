// THEORY:
// The transport is the process-group runtime the filter runs on. The core treats it
// as an ordered, reliable message bus between ranks and asks only four things of it:
// who am I, how many of us are there, send to a rank, receive from a rank. Broadcast
// is built on top of those.
//
// `ChannelBus` is the in-memory implementation: every participant is a tokio task and
// the group is a star around `ROOT`. Each worker gets one unbounded FIFO to the root
// and one back. Per-link queues are what make "receive from rank r" possible and
// keep one worker's frames in the order it sent them, never interleaved with another
// worker's. Workers never talk to each other, so no links exist between them.
//
// A peer that drops its endpoint closes its queues, so a receive on a dead peer fails
// with `TransportFailure` instead of hanging.

use crate::core_modules::error::{FilterError, Result};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// The coordinator's rank, and the root of every broadcast.
pub const ROOT: usize = 0;

/// Every message shape the protocol knows.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// The broadcast kernel: its side length and row-major weights.
    Kernel { size: usize, weights: Vec<f32> },
    /// Sent in place of a kernel when the run cannot start.
    Abort { reason: String },
    /// An encoded `PartialResult` frame.
    Partial(Vec<u8>),
}

impl Packet {
    pub fn describe(&self) -> &'static str {
        match self {
            Packet::Kernel { .. } => "kernel",
            Packet::Abort { .. } => "abort",
            Packet::Partial(_) => "partial result",
        }
    }
}

/// A participant's handle on the process group.
pub trait Transport: Send {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    fn send(&self, to: usize, packet: Packet) -> impl Future<Output = Result<()>> + Send;

    fn recv_from(&mut self, from: usize) -> impl Future<Output = Result<Packet>> + Send;

    /// One-to-all broadcast. The root passes `Some(packet)` and gets it back; every
    /// other rank passes `None` and receives the root's packet.
    fn broadcast(
        &mut self,
        root: usize,
        packet: Option<Packet>,
    ) -> impl Future<Output = Result<Packet>> + Send {
        async move {
            if self.rank() != root {
                return self.recv_from(root).await;
            }
            let packet = packet.ok_or_else(|| {
                FilterError::transport(format!("broadcast root {root} has nothing to send"))
            })?;
            for to in (0..self.size()).filter(|&to| to != root) {
                self.send(to, packet.clone()).await?;
            }
            Ok(packet)
        }
    }
}

/// Shared counters for a `ChannelBus` group.
#[derive(Debug, Clone, Default)]
pub struct BusStats {
    packets_sent: Arc<AtomicUsize>,
}

impl BusStats {
    pub fn packets_sent(&self) -> usize {
        self.packets_sent.load(Ordering::Relaxed)
    }
}

/// One rank's endpoint on an in-memory bus.
pub struct ChannelEndpoint {
    rank: usize,
    size: usize,
    /// One per link: the root holds a link per worker (slot `rank - 1`), a worker
    /// holds its single link to the root (slot 0).
    outboxes: Vec<mpsc::UnboundedSender<Packet>>,
    inboxes: Vec<mpsc::UnboundedReceiver<Packet>>,
    stats: BusStats,
}

impl ChannelEndpoint {
    /// Maps a peer rank onto this endpoint's link slot. Worker-to-worker pairs,
    /// self-links and out-of-range ranks have none.
    fn link_slot(&self, peer: usize) -> Option<usize> {
        if peer >= self.size || peer == self.rank {
            None
        } else if self.rank == ROOT {
            Some(peer - 1)
        } else if peer == ROOT {
            Some(0)
        } else {
            None
        }
    }

    fn no_link(&self, peer: usize) -> FilterError {
        FilterError::transport(format!(
            "rank {} has no link to rank {peer} in a group of {}",
            self.rank, self.size
        ))
    }
}

/// Builder for star-shaped groups of `ChannelEndpoint`s centred on `ROOT`.
pub struct ChannelBus;

impl ChannelBus {
    /// Creates `size` endpoints; endpoint `i` has rank `i`. Only root-to-worker and
    /// worker-to-root pairs are wired, so a group costs `2 * (size - 1)` channels.
    pub fn group(size: usize) -> (Vec<ChannelEndpoint>, BusStats) {
        let stats = BusStats::default();
        if size == 0 {
            return (Vec::new(), stats);
        }

        let workers = size - 1;
        let mut root = ChannelEndpoint {
            rank: ROOT,
            size,
            outboxes: Vec::with_capacity(workers),
            inboxes: Vec::with_capacity(workers),
            stats: stats.clone(),
        };
        let mut endpoints = Vec::with_capacity(size);
        for rank in 1..size {
            let (to_worker, from_root) = mpsc::unbounded_channel::<Packet>();
            let (to_root, from_worker) = mpsc::unbounded_channel::<Packet>();
            root.outboxes.push(to_worker);
            root.inboxes.push(from_worker);
            endpoints.push(ChannelEndpoint {
                rank,
                size,
                outboxes: vec![to_root],
                inboxes: vec![from_root],
                stats: stats.clone(),
            });
        }
        endpoints.insert(ROOT, root);

        (endpoints, stats)
    }
}

impl Transport for ChannelEndpoint {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&self, to: usize, packet: Packet) -> impl Future<Output = Result<()>> + Send {
        let result = match self.link_slot(to) {
            None => Err(self.no_link(to)),
            Some(slot) => {
                let kind = packet.describe();
                self.outboxes[slot]
                    .send(packet)
                    .map(|()| {
                        self.stats.packets_sent.fetch_add(1, Ordering::Relaxed);
                    })
                    .map_err(|_| {
                        FilterError::transport(format!(
                            "rank {to} hung up before rank {} could send a {kind}",
                            self.rank
                        ))
                    })
            }
        };
        std::future::ready(result)
    }

    fn recv_from(&mut self, from: usize) -> impl Future<Output = Result<Packet>> + Send {
        let rank = self.rank;
        let link = match self.link_slot(from) {
            Some(slot) => Ok(&mut self.inboxes[slot]),
            None => Err(self.no_link(from)),
        };
        async move {
            link?.recv().await.ok_or_else(|| {
                FilterError::transport(format!(
                    "rank {from} hung up while rank {rank} was waiting on it"
                ))
            })
        }
    }
}
