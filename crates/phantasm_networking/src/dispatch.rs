//! # Batch Dispatcher
//!
//! Hands finished deliveries to the host scheduler.
//!
//! ```text
//! direct:  Delivery ──────────────────────────► task: transmit each packet
//! batched: Delivery ──► frame ──► LZ4 ──► Arc ─► task: transmit the batch
//! ```
//!
//! Compression happens here, on the worker. Transmission never does.
//! A batch that fails to build is logged and dropped; the next update of
//! the hologram sends fresh state anyway.

use std::sync::Arc;

use crate::config::UpdaterConfig;
use crate::integration::{PacketSink, Scheduler};
use crate::protocol::{BatchCompressor, Outbound};
use crate::updater::Delivery;

/// Result of handing one delivery to the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Nothing to send or nobody to send it to.
    Skipped,
    /// A transmit task was scheduled.
    Scheduled,
    /// Building the batch failed; nothing was scheduled.
    Dropped,
}

/// Groups packets per delivery and schedules their transmission.
pub struct BatchDispatcher {
    async_batch: bool,
    compressor: BatchCompressor,
    scheduler: Arc<dyn Scheduler>,
    sink: Arc<dyn PacketSink>,
}

impl std::fmt::Debug for BatchDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchDispatcher")
            .field("async_batch", &self.async_batch)
            .finish_non_exhaustive()
    }
}

impl BatchDispatcher {
    /// Creates a dispatcher for the mode selected in `config`.
    #[must_use]
    pub fn new(config: &UpdaterConfig, scheduler: Arc<dyn Scheduler>, sink: Arc<dyn PacketSink>) -> Self {
        Self {
            async_batch: config.async_batch,
            compressor: BatchCompressor::new(config.max_frame_size),
            scheduler,
            sink,
        }
    }

    /// Schedules `delivery` for transmission.
    pub fn send(&mut self, delivery: Delivery) -> DispatchOutcome {
        if delivery.is_empty() {
            return DispatchOutcome::Skipped;
        }

        let Delivery { packets, players } = delivery;
        let sink = Arc::clone(&self.sink);

        if !self.async_batch {
            let outbound: Vec<Outbound> = packets.into_iter().map(Outbound::Entity).collect();
            self.scheduler.run_on_authoritative_thread(Box::new(move || {
                for &player in &players {
                    for packet in &outbound {
                        sink.transmit(player, packet);
                    }
                }
            }));
            return DispatchOutcome::Scheduled;
        }

        match self.compressor.compress(&packets) {
            Ok(batch) => {
                let outbound = Outbound::Batch(Arc::new(batch));
                self.scheduler.run_on_authoritative_thread(Box::new(move || {
                    for &player in &players {
                        sink.transmit(player, &outbound);
                    }
                }));
                DispatchOutcome::Scheduled
            }
            Err(e) => {
                tracing::error!(
                    "Dropping batch of {} packets for {} players: {}",
                    packets.len(),
                    players.len(),
                    e
                );
                DispatchOutcome::Dropped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::TickScheduler;
    use crate::protocol::Packet;
    use parking_lot::Mutex;
    use phantasm_core::{EntityIdentity, PlayerId};

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(PlayerId, Outbound)>>,
    }

    impl PacketSink for Recorder {
        fn transmit(&self, player: PlayerId, packet: &Outbound) {
            self.sent.lock().push((player, packet.clone()));
        }
    }

    fn setup(async_batch: bool, max_frame_size: usize) -> (BatchDispatcher, Arc<TickScheduler>, Arc<Recorder>) {
        let config = UpdaterConfig {
            async_batch,
            max_frame_size,
            ..UpdaterConfig::default()
        };
        let scheduler = Arc::new(TickScheduler::new());
        let sink = Arc::new(Recorder::default());
        let dispatcher = BatchDispatcher::new(&config, scheduler.clone(), sink.clone());
        (dispatcher, scheduler, sink)
    }

    fn delivery(players: &[u64]) -> Delivery {
        Delivery {
            packets: vec![
                Packet::remove(EntityIdentity::new(1)),
                Packet::set_text(EntityIdentity::new(2), "hello"),
            ],
            players: players.iter().copied().map(PlayerId).collect(),
        }
    }

    #[test]
    fn test_nothing_is_sent_before_the_tick() {
        let (mut dispatcher, scheduler, sink) = setup(true, 1024);

        assert_eq!(dispatcher.send(delivery(&[1])), DispatchOutcome::Scheduled);
        assert!(sink.sent.lock().is_empty());

        scheduler.run_pending();
        assert_eq!(sink.sent.lock().len(), 1);
    }

    #[test]
    fn test_batched_mode_shares_one_batch() {
        let (mut dispatcher, scheduler, sink) = setup(true, 1024);

        dispatcher.send(delivery(&[1, 2]));
        scheduler.run_pending();

        let sent = sink.sent.lock();
        assert_eq!(sent.len(), 2);
        match (&sent[0].1, &sent[1].1) {
            (Outbound::Batch(a), Outbound::Batch(b)) => {
                assert!(Arc::ptr_eq(a, b));
                assert_eq!(a.decode().unwrap(), delivery(&[]).packets);
            }
            other => panic!("Expected batches, got {other:?}"),
        }
    }

    #[test]
    fn test_direct_mode_sends_each_packet() {
        let (mut dispatcher, scheduler, sink) = setup(false, 1024);

        dispatcher.send(delivery(&[1, 2]));
        scheduler.run_pending();

        let sent = sink.sent.lock();
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[0].0, PlayerId(1));
        assert_eq!(sent[2].0, PlayerId(2));
        assert!(sent.iter().all(|(_, o)| matches!(o, Outbound::Entity(_))));
    }

    #[test]
    fn test_empty_deliveries_are_skipped() {
        let (mut dispatcher, scheduler, _sink) = setup(true, 1024);

        assert_eq!(dispatcher.send(delivery(&[])), DispatchOutcome::Skipped);
        assert_eq!(dispatcher.send(Delivery::default()), DispatchOutcome::Skipped);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_failed_batch_is_dropped() {
        let (mut dispatcher, scheduler, _sink) = setup(true, 4);

        assert_eq!(dispatcher.send(delivery(&[1])), DispatchOutcome::Dropped);
        assert_eq!(scheduler.pending(), 0);
    }
}
