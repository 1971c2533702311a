//! # Hologram Stress Run
//!
//! Several producer threads hammer one updater with text changes and moves
//! while the main thread plays the host tick loop.
//!
//! Checks:
//! 1. No request fails
//! 2. Every delivery reaches the sink
//! 3. Queues drain after producers stop

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use phantasm_core::{MonotonicSequence, Passthrough, PlaceholderMap, PlayerId, Vec3};
use phantasm_networking::{
    EntityEntry, Hologram, HologramHost, HologramUpdater, Outbound, PacketSink, TickScheduler, UpdaterConfig,
    UpdaterServices,
};

const PRODUCERS: u64 = 8;
const HOLOGRAMS_PER_PRODUCER: u64 = 16;
const ROUNDS: u64 = 200;
const VIEWERS: u64 = 32;
const TICK: Duration = Duration::from_millis(5);

struct Host;

impl HologramHost for Host {
    fn language_of(&self, player: PlayerId) -> Option<usize> {
        Some((player.0 % 2) as usize)
    }

    fn global_placeholders(&self, _hologram: &Hologram) -> PlaceholderMap {
        PlaceholderMap::from([("online".to_owned(), VIEWERS.to_string())])
    }
}

#[derive(Default)]
struct CountingSink {
    packets: AtomicU64,
    batches: AtomicU64,
}

impl PacketSink for CountingSink {
    fn transmit(&self, _player: PlayerId, packet: &Outbound) {
        match packet {
            Outbound::Entity(_) => self.packets.fetch_add(1, Ordering::Relaxed),
            Outbound::Batch(_) => self.batches.fetch_add(1, Ordering::Relaxed),
        };
    }
}

fn hologram(producer: u64, index: u64) -> Hologram {
    let mut hologram = Hologram::new(format!("stress-{producer}-{index}"));
    let entry = Arc::new(EntityEntry::new(Vec3::new(index as f32, 64.0, producer as f32)));
    for viewer in 0..VIEWERS {
        entry.add_viewer(PlayerId(viewer));
    }
    hologram.entities = vec![entry];
    hologram
}

fn produce(updater: &HologramUpdater, producer: u64) -> u64 {
    let mut holograms: Vec<Hologram> = (0..HOLOGRAMS_PER_PRODUCER).map(|i| hologram(producer, i)).collect();
    let mut failures = 0;

    for round in 0..ROUNDS {
        for hologram in &mut holograms {
            // Line count changes every tenth round.
            let lines = 3 + usize::from(round % 10 == 0);
            hologram.translations = vec![
                (0..lines).map(|l| format!("Round {round} line {l}")).collect(),
                (0..lines).map(|l| format!("Runde {round} Zeile {l}")).collect(),
            ];

            if let Err(e) = updater.update(hologram, None, &hologram.entities, round == 0, &[]) {
                eprintln!("update failed: {e}");
                failures += 1;
            }
            if round % 5 == 0 {
                let position = Vec3::new(0.0, 64.0 + round as f32 * 0.01, 0.0);
                if let Err(e) = updater.update_pos(&hologram.entities[0], position) {
                    eprintln!("move failed: {e}");
                    failures += 1;
                }
            }
        }
    }

    failures
}

fn main() {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║              PHANTASM - HOLOGRAM UPDATER STRESS RUN              ║");
    println!("╠══════════════════════════════════════════════════════════════════╣");
    println!(
        "║  Producers: {:<4} Holograms each: {:<4} Rounds: {:<5} Viewers: {:<4}║",
        PRODUCERS, HOLOGRAMS_PER_PRODUCER, ROUNDS, VIEWERS
    );
    println!("╚══════════════════════════════════════════════════════════════════╝");

    let scheduler = Arc::new(TickScheduler::new());
    let sink = Arc::new(CountingSink::default());
    let services = UpdaterServices {
        identities: Arc::new(MonotonicSequence::default()),
        host: Arc::new(Host),
        formatter: Arc::new(Passthrough),
        scheduler: scheduler.clone(),
        sink: sink.clone(),
    };

    let mut updater = match HologramUpdater::start(UpdaterConfig::default(), services) {
        Ok(updater) => updater,
        Err(e) => {
            eprintln!("Failed to start updater: {e}");
            std::process::exit(1);
        }
    };

    let start = Instant::now();
    let mut ticks = 0_u64;
    let failures: u64 = thread::scope(|scope| {
        let handles: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let updater = &updater;
                scope.spawn(move || produce(updater, p))
            })
            .collect();

        while handles.iter().any(|h| !h.is_finished()) {
            scheduler.run_pending();
            ticks += 1;
            thread::sleep(TICK);
        }

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or(1))
            .sum()
    });
    let produced = start.elapsed();

    // Let the worker catch up.
    let deadline = Instant::now() + Duration::from_secs(30);
    while updater.pending() != (0, 0) && Instant::now() < deadline {
        scheduler.run_pending();
        ticks += 1;
        thread::sleep(TICK);
    }
    let drained = updater.pending() == (0, 0);
    updater.shutdown();
    scheduler.run_pending();

    let stats = updater.stats();

    println!();
    println!("  Producer time:    {produced:?}");
    println!("  Host ticks:       {ticks}");
    println!("  Worker cycles:    {}", stats.cycles);
    println!("  Updates:          {} sent, {} unchanged", stats.updates, stats.skipped);
    println!("  Moves:            {}", stats.moves);
    println!("  Failures:         {} (producer) / {} (worker)", failures, stats.failures);
    println!("  Deliveries:       {} sent, {} dropped", stats.batches_sent, stats.batches_dropped);
    println!(
        "  Sink:             {} batches, {} packets",
        sink.batches.load(Ordering::Relaxed),
        sink.packets.load(Ordering::Relaxed)
    );

    if failures == 0 && stats.failures == 0 && stats.batches_dropped == 0 && drained {
        println!("\n  ✅ PASSED");
        std::process::exit(0);
    } else {
        println!("\n  ❌ FAILED");
        std::process::exit(1);
    }
}
