use crate::error::Result;
use crate::storage::{NodeSample, StatsWriter};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const NODE_MEMORY: f64 = 16.0 * GIB;
const NODE_DISK_M: f64 = 2_000_000.0;
/// Samples written per transaction while backfilling
const BACKFILL_BATCH: usize = 5000;

/// Write synthetic stats for `nodes` nodes until Ctrl-C or `duration` elapses
pub fn run(
    file: &Path,
    nodes: usize,
    interval: Duration,
    duration: Option<Duration>,
    backfill: Option<Duration>,
) -> Result<()> {
    let mut writer = StatsWriter::open(file)?;
    let names: Vec<String> = (1..=nodes).map(|i| format!("node-{}", i)).collect();
    let step = interval.as_secs().max(1) as i64;
    let now = chrono::Utc::now().timestamp();

    if let Some(history) = backfill {
        let from = now - history.as_secs() as i64;
        let mut written = 0usize;
        let mut t = from;
        while t < now {
            for (index, name) in names.iter().enumerate() {
                writer.record(sample(name, index, t, step));
            }
            if writer.pending() >= BACKFILL_BATCH {
                written += writer.flush()?;
            }
            t += step;
        }
        written += writer.flush()?;
        tracing::info!(samples = written, nodes, from, to = now, "backfill complete");
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    tracing::info!(file = %file.display(), nodes, interval = ?interval, "writing live stats (Ctrl-C to stop)");

    let start = Instant::now();
    let mut next = Instant::now();
    let mut ticks = 0u64;

    while running.load(Ordering::SeqCst) {
        if let Some(max_duration) = duration {
            if start.elapsed() >= max_duration {
                break;
            }
        }

        if Instant::now() >= next {
            let t = chrono::Utc::now().timestamp();
            for (index, name) in names.iter().enumerate() {
                writer.record(sample(name, index, t, step));
            }
            let written = writer.flush()?;
            ticks += 1;
            tracing::debug!(samples = written, timestamp = t, "wrote tick");
            next += interval;
        }

        // Sleep briefly to stay responsive to Ctrl-C
        std::thread::sleep(Duration::from_millis(50));
    }

    writer.flush()?;
    tracing::info!(ticks, elapsed = ?start.elapsed(), "simulation stopped");
    Ok(())
}

/// Deterministic stats for one node at one instant
pub fn sample(node: &str, index: usize, timestamp: i64, step_secs: i64) -> NodeSample {
    let phase = index as f64 * 0.7;
    let t = timestamp as f64;
    let wave = |period: f64| (t / period + phase).sin();
    let secs = step_secs as f64;

    let load = 0.5 + 0.4 * wave(900.0);
    let packets_per_sec = 20_000.0 + 60_000.0 * load;
    let memory = NODE_MEMORY * (0.35 + 0.1 * wave(3600.0));
    let free_space_m = NODE_DISK_M * (0.6 + 0.05 * wave(86_400.0));
    let drops = if load > 0.85 { packets_per_sec * 0.001 } else { 0.0 };

    NodeSample {
        node: node.to_string(),
        timestamp,
        delta_ms: step_secs * 1000,
        monitoring: (3000.0 * load).round(),
        free_space_m: free_space_m.round(),
        free_space_p: free_space_m / NODE_DISK_M * 100.0,
        cpu: 10.0 + 70.0 * load,
        memory: memory.round(),
        memory_p: memory / NODE_MEMORY * 100.0,
        packet_queue: (200.0 * (load - 0.5).max(0.0)).round(),
        delta_packets: (packets_per_sec * secs).round(),
        delta_bytes: (packets_per_sec * 750.0 * secs).round(),
        delta_sessions: (packets_per_sec / 40.0 * secs).round(),
        delta_dropped: (drops * secs).round(),
        delta_overload_dropped: (drops * 0.5 * secs).round(),
        delta_es_dropped: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_is_deterministic() {
        let a = sample("node-1", 0, 1_700_000_000, 5);
        let b = sample("node-1", 0, 1_700_000_000, 5);
        assert_eq!(a, b);
        assert_eq!(a.delta_ms, 5000);
    }

    #[test]
    fn test_sample_ranges() {
        for index in 0..4 {
            for t in (0..86_400).step_by(600) {
                let s = sample("n", index, t, 1);
                assert!(s.cpu >= 0.0 && s.cpu <= 100.0);
                assert!(s.memory_p > 0.0 && s.memory_p < 100.0);
                assert!(s.free_space_p > 0.0 && s.free_space_p < 100.0);
                assert!(s.delta_packets > 0.0);
                assert!(s.delta_dropped <= s.delta_packets);
            }
        }
    }

    #[test]
    fn test_nodes_differ() {
        let a = sample("node-1", 0, 1_700_000_000, 1);
        let b = sample("node-2", 1, 1_700_000_000, 1);
        assert_ne!(a.cpu, b.cpu);
    }
}
