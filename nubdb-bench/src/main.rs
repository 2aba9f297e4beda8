//! # Client Benchmark Harness
//!
//! Purpose: Drive a running NubDB server through the sync client so round-trip
//! throughput and latency can be compared over time.
//!
//! ## Design Principles
//! 1. **Deterministic Workload**: Use a fixed PRNG seed for stable comparisons.
//! 2. **Allocation Control**: Pre-build keys/values to keep setup costs off the hot path.
//! 3. **Real Round Trips**: Every operation is a full request/response exchange.
//!
//! Usage: `nubdb-bench [ops] [keys] [value_size]`, with the server address
//! taken from `NUBDB_HOST` / `NUBDB_PORT`.

use std::env;
use std::hint::black_box;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use nubdb_client::{ClientConfig, NubClient};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_OP_COUNT: usize = 10_000;
const DEFAULT_KEY_COUNT: usize = 1 << 10;
const DEFAULT_VALUE_SIZE: usize = 32;

struct BenchConfig {
    requested_keys: usize,
    key_count: usize,
    key_mask: usize,
    op_count: usize,
    value_size: usize,
}

impl BenchConfig {
    fn from_args() -> Result<Self> {
        let mut args = env::args().skip(1);
        let op_count = parse_usize(args.next(), DEFAULT_OP_COUNT)?;
        let requested_keys = parse_usize(args.next(), DEFAULT_KEY_COUNT)?;
        let value_size = parse_usize(args.next(), DEFAULT_VALUE_SIZE)?;

        let key_count = normalize_power_of_two(requested_keys);
        Ok(BenchConfig {
            requested_keys,
            key_count,
            key_mask: key_count - 1,
            op_count,
            value_size,
        })
    }
}

fn parse_usize(value: Option<String>, fallback: usize) -> Result<usize> {
    match value {
        Some(raw) => raw
            .parse::<usize>()
            .with_context(|| format!("expected a count, got {raw:?}")),
        None => Ok(fallback),
    }
}

fn normalize_power_of_two(value: usize) -> usize {
    let value = value.max(1);
    if value.is_power_of_two() {
        value
    } else {
        value.next_power_of_two()
    }
}

/// Tiny deterministic PRNG; XorShift keeps the workload reproducible.
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    #[inline]
    fn next_index(&mut self, mask: usize) -> usize {
        (self.next_u64() as usize) & mask
    }
}

fn build_keys(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("bench:{i:08x}")).collect()
}

fn build_values(count: usize, size: usize, seed: u64) -> Vec<String> {
    let mut rng = XorShift64::new(seed);
    (0..count)
        .map(|_| {
            (0..size)
                .map(|_| char::from(b'a' + (rng.next_u64() % 26) as u8))
                .collect()
        })
        .collect()
}

fn report(label: &str, ops: usize, elapsed: Duration) {
    let secs = elapsed.as_secs_f64();
    let ops_per_sec = (ops as f64) / secs;
    let micros_per_op = (secs * 1e6) / (ops as f64);
    println!("{label}: {ops} ops in {secs:.3}s ({ops_per_sec:.0} ops/s, {micros_per_op:.1} us/op)");
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run() {
        eprintln!("nubdb-bench failed: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let bench = BenchConfig::from_args()?;
    let config = ClientConfig::from_env()?;
    let client = NubClient::with_config(config.clone())
        .with_context(|| format!("connecting to {}", config.addr()))?;

    info!(
        addr = %config.addr(),
        requested_keys = bench.requested_keys,
        keys = bench.key_count,
        ops = bench.op_count,
        value_size = bench.value_size,
        "starting benchmark"
    );

    let keys = build_keys(bench.key_count);
    let values = build_values(bench.key_count, bench.value_size, 0xA5A5_A5A5_A5A5_A5A5);

    let mut rng = XorShift64::new(0x0FED_CBA9_8765_4321);
    let start = Instant::now();
    for _ in 0..bench.op_count {
        let idx = rng.next_index(bench.key_mask);
        if !client.set(&keys[idx], &values[idx])? {
            bail!("server refused SET {}", keys[idx]);
        }
    }
    report("SET", bench.op_count, start.elapsed());

    let mut rng = XorShift64::new(0x1234_5678_9ABC_DEF0);
    let start = Instant::now();
    for _ in 0..bench.op_count {
        let idx = rng.next_index(bench.key_mask);
        black_box(client.get(&keys[idx])?);
    }
    report("GET", bench.op_count, start.elapsed());

    let counter = "bench:counter";
    client.set(counter, 0)?;
    let start = Instant::now();
    for _ in 0..bench.op_count {
        black_box(client.incr(counter)?);
    }
    report("INCR", bench.op_count, start.elapsed());

    info!(keys = client.size()?, "benchmark finished");
    client.close();
    Ok(())
}
