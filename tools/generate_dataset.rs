//! Synthetic Dataset Generator
//!
//! Writes a labelled card-transaction CSV (`Time, V1..V8, Amount, Class`)
//! for exercising the trainer without real data.
//!
//! Usage: generate-dataset <rows> <out.csv> [fraud_rate] [seed]

use anyhow::{Context, Result};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::info;

/// One CSV row; field names become the header
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct TransactionRow {
    time: f64,
    #[serde(rename = "V1")]
    v1: f64,
    #[serde(rename = "V2")]
    v2: f64,
    #[serde(rename = "V3")]
    v3: f64,
    #[serde(rename = "V4")]
    v4: f64,
    #[serde(rename = "V5")]
    v5: f64,
    #[serde(rename = "V6")]
    v6: f64,
    #[serde(rename = "V7")]
    v7: f64,
    #[serde(rename = "V8")]
    v8: f64,
    amount: f64,
    class: u8,
}

/// Transaction generator with a seeded RNG
struct TransactionGenerator {
    rng: ChaCha8Rng,
    elapsed_secs: f64,
}

impl TransactionGenerator {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            elapsed_secs: 0.0,
        }
    }

    fn next_time(&mut self) -> f64 {
        self.elapsed_secs += self.rng.gen_range(0.0..120.0);
        self.elapsed_secs.round()
    }

    /// Sum of uniforms: roughly normal around `center`
    fn noise(&mut self, center: f64, spread: f64) -> f64 {
        let sum: f64 = (0..4).map(|_| self.rng.gen_range(-1.0..1.0)).sum();
        center + sum * spread / 2.0
    }

    fn generate_genuine(&mut self) -> TransactionRow {
        TransactionRow {
            time: self.next_time(),
            v1: self.noise(0.0, 1.0),
            v2: self.noise(0.0, 1.0),
            v3: self.noise(0.2, 1.0),
            v4: self.noise(0.0, 1.0),
            v5: self.noise(0.0, 1.0),
            v6: self.noise(0.0, 0.8),
            v7: self.noise(0.0, 0.8),
            v8: self.noise(0.0, 0.5),
            amount: self.rng.gen_range(1.0..250.0),
            class: 0,
        }
    }

    /// Fraud rows shift several components, with overlap against genuine rows
    fn generate_fraud(&mut self) -> TransactionRow {
        TransactionRow {
            time: self.next_time(),
            v1: self.noise(-2.5, 1.5),
            v2: self.noise(1.8, 1.2),
            v3: self.noise(-3.0, 1.5),
            v4: self.noise(2.5, 1.2),
            v5: self.noise(-1.0, 1.0),
            v6: self.noise(-0.5, 0.8),
            v7: self.noise(-2.0, 1.5),
            v8: self.noise(0.3, 0.5),
            amount: self.rng.gen_range(0.5..1500.0),
            class: 1,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("generate_dataset=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        anyhow::bail!("usage: generate-dataset <rows> <out.csv> [fraud_rate] [seed]");
    }
    let rows: usize = args[1].parse().context("rows must be a positive integer")?;
    let out = &args[2];
    let fraud_rate: f64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(0.02);
    let seed: u64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(42);
    if !(0.0..=1.0).contains(&fraud_rate) {
        anyhow::bail!("fraud_rate must be in [0, 1]");
    }

    info!(rows, out = %out, fraud_rate, seed, "Generating dataset");

    let mut generator = TransactionGenerator::new(seed);
    let mut writer =
        csv::Writer::from_path(out).with_context(|| format!("Failed to create {}", out))?;

    let mut fraud_count = 0usize;
    for _ in 0..rows {
        let row = if generator.rng.gen_bool(fraud_rate) {
            fraud_count += 1;
            generator.generate_fraud()
        } else {
            generator.generate_genuine()
        };
        writer.serialize(&row)?;
    }
    writer.flush()?;

    info!(
        "Wrote {} transactions ({} genuine, {} fraud) to {}",
        rows,
        rows - fraud_count,
        fraud_count,
        out
    );

    Ok(())
}
