//! Monte-Carlo estimate of the realized house edge.
//!
//! Runs many sessions through the engine with a fixed cash-out depth and
//! compares the measured edge against the configured per-round edge. With a
//! 5% per-round edge, cashing out after `k` survived rounds should realize
//! an edge near `1 - 0.95^k` (slightly above, since treasure growth floors
//! at every step).

use abyss_engine::{MemoryStore, SessionEngine};
use abyss_types::GameConfig;
use commonware_cryptography::{ed25519, Signer};

const TRIALS: u64 = 100_000;
const BET: u64 = 10_000; // large bet keeps per-step flooring loss small

#[derive(Default)]
struct Stats {
    trials: u64,
    total_net: f64,
    total_net_sq: f64,
}

impl Stats {
    fn add(&mut self, net: i64) {
        let n = net as f64;
        self.trials += 1;
        self.total_net += n;
        self.total_net_sq += n * n;
    }

    fn mean_net(&self) -> f64 {
        if self.trials == 0 {
            0.0
        } else {
            self.total_net / self.trials as f64
        }
    }

    fn house_edge(&self) -> f64 {
        -self.mean_net() / BET as f64
    }

    fn stderr(&self) -> f64 {
        if self.trials <= 1 {
            return 0.0;
        }
        let mean = self.mean_net();
        let var = (self.total_net_sq / self.trials as f64) - mean * mean;
        let var = if var < 0.0 { 0.0 } else { var };
        (var / self.trials as f64).sqrt() / BET as f64
    }
}

fn run_depth(config: &GameConfig, depth: u16) -> Stats {
    let engine = SessionEngine::new(config.clone(), MemoryStore::new()).expect("valid config");
    // Fund far past any aggregate reservation so liquidity never interferes
    // with the measurement.
    engine
        .fund_house(u64::MAX / 4)
        .expect("fund house");
    let player = ed25519::PrivateKey::from_seed(1).public_key();

    let mut stats = Stats::default();
    for trial in 1..=TRIALS {
        engine.deposit(&player, BET).expect("deposit");
        let before = engine.wallet_info(&player).balance;
        engine
            .start_session(&player, trial, BET, trial)
            .expect("start session");

        let mut round = 1u16;
        let mut value = BET;
        loop {
            let outcome = engine
                .play_round(&player, trial, round, value, trial)
                .expect("play round");
            if !outcome.survived {
                break;
            }
            value = outcome.new_value;
            round += 1;
            if round > depth {
                engine
                    .cash_out(&player, trial, value, trial)
                    .expect("cash out");
                break;
            }
        }

        let after = engine.wallet_info(&player).balance;
        stats.add(after as i64 - before as i64);
    }
    stats
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    let config = GameConfig {
        max_bet: BET,
        ..GameConfig::default()
    };
    let per_round_edge = config.house_edge_ppm as f64 / 1_000_000.0;

    println!(
        "{:<8} {:>10} {:>12} {:>12} {:>10}",
        "depth", "trials", "edge", "expected", "stderr"
    );
    for depth in [1u16, 2, 3, 5] {
        let stats = run_depth(&config, depth);
        let expected = 1.0 - (1.0 - per_round_edge).powi(depth as i32);
        println!(
            "{:<8} {:>10} {:>11.4}% {:>11.4}% {:>9.4}%",
            depth,
            stats.trials,
            stats.house_edge() * 100.0,
            expected * 100.0,
            stats.stderr() * 100.0,
        );
    }
}
