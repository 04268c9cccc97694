use std::sync::Arc;

use abyss_types::{GameConfig, SessionStatus};
use commonware_cryptography::ed25519::PublicKey;
use proptest::prelude::*;

use crate::mocks;
use crate::{math, EngineError, MemoryStore, SessionEngine};

const NOW: u64 = 1_000;
const HOUSE_FUNDS: u64 = 1_000_000;

fn engine_with(config: GameConfig) -> SessionEngine<MemoryStore> {
    SessionEngine::new(config, MemoryStore::new()).expect("valid config")
}

/// Engine with a funded house and one funded player wallet.
fn funded_engine(config: GameConfig, wallet: u64) -> (SessionEngine<MemoryStore>, PublicKey) {
    let engine = engine_with(config);
    engine.fund_house(HOUSE_FUNDS).expect("fund house");
    let player = mocks::owner(1);
    engine.deposit(&player, wallet).expect("deposit");
    (engine, player)
}

fn total_money(engine: &SessionEngine<MemoryStore>, players: &[&PublicKey]) -> u64 {
    let house = engine.house_status().balance;
    players
        .iter()
        .fold(house, |acc, p| acc + engine.wallet_info(p).balance)
}

#[test]
fn test_full_session_three_survivals_then_cash_out() {
    let config = GameConfig::default();
    let seed = mocks::surviving_seed(&config, 3);
    let (engine, player) = funded_engine(config, 1_000);
    let before = total_money(&engine, &[&player]);

    let started = engine
        .start_session_seeded(&player, 7, 100, NOW, seed)
        .expect("start");
    assert_eq!(started.round, 1);
    assert_eq!(started.max_payout, 10_000);
    assert_eq!(engine.wallet_info(&player).balance, 900);
    assert_eq!(engine.house_status().reserved, 10_000);

    // With the default curve the treasure grows 100 -> 135 -> 197 -> 311,
    // flooring at each step.
    let r1 = engine.play_round(&player, 7, 1, 100, NOW + 1).expect("round 1");
    assert!(r1.survived);
    assert_eq!(r1.new_value, 135);

    let r2 = engine.play_round(&player, 7, 2, 135, NOW + 2).expect("round 2");
    assert!(r2.survived);
    assert_eq!(r2.new_value, 197);

    let r3 = engine.play_round(&player, 7, 3, 197, NOW + 3).expect("round 3");
    assert!(r3.survived);
    assert_eq!(r3.new_value, 311);

    let receipt = engine.cash_out(&player, 7, 311, NOW + 4).expect("cash out");
    assert_eq!(receipt.final_amount, 311);
    assert_eq!(receipt.profit, 211);

    assert_eq!(engine.wallet_info(&player).balance, 900 + 311);
    assert_eq!(engine.house_status().reserved, 0);
    let session = engine.get_session(7).expect("archived");
    assert_eq!(session.status, SessionStatus::CashedOut);
    assert_eq!(session.ended_at, Some(NOW + 4));

    // The stake and the payout both moved between wallet and house; no
    // money was created or destroyed.
    assert_eq!(total_money(&engine, &[&player]), before);
}

#[test]
fn test_bet_below_minimum_rejected_without_mutation() {
    let (engine, player) = funded_engine(GameConfig::default(), 1_000);
    let err = engine.start_session(&player, 1, 5, NOW).unwrap_err();
    assert_eq!(
        err,
        EngineError::BetOutOfBounds {
            bet: 5,
            min: 10,
            max: 10_000
        }
    );
    assert_eq!(engine.wallet_info(&player).balance, 1_000);
    assert_eq!(engine.house_status().reserved, 0);
    assert!(engine.get_session(1).is_none());
}

#[test]
fn test_bet_above_maximum_rejected() {
    let (engine, player) = funded_engine(GameConfig::default(), 100_000);
    assert!(matches!(
        engine.start_session(&player, 1, 10_001, NOW),
        Err(EngineError::BetOutOfBounds { .. })
    ));
}

#[test]
fn test_unbounded_max_bet() {
    let config = GameConfig {
        max_bet: 0,
        ..GameConfig::default()
    };
    let (engine, player) = funded_engine(config, 100_000);
    // Fails on liquidity, not on bet bounds.
    let err = engine.start_session(&player, 1, 50_000, NOW).unwrap_err();
    assert!(matches!(err, EngineError::InsufficientLiquidity { .. }));
}

#[test]
fn test_insufficient_wallet_funds() {
    let (engine, player) = funded_engine(GameConfig::default(), 50);
    assert_eq!(
        engine.start_session(&player, 1, 100, NOW).unwrap_err(),
        EngineError::InsufficientFunds {
            bet: 100,
            available: 50
        }
    );
    assert_eq!(engine.wallet_info(&player).balance, 50);
    assert_eq!(engine.house_status().balance, HOUSE_FUNDS);
}

#[test]
fn test_duplicate_session_id_rejected() {
    let (engine, player) = funded_engine(GameConfig::default(), 1_000);
    engine.start_session(&player, 1, 100, NOW).expect("first");
    assert_eq!(
        engine.start_session(&player, 1, 100, NOW).unwrap_err(),
        EngineError::SessionExists { session_id: 1 }
    );
}

#[test]
fn test_replayed_round_rejected_without_mutation() {
    let config = GameConfig::default();
    let seed = mocks::surviving_seed(&config, 1);
    let (engine, player) = funded_engine(config, 1_000);
    engine
        .start_session_seeded(&player, 1, 100, NOW, seed)
        .expect("start");
    let r1 = engine.play_round(&player, 1, 1, 100, NOW + 1).expect("round 1");
    assert!(r1.survived);

    // Re-submitting the already-resolved round is a replay.
    assert_eq!(
        engine.play_round(&player, 1, 1, 100, NOW + 2).unwrap_err(),
        EngineError::RoundMismatch {
            submitted: 1,
            expected: 2
        }
    );
    let session = engine.get_session(1).expect("session");
    assert_eq!(session.round, 2);
    assert_eq!(session.treasure, r1.new_value);
}

#[test]
fn test_skipped_round_rejected() {
    let (engine, player) = funded_engine(GameConfig::default(), 1_000);
    engine.start_session(&player, 1, 100, NOW).expect("start");
    assert!(matches!(
        engine.play_round(&player, 1, 3, 100, NOW + 1),
        Err(EngineError::RoundMismatch {
            submitted: 3,
            expected: 1
        })
    ));
}

#[test]
fn test_tampered_value_rejected() {
    let (engine, player) = funded_engine(GameConfig::default(), 1_000);
    engine.start_session(&player, 1, 100, NOW).expect("start");
    // Round 1's value at risk is the stake, not an inflated claim.
    assert_eq!(
        engine
            .play_round(&player, 1, 1, 9_999, NOW + 1)
            .unwrap_err(),
        EngineError::ValueMismatch {
            submitted: 9_999,
            expected: 100
        }
    );
}

#[test]
fn test_tampered_cash_out_value_rejected() {
    let config = GameConfig::default();
    let seed = mocks::surviving_seed(&config, 1);
    let (engine, player) = funded_engine(config, 1_000);
    engine
        .start_session_seeded(&player, 1, 100, NOW, seed)
        .expect("start");
    let r1 = engine.play_round(&player, 1, 1, 100, NOW + 1).expect("round 1");
    assert!(matches!(
        engine.cash_out(&player, 1, r1.new_value + 1, NOW + 2),
        Err(EngineError::ValueMismatch { .. })
    ));
    assert_eq!(
        engine.get_session(1).expect("session").status,
        SessionStatus::Active
    );
}

#[test]
fn test_non_owner_cannot_play_or_cash_out() {
    let (engine, player) = funded_engine(GameConfig::default(), 1_000);
    engine.start_session(&player, 1, 100, NOW).expect("start");
    let stranger = mocks::owner(99);
    assert_eq!(
        engine
            .play_round(&stranger, 1, 1, 100, NOW + 1)
            .unwrap_err(),
        EngineError::NotSessionOwner { session_id: 1 }
    );
    assert_eq!(
        engine.cash_out(&stranger, 1, 0, NOW + 1).unwrap_err(),
        EngineError::NotSessionOwner { session_id: 1 }
    );
}

#[test]
fn test_loss_forfeits_stake_and_releases_reservation() {
    let config = GameConfig::default();
    let seed = mocks::losing_seed(&config);
    let (engine, player) = funded_engine(config, 1_000);
    let before = total_money(&engine, &[&player]);
    engine
        .start_session_seeded(&player, 1, 100, NOW, seed)
        .expect("start");

    let outcome = engine.play_round(&player, 1, 1, 100, NOW + 1).expect("round 1");
    assert!(!outcome.survived);
    assert_eq!(outcome.new_value, 0);
    assert_eq!(outcome.total_value, 0);

    let session = engine.get_session(1).expect("session");
    assert_eq!(session.status, SessionStatus::Lost);
    assert_eq!(session.treasure, 0);
    assert_eq!(session.ended_at, Some(NOW + 1));

    // The stake stays with the house; nothing is refunded.
    assert_eq!(engine.wallet_info(&player).balance, 900);
    assert_eq!(engine.house_status().reserved, 0);
    assert_eq!(engine.house_status().balance, HOUSE_FUNDS + 100);
    assert_eq!(total_money(&engine, &[&player]), before);
}

#[test]
fn test_terminal_session_rejects_further_transitions() {
    let config = GameConfig::default();
    let seed = mocks::losing_seed(&config);
    let (engine, player) = funded_engine(config, 1_000);
    engine
        .start_session_seeded(&player, 1, 100, NOW, seed)
        .expect("start");
    engine.play_round(&player, 1, 1, 100, NOW + 1).expect("round 1");

    for _ in 0..2 {
        assert_eq!(
            engine.play_round(&player, 1, 2, 0, NOW + 2).unwrap_err(),
            EngineError::SessionNotActive {
                session_id: 1,
                status: SessionStatus::Lost
            }
        );
        assert_eq!(
            engine.cash_out(&player, 1, 0, NOW + 2).unwrap_err(),
            EngineError::SessionNotActive {
                session_id: 1,
                status: SessionStatus::Lost
            }
        );
    }
}

#[test]
fn test_zero_treasure_cash_out_rejected() {
    let (engine, player) = funded_engine(GameConfig::default(), 1_000);
    engine.start_session(&player, 1, 100, NOW).expect("start");
    assert_eq!(
        engine.cash_out(&player, 1, 0, NOW + 1).unwrap_err(),
        EngineError::ZeroCashOut
    );
    assert_eq!(
        engine.get_session(1).expect("session").status,
        SessionStatus::Active
    );
}

#[test]
fn test_treasure_capped_at_max_payout() {
    let config = GameConfig {
        max_payout_multiplier: 2,
        ..GameConfig::default()
    };
    let seed = mocks::surviving_seed(&config, 3);
    let (engine, player) = funded_engine(config, 1_000);
    engine
        .start_session_seeded(&player, 1, 100, NOW, seed)
        .expect("start");

    // 100 -> 135 -> 197 -> capped at 200 instead of 311.
    engine.play_round(&player, 1, 1, 100, NOW + 1).expect("round 1");
    engine.play_round(&player, 1, 2, 135, NOW + 2).expect("round 2");
    let r3 = engine.play_round(&player, 1, 3, 197, NOW + 3).expect("round 3");
    assert_eq!(r3.new_value, 200);

    let session = engine.get_session(1).expect("session");
    assert_eq!(session.treasure, session.max_payout);
    session.validate_invariants().expect("invariants");
}

#[test]
fn test_max_rounds_forces_cash_out() {
    let config = GameConfig {
        max_rounds: 2,
        ..GameConfig::default()
    };
    let seed = mocks::surviving_seed(&config, 2);
    let (engine, player) = funded_engine(config, 1_000);
    engine
        .start_session_seeded(&player, 1, 100, NOW, seed)
        .expect("start");
    engine.play_round(&player, 1, 1, 100, NOW + 1).expect("round 1");
    let r2 = engine.play_round(&player, 1, 2, 135, NOW + 2).expect("round 2");
    assert!(r2.survived);

    assert_eq!(
        engine
            .play_round(&player, 1, 3, r2.new_value, NOW + 3)
            .unwrap_err(),
        EngineError::MaxRoundsReached { round: 3, max: 2 }
    );
    // Cashing out remains the only way forward.
    let receipt = engine
        .cash_out(&player, 1, r2.new_value, NOW + 4)
        .expect("cash out");
    assert_eq!(receipt.final_amount, r2.new_value);
}

#[test]
fn test_round_counter_overflow_rejected_at_u16_max() {
    // Certain survival with no decay and an unbounded round cap: every round
    // resolves as a win until the round counter itself runs out.
    let config = GameConfig {
        base_survival_ppm: 1_000_000,
        decay_per_round_ppm: 0,
        survival_floor_ppm: 1_000_000,
        max_rounds: u16::MAX,
        ..GameConfig::default()
    };
    let (engine, player) = funded_engine(config, 1_000);
    engine.start_session(&player, 1, 100, NOW).expect("start");

    let mut value = 100u64;
    for round in 1..u16::MAX {
        let outcome = engine
            .play_round(&player, 1, round, value, NOW + round as u64)
            .expect("round");
        assert!(outcome.survived);
        value = outcome.new_value;
    }

    // Surviving the last representable round cannot advance the counter; the
    // call fails cleanly and commits nothing.
    assert_eq!(
        engine
            .play_round(&player, 1, u16::MAX, value, NOW + u64::from(u16::MAX))
            .unwrap_err(),
        EngineError::Overflow
    );
    let session = engine.get_session(1).expect("session");
    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.round, u16::MAX);
    assert_eq!(session.treasure, value);
    assert_eq!(engine.house_status().reserved, 10_000);
}

#[test]
fn test_locked_house_blocks_entry_and_settlement_only() {
    let config = GameConfig::default();
    let seed = mocks::surviving_seed(&config, 2);
    let (engine, player) = funded_engine(config, 1_000);
    engine
        .start_session_seeded(&player, 1, 100, NOW, seed)
        .expect("start");
    engine.play_round(&player, 1, 1, 100, NOW + 1).expect("round 1");

    engine.set_locked(true);
    assert_eq!(
        engine.start_session(&player, 2, 100, NOW + 2).unwrap_err(),
        EngineError::HouseLocked
    );
    assert_eq!(
        engine.cash_out(&player, 1, 135, NOW + 2).unwrap_err(),
        EngineError::HouseLocked
    );
    // Live sessions keep resolving rounds while locked.
    let r2 = engine.play_round(&player, 1, 2, 135, NOW + 3).expect("round 2");
    assert!(r2.survived);

    engine.set_locked(false);
    engine
        .cash_out(&player, 1, r2.new_value, NOW + 4)
        .expect("cash out after unlock");
}

#[test]
fn test_reservation_bounds_concurrent_entry() {
    // Zero margin, house funded for exactly one worst-case payout: of two
    // racing sessions, exactly one may enter.
    let config = GameConfig {
        reserve_safety_margin_ppm: 0,
        ..GameConfig::default()
    };
    let engine = Arc::new(engine_with(config));
    engine.fund_house(10_000).expect("fund house");
    let players = [mocks::owner(1), mocks::owner(2)];
    for player in &players {
        engine.deposit(player, 100).expect("deposit");
    }

    let handles: Vec<_> = players
        .iter()
        .enumerate()
        .map(|(i, player)| {
            let engine = Arc::clone(&engine);
            let player = player.clone();
            std::thread::spawn(move || engine.start_session(&player, i as u64 + 1, 100, NOW))
        })
        .collect();
    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("thread"))
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, EngineError::InsufficientLiquidity { .. })));
    assert_eq!(engine.house_status().reserved, 10_000);
}

#[test]
fn test_insufficient_liquidity_reports_headroom() {
    let config = GameConfig {
        reserve_safety_margin_ppm: 100_000,
        ..GameConfig::default()
    };
    let (engine, player) = funded_engine(config, 100_000);
    // Draining the house leaves nothing to reserve against.
    engine
        .withdraw_house(HOUSE_FUNDS - 1_000)
        .expect("withdraw");
    let err = engine.start_session(&player, 1, 100, NOW).unwrap_err();
    match err {
        EngineError::InsufficientLiquidity {
            requested,
            headroom,
        } => {
            assert_eq!(requested, 10_000);
            // Headroom reflects the balance after the stake arrived, less
            // the 10% margin.
            assert_eq!(headroom, 1_100 - 110);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    // The staged stake was rolled back with the failed reservation.
    assert_eq!(engine.wallet_info(&player).balance, 100_000);
    assert_eq!(engine.house_status().balance, 1_000);
}

#[test]
fn test_withdrawal_cannot_touch_reserved_funds() {
    let config = GameConfig {
        reserve_safety_margin_ppm: 0,
        ..GameConfig::default()
    };
    let (engine, player) = funded_engine(config, 1_000);
    engine.start_session(&player, 1, 100, NOW).expect("start");

    let status = engine.house_status();
    assert_eq!(status.reserved, 10_000);
    let free = status.balance - status.reserved;
    assert!(matches!(
        engine.withdraw_house(free + 1),
        Err(EngineError::InsufficientLiquidity { .. })
    ));
    engine.withdraw_house(free).expect("free balance");
}

#[test]
fn test_sweep_respects_exact_timeout_boundary() {
    let (engine, player) = funded_engine(GameConfig::default(), 1_000);
    engine.start_session(&player, 1, 100, NOW).expect("start");
    let timeout = engine.config().session_timeout_secs;

    assert!(engine.sweep_expired(NOW + timeout).is_empty());
    assert!(engine.expired_sessions(NOW + timeout).is_empty());

    let swept = engine.sweep_expired(NOW + timeout + 1);
    assert_eq!(
        swept,
        vec![crate::SweptSession {
            session_id: 1,
            forfeited: 0,
            released: 10_000,
        }]
    );
}

#[test]
fn test_sweep_forfeits_without_refund_and_is_idempotent() {
    let config = GameConfig::default();
    let seed = mocks::surviving_seed(&config, 1);
    let (engine, player) = funded_engine(config, 1_000);
    engine
        .start_session_seeded(&player, 1, 100, NOW, seed)
        .expect("start");
    let r1 = engine.play_round(&player, 1, 1, 100, NOW + 5).expect("round 1");
    let timeout = engine.config().session_timeout_secs;

    // Idle time counts from the last round, not session creation.
    assert!(engine.sweep_expired(NOW + timeout + 1).is_empty());

    let swept = engine.sweep_expired(NOW + 5 + timeout + 1);
    assert_eq!(swept.len(), 1);
    assert_eq!(swept[0].forfeited, r1.new_value);
    assert_eq!(swept[0].released, 10_000);

    let session = engine.get_session(1).expect("session");
    assert_eq!(session.status, SessionStatus::Lost);
    assert_eq!(session.treasure, 0);
    assert_eq!(engine.wallet_info(&player).balance, 900);
    assert_eq!(engine.house_status().reserved, 0);

    // A second sweep finds nothing, and the terminal session is never
    // listed as expired again.
    assert!(engine.sweep_expired(NOW + 5 + timeout + 2).is_empty());
    assert!(engine.expired_sessions(u64::MAX).is_empty());
}

#[test]
fn test_swept_session_rejects_cash_out() {
    let (engine, player) = funded_engine(GameConfig::default(), 1_000);
    engine.start_session(&player, 1, 100, NOW).expect("start");
    let timeout = engine.config().session_timeout_secs;
    engine.sweep_expired(NOW + timeout + 1);
    assert!(matches!(
        engine.cash_out(&player, 1, 0, NOW + timeout + 2),
        Err(EngineError::SessionNotActive { .. })
    ));
}

#[test]
fn test_wallet_info_counts_active_sessions() {
    let config = GameConfig::default();
    let losing = mocks::losing_seed(&config);
    let (engine, player) = funded_engine(config, 1_000);
    engine.start_session(&player, 1, 100, NOW).expect("first");
    engine
        .start_session_seeded(&player, 2, 100, NOW, losing)
        .expect("second");
    assert_eq!(engine.wallet_info(&player).active_sessions, 2);

    engine.play_round(&player, 2, 1, 100, NOW + 1).expect("losing round");
    let info = engine.wallet_info(&player);
    assert_eq!(info.active_sessions, 1);
    assert_eq!(info.balance, 800);
}

#[test]
fn test_round_outcome_matches_advertised_stats() {
    let config = GameConfig::default();
    let seed = mocks::surviving_seed(&config, 1);
    let (engine, player) = funded_engine(config.clone(), 1_000);
    engine
        .start_session_seeded(&player, 1, 100, NOW, seed)
        .expect("start");
    let r1 = engine.play_round(&player, 1, 1, 100, NOW + 1).expect("round 1");
    let stats = math::round_stats(&config, 1);
    assert_eq!(r1.survival_ppm, stats.survival_ppm);
    assert_eq!(r1.multiplier_ppm, stats.multiplier_ppm);
    assert_eq!(r1.threshold, crate::rng::survival_threshold(stats.survival_ppm));
    assert!(r1.roll >= r1.threshold);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever happens to a session, no money is created or destroyed and
    /// the reservation is fully returned at termination.
    #[test]
    fn prop_session_lifecycle_conserves_money(
        bet in 10u64..=10_000,
        seed_n in 0u64..=1_000,
    ) {
        let engine = engine_with(GameConfig::default());
        engine.fund_house(100_000_000).expect("fund house");
        let player = mocks::owner(1);
        engine.deposit(&player, bet).expect("deposit");
        let before = engine.house_status().balance + bet;

        engine
            .start_session_seeded(&player, 1, bet, NOW, mocks::seed_bytes(seed_n))
            .expect("start");

        let mut round = 1u16;
        let mut value = bet;
        loop {
            let outcome = engine
                .play_round(&player, 1, round, value, NOW + round as u64)
                .expect("round");
            if !outcome.survived {
                break;
            }
            value = outcome.new_value;
            round += 1;
            // Cash out after a few survivals; deep runs are rare anyway.
            if round > 5 {
                engine
                    .cash_out(&player, 1, value, NOW + round as u64)
                    .expect("cash out");
                break;
            }
        }

        let session = engine.get_session(1).expect("session");
        prop_assert!(session.status.is_terminal());
        prop_assert!(session.treasure <= session.max_payout);
        prop_assert_eq!(engine.house_status().reserved, 0);
        prop_assert_eq!(
            engine.house_status().balance + engine.wallet_info(&player).balance,
            before
        );
    }
}
