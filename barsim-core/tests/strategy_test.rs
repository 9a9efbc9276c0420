//! Integration tests for the built-in strategies driven through the engine.
//!
//! Tests:
//! 1. Registry strategies run end-to-end
//! 2. Lookahead: truncating the future never changes past decisions
//! 3. Persistent state is cleared when the position goes flat

use barsim_core::domain::{Bar, TradeStatus};
use barsim_core::strategy::{create_strategy, StrategySpec};
use barsim_core::{BarTable, Engine, EngineConfig, RunResult};
use chrono::NaiveDate;

/// Sine-wave closes: several full up and down swings.
fn wave(n: usize) -> Vec<Bar> {
    let t0 = NaiveDate::from_ymd_opt(2022, 1, 3)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + 15.0 * (i as f64 / 10.0).sin() + i as f64 * 0.05;
            Bar::new(
                t0 + chrono::Duration::days(i as i64),
                close - 0.4,
                close + 1.2,
                close - 1.2,
                close,
            )
            .with_volume(1_000_000.0)
        })
        .collect()
}

fn run(spec: &StrategySpec, bars: Vec<Bar>) -> RunResult {
    Engine::new(
        BarTable::new(bars),
        create_strategy(spec).unwrap(),
        EngineConfig {
            commission_pct: 0.1,
            ..EngineConfig::default()
        },
    )
    .unwrap()
    .run()
}

// ── 1. End-to-end ────────────────────────────────────────────────────

#[test]
fn ma_crossover_trades_the_swings() {
    let spec = StrategySpec::new("ma_crossover")
        .with_param("fast_period", 5.0)
        .with_param("slow_period", 20.0);
    let result = run(&spec, wave(250));

    assert!(result.closed_trades().count() >= 3);
    for t in result.closed_trades() {
        assert_eq!(t.entry_signal_reason, "golden cross");
        assert_eq!(t.exit_reason.as_deref(), Some("death cross"));
        assert!(t.exit_bar.unwrap() > t.entry_bar);
    }
}

#[test]
fn ma_crossover_with_stops_exits_by_stop() {
    let spec = StrategySpec::new("ma_crossover")
        .with_param("fast_period", 5.0)
        .with_param("slow_period", 20.0)
        .with_param("trail_pct", 0.02);
    let result = run(&spec, wave(250));
    assert!(result.closed_trades().any(|t| t.is_stop_exit()));
}

#[test]
fn donchian_breakout_runs_with_pyramiding() {
    let spec = StrategySpec::new("donchian_breakout")
        .with_param("entry_lookback", 10.0)
        .with_param("exit_lookback", 5.0)
        .with_param("pyramiding", 3.0);
    let result = run(&spec, wave(250));

    assert!(!result.trades.is_empty());
    for t in result.closed_trades() {
        let reason = t.exit_reason.as_deref().unwrap();
        assert!(reason == "stop" || reason.starts_with("close below"), "{reason}");
    }
}

#[test]
fn buy_and_hold_holds_to_the_end() {
    let result = run(&StrategySpec::new("buy_and_hold"), wave(100));
    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.trades[0].status, TradeStatus::Open);
    assert_eq!(result.trades[0].entry_bar, 1);
    assert!(result.equity_curve.iter().skip(1).all(|p| p.qty > 0.0));
}

// ── 2. Lookahead ─────────────────────────────────────────────────────

#[test]
fn signals_do_not_depend_on_future_bars() {
    let spec = StrategySpec::new("ma_crossover")
        .with_param("fast_period", 5.0)
        .with_param("slow_period", 20.0);
    let full = run(&spec, wave(200));
    let cut = 120;
    let truncated = run(&spec, wave(cut));

    for i in 0..cut - 1 {
        assert_eq!(
            full.signals[i], truncated.signals[i],
            "signal at bar {i} changed when future bars were removed"
        );
        assert_eq!(full.equity_curve[i], truncated.equity_curve[i]);
    }
}

// ── 3. State lifecycle ───────────────────────────────────────────────

#[test]
fn reentry_gets_fresh_trailing_state() {
    let spec = StrategySpec::new("donchian_breakout")
        .with_param("entry_lookback", 10.0)
        .with_param("exit_lookback", 5.0)
        .with_param("trail_pct", 0.05);
    let result = run(&spec, wave(300));

    let closed: Vec<_> = result.closed_trades().collect();
    assert!(closed.len() >= 2);
    for t in &closed {
        if let Some(stop) = t.stop_price_at_close {
            // a trailing stop carried over from an earlier trade could sit
            // far above this trade's entry
            assert!(stop < t.entry_price * 1.5);
        }
    }
}
