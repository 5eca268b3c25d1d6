use chrono::NaiveDate;
use proptest::prelude::*;

use common::Bar;
use risk::{PositionSizer, SizingConfig};
use strategy::{ChannelCalculator, DailyChannel, SymbolState, Transition, TrailingExitEngine};

fn engine() -> TrailingExitEngine {
    TrailingExitEngine::new(PositionSizer::new(SizingConfig {
        market_cap: 1_000_000.0,
        risk_fraction: 0.06,
    }))
}

fn bar_series(data: &[(f64, f64, f64)]) -> Vec<Bar> {
    let base = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(a, b, close))| Bar {
            timestamp: (base + chrono::Duration::days(i as i64))
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open: close,
            high: a.max(b),
            low: a.min(b),
            close,
        })
        .collect()
}

proptest! {
    /// Bands equal the extrema of the window strictly before the forming bar,
    /// and recomputing on identical input yields identical output.
    #[test]
    fn channel_is_extremal_and_idempotent(
        data in prop::collection::vec((1.0f64..1000.0, 1.0f64..1000.0, 1.0f64..1000.0), 2..40),
        band_window in 1usize..20,
        average_window in 1usize..20,
    ) {
        let bars = bar_series(&data);
        let calc = ChannelCalculator::new(band_window, average_window);
        let first = calc.compute(&bars);
        prop_assert_eq!(first, calc.compute(&bars));

        let n = bars.len();
        if let Some(ch) = first {
            let window = &bars[n - 1 - band_window..n - 1];
            let hi = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
            let lo = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
            prop_assert_eq!(ch.upper_band, hi);
            prop_assert_eq!(ch.lower_band, lo);
        } else {
            prop_assert!(n < calc.bar_count());
        }
    }

    /// Over any price path spanning several days, the pendant coefficient is
    /// zero exactly when flat, the extreme is zero when flat, and each kind of
    /// discretionary action happens at most once per day.
    #[test]
    fn state_invariants_hold_on_random_paths(
        days in prop::collection::vec(prop::collection::vec(80.0f64..120.0, 1..30), 1..6),
        upper in 100.0f64..115.0,
        band_gap in 1.0f64..20.0,
        ma in 90.0f64..110.0,
    ) {
        let eng = engine();
        let channel = DailyChannel { upper_band: upper, lower_band: upper - band_gap, moving_average: ma };
        let mut st = SymbolState::default();

        for ticks in days {
            st.on_new_daily_bar();
            let mut day_actions = 0;
            let mut pendant_actions = 0;
            for price in ticks {
                for t in eng.on_tick(&mut st, &channel, price, 10.0) {
                    match t {
                        Transition::Reduced { .. } => pendant_actions += 1,
                        _ => day_actions += 1,
                    }
                }
                prop_assert_eq!(st.pendant_coefficient == 0, st.position == 0);
                if st.position == 0 {
                    prop_assert_eq!(st.extreme_since_entry, 0.0);
                }
            }
            prop_assert!(day_actions <= 1);
            prop_assert!(pendant_actions <= 1);
        }
    }

    /// Ticks with a non-numeric price never mutate state.
    #[test]
    fn nan_ticks_are_inert(position in -50i64..50, coef in 0u32..5) {
        let mut st = SymbolState {
            position,
            entry_reference_price: 100.0,
            entry_moving_average: 99.0,
            extreme_since_entry: if position == 0 { 0.0 } else { 105.0 },
            pendant_coefficient: if position == 0 { 0 } else { coef + 1 },
            ..SymbolState::default()
        };
        let before = st.clone();
        let channel = DailyChannel { upper_band: 101.0, lower_band: 95.0, moving_average: 99.0 };
        prop_assert!(engine().on_tick(&mut st, &channel, f64::NAN, 10.0).is_empty());
        prop_assert_eq!(st, before);
    }
}
