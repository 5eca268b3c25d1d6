use serde::{Deserialize, Serialize};

use common::Side;

/// Mutable per-instrument record owned by the engine.
///
/// Invariant: `position == 0` implies `extreme_since_entry == 0` and
/// `pendant_coefficient == 0`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SymbolState {
    /// Signed lots: long > 0, short < 0.
    pub position: i64,
    /// Price at the last flat to non-flat transition.
    pub entry_reference_price: f64,
    /// Daily moving average at entry.
    pub entry_moving_average: f64,
    /// Best price since entry (max for long, min for short), 0 when flat.
    pub extreme_since_entry: f64,
    /// Tightens the pendant boundary; 1 on entry, +1 per reduction, 0 when flat.
    pub pendant_coefficient: u32,
    /// An entry or a full exit already happened today.
    pub day_trade_done: bool,
    /// A pendant reduction already happened today.
    pub pendant_trade_done: bool,
    /// At least one daily bar change was observed since process start.
    pub daily_updated_since_start: bool,
}

impl SymbolState {
    /// Seed from a broker-held position. The average open cost stands in for
    /// the entry price, the entry average and the extreme.
    pub fn seeded(position: i64, open_price: f64) -> Self {
        if position == 0 {
            return Self::default();
        }
        Self {
            position,
            entry_reference_price: open_price,
            entry_moving_average: open_price,
            extreme_since_entry: open_price,
            pendant_coefficient: 1,
            ..Self::default()
        }
    }

    pub fn side(&self) -> Option<Side> {
        match self.position {
            p if p > 0 => Some(Side::Long),
            p if p < 0 => Some(Side::Short),
            _ => None,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.position == 0
    }

    /// A new daily bar opened: clear the daily guards.
    /// Never touches the position or the trailing parameters.
    pub fn on_new_daily_bar(&mut self) {
        self.day_trade_done = false;
        self.pendant_trade_done = false;
        self.daily_updated_since_start = true;
    }

    /// Move the favorable extreme with `price`; zero it while flat.
    pub fn track_extreme(&mut self, price: f64) {
        self.extreme_since_entry = match self.side() {
            Some(Side::Long) => self.extreme_since_entry.max(price),
            Some(Side::Short) => self.extreme_since_entry.min(price),
            None => 0.0,
        };
    }

    /// Apply a new target position and update the trailing parameters.
    ///
    /// - flat to non-flat: entry at `price`, coefficient 1, entry average recorded;
    /// - reduction that stays open (or `is_pendant`): coefficient + 1;
    /// - non-flat to flat: coefficient and extreme cleared.
    pub fn set_position(&mut self, target: i64, price: f64, moving_average: f64, is_pendant: bool) {
        let previous = self.position;
        self.position = target;

        if is_pendant || (previous.abs() > target.abs() && target != 0) {
            self.pendant_coefficient += 1;
        } else if previous != 0 && target == 0 {
            self.pendant_coefficient = 0;
            self.extreme_since_entry = 0.0;
        } else if previous == 0 && target != 0 {
            self.entry_reference_price = price;
            self.entry_moving_average = moving_average;
            self.extreme_since_entry = price;
            self.pendant_coefficient = 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_flat_respects_invariant() {
        let st = SymbolState::seeded(0, 3500.0);
        assert_eq!(st, SymbolState::default());
    }

    #[test]
    fn seeded_long_uses_open_cost() {
        let st = SymbolState::seeded(5, 3500.0);
        assert_eq!(st.side(), Some(Side::Long));
        assert_eq!(st.entry_reference_price, 3500.0);
        assert_eq!(st.entry_moving_average, 3500.0);
        assert_eq!(st.extreme_since_entry, 3500.0);
        assert_eq!(st.pendant_coefficient, 1);
        assert!(!st.daily_updated_since_start);
    }

    #[test]
    fn new_daily_bar_resets_guards_only() {
        let mut st = SymbolState::seeded(-6, 80.0);
        st.pendant_coefficient = 3;
        st.extreme_since_entry = 70.0;
        st.day_trade_done = true;
        st.pendant_trade_done = true;

        st.on_new_daily_bar();

        assert!(!st.day_trade_done);
        assert!(!st.pendant_trade_done);
        assert!(st.daily_updated_since_start);
        assert_eq!(st.position, -6);
        assert_eq!(st.pendant_coefficient, 3);
        assert_eq!(st.extreme_since_entry, 70.0);
    }

    #[test]
    fn extreme_is_monotone_in_favorable_direction() {
        let mut long = SymbolState::seeded(3, 100.0);
        long.track_extreme(104.0);
        long.track_extreme(101.0);
        assert_eq!(long.extreme_since_entry, 104.0);

        let mut short = SymbolState::seeded(-3, 100.0);
        short.track_extreme(96.0);
        short.track_extreme(99.0);
        assert_eq!(short.extreme_since_entry, 96.0);

        let mut flat = SymbolState::default();
        flat.track_extreme(50.0);
        assert_eq!(flat.extreme_since_entry, 0.0);
    }

    #[test]
    fn entry_reduce_exit_cycle() {
        let mut st = SymbolState::default();

        st.set_position(9, 106.0, 101.0, false);
        assert_eq!(st.entry_reference_price, 106.0);
        assert_eq!(st.entry_moving_average, 101.0);
        assert_eq!(st.extreme_since_entry, 106.0);
        assert_eq!(st.pendant_coefficient, 1);

        st.set_position(6, 110.0, 102.0, true);
        assert_eq!(st.pendant_coefficient, 2);
        // entry fields are untouched by a reduction
        assert_eq!(st.entry_reference_price, 106.0);
        assert_eq!(st.entry_moving_average, 101.0);

        st.set_position(0, 100.0, 102.0, false);
        assert_eq!(st.pendant_coefficient, 0);
        assert_eq!(st.extreme_since_entry, 0.0);
        assert!(st.is_flat());
    }
}
