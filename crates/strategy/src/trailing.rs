use serde::{Deserialize, Serialize};

use common::{EngineEvent, Side};
use risk::PositionSizer;

use crate::channel::DailyChannel;
use crate::state::SymbolState;

/// Boundary tightening per unit of pendant coefficient, relative to the
/// maximum unrealized profit.
pub const PENDANT_STEP: f64 = 0.001;

/// Smallest holding for which a one-third cut is taken.
pub const MIN_REDUCIBLE_LOTS: i64 = 3;

/// A position change decided on one tick. `target()` is the signed volume to
/// send to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Transition {
    Entered {
        side: Side,
        target: i64,
        price: f64,
    },
    Reduced {
        from: i64,
        to: i64,
        price: f64,
        boundary: f64,
    },
    Exited {
        from: i64,
        price: f64,
        stop_level: f64,
    },
}

impl Transition {
    pub fn target(&self) -> i64 {
        match *self {
            Transition::Entered { target, .. } => target,
            Transition::Reduced { to, .. } => to,
            Transition::Exited { .. } => 0,
        }
    }

    pub fn into_event(self, symbol: &str) -> EngineEvent {
        let symbol = symbol.to_string();
        match self {
            Transition::Entered {
                side,
                target,
                price,
            } => EngineEvent::Entered {
                symbol,
                side,
                quantity: target,
                price,
            },
            Transition::Reduced {
                from,
                to,
                price,
                boundary,
            } => EngineEvent::PartiallyReduced {
                symbol,
                from,
                to,
                price,
                boundary,
            },
            Transition::Exited {
                from,
                price,
                stop_level,
            } => EngineEvent::Exited {
                symbol,
                from,
                price,
                stop_level,
            },
        }
    }
}

/// Breakout entry plus pendant profit-lock and moving-average exit.
///
/// Per tick, a flat instrument may enter once per day; a held instrument may
/// be cut by a third once per day and fully closed once per day.
#[derive(Debug, Clone)]
pub struct TrailingExitEngine {
    sizer: PositionSizer,
}

impl TrailingExitEngine {
    pub fn new(sizer: PositionSizer) -> Self {
        Self { sizer }
    }

    /// Evaluate one tick at `price` and mutate `state` accordingly.
    ///
    /// A non-numeric price is ignored without touching `state`. The caller
    /// is responsible for only passing ticks once the channel is current.
    pub fn on_tick(
        &self,
        state: &mut SymbolState,
        channel: &DailyChannel,
        price: f64,
        multiplier: f64,
    ) -> Vec<Transition> {
        if !price.is_finite() {
            return Vec::new();
        }

        state.track_extreme(price);

        match state.side() {
            None => self.try_enter(state, channel, price, multiplier).into_iter().collect(),
            Some(side) => {
                let mut transitions = Vec::with_capacity(2);
                let stop_level = stop_level(side, channel, state);
                if let Some(t) = try_reduce(state, side, channel, price, stop_level) {
                    transitions.push(t);
                }
                if let Some(t) = try_exit(state, side, channel, price, stop_level) {
                    transitions.push(t);
                }
                transitions
            }
        }
    }

    fn try_enter(
        &self,
        state: &mut SymbolState,
        channel: &DailyChannel,
        price: f64,
        multiplier: f64,
    ) -> Option<Transition> {
        if state.day_trade_done {
            return None;
        }
        let side = if price >= channel.upper_band {
            Side::Long
        } else if price <= channel.lower_band {
            Side::Short
        } else {
            return None;
        };

        let target = self
            .sizer
            .entry_quantity(price, channel.moving_average, multiplier)
            * side.sign();
        state.set_position(target, price, channel.moving_average, false);
        state.day_trade_done = true;

        Some(Transition::Entered {
            side,
            target,
            price,
        })
    }
}

/// Full-exit level: the tighter of today's average and the average at entry.
pub fn stop_level(side: Side, channel: &DailyChannel, state: &SymbolState) -> f64 {
    match side {
        Side::Long => channel.moving_average.max(state.entry_moving_average),
        Side::Short => channel.moving_average.min(state.entry_moving_average),
    }
}

/// Pendant boundary for the current holding, `None` while there is no
/// unrealized profit at the extreme.
///
/// ```text
/// long:  max_profit = extreme / entry - 1,  boundary = extreme * (1 - k * 0.001 / max_profit)
/// short: max_profit = entry / extreme - 1,  boundary = extreme * (1 + k * 0.001 / max_profit)
/// ```
pub fn pendant_boundary(side: Side, state: &SymbolState) -> Option<f64> {
    let extreme = state.extreme_since_entry;
    let entry = state.entry_reference_price;
    let max_profit = match side {
        Side::Long => extreme / entry - 1.0,
        Side::Short => entry / extreme - 1.0,
    };
    if !(max_profit.is_finite() && max_profit > 0.0) {
        return None;
    }
    let offset = f64::from(state.pendant_coefficient) * PENDANT_STEP / max_profit;
    Some(match side {
        Side::Long => extreme * (1.0 - offset),
        Side::Short => extreme * (1.0 + offset),
    })
}

fn try_reduce(
    state: &mut SymbolState,
    side: Side,
    channel: &DailyChannel,
    price: f64,
    stop_level: f64,
) -> Option<Transition> {
    if state.pendant_trade_done || state.position.abs() < MIN_REDUCIBLE_LOTS {
        return None;
    }
    let boundary = pendant_boundary(side, state)?;

    // Price has given back past the boundary but not yet reached the stop,
    // and the boundary itself sits on the profitable side of the stop.
    let triggered = match side {
        Side::Long => price <= boundary && price > stop_level && boundary > stop_level,
        Side::Short => price >= boundary && price < stop_level && boundary < stop_level,
    };
    if !triggered {
        return None;
    }

    let from = state.position;
    let to = from - from / 3;
    state.set_position(to, price, channel.moving_average, true);
    state.pendant_trade_done = true;

    Some(Transition::Reduced {
        from,
        to,
        price,
        boundary,
    })
}

fn try_exit(
    state: &mut SymbolState,
    side: Side,
    channel: &DailyChannel,
    price: f64,
    stop_level: f64,
) -> Option<Transition> {
    if state.day_trade_done {
        return None;
    }
    let crossed = match side {
        Side::Long => price <= stop_level,
        Side::Short => price >= stop_level,
    };
    if !crossed {
        return None;
    }

    let from = state.position;
    state.set_position(0, price, channel.moving_average, false);
    state.day_trade_done = true;

    Some(Transition::Exited {
        from,
        price,
        stop_level,
    })
}
