use tokio::sync::mpsc;
use tracing::info;

use crate::EngineEvent;

/// Receives the engine's business events. The engine never logs trading
/// decisions itself; the sink decides how they are recorded.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &EngineEvent);
}

/// Renders every event as one structured `tracing` record.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &EngineEvent) {
        match event {
            EngineEvent::ChannelRecomputed {
                symbol,
                upper_band,
                lower_band,
                moving_average,
            } => info!(
                symbol = %symbol,
                upper = upper_band,
                middle = moving_average,
                lower = lower_band,
                "Daily channel recomputed"
            ),
            EngineEvent::Entered {
                symbol,
                side,
                quantity,
                price,
            } => info!(symbol = %symbol, side = %side, qty = quantity, price = price, "Breakout entry"),
            EngineEvent::PartiallyReduced {
                symbol,
                from,
                to,
                price,
                boundary,
            } => info!(
                symbol = %symbol,
                from = from,
                to = to,
                price = price,
                boundary = boundary,
                "Pendant profit-lock reduction"
            ),
            EngineEvent::Exited {
                symbol,
                from,
                price,
                stop_level,
            } => info!(symbol = %symbol, from = from, price = price, stop = stop_level, "Full exit"),
            EngineEvent::InactiveFlattened { symbol, position } => {
                info!(symbol = %symbol, position = position, "Inactive instrument targeted to 0")
            }
            EngineEvent::SnapshotSaved { instruments } => {
                info!(instruments = instruments, "State snapshot saved")
            }
            EngineEvent::SessionCutoff => info!("Session cutoff reached"),
        }
    }
}

/// Forwards events to a channel consumer. Send errors (no receiver) are ignored.
impl EventSink for mpsc::UnboundedSender<EngineEvent> {
    fn emit(&self, event: &EngineEvent) {
        let _ = self.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_forwards_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.emit(&EngineEvent::SessionCutoff);
        assert_eq!(rx.try_recv().unwrap(), EngineEvent::SessionCutoff);
    }

    #[test]
    fn channel_sink_ignores_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel::<EngineEvent>();
        drop(rx);
        tx.emit(&EngineEvent::SnapshotSaved { instruments: 1 });
    }
}
