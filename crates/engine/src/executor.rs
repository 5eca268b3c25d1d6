use std::sync::Arc;

use tracing::{error, info, warn};

use common::{BrokerPosition, ExecutionGateway, TradingMode};

/// Forwards target volumes to the execution gateway and produces the
/// account reports.
///
/// This is the ONLY component that calls `ExecutionGateway::set_target_volume`.
pub struct TargetExecutor {
    gateway: Arc<dyn ExecutionGateway>,
    mode: TradingMode,
}

impl TargetExecutor {
    pub fn new(gateway: Arc<dyn ExecutionGateway>, mode: TradingMode) -> Self {
        Self { gateway, mode }
    }

    /// Fire-and-forget target update. Gateway failures are logged; retries
    /// belong to the gateway.
    pub async fn set_target(&self, symbol: &str, volume: i64) {
        info!(symbol = %symbol, target = volume, mode = %self.mode, "Setting target volume");
        if let Err(e) = self.gateway.set_target_volume(symbol, volume).await {
            error!(symbol = %symbol, target = volume, error = %e, "Target volume rejected by gateway");
        }
    }

    /// Broker positions, or an empty list if the gateway cannot be queried.
    pub async fn positions(&self) -> Vec<BrokerPosition> {
        match self.gateway.positions().await {
            Ok(positions) => positions,
            Err(e) => {
                warn!(error = %e, "Failed to query broker positions");
                Vec::new()
            }
        }
    }

    /// Log every broker position and today's trades.
    pub async fn report(&self) {
        for position in self.positions().await {
            info!("{position}");
        }
        info!("------------------------------");
        match self.gateway.trades().await {
            Ok(trades) => {
                for trade in trades {
                    info!("{trade}");
                }
            }
            Err(e) => warn!(error = %e, "Failed to query trade log"),
        }
    }
}
