pub mod executor;
pub mod lifecycle;
pub mod snapshot;

pub use executor::TargetExecutor;
pub use lifecycle::{Collaborators, Engine, EngineConfig, EngineHandle, StopReason};
pub use snapshot::{Snapshot, SnapshotStore, SymbolSnapshot};
