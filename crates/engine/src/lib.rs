pub mod binance;
pub mod executor;
pub mod lifecycle;
pub mod snapshot;
pub mod tick;

pub use binance::BinanceClient;
pub use executor::{ExecutionOutcome, OrderExecutor};
pub use lifecycle::{Supervisor, SupervisorHandle};
pub use snapshot::HttpSnapshot;
pub use tick::{Collaborators, SkipReason, SupervisorConfig, TickOutcome};
