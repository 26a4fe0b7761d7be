pub mod config;
pub mod error;
pub mod terminal;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use terminal::{ChartSnapshot, ExecutionGateway, MarketDataTerminal, NotificationSink, PositionQuery};
pub use types::*;
