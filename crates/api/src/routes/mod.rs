mod candles;
mod control;
mod health;

pub use candles::candles_router;
pub use control::control_router;
pub use health::health_router;
