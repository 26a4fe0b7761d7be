mod rest;

pub use rest::{base_asset, parse_klines, BinanceClient};
