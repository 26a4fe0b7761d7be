use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One OHLCV bar as delivered by the market data terminal.
///
/// Fields are private so every instance has passed [`Candle::new`]:
/// all prices finite and `low <= open, close <= high`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCandle", into = "RawCandle")]
pub struct Candle {
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    tick_volume: u64,
}

impl Candle {
    pub fn new(
        time: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        tick_volume: u64,
    ) -> Result<Self> {
        if ![open, high, low, close].iter().all(|p| p.is_finite()) {
            return Err(Error::InvalidCandle(format!(
                "non-finite price at t={time}"
            )));
        }
        if low > open.min(close) || high < open.max(close) {
            return Err(Error::InvalidCandle(format!(
                "t={time}: expected low <= open,close <= high, got o={open} h={high} l={low} c={close}"
            )));
        }
        Ok(Self {
            time,
            open,
            high,
            low,
            close,
            tick_volume,
        })
    }

    /// Open time in epoch seconds.
    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn open(&self) -> f64 {
        self.open
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn close(&self) -> f64 {
        self.close
    }

    pub fn tick_volume(&self) -> u64 {
        self.tick_volume
    }

    /// `|open - close|`
    pub fn body(&self) -> f64 {
        (self.open - self.close).abs()
    }

    /// `close >= open`. A doji counts as bullish.
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

#[derive(Serialize, Deserialize)]
struct RawCandle {
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    tick_volume: u64,
}

impl TryFrom<RawCandle> for Candle {
    type Error = Error;

    fn try_from(raw: RawCandle) -> Result<Self> {
        Candle::new(raw.time, raw.open, raw.high, raw.low, raw.close, raw.tick_volume)
    }
}

impl From<Candle> for RawCandle {
    fn from(c: Candle) -> Self {
        RawCandle {
            time: c.time,
            open: c.open,
            high: c.high,
            low: c.low,
            close: c.close,
            tick_volume: c.tick_volume,
        }
    }
}

/// The most recent candles for one (symbol, timeframe) key, oldest first.
///
/// Rebuilt wholesale on every poll; never appended to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandleWindow {
    candles: Vec<Candle>,
}

impl CandleWindow {
    /// Default window size N.
    pub const DEFAULT_CAPACITY: usize = 100;

    /// Build a window keeping at most the last `capacity` candles.
    /// Fails if times are not strictly increasing.
    pub fn new(mut candles: Vec<Candle>, capacity: usize) -> Result<Self> {
        if let Some(pair) = candles.windows(2).find(|w| w[1].time <= w[0].time) {
            return Err(Error::InvalidWindow(format!(
                "candle times not strictly increasing: {} then {}",
                pair[0].time, pair[1].time
            )));
        }
        if candles.len() > capacity {
            candles.drain(..candles.len() - capacity);
        }
        Ok(Self { candles })
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }
}

/// Chart period of each candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    /// Interval string used by Binance kline endpoints.
    pub fn binance_interval(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Timeframe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "M1" => Ok(Timeframe::M1),
            "M5" => Ok(Timeframe::M5),
            "M15" => Ok(Timeframe::M15),
            "M30" => Ok(Timeframe::M30),
            "H1" => Ok(Timeframe::H1),
            "H4" => Ok(Timeframe::H4),
            "D1" => Ok(Timeframe::D1),
            other => Err(Error::Config(format!("unknown timeframe '{other}'"))),
        }
    }
}

/// Volume classification of a single candle, with the pattern highlight
/// overriding it when a pattern is detected on that candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorState {
    NormalBull,
    NormalBear,
    FlowBuy,
    FlowSell,
    Pattern,
}

impl ColorState {
    pub fn is_flow(&self) -> bool {
        matches!(self, ColorState::FlowBuy | ColorState::FlowSell)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternKind {
    /// Large bearish candle followed by a strong bullish recovery.
    #[serde(rename = "V_SHAPE")]
    VShape,
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternKind::VShape => write!(f, "V_SHAPE"),
        }
    }
}

/// Candle enriched with its classification, as served to charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedCandle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub tick_volume: u64,
    pub color_state: ColorState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_label: Option<PatternKind>,
}

impl AnalyzedCandle {
    pub fn new(candle: &Candle, color_state: ColorState, pattern_label: Option<PatternKind>) -> Self {
        Self {
            time: candle.time,
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            tick_volume: candle.tick_volume,
            color_state,
            pattern_label,
        }
    }
}

/// Side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

impl TradeAction {
    /// Order side for actionable directives; `None` for `Hold`.
    pub fn side(&self) -> Option<OrderSide> {
        match self {
            TradeAction::Buy => Some(OrderSide::Buy),
            TradeAction::Sell => Some(OrderSide::Sell),
            TradeAction::Hold => None,
        }
    }
}

impl std::fmt::Display for TradeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "BUY"),
            TradeAction::Sell => write!(f, "SELL"),
            TradeAction::Hold => write!(f, "HOLD"),
        }
    }
}

/// The decision produced once per tick. Consumed immediately, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDirective {
    pub action: TradeAction,
    pub symbol: String,
    pub volume: f64,
}

impl TradeDirective {
    pub fn hold(symbol: impl Into<String>, volume: f64) -> Self {
        Self {
            action: TradeAction::Hold,
            symbol: symbol.into(),
            volume,
        }
    }
}

/// A market order to be submitted to the execution gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub volume: f64,
}

impl Order {
    pub fn market(symbol: impl Into<String>, side: OrderSide, volume: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            symbol: symbol.into(),
            side,
            volume,
        }
    }
}

/// Confirmation returned by the execution gateway for an accepted order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub ticket: u64,
    pub symbol: String,
    pub side: OrderSide,
    pub volume: f64,
    pub fill_price: f64,
    /// Gateway status string, e.g. `FILLED`.
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// An open position as tracked by the paper gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub ticket: u64,
    pub symbol: String,
    pub side: OrderSide,
    pub entry_price: f64,
    pub volume: f64,
    pub opened_at: DateTime<Utc>,
}

/// Whether the bot is running against the real exchange or simulating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Live,
    Paper,
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingMode::Live => write!(f, "live"),
            TradingMode::Paper => write!(f, "paper"),
        }
    }
}

/// How long pattern-cooldown state lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CooldownScope {
    /// Detections are remembered across ticks by candle open time.
    #[default]
    Persistent,
    /// Every tick rescans from a clean state.
    Window,
}

impl FromStr for CooldownScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "persistent" => Ok(CooldownScope::Persistent),
            "window" => Ok(CooldownScope::Window),
            other => Err(Error::Config(format!(
                "COOLDOWN_SCOPE must be 'persistent' or 'window', got: '{other}'"
            ))),
        }
    }
}

/// Current state of the supervisor loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    #[default]
    Stopped,
    Running,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Stopped => write!(f, "stopped"),
            EngineState::Running => write!(f, "running"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Success,
    Warning,
}

/// Reply to a control-surface call. Never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub status: ActionStatus,
    pub message: String,
}

impl ActionResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Warning,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ActionStatus::Success
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub running: bool,
    pub symbol: String,
    pub state: EngineState,
}
