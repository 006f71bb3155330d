pub mod atr;
pub mod bollinger;
pub mod macd;
pub mod moving_average;
pub mod rsi;
pub mod stochastic;

pub use atr::AtrIndicator;
pub use bollinger::{BollingerBands, BollingerIndicator};
pub use macd::{MacdCross, MacdIndicator, MacdValue};
pub use moving_average::{ema_series, sma_series, EmaIndicator, SmaIndicator};
pub use rsi::RsiIndicator;
pub use stochastic::{StochasticIndicator, StochasticValue};
