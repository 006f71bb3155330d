pub mod calculator;
pub mod series;
pub mod studies;

pub use calculator::{IndicatorCalculator, IndicatorResult};
pub use series::PriceSeries;
pub use studies::{
    ema_series, sma_series, AtrIndicator, BollingerBands, BollingerIndicator, EmaIndicator,
    MacdCross, MacdIndicator, MacdValue, RsiIndicator, SmaIndicator, StochasticIndicator,
    StochasticValue,
};

pub use common::{IndicatorConfig, IndicatorKind};
