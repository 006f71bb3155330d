pub mod expr;
pub mod metrics;
pub mod rules;
pub mod simulator;
pub mod strategy;

pub use metrics::BacktestMetrics;
pub use rules::{Average, BarContext, CompiledRule, Rule, Side};
pub use simulator::{Backtest, BacktestResult, EquityPoint, SimulatedTrade, TradeStatus};
pub use strategy::{builtin, Strategy, StrategyDefinition, StrategyFile, StrategyLibrary};
