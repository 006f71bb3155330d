use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use common::{Error, Result};

use crate::rules::{CompiledRule, Rule, Side};

/// Strategy file (TOML).
///
/// Example `config/strategies.toml`:
/// ```toml
/// [[strategy]]
/// id = "breakout"
/// name = "20-day breakout"
/// description = "Enter on a close above the 20-day average with rising volume"
///
/// [strategy.parameters]
/// lookback = 20
///
/// [strategy.entry]
/// kind = "CUSTOM"
/// expression = "close > sma(20) && volume > prev(volume)"
///
/// [strategy.exit]
/// kind = "RSI_THRESHOLD"
/// period = 14
/// side = "ABOVE"
/// threshold = 70.0
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyFile {
    #[serde(rename = "strategy", default)]
    pub strategies: Vec<StrategyDefinition>,
}

/// A named entry/exit rule pair. `parameters` are informational and shown
/// alongside backtest results.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StrategyDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
    pub entry: Rule,
    pub exit: Rule,
}

/// A definition whose rules have been validated and compiled.
#[derive(Debug, Clone)]
pub struct Strategy {
    pub definition: StrategyDefinition,
    pub(crate) entry: CompiledRule,
    pub(crate) exit: CompiledRule,
}

impl StrategyDefinition {
    pub fn compile(&self) -> Result<Strategy> {
        let wrap = |which: &str, e: Error| match e {
            Error::Strategy(msg) => Error::Strategy(format!("{} {which} rule: {msg}", self.id)),
            other => other,
        };
        Ok(Strategy {
            definition: self.clone(),
            entry: self.entry.compile().map_err(|e| wrap("entry", e))?,
            exit: self.exit.compile().map_err(|e| wrap("exit", e))?,
        })
    }
}

impl Strategy {
    pub fn name(&self) -> &str {
        &self.definition.name
    }
}

impl StrategyFile {
    /// Load and validate a strategy file. Every rule is compiled so a bad
    /// expression is reported at load time, not mid-backtest.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let file = Self::parse(&content)
            .map_err(|e| Error::Strategy(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), count = file.strategies.len(), "Strategy file loaded");
        Ok(file)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let file: StrategyFile =
            toml::from_str(content).map_err(|e| Error::Strategy(e.to_string()))?;
        for definition in &file.strategies {
            definition.compile()?;
        }
        Ok(file)
    }
}

/// Built-in strategies and any loaded from file, addressable by id.
#[derive(Debug, Clone)]
pub struct StrategyLibrary {
    strategies: Vec<StrategyDefinition>,
}

impl StrategyLibrary {
    pub fn builtin() -> Self {
        Self {
            strategies: builtin(),
        }
    }

    /// Add definitions. A definition whose id already exists replaces the
    /// earlier one, so files can override the built-ins.
    pub fn extend(&mut self, definitions: impl IntoIterator<Item = StrategyDefinition>) {
        for definition in definitions {
            match self.strategies.iter_mut().find(|s| s.id == definition.id) {
                Some(existing) => *existing = definition,
                None => self.strategies.push(definition),
            }
        }
    }

    pub fn list(&self) -> &[StrategyDefinition] {
        &self.strategies
    }

    pub fn get(&self, id: &str) -> Option<&StrategyDefinition> {
        self.strategies.iter().find(|s| s.id == id)
    }

    pub fn ids(&self) -> HashSet<&str> {
        self.strategies.iter().map(|s| s.id.as_str()).collect()
    }
}

impl Default for StrategyLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Moving-average crossover (20/50), RSI mean reversion (14, 30/70) and
/// MACD signal-line crossover (12/26/9).
pub fn builtin() -> Vec<StrategyDefinition> {
    vec![
        StrategyDefinition {
            id: "moving-average-crossover".into(),
            name: "Moving Average Crossover".into(),
            description: "Buy when short MA crosses above long MA, sell when it crosses below"
                .into(),
            parameters: BTreeMap::from([("shortPeriod".into(), 20.0), ("longPeriod".into(), 50.0)]),
            entry: Rule::MaCross {
                fast: 20,
                slow: 50,
                direction: Side::Above,
                average: Default::default(),
            },
            exit: Rule::MaCross {
                fast: 20,
                slow: 50,
                direction: Side::Below,
                average: Default::default(),
            },
        },
        StrategyDefinition {
            id: "rsi".into(),
            name: "RSI Strategy".into(),
            description: "Buy when RSI is oversold, sell when overbought".into(),
            parameters: BTreeMap::from([
                ("period".into(), 14.0),
                ("oversold".into(), 30.0),
                ("overbought".into(), 70.0),
            ]),
            entry: Rule::RsiThreshold {
                period: 14,
                side: Side::Below,
                threshold: 30.0,
            },
            exit: Rule::RsiThreshold {
                period: 14,
                side: Side::Above,
                threshold: 70.0,
            },
        },
        StrategyDefinition {
            id: "macd".into(),
            name: "MACD Strategy".into(),
            description:
                "Buy when MACD line crosses above signal line, sell when it crosses below".into(),
            parameters: BTreeMap::from([
                ("fastPeriod".into(), 12.0),
                ("slowPeriod".into(), 26.0),
                ("signalPeriod".into(), 9.0),
            ]),
            entry: Rule::MacdCross {
                fast: 12,
                slow: 26,
                signal: 9,
                direction: Side::Above,
            },
            exit: Rule::MacdCross {
                fast: 12,
                slow: 26,
                signal: 9,
                direction: Side::Below,
            },
        },
    ]
}
