use serde::{Deserialize, Serialize};

use common::{Bar, Error, IndicatorConfig, Result};
use indicators::{EmaIndicator, MacdCross, MacdIndicator, RsiIndicator, SmaIndicator};

use crate::expr::Expr;

/// History visible to a rule: every bar up to and including the current one.
#[derive(Debug, Clone, Copy)]
pub struct BarContext<'a> {
    pub bars: &'a [Bar],
    /// Closes of `bars`, same length.
    pub closes: &'a [f64],
}

impl<'a> BarContext<'a> {
    pub fn new(bars: &'a [Bar], closes: &'a [f64]) -> Self {
        debug_assert_eq!(bars.len(), closes.len());
        Self { bars, closes }
    }

    pub fn current(&self) -> Option<&'a Bar> {
        self.bars.last()
    }

    /// The bar `offset` positions before the current one.
    pub fn back(&self, offset: usize) -> Option<&'a Bar> {
        let i = self.bars.len().checked_sub(offset.checked_add(1)?)?;
        self.bars.get(i)
    }

    /// The same history without the current bar.
    fn previous(&self) -> Option<BarContext<'a>> {
        let n = self.bars.len().checked_sub(1)?;
        Some(BarContext::new(&self.bars[..n], &self.closes[..n]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Above,
    Below,
}

impl Side {
    fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Side::Above => value > threshold,
            Side::Below => value < threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Average {
    #[default]
    Sma,
    Ema,
}

fn default_rsi_period() -> usize {
    14
}

/// Entry or exit condition of a strategy, in serializable form.
///
/// ```toml
/// kind = "MA_CROSS"
/// fast = 20
/// slow = 50
/// direction = "ABOVE"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rule {
    Always,
    Never,
    /// Close strictly above / below `threshold`.
    PriceThreshold { side: Side, threshold: f64 },
    /// Fast average crosses the slow one on the current bar.
    MaCross {
        fast: usize,
        slow: usize,
        direction: Side,
        #[serde(default)]
        average: Average,
    },
    RsiThreshold {
        #[serde(default = "default_rsi_period")]
        period: usize,
        side: Side,
        threshold: f64,
    },
    /// MACD line crosses its signal line on the current bar.
    MacdCross {
        fast: usize,
        slow: usize,
        signal: usize,
        direction: Side,
    },
    Custom { expression: String },
    All { rules: Vec<Rule> },
    Any { rules: Vec<Rule> },
}

/// A validated rule, ready to evaluate bar after bar.
#[derive(Debug, Clone)]
pub enum CompiledRule {
    Always,
    Never,
    PriceThreshold { side: Side, threshold: f64 },
    MaCross { fast: usize, slow: usize, direction: Side, average: Average },
    RsiThreshold { rsi: RsiIndicator, side: Side, threshold: f64 },
    MacdCross { macd: MacdIndicator, direction: Side },
    Custom(Expr),
    All(Vec<CompiledRule>),
    Any(Vec<CompiledRule>),
}

impl Rule {
    pub fn compile(&self) -> Result<CompiledRule> {
        let period_in_range = |name: &str, value: usize| {
            if value == 0 || value > IndicatorConfig::MAX_PERIOD {
                Err(Error::Strategy(format!(
                    "{name} must be between 1 and {}, got {value}",
                    IndicatorConfig::MAX_PERIOD
                )))
            } else {
                Ok(())
            }
        };

        Ok(match self {
            Rule::Always => CompiledRule::Always,
            Rule::Never => CompiledRule::Never,
            Rule::PriceThreshold { side, threshold } => {
                finite("threshold", *threshold)?;
                CompiledRule::PriceThreshold {
                    side: *side,
                    threshold: *threshold,
                }
            }
            Rule::MaCross {
                fast,
                slow,
                direction,
                average,
            } => {
                period_in_range("MA_CROSS fast period", *fast)?;
                period_in_range("MA_CROSS slow period", *slow)?;
                if fast >= slow {
                    return Err(Error::Strategy(format!(
                        "MA_CROSS fast period ({fast}) must be shorter than slow ({slow})"
                    )));
                }
                CompiledRule::MaCross {
                    fast: *fast,
                    slow: *slow,
                    direction: *direction,
                    average: *average,
                }
            }
            Rule::RsiThreshold {
                period,
                side,
                threshold,
            } => {
                period_in_range("RSI_THRESHOLD period", *period)?;
                finite("threshold", *threshold)?;
                CompiledRule::RsiThreshold {
                    rsi: RsiIndicator::new(*period),
                    side: *side,
                    threshold: *threshold,
                }
            }
            Rule::MacdCross {
                fast,
                slow,
                signal,
                direction,
            } => {
                period_in_range("MACD_CROSS fast period", *fast)?;
                period_in_range("MACD_CROSS slow period", *slow)?;
                period_in_range("MACD_CROSS signal period", *signal)?;
                if fast >= slow {
                    return Err(Error::Strategy(format!(
                        "MACD_CROSS fast period ({fast}) must be shorter than slow ({slow})"
                    )));
                }
                CompiledRule::MacdCross {
                    macd: MacdIndicator::new(*fast, *slow, *signal),
                    direction: *direction,
                }
            }
            Rule::Custom { expression } => CompiledRule::Custom(Expr::parse(expression)?),
            Rule::All { rules } => {
                CompiledRule::All(rules.iter().map(Rule::compile).collect::<Result<_>>()?)
            }
            Rule::Any { rules } => {
                CompiledRule::Any(rules.iter().map(Rule::compile).collect::<Result<_>>()?)
            }
        })
    }
}

fn finite(name: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Error::Strategy(format!("{name} must be a finite number")))
    }
}

impl CompiledRule {
    /// Whether the rule fires on the last bar of `ctx`. Insufficient history
    /// never fires.
    pub fn evaluate(&self, ctx: &BarContext<'_>) -> bool {
        match self {
            CompiledRule::Always => true,
            CompiledRule::Never => false,
            CompiledRule::PriceThreshold { side, threshold } => ctx
                .current()
                .is_some_and(|bar| side.holds(bar.close, *threshold)),
            CompiledRule::MaCross {
                fast,
                slow,
                direction,
                average,
            } => {
                let spread = |c: &BarContext<'_>| -> Option<f64> {
                    let (f, s) = match average {
                        Average::Sma => (
                            SmaIndicator::new(*fast).compute(c.closes)?,
                            SmaIndicator::new(*slow).compute(c.closes)?,
                        ),
                        Average::Ema => (
                            EmaIndicator::new(*fast).compute(c.closes)?,
                            EmaIndicator::new(*slow).compute(c.closes)?,
                        ),
                    };
                    Some(f - s)
                };
                let Some(prev) = ctx.previous().as_ref().and_then(spread) else {
                    return false;
                };
                let Some(curr) = spread(ctx) else {
                    return false;
                };
                crossed(*direction, prev, curr)
            }
            CompiledRule::RsiThreshold {
                rsi,
                side,
                threshold,
            } => rsi
                .compute(ctx.closes)
                .is_some_and(|value| side.holds(value, *threshold)),
            CompiledRule::MacdCross { macd, direction } => {
                matches!(
                    (macd.crossover(ctx.closes), direction),
                    (Some(MacdCross::Bullish), Side::Above) | (Some(MacdCross::Bearish), Side::Below)
                )
            }
            CompiledRule::Custom(expr) => expr.eval(ctx),
            CompiledRule::All(rules) => rules.iter().all(|r| r.evaluate(ctx)),
            CompiledRule::Any(rules) => rules.iter().any(|r| r.evaluate(ctx)),
        }
    }
}

/// `prev` and `curr` are (fast − slow) on consecutive bars.
fn crossed(direction: Side, prev: f64, curr: f64) -> bool {
    match direction {
        Side::Above => prev <= 0.0 && curr > 0.0,
        Side::Below => prev >= 0.0 && curr < 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn bars(closes: &[f64]) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                symbol: "TEST".into(),
                timestamp: start + Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })
            .collect()
    }

    /// Indices at which `rule` fires, evaluating each prefix of `closes`.
    fn firing(rule: &Rule, closes: &[f64]) -> Vec<usize> {
        let compiled = rule.compile().unwrap();
        let bars = bars(closes);
        (0..closes.len())
            .filter(|&i| compiled.evaluate(&BarContext::new(&bars[..=i], &closes[..=i])))
            .collect()
    }

    #[test]
    fn deserializes_tagged_rules() {
        let rule: Rule = serde_json::from_str(
            r#"{"kind":"MA_CROSS","fast":2,"slow":4,"direction":"ABOVE"}"#,
        )
        .unwrap();
        assert_eq!(
            rule,
            Rule::MaCross {
                fast: 2,
                slow: 4,
                direction: Side::Above,
                average: Average::Sma
            }
        );

        let rule: Rule =
            serde_json::from_str(r#"{"kind":"RSI_THRESHOLD","side":"BELOW","threshold":30}"#).unwrap();
        assert_eq!(
            rule,
            Rule::RsiThreshold {
                period: 14,
                side: Side::Below,
                threshold: 30.0
            }
        );
    }

    #[test]
    fn price_threshold_is_strict() {
        let rule = Rule::PriceThreshold {
            side: Side::Above,
            threshold: 2.0,
        };
        assert_eq!(firing(&rule, &[1.0, 2.0, 3.0, 2.0]), vec![2]);
    }

    #[test]
    fn ma_cross_fires_on_the_crossing_bar_only() {
        // SMA(2) vs SMA(4): falling then rising
        let closes = [10.0, 9.0, 8.0, 7.0, 6.0, 8.0, 11.0, 14.0, 17.0];
        let up = Rule::MaCross {
            fast: 2,
            slow: 4,
            direction: Side::Above,
            average: Average::Sma,
        };
        let down = Rule::MaCross {
            fast: 2,
            slow: 4,
            direction: Side::Below,
            average: Average::Sma,
        };
        // Bar 5: sma2 = 7.0, sma4 = 7.25 (below). Bar 6: sma2 = 9.5, sma4 = 8.0 (above)
        assert_eq!(firing(&up, &closes), vec![6]);
        assert!(firing(&down, &closes).is_empty());
    }

    #[test]
    fn rsi_threshold() {
        let falling: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let rule = Rule::RsiThreshold {
            period: 14,
            side: Side::Below,
            threshold: 30.0,
        };
        // RSI needs 15 closes; all-loss series has RSI 0 from then on
        assert_eq!(firing(&rule, &falling), (14..20).collect::<Vec<_>>());
    }

    #[test]
    fn macd_cross_matches_indicator_crossover() {
        let mut closes: Vec<f64> = (0..40).map(|i| 100.0 - i as f64 * 0.5).collect();
        closes.extend((0..20).map(|i| 80.0 + i as f64 * 2.0));
        let rule = Rule::MacdCross {
            fast: 12,
            slow: 26,
            signal: 9,
            direction: Side::Above,
        };
        let fired = firing(&rule, &closes);
        assert_eq!(fired.len(), 1, "one bullish crossover after the reversal: {fired:?}");
        assert!(fired[0] >= 40);
    }

    #[test]
    fn combinators_and_custom() {
        let rule = Rule::All {
            rules: vec![
                Rule::Custom {
                    expression: "close > prev(close)".into(),
                },
                Rule::Any {
                    rules: vec![
                        Rule::PriceThreshold {
                            side: Side::Above,
                            threshold: 4.0,
                        },
                        Rule::Never,
                    ],
                },
            ],
        };
        assert_eq!(firing(&rule, &[1.0, 5.0, 3.0, 6.0, 2.0]), vec![1, 3]);
    }

    #[test]
    fn back_beyond_history_is_none() {
        let closes = [1.0, 2.0, 3.0];
        let bars = bars(&closes);
        let ctx = BarContext::new(&bars, &closes);
        assert_eq!(ctx.back(2).map(|b| b.close), Some(1.0));
        assert!(ctx.back(3).is_none());
        assert!(ctx.back(usize::MAX).is_none());
    }

    #[test]
    fn invalid_rules_fail_to_compile() {
        let bad = [
            Rule::MaCross {
                fast: 50,
                slow: 20,
                direction: Side::Above,
                average: Average::Sma,
            },
            Rule::RsiThreshold {
                period: 0,
                side: Side::Above,
                threshold: 70.0,
            },
            Rule::RsiThreshold {
                period: usize::MAX,
                side: Side::Below,
                threshold: 30.0,
            },
            Rule::MacdCross {
                fast: 12,
                slow: usize::MAX,
                signal: 9,
                direction: Side::Above,
            },
            Rule::MaCross {
                fast: 5,
                slow: IndicatorConfig::MAX_PERIOD + 1,
                direction: Side::Below,
                average: Average::Ema,
            },
            Rule::PriceThreshold {
                side: Side::Above,
                threshold: f64::NAN,
            },
            Rule::Custom {
                expression: "close >".into(),
            },
            Rule::All {
                rules: vec![Rule::Always, Rule::Custom { expression: "1".into() }],
            },
        ];
        for rule in bad {
            assert!(matches!(rule.compile(), Err(Error::Strategy(_))), "{rule:?}");
        }
    }
}
