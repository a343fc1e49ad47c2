//! Composite momentum score.
//!
//! Each component is mapped onto `[-1, 1]` before weighting so the weights in
//! `ScoringConfig` are directly comparable:
//!
//! - momentum: `clamp(momentum / momentum_cap, -1, 1)`
//! - RSI: `(rsi - 50) / 50`
//! - volume factor: `(vf - 1) / (ceiling - 1)` above average, `vf - 1` below
//!
//! The mapping depends only on the config, so scores from different refresh
//! cycles are comparable.

use common::{change_pct, Error, PriceBar, Result, SignalComponents, SignalDetail};

use crate::config::ScoringConfig;
use crate::indicators::{momentum, volume_factor, RsiIndicator};

pub fn normalize_momentum(momentum: f64, cap: f64) -> f64 {
    (momentum / cap).clamp(-1.0, 1.0)
}

pub fn normalize_rsi(rsi: f64) -> f64 {
    ((rsi - 50.0) / 50.0).clamp(-1.0, 1.0)
}

pub fn normalize_volume(factor: f64, ceiling: f64) -> f64 {
    if factor >= 1.0 {
        ((factor - 1.0) / (ceiling - 1.0)).min(1.0)
    } else {
        (factor - 1.0).max(-1.0)
    }
}

/// Indicator values and composite score for one ticker's bars.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
    pub score: f64,
    pub components: SignalComponents,
    pub detail: SignalDetail,
}

/// Stateless scorer built from a validated `ScoringConfig`.
#[derive(Debug, Clone)]
pub struct Scorer {
    config: ScoringConfig,
    rsi: RsiIndicator,
}

impl Scorer {
    pub fn new(config: ScoringConfig) -> Result<Self> {
        config.validate()?;
        let rsi = RsiIndicator::new(config.rsi_period, config.rsi_overbought, config.rsi_oversold);
        Ok(Self { config, rsi })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn composite(&self, components: &SignalComponents) -> f64 {
        let c = &self.config;
        c.momentum_weight * normalize_momentum(components.momentum, c.momentum_cap)
            + c.rsi_weight * normalize_rsi(components.rsi)
            + c.volume_weight * normalize_volume(components.volume_factor, c.volume_ceiling)
    }

    /// Score a bar series (oldest first). Fails on short, unordered, or
    /// non-finite input; never returns a non-finite score.
    pub fn score(&self, bars: &[PriceBar]) -> Result<Scored> {
        validate_series(bars)?;

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();

        let components = SignalComponents {
            momentum: momentum(&closes, self.config.momentum_lookback)?,
            rsi: self.rsi.compute(&closes)?,
            volume_factor: volume_factor(
                &volumes,
                self.config.volume_lookback,
                self.config.volume_ceiling,
            )?,
        };
        if !(components.momentum.is_finite()
            && components.rsi.is_finite()
            && components.volume_factor.is_finite())
        {
            return Err(Error::InvalidData("non-finite indicator value".to_string()));
        }

        let score = self.composite(&components);
        if !score.is_finite() {
            return Err(Error::InvalidData(format!("composite score evaluated to {score}")));
        }

        Ok(Scored {
            score,
            components,
            detail: self.detail(bars, &components),
        })
    }

    fn detail(&self, bars: &[PriceBar], components: &SignalComponents) -> SignalDetail {
        let last = &bars[bars.len() - 1];
        let previous_close = bars
            .len()
            .checked_sub(2)
            .map(|i| bars[i].close)
            .unwrap_or(last.close);
        let recent_high = bars.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let recent_low = bars.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        let change = change_pct(previous_close, last.close);

        SignalDetail {
            last_close: last.close,
            previous_close,
            recent_high,
            recent_low,
            last_volume: last.volume,
            projected_target: last.close * (1.0 + change.max(2.0) / 100.0 * 0.7),
            reason: self.reason(change, components.volume_factor, components.rsi),
        }
    }

    /// `change` is the last bar's percent move, the same figure chat replies show.
    fn reason(&self, change: f64, volume_factor: f64, rsi: f64) -> String {
        let mut parts = Vec::with_capacity(3);
        parts.push(if change > 3.0 {
            "strong breakout"
        } else if change > 1.5 {
            "steady bullish move"
        } else {
            "early momentum build-up"
        });

        if volume_factor > 2.0 {
            parts.push("unusual volume inflow");
        } else if volume_factor > 1.2 {
            parts.push("volume above average");
        }

        if self.rsi.is_oversold(rsi) {
            parts.push("oversold reversal potential");
        } else if self.rsi.is_overbought(rsi) {
            parts.push("overbought strength");
        }

        parts.join(", ")
    }
}

fn validate_series(bars: &[PriceBar]) -> Result<()> {
    if bars.is_empty() {
        return Err(Error::InsufficientData { required: 1, actual: 0 });
    }
    if let Some(w) = bars.windows(2).find(|w| w[1].timestamp <= w[0].timestamp) {
        return Err(Error::InvalidData(format!(
            "bar timestamps not strictly increasing at {}",
            w[1].timestamp
        )));
    }
    if bars
        .iter()
        .any(|b| !(b.open.is_finite() && b.high.is_finite() && b.low.is_finite() && b.close.is_finite()))
    {
        return Err(Error::InvalidData("non-finite price in bar".to_string()));
    }
    Ok(())
}
