use serde::{Deserialize, Serialize};

use common::{Error, Result};

/// Composite-score parameters.
///
/// Every field has a default, so the file may list only overrides.
/// Example `config/scoring.toml`:
/// ```toml
/// momentum_weight = 0.5
/// rsi_weight = 0.3
/// volume_weight = 0.2
/// momentum_cap = 0.10
/// volume_ceiling = 5.0
/// min_score = 0.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringConfig {
    pub momentum_weight: f64,
    pub rsi_weight: f64,
    pub volume_weight: f64,
    /// Momentum magnitude that maps to a normalized score of ±1.
    pub momentum_cap: f64,
    /// Upper clamp for the volume factor; also the point that maps to +1.
    pub volume_ceiling: f64,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    /// Number of bars the momentum is measured across.
    pub momentum_lookback: usize,
    /// Number of trailing bars averaged for the volume factor.
    pub volume_lookback: usize,
    /// Bars requested from the data provider per ticker.
    pub history_bars: usize,
    /// Scored tickers below this are left out of the ranked list.
    pub min_score: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            momentum_weight: 0.5,
            rsi_weight: 0.3,
            volume_weight: 0.2,
            momentum_cap: 0.10,
            volume_ceiling: crate::indicators::DEFAULT_VOLUME_CEILING,
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            momentum_lookback: 7,
            volume_lookback: 20,
            history_bars: 40,
            min_score: 0.0,
        }
    }
}

impl ScoringConfig {
    /// Load from a TOML file and validate.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("scoring config at '{path}': {e}")))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Smallest series length every indicator can work with.
    pub fn required_bars(&self) -> usize {
        (self.rsi_period + 1)
            .max(self.momentum_lookback + 1)
            .max(self.volume_lookback + 1)
    }

    pub fn validate(&self) -> Result<()> {
        let weights = [self.momentum_weight, self.rsi_weight, self.volume_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::Config("weights must be finite and non-negative".to_string()));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(Error::Config("at least one weight must be positive".to_string()));
        }
        if !(self.momentum_cap.is_finite() && self.momentum_cap > 0.0) {
            return Err(Error::Config("momentum_cap must be positive".to_string()));
        }
        if !(self.volume_ceiling.is_finite() && self.volume_ceiling > 1.0) {
            return Err(Error::Config("volume_ceiling must be greater than 1".to_string()));
        }
        if self.rsi_period < 2 {
            return Err(Error::Config("rsi_period must be >= 2".to_string()));
        }
        if !(0.0..=100.0).contains(&self.rsi_oversold)
            || !(0.0..=100.0).contains(&self.rsi_overbought)
            || self.rsi_oversold >= self.rsi_overbought
        {
            return Err(Error::Config(
                "RSI thresholds must satisfy 0 <= oversold < overbought <= 100".to_string(),
            ));
        }
        if self.momentum_lookback == 0 || self.volume_lookback == 0 {
            return Err(Error::Config("lookbacks must be >= 1".to_string()));
        }
        if self.history_bars < self.required_bars() {
            return Err(Error::Config(format!(
                "history_bars must be at least {}",
                self.required_bars()
            )));
        }
        if !self.min_score.is_finite() {
            return Err(Error::Config("min_score must be finite".to_string()));
        }
        Ok(())
    }
}
