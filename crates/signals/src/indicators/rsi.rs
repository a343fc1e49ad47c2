use common::{Error, Result};

/// RSI (Relative Strength Index) indicator.
///
/// Uses Wilder's smoothed moving average (same as TradingView / standard RSI).
/// Needs at least `period + 1` closing prices.
#[derive(Debug, Clone)]
pub struct RsiIndicator {
    pub period: usize,
    pub overbought: f64,
    pub oversold: f64,
}

impl Default for RsiIndicator {
    fn default() -> Self {
        Self::new(14, 70.0, 30.0)
    }
}

impl RsiIndicator {
    pub fn new(period: usize, overbought: f64, oversold: f64) -> Self {
        assert!(period >= 2, "RSI period must be >= 2");
        Self { period, overbought, oversold }
    }

    /// Compute RSI from a slice of close prices (oldest first).
    pub fn compute(&self, closes: &[f64]) -> Result<f64> {
        if closes.len() < self.period + 1 {
            return Err(Error::InsufficientData {
                required: self.period + 1,
                actual: closes.len(),
            });
        }
        if closes.iter().any(|c| !c.is_finite()) {
            return Err(Error::InvalidData("non-finite close price".to_string()));
        }

        // First average gain/loss over the initial `period` changes
        let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
        let initial = &changes[..self.period];

        let mut avg_gain = initial.iter().filter(|&&c| c > 0.0).sum::<f64>() / self.period as f64;
        let mut avg_loss = initial.iter().filter(|&&c| c < 0.0).map(|c| c.abs()).sum::<f64>()
            / self.period as f64;

        // Wilder smoothing over remaining changes
        for &change in &changes[self.period..] {
            let gain = if change > 0.0 { change } else { 0.0 };
            let loss = if change < 0.0 { change.abs() } else { 0.0 };
            avg_gain = (avg_gain * (self.period - 1) as f64 + gain) / self.period as f64;
            avg_loss = (avg_loss * (self.period - 1) as f64 + loss) / self.period as f64;
        }

        if avg_loss == 0.0 {
            return Ok(100.0);
        }

        let rs = avg_gain / avg_loss;
        let rsi = 100.0 - 100.0 / (1.0 + rs);
        if !rsi.is_finite() {
            return Err(Error::InvalidData(format!("RSI evaluated to {rsi}")));
        }
        Ok(rsi.clamp(0.0, 100.0))
    }

    pub fn is_overbought(&self, rsi: f64) -> bool {
        rsi > self.overbought
    }

    pub fn is_oversold(&self, rsi: f64) -> bool {
        rsi < self.oversold
    }
}
