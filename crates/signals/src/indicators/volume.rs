use common::{Error, Result};

pub const DEFAULT_VOLUME_CEILING: f64 = 5.0;

/// Ratio of the latest volume to the mean of the `lookback` volumes before it,
/// clamped to `[0, ceiling]`.
pub fn volume_factor(volumes: &[u64], lookback: usize, ceiling: f64) -> Result<f64> {
    if lookback == 0 {
        return Err(Error::InvalidData("volume lookback must be >= 1".to_string()));
    }
    if volumes.len() < lookback + 1 {
        return Err(Error::InsufficientData {
            required: lookback + 1,
            actual: volumes.len(),
        });
    }

    let latest = volumes[volumes.len() - 1] as f64;
    let trailing = &volumes[volumes.len() - 1 - lookback..volumes.len() - 1];
    let average = trailing.iter().map(|&v| v as f64).sum::<f64>() / lookback as f64;

    if average == 0.0 {
        return Ok(if latest == 0.0 { 1.0 } else { ceiling });
    }

    Ok((latest / average).clamp(0.0, ceiling))
}
