use common::{Error, Result};

/// Fractional price change across the last `lookback` bars:
/// `(last - first) / first` where `first` is `lookback` bars before `last`.
pub fn momentum(closes: &[f64], lookback: usize) -> Result<f64> {
    if lookback == 0 {
        return Err(Error::InvalidData("momentum lookback must be >= 1".to_string()));
    }
    if closes.len() < lookback + 1 {
        return Err(Error::InsufficientData {
            required: lookback + 1,
            actual: closes.len(),
        });
    }

    let last = closes[closes.len() - 1];
    let first = closes[closes.len() - 1 - lookback];
    if !first.is_finite() || !last.is_finite() {
        return Err(Error::InvalidData("non-finite close price".to_string()));
    }
    if first == 0.0 {
        return Err(Error::InvalidData("zero base price".to_string()));
    }

    Ok((last - first) / first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_series_has_zero_momentum() {
        assert_eq!(momentum(&[42.0; 10], 5).unwrap(), 0.0);
    }

    #[test]
    fn measures_change_over_lookback_only() {
        // first of window is 100 (index 2), last is 110
        let closes = [50.0, 80.0, 100.0, 105.0, 110.0];
        let value = momentum(&closes, 2).unwrap();
        assert!((value - 0.10).abs() < 1e-12);
    }

    #[test]
    fn negative_move_is_negative() {
        let value = momentum(&[100.0, 90.0], 1).unwrap();
        assert!((value + 0.10).abs() < 1e-12);
    }

    #[test]
    fn short_series_is_insufficient() {
        assert!(matches!(
            momentum(&[1.0, 2.0], 2),
            Err(Error::InsufficientData { required: 3, actual: 2 })
        ));
    }

    #[test]
    fn zero_base_price_is_invalid() {
        assert!(matches!(
            momentum(&[0.0, 1.0, 2.0], 2),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn zero_lookback_is_invalid() {
        assert!(matches!(momentum(&[1.0, 2.0], 0), Err(Error::InvalidData(_))));
    }
}
