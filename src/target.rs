//! Target encodings of a continuous signal for the readout.
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::ReadoutError;

/// The way a scalar signal sample is encoded over the readout output units.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// One-hot code: only the unit of the sample level is set.
    Categorical,
    /// Cumulative code: all units below the sample level are set.
    #[serde(alias = "full")]
    Thermometer,
}

impl Encoding {
    /// Returns the encoding from a string.
    pub fn from_str(s: &str) -> Result<Self, ReadoutError> {
        match s {
            "categorical" => Ok(Encoding::Categorical),
            "thermometer" | "full" => Ok(Encoding::Thermometer),
            _ => Err(ReadoutError::UnsupportedMode(format!(
                "unknown encoding {:?}, must be one of: categorical, thermometer",
                s
            ))),
        }
    }
}

/// The integer-rounded range of a signal, used to scale it over the output units.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct TargetRange {
    pub min: f64,
    pub max: f64,
}

impl TargetRange {
    /// Returns the range `[floor(min), ceil(max)]` of the signal.
    /// Returns an error if the signal is empty or if the range is degenerate.
    pub fn of(signal: &[f64]) -> Result<Self, ReadoutError> {
        if signal.is_empty() {
            return Err(ReadoutError::InvalidShape(
                "cannot encode an empty signal".to_string(),
            ));
        }
        let (min, max) = signal
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &s| {
                (min.min(s), max.max(s))
            });
        TargetRange::new(min.floor(), max.ceil())
    }

    /// Returns a range with the given bounds.
    /// Returns an error if the range is degenerate.
    pub fn new(min: f64, max: f64) -> Result<Self, ReadoutError> {
        // An all-NaN signal ends up with infinite bounds
        if !(min < max) || !min.is_finite() || !max.is_finite() {
            return Err(ReadoutError::DegenerateRange { min, max });
        }
        Ok(TargetRange { min, max })
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    /// Scale a sample to `[0, 1]` (for samples inside the range).
    pub fn normalize(&self, sample: f64) -> f64 {
        (sample - self.min) / self.width()
    }
}

/// Encode the signal over `output_size` units, scaling it with its own range.
/// For a single unit, the target is the signal linearly rescaled to `[0, 1]`.
pub fn generate_target(
    signal: &[f64],
    output_size: usize,
    encoding: Encoding,
) -> Result<DMatrix<f64>, ReadoutError> {
    let range = TargetRange::of(signal)?;
    encode(signal, range, output_size, encoding, false)
}

/// Encode the signal over `output_size` units, scaling it with the provided range.
/// Samples outside the range are clamped to the first or last level.
pub fn generate_target_in_range(
    signal: &[f64],
    range: TargetRange,
    output_size: usize,
    encoding: Encoding,
) -> Result<DMatrix<f64>, ReadoutError> {
    encode(signal, range, output_size, encoding, true)
}

fn encode(
    signal: &[f64],
    range: TargetRange,
    output_size: usize,
    encoding: Encoding,
    clamp: bool,
) -> Result<DMatrix<f64>, ReadoutError> {
    if output_size == 0 {
        return Err(ReadoutError::InvalidParameter(
            "The output size must be positive".to_string(),
        ));
    }

    if output_size == 1 {
        let target = DVector::from_iterator(
            signal.len(),
            signal.iter().map(|&s| match clamp {
                true => range.normalize(s).clamp(0.0, 1.0),
                false => range.normalize(s),
            }),
        );
        return Ok(DMatrix::from_columns(&[target]));
    }

    let top = (output_size - 1) as f64;
    let mut target = DMatrix::zeros(signal.len(), output_size);
    for (i, &s) in signal.iter().enumerate() {
        let mut scaled = range.normalize(s) * top;
        if clamp {
            scaled = scaled.clamp(0.0, top);
        }
        let level = scaled.floor() as usize;
        match encoding {
            Encoding::Categorical => target[(i, level)] = 1.0,
            Encoding::Thermometer => (0..level).for_each(|unit| target[(i, unit)] = 1.0),
        }
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp(len: usize) -> Vec<f64> {
        (0..len).map(|i| i as f64 / (len - 1) as f64 * 3.0).collect()
    }

    #[test]
    fn test_encoding_from_str() {
        assert_eq!(Encoding::from_str("categorical"), Ok(Encoding::Categorical));
        assert_eq!(Encoding::from_str("thermometer"), Ok(Encoding::Thermometer));
        assert_eq!(Encoding::from_str("full"), Ok(Encoding::Thermometer));
        assert!(matches!(
            Encoding::from_str("binary"),
            Err(ReadoutError::UnsupportedMode(_))
        ));
    }

    #[test]
    fn test_encoding_serde() {
        let encoding: Encoding = serde_json::from_str("\"full\"").unwrap();
        assert_eq!(encoding, Encoding::Thermometer);
        assert_eq!(
            serde_json::to_string(&Encoding::Categorical).unwrap(),
            "\"categorical\""
        );
    }

    #[test]
    fn test_target_range() {
        let range = TargetRange::of(&[-0.5, 0.2, 1.3]).unwrap();
        assert_eq!(range, TargetRange { min: -1.0, max: 2.0 });

        assert_eq!(
            TargetRange::of(&[2.0, 2.0, 2.0]),
            Err(ReadoutError::DegenerateRange { min: 2.0, max: 2.0 })
        );
        assert!(matches!(
            TargetRange::of(&[]),
            Err(ReadoutError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_single_output() {
        let signal = [-0.5, 0.0, 0.5, 1.0];
        let target = generate_target(&signal, 1, Encoding::Categorical).unwrap();
        assert_eq!(target.shape(), (4, 1));
        assert_relative_eq!(target[(0, 0)], 0.25);
        assert_relative_eq!(target[(3, 0)], 1.0);
        assert!(target.iter().all(|&t| (0.0..=1.0).contains(&t)));
    }

    #[test]
    fn test_categorical_is_one_hot() {
        let signal = ramp(50);
        let target = generate_target(&signal, 8, Encoding::Categorical).unwrap();
        assert_eq!(target.shape(), (50, 8));
        for row in target.row_iter() {
            assert_eq!(row.iter().filter(|&&t| t == 1.0).count(), 1);
            assert_eq!(row.iter().filter(|&&t| t == 0.0).count(), 7);
        }
        // Extremes of the range land on the first and last units
        assert_eq!(target[(0, 0)], 1.0);
        assert_eq!(target[(49, 7)], 1.0);
    }

    #[test]
    fn test_thermometer_is_prefix() {
        let signal = ramp(50);
        let target = generate_target(&signal, 8, Encoding::Thermometer).unwrap();
        for row in target.row_iter() {
            let ones = row.iter().take_while(|&&t| t == 1.0).count();
            assert!(row.iter().skip(ones).all(|&t| t == 0.0));
        }
        assert!(target.row(0).iter().all(|&t| t == 0.0));
        assert_eq!(target.row(49).iter().sum::<f64>(), 7.0);
    }

    #[test]
    fn test_levels() {
        // Range [0, 4] over 5 units: one level per integer
        let signal = [0.0, 1.5, 2.0, 4.0];
        let categorical = generate_target(&signal, 5, Encoding::Categorical).unwrap();
        assert_eq!(categorical[(1, 1)], 1.0);
        assert_eq!(categorical[(2, 2)], 1.0);
        let thermometer = generate_target(&signal, 5, Encoding::Thermometer).unwrap();
        assert_eq!(thermometer.row(1).iter().sum::<f64>(), 1.0);
        assert_eq!(thermometer.row(3).iter().sum::<f64>(), 4.0);
    }

    #[test]
    fn test_degenerate_signal() {
        assert_eq!(
            generate_target(&[3.0; 10], 8, Encoding::Categorical),
            Err(ReadoutError::DegenerateRange { min: 3.0, max: 3.0 })
        );
    }

    #[test]
    fn test_invalid_output_size() {
        assert!(matches!(
            generate_target(&ramp(10), 0, Encoding::Categorical),
            Err(ReadoutError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_in_range_clamps() {
        let range = TargetRange::new(0.0, 1.0).unwrap();
        let signal = [-1.0, 0.5, 2.0];
        let target = generate_target_in_range(&signal, range, 4, Encoding::Categorical).unwrap();
        assert_eq!(target[(0, 0)], 1.0);
        assert_eq!(target[(1, 1)], 1.0);
        assert_eq!(target[(2, 3)], 1.0);

        let target = generate_target_in_range(&signal, range, 1, Encoding::Categorical).unwrap();
        assert_eq!(target.column(0).iter().copied().collect::<Vec<_>>(), vec![0.0, 0.5, 1.0]);
    }
}
