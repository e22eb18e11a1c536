//! Numeric utilities shared by the dataset and the readout.
use itertools::izip;

/// Returns the centered moving average of the values over a window of the given width.
/// The output has the same length as the input and the input is implicitly zero-padded at both
/// edges, so the first and last bins are biased toward zero.
/// The window for output `i` covers inputs `i + (w-1)/2 - (w-1) ..= i + (w-1)/2`.
pub fn same_moving_average(values: &[f64], width: usize) -> Vec<f64> {
    if width == 0 {
        return vec![f64::NAN; values.len()];
    }
    let lead = (width - 1) / 2;
    let lag = width - 1 - lead;
    let len = values.len();

    (0..len)
        .map(|i| {
            let start = i.saturating_sub(lag);
            let end = (i + lead + 1).min(len);
            values[start..end].iter().sum::<f64>() / width as f64
        })
        .collect()
}

/// Returns the arithmetic mean of the values, or NaN if there is none.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Returns the population variance of the values (NaN if there is none).
pub fn variance(values: &[f64]) -> f64 {
    let m = mean(values);
    mean(&values.iter().map(|v| (v - m).powi(2)).collect::<Vec<f64>>())
}

/// Returns the mean of the values, skipping NaN entries.
/// Returns NaN if every value is NaN (or if there is none).
pub fn nan_mean<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let (sum, count) = values
        .into_iter()
        .filter(|value| !value.is_nan())
        .fold((0.0, 0_usize), |(sum, count), value| (sum + value, count + 1));
    match count {
        0 => f64::NAN,
        _ => sum / count as f64,
    }
}

/// Returns the Pearson correlation coefficient between two series of equal length.
/// The coefficient is NaN if one of the series has zero variance or if the series are too short.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return f64::NAN;
    }
    let (mean_x, mean_y) = (mean(x), mean(y));
    let (sxy, sxx, syy) = izip!(x, y).fold((0.0, 0.0, 0.0), |(sxy, sxx, syy), (a, b)| {
        let (dx, dy) = (a - mean_x, b - mean_y);
        (sxy + dx * dy, sxx + dx * dx, syy + dy * dy)
    });
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    sxy / (sxx * syy).sqrt()
}

/// The logistic sigmoid.
pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Returns the position of the first maximum value, or None for an empty sequence.
/// NaN values are never selected.
pub fn argmax<I: IntoIterator<Item = f64>>(values: I) -> Option<usize> {
    values
        .into_iter()
        .enumerate()
        .fold(None, |acc: Option<(usize, f64)>, (i, value)| match acc {
            Some((_, best)) if !(value > best) => acc,
            _ if value.is_nan() => acc,
            _ => Some((i, value)),
        })
        .map(|(i, _)| i)
}
