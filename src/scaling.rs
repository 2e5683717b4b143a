//! Linear value scaling
//!
//! Maps raw graph metrics (degree, distance, weight, pagerank) onto a display range
//! such as node size or edge width. A [`LinearScaler`] is fitted to the observed
//! minimum and maximum of a batch and then applies `value * scale + offset`.

use crate::{NetvizError, Result};

/// Coefficients produced by the most recent [`LinearScaler::fit`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coefficients {
    /// Smallest value of the fitted batch
    pub source_low: f64,
    /// Largest value of the fitted batch
    pub source_high: f64,
    /// Low end of the target range
    pub target_low: f64,
    /// High end of the target range
    pub target_high: f64,
    /// Multiplier applied to every input
    pub scale: f64,
    /// Constant added after scaling
    pub offset: f64,
    affine: bool,
}

impl Coefficients {
    fn from_range(source_low: f64, source_high: f64, target_low: f64, target_high: f64) -> Self {
        // A constant batch collapses onto the low end of the target range.
        let scale = if source_high == source_low {
            0.0
        } else {
            (target_high - target_low) / (source_high - source_low)
        };
        let offset = target_low - source_low * scale;

        // Spans that overflow, or scales that overflow or go subnormal, lose the
        // endpoints under `value * scale + offset`.
        let span = source_high - source_low;
        let affine = span.is_finite()
            && scale.is_finite()
            && offset.is_finite()
            && (scale == 0.0 || scale.is_normal());

        Self {
            source_low,
            source_high,
            target_low,
            target_high,
            scale,
            offset,
            affine,
        }
    }

    /// Whether [`apply`](Self::apply) is exactly `value * scale + offset`.
    ///
    /// When false the coefficients cannot be represented reliably as `f64`, and values
    /// are mapped through their fraction of the observed range instead.
    pub fn is_affine(&self) -> bool {
        self.affine
    }

    /// Position of `value` within the observed range, 0 at the low end and 1 at the high end
    fn fraction(&self, value: f64) -> f64 {
        let span = self.source_high - self.source_low;
        if span.is_finite() {
            (value - self.source_low) / span
        } else {
            (value / 2.0 - self.source_low / 2.0)
                / (self.source_high / 2.0 - self.source_low / 2.0)
        }
    }

    /// Apply the coefficients to a single value
    pub fn apply(&self, value: f64) -> f64 {
        if self.affine {
            return value * self.scale + self.offset;
        }

        let r = self.fraction(value);
        let half_target = self.target_high / 2.0 - self.target_low / 2.0;
        self.target_low + r * half_target + r * half_target
    }
}

/// Fits a linear map from an observed numeric range to a target range.
///
/// The scaler starts out unfitted. The first call to [`fit`](Self::fit) (or
/// [`fit_transform`](Self::fit_transform)) moves it to the fitted state; later fits
/// overwrite the coefficients. Descending target ranges are allowed and invert the
/// mapping.
///
/// # Examples
///
/// ```
/// use netviz::LinearScaler;
///
/// let mut scaler = LinearScaler::new(10.0, 35.0);
/// let sizes = scaler.fit_transform(&[0.0, 1.0, 4.0]).unwrap();
/// assert_eq!(sizes, vec![10.0, 16.25, 35.0]);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct LinearScaler {
    target_low: f64,
    target_high: f64,
    coefficients: Option<Coefficients>,
}

impl LinearScaler {
    /// Creates an unfitted scaler targeting `target_low..=target_high`.
    pub fn new(target_low: f64, target_high: f64) -> Self {
        Self {
            target_low,
            target_high,
            coefficients: None,
        }
    }

    /// The `(low, high)` range outputs are mapped into
    pub fn target_range(&self) -> (f64, f64) {
        (self.target_low, self.target_high)
    }

    /// The `(min, max)` of the last fitted batch, if any
    pub fn observed_range(&self) -> Option<(f64, f64)> {
        self.coefficients.map(|c| (c.source_low, c.source_high))
    }

    /// Coefficients of the last fit, if any
    pub fn coefficients(&self) -> Option<Coefficients> {
        self.coefficients
    }

    /// Whether [`fit`](Self::fit) has succeeded at least once
    pub fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }

    /// Computes the coefficients from the minimum and maximum of `values`.
    ///
    /// Fails with [`NetvizError::InvalidInput`] when the batch is empty or contains
    /// a non-finite value. On failure the previous coefficients are left untouched.
    pub fn fit(&mut self, values: &[f64]) -> Result<()> {
        let (low, high) = observed_bounds(values)?;
        let coefficients =
            Coefficients::from_range(low, high, self.target_low, self.target_high);

        log::trace!(
            "fitted [{}, {}] -> [{}, {}]: scale={}, offset={}",
            low,
            high,
            self.target_low,
            self.target_high,
            coefficients.scale,
            coefficients.offset
        );

        self.coefficients = Some(coefficients);
        Ok(())
    }

    /// Maps a single value with the fitted coefficients.
    pub fn apply(&self, value: f64) -> Result<f64> {
        self.coefficients
            .map(|c| c.apply(value))
            .ok_or(NetvizError::NotFitted)
    }

    /// Maps every value with the fitted coefficients, preserving order and length.
    pub fn transform(&self, values: &[f64]) -> Result<Vec<f64>> {
        let coefficients = self.coefficients.ok_or(NetvizError::NotFitted)?;
        Ok(values.iter().map(|&v| coefficients.apply(v)).collect())
    }

    /// Fits to `values` and transforms the same batch.
    pub fn fit_transform(&mut self, values: &[f64]) -> Result<Vec<f64>> {
        self.fit(values)?;
        self.transform(values)
    }
}

fn observed_bounds(values: &[f64]) -> Result<(f64, f64)> {
    if values.is_empty() {
        return Err(NetvizError::InvalidInput(
            "cannot fit a scaler to an empty batch".to_string(),
        ));
    }

    if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
        return Err(NetvizError::InvalidInput(format!(
            "cannot fit a scaler to a non-finite value ({})",
            bad
        )));
    }

    Ok(values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), &v| {
            (low.min(v), high.max(v))
        }))
}
