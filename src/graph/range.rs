//! Per-type weight bucketing for aggregate weight distributions

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

/// Default number of histogram bands
pub const DEFAULT_BANDS: usize = 10;

/// Weight ranges keyed by node type
pub type WeightRanges = BTreeMap<String, QuantizedRange>;

/// Min/max tracking range split into a fixed number of equal-width bands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizedRange {
    min: Option<f64>,
    max: Option<f64>,
    bands: usize,
}

impl QuantizedRange {
    /// Create an empty range with the given band count (at least one)
    pub fn new(bands: usize) -> Self {
        Self {
            min: None,
            max: None,
            bands: bands.max(1),
        }
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_none()
    }

    /// Grow the range to include `weight`. Non-finite weights are ignored.
    pub fn expand(&mut self, weight: f64) {
        if !weight.is_finite() {
            return;
        }
        self.min = Some(self.min.map_or(weight, |min| min.min(weight)));
        self.max = Some(self.max.map_or(weight, |max| max.max(weight)));
    }

    /// Band index for `weight`, clamped to `0..bands`
    pub fn band_index(&self, weight: f64) -> usize {
        let (min, max) = match (self.min, self.max) {
            (Some(min), Some(max)) => (min, max),
            _ => return 0,
        };

        let span = max - min;
        if span <= 0.0 || !weight.is_finite() {
            return 0;
        }

        let position = ((weight - min) / span * self.bands as f64).floor();
        if position <= 0.0 {
            0
        } else {
            (position as usize).min(self.bands - 1)
        }
    }

    /// Histogram of `weights` over this range's bands
    pub fn histogram<I: IntoIterator<Item = f64>>(&self, weights: I) -> Vec<u32> {
        let mut counts = vec![0; self.bands];
        for weight in weights {
            counts[self.band_index(weight)] += 1;
        }
        counts
    }
}

impl Default for QuantizedRange {
    fn default() -> Self {
        Self::new(DEFAULT_BANDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_index_spans_range() {
        let mut range = QuantizedRange::new(4);
        range.expand(0.0);
        range.expand(8.0);

        assert_eq!(range.band_index(0.0), 0);
        assert_eq!(range.band_index(1.9), 0);
        assert_eq!(range.band_index(2.0), 1);
        assert_eq!(range.band_index(7.9), 3);
        // the maximum lands in the last band, not past it
        assert_eq!(range.band_index(8.0), 3);
        assert_eq!(range.band_index(100.0), 3);
        assert_eq!(range.band_index(-5.0), 0);
    }

    #[test]
    fn test_degenerate_range() {
        let mut range = QuantizedRange::new(5);
        assert_eq!(range.band_index(3.0), 0);

        range.expand(3.0);
        assert_eq!(range.min(), Some(3.0));
        assert_eq!(range.band_index(3.0), 0);

        range.expand(f64::NAN);
        assert_eq!(range.max(), Some(3.0));
    }

    #[test]
    fn test_histogram_counts_every_weight() {
        let mut range = QuantizedRange::new(3);
        range.expand(1.0);
        range.expand(3.0);

        let counts = range.histogram([1.0, 2.0, 3.0, 3.0]);
        assert_eq!(counts, vec![1, 1, 2]);
    }
}
