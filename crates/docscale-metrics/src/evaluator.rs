//! Aggregation of metric datapoints into a single decision value.

use docscale_core::{MetricSample, ScaleError, ScaleResult};

/// Pure aggregation over metric samples.
pub struct MetricEvaluator;

impl MetricEvaluator {
    /// Arithmetic mean. Fails on an empty input instead of dividing by zero.
    pub fn mean(values: &[f64]) -> ScaleResult<f64> {
        if values.is_empty() {
            return Err(ScaleError::EmptySamples);
        }
        Ok(values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Mean of the sample values, ignoring timestamps.
    pub fn mean_of(samples: &[MetricSample]) -> ScaleResult<f64> {
        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        Self::mean(&values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_three_values() {
        assert_eq!(MetricEvaluator::mean(&[10.0, 20.0, 30.0]).unwrap(), 20.0);
    }

    #[test]
    fn mean_of_single_value() {
        assert_eq!(MetricEvaluator::mean(&[42.5]).unwrap(), 42.5);
    }

    #[test]
    fn mean_of_empty_fails() {
        assert!(matches!(
            MetricEvaluator::mean(&[]),
            Err(ScaleError::EmptySamples)
        ));
        assert!(matches!(
            MetricEvaluator::mean_of(&[]),
            Err(ScaleError::EmptySamples)
        ));
    }

    #[test]
    fn mean_of_samples_ignores_timestamps() {
        let samples = [
            MetricSample {
                timestamp_ms: 3_000,
                value: 4.0,
            },
            MetricSample {
                timestamp_ms: 1_000,
                value: 6.0,
            },
        ];
        assert_eq!(MetricEvaluator::mean_of(&samples).unwrap(), 5.0);
    }
}
