//! Node parameters and their validation.
//!
//! Parameters are immutable per node instance and supplied by the host
//! (typically deserialized from the daemon's graph file). Validation happens
//! once, before a node is activated; each rejection reason is a distinct
//! error variant so the host can report exactly what is wrong. Out-of-range
//! values are never self-corrected.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shortest permitted bounded window, in seconds.
pub const MIN_CONSIDERED_SPAN_SECS: f64 = 5.0;

/// Shortest permitted resample period, in seconds.
pub const MIN_RESAMPLE_PERIOD_SECS: f64 = 0.5;

/// Longest permitted window or resample period: 366 days.
pub const MAX_DURATION_SECS: f64 = 366.0 * 86_400.0;

/// Record-count cap bounds for the statistics store.
pub const MIN_WINDOW_ENTRIES: usize = 10;
pub const MAX_WINDOW_ENTRIES: usize = 2000;

/// Fan-in/fan-out bounds for the multi-port nodes.
pub const MIN_PORT_COUNT: usize = 2;
pub const MAX_PORT_COUNT: usize = 16;

/// Parameter rejection reasons.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("considered span of {got}s is below the {MIN_CONSIDERED_SPAN_SECS}s minimum (use 0 for an unlimited window)")]
    SpanTooShort { got: f64 },
    #[error("considered span of {got}s exceeds the 366-day maximum")]
    SpanTooLong { got: f64 },
    #[error("resample period of {got}s is below the {MIN_RESAMPLE_PERIOD_SECS}s minimum (use 0 to disable)")]
    PeriodTooShort { got: f64 },
    #[error("resample period of {got}s exceeds the 366-day maximum")]
    PeriodTooLong { got: f64 },
    #[error("resample period of {period}s exceeds half of the {span}s considered span")]
    PeriodExceedsHalfSpan { period: f64, span: f64 },
    #[error("entry cap of {got} is outside {MIN_WINDOW_ENTRIES}..={MAX_WINDOW_ENTRIES}")]
    EntryCapOutOfRange { got: usize },
    #[error("input resolution of {got} is not a finite value >= 0")]
    InvalidResolution { got: f64 },
    #[error("threshold of {got} is not a finite value >= 0")]
    InvalidThreshold { got: f64 },
    #[error("port count of {got} is outside {MIN_PORT_COUNT}..={MAX_PORT_COUNT}")]
    PortCountOutOfRange { got: usize },
}

/// Parameters of the windowed statistics node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsParams {
    /// Minimum meaningful difference between consecutive samples.
    #[serde(default = "default_input_resolution")]
    pub input_resolution: f64,

    /// Rolling window length in seconds; 0 means unbounded since last reset.
    #[serde(default = "default_considered_span")]
    pub considered_span_secs: f64,

    /// Maximum seconds without a recomputation; 0 disables periodic ticks.
    #[serde(default)]
    pub resample_period_secs: f64,

    /// Hard cap on retained interval records.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_input_resolution() -> f64 {
    1.0
}

fn default_considered_span() -> f64 {
    60.0
}

fn default_max_entries() -> usize {
    50
}

impl Default for StatisticsParams {
    fn default() -> Self {
        Self {
            input_resolution: default_input_resolution(),
            considered_span_secs: default_considered_span(),
            resample_period_secs: 0.0,
            max_entries: default_max_entries(),
        }
    }
}

impl StatisticsParams {
    /// True when the window covers all history since the last reset.
    pub fn unlimited_span(&self) -> bool {
        self.considered_span_secs == 0.0
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        if !self.input_resolution.is_finite() || self.input_resolution < 0.0 {
            return Err(ParamError::InvalidResolution {
                got: self.input_resolution,
            });
        }

        let span = self.considered_span_secs;
        if span != 0.0 && span < MIN_CONSIDERED_SPAN_SECS {
            return Err(ParamError::SpanTooShort { got: span });
        }
        if span > MAX_DURATION_SECS {
            return Err(ParamError::SpanTooLong { got: span });
        }

        let period = self.resample_period_secs;
        if period != 0.0 && period < MIN_RESAMPLE_PERIOD_SECS {
            return Err(ParamError::PeriodTooShort { got: period });
        }
        if period > MAX_DURATION_SECS {
            return Err(ParamError::PeriodTooLong { got: period });
        }
        if span != 0.0 && period > span / 2.0 {
            return Err(ParamError::PeriodExceedsHalfSpan { period, span });
        }

        if !(MIN_WINDOW_ENTRIES..=MAX_WINDOW_ENTRIES).contains(&self.max_entries) {
            return Err(ParamError::EntryCapOutOfRange {
                got: self.max_entries,
            });
        }

        Ok(())
    }
}

/// Parameters of the difference-threshold filter node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdFilterParams {
    /// A value passes only when it differs from the last forwarded value by
    /// more than this amount.
    #[serde(default)]
    pub threshold: f64,
}

impl Default for ThresholdFilterParams {
    fn default() -> Self {
        Self { threshold: 0.0 }
    }
}

impl ThresholdFilterParams {
    pub fn validate(&self) -> Result<(), ParamError> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(ParamError::InvalidThreshold {
                got: self.threshold,
            });
        }
        Ok(())
    }
}

/// Parameters of the multi-input aggregator node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupStatsParams {
    /// Number of value inputs (`in1`..`inN`).
    #[serde(default = "default_port_count")]
    pub inputs: usize,
}

impl Default for GroupStatsParams {
    fn default() -> Self {
        Self {
            inputs: default_port_count(),
        }
    }
}

impl GroupStatsParams {
    pub fn validate(&self) -> Result<(), ParamError> {
        validate_port_count(self.inputs)
    }
}

/// Parameters of the N-way input selector node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSelectorParams {
    /// Number of value inputs (`in1`..`inN`).
    #[serde(default = "default_port_count")]
    pub inputs: usize,

    /// Replay the remembered value of the newly selected input on a
    /// selection change.
    #[serde(default)]
    pub resend_on_select: bool,
}

impl Default for InputSelectorParams {
    fn default() -> Self {
        Self {
            inputs: default_port_count(),
            resend_on_select: false,
        }
    }
}

impl InputSelectorParams {
    pub fn validate(&self) -> Result<(), ParamError> {
        validate_port_count(self.inputs)
    }
}

/// Parameters of the N-way output selector node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSelectorParams {
    /// Number of value outputs (`out1`..`outN`).
    #[serde(default = "default_port_count")]
    pub outputs: usize,

    /// Replay the remembered value to the newly selected output on a
    /// selection change.
    #[serde(default)]
    pub resend_on_select: bool,
}

impl Default for OutputSelectorParams {
    fn default() -> Self {
        Self {
            outputs: default_port_count(),
            resend_on_select: false,
        }
    }
}

impl OutputSelectorParams {
    pub fn validate(&self) -> Result<(), ParamError> {
        validate_port_count(self.outputs)
    }
}

fn default_port_count() -> usize {
    2
}

fn validate_port_count(count: usize) -> Result<(), ParamError> {
    if !(MIN_PORT_COUNT..=MAX_PORT_COUNT).contains(&count) {
        return Err(ParamError::PortCountOutOfRange { got: count });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(StatisticsParams::default().validate(), Ok(()));
        assert_eq!(ThresholdFilterParams::default().validate(), Ok(()));
        assert_eq!(GroupStatsParams::default().validate(), Ok(()));
        assert_eq!(InputSelectorParams::default().validate(), Ok(()));
        assert_eq!(OutputSelectorParams::default().validate(), Ok(()));
    }

    #[test]
    fn test_span_bounds() {
        let mut params = StatisticsParams::default();
        params.considered_span_secs = 4.9;
        assert_eq!(
            params.validate(),
            Err(ParamError::SpanTooShort { got: 4.9 })
        );

        // Zero means unlimited, not "too short".
        params.considered_span_secs = 0.0;
        assert_eq!(params.validate(), Ok(()));

        params.considered_span_secs = 367.0 * 86_400.0;
        assert!(matches!(
            params.validate(),
            Err(ParamError::SpanTooLong { .. })
        ));
    }

    #[test]
    fn test_period_bounds() {
        let mut params = StatisticsParams::default();
        params.resample_period_secs = 0.4;
        assert_eq!(
            params.validate(),
            Err(ParamError::PeriodTooShort { got: 0.4 })
        );

        // 60s span allows at most a 30s period.
        params.resample_period_secs = 31.0;
        assert_eq!(
            params.validate(),
            Err(ParamError::PeriodExceedsHalfSpan {
                period: 31.0,
                span: 60.0
            })
        );

        // Unlimited span places no upper bound on the period.
        params.considered_span_secs = 0.0;
        params.resample_period_secs = 3600.0;
        assert_eq!(params.validate(), Ok(()));
    }

    #[test]
    fn test_entry_cap_bounds() {
        let mut params = StatisticsParams::default();
        params.max_entries = 9;
        assert_eq!(
            params.validate(),
            Err(ParamError::EntryCapOutOfRange { got: 9 })
        );
        params.max_entries = 2001;
        assert_eq!(
            params.validate(),
            Err(ParamError::EntryCapOutOfRange { got: 2001 })
        );
        params.max_entries = 2000;
        assert_eq!(params.validate(), Ok(()));
    }

    #[test]
    fn test_resolution_must_be_finite_and_non_negative() {
        let mut params = StatisticsParams::default();
        params.input_resolution = -0.5;
        assert!(matches!(
            params.validate(),
            Err(ParamError::InvalidResolution { .. })
        ));
        params.input_resolution = f64::NAN;
        assert!(matches!(
            params.validate(),
            Err(ParamError::InvalidResolution { .. })
        ));
    }

    #[test]
    fn test_port_count_bounds() {
        let params = GroupStatsParams { inputs: 17 };
        assert_eq!(
            params.validate(),
            Err(ParamError::PortCountOutOfRange { got: 17 })
        );
        let params = InputSelectorParams {
            inputs: 1,
            resend_on_select: false,
        };
        assert_eq!(
            params.validate(),
            Err(ParamError::PortCountOutOfRange { got: 1 })
        );
    }
}
