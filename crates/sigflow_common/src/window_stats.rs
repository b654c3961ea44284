//! Time-windowed statistics over an irregularly sampled scalar signal.
//!
//! Maintains a sliding time window of interval records under a hard record
//! cap and derives a time-weighted average, minimum, maximum, net change and
//! short-term trend from it. Samples may arrive at arbitrary intervals over
//! spans from seconds to a year; the window is re-sampled (compressed) when
//! it would exceed the cap, and old records are folded into an interpolated
//! boundary record instead of being dropped outright, so the weighted
//! average over the considered span stays exact.
//!
//! Every update is a synchronous recomputation from the current store. If a
//! cycle is missed the next one produces the correct state again, so there
//! is nothing to retry.

use std::collections::VecDeque;

use tracing::debug;

/// Numerical slack absorbing float round-off in resolution comparisons.
const RESOLUTION_SLACK: f64 = 1e-15;

/// Maximum number of consecutive deltas the trend classifier inspects.
const TREND_WINDOW_DELTAS: usize = 5;

/// One retained interval of the sampled signal.
///
/// `representative_value` is the value used when integrating over the
/// interval that ends at `end_time`. It is normally the midpoint between
/// this sample and the previous one, which makes piecewise-constant
/// integration equivalent to linear interpolation between the raw samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalRecord {
    /// Timestamp at which this record's interval ends, in seconds.
    /// Strictly increasing across the store.
    pub end_time: f64,
    /// Value to integrate with over the interval ending at `end_time`.
    pub representative_value: f64,
    /// Raw input value observed at `end_time`.
    pub sample_value: f64,
}

/// Derived outputs of the engine. Each statistic is `None` until first
/// computed; `count` is always the current number of retained records.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatsOutputs {
    pub average: Option<f64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub change: Option<f64>,
    /// Short-term direction: -1 falling, 0 flat, +1 rising.
    pub trend: Option<i8>,
    pub count: usize,
}

/// The windowed statistics engine.
///
/// Owns the sample store exclusively; callers serialize access (one update
/// cycle at a time) and provide a monotonic `now` in seconds.
#[derive(Debug)]
pub struct WindowStats {
    /// Window length in seconds; 0 disables the time bound.
    considered_span: f64,
    /// Minimum meaningful difference between consecutive samples.
    input_resolution: f64,
    /// Hard cap on retained records.
    max_entries: usize,
    store: VecDeque<IntervalRecord>,
    /// Running extremes for the unbounded window, restarted on reset.
    running_min: Option<f64>,
    running_max: Option<f64>,
    outputs: StatsOutputs,
}

impl WindowStats {
    pub fn new(considered_span_secs: f64, input_resolution: f64, max_entries: usize) -> Self {
        Self {
            considered_span: considered_span_secs,
            input_resolution,
            max_entries,
            store: VecDeque::with_capacity(max_entries + 2),
            running_min: None,
            running_max: None,
            outputs: StatsOutputs::default(),
        }
    }

    pub fn outputs(&self) -> StatsOutputs {
        self.outputs
    }

    pub fn record_count(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// True when the window covers all history since the last reset.
    fn unlimited(&self) -> bool {
        self.considered_span <= 0.0
    }

    /// Full update cycle for a newly delivered sample.
    ///
    /// Non-finite values are dropped without touching store or outputs.
    pub fn ingest(&mut self, now: f64, value: f64) {
        if !value.is_finite() {
            debug!(value, "dropping non-finite sample");
            return;
        }

        let end_time = self.trim(now);
        self.append(end_time, value);
        if self.unlimited() {
            // With an unbounded window every historical value stays
            // relevant; track extremes directly instead of rescanning.
            self.note_running_extremes(value);
        }
        self.recompute(end_time);
    }

    /// Periodic update cycle without a new sample (scheduler tick).
    pub fn tick(&mut self, now: f64) {
        if self.store.is_empty() {
            return;
        }
        let end_time = self.trim(now);
        self.recompute(end_time);
    }

    /// Clear the store and re-seed the outputs from the latest sample.
    pub fn reset(&mut self) {
        if let Some(last) = self.store.back() {
            let value = last.sample_value;
            self.outputs.average = Some(value);
            self.outputs.minimum = Some(value);
            self.outputs.maximum = Some(value);
        }
        if self.outputs.trend.is_some() {
            self.outputs.trend = Some(0);
        }
        if self.outputs.change.is_some() {
            self.outputs.change = Some(0.0);
        }
        self.store.clear();
        // The running extremes start over; the first post-reset sample
        // reseeds them past the display values above.
        self.running_min = None;
        self.running_max = None;
        self.outputs.count = 0;
    }

    /// Lower bound of the currently considered window.
    fn begin_time(&self, now: f64) -> f64 {
        if self.unlimited() {
            0.0
        } else {
            (now - self.considered_span).max(0.0)
        }
    }

    /// Mutate the store so it only covers `[begin_time, now]` and restore
    /// the record cap. Returns `now` as the authoritative cycle end time.
    fn trim(&mut self, now: f64) -> f64 {
        let begin = self.begin_time(now);

        // Records whose successor also ends before the window carry no
        // information about it any more.
        while self.store.len() > 2 && self.store[1].end_time < begin {
            self.store.pop_front();
        }

        // The first record may still end before the window; its end marks
        // where the window begins. Fold it into an interpolated boundary
        // record at `begin` so integration loses nothing.
        if self.store.len() > 1 && self.store[0].end_time < begin {
            let first = self.store[0];
            let second = self.store[1];
            self.store.drain(..2);

            // Invert the midpoint construction to recover the value at the
            // start of the old second interval.
            let interval_begin_value =
                2.0 * second.representative_value - second.sample_value;
            let fraction =
                (begin - first.end_time) / (second.end_time - first.end_time);
            let boundary_value = interval_begin_value
                + (second.sample_value - interval_begin_value) * fraction;

            self.store.push_front(IntervalRecord {
                end_time: second.end_time,
                representative_value: (boundary_value + second.sample_value) / 2.0,
                sample_value: second.sample_value,
            });
            // Only a non-degenerate interval deserves a boundary record.
            if begin < second.end_time {
                self.store.push_front(IntervalRecord {
                    end_time: begin,
                    representative_value: boundary_value,
                    sample_value: boundary_value,
                });
            }
        }

        self.enforce_entry_cap();
        now
    }

    /// Merge the oldest excess records so the store fits the cap again.
    ///
    /// The earliest record survives unchanged: its end time anchors the
    /// window begin and its sample value anchors the change calculation.
    fn enforce_entry_cap(&mut self) {
        if self.store.len() <= self.max_entries {
            return;
        }

        let split = self.store.len() - (self.max_entries - 2);
        let head: Vec<IntervalRecord> = self.store.drain(..split).collect();
        let earliest = head[0];
        let latest = head[head.len() - 1];
        let average =
            time_weighted_average(&head, latest.end_time).unwrap_or(latest.sample_value);
        debug!(
            folded = head.len(),
            cap = self.max_entries,
            "compressed oldest records to fit the entry cap"
        );

        self.store.push_front(IntervalRecord {
            end_time: latest.end_time,
            representative_value: average,
            sample_value: latest.sample_value,
        });
        self.store.push_front(earliest);
    }

    /// Append a sample, folding away near-duplicates of a flat signal.
    fn append(&mut self, now: f64, value: f64) {
        if self.store.len() >= 2 {
            let last = self.store[self.store.len() - 1];
            let previous = self.store[self.store.len() - 2];
            let threshold = self.input_resolution - RESOLUTION_SLACK;
            if (value - last.sample_value).abs() < threshold
                && (value - previous.sample_value).abs() < threshold
            {
                // Statistically indistinguishable from the current flat run;
                // the latest record moves forward instead of multiplying.
                self.store.pop_back();
            }
        }

        // A delivery at the latest record's timestamp replaces it, keeping
        // end times strictly increasing.
        if let Some(back) = self.store.back() {
            if back.end_time >= now {
                self.store.pop_back();
            }
        }

        let previous_value = self.store.back().map_or(value, |r| r.sample_value);
        self.store.push_back(IntervalRecord {
            end_time: now,
            representative_value: (value + previous_value) / 2.0,
            sample_value: value,
        });
        self.enforce_entry_cap();
    }

    fn note_running_extremes(&mut self, value: f64) {
        let minimum = self.running_min.map_or(value, |m| m.min(value));
        let maximum = self.running_max.map_or(value, |m| m.max(value));
        self.running_min = Some(minimum);
        self.running_max = Some(maximum);
        self.outputs.minimum = Some(minimum);
        self.outputs.maximum = Some(maximum);
    }

    /// Recompute every derived output over the current store.
    fn recompute(&mut self, end_time: f64) {
        self.outputs.count = self.store.len();
        if self.store.is_empty() {
            return;
        }

        let bounded = !self.unlimited();
        let records: &[IntervalRecord] = self.store.make_contiguous();

        if let Some(average) = time_weighted_average(records, end_time) {
            self.outputs.average = Some(average);
        }

        if bounded {
            let mut minimum = f64::INFINITY;
            let mut maximum = f64::NEG_INFINITY;
            for record in records {
                minimum = minimum.min(record.sample_value);
                maximum = maximum.max(record.sample_value);
            }
            self.outputs.minimum = Some(minimum);
            self.outputs.maximum = Some(maximum);
        }

        if records.len() >= 2 {
            self.outputs.change =
                Some(records[records.len() - 1].sample_value - records[0].sample_value);
        } else if self.outputs.change.is_some() {
            self.outputs.change = Some(0.0);
        }

        if let Some(trend) = classify_trend(records, self.input_resolution) {
            self.outputs.trend = Some(trend);
        }
    }
}

/// Time-weighted average over `[first.end_time, end_time]`, extrapolating
/// the last sample as a constant when the store ends early. `None` only for
/// an empty record list.
fn time_weighted_average(records: &[IntervalRecord], end_time: f64) -> Option<f64> {
    let first = records.first()?;
    if records.len() == 1 {
        return Some(first.representative_value);
    }

    let span = end_time - first.end_time;
    if span <= 0.0 {
        return Some(records[records.len() - 1].sample_value);
    }

    let mut weighted = 0.0;
    let mut previous_end = first.end_time;
    for record in &records[1..] {
        weighted += record.representative_value * (record.end_time - previous_end);
        previous_end = record.end_time;
    }
    if previous_end < end_time {
        weighted += records[records.len() - 1].sample_value * (end_time - previous_end);
    }

    Some(weighted / span)
}

/// Classify the short-term direction of the most recent records.
///
/// Deltas clearly above the resolution contribute their sign directly;
/// sub-resolution deltas accumulate until their running total crosses
/// `3 x resolution`, at which point the sign of the triggering delta counts
/// once and the total starts over. Needs at least two records.
fn classify_trend(records: &[IntervalRecord], resolution: f64) -> Option<i8> {
    if records.len() < 2 {
        return None;
    }

    let start = records.len().saturating_sub(TREND_WINDOW_DELTAS + 1);
    let mut tally: i32 = 0;
    let mut small_total = 0.0;

    for pair in records[start..].windows(2) {
        let delta = pair[1].sample_value - pair[0].sample_value;
        if delta.abs() > 2.0 * resolution {
            tally += sign_of(delta);
        } else {
            small_total += delta;
            if small_total.abs() > 3.0 * resolution {
                tally += sign_of(delta);
                small_total = 0.0;
            }
        }
    }

    Some(tally.signum() as i8)
}

fn sign_of(delta: f64) -> i32 {
    if delta > 0.0 {
        1
    } else if delta < 0.0 {
        -1
    } else {
        0
    }
}
