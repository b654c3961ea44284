//! Statistics node: hosts the windowed engine inside the node contract.
//!
//! Owns the engine's update cycle end to end: sample and reset deliveries
//! come in through ports, periodic recomputation comes in through the
//! scheduler collaborator, and only outputs that actually changed are
//! emitted. Sample arrival and tick arrival both go through `&mut self`
//! entry points, so a tick can never observe a half-updated store.

use std::time::Duration;

use tracing::debug;

use crate::node::{Emit, Node, NodeError, Port, Value};
use crate::params::{ParamError, StatisticsParams};
use crate::scheduler::{TickScheduler, TickToken};
use crate::window_stats::{StatsOutputs, WindowStats};

pub struct StatisticsNode {
    params: StatisticsParams,
    engine: WindowStats,
    value_in: Port<f64>,
    reset_in: Port<bool>,
    scheduler: Box<dyn TickScheduler>,
    /// At most one outstanding callback per instance.
    pending_tick: Option<TickToken>,
    last_emitted: StatsOutputs,
}

impl StatisticsNode {
    /// Validates the parameters and builds the node around a fresh engine.
    pub fn new(
        params: StatisticsParams,
        scheduler: Box<dyn TickScheduler>,
    ) -> Result<Self, ParamError> {
        params.validate()?;
        let engine = WindowStats::new(
            params.considered_span_secs,
            params.input_resolution,
            params.max_entries,
        );
        Ok(Self {
            params,
            engine,
            value_in: Port::new(),
            reset_in: Port::new(),
            scheduler,
            pending_tick: None,
            last_emitted: StatsOutputs::default(),
        })
    }

    pub fn outputs(&self) -> StatsOutputs {
        self.engine.outputs()
    }

    /// Re-arm the periodic tick after a successful cycle. Skipped while the
    /// store is empty, while ticks are disabled, or while one is pending.
    fn rearm_tick(&mut self) {
        if self.pending_tick.is_some() || self.engine.is_empty() {
            return;
        }
        let period = self.params.resample_period_secs;
        if period <= 0.0 {
            return;
        }
        let token = self
            .scheduler
            .schedule_after(Duration::from_secs_f64(period));
        self.pending_tick = Some(token);
    }

    fn cancel_tick(&mut self) {
        if let Some(token) = self.pending_tick.take() {
            self.scheduler.cancel(token);
        }
    }

    /// Emit every output whose value changed since the last emission.
    fn emit_changed(&mut self) -> Vec<Emit> {
        let current = self.engine.outputs();
        let mut emits = Vec::new();

        push_changed(&mut emits, "average", current.average, self.last_emitted.average);
        push_changed(&mut emits, "minimum", current.minimum, self.last_emitted.minimum);
        push_changed(&mut emits, "maximum", current.maximum, self.last_emitted.maximum);
        push_changed(&mut emits, "change", current.change, self.last_emitted.change);
        if current.trend != self.last_emitted.trend {
            if let Some(trend) = current.trend {
                emits.push(Emit::new("trend", trend as i64));
            }
        }
        if current.count != self.last_emitted.count {
            emits.push(Emit::new("count", current.count as i64));
        }

        self.last_emitted = current;
        emits
    }
}

fn push_changed(emits: &mut Vec<Emit>, output: &str, current: Option<f64>, previous: Option<f64>) {
    if current != previous {
        if let Some(value) = current {
            emits.push(Emit::new(output, value));
        }
    }
}

impl Node for StatisticsNode {
    fn set_input(&mut self, slot: &str, value: Value) -> Result<(), NodeError> {
        match slot {
            "value" => match value.as_number() {
                Some(number) => {
                    self.value_in.set(number);
                    Ok(())
                }
                None => Err(NodeError::TypeMismatch {
                    slot: slot.to_string(),
                    expected: "number",
                    got: value.kind(),
                }),
            },
            "reset" => match value.as_bool() {
                Some(flag) => {
                    self.reset_in.set(flag);
                    Ok(())
                }
                None => Err(NodeError::TypeMismatch {
                    slot: slot.to_string(),
                    expected: "bool",
                    got: value.kind(),
                }),
            },
            _ => Err(NodeError::UnknownInput(slot.to_string())),
        }
    }

    fn evaluate(&mut self, now: f64) -> Vec<Emit> {
        if self.reset_in.updated_value() == Some(true) {
            debug!("reset requested, clearing the sample window");
            self.cancel_tick();
            self.engine.reset();
        }

        if let Some(sample) = self.value_in.updated_value() {
            self.engine.ingest(now, sample);
            self.rearm_tick();
        }

        self.emit_changed()
    }

    fn tick(&mut self, now: f64) -> Vec<Emit> {
        // The pending callback just fired (or was already obsolete); either
        // way nothing is outstanding any more.
        self.pending_tick = None;
        self.engine.tick(now);
        self.rearm_tick();
        self.emit_changed()
    }
}

impl Drop for StatisticsNode {
    fn drop(&mut self) {
        self.cancel_tick();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;
    use approx::assert_relative_eq;

    fn node_with(params: StatisticsParams) -> (StatisticsNode, ManualScheduler) {
        let scheduler = ManualScheduler::new();
        let node = StatisticsNode::new(params, Box::new(scheduler.clone())).expect("valid params");
        (node, scheduler)
    }

    fn deliver(node: &mut StatisticsNode, now: f64, value: f64) -> Vec<Emit> {
        node.set_input("value", Value::Number(value)).expect("slot");
        node.evaluate(now)
    }

    #[test]
    fn test_invalid_params_are_rejected_at_construction() {
        let params = StatisticsParams {
            considered_span_secs: 1.0,
            ..StatisticsParams::default()
        };
        let result = StatisticsNode::new(params, Box::new(ManualScheduler::new()));
        assert!(matches!(result, Err(ParamError::SpanTooShort { .. })));
    }

    #[test]
    fn test_unknown_slot_and_type_mismatch() {
        let (mut node, _scheduler) = node_with(StatisticsParams::default());
        assert!(matches!(
            node.set_input("bogus", Value::Number(1.0)),
            Err(NodeError::UnknownInput(_))
        ));
        assert!(matches!(
            node.set_input("value", Value::Bool(true)),
            Err(NodeError::TypeMismatch { .. })
        ));
        assert!(matches!(
            node.set_input("reset", Value::Number(1.0)),
            Err(NodeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_emits_only_changed_outputs() {
        let (mut node, _scheduler) = node_with(StatisticsParams::default());

        let emits = deliver(&mut node, 0.0, 5.0);
        let outputs: Vec<&str> = emits.iter().map(|e| e.output.as_str()).collect();
        assert!(outputs.contains(&"average"));
        assert!(outputs.contains(&"minimum"));
        assert!(outputs.contains(&"maximum"));
        assert!(outputs.contains(&"count"));
        // Change and trend need two records.
        assert!(!outputs.contains(&"change"));
        assert!(!outputs.contains(&"trend"));

        // A second identical cycle emits nothing new except what moved.
        let emits = deliver(&mut node, 10.0, 5.0);
        let outputs: Vec<&str> = emits.iter().map(|e| e.output.as_str()).collect();
        assert!(outputs.contains(&"count"));
        assert!(outputs.contains(&"change"));
        assert!(!outputs.contains(&"minimum"));
        assert!(!outputs.contains(&"maximum"));
    }

    #[test]
    fn test_no_tick_scheduled_without_period() {
        let (mut node, scheduler) = node_with(StatisticsParams::default());
        deliver(&mut node, 0.0, 1.0);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn test_tick_rearm_keeps_single_outstanding_callback() {
        let params = StatisticsParams {
            resample_period_secs: 10.0,
            ..StatisticsParams::default()
        };
        let (mut node, scheduler) = node_with(params);

        deliver(&mut node, 0.0, 1.0);
        assert_eq!(scheduler.pending_count(), 1);

        // Further samples while a tick is pending must not stack requests.
        deliver(&mut node, 2.0, 4.0);
        deliver(&mut node, 4.0, 9.0);
        assert_eq!(scheduler.pending_count(), 1);

        // Firing the tick re-arms exactly one request.
        let (_, delay) = scheduler.fire_next().expect("pending tick");
        assert_eq!(delay, Duration::from_secs_f64(10.0));
        node.tick(14.0);
        assert_eq!(scheduler.pending_count(), 1);
    }

    #[test]
    fn test_tick_recomputes_extrapolated_average() {
        let params = StatisticsParams {
            considered_span_secs: 100.0,
            resample_period_secs: 10.0,
            ..StatisticsParams::default()
        };
        let (mut node, scheduler) = node_with(params);

        deliver(&mut node, 0.0, 7.0);
        scheduler.fire_next().expect("pending tick");
        node.tick(50.0);
        assert_relative_eq!(node.outputs().average.expect("average set"), 7.0);
    }

    #[test]
    fn test_reset_cancels_pending_tick_until_next_sample() {
        let params = StatisticsParams {
            resample_period_secs: 10.0,
            ..StatisticsParams::default()
        };
        let (mut node, scheduler) = node_with(params);

        deliver(&mut node, 0.0, 3.0);
        assert_eq!(scheduler.pending_count(), 1);

        node.set_input("reset", Value::Bool(true)).expect("slot");
        node.evaluate(1.0);
        assert_eq!(scheduler.pending_count(), 0);
        assert_eq!(node.outputs().count, 0);

        // A fresh sample starts the periodic cycle again.
        deliver(&mut node, 2.0, 4.0);
        assert_eq!(scheduler.pending_count(), 1);
    }

    #[test]
    fn test_false_reset_delivery_is_ignored() {
        let (mut node, _scheduler) = node_with(StatisticsParams::default());
        deliver(&mut node, 0.0, 3.0);

        node.set_input("reset", Value::Bool(false)).expect("slot");
        node.evaluate(1.0);
        assert_eq!(node.outputs().count, 1);
    }

    #[test]
    fn test_reset_emits_reseeded_outputs() {
        let (mut node, _scheduler) = node_with(StatisticsParams::default());
        deliver(&mut node, 0.0, 2.0);
        deliver(&mut node, 1.0, 8.0);

        node.set_input("reset", Value::Bool(true)).expect("slot");
        let emits = node.evaluate(2.0);
        let find = |name: &str| {
            emits
                .iter()
                .find(|e| e.output == name)
                .map(|e| e.value)
        };
        assert_eq!(find("average"), Some(Value::Number(8.0)));
        assert_eq!(find("change"), Some(Value::Number(0.0)));
        assert_eq!(find("trend"), Some(Value::Integer(0)));
        assert_eq!(find("count"), Some(Value::Integer(0)));
    }

    #[test]
    fn test_drop_cancels_pending_tick() {
        let params = StatisticsParams {
            resample_period_secs: 10.0,
            ..StatisticsParams::default()
        };
        let (mut node, scheduler) = node_with(params);
        deliver(&mut node, 0.0, 1.0);
        assert_eq!(scheduler.pending_count(), 1);

        drop(node);
        assert_eq!(scheduler.pending_count(), 0);
    }
}
