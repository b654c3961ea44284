//! Sigflow Common - the reactive node family and its windowed statistics engine.
//!
//! Nodes are host-agnostic: values are pushed into named input slots, update
//! cycles run synchronously, and periodic work goes through the
//! `TickScheduler` collaborator so any runtime (or test harness) can drive
//! them.

pub mod group_stats;
pub mod node;
pub mod params;
pub mod scheduler;
pub mod selectors;
pub mod statistics_node;
pub mod threshold_filter;
pub mod window_stats;

pub use group_stats::GroupStats;
pub use node::{Emit, Node, NodeError, Port, Value};
pub use params::{
    GroupStatsParams, InputSelectorParams, OutputSelectorParams, ParamError, StatisticsParams,
    ThresholdFilterParams,
};
pub use scheduler::{ManualScheduler, TickScheduler, TickToken};
pub use selectors::{InputSelector, OutputSelector};
pub use statistics_node::StatisticsNode;
pub use threshold_filter::ThresholdFilter;
pub use window_stats::{IntervalRecord, StatsOutputs, WindowStats};
