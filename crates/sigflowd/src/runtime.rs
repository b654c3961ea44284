//! The dataflow runtime: owns every node and serializes all updates.
//!
//! One task owns the node map. Sample deliveries (stdin) and scheduler
//! ticks (internal channel) are multiplexed through the same loop, so a
//! tick can never run concurrently with an ingestion.

use std::collections::{BTreeMap, HashMap, VecDeque};

use anyhow::{Context, Result};
use sigflow_common::{
    Emit, GroupStats, InputSelector, Node, OutputSelector, StatisticsNode, ThresholdFilter, Value,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{Endpoint, GraphConfig, NodeDecl};
use crate::events::{InputEvent, OutputEvent};
use crate::scheduler::{MonotonicClock, TickMessage, TokioScheduler};

/// Upper bound on wire deliveries triggered by one external event. A
/// well-formed graph stays far below this; a cyclic one gets cut off.
const MAX_DELIVERIES_PER_EVENT: usize = 1024;

pub struct Runtime {
    nodes: BTreeMap<String, Box<dyn Node>>,
    routes: HashMap<Endpoint, Vec<Endpoint>>,
    clock: MonotonicClock,
    tick_rx: mpsc::UnboundedReceiver<TickMessage>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("routes", &self.routes)
            .finish()
    }
}

impl Runtime {
    /// Instantiate every declared node and index the wires.
    pub fn build(config: GraphConfig) -> Result<Self> {
        config.validate()?;
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();

        let mut nodes: BTreeMap<String, Box<dyn Node>> = BTreeMap::new();
        for (name, decl) in config.nodes {
            let node: Box<dyn Node> = match decl {
                NodeDecl::Statistics(params) => {
                    let scheduler = TokioScheduler::new(name.clone(), tick_tx.clone());
                    Box::new(
                        StatisticsNode::new(params, Box::new(scheduler))
                            .with_context(|| format!("node `{name}`"))?,
                    )
                }
                NodeDecl::ThresholdFilter(params) => Box::new(
                    ThresholdFilter::new(params).with_context(|| format!("node `{name}`"))?,
                ),
                NodeDecl::GroupStats(params) => {
                    Box::new(GroupStats::new(params).with_context(|| format!("node `{name}`"))?)
                }
                NodeDecl::InputSelector(params) => Box::new(
                    InputSelector::new(params).with_context(|| format!("node `{name}`"))?,
                ),
                NodeDecl::OutputSelector(params) => Box::new(
                    OutputSelector::new(params).with_context(|| format!("node `{name}`"))?,
                ),
            };
            nodes.insert(name, node);
        }

        let mut routes: HashMap<Endpoint, Vec<Endpoint>> = HashMap::new();
        for wire in config.wires {
            routes.entry(wire.from).or_default().push(wire.to);
        }

        Ok(Self {
            nodes,
            routes,
            clock: MonotonicClock::new(),
            tick_rx,
        })
    }

    /// Drive the graph until stdin closes.
    pub async fn run(mut self) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();

        loop {
            tokio::select! {
                line = lines.next_line() => match line.context("reading stdin")? {
                    Some(line) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<InputEvent>(&line) {
                            Ok(event) => {
                                let outputs =
                                    self.deliver(&event.node, &event.input, event.value);
                                emit_lines(&outputs);
                            }
                            Err(error) => warn!(%error, "ignoring malformed input line"),
                        }
                    }
                    None => {
                        info!("input stream closed, shutting down");
                        break;
                    }
                },
                Some(tick) = self.tick_rx.recv() => {
                    debug!(node = %tick.node, token = tick.token, "tick");
                    let outputs = self.deliver_tick(&tick.node);
                    emit_lines(&outputs);
                }
            }
        }

        Ok(())
    }

    /// Deliver one external value and run the resulting cascade.
    pub fn deliver(&mut self, node_name: &str, input: &str, value: Value) -> Vec<OutputEvent> {
        let now = self.clock.now_secs();
        let Some(node) = self.nodes.get_mut(node_name) else {
            warn!(node = node_name, "dropping event for unknown node");
            return Vec::new();
        };
        if let Err(error) = node.set_input(input, value) {
            warn!(node = node_name, %error, "dropping rejected delivery");
            return Vec::new();
        }
        let emits = node.evaluate(now);
        self.propagate(node_name, emits, now)
    }

    /// Deliver a scheduler tick and run the resulting cascade.
    pub fn deliver_tick(&mut self, node_name: &str) -> Vec<OutputEvent> {
        let now = self.clock.now_secs();
        let Some(node) = self.nodes.get_mut(node_name) else {
            warn!(node = node_name, "dropping tick for unknown node");
            return Vec::new();
        };
        let emits = node.tick(now);
        self.propagate(node_name, emits, now)
    }

    /// Push emitted values along wires, breadth first, within a delivery
    /// budget so a miswired cyclic graph cannot spin forever.
    fn propagate(&mut self, origin: &str, emits: Vec<Emit>, now: f64) -> Vec<OutputEvent> {
        let mut events = Vec::new();
        let mut queue: VecDeque<(String, Vec<Emit>)> = VecDeque::new();
        queue.push_back((origin.to_string(), emits));
        let mut budget = MAX_DELIVERIES_PER_EVENT;

        while let Some((node_name, emits)) = queue.pop_front() {
            for emit in emits {
                events.push(OutputEvent::now(&node_name, &emit.output, emit.value));

                let from = Endpoint {
                    node: node_name.clone(),
                    port: emit.output.clone(),
                };
                let Some(targets) = self.routes.get(&from).cloned() else {
                    continue;
                };
                for target in targets {
                    if budget == 0 {
                        warn!("delivery budget exhausted, graph may contain a cycle");
                        return events;
                    }
                    budget -= 1;

                    let Some(node) = self.nodes.get_mut(&target.node) else {
                        continue;
                    };
                    match node.set_input(&target.port, emit.value) {
                        Ok(()) => {
                            let next = node.evaluate(now);
                            if !next.is_empty() {
                                queue.push_back((target.node, next));
                            }
                        }
                        Err(error) => {
                            warn!(node = %target.node, %error, "wire delivery rejected")
                        }
                    }
                }
            }
        }

        events
    }
}

fn emit_lines(events: &[OutputEvent]) {
    for event in events {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(error) => warn!(%error, "failed to serialize output event"),
        }
    }
}
