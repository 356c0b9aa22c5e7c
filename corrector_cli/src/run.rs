//! The `run` command: wire config, binding, simulated transport, handler and
//! dispatcher together and drive the notification loop.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use corrector_config::{BindingRow, Config};
use corrector_core::conversions::{
    binding_from_rows, dispatcher_builder, output_names, output_nodes_from_rows, subscription_spec,
};
use corrector_core::error::{BuildError, CorrectorError, Result as CoreResult};
use corrector_core::runner::{self, ExitReason};
use corrector_core::session::connect_with_retry;
use corrector_core::{
    Channel, Feature, HandlerCfg, NodeFeatureBinding, OutputNodes, SubscriptionHandler,
};
use corrector_sim::{FlakyConnector, SimOptions, SimulatedServer};
use corrector_traits::{NodeId, OutputPoint};
use corrector_traits::clock::MonotonicClock;

/// Test hook: make the simulated server reject writes to one output point.
const FAIL_WRITE_ENV: &str = "CORRECTOR_TEST_SIM_FAIL_WRITE";

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOverrides {
    pub cycles: Option<u64>,
    pub trace_notifications: bool,
}

/// Totals reported when `run` ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub interrupted: bool,
    pub notifications: u64,
    pub cycles: u64,
    pub corrections: u64,
    pub skipped: u64,
    pub dropped: u64,
    pub inference_failures: u64,
    pub write_failures: u64,
}

impl RunSummary {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "interrupted": self.interrupted,
            "notifications": self.notifications,
            "cycles": self.cycles,
            "corrections": self.corrections,
            "skipped": self.skipped,
            "dropped": self.dropped,
            "inference_failures": self.inference_failures,
            "write_failures": self.write_failures,
        })
    }

    pub fn to_line(&self) -> String {
        format!(
            "run {}: cycles={} corrections={} skipped={} dropped={} inference_failures={} write_failures={}",
            if self.interrupted { "interrupted" } else { "complete" },
            self.cycles,
            self.corrections,
            self.skipped,
            self.dropped,
            self.inference_failures,
            self.write_failures,
        )
    }
}

fn parse_point(name: &str) -> Option<OutputPoint> {
    OutputPoint::BATCH_ORDER
        .into_iter()
        .find(|p| p.default_name() == name)
}

/// Simulator whose address space uses the configured display names.
pub fn named_sim_options(cfg: &Config) -> SimOptions {
    SimOptions {
        cycle_name: cfg.orchestration.cycle.clone(),
        step_name: cfg.orchestration.process_step.clone(),
        output_names: output_names(cfg).map(String::from),
        ..SimOptions::default()
    }
}

fn sim_options(cfg: &Config, overrides: RunOverrides) -> CoreResult<SimOptions> {
    let drop_features = corrector_core::feature::parse_features(&cfg.sim.drop_features)?;
    let fail_write = match std::env::var(FAIL_WRITE_ENV) {
        Ok(name) => Some(parse_point(&name).ok_or_else(|| {
            CorrectorError::Config(format!("{FAIL_WRITE_ENV}: unknown output point '{name}'"))
        })?),
        Err(_) => None,
    };
    Ok(SimOptions {
        cycles: overrides.cycles.unwrap_or(cfg.sim.cycles),
        tick: Duration::from_millis(cfg.sim.tick_ms),
        drop_features,
        fail_write,
        ..named_sim_options(cfg)
    })
}

/// Binding from the CSV rows if given, else from the server's node table.
/// Fails if an orchestration variable or a configured input has no node.
pub fn resolve_binding(
    cfg: &Config,
    rows: Option<&[BindingRow]>,
    table: &[(NodeId, String)],
) -> CoreResult<NodeFeatureBinding> {
    let binding = match rows {
        Some(rows) => binding_from_rows(rows, cfg),
        None => NodeFeatureBinding::from_display_names(
            table.iter().map(|(n, name)| (n.clone(), name.as_str())),
            &cfg.orchestration.cycle,
            &cfg.orchestration.process_step,
        ),
    };
    if !binding.has_channel(Channel::Cycle) {
        return Err(CorrectorError::Config(format!(
            "no node bound to cycle variable '{}'",
            cfg.orchestration.cycle
        ))
        .into());
    }
    if !binding.has_channel(Channel::Step) {
        return Err(CorrectorError::Config(format!(
            "no node bound to process step variable '{}'",
            cfg.orchestration.process_step
        ))
        .into());
    }
    let inputs: Vec<Feature> = corrector_core::feature::parse_features(&cfg.features.inputs)?;
    let bound = binding.bound_features();
    if let Some(f) = inputs.iter().find(|f| !bound.contains(*f)) {
        return Err(CorrectorError::Config(format!("no node bound to input feature '{f}'")).into());
    }
    Ok(binding)
}

/// Output node ids from the CSV rows if given, else from the server's node table.
pub fn resolve_outputs(
    cfg: &Config,
    rows: Option<&[BindingRow]>,
    table: &[(NodeId, String)],
) -> CoreResult<OutputNodes> {
    let outputs = match rows {
        Some(rows) => output_nodes_from_rows(rows, cfg)?,
        None => OutputNodes::resolve(
            table.iter().map(|(n, name)| (n.clone(), name.as_str())),
            output_names(cfg),
        )?,
    };
    Ok(outputs)
}

pub fn run_corrector(
    cfg: &Config,
    rows: Option<&[BindingRow]>,
    overrides: RunOverrides,
    shutdown: Arc<AtomicBool>,
) -> CoreResult<RunSummary> {
    let server = SimulatedServer::new(sim_options(cfg, overrides)?);
    let table = server.node_table();
    let binding = resolve_binding(cfg, rows, &table)?;
    let spec = subscription_spec(cfg, &binding, resolve_outputs(cfg, rows, &table)?);

    let mut handler_cfg = HandlerCfg::try_from(cfg)?;
    handler_cfg.trace_notifications |= overrides.trace_notifications;
    if cfg.model.is_none() {
        return Err(BuildError::MissingModel.into());
    }
    let builder = dispatcher_builder(cfg)?;

    let mut connector = FlakyConnector::new(server, cfg.sim.connect_failures);
    let clock = MonotonicClock::new();
    let mut session = connect_with_retry(
        &mut connector,
        &cfg.server.url,
        &spec,
        Duration::from_millis(cfg.server.reconnect_delay_ms),
        &clock,
        &shutdown,
    )?;

    let dispatcher = builder.with_writer(session.writer).build()?;
    let mut handler = SubscriptionHandler::new(binding, handler_cfg);
    tracing::info!(
        url = %cfg.server.url,
        inputs = cfg.features.inputs.len(),
        trigger_step = cfg.orchestration.trigger_step,
        "subscription loop started"
    );

    let exit = runner::run(
        &mut handler,
        &session.notifications,
        &dispatcher,
        &shutdown,
        runner::DEFAULT_POLL,
    );
    let interrupted = exit.reason == ExitReason::Interrupted;
    let counts = if interrupted {
        dispatcher.abandon()
    } else {
        dispatcher.finish()
    };
    session.subscription.close();

    let summary = RunSummary {
        interrupted,
        notifications: exit.handled.notifications,
        cycles: exit.handled.cycles,
        corrections: counts.completed,
        skipped: exit.handled.skipped,
        dropped: counts.dropped,
        inference_failures: counts.inference_failures,
        write_failures: counts.write_failures,
    };
    tracing::info!(?summary, "run finished");
    Ok(summary)
}
