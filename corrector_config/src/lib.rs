#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and node binding table for the correction client.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - The node binding CSV maps server node ids to display names; it stands in
//!   for live address-space browsing, which this client does not do.
use serde::Deserialize;
use std::collections::HashSet;

/// Names of the sensor inputs the client knows how to track, in model order.
pub const INPUT_VARIABLES: [&str; 7] = [
    "air_temperature",
    "attached_weight",
    "position_x",
    "position_y",
    "process_temperature",
    "speed",
    "speed_next",
];

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Server {
    /// Endpoint URL of the process-control server.
    pub url: String,
    /// Delay between connect attempts while the server is unreachable.
    pub reconnect_delay_ms: u64,
    /// Requested publishing interval for the data-change subscription.
    pub publishing_interval_ms: u64,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            url: "opc.tcp://localhost:4840".to_string(),
            reconnect_delay_ms: 2000,
            publishing_interval_ms: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Features {
    /// Inputs that must all be present before a correction is computed.
    pub inputs: Vec<String>,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            inputs: INPUT_VARIABLES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Orchestration {
    /// Display name of the cycle-number variable.
    pub cycle: String,
    /// Display name of the process-step variable.
    pub process_step: String,
    /// Step value whose arrival triggers the correction.
    pub trigger_step: i64,
}

impl Default for Orchestration {
    fn default() -> Self {
        Self {
            cycle: "cycle".to_string(),
            process_step: "process_step".to_string(),
            trigger_step: 2,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Outputs {
    pub correction_x: String,
    pub correction_y: String,
    pub correction_cycle: String,
}

impl Default for Outputs {
    fn default() -> Self {
        Self {
            correction_x: "correction_x".to_string(),
            correction_y: "correction_y".to_string(),
            correction_cycle: "correction_cycle".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CorrectionCfg {
    /// corr = -gain * error on each axis.
    pub gain: f64,
    /// Upper bound on a single model evaluation.
    pub inference_timeout_ms: u64,
    /// Pending correction requests before new ones are dropped.
    pub queue_capacity: usize,
}

impl Default for CorrectionCfg {
    fn default() -> Self {
        Self {
            gain: 1.0,
            inference_timeout_ms: 500,
            queue_capacity: 8,
        }
    }
}

/// Standard-scaler parameters: x' = (x - mean) / scale.
#[derive(Debug, Deserialize, Clone)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Linear error model, one row of coefficients per axis.
#[derive(Debug, Deserialize, Clone)]
pub struct ModelCfg {
    /// Feature order expected by the coefficients. Defaults to `features.inputs`.
    #[serde(default)]
    pub features: Option<Vec<String>>,
    pub coef_x: Vec<f64>,
    pub coef_y: Vec<f64>,
    #[serde(default)]
    pub intercept_x: f64,
    #[serde(default)]
    pub intercept_y: f64,
    #[serde(default)]
    pub scaler: Option<Scaler>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
    /// Emit one info event per data-change notification.
    pub trace_notifications: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimCfg {
    /// Cycles to simulate before the stream ends (0 = until interrupted).
    pub cycles: u64,
    /// Pause between simulated notifications.
    pub tick_ms: u64,
    /// Connect attempts that fail before the simulated server accepts.
    pub connect_failures: u32,
    /// Features withheld every cycle (to exercise the incomplete path).
    pub drop_features: Vec<String>,
}

impl Default for SimCfg {
    fn default() -> Self {
        Self {
            cycles: 5,
            tick_ms: 1,
            connect_failures: 0,
            drop_features: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub features: Features,
    #[serde(default)]
    pub orchestration: Orchestration,
    #[serde(default)]
    pub outputs: Outputs,
    #[serde(default)]
    pub correction: CorrectionCfg,
    /// Required by `run`; `check-config` accepts a config without it.
    #[serde(default)]
    pub model: Option<ModelCfg>,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub sim: SimCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// One row of the node binding table.
///
/// Expected headers:
/// node_id,name
///
/// Example:
/// node_id,name
/// ns=2;i=1,cycle
/// ns=2;i=3,air_temperature
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BindingRow {
    pub node_id: String,
    pub name: String,
}

/// Load the node binding table, enforcing exact headers and unique node ids.
pub fn load_binding_csv(path: &std::path::Path) -> eyre::Result<Vec<BindingRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open binding CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["node_id", "name"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "binding CSV must have headers 'node_id,name', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    let mut seen = HashSet::new();
    for (idx, rec) in rdr.deserialize::<BindingRow>().enumerate() {
        let row = rec.map_err(|e| eyre::eyre!("invalid CSV row {}: {}", idx + 2, e))?;
        if row.node_id.is_empty() || row.name.is_empty() {
            eyre::bail!("invalid CSV row {}: empty node_id or name", idx + 2);
        }
        if !seen.insert(row.node_id.clone()) {
            eyre::bail!("binding CSV has duplicate node_id '{}'", row.node_id);
        }
        rows.push(row);
    }
    if rows.is_empty() {
        eyre::bail!("binding CSV {:?} has no rows", path);
    }
    Ok(rows)
}

fn check_known_unique(list: &[String], what: &str) -> eyre::Result<()> {
    let mut seen = HashSet::new();
    for name in list {
        if !INPUT_VARIABLES.contains(&name.as_str()) {
            eyre::bail!("{what} contains unknown feature '{name}'");
        }
        if !seen.insert(name.as_str()) {
            eyre::bail!("{what} contains duplicate feature '{name}'");
        }
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Server
        if self.server.url.trim().is_empty() {
            eyre::bail!("server.url must not be empty");
        }
        if self.server.reconnect_delay_ms == 0 {
            eyre::bail!("server.reconnect_delay_ms must be >= 1");
        }
        if self.server.publishing_interval_ms == 0 {
            eyre::bail!("server.publishing_interval_ms must be >= 1");
        }

        // Features
        if self.features.inputs.is_empty() {
            eyre::bail!("features.inputs must not be empty");
        }
        check_known_unique(&self.features.inputs, "features.inputs")?;

        // Orchestration
        let orch = &self.orchestration;
        if orch.cycle.is_empty() || orch.process_step.is_empty() {
            eyre::bail!("orchestration variable names must not be empty");
        }
        if orch.cycle == orch.process_step {
            eyre::bail!("orchestration.cycle and orchestration.process_step must differ");
        }
        if INPUT_VARIABLES.contains(&orch.cycle.as_str())
            || INPUT_VARIABLES.contains(&orch.process_step.as_str())
        {
            eyre::bail!("orchestration variable names must not shadow an input feature");
        }
        if orch.trigger_step < 0 {
            eyre::bail!("orchestration.trigger_step must be >= 0");
        }

        // Outputs
        let outs = [
            &self.outputs.correction_x,
            &self.outputs.correction_y,
            &self.outputs.correction_cycle,
        ];
        if outs.iter().any(|o| o.is_empty()) {
            eyre::bail!("output point names must not be empty");
        }
        if outs[0] == outs[1] || outs[0] == outs[2] || outs[1] == outs[2] {
            eyre::bail!("output point names must be distinct");
        }

        // Correction
        if !self.correction.gain.is_finite() || self.correction.gain <= 0.0 {
            eyre::bail!("correction.gain must be finite and > 0");
        }
        if self.correction.inference_timeout_ms == 0 {
            eyre::bail!("correction.inference_timeout_ms must be >= 1");
        }
        if self.correction.queue_capacity == 0 {
            eyre::bail!("correction.queue_capacity must be >= 1");
        }

        // Model
        if let Some(model) = &self.model {
            let order = model.features.as_ref().unwrap_or(&self.features.inputs);
            check_known_unique(order, "model.features")?;
            if let Some(missing) = order.iter().find(|f| !self.features.inputs.contains(*f)) {
                eyre::bail!("model.features uses '{missing}' which is not in features.inputs");
            }
            let n = order.len();
            if model.coef_x.len() != n || model.coef_y.len() != n {
                eyre::bail!(
                    "model coefficients must have {n} entries (got coef_x={}, coef_y={})",
                    model.coef_x.len(),
                    model.coef_y.len()
                );
            }
            let all = model
                .coef_x
                .iter()
                .chain(&model.coef_y)
                .chain([&model.intercept_x, &model.intercept_y]);
            if all.into_iter().any(|v| !v.is_finite()) {
                eyre::bail!("model coefficients must be finite");
            }
            if let Some(s) = &model.scaler {
                if s.mean.len() != n || s.scale.len() != n {
                    eyre::bail!("model.scaler mean/scale must have {n} entries");
                }
                if s.scale.iter().any(|v| !v.is_finite() || *v == 0.0) {
                    eyre::bail!("model.scaler.scale entries must be finite and non-zero");
                }
                if s.mean.iter().any(|v| !v.is_finite()) {
                    eyre::bail!("model.scaler.mean entries must be finite");
                }
            }
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        // Sim
        check_known_unique(&self.sim.drop_features, "sim.drop_features")?;

        Ok(())
    }
}
