//! Config → runtime types.

use std::sync::Arc;
use std::time::Duration;

use corrector_config::{BindingRow, Config, ModelCfg};

use crate::binding::{NodeFeatureBinding, OutputNodes};
use crate::dispatch::DispatcherBuilder;
use crate::error::{BuildError, CorrectorError};
use crate::feature::{CycleId, ProcessStep, parse_features};
use crate::handler::HandlerCfg;
use crate::model::{LinearModel, StandardScaler};
use crate::policy::CorrectionPolicy;
use crate::session::SubscriptionSpec;

impl TryFrom<&Config> for HandlerCfg {
    type Error = CorrectorError;

    fn try_from(cfg: &Config) -> Result<Self, Self::Error> {
        Ok(HandlerCfg {
            trigger_step: ProcessStep(cfg.orchestration.trigger_step),
            required: parse_features(&cfg.features.inputs)?,
            trace_notifications: cfg.logging.trace_notifications,
            initial_cycle: CycleId::default(),
        })
    }
}

/// Build the linear model described by `[model]`; `inputs` is the fallback order.
pub fn linear_model(model: &ModelCfg, inputs: &[String]) -> Result<LinearModel, BuildError> {
    let names = model.features.as_deref().unwrap_or(inputs);
    let order = parse_features(names).map_err(|e| BuildError::InvalidConfig(e.to_string()))?;
    let lm = LinearModel::new(order, model.coef_x.clone(), model.coef_y.clone())?
        .with_intercepts(model.intercept_x, model.intercept_y);
    match &model.scaler {
        Some(s) => lm.with_scaler(StandardScaler::new(s.mean.clone(), s.scale.clone())?),
        None => Ok(lm),
    }
}

/// Dispatcher builder carrying policy, timeout, capacity, and the configured model.
/// The writer still has to be supplied by the caller.
pub fn dispatcher_builder(cfg: &Config) -> Result<DispatcherBuilder, BuildError> {
    let policy = CorrectionPolicy::with_gain(cfg.correction.gain)?;
    let mut builder = DispatcherBuilder::default()
        .with_policy(policy)
        .with_inference_timeout(Duration::from_millis(cfg.correction.inference_timeout_ms))
        .with_capacity(cfg.correction.queue_capacity);
    if let Some(model) = &cfg.model {
        builder = builder.with_shared_model(Arc::new(linear_model(model, &cfg.features.inputs)?));
    }
    Ok(builder)
}

/// Bind the rows of a node table using the configured orchestration names.
pub fn binding_from_rows(rows: &[BindingRow], cfg: &Config) -> NodeFeatureBinding {
    NodeFeatureBinding::from_display_names(
        rows.iter().map(|r| (r.node_id.as_str(), r.name.as_str())),
        &cfg.orchestration.cycle,
        &cfg.orchestration.process_step,
    )
}

/// Configured `[outputs]` display names, in batch order.
pub fn output_names(cfg: &Config) -> [&str; 3] {
    [
        cfg.outputs.correction_x.as_str(),
        cfg.outputs.correction_y.as_str(),
        cfg.outputs.correction_cycle.as_str(),
    ]
}

/// Resolve the configured output names against a node table.
pub fn output_nodes_from_rows(rows: &[BindingRow], cfg: &Config) -> Result<OutputNodes, CorrectorError> {
    OutputNodes::resolve(
        rows.iter().map(|r| (r.node_id.as_str(), r.name.as_str())),
        output_names(cfg),
    )
}

/// Subscription to every bound node at the configured publishing interval.
pub fn subscription_spec(
    cfg: &Config,
    binding: &NodeFeatureBinding,
    outputs: OutputNodes,
) -> SubscriptionSpec {
    SubscriptionSpec {
        nodes: binding.nodes(),
        publishing_interval: Duration::from_millis(cfg.server.publishing_interval_ms),
        outputs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Channel;
    use crate::feature::{Feature, FeatureSnapshot};
    use crate::model::ErrorModel;
    use corrector_config::load_toml;

    #[test]
    fn handler_cfg_follows_orchestration_section() {
        let cfg = load_toml(
            "[features]\ninputs = [\"speed\", \"position_x\"]\n[orchestration]\ntrigger_step = 4\n",
        )
        .unwrap();
        let h = HandlerCfg::try_from(&cfg).unwrap();
        assert_eq!(h.trigger_step, ProcessStep(4));
        assert_eq!(h.required, vec![Feature::Speed, Feature::PositionX]);
        assert_eq!(h.initial_cycle, CycleId(0));
    }

    #[test]
    fn model_defaults_to_input_order() {
        let cfg = load_toml(
            "[features]\ninputs = [\"speed\", \"position_x\"]\n\
             [model]\ncoef_x = [1.0, 0.0]\ncoef_y = [0.0, 2.0]\nintercept_y = 1.0\n",
        )
        .unwrap();
        let model = linear_model(cfg.model.as_ref().unwrap(), &cfg.features.inputs).unwrap();
        assert_eq!(model.feature_order(), &[Feature::Speed, Feature::PositionX]);
        let snap = FeatureSnapshot::from_pairs([(Feature::Speed, 3.0), (Feature::PositionX, 4.0)]);
        let est = model.predict(&snap).unwrap();
        assert_eq!((est.error_x, est.error_y), (3.0, 9.0));
    }

    #[test]
    fn dispatcher_builder_without_model_fails_to_build() {
        let cfg = Config::default();
        let err = dispatcher_builder(&cfg)
            .unwrap()
            .with_writer(crate::mocks::RecordingWriter::new())
            .build()
            .unwrap_err();
        assert_eq!(err, BuildError::MissingModel);
    }

    #[test]
    fn rows_use_configured_orchestration_names() {
        let cfg = load_toml("[orchestration]\ncycle = \"Zyklus\"\nprocess_step = \"Schritt\"\n").unwrap();
        let rows = vec![
            BindingRow {
                node_id: "ns=2;i=1".into(),
                name: "Zyklus".into(),
            },
            BindingRow {
                node_id: "ns=2;i=2".into(),
                name: "Schritt".into(),
            },
            BindingRow {
                node_id: "ns=2;i=3".into(),
                name: "speed".into(),
            },
            BindingRow {
                node_id: "ns=2;i=4".into(),
                name: "correction_x".into(),
            },
        ];
        let b = binding_from_rows(&rows, &cfg);
        assert_eq!(b.len(), 3);
        assert_eq!(b.decode(&"ns=2;i=1".into()), Some(Channel::Cycle));
        assert_eq!(b.decode(&"ns=2;i=2".into()), Some(Channel::Step));
        assert_eq!(b.decode(&"ns=2;i=4".into()), None);
    }

    #[test]
    fn renamed_outputs_and_interval_reach_the_subscription() {
        let cfg = load_toml(
            "[server]\npublishing_interval_ms = 250\n\
             [outputs]\ncorrection_x = \"plc_x\"\ncorrection_y = \"plc_y\"\ncorrection_cycle = \"plc_cycle\"\n",
        )
        .unwrap();
        let rows: Vec<BindingRow> = [("n1", "cycle"), ("n2", "plc_x"), ("n3", "plc_y"), ("n4", "plc_cycle")]
            .into_iter()
            .map(|(id, name)| BindingRow {
                node_id: id.into(),
                name: name.into(),
            })
            .collect();
        let outputs = output_nodes_from_rows(&rows, &cfg).unwrap();
        let spec = subscription_spec(&cfg, &binding_from_rows(&rows, &cfg), outputs);
        assert_eq!(spec.publishing_interval, Duration::from_millis(250));
        assert_eq!(spec.nodes, vec![corrector_traits::NodeId::from("n1")]);
        assert_eq!(
            spec.outputs.node(corrector_traits::OutputPoint::CorrectionX),
            &corrector_traits::NodeId::from("n2")
        );
    }

    #[test]
    fn default_output_names_missing_from_rows_is_a_config_error() {
        let cfg = Config::default();
        let rows = vec![BindingRow {
            node_id: "n1".into(),
            name: "correction_x".into(),
        }];
        let err = output_nodes_from_rows(&rows, &cfg).unwrap_err();
        assert!(matches!(err, CorrectorError::Config(_)));
    }
}
