use corrector_config::load_toml;
use rstest::rstest;

const MODEL_OK: &str = r#"
[features]
inputs = ["air_temperature", "attached_weight", "position_x", "position_y", "process_temperature", "speed", "speed_next"]

[orchestration]
cycle = "cycle"
process_step = "process_step"
trigger_step = 2

[correction]
gain = 1.0
inference_timeout_ms = 250
queue_capacity = 4

[model]
coef_x = [0.01, 0.0, 0.1, 0.0, 0.02, 0.003, 0.001]
coef_y = [0.0, 0.02, 0.0, 0.1, 0.01, 0.002, 0.004]
intercept_x = -3.0
intercept_y = -1.5

[model.scaler]
mean = [300.0, 10.0, 0.0, 0.0, 310.0, 5.0, 5.0]
scale = [2.0, 1.0, 10.0, 10.0, 2.0, 1.0, 1.0]
"#;

#[test]
fn accepts_full_model_config() {
    let cfg = load_toml(MODEL_OK).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    let model = cfg.model.expect("model section present");
    assert_eq!(model.coef_x.len(), 7);
    assert!(model.scaler.is_some());
}

#[rstest]
#[case("[features]\ninputs = []\n", "features.inputs must not be empty")]
#[case("[features]\ninputs = [\"speed\", \"speed\"]\n", "duplicate feature 'speed'")]
#[case("[features]\ninputs = [\"humidity\"]\n", "unknown feature 'humidity'")]
#[case("[orchestration]\ncycle = \"step\"\nprocess_step = \"step\"\n", "must differ")]
#[case("[orchestration]\ncycle = \"speed\"\n", "shadow an input feature")]
#[case("[orchestration]\ntrigger_step = -1\n", "trigger_step must be >= 0")]
#[case("[outputs]\ncorrection_x = \"c\"\ncorrection_y = \"c\"\n", "must be distinct")]
#[case("[correction]\ngain = 0.0\n", "correction.gain")]
#[case("[correction]\ninference_timeout_ms = 0\n", "inference_timeout_ms must be >= 1")]
#[case("[correction]\nqueue_capacity = 0\n", "queue_capacity must be >= 1")]
#[case("[server]\nreconnect_delay_ms = 0\n", "reconnect_delay_ms must be >= 1")]
#[case("[sim]\ndrop_features = [\"pressure\"]\n", "sim.drop_features")]
fn rejects_invalid_sections(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("config should be rejected");
    let msg = format!("{err}");
    assert!(msg.contains(needle), "expected '{needle}' in '{msg}'");
}

#[test]
fn rejects_coefficient_length_mismatch() {
    let toml = r#"
[model]
coef_x = [1.0, 2.0]
coef_y = [1.0, 2.0]
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("7 inputs but 2 coefficients");
    assert!(format!("{err}").contains("must have 7 entries"));
}

#[test]
fn model_feature_order_may_be_a_subset() {
    let toml = r#"
[model]
features = ["speed", "position_x"]
coef_x = [0.5, 0.1]
coef_y = [0.0, 0.2]
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("subset of inputs is fine");
}

#[test]
fn model_features_outside_inputs_are_rejected() {
    let toml = r#"
[features]
inputs = ["speed"]

[model]
features = ["speed", "position_x"]
coef_x = [0.5, 0.1]
coef_y = [0.0, 0.2]
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("position_x is not tracked");
    assert!(format!("{err}").contains("not in features.inputs"));
}

#[test]
fn rejects_zero_scaler_entry() {
    let toml = r#"
[features]
inputs = ["speed", "speed_next"]

[model]
coef_x = [0.5, 0.1]
coef_y = [0.0, 0.2]

[model.scaler]
mean = [0.0, 0.0]
scale = [1.0, 0.0]
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("zero scale divides by zero");
    assert!(format!("{err}").contains("non-zero"));
}

#[test]
fn missing_coefficients_fail_to_parse() {
    let toml = "[model]\ncoef_x = [1.0]\n";
    assert!(load_toml(toml).is_err());
}
