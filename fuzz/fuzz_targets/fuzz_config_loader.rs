#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validate arbitrary TOML; errors are fine, panics are not.
    if let Ok(cfg) = toml::from_str::<corrector_config::Config>(data) {
        if cfg.validate().is_ok() {
            // A validated config must convert cleanly.
            let _ = corrector_core::HandlerCfg::try_from(&cfg).expect("validated inputs parse");
            if let Some(model) = &cfg.model {
                let _ = corrector_core::conversions::linear_model(model, &cfg.features.inputs)
                    .expect("validated model builds");
            }
        }
    }
});
