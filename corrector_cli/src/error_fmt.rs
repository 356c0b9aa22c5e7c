//! Human-readable error descriptions and structured JSON error formatting.

use corrector_core::error::{BuildError, CorrectorError, InferenceError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingModel => {
                "What happened: No error model is configured.\nLikely causes: The config has no [model] section.\nHow to fix: Add [model] with coef_x and coef_y (one entry per input feature), then rerun.".to_string()
            }
            BuildError::MissingWriter => {
                "What happened: No writer for the correction outputs.\nLikely causes: The session did not provide a write channel.\nHow to fix: Check the server connection and output point names.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun `corrector check-config`."
            ),
        };
    }

    if let Some(ce) = err.downcast_ref::<CorrectorError>() {
        return match ce {
            CorrectorError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: The binding table or [features]/[orchestration] names do not match the server.\nHow to fix: Fix the names in the config or the binding CSV, then rerun `corrector check-config`."
            ),
            CorrectorError::Transport(msg) => format!(
                "What happened: Could not establish a session ({msg}).\nLikely causes: Server unreachable or the client was interrupted while retrying.\nHow to fix: Check server.url and network access; raise server.reconnect_delay_ms if the server restarts slowly."
            ),
            CorrectorError::Inference(InferenceError::Timeout(d)) => format!(
                "What happened: The error model did not answer within {d:?}.\nLikely causes: Model too slow for the cycle rate.\nHow to fix: Raise correction.inference_timeout_ms."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("invalid configuration") || lower.contains("must be") || lower.contains("must not") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: Out-of-range or inconsistent values in the TOML.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 2 for configuration problems, 3 for transport, 1 otherwise.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 2;
    }
    match err.downcast_ref::<CorrectorError>() {
        Some(CorrectorError::Config(_)) => 2,
        Some(CorrectorError::Transport(_)) => 3,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingModel => "MissingModel",
            BuildError::MissingWriter => "MissingWriter",
            BuildError::InvalidConfig(_) => "InvalidConfig",
        };
    }
    match err.downcast_ref::<CorrectorError>() {
        Some(CorrectorError::Config(_)) => "Config",
        Some(CorrectorError::Transport(_)) => "Transport",
        Some(CorrectorError::Inference(_)) => "Inference",
        Some(CorrectorError::Write { .. }) => "Write",
        Some(CorrectorError::State(_)) => "State",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
