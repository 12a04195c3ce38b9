//! Human-readable error descriptions and structured JSON error formatting.

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use winder_core::error::{BuildError, EstimatorError};

    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML sections [inertia], [radius], [tension], [span] or [friction].\nHow to fix: Edit the config file, then rerun `winder check-config`."
            ),
        };
    }

    if let Some(ee) = err.downcast_ref::<EstimatorError>() {
        return format!(
            "What happened: {ee}.\nLikely causes: Degenerate or non-finite samples in the trace.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
        );
    }

    // String-based heuristics for errors coming from config or trace loading
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("trace csv must have headers") {
        return format!(
            "Invalid headers in trace CSV. Expected '{}' with an optional trailing '{}'.",
            winder_config::TRACE_HEADERS.join(","),
            winder_config::TRACE_OPTIONAL_HEADER
        );
    }

    if lower.contains("open trace csv") {
        return format!(
            "What happened: Could not open the trace file.\nLikely causes: Wrong path or missing read permission.\nHow to fix: Check the --trace argument. Original: {msg}"
        );
    }

    if lower.contains("invalid csv row") || lower.contains("has no samples") {
        return format!(
            "What happened: The trace CSV could not be used ({msg}).\nLikely causes: Non-numeric cells, missing columns, or an empty recording.\nHow to fix: Re-export the trace with one numeric sample per row."
        );
    }

    if lower.contains("timestamps must be non-decreasing") {
        return format!(
            "What happened: {msg}.\nLikely causes: Rows were concatenated from several recordings or sorted incorrectly.\nHow to fix: Sort the trace by `t` or split it into separate runs."
        );
    }

    if lower.contains(" must be ") && (lower.contains('.') || lower.contains("invalid config")) {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: A value outside its allowed range.\nHow to fix: Edit the TOML config and try again."
        );
    }

    if lower.contains("parse config") || lower.contains("read config") {
        return format!(
            "What happened: The config file could not be read.\nLikely causes: Wrong path, TOML syntax error, or a value of the wrong type.\nHow to fix: Fix the file named in the message. Original: {msg}"
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

/// Stable exit codes: 2 for configuration problems, 3 for trace problems, 1 otherwise.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match reason_name(err) {
        "Config" => 2,
        "Trace" => 3,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err
        .downcast_ref::<winder_core::error::BuildError>()
        .is_some()
    {
        return "Config";
    }
    let lower = err.to_string().to_ascii_lowercase();
    if lower.contains("trace") || lower.contains("csv") {
        "Trace"
    } else if lower.contains("config") || lower.contains(" must be ") {
        "Config"
    } else {
        "Error"
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}
