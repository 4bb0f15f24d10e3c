//! Terminal rendering for responses and errors

use leadflow_api_client::{ApiError, ApiResponse, HttpMethod};
use leadflow_telemetry::metrics as registry;
use owo_colors::OwoColorize;
use serde_json::{json, Value};
use uuid::Uuid;

/// Print a successful response
pub fn response(method: HttpMethod, path: &str, response: &ApiResponse<Value>, json: bool) {
    if json {
        println!("{}", serde_json::to_string_pretty(response).unwrap_or_default());
        return;
    }

    let source = if response.cached { " (cached)" } else { "" };
    println!(
        "{} {} {}{}",
        method.as_str().bold(),
        path,
        response.status.to_string().green(),
        source.dimmed()
    );

    if !response.data.is_null() {
        println!(
            "{}",
            serde_json::to_string_pretty(&response.data).unwrap_or_default()
        );
    }
}

/// Print the "queued while offline" notice
pub fn queued(queued_id: Option<Uuid>, json: bool) {
    if json {
        println!("{}", json!({ "queued": true, "id": queued_id }));
        return;
    }

    match queued_id {
        Some(id) => eprintln!("{} Offline; request queued as {}", "⚠".yellow(), id),
        None => eprintln!("{} Offline; request not sent", "⚠".yellow()),
    }
}

/// Print the server's error body, if any
pub fn api_error(err: &ApiError, json: bool) {
    let Some(body) = err.body() else {
        return;
    };

    if json {
        println!("{}", json!({ "status": err.status(), "error": body }));
    } else {
        eprintln!("{}", serde_json::to_string_pretty(body).unwrap_or_default().dimmed());
    }
}

/// Dump the client metrics to stderr
pub fn metrics() {
    eprintln!(
        "{}",
        serde_json::to_string_pretty(&registry().export_json()).unwrap_or_default().dimmed()
    );
}

