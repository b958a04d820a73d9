//! `net.http`: the single network-side-effect tool.
//!
//! Builds the request deterministically from its arguments. Responses are
//! truncated at a fixed size so outputs stay bounded for the trace.

use std::time::Duration;

use serde_json::{json, Map, Value};
use tracing::debug;

use super::{require_str, ToolError};

/// Maximum response body size carried back into the trace.
const MAX_RESPONSE_BODY_BYTES: usize = 64 * 1024;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_S: f64 = 10.0;

fn parse_headers(args: &Value) -> Result<Vec<(String, String)>, ToolError> {
    let mut headers = Vec::new();
    match args.get("headers") {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => {
            for (key, value) in map {
                let value = value.as_str().ok_or_else(|| {
                    ToolError::InvalidInput(
                        "net.http: 'headers' must be an object of string->string".to_owned(),
                    )
                })?;
                headers.push((key.clone(), value.to_owned()));
            }
        }
        Some(_) => {
            return Err(ToolError::InvalidInput(
                "net.http: 'headers' must be an object of string->string".to_owned(),
            ))
        }
    }
    Ok(headers)
}

/// Issue an HTTP request.
pub fn http(args: &Value, dry_run: bool) -> Result<Value, ToolError> {
    let method = args
        .get("method")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or("POST")
        .to_uppercase();
    let url = require_str(args, "net.http", "url")?;
    let mut headers = parse_headers(args)?;

    let timeout_s = match args.get("timeout_s").and_then(Value::as_f64) {
        Some(t) if t > 0.0 => t,
        _ => DEFAULT_TIMEOUT_S,
    };

    // A json payload wins over a raw body and defaults the content type.
    let mut body: Option<Vec<u8>> = None;
    match args.get("json") {
        Some(Value::Null) | None => {
            if let Some(raw) = args.get("body") {
                if !raw.is_null() {
                    let text = raw.as_str().ok_or_else(|| {
                        ToolError::InvalidInput(
                            "net.http: 'body' must be a string when provided".to_owned(),
                        )
                    })?;
                    body = Some(text.as_bytes().to_vec());
                }
            }
        }
        Some(payload) => {
            body = Some(
                serde_json::to_vec(payload)
                    .map_err(|e| ToolError::InvalidInput(format!("net.http: bad json payload: {e}")))?,
            );
            let has_content_type = headers
                .iter()
                .any(|(k, _)| k.eq_ignore_ascii_case("content-type"));
            if !has_content_type {
                headers.push((
                    "Content-Type".to_owned(),
                    "application/json; charset=utf-8".to_owned(),
                ));
            }
        }
    }

    if dry_run {
        return Ok(json!({
            "dry_run": true,
            "expected_effects": [{
                "kind": "net_http",
                "summary": format!("HTTP {method} {url}"),
                "resources": [url],
            }],
        }));
    }

    debug!(%method, url, "net.http request");

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs_f64(timeout_s))
        .build()
        .map_err(|e| ToolError::Http(format!("failed to build client: {e}")))?;

    let method = reqwest::Method::from_bytes(method.as_bytes())
        .map_err(|_| ToolError::InvalidInput(format!("net.http: unsupported method: {method}")))?;

    let mut request = client.request(method, url);
    for (key, value) in &headers {
        request = request.header(key, value);
    }
    if let Some(bytes) = body {
        request = request.body(bytes);
    }

    let response = request
        .send()
        .map_err(|e| ToolError::Http(format!("request failed: {e}")))?;

    let status = response.status().as_u16();
    let mut response_headers = Map::new();
    for (key, value) in response.headers() {
        response_headers.insert(
            key.as_str().to_owned(),
            Value::String(value.to_str().unwrap_or_default().to_owned()),
        );
    }

    let bytes = response
        .bytes()
        .map_err(|e| ToolError::Http(format!("failed to read response body: {e}")))?;
    let truncated = bytes.len() > MAX_RESPONSE_BODY_BYTES;
    let cut = bytes.len().min(MAX_RESPONSE_BODY_BYTES);
    let body_text = String::from_utf8_lossy(&bytes[..cut]).into_owned();

    Ok(json!({
        "dry_run": false,
        "status": status,
        "headers": Value::Object(response_headers),
        "body_text": body_text,
        "truncated": truncated,
    }))
}
