//! HTTP facade handlers, independent of any web framework.
//!
//! Each handler takes the gateway and returns a status code plus JSON body;
//! the route layer only has to match paths and write responses.

use serde::Serialize;
use serde_json::{Value, json};

use crate::gateway::Gateway;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            body: json!({ "success": false, "message": message }),
        }
    }
}

/// `GET /api/weight/latest`
pub fn weight_latest(gw: &Gateway) -> ApiResponse {
    match gw.latest_weight() {
        Some(s) => ApiResponse::ok(json!({ "success": true, "data": s })),
        None => ApiResponse::error(404, "No weight data available"),
    }
}

/// Parse a `limit` query value; missing, non-numeric and zero fall back to
/// `default`. A leading integer is accepted (`"10abc"` is 10).
pub fn parse_limit(raw: Option<&str>, default: usize) -> usize {
    let Some(raw) = raw else {
        return default;
    };
    let t = raw.trim_start();
    let (sign, digits) = match t.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, t.strip_prefix('+').unwrap_or(t)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    match digits[..end].parse::<usize>() {
        Ok(0) | Err(_) => default,
        Ok(_) if sign < 0 => default,
        Ok(n) => n,
    }
}

/// `GET /api/weight/history?limit=N`
pub fn weight_history(gw: &Gateway, limit: Option<&str>) -> ApiResponse {
    let limit = parse_limit(limit, gw.cfg().history_default_limit);
    let data = gw.weight_history(limit);
    ApiResponse::ok(json!({ "success": true, "count": data.len(), "data": data }))
}

/// `GET /api/weight/stats`
pub fn weight_stats(gw: &Gateway) -> ApiResponse {
    match gw.statistics() {
        Some(s) => ApiResponse::ok(json!({ "success": true, "data": s })),
        None => ApiResponse::error(404, "No weight data available"),
    }
}

/// `POST /api/led/control` with body `{"command": ...}`.
pub fn led_control(gw: &mut Gateway, body: &Value) -> ApiResponse {
    let command = match body.get("command") {
        Some(Value::String(s)) if !s.is_empty() => s.as_str(),
        _ => return ApiResponse::error(400, "Command is required"),
    };
    let sent = gw.send_indicator(command);
    let message = if sent {
        format!("LED command sent: {command}")
    } else {
        "Failed to send LED command".to_string()
    };
    ApiResponse::ok(json!({ "success": sent, "message": message }))
}

/// `GET /api/status`
pub fn status(gw: &Gateway) -> ApiResponse {
    ApiResponse::ok(json!({
        "success": true,
        "connected": gw.is_connected(),
        "topic": gw.cfg().legacy_topic,
        "broker": gw.cfg().broker,
    }))
}

/// `GET /api/system/status`
pub fn system_status(gw: &Gateway) -> ApiResponse {
    ApiResponse::ok(json!({ "success": true, "data": gw.status() }))
}

/// `GET /api/history` (legacy history, oldest first)
pub fn history(gw: &Gateway) -> ApiResponse {
    ApiResponse::ok(json!({ "success": true, "data": gw.legacy_history() }))
}

/// Dispatch `METHOD /path?query` to a handler. Unknown routes give 404.
pub fn route(gw: &mut Gateway, method: &str, target: &str, body: Option<&Value>) -> ApiResponse {
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let limit = query
        .split('&')
        .filter_map(|kv| kv.split_once('='))
        .find(|(k, _)| *k == "limit")
        .map(|(_, v)| v);
    match (method.to_ascii_uppercase().as_str(), path) {
        ("GET", "/api/weight/latest") => weight_latest(gw),
        ("GET", "/api/weight/history") => weight_history(gw, limit),
        ("GET", "/api/weight/stats") => weight_stats(gw),
        ("POST", "/api/led/control") => led_control(gw, body.unwrap_or(&Value::Null)),
        ("GET", "/api/status") => status(gw),
        ("GET", "/api/system/status") => system_status(gw),
        ("GET", "/api/history") => history(gw),
        _ => ApiResponse::error(404, "Not found"),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_limit;

    #[test]
    fn limit_parsing_falls_back_to_default() {
        assert_eq!(parse_limit(None, 50), 50);
        assert_eq!(parse_limit(Some("10"), 50), 10);
        assert_eq!(parse_limit(Some("10abc"), 50), 10);
        assert_eq!(parse_limit(Some("abc"), 50), 50);
        assert_eq!(parse_limit(Some("0"), 50), 50);
        assert_eq!(parse_limit(Some("-3"), 50), 50);
        assert_eq!(parse_limit(Some(""), 50), 50);
    }
}
