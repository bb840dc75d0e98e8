use crate::util::parse_bool_str;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::{IsTerminal, Write};

const DEFAULT_LOG_PATH: &str = "/tmp/vexchat-debug.log";
const DEBUG_PAYLOAD_ENV: &str = "VEXCHAT_DEBUG_PAYLOAD";
const LOG_PATH_ENV: &str = "VEXCHAT_LOG_PATH";

pub fn debug_payload_enabled() -> bool {
    std::env::var(DEBUG_PAYLOAD_ENV)
        .ok()
        .and_then(|value| parse_bool_str(&value))
        .unwrap_or(false)
}

pub fn emit_debug_payload(request_url: &str, payload: &Value) {
    let formatted_payload = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|_| "<payload serialization error>".to_string());
    let message =
        format!("VEXCHAT DEBUG payload_request url={request_url}\npayload:\n{formatted_payload}\n");
    emit_log_message(&message);
}

pub fn emit_sse_parse_error(json_data: &str, parse_error: &serde_json::Error) {
    let message =
        format!("VEXCHAT ERROR sse_parse_failed error={parse_error}\ndata:\n{json_data}\n");
    emit_log_message(&message);
}

pub fn emit_sse_incomplete_event(data: &str) {
    let message = format!(
        "VEXCHAT WARN sse_incomplete_event bytes={}\ndata:\n{data}\n",
        data.len()
    );
    emit_log_message(&message);
}

pub fn emit_turn_error(error: &anyhow::Error) {
    let message = format!("VEXCHAT ERROR turn_failed error={error:#}\n");
    emit_log_message(&message);
}

pub fn emit_task_panic(task: &str, detail: &str) {
    let message = format!("VEXCHAT ERROR task_panicked task={task} detail={detail}\n");
    emit_log_message(&message);
}

fn emit_log_message(message: &str) {
    if let Some(path) = resolve_log_path() {
        if append_log_file(&path, message).is_ok() {
            return;
        }
    }

    eprintln!("{message}");
}

fn resolve_log_path() -> Option<String> {
    std::env::var(LOG_PATH_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            if std::io::stderr().is_terminal() {
                Some(DEFAULT_LOG_PATH.to_string())
            } else {
                None
            }
        })
}

fn append_log_file(path: &str, message: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(message.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_payload_enabled_accepts_true_variants() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var(DEBUG_PAYLOAD_ENV, "1");
        assert!(debug_payload_enabled());
        std::env::set_var(DEBUG_PAYLOAD_ENV, "TRUE");
        assert!(debug_payload_enabled());
        std::env::set_var(DEBUG_PAYLOAD_ENV, "nope");
        assert!(!debug_payload_enabled());
        std::env::remove_var(DEBUG_PAYLOAD_ENV);
    }

    #[test]
    fn test_resolve_log_path_uses_env_override() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var(LOG_PATH_ENV, "/tmp/test-vexchat.log");
        assert_eq!(resolve_log_path().as_deref(), Some("/tmp/test-vexchat.log"));
        std::env::remove_var(LOG_PATH_ENV);
    }

    #[test]
    fn test_turn_error_is_appended_to_log_file() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("vexchat.log");
        std::env::set_var(LOG_PATH_ENV, &path);

        emit_turn_error(&anyhow::anyhow!("stream reset"));
        emit_task_panic("request", "boom");
        emit_sse_incomplete_event("data: {\"cho");

        let logged = std::fs::read_to_string(&path).expect("log file should exist");
        assert!(logged.contains("turn_failed error=stream reset"));
        assert!(logged.contains("task_panicked task=request detail=boom"));
        assert!(logged.contains("sse_incomplete_event bytes=11"));
        std::env::remove_var(LOG_PATH_ENV);
    }
}
