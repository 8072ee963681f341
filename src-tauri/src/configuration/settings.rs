use log::{warn, LevelFilter};
use serde_derive::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_API_ENDPOINT: &str =
    "https://litellm.ai-sandbox.azure.to2cz.cz/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_LAUNCH_HOTKEY: &str = "ctrl+shift+t";
pub const DEFAULT_LOGGING_LEVEL: &str = "INFO";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub api_key: String,
    pub api_endpoint: String,
    pub model: String,
    pub launch_hotkey: String,
    pub first_run: bool,
    pub logging_level: String,
    pub system_prompt: String,
    pub request_timeout_secs: u64,
    pub auto_start: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            launch_hotkey: DEFAULT_LAUNCH_HOTKEY.to_string(),
            first_run: true,
            logging_level: DEFAULT_LOGGING_LEVEL.to_string(),
            system_prompt: String::new(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            auto_start: false,
        }
    }
}

impl Settings {
    /// Builds settings from an on-disk JSON object, keeping the default for any
    /// field that is missing or holds a value of the wrong JSON type.
    pub fn from_partial(object: &Map<String, Value>) -> Settings {
        let defaults = Settings::default();
        let mut merged = match serde_json::to_value(&defaults) {
            Ok(Value::Object(map)) => map,
            _ => return defaults,
        };

        for (key, value) in object {
            match merged.get_mut(key) {
                Some(slot) if same_kind(slot, value) => *slot = value.clone(),
                Some(_) => warn!("Ignoring setting `{}`: unexpected value {}", key, value),
                None => warn!("Ignoring unknown setting `{}`", key),
            }
        }

        serde_json::from_value(Value::Object(merged)).unwrap_or_else(|err| {
            warn!("Falling back to default settings: {}", err);
            defaults
        })
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        let secs = match self.request_timeout_secs {
            0 => DEFAULT_REQUEST_TIMEOUT_SECS,
            secs => secs,
        };
        std::time::Duration::from_secs(secs)
    }

    pub fn log_level(&self) -> LevelFilter {
        log_level_filter(&self.logging_level)
    }
}

fn same_kind(current: &Value, candidate: &Value) -> bool {
    match (current, candidate) {
        (Value::String(_), Value::String(_)) => true,
        (Value::Bool(_), Value::Bool(_)) => true,
        // request_timeout_secs is unsigned, so negative or fractional numbers are rejected
        (Value::Number(_), Value::Number(n)) => n.is_u64(),
        _ => false,
    }
}

/// Maps the persisted level name onto a log filter. CRITICAL has no direct
/// counterpart in `log` and is treated as Error.
pub fn log_level_filter(level: &str) -> LevelFilter {
    match level.trim().to_ascii_uppercase().as_str() {
        "DEBUG" => LevelFilter::Debug,
        "INFO" => LevelFilter::Info,
        "WARNING" | "WARN" => LevelFilter::Warn,
        "ERROR" | "CRITICAL" => LevelFilter::Error,
        "TRACE" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.api_key, "");
        assert_eq!(settings.api_endpoint, DEFAULT_API_ENDPOINT);
        assert_eq!(settings.model, "gpt-4o");
        assert_eq!(settings.launch_hotkey, "ctrl+shift+t");
        assert!(settings.first_run);
        assert!(!settings.auto_start);
        assert_eq!(settings.request_timeout_secs, 30);
    }

    #[test]
    fn partial_object_is_filled_with_defaults() {
        let settings = Settings::from_partial(&object(json!({
            "api_key": "k",
            "model": "m",
            "first_run": false
        })));

        assert_eq!(settings.api_key, "k");
        assert_eq!(settings.model, "m");
        assert!(!settings.first_run);
        assert_eq!(settings.api_endpoint, DEFAULT_API_ENDPOINT);
        assert_eq!(settings.launch_hotkey, DEFAULT_LAUNCH_HOTKEY);
    }

    #[test]
    fn mistyped_fields_keep_their_defaults() {
        let settings = Settings::from_partial(&object(json!({
            "api_key": 42,
            "first_run": "no",
            "request_timeout_secs": -5,
            "model": null,
            "launch_hotkey": "alt+t",
            "unknown": true
        })));

        assert_eq!(settings.api_key, "");
        assert!(settings.first_run);
        assert_eq!(settings.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(settings.model, DEFAULT_MODEL);
        assert_eq!(settings.launch_hotkey, "alt+t");
    }

    #[test]
    fn zero_timeout_uses_default() {
        let settings = Settings {
            request_timeout_secs: 0,
            ..Settings::default()
        };
        assert_eq!(settings.request_timeout().as_secs(), 30);
    }

    #[test]
    fn level_names_map_to_filters() {
        assert_eq!(log_level_filter("debug"), LevelFilter::Debug);
        assert_eq!(log_level_filter("WARNING"), LevelFilter::Warn);
        assert_eq!(log_level_filter("CRITICAL"), LevelFilter::Error);
        assert_eq!(log_level_filter(" info "), LevelFilter::Info);
        assert_eq!(log_level_filter("verbose"), LevelFilter::Info);
    }
}
