//! Process configuration from the environment

use crate::orchestrator::OrchestratorConfig;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TURN_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_TOOL_ROUNDS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Model credential. Absence is reported per request, not at startup.
    pub google_api_key: Option<String>,
    pub model: String,
    pub port: u16,
    pub turn_timeout: Duration,
    pub max_tool_rounds: u32,
    /// Override for the Gemini endpoint
    pub gemini_base_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            google_api_key: var("GOOGLE_API_KEY"),
            model: var("WAYFIND_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            port: parse_or(var("WAYFIND_PORT"), "WAYFIND_PORT", DEFAULT_PORT),
            turn_timeout: Duration::from_secs(parse_or(
                var("WAYFIND_TURN_TIMEOUT_SECS"),
                "WAYFIND_TURN_TIMEOUT_SECS",
                DEFAULT_TURN_TIMEOUT_SECS,
            )),
            max_tool_rounds: parse_or(
                var("WAYFIND_MAX_TOOL_ROUNDS"),
                "WAYFIND_MAX_TOOL_ROUNDS",
                DEFAULT_MAX_TOOL_ROUNDS,
            ),
            gemini_base_url: var("GEMINI_BASE_URL"),
        }
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            turn_timeout: self.turn_timeout,
            max_tool_rounds: self.max_tool_rounds,
        }
    }
}

fn parse_or<T: std::str::FromStr + Copy>(value: Option<String>, key: &str, default: T) -> T {
    match value {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Unparseable setting, using default");
            default
        }),
    }
}
