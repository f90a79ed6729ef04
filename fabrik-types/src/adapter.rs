//! [`AdapterConfig`]: how to reach the AUT.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Request framing for the `http` adapter variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestFormat {
    /// Array of `{role, content}` — default.
    Messages,
    /// `{message, conversation_id}`.
    Legacy,
}

impl Default for RequestFormat {
    fn default() -> Self {
        Self::Messages
    }
}

/// How to reach the agent under test. Only `Http` is mandatory for the core
/// spec; the others are recorded so a config file can name a concrete
/// adapter even though only the HTTP one ships with this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AdapterConfig {
    Http {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        headers: Option<HashMap<String, String>>,
        #[serde(default)]
        request_format: RequestFormat,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body_template: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response_parser: Option<String>,
        #[serde(default)]
        streaming: bool,
    },
    Subprocess {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cwd: Option<String>,
    },
    OpenaiAssistant {
        assistant_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
    },
    Custom {
        module: String,
    },
}
