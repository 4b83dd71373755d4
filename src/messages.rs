/// Request/response protocol between the popup and the background worker
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ExtensionConfig;
use crate::error::{ErrorCode, ExtensionError};
use crate::grouping::GroupSpec;
use crate::sorting::SortSpec;
use crate::timing::now_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    SortTabs,
    GroupTabs,
    UngroupTabs,
    UpdateConfig,
    GetConfig,
    GetStats,
    ConfigUpdated,
}

/// Message as it arrives: a type tag and a type-specific payload
#[derive(Debug, Clone, Deserialize)]
pub struct RawMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

/// A decoded request. Option payloads left out fall back to the stored config.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    SortTabs(Option<SortSpec>),
    GroupTabs(Option<GroupSpec>),
    UngroupTabs,
    UpdateConfig(Value),
    GetConfig,
    GetStats,
}

fn optional_payload<T: serde::de::DeserializeOwned>(payload: Value) -> Result<Option<T>, ExtensionError> {
    if payload.is_null() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(payload)?))
}

impl Request {
    pub fn parse(message: Value) -> Result<Request, ExtensionError> {
        let raw: RawMessage = serde_json::from_value(message)?;
        let kind: MessageType = serde_json::from_value(Value::String(raw.kind.clone()))
            .map_err(|_| {
                ExtensionError::validation(format!("Unknown message type: {}", raw.kind))
                    .with_context("type", raw.kind.clone())
            })?;

        match kind {
            MessageType::SortTabs => Ok(Request::SortTabs(optional_payload(raw.payload)?)),
            MessageType::GroupTabs => Ok(Request::GroupTabs(optional_payload(raw.payload)?)),
            MessageType::UngroupTabs => Ok(Request::UngroupTabs),
            MessageType::UpdateConfig => {
                if !raw.payload.is_object() {
                    return Err(ExtensionError::validation("UPDATE_CONFIG needs an object payload"));
                }
                Ok(Request::UpdateConfig(raw.payload))
            }
            MessageType::GetConfig => Ok(Request::GetConfig),
            MessageType::GetStats => Ok(Request::GetStats),
            MessageType::ConfigUpdated => Err(ExtensionError::validation(
                "CONFIG_UPDATED is a broadcast, not a request",
            )),
        }
    }

    pub fn kind(&self) -> MessageType {
        match self {
            Request::SortTabs(_) => MessageType::SortTabs,
            Request::GroupTabs(_) => MessageType::GroupTabs,
            Request::UngroupTabs => MessageType::UngroupTabs,
            Request::UpdateConfig(_) => MessageType::UpdateConfig,
            Request::GetConfig => MessageType::GetConfig,
            Request::GetStats => MessageType::GetStats,
        }
    }
}

/// One response per request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    pub timestamp: f64,
}

impl Response {
    pub fn ok<T: Serialize>(data: &T) -> Response {
        match serde_json::to_value(data) {
            Ok(data) => Response {
                success: true,
                data: Some(data),
                error: None,
                code: None,
                timestamp: now_ms(),
            },
            Err(err) => Response::from_error(&ExtensionError::from(err).recode(ErrorCode::RuntimeError)),
        }
    }

    /// Data is attached, but `success` follows the operation outcome
    pub fn with_outcome<T: Serialize>(success: bool, data: &T) -> Response {
        let mut response = Response::ok(data);
        response.success = response.success && success;
        response
    }

    pub fn from_error(err: &ExtensionError) -> Response {
        Response {
            success: false,
            data: None,
            error: Some(err.message.clone()),
            code: Some(err.code),
            timestamp: now_ms(),
        }
    }
}

/// Sent to every extension page after the config changed
#[derive(Debug, Clone, Serialize)]
pub struct ConfigUpdated<'a> {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub data: &'a ExtensionConfig,
}

impl<'a> ConfigUpdated<'a> {
    pub fn new(config: &'a ExtensionConfig) -> Self {
        ConfigUpdated {
            kind: MessageType::ConfigUpdated,
            data: config,
        }
    }
}
