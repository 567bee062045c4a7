// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Structured log records in the Cloud Logging `LogEntry` shape.
//!
//! These are plain serde types for services that ship audit records to a log
//! sink; they are independent of the `tracing` output.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub service: String,
    pub log_name: String,
    pub resource: Resource,
    /// RFC 3339 timestamp.
    pub timestamp: String,
    pub level: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub insert_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_request: Option<HttpRequest>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text_payload: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub json_payload: HashMap<String, serde_json::Value>,
}

/// Monitored resource the entry belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequest {
    pub request_method: String,
    pub request_url: String,
    pub status: u16,
    pub user_agent: String,
    pub remote_ip: String,
}

/// Envelope used when records are published as messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogData {
    pub log: LogEntry,
}

impl LogEntry {
    /// New entry stamped with the current time.
    pub fn new(
        service: impl Into<String>,
        log_name: impl Into<String>,
        level: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            log_name: log_name.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: level.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_resource(mut self, resource_type: impl Into<String>) -> Self {
        self.resource.resource_type = resource_type.into();
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.resource.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.json_payload.insert(key.into(), value);
        self
    }

    pub fn into_data(self) -> LogData {
        LogData { log: self }
    }
}
