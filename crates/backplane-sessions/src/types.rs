//! Item stream and metrics-record types (spec §4.F).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Pending,
    Running,
    Completed,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Completed,
    Error,
    Interrupted,
    /// Not sent by any client; the default when the session times out
    /// without an explicit `session_close` (spec §4.F "Emission").
    Abandoned,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input: u64,
    #[serde(default)]
    pub output: u64,
    #[serde(default)]
    pub reasoning: u64,
    #[serde(default)]
    pub cache_read: u64,
    #[serde(default)]
    pub cache_write: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input + self.output + self.reasoning + self.cache_read + self.cache_write
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolPart {
    pub tool: String,
    pub status: ToolStatus,
    #[serde(default)]
    pub input: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionPart {
    pub auto: bool,
}

/// One item of the per-session append-only stream the aggregator ingests
/// (spec §4.F "Items accepted").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Item {
    Session {
        created: DateTime<Utc>,
        updated: DateTime<Utc>,
    },
    KiloMeta {
        platform: Option<String>,
        org_id: Option<String>,
    },
    Message {
        role: MessageRole,
        created: DateTime<Utc>,
        #[serde(default)]
        tokens: Option<TokenUsage>,
        #[serde(default)]
        cost: Option<f64>,
        #[serde(default)]
        error_name: Option<String>,
        #[serde(default)]
        finish: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    StepFinishPart,
    ToolPart(ToolPart),
    CompactionPart(CompactionPart),
    /// Any other part type (`text`, …): counted nowhere, carried only so the
    /// stream's ordering is preserved.
    OtherPart,
    SessionOpen,
    SessionClose {
        reason: CloseReason,
    },
}

/// The final per-session record (spec §4.F "Emission", §6 analytics schema).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub session_id: String,
    pub platform: String,
    pub organization_id: Option<String>,
    pub kilo_user_id: Option<String>,
    pub model: Option<String>,
    pub termination_reason: CloseReason,
    pub session_duration_ms: i64,
    pub time_to_first_response_ms: Option<i64>,
    pub total_turns: u64,
    pub total_steps: u64,
    pub tool_calls_by_type: HashMap<String, u64>,
    pub tool_errors_by_type: HashMap<String, u64>,
    pub total_errors: u64,
    pub errors_by_type: HashMap<String, u64>,
    pub stuck_tool_call_count: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub compaction_count: u64,
    pub auto_compaction_count: u64,
    pub ingest_version: u32,
}
