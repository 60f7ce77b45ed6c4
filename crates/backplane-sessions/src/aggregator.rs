//! Session Metrics Aggregator: a per-session durable actor that reduces an
//! append-only item stream into exactly one [`SessionMetrics`] emission
//! (spec §4.F).

use crate::canonical::canonical_json;
use crate::error::Result;
use crate::sink::SessionMetricsSink;
use crate::types::{CloseReason, Item, MessageRole, SessionMetrics};
use backplane_core::alarm::Alarm;
use backplane_core::storage::{get_json_best_effort, put_json, Durable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Spec §4.F "Alarm policy".
pub const POST_CLOSE_DRAIN_MS: i64 = 5_000;
pub const INACTIVITY_TIMEOUT_MS: i64 = 5 * 60 * 1_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct State {
    platform: Option<String>,
    organization_id: Option<String>,
    model: Option<String>,
    session_created: Option<DateTime<Utc>>,
    session_updated: Option<DateTime<Utc>>,
    first_user_created: Option<DateTime<Utc>>,
    first_assistant_created: Option<DateTime<Utc>>,
    total_turns: u64,
    total_steps: u64,
    tool_calls_by_type: HashMap<String, u64>,
    tool_errors_by_type: HashMap<String, u64>,
    total_errors: u64,
    errors_by_type: HashMap<String, u64>,
    tool_signature_counts: HashMap<String, u64>,
    total_tokens: u64,
    total_cost: f64,
    compaction_count: u64,
    auto_compaction_count: u64,
    close_reason: Option<CloseReason>,
    emitted: bool,
    ingest_version: u32,
}

pub struct SessionAggregator {
    durable: Arc<dyn Durable>,
    alarm: Arc<dyn Alarm>,
    sink: Arc<dyn SessionMetricsSink>,
    session_id: String,
    kilo_user_id: Option<String>,
    state: State,
}

impl SessionAggregator {
    pub fn new(
        durable: Arc<dyn Durable>,
        alarm: Arc<dyn Alarm>,
        sink: Arc<dyn SessionMetricsSink>,
        session_id: impl Into<String>,
        kilo_user_id: Option<String>,
    ) -> Self {
        Self {
            durable,
            alarm,
            sink,
            session_id: session_id.into(),
            kilo_user_id,
            state: State::default(),
        }
    }

    fn state_key(&self) -> String {
        format!("session/{}/state", self.session_id)
    }

    pub async fn load(&mut self) -> Result<()> {
        if let Some(state) = get_json_best_effort(self.durable.as_ref(), &self.state_key()).await? {
            self.state = state;
        }
        Ok(())
    }

    async fn persist(&self) -> Result<()> {
        put_json(self.durable.as_ref(), &self.state_key(), &self.state).await?;
        Ok(())
    }

    /// Ingest one stream item declared under `ingest_version` (0 or ≥1;
    /// spec §4.F "Alarm policy" names two dialects).
    ///
    /// A new ingest after a prior emission clears the emitted marker,
    /// treating it as a new turn (spec §4.F "Idempotence"), regardless of
    /// the declared version: v0's every-ingest alarm reset already implies
    /// this, and extending it uniformly avoids a second undocumented branch
    /// for the version ambiguity spec §9 calls out.
    pub async fn ingest(&mut self, item: Item, ingest_version: u32) -> Result<()> {
        if self.state.emitted {
            self.state.emitted = false;
        }
        self.state.ingest_version = ingest_version;

        self.apply(&item);

        let now = Utc::now();
        if ingest_version == 0 {
            self.alarm.set(now + chrono::Duration::milliseconds(INACTIVITY_TIMEOUT_MS)).await;
        } else {
            match &item {
                Item::SessionOpen => {
                    self.alarm.set(now + chrono::Duration::milliseconds(INACTIVITY_TIMEOUT_MS)).await;
                }
                Item::SessionClose { reason } => {
                    self.state.close_reason = Some(*reason);
                    self.alarm.set(now + chrono::Duration::milliseconds(POST_CLOSE_DRAIN_MS)).await;
                }
                _ => {}
            }
        }

        self.persist().await
    }

    fn apply(&mut self, item: &Item) {
        match item {
            Item::Session { created, updated } => {
                self.state.session_created = Some(*created);
                self.state.session_updated = Some(*updated);
            }
            Item::KiloMeta { platform, org_id } => {
                if let Some(platform) = platform {
                    if !platform.is_empty() {
                        self.state.platform = Some(platform.clone());
                    }
                }
                if let Some(org_id) = org_id {
                    if !org_id.is_empty() {
                        self.state.organization_id = Some(org_id.clone());
                    }
                }
            }
            Item::Message { role, created, tokens, cost, error_name, finish: _, model } => {
                match role {
                    MessageRole::User => {
                        self.state.total_turns += 1;
                        if self.state.first_user_created.is_none() {
                            self.state.first_user_created = Some(*created);
                        }
                    }
                    MessageRole::Assistant => {
                        if self.state.first_assistant_created.is_none() {
                            self.state.first_assistant_created = Some(*created);
                        }
                        if let Some(tokens) = tokens {
                            self.state.total_tokens += tokens.total();
                        }
                        if let Some(cost) = cost {
                            self.state.total_cost += cost;
                        }
                        if let Some(name) = error_name {
                            self.state.total_errors += 1;
                            *self.state.errors_by_type.entry(name.clone()).or_insert(0) += 1;
                        }
                        if let Some(model) = model {
                            self.state.model = Some(model.clone());
                        }
                    }
                }
            }
            Item::StepFinishPart => {
                self.state.total_steps += 1;
            }
            Item::ToolPart(tool) => {
                *self.state.tool_calls_by_type.entry(tool.tool.clone()).or_insert(0) += 1;

                let is_terminal = matches!(tool.status, crate::types::ToolStatus::Completed | crate::types::ToolStatus::Error);
                if tool.status == crate::types::ToolStatus::Error {
                    *self.state.tool_errors_by_type.entry(tool.tool.clone()).or_insert(0) += 1;
                    self.state.total_errors += 1;
                }
                if is_terminal {
                    let sig = format!("{}:{}", tool.tool, canonical_json(&tool.input));
                    *self.state.tool_signature_counts.entry(sig).or_insert(0) += 1;
                }
            }
            Item::CompactionPart(compaction) => {
                self.state.compaction_count += 1;
                if compaction.auto {
                    self.state.auto_compaction_count += 1;
                }
            }
            Item::OtherPart | Item::SessionOpen | Item::SessionClose { .. } => {}
        }
    }

    fn compute_metrics(&self) -> SessionMetrics {
        let session_duration_ms = match (self.state.session_created, self.state.session_updated) {
            (Some(created), Some(updated)) => (updated - created).num_milliseconds().max(0),
            _ => 0,
        };
        let time_to_first_response_ms = match (self.state.first_user_created, self.state.first_assistant_created) {
            (Some(user), Some(assistant)) => Some((assistant - user).num_milliseconds().max(0)),
            _ => None,
        };
        let stuck_tool_call_count = self.state.tool_signature_counts.values().filter(|&&c| c >= 3).sum();

        SessionMetrics {
            session_id: self.session_id.clone(),
            platform: self.state.platform.clone().unwrap_or_else(|| "unknown".to_string()),
            organization_id: self.state.organization_id.clone(),
            kilo_user_id: self.kilo_user_id.clone(),
            model: self.state.model.clone(),
            termination_reason: self.state.close_reason.unwrap_or(CloseReason::Abandoned),
            session_duration_ms,
            time_to_first_response_ms,
            total_turns: self.state.total_turns,
            total_steps: self.state.total_steps,
            tool_calls_by_type: self.state.tool_calls_by_type.clone(),
            tool_errors_by_type: self.state.tool_errors_by_type.clone(),
            total_errors: self.state.total_errors,
            errors_by_type: self.state.errors_by_type.clone(),
            stuck_tool_call_count,
            total_tokens: self.state.total_tokens,
            total_cost: self.state.total_cost,
            compaction_count: self.state.compaction_count,
            auto_compaction_count: self.state.auto_compaction_count,
            ingest_version: self.state.ingest_version,
        }
    }

    /// Emits exactly once; re-entering with the marker already set is a
    /// no-op returning `false` (spec §4.F "Idempotence").
    pub async fn emit(&mut self) -> Result<bool> {
        if self.state.emitted {
            return Ok(false);
        }
        let metrics = self.compute_metrics();
        self.sink.ingest_session_metrics(&metrics).await?;
        self.state.emitted = true;
        self.persist().await?;
        Ok(true)
    }

    /// Alarm handler: emit (idempotently) then unconditionally delete the
    /// alarm (spec §4.F "Deleting the alarm is mandatory after emission").
    pub async fn on_alarm(&mut self) -> Result<bool> {
        let result = self.emit().await;
        self.alarm.delete().await;
        result
    }
}
