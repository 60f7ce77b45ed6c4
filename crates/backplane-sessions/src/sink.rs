//! Outbound RPC to the observability service (spec §4.F "Emission",
//! §6 "RPC `ingestSessionMetrics(payload)`").

use crate::error::Result;
use crate::types::SessionMetrics;
use async_trait::async_trait;

#[async_trait]
pub trait SessionMetricsSink: Send + Sync {
    async fn ingest_session_metrics(&self, metrics: &SessionMetrics) -> Result<()>;
}
