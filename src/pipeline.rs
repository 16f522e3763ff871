use crate::classify::partition_target;
use crate::config::LensConfig;
use crate::extract::{DisplayRecord, extract_display_fields};
use crate::lens::{LensClient, LensError};
use crate::models::{
    RawResultSet, SearchMode, SearchOutcome, SearchReport, SearchRequest, SnapshotStatus,
    StageReport, TargetMarketplace,
};
use crate::snapshot::{SnapshotKind, SnapshotWriter};
use serde_json::{Value, json};
use std::{future::Future, sync::Arc, time::Instant};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct Pipeline {
    pub config: Arc<LensConfig>,
    client: LensClient,
    snapshots: SnapshotWriter,
}

impl Pipeline {
    pub fn new(config: LensConfig) -> Result<Self, LensError> {
        let client = LensClient::new(&config)?;
        let snapshots = SnapshotWriter::new(config.snapshot_dir.clone());
        Ok(Self {
            config: Arc::new(config),
            client,
            snapshots,
        })
    }

    /// Direct: search → classify → persist.
    /// Expanded: fetch_token → (fetch_products → classify → persist) or, when
    /// no token comes back, persist the token response and stop.
    pub async fn run(&self, image_url: &str) -> Result<SearchReport, PipelineError> {
        let run_id = Uuid::new_v4().to_string();
        let mode = self.config.mode;
        let marketplace = self.config.marketplace;
        let mut stages = Vec::new();
        info!(
            target: "lens.pipeline",
            run_id = %run_id,
            mode = mode.as_str(),
            image_url = %image_url,
            "lens search started"
        );

        let (raw, kind) = match mode {
            SearchMode::Direct => {
                let request = SearchRequest::image(image_url);
                let raw = self
                    .capture_stage(
                        "search",
                        &mut stages,
                        stages::search(&self.client, &request),
                    )
                    .await?;
                (raw, SnapshotKind::Results)
            }
            SearchMode::Expanded => {
                let request = SearchRequest::image(image_url)
                    .localized(self.config.locale.as_str(), self.config.region.as_str());
                let step = self
                    .capture_stage(
                        "fetch_token",
                        &mut stages,
                        stages::fetch_token(&self.client, &request),
                    )
                    .await?;
                match step {
                    TokenStep::Obtained(token) => {
                        let raw = self
                            .capture_stage(
                                "fetch_products",
                                &mut stages,
                                stages::fetch_products(&self.client, &token),
                            )
                            .await?;
                        (raw, SnapshotKind::Products)
                    }
                    TokenStep::Missing(raw) => {
                        info!(target: "lens.pipeline", run_id = %run_id, "no products page token");
                        let snapshot = self.persist_snapshot(&raw, SnapshotKind::Token, &mut stages);
                        return Ok(SearchReport {
                            run_id,
                            mode,
                            marketplace,
                            image_url: image_url.to_string(),
                            outcome: SearchOutcome::NoToken,
                            total_matches: 0,
                            matches: Vec::new(),
                            snapshot,
                            stages,
                        });
                    }
                }
            }
        };

        let classification = self
            .capture_stage("classify", &mut stages, async {
                Ok(stages::classify(&raw, marketplace))
            })
            .await?;
        let snapshot = self.persist_snapshot(&raw, kind, &mut stages);

        let outcome = if classification.matches.is_empty() {
            SearchOutcome::NoMatches
        } else {
            SearchOutcome::Matches
        };
        info!(
            target: "lens.pipeline",
            run_id = %run_id,
            total = classification.total,
            target_matches = classification.matches.len(),
            "lens search completed"
        );

        Ok(SearchReport {
            run_id,
            mode,
            marketplace,
            image_url: image_url.to_string(),
            outcome,
            total_matches: classification.total,
            matches: classification.matches,
            snapshot,
            stages,
        })
    }

    // A failed write is logged and reported but does not fail the run.
    fn persist_snapshot(
        &self,
        raw: &RawResultSet,
        kind: SnapshotKind,
        stages: &mut Vec<StageReport>,
    ) -> SnapshotStatus {
        let started = Instant::now();
        let (status, output) = match self.snapshots.persist(raw, kind) {
            Ok(path) => {
                let output = json!({ "path": path.display().to_string() });
                (SnapshotStatus::Written { path }, output)
            }
            Err(err) => {
                warn!(
                    target: "lens.snapshot",
                    dir = %self.snapshots.dir().display(),
                    error = %err,
                    "snapshot_write_failed"
                );
                let reason = err.to_string();
                let output = json!({ "error": reason });
                (SnapshotStatus::Failed { reason }, output)
            }
        };
        let elapsed_ms = started.elapsed().as_millis();
        crate::metrics::stage_elapsed("persist_snapshot", elapsed_ms);
        stages.push(StageReport::new("persist_snapshot", elapsed_ms, output));
        status
    }

    async fn capture_stage<T, Fut>(
        &self,
        name: &'static str,
        stages: &mut Vec<StageReport>,
        fut: Fut,
    ) -> Result<T, PipelineError>
    where
        Fut: Future<Output = Result<StageOutcome<T>, PipelineError>>,
    {
        let started = Instant::now();
        let outcome = fut.await?;
        let elapsed_ms = started.elapsed().as_millis();
        crate::metrics::stage_elapsed(name, elapsed_ms);
        stages.push(StageReport::new(name, elapsed_ms, outcome.output));
        Ok(outcome.value)
    }
}

#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {message}")]
pub struct PipelineError {
    stage: &'static str,
    message: String,
    kind: PipelineErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    /// Network failure, timeout or non-success status.
    Transport,
    /// Body was not a JSON object.
    Parse,
}

impl PipelineError {
    pub fn transport(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::Transport,
        }
    }

    pub fn parse(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::Parse,
        }
    }

    pub fn from_lens(stage: &'static str, err: LensError) -> Self {
        match err {
            LensError::Parse(_) => Self::parse(stage, err.to_string()),
            LensError::Network(_) | LensError::Status { .. } | LensError::Setup(_) => {
                Self::transport(stage, err.to_string())
            }
        }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn kind(&self) -> PipelineErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.message
    }
}

#[derive(Debug)]
pub struct StageOutcome<T> {
    pub value: T,
    pub output: Value,
}

impl<T> StageOutcome<T> {
    fn new(value: T, output: Value) -> Self {
        Self { value, output }
    }
}

#[derive(Debug, Clone)]
pub enum TokenStep {
    Obtained(String),
    Missing(RawResultSet),
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub total: usize,
    pub matches: Vec<DisplayRecord>,
}

pub mod stages {
    use super::*;

    pub async fn search(
        client: &LensClient,
        request: &SearchRequest,
    ) -> Result<StageOutcome<RawResultSet>, PipelineError> {
        let result = client.search(request).await;
        crate::metrics::provider_request("search", &result);
        let raw = result.map_err(|err| PipelineError::from_lens("search", err))?;
        let output = result_summary(&raw);
        Ok(StageOutcome::new(raw, output))
    }

    pub async fn fetch_token(
        client: &LensClient,
        request: &SearchRequest,
    ) -> Result<StageOutcome<TokenStep>, PipelineError> {
        let result = client.search(request).await;
        crate::metrics::provider_request("fetch_token", &result);
        let raw = result.map_err(|err| PipelineError::from_lens("fetch_token", err))?;

        let token = raw.products_page_token().map(str::to_string);
        let mut output = json!({ "token_found": token.is_some() });
        if let Some(message) = raw.provider_message() {
            output["provider_message"] = json!(message);
        }
        let step = match token {
            Some(token) => TokenStep::Obtained(token),
            None => TokenStep::Missing(raw),
        };
        Ok(StageOutcome::new(step, output))
    }

    pub async fn fetch_products(
        client: &LensClient,
        page_token: &str,
    ) -> Result<StageOutcome<RawResultSet>, PipelineError> {
        let result = client.search(&SearchRequest::page(page_token)).await;
        crate::metrics::provider_request("fetch_products", &result);
        let raw = result.map_err(|err| PipelineError::from_lens("fetch_products", err))?;
        let output = result_summary(&raw);
        Ok(StageOutcome::new(raw, output))
    }

    pub fn classify(
        raw: &RawResultSet,
        marketplace: TargetMarketplace,
    ) -> StageOutcome<Classification> {
        let Some(matches) = raw.visual_matches() else {
            if let Some(message) = raw.provider_message() {
                info!(target: "lens.pipeline", provider_message = message, "no visual matches");
            }
            return StageOutcome::new(
                Classification {
                    total: 0,
                    matches: Vec::new(),
                },
                json!({ "visual_matches": false, "total": 0, "target": 0 }),
            );
        };

        let records: Vec<DisplayRecord> = partition_target(&matches, marketplace)
            .into_iter()
            .map(extract_display_fields)
            .collect();

        let output = json!({
            "visual_matches": true,
            "marketplace": marketplace.label(),
            "total": matches.len(),
            "target": records.len(),
        });
        StageOutcome::new(
            Classification {
                total: matches.len(),
                matches: records,
            },
            output,
        )
    }

    fn result_summary(raw: &RawResultSet) -> Value {
        let mut output = json!({
            "visual_matches": raw.visual_matches().map(|m| m.len()),
        });
        if let Some(message) = raw.provider_message() {
            output["provider_message"] = json!(message);
        }
        output
    }
}
