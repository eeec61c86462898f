//! Job processor — single-flight FIFO queue driving the agent chain.
//!
//! One owning drain task reads job ids from a channel, so the queue is
//! consumed strictly in enqueue order and at most one job is ever in flight
//! per processor instance. Generation is dominated by model-call latency,
//! not CPU; horizontal throughput comes from running multiple process
//! instances.
//!
//! A failure in one job never aborts the queue: everything a job does
//! (fetching its generation parameters, running the chain, persisting the
//! result) is caught at the per-job boundary and mapped to FAILED.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::blueprint::report::assemble_strategy;
use crate::cache::{CacheService, Namespace};
use crate::chain::{ChainAgent, ChainOrchestrator, ChainProgress};
use crate::config::JobConfig;
use crate::downstream::AgentServiceClient;
use crate::error::{ChainError, Error, JobError};
use crate::jobs::model::{Job, JobStatus};
use crate::store::BlueprintStore;

/// Shared dependencies for job processing.
pub struct ProcessorDeps {
    pub orchestrator: ChainOrchestrator,
    pub agents: Vec<Arc<dyn ChainAgent>>,
    pub cache: Arc<CacheService>,
    pub store: Arc<dyn BlueprintStore>,
    /// Optional report-composition service invoked after the chain.
    pub writer: Option<AgentServiceClient>,
}

/// Accepts creation requests and drives them through the orchestrator.
pub struct JobProcessor {
    deps: ProcessorDeps,
    config: JobConfig,
    jobs: RwLock<HashMap<Uuid, Job>>,
    /// Latest job per subject.
    by_subject: RwLock<HashMap<String, Uuid>>,
    /// Active-generation lease: at most one live job per subject.
    leases: Mutex<HashMap<String, Uuid>>,
    queue_tx: mpsc::UnboundedSender<Uuid>,
    queue_rx: Mutex<Option<mpsc::UnboundedReceiver<Uuid>>>,
    drain_handle: Mutex<Option<JoinHandle<()>>>,
}

impl JobProcessor {
    pub fn new(deps: ProcessorDeps, config: JobConfig) -> Arc<Self> {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            deps,
            config,
            jobs: RwLock::new(HashMap::new()),
            by_subject: RwLock::new(HashMap::new()),
            leases: Mutex::new(HashMap::new()),
            queue_tx,
            queue_rx: Mutex::new(Some(queue_rx)),
            drain_handle: Mutex::new(None),
        })
    }

    /// Start the drain loop. Idempotent: a second call is a no-op.
    pub async fn start(self: &Arc<Self>) {
        let Some(rx) = self.queue_rx.lock().await.take() else {
            return;
        };
        let processor = Arc::clone(self);
        let handle = tokio::spawn(async move {
            processor.drain(rx).await;
        });
        *self.drain_handle.lock().await = Some(handle);
        info!("Job processor drain loop started");
    }

    /// Stop the drain loop. In-flight work is abandoned; queued jobs stay
    /// PENDING.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.drain_handle.lock().await.take() {
            handle.abort();
            info!("Job processor drain loop stopped");
        }
    }

    /// Allocate a PENDING job for `subject_id` and enqueue it. Returns
    /// immediately; generation happens on the drain loop.
    pub async fn create_job(&self, subject_id: &str) -> Result<Uuid, JobError> {
        let job = Job::new(subject_id);
        let job_id = job.id;

        // Check-and-set the subject lease before the job becomes visible.
        {
            let mut leases = self.leases.lock().await;
            if let Some(active) = leases.get(subject_id) {
                return Err(JobError::SubjectBusy {
                    subject_id: subject_id.to_string(),
                    job_id: *active,
                });
            }
            leases.insert(subject_id.to_string(), job_id);
        }

        self.jobs.write().await.insert(job_id, job);
        self.by_subject
            .write()
            .await
            .insert(subject_id.to_string(), job_id);

        if self.queue_tx.send(job_id).is_err() {
            // Drain channel closed; roll the job back out.
            self.jobs.write().await.remove(&job_id);
            self.leases.lock().await.remove(subject_id);
            return Err(JobError::ShutDown);
        }

        info!(%job_id, subject_id, "Job created and queued");
        Ok(job_id)
    }

    pub async fn get_job(&self, job_id: Uuid) -> Option<Job> {
        self.jobs.read().await.get(&job_id).cloned()
    }

    /// Latest job for a subject.
    pub async fn get_job_by_subject(&self, subject_id: &str) -> Option<Job> {
        let job_id = *self.by_subject.read().await.get(subject_id)?;
        self.get_job(job_id).await
    }

    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    async fn drain(self: &Arc<Self>, mut rx: mpsc::UnboundedReceiver<Uuid>) {
        while let Some(job_id) = rx.recv().await {
            self.process(job_id).await;
        }
        debug!("Job queue channel closed, drain loop exiting");
    }

    /// Process one job to a terminal state. Never propagates errors.
    async fn process(self: &Arc<Self>, job_id: Uuid) {
        let Some(subject_id) = self
            .with_job(job_id, |job| {
                job.transition_to(JobStatus::Processing).ok();
                job.update_progress(0, "Starting");
                job.subject_id.clone()
            })
            .await
        else {
            warn!(%job_id, "Dequeued job no longer exists, skipping");
            return;
        };

        info!(%job_id, subject_id, "Processing job");
        let started = Instant::now();

        let outcome = tokio::time::timeout(
            self.config.job_budget,
            self.run_pipeline(job_id, &subject_id, started),
        )
        .await;

        match outcome {
            Ok(Ok(strategy)) => {
                self.with_job(job_id, |job| {
                    if let Err(e) = job.complete(strategy) {
                        warn!(%job_id, error = %e, "Completion transition rejected");
                    }
                })
                .await;
                info!(
                    %job_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Job completed"
                );
            }
            Ok(Err(e)) => {
                error!(%job_id, error = %e, "Job failed");
                self.fail_job(job_id, e.to_string()).await;
            }
            Err(_) => {
                error!(%job_id, budget = ?self.config.job_budget, "Job exceeded wall-clock budget");
                self.fail_job(
                    job_id,
                    format!("Generation timed out after {:?}", self.config.job_budget),
                )
                .await;
            }
        }

        self.leases.lock().await.remove(&subject_id);
    }

    async fn run_pipeline(
        self: &Arc<Self>,
        job_id: Uuid,
        subject_id: &str,
        started: Instant,
    ) -> Result<serde_json::Value, Error> {
        let input = self.deps.store.generation_input(subject_id).await?;

        self.with_job(job_id, |job| job.update_progress(10, "Initializing analysis"))
            .await;

        // Forward chain progress events onto the job record as they arrive.
        let (tx, mut rx) = mpsc::unbounded_channel::<ChainProgress>();
        let forwarder = {
            let processor = Arc::clone(self);
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    processor
                        .with_job(job_id, |job| {
                            job.update_progress(event.percent, event.step.clone())
                        })
                        .await;
                }
            })
        };

        let run = self
            .deps
            .orchestrator
            .run(&self.deps.agents, input.to_context(), Some(&tx))
            .await;
        drop(tx);
        let _ = forwarder.await;

        let report = match run {
            Ok(report) => report,
            Err(failure) => {
                // Keep what prior agents produced for operator diagnostics;
                // it is never attached to the user-visible job view.
                self.deps
                    .cache
                    .set(
                        &Namespace::Pipeline.key(&job_id.to_string()),
                        failure.partial.as_value(),
                        self.deps.cache.config().diagnostic_ttl,
                    )
                    .await;
                return Err(failure.error.into());
            }
        };

        let mut strategy = assemble_strategy(&report, started.elapsed());

        if let Some(writer) = &self.deps.writer {
            self.with_job(job_id, |job| job.update_progress(92, "Composing report"))
                .await;
            let request = json!({
                "idea": &input.main_financial_concern,
                "structured_analysis": &strategy,
            });
            let composed = writer.invoke("/write", &request).await.map_err(|e| {
                ChainError::Downstream {
                    stage: "ReportWriter".to_string(),
                    source: e,
                }
            })?;
            strategy["report"] = composed;
        }

        self.with_job(job_id, |job| job.update_progress(95, "Persisting result"))
            .await;
        self.deps.store.save_strategy(subject_id, &strategy).await?;
        self.deps
            .cache
            .set(
                &Namespace::Blueprint.key(subject_id),
                strategy.clone(),
                self.deps.cache.config().result_ttl,
            )
            .await;

        Ok(strategy)
    }

    async fn fail_job(&self, job_id: Uuid, message: String) {
        self.with_job(job_id, |job| {
            if let Err(e) = job.fail(message.clone()) {
                warn!(%job_id, error = %e, "Failure transition rejected");
            }
        })
        .await;
    }

    /// Run a mutation against a job under the write lock. Returns `None`
    /// when the job does not exist.
    async fn with_job<T>(&self, job_id: Uuid, f: impl FnOnce(&mut Job) -> T) -> Option<T> {
        let mut jobs = self.jobs.write().await;
        jobs.get_mut(&job_id).map(f)
    }

    /// Drop terminal jobs older than the retention horizon. Also clears any
    /// lease or subject index entry left pointing at a dropped job.
    pub async fn sweep_retention(&self) -> usize {
        let horizon = chrono::TimeDelta::from_std(self.config.retention_horizon)
            .unwrap_or(chrono::TimeDelta::days(1));
        let cutoff = chrono::Utc::now() - horizon;

        let mut jobs = self.jobs.write().await;
        let dropped: Vec<(Uuid, String)> = jobs
            .iter()
            .filter(|(_, job)| job.status.is_terminal() && job.updated_at < cutoff)
            .map(|(id, job)| (*id, job.subject_id.clone()))
            .collect();
        for (id, _) in &dropped {
            jobs.remove(id);
        }
        drop(jobs);

        let mut by_subject = self.by_subject.write().await;
        let mut leases = self.leases.lock().await;
        for (id, subject_id) in &dropped {
            if by_subject.get(subject_id) == Some(id) {
                by_subject.remove(subject_id);
            }
            if leases.get(subject_id) == Some(id) {
                leases.remove(subject_id);
            }
        }

        let removed = dropped.len();
        if removed > 0 {
            info!(removed, "Retention sweep dropped old jobs");
        }
        removed
    }
}

/// Spawn a background task that periodically runs the retention sweep.
pub fn spawn_retention_task(processor: Arc<JobProcessor>) -> JoinHandle<()> {
    let interval = processor.config.sweep_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            processor.sweep_retention().await;
        }
    })
}
