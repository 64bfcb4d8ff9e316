use crate::{
    models::ApiError,
    session::{DrainSummary, SharedSession, drain_all},
    vton::PairRunner,
};
use serde::Serialize;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tracing::info;
use uuid::Uuid;

/// Single background worker that drains sessions one at a time.
#[derive(Clone)]
pub struct DrainQueue {
    tx: mpsc::Sender<Job>,
    state: Arc<Mutex<QueueState>>,
    retention: Duration,
}

#[derive(Default)]
struct QueueState {
    jobs: HashMap<Uuid, JobInfo>,
    // session id -> its queued or running drain
    active: HashMap<Uuid, Uuid>,
    finished_at: HashMap<Uuid, Instant>,
}

struct Job {
    id: Uuid,
    session_id: Uuid,
    session: SharedSession,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed { summary: DrainSummary },
}

#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub id: String,
    pub session_id: String,
    #[serde(flatten)]
    pub state: JobState,
}

impl QueueState {
    fn set(&mut self, id: Uuid, state: JobState) {
        if let Some(info) = self.jobs.get_mut(&id) {
            info.state = state;
        }
    }

    fn finish(&mut self, id: Uuid, session_id: Uuid, summary: DrainSummary, now: Instant) {
        self.set(id, JobState::Completed { summary });
        self.active.remove(&session_id);
        self.finished_at.insert(id, now);
    }

    /// Forget completed jobs older than `retention`. Queued and running jobs
    /// are never dropped.
    fn prune(&mut self, now: Instant, retention: Duration) {
        let expired: Vec<Uuid> = self
            .finished_at
            .iter()
            .filter(|(_, at)| now.saturating_duration_since(**at) >= retention)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            self.finished_at.remove(&id);
            self.jobs.remove(&id);
        }
    }
}

impl DrainQueue {
    pub fn spawn(runner: Arc<dyn PairRunner>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Job>(queue_capacity_from_env());
        let state = Arc::new(Mutex::new(QueueState::default()));
        let state_bg = state.clone();

        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                state_bg.lock().await.set(job.id, JobState::Running);
                info!(
                    target = "vton.drain",
                    job_id = %job.id,
                    session_id = %job.session_id,
                    "drain started"
                );

                let summary = drain_all(&job.session, runner.as_ref()).await;

                state_bg
                    .lock()
                    .await
                    .finish(job.id, job.session_id, summary, Instant::now());
            }
        });

        let queue = Self {
            tx,
            state,
            retention: job_retention_from_env(),
        };
        (queue, handle)
    }

    /// Whether `session_id` has a drain queued or running.
    pub async fn is_active(&self, session_id: Uuid) -> bool {
        self.state.lock().await.active.contains_key(&session_id)
    }

    /// Queue a drain for `session`. A session whose drain is already queued or
    /// running gets that job's id back instead of a second drain.
    pub async fn enqueue(
        &self,
        session_id: Uuid,
        session: SharedSession,
    ) -> Result<Uuid, ApiError> {
        let id = {
            let mut guard = self.state.lock().await;
            guard.prune(Instant::now(), self.retention);
            if let Some(existing) = guard.active.get(&session_id) {
                return Ok(*existing);
            }
            let id = Uuid::new_v4();
            guard.jobs.insert(
                id,
                JobInfo {
                    id: id.to_string(),
                    session_id: session_id.to_string(),
                    state: JobState::Queued,
                },
            );
            guard.active.insert(session_id, id);
            id
        };

        let job = Job {
            id,
            session_id,
            session,
        };
        if self.tx.send(job).await.is_err() {
            let mut guard = self.state.lock().await;
            guard.jobs.remove(&id);
            guard.active.remove(&session_id);
            return Err(ApiError {
                error: "queue_send_failed".into(),
                detail: Some("worker not available".into()),
            });
        }
        Ok(id)
    }

    pub async fn get(&self, id: Uuid) -> Option<JobInfo> {
        self.state.lock().await.jobs.get(&id).cloned()
    }
}

fn queue_capacity_from_env() -> usize {
    std::env::var("QUEUE_CAPACITY")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(64)
}

fn job_retention_from_env() -> Duration {
    let secs = std::env::var("JOB_RETENTION_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(3600);
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{NewPair, Session};
    use crate::vton::{GenerationInput, GenerationOutcome, VtonError};
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Blocks every pair until released.
    struct GatedRunner {
        gate: Notify,
    }

    #[async_trait]
    impl PairRunner for GatedRunner {
        async fn run(&self, input: &GenerationInput) -> Result<GenerationOutcome, VtonError> {
            self.gate.notified().await;
            Ok(GenerationOutcome {
                job_id: "req-1".into(),
                result_url: "https://cdn/out.png".into(),
                mode: input.mode,
            })
        }
    }

    fn session() -> (Uuid, SharedSession) {
        let id = Uuid::new_v4();
        let mut session = Session::new(id);
        let pair: NewPair =
            serde_json::from_value(json!({"garment_url": "https://x/g.jpg", "mode": "fabric"}))
                .unwrap();
        session.pairs.add(pair).unwrap();
        (id, Arc::new(Mutex::new(session)))
    }

    async fn wait_for(queue: &DrainQueue, id: Uuid, done: impl Fn(&JobState) -> bool) -> JobInfo {
        for _ in 0..200 {
            if let Some(info) = queue.get(id).await
                && done(&info.state)
            {
                return info;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {id} never reached the expected state");
    }

    #[tokio::test]
    async fn duplicate_enqueue_reuses_active_job_until_it_completes() {
        let runner = Arc::new(GatedRunner {
            gate: Notify::new(),
        });
        let (queue, _worker) = DrainQueue::spawn(runner.clone());
        let (session_id, shared) = session();

        assert!(!queue.is_active(session_id).await);
        let first = queue.enqueue(session_id, shared.clone()).await.unwrap();
        let second = queue.enqueue(session_id, shared.clone()).await.unwrap();
        assert_eq!(first, second);
        assert!(queue.is_active(session_id).await);

        wait_for(&queue, first, |s| *s == JobState::Running).await;
        runner.gate.notify_one();
        let info = wait_for(&queue, first, |s| matches!(s, JobState::Completed { .. })).await;

        assert_eq!(info.session_id, session_id.to_string());
        assert_eq!(
            info.state,
            JobState::Completed {
                summary: DrainSummary {
                    processed: 1,
                    done: 1,
                    failed: 0,
                    skipped: 0
                }
            }
        );

        assert!(!queue.is_active(session_id).await);

        let third = queue.enqueue(session_id, shared).await.unwrap();
        assert_ne!(third, first);
    }

    #[test]
    fn prune_drops_only_completed_jobs_past_retention() {
        let mut state = QueueState::default();
        let session_id = Uuid::new_v4();
        let (old, recent, running) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        for id in [old, recent, running] {
            state.jobs.insert(
                id,
                JobInfo {
                    id: id.to_string(),
                    session_id: session_id.to_string(),
                    state: JobState::Running,
                },
            );
        }
        state.active.insert(session_id, running);

        let start = Instant::now();
        state.finish(old, Uuid::new_v4(), DrainSummary::default(), start);
        state.finish(
            recent,
            Uuid::new_v4(),
            DrainSummary::default(),
            start + Duration::from_secs(50),
        );
        state.prune(start + Duration::from_secs(60), Duration::from_secs(60));

        assert!(!state.jobs.contains_key(&old));
        assert!(state.jobs.contains_key(&recent));
        assert!(state.jobs.contains_key(&running));
        assert_eq!(state.active.get(&session_id), Some(&running));
    }

    #[tokio::test]
    async fn unknown_job_is_none() {
        let runner = Arc::new(GatedRunner {
            gate: Notify::new(),
        });
        let (queue, _worker) = DrainQueue::spawn(runner);
        assert!(queue.get(Uuid::new_v4()).await.is_none());
    }

    #[test]
    fn job_state_serializes_with_tag() {
        let info = JobInfo {
            id: "j".into(),
            session_id: "s".into(),
            state: JobState::Completed {
                summary: DrainSummary::default(),
            },
        };
        let value = serde_json::to_value(info).unwrap();
        assert_eq!(value["state"], "completed");
        assert_eq!(value["summary"]["processed"], 0);
    }
}
