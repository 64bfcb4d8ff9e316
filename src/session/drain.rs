use super::{PairStatus, SharedSession};
use crate::vton::PairRunner;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainSummary {
    pub processed: usize,
    pub done: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Process every pair that is not already done, one at a time, in insertion
/// order. A failing pair is marked `error` and the loop moves on.
///
/// The session lock is held only while a status flips, so the operator can
/// keep adding pairs (or removing pending ones) during a drain. Pairs added
/// after the drain started wait for the next drain.
pub async fn drain_all(session: &SharedSession, runner: &dyn PairRunner) -> DrainSummary {
    let ids = session.lock().await.pairs.ids();
    let mut summary = DrainSummary::default();

    for id in ids {
        let input = {
            let mut guard = session.lock().await;
            let title = guard.product_title().map(str::to_string);
            let Some(pair) = guard.pairs.get_mut(id) else {
                summary.skipped += 1;
                continue;
            };
            if pair.status == PairStatus::Done {
                summary.skipped += 1;
                continue;
            }
            pair.status = PairStatus::Processing;
            pair.error = None;
            pair.generation_input(title.as_deref())
        };
        summary.processed += 1;

        let outcome = runner.run(&input).await;
        crate::metrics::pair_finished(input.mode.as_str(), outcome.is_ok());

        let mut guard = session.lock().await;
        let Some(pair) = guard.pairs.get_mut(id) else {
            continue;
        };
        match outcome {
            Ok(outcome) => {
                pair.status = PairStatus::Done;
                pair.result_url = Some(outcome.result_url);
                pair.job_id = Some(outcome.job_id);
                summary.done += 1;
                info!(target = "vton.drain", pair_id = id, mode = input.mode.as_str(), "pair done");
            }
            Err(err) => {
                pair.status = PairStatus::Error;
                pair.error = Some(err.to_string());
                summary.failed += 1;
                warn!(
                    target = "vton.drain",
                    pair_id = id,
                    mode = input.mode.as_str(),
                    code = err.code(),
                    error = %err,
                    "pair failed"
                );
            }
        }
    }

    info!(
        target = "vton.drain",
        processed = summary.processed,
        done = summary.done,
        failed = summary.failed,
        skipped = summary.skipped,
        "drain finished"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{NewPair, Session};
    use crate::vton::{GenerationInput, GenerationOutcome, VtonError};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex as StdMutex};
    use uuid::Uuid;

    /// Fails any pair whose garment URL contains `fail_marker`.
    struct FakeRunner {
        fail_marker: StdMutex<Option<String>>,
        seen: StdMutex<Vec<String>>,
    }

    impl FakeRunner {
        fn failing_on(marker: Option<&str>) -> Self {
            Self {
                fail_marker: StdMutex::new(marker.map(str::to_string)),
                seen: StdMutex::new(Vec::new()),
            }
        }

        fn stop_failing(&self) {
            *self.fail_marker.lock().unwrap() = None;
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PairRunner for FakeRunner {
        async fn run(&self, input: &GenerationInput) -> Result<GenerationOutcome, VtonError> {
            self.seen.lock().unwrap().push(input.garment_url.clone());
            let fail = self
                .fail_marker
                .lock()
                .unwrap()
                .as_deref()
                .is_some_and(|m| input.garment_url.contains(m));
            if fail {
                return Err(VtonError::Submission {
                    status: 500,
                    body: "provider down".into(),
                });
            }
            Ok(GenerationOutcome {
                job_id: format!("job-{}", input.garment_url.len()),
                result_url: input.garment_url.replace("https://x/", "https://cdn/"),
                mode: input.mode,
            })
        }
    }

    fn session_with(garments: &[&str]) -> SharedSession {
        let mut session = Session::new(Uuid::new_v4());
        for garment in garments {
            let pair: NewPair =
                serde_json::from_value(json!({"garment_url": garment, "mode": "fabric"})).unwrap();
            session.pairs.add(pair).unwrap();
        }
        Arc::new(tokio::sync::Mutex::new(session))
    }

    async fn statuses(session: &SharedSession) -> Vec<PairStatus> {
        session.lock().await.pairs.iter().map(|p| p.status).collect()
    }

    #[tokio::test]
    async fn failing_pair_does_not_stop_the_batch() {
        let session = session_with(&["https://x/1.jpg", "https://x/2.jpg", "https://x/3.jpg"]);
        let runner = FakeRunner::failing_on(Some("/2.jpg"));

        let summary = drain_all(&session, &runner).await;

        assert_eq!(
            summary,
            DrainSummary {
                processed: 3,
                done: 2,
                failed: 1,
                skipped: 0
            }
        );
        assert_eq!(
            statuses(&session).await,
            vec![PairStatus::Done, PairStatus::Error, PairStatus::Done]
        );
        let guard = session.lock().await;
        let failed = guard.pairs.get(2).unwrap();
        assert!(failed.error.as_deref().unwrap().contains("provider down"));
        assert!(failed.result_url.is_none());
        assert_eq!(
            guard.pairs.get(3).unwrap().result_url.as_deref(),
            Some("https://cdn/3.jpg")
        );
        assert_eq!(
            runner.seen(),
            vec!["https://x/1.jpg", "https://x/2.jpg", "https://x/3.jpg"]
        );
    }

    #[tokio::test]
    async fn redrain_only_revisits_unfinished_pairs() {
        let session = session_with(&["https://x/1.jpg", "https://x/2.jpg", "https://x/3.jpg"]);
        let runner = FakeRunner::failing_on(Some("/2.jpg"));
        drain_all(&session, &runner).await;

        runner.stop_failing();
        let summary = drain_all(&session, &runner).await;

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.done, 1);
        assert_eq!(statuses(&session).await, vec![PairStatus::Done; 3]);
        assert!(session.lock().await.pairs.get(2).unwrap().error.is_none());
        assert_eq!(runner.seen().len(), 4);

        let summary = drain_all(&session, &runner).await;
        assert_eq!(summary.processed, 0);
        assert_eq!(runner.seen().len(), 4);
    }

    /// Removes `victim` from the session while the first pair is running.
    struct RemovingRunner {
        session: SharedSession,
        victim: u64,
        seen: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl PairRunner for RemovingRunner {
        async fn run(&self, input: &GenerationInput) -> Result<GenerationOutcome, VtonError> {
            let first = self.seen.lock().unwrap().is_empty();
            self.seen.lock().unwrap().push(input.garment_url.clone());
            if first {
                self.session.lock().await.pairs.remove(self.victim).unwrap();
            }
            Ok(GenerationOutcome {
                job_id: "job".into(),
                result_url: "https://cdn/out.png".into(),
                mode: input.mode,
            })
        }
    }

    #[tokio::test]
    async fn pair_removed_mid_drain_is_skipped() {
        let session = session_with(&["https://x/1.jpg", "https://x/2.jpg", "https://x/3.jpg"]);
        let runner = RemovingRunner {
            session: session.clone(),
            victim: 2,
            seen: StdMutex::new(Vec::new()),
        };

        let summary = drain_all(&session, &runner).await;

        assert_eq!(
            summary,
            DrainSummary {
                processed: 2,
                done: 2,
                failed: 0,
                skipped: 1
            }
        );
        assert_eq!(
            *runner.seen.lock().unwrap(),
            vec!["https://x/1.jpg", "https://x/3.jpg"]
        );
        let guard = session.lock().await;
        assert!(guard.pairs.get(2).is_none());
        assert_eq!(guard.pairs.ids(), vec![1, 3]);
    }

    #[tokio::test]
    async fn empty_queue_is_a_noop() {
        let session = session_with(&[]);
        let runner = FakeRunner::failing_on(None);
        assert_eq!(drain_all(&session, &runner).await, DrainSummary::default());
    }
}
