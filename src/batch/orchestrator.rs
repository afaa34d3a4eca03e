use crate::{
    batch::retry::RetryPolicy,
    comfy::ImageBackend,
    error::{GenerationError, Result},
    i18n::{Locale, SlotMessages},
    models::{BatchReport, BatchSlot, GenerationRequest, ImageResult, SlotStatus},
};
use chrono::Utc;
use futures::future::join_all;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

pub const RANDOM_SEED_MAX: u64 = 100_000_000;

#[derive(Clone)]
pub struct BatchOrchestrator {
    backend: Arc<dyn ImageBackend>,
    policy: RetryPolicy,
    locale: Locale,
}

impl BatchOrchestrator {
    pub fn new(backend: Arc<dyn ImageBackend>) -> Self {
        Self {
            backend,
            policy: RetryPolicy::default(),
            locale: Locale::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Validates the form and spawns one task per slot. Nothing is sent if
    /// validation fails. Must be called from within a Tokio runtime.
    pub fn start(&self, params: GenerationRequest) -> Result<BatchHandle> {
        params.validate()?;

        let batch_id = Uuid::new_v4().to_string();
        let messages = self.locale.messages();
        let size = params.batch_size as usize;
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let params = Arc::new(params);

        log::info!(
            "Starting batch {} with {} slot(s), {}",
            batch_id,
            size,
            match params.seed {
                Some(seed) => format!("fixed seed {}", seed),
                None => "random seeds".to_string(),
            }
        );

        let tasks = (0..size)
            .map(|index| {
                let slot = BatchSlot::pending(index, messages.generating);
                let _ = updates_tx.send(slot.clone());
                let task = SlotTask {
                    slot,
                    params: params.clone(),
                    backend: self.backend.clone(),
                    policy: self.policy,
                    messages,
                    updates: updates_tx.clone(),
                    cancel: cancel_rx.clone(),
                };
                tokio::spawn(task.run())
            })
            .collect();

        Ok(BatchHandle {
            batch_id,
            tasks,
            updates: Some(updates_rx),
            cancel: cancel_tx,
            messages,
        })
    }

    pub async fn run(&self, params: GenerationRequest) -> Result<BatchReport> {
        Ok(self.start(params)?.wait().await)
    }
}

pub struct BatchHandle {
    batch_id: String,
    tasks: Vec<JoinHandle<BatchSlot>>,
    updates: Option<mpsc::UnboundedReceiver<BatchSlot>>,
    cancel: watch::Sender<bool>,
    messages: &'static SlotMessages,
}

impl BatchHandle {
    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn size(&self) -> usize {
        self.tasks.len()
    }

    /// Slot snapshots in the order their transitions happen. The stream ends
    /// once every slot is terminal. Can only be taken once.
    pub fn updates(&mut self) -> Option<UnboundedReceiverStream<BatchSlot>> {
        self.updates.take().map(UnboundedReceiverStream::new)
    }

    /// Stops every slot that has not settled yet; they end as errors.
    pub fn cancel(&self) {
        log::info!("Cancelling batch {}", self.batch_id);
        let _ = self.cancel.send(true);
    }

    pub async fn wait(self) -> BatchReport {
        let BatchHandle {
            batch_id,
            tasks,
            cancel,
            messages,
            ..
        } = self;

        let results = join_all(tasks).await;
        drop(cancel);

        let slots: Vec<BatchSlot> = results
            .into_iter()
            .enumerate()
            .map(|(index, result)| {
                result.unwrap_or_else(|e| {
                    log::error!("Slot {} task aborted: {}", index, e);
                    let mut slot = BatchSlot::pending(index, messages.error);
                    slot.status = SlotStatus::Error;
                    slot.error = Some(e.to_string());
                    slot.finished_at = Some(Utc::now());
                    slot
                })
            })
            .collect();

        let report = BatchReport { batch_id, slots };
        log::info!(
            "Batch {} settled: {} succeeded, {} failed",
            report.batch_id,
            report.succeeded().count(),
            report.failed().count()
        );
        report
    }
}

struct SlotTask {
    slot: BatchSlot,
    params: Arc<GenerationRequest>,
    backend: Arc<dyn ImageBackend>,
    policy: RetryPolicy,
    messages: &'static SlotMessages,
    updates: mpsc::UnboundedSender<BatchSlot>,
    cancel: watch::Receiver<bool>,
}

impl SlotTask {
    async fn run(mut self) -> BatchSlot {
        loop {
            let request = resolve_seed(&self.params);
            self.slot.seed = request.seed;

            let outcome = tokio::select! {
                biased;
                _ = cancelled(&mut self.cancel) => return self.finish_cancelled(),
                result = attempt(self.backend.as_ref(), &request) => result,
            };

            let err = match outcome {
                Ok(image) => return self.finish_success(image),
                Err(err) => err,
            };

            log::warn!(
                "Slot {} attempt {}/{} failed: {}",
                self.slot.index,
                self.slot.retries + 1,
                self.policy.max_attempts(),
                err
            );

            if !err.is_retryable() {
                return self.finish_error(err);
            }
            if !self.policy.should_retry(self.slot.retries) {
                let exhausted = GenerationError::ExhaustedRetries {
                    attempts: self.slot.retries + 1,
                    last_error: err.to_string(),
                };
                return self.finish_error(exhausted);
            }

            self.slot.retries += 1;
            self.slot.message = format!(
                "{} ({}/{})",
                self.messages.retrying, self.slot.retries, self.policy.max_retries
            );
            self.publish();

            tokio::select! {
                biased;
                _ = cancelled(&mut self.cancel) => return self.finish_cancelled(),
                _ = tokio::time::sleep(self.policy.delay) => {}
            }
        }
    }

    fn finish_success(mut self, image: ImageResult) -> BatchSlot {
        let finished_at = Utc::now();
        self.slot.finished_at = Some(finished_at);
        self.slot.status = SlotStatus::Success;
        self.slot.image_url = Some(image.image_url);
        self.slot.message = format!(
            "{} ({:.1}s)",
            self.messages.completed,
            self.slot.elapsed_secs().unwrap_or_default()
        );
        log::info!(
            "Slot {} completed after {} retr{}",
            self.slot.index,
            self.slot.retries,
            if self.slot.retries == 1 { "y" } else { "ies" }
        );
        self.publish();
        self.slot
    }

    fn finish_error(mut self, err: GenerationError) -> BatchSlot {
        log::error!("Slot {} failed: {}", self.slot.index, err);
        self.slot.finished_at = Some(Utc::now());
        self.slot.status = SlotStatus::Error;
        self.slot.message = self.messages.error.to_string();
        self.slot.error = Some(err.to_string());
        self.publish();
        self.slot
    }

    fn finish_cancelled(mut self) -> BatchSlot {
        self.slot.finished_at = Some(Utc::now());
        self.slot.status = SlotStatus::Error;
        self.slot.message = self.messages.cancelled.to_string();
        self.slot.error = Some(GenerationError::Cancelled.to_string());
        self.publish();
        self.slot
    }

    fn publish(&self) {
        let _ = self.updates.send(self.slot.clone());
    }
}

/// A user-supplied seed is reused for every call; otherwise each call draws
/// its own.
fn resolve_seed(params: &GenerationRequest) -> GenerationRequest {
    let mut request = params.clone();
    if request.seed.is_none() {
        request.seed = Some(rand::thread_rng().gen_range(0..RANDOM_SEED_MAX));
    }
    request
}

async fn attempt(backend: &dyn ImageBackend, request: &GenerationRequest) -> Result<ImageResult> {
    let image = backend.generate(request).await?;
    image.verify()?;
    Ok(image)
}

/// Resolves once the batch is cancelled. If the handle is gone without a
/// cancel, never resolves.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        let is_cancelled = *cancel.borrow();
        if is_cancelled {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    const PNG: &str = "iVBORw0KGgo=";

    // Fails the first `failures` calls, then succeeds. Records seeds.
    struct ScriptedBackend {
        failures: u32,
        calls: AtomicU32,
        seeds: Mutex<Vec<u64>>,
        delay: Duration,
    }

    impl ScriptedBackend {
        fn failing(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: AtomicU32::new(0),
                seeds: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                failures: 0,
                calls: AtomicU32::new(0),
                seeds: Mutex::new(Vec::new()),
                delay,
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        fn seeds(&self) -> Vec<u64> {
            self.seeds.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ImageBackend for ScriptedBackend {
        async fn generate(&self, request: &GenerationRequest) -> Result<ImageResult> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.seeds
                .lock()
                .unwrap()
                .push(request.seed.expect("orchestrator always resolves a seed"));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if call < self.failures {
                Err(GenerationError::Network("connection reset".into()))
            } else {
                Ok(ImageResult::from_base64(PNG))
            }
        }
    }

    struct RationedBackend {
        successes: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ImageBackend for RationedBackend {
        async fn generate(&self, _request: &GenerationRequest) -> Result<ImageResult> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.successes {
                Ok(ImageResult::from_base64(PNG))
            } else {
                Err(GenerationError::protocol("Invalid JSON response", "oops"))
            }
        }
    }

    struct BrokenImageBackend {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ImageBackend for BrokenImageBackend {
        async fn generate(&self, _request: &GenerationRequest) -> Result<ImageResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ImageResult::from_base64(""))
        }
    }

    // Fails every attempt of whichever slot calls first; the other
    // `size - 1` first calls succeed.
    struct FirstCallerFailsBackend {
        size: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ImageBackend for FirstCallerFailsBackend {
        async fn generate(&self, _request: &GenerationRequest) -> Result<ImageResult> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 || call >= self.size {
                Err(GenerationError::Network("connection reset".into()))
            } else {
                Ok(ImageResult::from_base64(PNG))
            }
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(2, Duration::from_millis(5))
    }

    fn orchestrator(backend: Arc<dyn ImageBackend>) -> BatchOrchestrator {
        BatchOrchestrator::new(backend).with_policy(fast_policy())
    }

    #[tokio::test]
    async fn test_invalid_form_issues_no_calls() {
        let backend = ScriptedBackend::failing(0);
        let orch = orchestrator(backend.clone());

        for params in [
            GenerationRequest::new("fox").with_size(32, 512),
            GenerationRequest::new("fox").with_size(512, 2048),
            GenerationRequest::new("fox").with_steps(10),
            GenerationRequest::new("fox").with_steps(31),
            GenerationRequest::new("fox").with_batch_size(5),
        ] {
            let err = orch.run(params).await.unwrap_err();
            assert!(err.is_validation());
        }
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_every_slot_settles() {
        let backend = ScriptedBackend::failing(0);
        let report = orchestrator(backend.clone())
            .run(GenerationRequest::new("fox").with_batch_size(4))
            .await
            .unwrap();

        assert_eq!(report.slots.len(), 4);
        assert!(report.all_settled());
        assert_eq!(report.succeeded().count(), 4);
        for (i, slot) in report.slots.iter().enumerate() {
            assert_eq!(slot.index, i);
            assert!(slot.finished_at.is_some());
            assert_eq!(slot.image_url.as_deref(), Some("data:image/png;base64,iVBORw0KGgo="));
        }
        assert_eq!(backend.calls(), 4);
    }

    #[tokio::test]
    async fn test_success_on_third_attempt_records_two_retries() {
        let backend = ScriptedBackend::failing(2);
        let report = orchestrator(backend.clone())
            .run(GenerationRequest::new("fox").with_batch_size(1))
            .await
            .unwrap();

        let slot = &report.slots[0];
        assert_eq!(slot.status, SlotStatus::Success);
        assert_eq!(slot.retries, 2);
        assert!(slot.message.starts_with("Completed ("));
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_slot_is_terminal() {
        let backend = ScriptedBackend::failing(u32::MAX);
        let report = orchestrator(backend.clone())
            .run(GenerationRequest::new("fox").with_batch_size(1))
            .await
            .unwrap();

        let slot = &report.slots[0];
        assert_eq!(slot.status, SlotStatus::Error);
        assert_eq!(slot.retries, 2);
        assert_eq!(slot.message, "Generation failed");
        assert!(slot.error.as_deref().unwrap().contains("after 3 attempts"));
        assert_eq!(backend.calls(), 3);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_affect_siblings() {
        let backend = Arc::new(RationedBackend {
            successes: 1,
            calls: AtomicU32::new(0),
        });
        let report = orchestrator(backend)
            .run(GenerationRequest::new("fox").with_batch_size(3))
            .await
            .unwrap();

        assert!(report.all_settled());
        assert_eq!(report.slots.len(), 3);
        assert_eq!(report.succeeded().count(), 1);
        assert_eq!(report.failed().count(), 2);
    }

    #[tokio::test]
    async fn test_failing_slot_does_not_delay_siblings() {
        let delay = Duration::from_millis(300);
        let backend = Arc::new(FirstCallerFailsBackend {
            size: 3,
            calls: AtomicU32::new(0),
        });
        let started = std::time::Instant::now();
        let mut handle = BatchOrchestrator::new(backend)
            .with_policy(RetryPolicy::new(2, delay))
            .start(GenerationRequest::new("fox").with_batch_size(3))
            .unwrap();
        let mut updates = handle.updates().unwrap();

        let mut latest: Vec<Option<BatchSlot>> = vec![None; 3];
        let mut successes = 0;
        while successes < 2 {
            let slot = updates.next().await.expect("stream ended before siblings settled");
            if slot.status == SlotStatus::Success {
                successes += 1;
                assert!(
                    started.elapsed() < delay,
                    "sibling success arrived after {:?}",
                    started.elapsed()
                );
            }
            let index = slot.index;
            latest[index] = Some(slot);
        }

        let failing = latest
            .iter()
            .flatten()
            .find(|slot| slot.status != SlotStatus::Success)
            .expect("failing slot has published at least its pending state")
            .index;
        assert_eq!(latest[failing].as_ref().unwrap().status, SlotStatus::Pending);

        let rest: Vec<BatchSlot> = updates.collect().await;
        assert!(rest.iter().all(|slot| slot.index == failing));
        assert_eq!(rest.last().unwrap().status, SlotStatus::Error);
        assert!(started.elapsed() >= delay * 2);

        let report = handle.wait().await;
        assert_eq!(report.succeeded().count(), 2);
        assert_eq!(report.slots[failing].status, SlotStatus::Error);
        assert_eq!(report.slots[failing].retries, 2);
    }

    #[tokio::test]
    async fn test_supplied_seed_is_reused_across_batch() {
        let backend = ScriptedBackend::failing(0);
        orchestrator(backend.clone())
            .run(GenerationRequest::new("fox").with_seed(42).with_batch_size(3))
            .await
            .unwrap();

        assert_eq!(backend.seeds(), vec![42, 42, 42]);
    }

    #[tokio::test]
    async fn test_missing_seed_draws_one_per_call() {
        let backend = ScriptedBackend::failing(0);
        let report = orchestrator(backend.clone())
            .run(GenerationRequest::new("fox").with_batch_size(3))
            .await
            .unwrap();

        let seeds = backend.seeds();
        assert_eq!(seeds.len(), 3);
        assert!(seeds.iter().all(|s| *s < RANDOM_SEED_MAX));
        assert_eq!(seeds.iter().collect::<HashSet<_>>().len(), 3);
        assert!(report.slots.iter().all(|slot| slot.seed.is_some()));
    }

    #[tokio::test]
    async fn test_unloadable_image_consumes_attempts() {
        let backend = Arc::new(BrokenImageBackend {
            calls: AtomicU32::new(0),
        });
        let report = orchestrator(backend.clone())
            .run(GenerationRequest::new("fox").with_batch_size(1))
            .await
            .unwrap();

        assert_eq!(report.slots[0].status, SlotStatus::Error);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_updates_follow_slot_lifecycle() {
        let backend = ScriptedBackend::failing(1);
        let mut handle = orchestrator(backend)
            .start(GenerationRequest::new("fox").with_batch_size(1))
            .unwrap();
        let updates = handle.updates().unwrap();
        assert!(handle.updates().is_none());

        handle.wait().await;
        let updates: Vec<BatchSlot> = updates.collect().await;

        let messages: Vec<&str> = updates.iter().map(|u| u.message.as_str()).collect();
        assert_eq!(messages[0], "Generating...");
        assert_eq!(messages[1], "Retrying (1/2)");
        assert!(messages[2].starts_with("Completed ("));
        assert_eq!(updates.len(), 3);
        assert_eq!(updates[2].status, SlotStatus::Success);
    }

    #[tokio::test]
    async fn test_localized_messages() {
        let backend = ScriptedBackend::failing(u32::MAX);
        let report = orchestrator(backend)
            .with_locale(Locale::Zh)
            .run(GenerationRequest::new("fox").with_batch_size(1))
            .await
            .unwrap();
        assert_eq!(report.slots[0].message, "生成失败");
    }

    #[tokio::test]
    async fn test_cancel_settles_in_flight_slots() {
        let backend = ScriptedBackend::slow(Duration::from_secs(30));
        let handle = orchestrator(backend)
            .start(GenerationRequest::new("fox").with_batch_size(2))
            .unwrap();
        assert_eq!(handle.size(), 2);

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();
        let report = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .expect("cancelled batch should settle promptly");

        assert!(report.all_settled());
        for slot in &report.slots {
            assert_eq!(slot.status, SlotStatus::Error);
            assert_eq!(slot.message, "Cancelled");
        }
    }

    #[tokio::test]
    async fn test_cancel_during_retry_delay() {
        let backend = ScriptedBackend::failing(u32::MAX);
        let mut handle = BatchOrchestrator::new(backend.clone())
            .with_policy(RetryPolicy::new(2, Duration::from_secs(30)))
            .start(GenerationRequest::new("fox").with_batch_size(1))
            .unwrap();
        let mut updates = handle.updates().unwrap();

        loop {
            let slot = updates.next().await.expect("slot settled before retrying");
            if slot.retries == 1 {
                assert_eq!(slot.status, SlotStatus::Pending);
                assert_eq!(slot.message, "Retrying (1/2)");
                break;
            }
        }

        handle.cancel();
        let report = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .expect("cancel should cut the retry delay short");

        let slot = &report.slots[0];
        assert_eq!(slot.status, SlotStatus::Error);
        assert_eq!(slot.message, "Cancelled");
        assert_eq!(slot.retries, 1);
        assert_eq!(slot.error.as_deref(), Some("Generation cancelled"));
        assert_eq!(backend.calls(), 1);

        let last = updates.next().await.unwrap();
        assert_eq!(last.message, "Cancelled");
        assert!(updates.next().await.is_none());
    }
}
