//! Upload orchestration: resolve targets once, then fan uploads out over a
//! bounded pool of tasks and reduce their outcomes into one result.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::api::GyazoClient;
use crate::error::{ConfigError, Error, Result, UploadError};
use crate::option::UploadOption;
use crate::paths;

pub const DEFAULT_PARALLEL: usize = 5;

/// Something that uploads one file and returns its permalink.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(
        &self,
        path: &Path,
        option: &UploadOption,
        cancel: &CancellationToken,
    ) -> std::result::Result<String, UploadError>;
}

#[async_trait]
impl Uploader for GyazoClient {
    async fn upload(
        &self,
        path: &Path,
        option: &UploadOption,
        cancel: &CancellationToken,
    ) -> std::result::Result<String, UploadError> {
        GyazoClient::upload(self, path, option, cancel).await
    }
}

/// Per-file progress, reported as it happens.
#[derive(Debug)]
pub enum ProgressEvent<'a> {
    Started {
        index: usize,
        path: &'a Path,
    },
    Uploaded {
        index: usize,
        path: &'a Path,
        url: &'a str,
    },
    Failed {
        index: usize,
        path: &'a Path,
        error: &'a UploadError,
    },
}

/// Side channel for per-file outcomes.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent<'_>);
}

/// Discards every event.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _event: ProgressEvent<'_>) {}
}

#[derive(Debug)]
pub struct UploadOutcome {
    pub index: usize,
    pub path: PathBuf,
    pub result: std::result::Result<String, UploadError>,
}

/// Outcomes in completion order, plus files never dispatched.
#[derive(Debug, Default)]
pub struct UploadReport {
    pub outcomes: Vec<UploadOutcome>,
    pub skipped: usize,
}

impl UploadReport {
    pub fn total(&self) -> usize {
        self.outcomes.len() + self.skipped
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }

    /// Succeeds only when every file was attempted and uploaded.
    ///
    /// The first real failure in completion order stands for the run.
    pub fn into_result(self) -> Result<Self> {
        let total = self.total();
        let (outcomes, failures): (Vec<_>, Vec<_>) =
            self.outcomes.into_iter().partition(|o| o.result.is_ok());
        let cancelled = failures
            .iter()
            .filter(|o| matches!(o.result, Err(UploadError::Cancelled)))
            .count();
        let failed = failures.len() - cancelled;

        let first = failures.into_iter().find_map(|o| match o.result {
            Err(UploadError::Cancelled) | Ok(_) => None,
            Err(e) => Some(e),
        });
        if let Some(first) = first {
            return Err(Error::UploadsFailed {
                failed,
                total,
                first: Box::new(first),
            });
        }
        if cancelled + self.skipped > 0 {
            return Err(Error::Cancelled {
                skipped: cancelled + self.skipped,
            });
        }
        Ok(Self {
            outcomes,
            skipped: 0,
        })
    }
}

/// Resolve `targets` and upload every image found with at most
/// `max_parallel` uploads in flight.
///
/// `max_parallel` must lie in `1..=Semaphore::MAX_PERMITS`; anything else is
/// rejected before the targets are touched.
pub async fn run<P, U>(
    targets: &[P],
    option: UploadOption,
    max_parallel: usize,
    uploader: Arc<U>,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
) -> Result<UploadReport>
where
    P: AsRef<Path>,
    U: Uploader + 'static,
{
    if max_parallel == 0 || max_parallel > Semaphore::MAX_PERMITS {
        return Err(ConfigError::InvalidParallel(max_parallel).into());
    }

    let files = paths::resolve(targets)?;
    if files.is_empty() {
        tracing::warn!("no image files found");
    }
    tracing::debug!(files = files.len(), max_parallel, "resolved upload targets");

    upload_all(files, option, max_parallel, uploader, progress, cancel)
        .await
        .into_result()
}

/// Upload each file exactly once. Failures are reported and never stop
/// sibling uploads; cancellation stops dispatching new ones.
///
/// `max_parallel` is clamped into the range the semaphore accepts.
pub async fn upload_all<U>(
    files: Vec<PathBuf>,
    option: UploadOption,
    max_parallel: usize,
    uploader: Arc<U>,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
) -> UploadReport
where
    U: Uploader + 'static,
{
    let total = files.len();
    let option = Arc::new(option);
    let semaphore = Arc::new(Semaphore::new(max_parallel.clamp(1, Semaphore::MAX_PERMITS)));
    let mut tasks = JoinSet::new();
    let mut dispatched = 0;

    for (index, path) in files.into_iter().enumerate() {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };
        dispatched += 1;

        let option = option.clone();
        let uploader = uploader.clone();
        let progress = progress.clone();
        let cancel = cancel.clone();
        tasks.spawn(async move {
            let _permit = permit;
            progress.report(ProgressEvent::Started { index, path: &path });

            let result = uploader.upload(&path, &option, &cancel).await;
            match &result {
                Ok(url) => progress.report(ProgressEvent::Uploaded {
                    index,
                    path: &path,
                    url,
                }),
                Err(error) => {
                    if matches!(error, UploadError::Cancelled) {
                        tracing::warn!(file = %path.display(), "upload cancelled");
                    } else {
                        tracing::error!(file = %path.display(), error = %error, "failed to upload");
                    }
                    progress.report(ProgressEvent::Failed {
                        index,
                        path: &path,
                        error,
                    });
                }
            }
            UploadOutcome {
                index,
                path,
                result,
            }
        });
    }

    let mut outcomes = Vec::with_capacity(dispatched);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => tracing::error!(error = %e, "upload task aborted"),
        }
    }

    let skipped = total - dispatched;
    if skipped > 0 {
        tracing::warn!(skipped, "cancelled before all uploads were dispatched");
    }

    UploadReport { outcomes, skipped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeUploader {
        active: AtomicUsize,
        peak: AtomicUsize,
        attempts: Mutex<HashMap<PathBuf, usize>>,
        failing: Vec<&'static str>,
        cancel_on_first: Option<CancellationToken>,
    }

    impl FakeUploader {
        fn failing(names: &[&'static str]) -> Self {
            Self {
                failing: names.to_vec(),
                ..Self::default()
            }
        }

        fn attempts(&self) -> HashMap<PathBuf, usize> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Uploader for FakeUploader {
        async fn upload(
            &self,
            path: &Path,
            _option: &UploadOption,
            cancel: &CancellationToken,
        ) -> std::result::Result<String, UploadError> {
            *self
                .attempts
                .lock()
                .unwrap()
                .entry(path.to_path_buf())
                .or_default() += 1;
            if let Some(token) = &self.cancel_on_first {
                token.cancel();
                return Ok("https://gyazo.com/first".into());
            }

            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let outcome = tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(20)) => None,
                _ = cancel.cancelled() => Some(UploadError::Cancelled),
            };
            self.active.fetch_sub(1, Ordering::SeqCst);

            if let Some(err) = outcome {
                return Err(err);
            }
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            if self.failing.contains(&name.as_str()) {
                return Err(UploadError::Service {
                    status: 500,
                    body: name,
                });
            }
            Ok(format!("https://gyazo.com/{name}"))
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        started: AtomicUsize,
        uploaded: AtomicUsize,
        failed: AtomicUsize,
    }

    impl ProgressSink for RecordingProgress {
        fn report(&self, event: ProgressEvent<'_>) {
            let counter = match event {
                ProgressEvent::Started { .. } => &self.started,
                ProgressEvent::Uploaded { .. } => &self.uploaded,
                ProgressEvent::Failed { .. } => &self.failed,
            };
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn images(dir: &tempfile::TempDir, count: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|i| {
                let path = dir.path().join(format!("img{i}.png"));
                std::fs::write(&path, b"x").unwrap();
                path
            })
            .collect()
    }

    #[tokio::test]
    async fn bounded_pool_attempts_every_file_once() {
        let dir = tempfile::tempdir().unwrap();
        images(&dir, 10);
        let uploader = Arc::new(FakeUploader::failing(&["img3.png", "img7.png"]));
        let progress = Arc::new(RecordingProgress::default());

        let err = run(
            &[dir.path()],
            UploadOption::default(),
            2,
            uploader.clone(),
            progress.clone(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        match err {
            Error::UploadsFailed {
                failed,
                total,
                first,
            } => {
                assert_eq!(failed, 2);
                assert_eq!(total, 10);
                assert!(matches!(*first, UploadError::Service { status: 500, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }

        let attempts = uploader.attempts();
        assert_eq!(attempts.len(), 10);
        assert!(attempts.values().all(|&n| n == 1));
        assert_eq!(uploader.peak.load(Ordering::SeqCst), 2);
        assert_eq!(progress.started.load(Ordering::SeqCst), 10);
        assert_eq!(progress.uploaded.load(Ordering::SeqCst), 8);
        assert_eq!(progress.failed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn all_successful_uploads_return_the_report() {
        let dir = tempfile::tempdir().unwrap();
        let files = images(&dir, 4);
        let uploader = Arc::new(FakeUploader::default());

        let report = run(
            &files,
            UploadOption::default(),
            DEFAULT_PARALLEL,
            uploader.clone(),
            Arc::new(NoProgress),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.total(), 4);
        assert_eq!(report.failed(), 0);
        assert!(uploader.peak.load(Ordering::SeqCst) <= DEFAULT_PARALLEL);
        let mut urls: Vec<_> = report
            .outcomes
            .iter()
            .map(|o| o.result.as_ref().unwrap().clone())
            .collect();
        urls.sort();
        assert_eq!(urls[0], "https://gyazo.com/img0.png");
    }

    #[tokio::test]
    async fn missing_target_does_not_stop_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let files = images(&dir, 1);
        let targets = vec![dir.path().join("missing.png"), files[0].clone()];
        let uploader = Arc::new(FakeUploader::default());

        let report = run(
            &targets,
            UploadOption::default(),
            1,
            uploader.clone(),
            Arc::new(NoProgress),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(report.total(), 1);
        assert_eq!(uploader.attempts().get(&files[0]), Some(&1));
    }

    #[tokio::test]
    async fn zero_parallel_is_rejected() {
        let uploader = Arc::new(FakeUploader::default());
        let err = run::<PathBuf, _>(
            &[],
            UploadOption::default(),
            0,
            uploader,
            Arc::new(NoProgress),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidParallel(0))));
    }

    #[tokio::test]
    async fn oversized_parallel_is_rejected() {
        let uploader = Arc::new(FakeUploader::default());
        let err = run::<PathBuf, _>(
            &[],
            UploadOption::default(),
            usize::MAX,
            uploader,
            Arc::new(NoProgress),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidParallel(usize::MAX))
        ));
        assert!(err.to_string().starts_with("parallel must be between 1 and"));
    }

    #[tokio::test]
    async fn largest_accepted_parallel_runs() {
        let dir = tempfile::tempdir().unwrap();
        let files = images(&dir, 2);
        let uploader = Arc::new(FakeUploader::default());

        let report = run(
            &files,
            UploadOption::default(),
            Semaphore::MAX_PERMITS,
            uploader.clone(),
            Arc::new(NoProgress),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(report.total(), 2);
        assert_eq!(uploader.attempts().len(), 2);
    }

    #[tokio::test]
    async fn upload_all_clamps_huge_parallel() {
        let dir = tempfile::tempdir().unwrap();
        let files = images(&dir, 3);
        let uploader = Arc::new(FakeUploader::default());

        let report = upload_all(
            files,
            UploadOption::default(),
            usize::MAX,
            uploader.clone(),
            Arc::new(NoProgress),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(report.outcomes.len(), 3);
        assert!(report.into_result().is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn walk_failure_uploads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        images(&dir, 3);
        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::write(locked.join("hidden.png"), b"x").unwrap();

        let _guard = match crate::paths::tests::LockedDir::new(&locked) {
            Some(guard) => guard,
            None => return,
        };

        let uploader = Arc::new(FakeUploader::default());
        let progress = Arc::new(RecordingProgress::default());
        let err = run(
            &[dir.path()],
            UploadOption::default(),
            2,
            uploader.clone(),
            progress.clone(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Walk { .. }));
        assert!(uploader.attempts().is_empty());
        assert_eq!(progress.started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancelled_run_dispatches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let files = images(&dir, 3);
        let uploader = Arc::new(FakeUploader::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = upload_all(
            files,
            UploadOption::default(),
            2,
            uploader.clone(),
            Arc::new(NoProgress),
            cancel,
        )
        .await;

        assert!(report.outcomes.is_empty());
        assert_eq!(report.skipped, 3);
        assert!(uploader.attempts().is_empty());
        assert!(matches!(
            report.into_result(),
            Err(Error::Cancelled { skipped: 3 })
        ));
    }

    #[tokio::test]
    async fn cancellation_stops_dispatch_but_keeps_finished_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let files = images(&dir, 5);
        let cancel = CancellationToken::new();
        let uploader = Arc::new(FakeUploader {
            cancel_on_first: Some(cancel.clone()),
            ..FakeUploader::default()
        });

        let report = upload_all(
            files,
            UploadOption::default(),
            1,
            uploader.clone(),
            Arc::new(NoProgress),
            cancel,
        )
        .await;

        assert_eq!(report.outcomes.len(), 1);
        assert!(report.outcomes[0].result.is_ok());
        assert_eq!(report.skipped, 4);
        assert_eq!(uploader.attempts().len(), 1);
    }

    #[test]
    fn report_with_only_successes_is_ok() {
        let report = UploadReport {
            outcomes: vec![UploadOutcome {
                index: 0,
                path: PathBuf::from("a.png"),
                result: Ok("https://gyazo.com/a".into()),
            }],
            skipped: 0,
        };
        assert!(report.into_result().is_ok());
    }
}
