//! Cooperative execution of a synchronization run
//!
//! A [`Driver`] owns a single-threaded tokio runtime and the pipeline future.
//! Nothing runs unless the driver is advanced, either once per host tick
//! ([`Driver::tick`], [`Driver::run_host_loop`]) or from a dedicated polling
//! loop ([`Driver::run_polling`]). The driver spawns no threads; the run
//! itself is polled only on the calling thread.

use crate::error::{SyncError, SyncResult};
use crate::orchestrator::{Orchestrator, SyncState};
use crate::outcome::SyncSummary;
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::Poll;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::watch;
use tracing::{debug, error};

type SyncTask<'a> = Pin<Box<dyn Future<Output = SyncResult<SyncSummary>> + 'a>>;

/// Advances an [`Orchestrator`] until it reaches `Done` or `Faulted`
pub struct Driver<'a> {
    // Dropped before the runtime it was polled on.
    task: Option<SyncTask<'a>>,
    state: watch::Receiver<SyncState>,
    panicked: bool,
    runtime: Runtime,
}

impl<'a> Driver<'a> {
    pub fn new(orchestrator: Orchestrator<'a>) -> SyncResult<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(SyncError::Runtime)?;
        let state = orchestrator.subscribe();
        Ok(Driver {
            task: Some(Box::pin(orchestrator.run())),
            state,
            panicked: false,
            runtime,
        })
    }

    /// Current state of the run
    pub fn state(&self) -> SyncState {
        if self.panicked {
            SyncState::Faulted
        } else {
            self.state.borrow().clone()
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_none()
    }

    /// Advance the run by the work available before its next suspension
    ///
    /// Returns `Poll::Pending` while the run is waiting on I/O or a timer.
    /// A panic inside the pipeline is reported as [`SyncError::Panicked`]
    /// and leaves the run `Faulted`. Ticking a finished run yields
    /// [`SyncError::AlreadyFinished`].
    pub fn tick(&mut self) -> Poll<SyncResult<SyncSummary>> {
        let Some(task) = self.task.as_mut() else {
            return Poll::Ready(Err(SyncError::AlreadyFinished));
        };

        let runtime = &self.runtime;
        let polled = panic::catch_unwind(AssertUnwindSafe(|| {
            runtime.block_on(async {
                tokio::select! {
                    biased;
                    result = task.as_mut() => Poll::Ready(result),
                    _ = tokio::task::yield_now() => Poll::Pending,
                }
            })
        }));

        match polled {
            Ok(Poll::Pending) => Poll::Pending,
            Ok(Poll::Ready(result)) => {
                self.task = None;
                Poll::Ready(result)
            }
            Err(payload) => {
                self.task = None;
                self.panicked = true;
                let message = panic_message(payload.as_ref());
                error!(%message, "Synchronization step panicked");
                Poll::Ready(Err(SyncError::Panicked(message)))
            }
        }
    }

    /// Tick until finished, calling `frame` with the current state after
    /// every pending tick
    ///
    /// The caller paces the loop; `frame` is where a host renders progress
    /// or waits for its next frame.
    pub fn run_host_loop<F>(mut self, mut frame: F) -> SyncResult<SyncSummary>
    where
        F: FnMut(&SyncState),
    {
        loop {
            match self.tick() {
                Poll::Ready(result) => return result,
                Poll::Pending => frame(&self.state()),
            }
        }
    }

    /// Tick on a fixed interval until finished
    pub fn run_polling(mut self, interval: Duration) -> SyncResult<SyncSummary> {
        debug!(interval_ms = interval.as_millis() as u64, "Polling synchronization run");
        loop {
            match self.tick() {
                Poll::Ready(result) => return result,
                Poll::Pending if interval.is_zero() => {}
                Poll::Pending => self.idle(interval),
            }
        }
    }

    /// Let the runtime drive I/O and timers without advancing the run
    fn idle(&self, interval: Duration) {
        // The timer must be created inside the runtime context.
        self.runtime
            .block_on(async { tokio::time::sleep(interval).await });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::error::ServiceResult;
    use crate::mock::MockExport;
    use crate::orchestrator::SyncOptions;
    use crate::orchestrator::tests::{RecordingSink, seeded_mock};
    use crate::service::{ExportJob, Project, TranslationService};
    use async_trait::async_trait;
    use std::path::Path;

    struct PanickingService;

    #[async_trait]
    impl TranslationService for PanickingService {
        async fn list_projects(&self) -> ServiceResult<Vec<Project>> {
            Ok(Vec::new())
        }

        async fn export_locale(&self, _locale: &str, _project_id: &str) -> ServiceResult<ExportJob> {
            panic!("export exploded");
        }

        async fn download_file(&self, _url: &str, _destination: &Path) -> ServiceResult<()> {
            Ok(())
        }

        fn service_name(&self) -> &str {
            "Panicking Service"
        }
    }

    fn catalog() -> StaticCatalog {
        StaticCatalog::new(vec!["en".to_string(), "fr".to_string()])
    }

    fn options() -> SyncOptions {
        SyncOptions::new("7717").unwrap()
    }

    #[test]
    fn test_ticks_stay_pending_while_waiting() {
        let mock = seeded_mock().with_delay(Duration::from_millis(20));
        let catalog = catalog();
        let mut sink = RecordingSink::with_locales(&["en", "fr"]);
        let mut driver =
            Driver::new(Orchestrator::new(&mock, &catalog, &mut sink, options())).unwrap();

        assert!(driver.tick().is_pending());
        assert!(matches!(driver.state(), SyncState::PerLocale { index: 0, .. }));

        let mut pending = 1;
        let summary = loop {
            match driver.tick() {
                Poll::Ready(result) => break result.unwrap(),
                Poll::Pending => {
                    pending += 1;
                    assert!(pending < 10_000, "run never finished");
                    std::thread::sleep(Duration::from_millis(1));
                }
            }
        };

        assert!(pending > 1);
        assert_eq!(summary.succeeded(), 2);
        assert_eq!(driver.state(), SyncState::Done);
        assert!(driver.is_finished());
        assert!(matches!(
            driver.tick(),
            Poll::Ready(Err(SyncError::AlreadyFinished))
        ));
        drop(driver);
        assert_eq!(sink.commits, 1);
    }

    #[test]
    fn test_host_loop_and_polling_agree() {
        let catalog = catalog();

        let mock = seeded_mock()
            .with_delay(Duration::from_millis(2))
            .with_export("fr", MockExport::Fail("quota exceeded".into()));
        let mut frame_sink = RecordingSink::with_locales(&["en", "fr"]);
        let mut frames = Vec::new();
        let from_frames = Driver::new(Orchestrator::new(&mock, &catalog, &mut frame_sink, options()))
            .unwrap()
            .run_host_loop(|state| frames.push(state.clone()))
            .unwrap();

        let mock = seeded_mock()
            .with_delay(Duration::from_millis(2))
            .with_export("fr", MockExport::Fail("quota exceeded".into()));
        let mut poll_sink = RecordingSink::with_locales(&["en", "fr"]);
        let from_polling = Driver::new(Orchestrator::new(&mock, &catalog, &mut poll_sink, options()))
            .unwrap()
            .run_polling(Duration::from_millis(1))
            .unwrap();

        assert!(!frames.is_empty());
        assert_eq!(from_frames, from_polling);
        assert_eq!(from_frames.succeeded(), 1);
        assert_eq!(from_frames.failed(), 1);
        assert_eq!(frame_sink.commits, 1);
        assert_eq!(poll_sink.commits, 1);
        for locale in ["en", "fr"] {
            assert_eq!(
                frame_sink.strings.table(locale),
                poll_sink.strings.table(locale)
            );
        }
    }

    #[test]
    fn test_polling_with_interval_completes() {
        let mock = seeded_mock().with_delay(Duration::from_millis(2));
        let catalog = catalog();
        let mut sink = RecordingSink::with_locales(&["en", "fr"]);

        let summary = Driver::new(Orchestrator::new(&mock, &catalog, &mut sink, options()))
            .unwrap()
            .run_polling(Duration::from_millis(20))
            .unwrap();

        assert_eq!(summary.succeeded(), 2);
        assert_eq!(sink.commits, 1);
        assert_eq!(sink.strings.table("fr").unwrap().get("play"), Some("Play_fr"));
    }

    #[test]
    fn test_panic_faults_the_run() {
        let catalog = catalog();
        let mut sink = RecordingSink::with_locales(&["en", "fr"]);
        let mut driver =
            Driver::new(Orchestrator::new(&PanickingService, &catalog, &mut sink, options()))
                .unwrap();

        match driver.tick() {
            Poll::Ready(Err(SyncError::Panicked(message))) => {
                assert_eq!(message, "export exploded")
            }
            other => panic!("Expected a panic fault, got {other:?}"),
        }
        assert_eq!(driver.state(), SyncState::Faulted);
        assert!(matches!(
            driver.tick(),
            Poll::Ready(Err(SyncError::AlreadyFinished))
        ));
        drop(driver);
        assert_eq!(sink.commits, 0);
    }

    #[test]
    fn test_polling_stops_on_fault() {
        let mock = seeded_mock();
        let catalog = catalog();
        let mut sink = RecordingSink::with_locales(&["en", "fr"]);
        sink.fail_commit = true;

        let result = Driver::new(Orchestrator::new(&mock, &catalog, &mut sink, options()))
            .unwrap()
            .run_polling(Duration::ZERO);

        assert!(matches!(result, Err(SyncError::Store(_))));
        assert_eq!(sink.commits, 1);
    }

    #[test]
    fn test_panic_message_payloads() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }
}
