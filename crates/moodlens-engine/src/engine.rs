use crate::capture::{CaptureProvider, CaptureSource};
use crate::loader::{LoadError, Loader, Resources};
use crate::status::Status;
use image::RgbImage;
use moodlens_core::{FaceDetection, FramePipeline, PipelineError};
use moodlens_hw::CameraError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("models are not loaded; reload before starting")]
    ModelsUnavailable,
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Loop timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Delay between the end of one cycle and the start of the next.
    pub frame_interval: Duration,
    /// Ticks skipped while loading before the session gives up.
    pub max_pending_ticks: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
            max_pending_ticks: 600,
        }
    }
}

/// Messages handled by the engine thread.
enum EngineRequest {
    Start {
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Reload {
        reply: oneshot::Sender<()>,
    },
    /// Sent by the loader thread when loading finishes.
    Loaded(Result<Box<dyn Resources>, LoadError>),
}

/// Clone-safe handle to the engine thread.
///
/// The engine exits once every handle is dropped, releasing the camera if
/// a session is still running.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
    running: Arc<AtomicBool>,
    status: watch::Receiver<Status>,
    results: watch::Receiver<Vec<FaceDetection>>,
    surface: watch::Receiver<Option<Arc<RgbImage>>>,
}

impl EngineHandle {
    /// Acquire the camera and begin ticking. A no-op while running.
    pub async fn start(&self) -> Result<(), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineRequest::Start { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Stop ticking, release the camera and clear published output.
    ///
    /// The running flag drops before the request is queued: a cycle already
    /// in progress completes, but no further cycle begins.
    pub async fn stop(&self) -> Result<(), EngineError> {
        self.running.store(false, Ordering::SeqCst);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineRequest::Stop { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Retry loading collaborators. A no-op if they are loaded or loading.
    pub async fn reload(&self) -> Result<(), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineRequest::Reload { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    async fn send(&self, request: EngineRequest) -> Result<(), EngineError> {
        self.tx
            .send(request)
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> Status {
        self.status.borrow().clone()
    }

    /// Detections from the most recent successful cycle.
    pub fn results(&self) -> Vec<FaceDetection> {
        self.results.borrow().clone()
    }

    /// The most recent annotated frame, `None` when stopped.
    pub fn surface(&self) -> Option<Arc<RgbImage>> {
        self.surface.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<Status> {
        self.status.clone()
    }

    pub fn subscribe_results(&self) -> watch::Receiver<Vec<FaceDetection>> {
        self.results.clone()
    }

    pub fn subscribe_surface(&self) -> watch::Receiver<Option<Arc<RgbImage>>> {
        self.surface.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Idle,
    Running,
    Stopped,
}

/// Engine-thread state. Owns the pipeline and, while running, the camera.
struct Session {
    state: RunState,
    running: Arc<AtomicBool>,
    settings: EngineSettings,
    pipeline: Option<FramePipeline>,
    loading: bool,
    pending_ticks: u32,
    source: Option<Box<dyn CaptureSource>>,
    provider: Box<dyn CaptureProvider>,
    loader: Arc<dyn Loader>,
    requests: mpsc::WeakSender<EngineRequest>,
    status: watch::Sender<Status>,
    results: watch::Sender<Vec<FaceDetection>>,
    surface: watch::Sender<Option<Arc<RgbImage>>>,
}

impl Session {
    fn is_ticking(&self) -> bool {
        self.state == RunState::Running && self.running.load(Ordering::SeqCst)
    }

    fn set_status(&self, status: Status) {
        self.status.send_replace(status);
    }

    fn handle(&mut self, request: EngineRequest) {
        match request {
            EngineRequest::Start { reply } => {
                let _ = reply.send(self.start());
            }
            EngineRequest::Stop { reply } => {
                self.stop();
                let _ = reply.send(());
            }
            EngineRequest::Reload { reply } => {
                if self.loading || self.pipeline.is_some() {
                    tracing::debug!("reload ignored; models loaded or loading");
                } else {
                    self.begin_loading();
                }
                let _ = reply.send(());
            }
            EngineRequest::Loaded(result) => self.finish_loading(result),
        }
    }

    fn start(&mut self) -> Result<(), EngineError> {
        if self.state == RunState::Running {
            // A stop may have cleared the flag; it is processed next.
            return Ok(());
        }
        if self.pipeline.is_none() && !self.loading {
            return Err(EngineError::ModelsUnavailable);
        }

        self.set_status(Status::RequestingCamera);
        let source = match self.provider.acquire() {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(error = %e, "camera request failed");
                self.set_status(Status::CameraFailed(e.to_string()));
                return Err(e.into());
            }
        };

        self.source = Some(source);
        self.pending_ticks = 0;
        self.state = RunState::Running;
        self.running.store(true, Ordering::SeqCst);
        self.set_status(Status::Running);
        tracing::info!("session started");
        Ok(())
    }

    fn stop(&mut self) {
        if self.state != RunState::Running {
            return;
        }
        self.halt();
        self.surface.send_replace(None);
        self.results.send_replace(Vec::new());
        self.set_status(Status::Stopped);
        tracing::info!("session stopped");
    }

    /// Leave the running state and release the camera.
    fn halt(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.state = RunState::Stopped;
        self.source = None;
    }

    fn begin_loading(&mut self) {
        if self.requests.upgrade().is_none() {
            return;
        }
        let loader = Arc::clone(&self.loader);
        // Only a weak sender crosses over, so a slow load never keeps the
        // request channel (and with it the session) alive after shutdown.
        let requests = self.requests.clone();

        let spawned = std::thread::Builder::new()
            .name("moodlens-loader".into())
            .spawn(move || {
                let result = loader.load();
                if let Some(tx) = requests.upgrade() {
                    let _ = tx.blocking_send(EngineRequest::Loaded(result));
                }
            });

        match spawned {
            Ok(_) => {
                self.loading = true;
                if self.state != RunState::Running {
                    self.set_status(Status::Loading);
                }
                tracing::info!("loading models");
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to spawn loader thread");
                self.set_status(Status::LoadFailed(e.to_string()));
            }
        }
    }

    fn finish_loading(&mut self, result: Result<Box<dyn Resources>, LoadError>) {
        self.loading = false;
        match result.and_then(|resources| resources.assemble()) {
            Ok(pipeline) => {
                self.pipeline = Some(pipeline);
                if self.state != RunState::Running {
                    self.set_status(Status::Ready);
                }
                tracing::info!("models ready");
            }
            Err(e) => {
                tracing::error!(error = %e, "model loading failed");
                if self.state == RunState::Running {
                    self.halt();
                }
                self.set_status(Status::LoadFailed(e.to_string()));
            }
        }
    }

    /// Run one cycle, or skip it while collaborators are still loading.
    fn tick(&mut self) {
        if self.pipeline.is_none() || self.source.is_none() {
            self.skip_tick();
            return;
        }
        let (Some(pipeline), Some(source)) = (self.pipeline.as_mut(), self.source.as_mut()) else {
            return;
        };

        let cycle = source
            .next_frame()
            .map_err(EngineError::from)
            .and_then(|mut frame| {
                let faces = pipeline.process(&mut frame.image)?;
                Ok((frame, faces))
            });

        match cycle {
            Ok((frame, faces)) => {
                tracing::trace!(sequence = frame.sequence, faces = faces.len(), "cycle complete");
                self.results.send_replace(faces);
                self.surface.send_replace(Some(Arc::new(frame.image)));
            }
            Err(e) => {
                tracing::error!(error = %e, "cycle failed; stopping session");
                self.halt();
                self.set_status(Status::Faulted(e.to_string()));
            }
        }
    }

    fn skip_tick(&mut self) {
        if self.source.is_none() {
            self.halt();
            return;
        }
        if !self.loading {
            tracing::error!("models unavailable; stopping session");
            self.halt();
            self.set_status(Status::LoadFailed("models unavailable".into()));
            return;
        }

        self.pending_ticks += 1;
        tracing::trace!(pending = self.pending_ticks, "models not ready; skipping tick");
        if self.pending_ticks >= self.settings.max_pending_ticks {
            tracing::error!(
                ticks = self.pending_ticks,
                "models still loading; stopping session"
            );
            self.halt();
            self.set_status(Status::LoadFailed(format!(
                "models not ready after {} ticks",
                self.pending_ticks
            )));
        }
    }
}

async fn run_session(mut session: Session, mut rx: mpsc::Receiver<EngineRequest>) {
    let mut deadline = Instant::now();
    loop {
        if session.is_ticking() {
            tokio::select! {
                biased;
                request = rx.recv() => match request {
                    Some(request) => session.handle(request),
                    None => break,
                },
                _ = tokio::time::sleep_until(deadline) => {
                    session.tick();
                    deadline = Instant::now() + session.settings.frame_interval;
                }
            }
        } else {
            match rx.recv().await {
                Some(request) => session.handle(request),
                None => break,
            }
            deadline = Instant::now();
        }
    }
}

/// Spawn the engine on a dedicated OS thread and start loading models.
///
/// The engine owns the pipeline and the camera; requests are handled one
/// at a time between cycles, so at most one cycle is ever in flight.
pub fn spawn_engine(
    loader: Arc<dyn Loader>,
    provider: Box<dyn CaptureProvider>,
    settings: EngineSettings,
) -> Result<EngineHandle, EngineError> {
    let (tx, rx) = mpsc::channel::<EngineRequest>(8);
    let running = Arc::new(AtomicBool::new(false));
    let (status_tx, status_rx) = watch::channel(Status::Loading);
    let (results_tx, results_rx) = watch::channel(Vec::new());
    let (surface_tx, surface_rx) = watch::channel(None);

    let requests = tx.downgrade();
    let session_running = Arc::clone(&running);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(EngineError::Spawn)?;

    std::thread::Builder::new()
        .name("moodlens-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            let mut session = Session {
                state: RunState::Idle,
                running: session_running,
                settings,
                pipeline: None,
                loading: false,
                pending_ticks: 0,
                source: None,
                provider,
                loader,
                requests,
                status: status_tx,
                results: results_tx,
                surface: surface_tx,
            };
            session.begin_loading();
            runtime.block_on(run_session(session, rx));
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle {
        tx,
        running,
        status: status_rx,
        results: results_rx,
        surface: surface_rx,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Rgb};
    use moodlens_core::{
        ClassLabels, Classifier, ClassifierError, FaceLocator, LocatorError, Overlay, Rectangle,
        Tensor,
    };
    use moodlens_hw::Frame;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counters {
        acquired: AtomicUsize,
        released: AtomicUsize,
        frames: AtomicUsize,
        classified: AtomicUsize,
        loads: AtomicUsize,
    }

    struct MockSource(Arc<Counters>);

    impl CaptureSource for MockSource {
        fn next_frame(&mut self) -> Result<Frame, CameraError> {
            let n = self.0.frames.fetch_add(1, Ordering::SeqCst);
            Ok(Frame::new(RgbImage::from_pixel(100, 100, Rgb([200, 30, 30])), n as u32))
        }
    }

    impl Drop for MockSource {
        fn drop(&mut self) {
            self.0.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct MockProvider {
        counters: Arc<Counters>,
        fail: bool,
    }

    impl CaptureProvider for MockProvider {
        fn acquire(&mut self) -> Result<Box<dyn CaptureSource>, CameraError> {
            if self.fail {
                return Err(CameraError::PermissionDenied("/dev/video0".into()));
            }
            self.counters.acquired.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockSource(Arc::clone(&self.counters))))
        }
    }

    struct OneFace;

    impl FaceLocator for OneFace {
        fn locate(&mut self, _gray: &GrayImage) -> Result<Vec<Rectangle>, LocatorError> {
            Ok(vec![Rectangle::new(20, 30, 50, 50)])
        }
    }

    /// Fails on the `fail_on`-th call (1-based), if set.
    struct CountingClassifier {
        counters: Arc<Counters>,
        fail_on: Option<usize>,
    }

    impl Classifier for CountingClassifier {
        fn run(&mut self, _input: Tensor) -> Result<Vec<f32>, ClassifierError> {
            let call = self.counters.classified.fetch_add(1, Ordering::SeqCst) + 1;
            if Some(call) == self.fail_on {
                return Err(ClassifierError::InferenceFailed("backend crashed".into()));
            }
            Ok(vec![2.0, 1.0, 0.1])
        }
    }

    struct MockResources {
        counters: Arc<Counters>,
        fail_on: Option<usize>,
    }

    impl Resources for MockResources {
        fn assemble(self: Box<Self>) -> Result<FramePipeline, LoadError> {
            Ok(FramePipeline::new(
                Box::new(OneFace),
                Box::new(CountingClassifier {
                    counters: self.counters,
                    fail_on: self.fail_on,
                }),
                ClassLabels::new(vec!["happy".into(), "sad".into(), "neutral".into()]),
                Overlay::new(None),
                2,
            ))
        }
    }

    struct MockLoader {
        counters: Arc<Counters>,
        /// Number of initial loads that fail.
        failures: usize,
        delay: Duration,
        fail_on: Option<usize>,
    }

    impl Loader for MockLoader {
        fn load(&self) -> Result<Box<dyn Resources>, LoadError> {
            std::thread::sleep(self.delay);
            let attempt = self.counters.loads.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                return Err(ClassifierError::ModelNotFound("emotion.onnx".into()).into());
            }
            Ok(Box::new(MockResources {
                counters: Arc::clone(&self.counters),
                fail_on: self.fail_on,
            }))
        }
    }

    struct Harness {
        handle: EngineHandle,
        counters: Arc<Counters>,
    }

    fn harness(
        loader: impl FnOnce(Arc<Counters>) -> MockLoader,
        camera_fails: bool,
        settings: EngineSettings,
    ) -> Harness {
        let counters = Arc::new(Counters::default());
        let handle = spawn_engine(
            Arc::new(loader(Arc::clone(&counters))),
            Box::new(MockProvider {
                counters: Arc::clone(&counters),
                fail: camera_fails,
            }),
            settings,
        )
        .unwrap();
        Harness { handle, counters }
    }

    fn fast() -> EngineSettings {
        EngineSettings {
            frame_interval: Duration::from_millis(1),
            max_pending_ticks: 600,
        }
    }

    fn healthy(counters: Arc<Counters>) -> MockLoader {
        MockLoader {
            counters,
            failures: 0,
            delay: Duration::ZERO,
            fail_on: None,
        }
    }

    async fn wait_for<T: Clone>(rx: &mut watch::Receiver<T>, pred: impl Fn(&T) -> bool) -> T {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                {
                    let value = rx.borrow_and_update();
                    if pred(&value) {
                        return value.clone();
                    }
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap()
    }

    async fn ready(h: &Harness) {
        wait_for(&mut h.handle.subscribe_status(), |s| *s == Status::Ready).await;
    }

    #[tokio::test]
    async fn test_loads_then_ready() {
        let h = harness(healthy, false, fast());
        ready(&h).await;
        assert!(!h.handle.is_running());
        assert!(h.handle.results().is_empty());
        assert!(h.handle.surface().is_none());
    }

    #[tokio::test]
    async fn test_stop_while_idle_is_noop() {
        let h = harness(healthy, false, fast());
        ready(&h).await;
        h.handle.stop().await.unwrap();
        assert_eq!(h.handle.status(), Status::Ready);
        assert_eq!(h.counters.acquired.load(Ordering::SeqCst), 0);
        assert_eq!(h.counters.released.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_running_session_publishes_results() {
        let h = harness(healthy, false, fast());
        ready(&h).await;
        h.handle.start().await.unwrap();
        assert!(h.handle.is_running());
        assert_eq!(h.handle.status(), Status::Running);

        let results = wait_for(&mut h.handle.subscribe_results(), |r| !r.is_empty()).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].rect, Rectangle::new(20, 30, 50, 50));
        assert_eq!(results[0].result.label, "happy");
        assert!((results[0].result.confidence - 0.659).abs() < 1e-3);

        let surface = h.handle.surface().unwrap();
        assert_eq!(surface.dimensions(), (100, 100));
    }

    #[tokio::test]
    async fn test_stop_releases_camera_and_clears_output() {
        let h = harness(healthy, false, fast());
        ready(&h).await;
        h.handle.start().await.unwrap();
        wait_for(&mut h.handle.subscribe_results(), |r| !r.is_empty()).await;

        h.handle.stop().await.unwrap();
        assert!(!h.handle.is_running());
        assert_eq!(h.handle.status(), Status::Stopped);
        assert_eq!(h.counters.released.load(Ordering::SeqCst), 1);
        assert!(h.handle.results().is_empty());
        assert!(h.handle.surface().is_none());

        let frames = h.counters.frames.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(h.counters.frames.load(Ordering::SeqCst), frames);
    }

    #[tokio::test]
    async fn test_start_while_running_is_noop() {
        let h = harness(healthy, false, fast());
        ready(&h).await;
        h.handle.start().await.unwrap();
        h.handle.start().await.unwrap();
        assert_eq!(h.counters.acquired.load(Ordering::SeqCst), 1);
        assert_eq!(h.counters.released.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let h = harness(healthy, false, fast());
        ready(&h).await;
        h.handle.start().await.unwrap();
        h.handle.stop().await.unwrap();
        h.handle.start().await.unwrap();

        wait_for(&mut h.handle.subscribe_results(), |r| !r.is_empty()).await;
        assert_eq!(h.counters.acquired.load(Ordering::SeqCst), 2);
        assert_eq!(h.counters.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cycle_failure_stops_session() {
        let h = harness(
            |counters| MockLoader {
                fail_on: Some(3),
                ..healthy(counters)
            },
            false,
            fast(),
        );
        ready(&h).await;
        h.handle.start().await.unwrap();

        let status = wait_for(&mut h.handle.subscribe_status(), Status::is_failure).await;
        assert!(matches!(status, Status::Faulted(ref reason) if reason.contains("backend crashed")));
        assert!(!h.handle.is_running());
        assert_eq!(h.counters.released.load(Ordering::SeqCst), 1);

        // Results from the last good cycle survive.
        assert_eq!(h.handle.results().len(), 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(h.counters.classified.load(Ordering::SeqCst), 3);

        // Stop after a fault changes nothing.
        h.handle.stop().await.unwrap();
        assert!(matches!(h.handle.status(), Status::Faulted(_)));
        assert_eq!(h.handle.results().len(), 1);
    }

    #[tokio::test]
    async fn test_camera_failure_keeps_idle() {
        let h = harness(healthy, true, fast());
        ready(&h).await;

        let err = h.handle.start().await.unwrap_err();
        assert!(matches!(err, EngineError::Camera(CameraError::PermissionDenied(_))));
        assert!(!h.handle.is_running());
        assert!(matches!(h.handle.status(), Status::CameraFailed(_)));

        // Still idle: stop is a no-op.
        h.handle.stop().await.unwrap();
        assert!(matches!(h.handle.status(), Status::CameraFailed(_)));
    }

    #[tokio::test]
    async fn test_pending_ticks_exhausted() {
        let settings = EngineSettings {
            frame_interval: Duration::from_millis(1),
            max_pending_ticks: 3,
        };
        let h = harness(
            |counters| MockLoader {
                delay: Duration::from_secs(2),
                ..healthy(counters)
            },
            false,
            settings,
        );
        h.handle.start().await.unwrap();

        let status = wait_for(&mut h.handle.subscribe_status(), Status::is_failure).await;
        assert_eq!(status, Status::LoadFailed("models not ready after 3 ticks".into()));
        assert!(!h.handle.is_running());
        assert_eq!(h.counters.released.load(Ordering::SeqCst), 1);
        assert_eq!(h.counters.frames.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reload_after_failed_load() {
        let h = harness(
            |counters| MockLoader {
                failures: 1,
                ..healthy(counters)
            },
            false,
            fast(),
        );
        let status = wait_for(&mut h.handle.subscribe_status(), Status::is_failure).await;
        assert!(matches!(status, Status::LoadFailed(ref reason) if reason.contains("model file not found")));

        let err = h.handle.start().await.unwrap_err();
        assert!(matches!(err, EngineError::ModelsUnavailable));
        assert_eq!(h.counters.acquired.load(Ordering::SeqCst), 0);
        assert!(matches!(h.handle.status(), Status::LoadFailed(_)));

        h.handle.reload().await.unwrap();
        ready(&h).await;
        assert_eq!(h.counters.loads.load(Ordering::SeqCst), 2);

        // Loaded: a second reload does nothing.
        h.handle.reload().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.counters.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dropping_handles_releases_camera() {
        let h = harness(healthy, false, fast());
        ready(&h).await;
        h.handle.start().await.unwrap();

        let counters = Arc::clone(&h.counters);
        drop(h);

        let released = tokio::time::timeout(Duration::from_secs(5), async {
            while counters.released.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(released.is_ok());
    }

    #[tokio::test]
    async fn test_dropping_handles_during_slow_load_releases_camera() {
        let settings = EngineSettings {
            frame_interval: Duration::from_millis(1),
            max_pending_ticks: 100_000,
        };
        let h = harness(
            |counters| MockLoader {
                delay: Duration::from_secs(3),
                ..healthy(counters)
            },
            false,
            settings,
        );
        h.handle.start().await.unwrap();
        assert_eq!(h.handle.status(), Status::Running);

        let counters = Arc::clone(&h.counters);
        drop(h);

        // The session ends without waiting for the loader to finish.
        let released = tokio::time::timeout(Duration::from_millis(1500), async {
            while counters.released.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(released.is_ok());
        assert_eq!(counters.loads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_default_settings() {
        let settings = EngineSettings::default();
        assert_eq!(settings.frame_interval, Duration::from_millis(16));
        assert_eq!(settings.max_pending_ticks, 600);
    }
}
