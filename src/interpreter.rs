// src/interpreter.rs
//! Interpreter lifecycle control and the parsing loop
//!
//! The interpreter owns one background worker task that pulls packets from a
//! live device and routes value updates into the telemetry model. All public
//! commands serialize against each other under a bounded-wait lock; the
//! worker is cancelled cooperatively, never killed, with the read timeout
//! bounding how long it can be blocked on the device.

use crate::device::{Device, DeviceDiscovery};
use crate::error::{GpsError, Result};
use crate::events::{InterpreterEvent, NotificationHub, SubscriberId};
use crate::filter::PositionFilter;
use crate::reconnect::ReconnectionSupervisor;
use crate::settings::InterpreterSettings;
use crate::telemetry::{TelemetryModel, TelemetrySnapshot};
use async_trait::async_trait;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{watch, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Lifecycle of the interpreter. `Disposed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpreterState {
    Stopped,
    Starting,
    Running,
    Paused,
    Stopping,
    Disposed,
}

/// What the worker should be doing, signalled through the run gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerSignal {
    Run,
    Pause,
    Stop,
}

/// The protocol hook. The interpreter is protocol-agnostic: an
/// implementation reads and fully processes exactly one packet per call,
/// mutating telemetry through the model's setters as a side effect.
#[async_trait]
pub trait PacketReader: Send + 'static {
    /// Read and fully consume one packet from the device. May block until
    /// data arrives; the interpreter bounds each call with the configured
    /// read timeout. Connection-class errors make the worker reset the
    /// device and consult the reconnection policy; any other error is
    /// reported and the session continues.
    async fn read_packet(
        &mut self,
        device: &mut dyn Device,
        telemetry: &TelemetryModel,
    ) -> Result<()>;

    /// Invoked whenever the active device handle is replaced, before the
    /// next read.
    fn on_device_changed(&mut self, _device: &dyn Device) {}
}

type RecordingSink = Box<dyn Write + Send>;
type RecordingTap = Arc<StdMutex<Option<RecordingSink>>>;

/// Wraps the active device so raw bytes can be teed into a recording sink
/// without the protocol hook knowing about it.
struct TappedDevice {
    inner: Box<dyn Device>,
    tap: RecordingTap,
}

#[async_trait]
impl Device for TappedDevice {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    async fn open(&mut self) -> Result<()> {
        self.inner.open().await
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close().await
    }

    async fn reset(&mut self) {
        self.inner.reset().await
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.inner.read(buf).await?;
        if n > 0 {
            let mut tap = self.tap.lock().unwrap();
            if let Some(sink) = tap.as_mut() {
                if let Err(e) = sink.write_all(&buf[..n]) {
                    warn!("recording sink failed, recording stopped: {}", e);
                    *tap = None;
                }
            }
        }
        Ok(n)
    }

    fn precision_estimate(&self, quality: crate::telemetry::FixQuality) -> f64 {
        self.inner.precision_estimate(quality)
    }
}

/// State shared between the command surface and the worker.
struct Shared {
    telemetry: Arc<TelemetryModel>,
    hub: Arc<NotificationHub>,
    discovery: Arc<dyn DeviceDiscovery>,
    settings: InterpreterSettings,
    state: StdMutex<InterpreterState>,
    disposed: AtomicBool,
    allow_reconnect: Arc<AtomicBool>,
    gate: watch::Sender<WorkerSignal>,
    recording: RecordingTap,
}

impl Shared {
    fn state(&self) -> InterpreterState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, state: InterpreterState) {
        *self.state.lock().unwrap() = state;
    }
}

/// Data guarded by the command lock.
struct Inner {
    worker: Option<JoinHandle<()>>,
}

/// The public surface of the GPS interpreter state machine.
///
/// Construct with a protocol hook and a discovery collaborator, then drive
/// it with `start`/`pause`/`resume`/`stop`/`dispose`. Must be created from
/// within a tokio runtime.
pub struct Interpreter {
    shared: Arc<Shared>,
    reader: Arc<Mutex<Box<dyn PacketReader>>>,
    inner: Mutex<Inner>,
}

impl Interpreter {
    pub fn new(
        reader: impl PacketReader,
        discovery: Arc<dyn DeviceDiscovery>,
        settings: InterpreterSettings,
    ) -> Result<Self> {
        settings.validate()?;
        let hub = Arc::new(NotificationHub::new());
        let telemetry = Arc::new(TelemetryModel::new(
            Arc::clone(&hub),
            Arc::clone(&discovery),
            &settings,
        ));
        let allow_reconnect = Arc::new(AtomicBool::new(settings.allow_automatic_reconnection));
        let (gate, _) = watch::channel(WorkerSignal::Pause);
        Ok(Self {
            shared: Arc::new(Shared {
                telemetry,
                hub,
                discovery,
                settings,
                state: StdMutex::new(InterpreterState::Stopped),
                disposed: AtomicBool::new(false),
                allow_reconnect,
                gate,
                recording: Arc::new(StdMutex::new(None)),
            }),
            reader: Arc::new(Mutex::new(Box::new(reader))),
            inner: Mutex::new(Inner { worker: None }),
        })
    }

    pub fn state(&self) -> InterpreterState {
        self.shared.state()
    }

    pub fn is_running(&self) -> bool {
        self.shared.state() == InterpreterState::Running
    }

    /// The live telemetry model; setters are for the protocol hook, readers
    /// may take snapshots from any thread.
    pub fn telemetry(&self) -> Arc<TelemetryModel> {
        Arc::clone(&self.shared.telemetry)
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.shared.telemetry.snapshot()
    }

    /// Register a notification callback. Most events are delivered on the
    /// worker; position-changed arrives from the dispatch task (see
    /// events.rs for the coalescing contract).
    pub fn subscribe<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn(&InterpreterEvent) + Send + Sync + 'static,
    {
        self.shared.hub.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.shared.hub.unsubscribe(id)
    }

    pub fn set_filter(&self, filter: Option<Box<dyn PositionFilter>>) {
        self.shared.telemetry.set_filter(filter);
    }

    pub fn set_filter_enabled(&self, enabled: bool) {
        self.shared.telemetry.set_filter_enabled(enabled);
    }

    pub fn set_allow_automatic_reconnection(&self, allow: bool) {
        self.shared.allow_reconnect.store(allow, Ordering::Relaxed);
    }

    /// Start interpreting from any available device. Fails with
    /// `DeviceNotFound`, leaving the state `Stopped`, when the discovery
    /// collaborator has nothing to offer. Starting while paused resumes.
    pub async fn start(&self) -> Result<()> {
        self.start_inner(None).await
    }

    /// Start interpreting from the given device, opening it if necessary.
    pub async fn start_with_device(&self, device: Box<dyn Device>) -> Result<()> {
        self.start_inner(Some(device)).await
    }

    async fn start_inner(&self, device: Option<Box<dyn Device>>) -> Result<()> {
        let mut inner = self.command_guard().await?;
        if inner.worker.as_ref().map_or(false, |w| w.is_finished()) {
            // The previous session ended on its own (e.g. retries
            // exhausted); clean up so a fresh one can start.
            inner.worker = None;
        }
        if inner.worker.is_some() {
            if self.shared.state() == InterpreterState::Paused {
                self.shared.gate.send_replace(WorkerSignal::Run);
                self.shared.set_state(InterpreterState::Running);
                self.shared.hub.publish(InterpreterEvent::Resumed);
            }
            return Ok(());
        }

        // Acquire and open the device while still Stopped, so a failure
        // here leaves no trace.
        let mut device = match device {
            Some(device) => device,
            None => self
                .shared
                .discovery
                .any_available_device()
                .await
                .ok_or(GpsError::DeviceNotFound)?,
        };
        if !device.is_open() {
            device.open().await?;
        }
        info!(device = device.name(), "starting interpreter");

        self.shared.set_state(InterpreterState::Starting);
        self.shared.hub.publish(InterpreterEvent::Starting);
        self.shared.gate.send_replace(WorkerSignal::Run);
        let tapped = TappedDevice {
            inner: device,
            tap: Arc::clone(&self.shared.recording),
        };
        inner.worker = Some(tokio::spawn(parsing_loop(
            Arc::clone(&self.shared),
            Arc::clone(&self.reader),
            Some(tapped),
        )));
        Ok(())
    }

    /// Close the run gate: the worker finishes the packet in flight, then
    /// blocks before touching the device again.
    pub async fn pause(&self) -> Result<()> {
        let _inner = self.command_guard().await?;
        if self.shared.state() == InterpreterState::Running {
            self.shared.gate.send_replace(WorkerSignal::Pause);
            self.shared.set_state(InterpreterState::Paused);
            self.shared.hub.publish(InterpreterEvent::Paused);
        }
        Ok(())
    }

    /// Reopen the run gate after a pause.
    pub async fn resume(&self) -> Result<()> {
        let _inner = self.command_guard().await?;
        if self.shared.state() == InterpreterState::Paused {
            self.shared.gate.send_replace(WorkerSignal::Run);
            self.shared.set_state(InterpreterState::Running);
            self.shared.hub.publish(InterpreterEvent::Resumed);
        }
        Ok(())
    }

    /// Stop the session: signal the worker (releasing the gate so a paused
    /// worker observes the request), join it bounded by the command timeout,
    /// and let it close the device. A join timeout is reported as an error;
    /// the worker is never terminated forcibly.
    pub async fn stop(&self) -> Result<()> {
        let mut inner = self.command_guard().await?;
        self.stop_locked(&mut inner).await
    }

    async fn stop_locked(&self, inner: &mut Inner) -> Result<()> {
        let Some(mut worker) = inner.worker.take() else {
            return Ok(());
        };
        if worker.is_finished() {
            // The session already ended on its own (retries exhausted).
            let _ = worker.await;
            return Ok(());
        }
        self.shared.set_state(InterpreterState::Stopping);
        self.shared.hub.publish(InterpreterEvent::Stopping);
        self.shared.gate.send_replace(WorkerSignal::Stop);

        match timeout(self.shared.settings.command_timeout, &mut worker).await {
            Ok(_) => Ok(()),
            Err(_) => {
                // Cooperative cancellation failed to finish in time; hand
                // the handle back so a later stop or dispose can retry.
                inner.worker = Some(worker);
                Err(GpsError::Timeout(
                    "worker did not stop within the command timeout".to_string(),
                ))
            }
        }
    }

    /// Begin teeing raw device bytes into `sink`. Takes only the recording
    /// lock, so it may be called while a command is in flight.
    pub fn start_recording(&self, sink: RecordingSink) -> Result<()> {
        if self.shared.disposed.load(Ordering::SeqCst) {
            return Err(GpsError::Disposed);
        }
        *self.shared.recording.lock().unwrap() = Some(sink);
        Ok(())
    }

    /// Stop recording and flush the sink.
    pub fn stop_recording(&self) -> Result<()> {
        if self.shared.disposed.load(Ordering::SeqCst) {
            return Err(GpsError::Disposed);
        }
        if let Some(mut sink) = self.shared.recording.lock().unwrap().take() {
            let _ = sink.flush();
        }
        Ok(())
    }

    /// Release everything. Idempotent; forces stop semantics if a session
    /// is still running. After completion every public operation fails with
    /// `Disposed`.
    pub async fn dispose(&self) -> Result<()> {
        if self.shared.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        // Signal first: even if the command lock is contended the worker
        // sees the stop request and the disposed flag.
        self.shared.gate.send_replace(WorkerSignal::Stop);

        match timeout(self.shared.settings.command_timeout, self.inner.lock()).await {
            Ok(mut inner) => {
                if let Some(mut worker) = inner.worker.take() {
                    if !worker.is_finished() {
                        self.shared.set_state(InterpreterState::Stopping);
                        self.shared.hub.publish(InterpreterEvent::Stopping);
                    }
                    if timeout(self.shared.settings.command_timeout, &mut worker)
                        .await
                        .is_err()
                    {
                        warn!("worker did not stop within the command timeout during dispose");
                    }
                }
            }
            Err(_) => {
                warn!("command lock busy during dispose; worker signalled to stop");
            }
        }

        if let Some(mut sink) = self.shared.recording.lock().unwrap().take() {
            let _ = sink.flush();
        }
        self.shared.hub.shutdown().await;
        self.shared.set_state(InterpreterState::Disposed);
        Ok(())
    }

    /// Acquire the command lock within the bounded wait, or fail with
    /// `Busy` having changed nothing.
    async fn command_guard(&self) -> Result<MutexGuard<'_, Inner>> {
        if self.shared.disposed.load(Ordering::SeqCst) {
            return Err(GpsError::Disposed);
        }
        let wait = self.shared.settings.command_timeout;
        let guard = timeout(wait, self.inner.lock())
            .await
            .map_err(|_| GpsError::Busy(wait))?;
        if self.shared.disposed.load(Ordering::SeqCst) {
            return Err(GpsError::Disposed);
        }
        Ok(guard)
    }
}

/// The background worker. One packet per iteration; the run gate at the top
/// of the loop is the only intentional suspension point.
async fn parsing_loop(
    shared: Arc<Shared>,
    reader: Arc<Mutex<Box<dyn PacketReader>>>,
    mut device: Option<TappedDevice>,
) {
    let mut gate = shared.gate.subscribe();
    let mut supervisor = ReconnectionSupervisor::new(
        Arc::clone(&shared.allow_reconnect),
        shared.settings.maximum_reconnection_attempts,
    );

    if device.is_some() {
        reader.lock().await.on_device_changed(device.as_ref().unwrap());
        shared.set_state(InterpreterState::Running);
        shared.hub.publish(InterpreterEvent::Started);
    }

    // Whether the loss handler already announced Stopped for the current
    // (ended) session, so the exit path does not repeat it.
    let mut stopped_announced = false;

    'session: loop {
        // Run gate: blocks while paused, observes stop promptly.
        loop {
            if shared.disposed.load(Ordering::SeqCst) {
                break 'session;
            }
            let signal = *gate.borrow_and_update();
            match signal {
                WorkerSignal::Run => break,
                WorkerSignal::Stop => break 'session,
                WorkerSignal::Pause => {
                    if gate.changed().await.is_err() {
                        break 'session;
                    }
                }
            }
        }

        // Make sure there is an open device before reading.
        if device.as_ref().map_or(true, |d| !d.is_open()) {
            match acquire_device(&shared).await {
                Some(fresh) => {
                    shared.set_state(InterpreterState::Starting);
                    shared.hub.publish(InterpreterEvent::Starting);
                    reader.lock().await.on_device_changed(&fresh);
                    shared.set_state(InterpreterState::Running);
                    shared.hub.publish(InterpreterEvent::Started);
                    supervisor.reset();
                    stopped_announced = false;
                    device = Some(fresh);
                    // Skip the read this iteration.
                    continue 'session;
                }
                None => {
                    if supervisor.query_reconnect_allowed().await {
                        continue 'session;
                    }
                    break 'session;
                }
            }
        }
        let current = device.as_mut().unwrap();

        // Delegate one packet to the protocol hook, bounded by the read
        // timeout so cancellation is always observed promptly.
        let read = timeout(shared.settings.read_timeout, async {
            reader
                .lock()
                .await
                .read_packet(current, &shared.telemetry)
                .await
        })
        .await;

        match read {
            Ok(Ok(())) => {
                // The filter weighting depends on the device's error
                // estimate for whatever quality the packet reported.
                if let Some(quality) = shared.telemetry.fix_quality() {
                    shared
                        .telemetry
                        .update_precision_estimate(current.precision_estimate(quality));
                }
            }
            Ok(Err(e)) if e.is_connection_loss() => {
                connection_lost(&shared, &mut device, &e.to_string()).await;
                stopped_announced = true;
                if !supervisor.query_reconnect_allowed().await {
                    break 'session;
                }
            }
            Ok(Err(e)) => {
                // Not fatal to the session: report and keep reading.
                debug!("packet processing failure: {}", e);
                shared
                    .hub
                    .publish(InterpreterEvent::ExceptionOccurred(e.to_string()));
            }
            Err(_) => {
                connection_lost(&shared, &mut device, "device read timed out").await;
                stopped_announced = true;
                if !supervisor.query_reconnect_allowed().await {
                    break 'session;
                }
            }
        }
    }

    if let Some(mut current) = device.take() {
        let _ = current.close().await;
    }
    if !shared.disposed.load(Ordering::SeqCst) {
        shared.set_state(InterpreterState::Stopped);
    }
    if !stopped_announced {
        shared.hub.publish(InterpreterEvent::Stopped);
    }
    debug!("parsing loop exited");
}

/// Reset the failed device and fire the notifications that bracket a
/// session teardown. The reconnection policy decides what happens next.
async fn connection_lost(shared: &Shared, device: &mut Option<TappedDevice>, cause: &str) {
    warn!("connection lost: {}", cause);
    shared
        .hub
        .publish(InterpreterEvent::ConnectionLost(cause.to_string()));
    shared.set_state(InterpreterState::Stopping);
    shared.hub.publish(InterpreterEvent::Stopping);
    if let Some(mut failed) = device.take() {
        failed.reset().await;
    }
    shared.set_state(InterpreterState::Stopped);
    shared.hub.publish(InterpreterEvent::Stopped);
}

/// Ask discovery for a device and open it. Any failure counts as one
/// reconnection failure for the supervisor.
async fn acquire_device(shared: &Shared) -> Option<TappedDevice> {
    let mut device = shared.discovery.any_available_device().await?;
    if !device.is_open() {
        if let Err(e) = device.open().await {
            warn!(device = device.name(), "failed to open device: {}", e);
            return None;
        }
    }
    info!(device = device.name(), "device acquired");
    Some(TappedDevice {
        inner: device,
        tap: Arc::clone(&shared.recording),
    })
}
