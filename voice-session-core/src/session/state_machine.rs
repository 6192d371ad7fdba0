use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::models::audio_models::SoundConfig;
use crate::models::error::SessionError;
use crate::models::events::DeviceReconnectedReason;
use crate::models::state::SessionState;
use crate::playback::scheduler::SchedulerSignal;
use crate::traits::audio_hardware::{AudioHardware, InterruptionEvent, RouteChangeReason, SessionCategory};
use crate::traits::event_sink::SinkSlot;
use crate::traits::output_graph::OutputGraph;

/// Internal mutable machine state, protected by `parking_lot::Mutex`.
struct MachineInner {
    state: SessionState,
    /// State to restore when an interruption ends.
    before_interruption: Option<SessionState>,
    graph: Option<Box<dyn OutputGraph>>,
    /// State changes not yet delivered to the sink.
    notices: Vec<SessionState>,
}

impl MachineInner {
    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            log::debug!("Session state {:?} -> {:?}", self.state, state);
            self.state = state;
            self.notices.push(state);
        }
    }
}

/// Result of a scheduler step run against a ready graph.
pub struct PlaybackStep<R> {
    /// The graph was built during this step.
    pub rebuilt: bool,
    pub value: R,
}

/// Sole owner of the hardware session and the output graph.
///
/// Every transition, whether requested by a caller, the scheduler or a
/// hardware notification, runs under one lock, so two graphs are never built
/// concurrently. The lock may be held across hardware calls; the playback
/// queue lock never is. Sink notifications are delivered after the lock is
/// released.
pub struct StateMachine {
    hardware: Arc<dyn AudioHardware>,
    inner: Mutex<MachineInner>,
    sound: RwLock<SoundConfig>,
    signal: Arc<SchedulerSignal>,
    sinks: Arc<SinkSlot>,
    graph_builds: AtomicU64,
}

impl StateMachine {
    pub fn new(
        hardware: Arc<dyn AudioHardware>,
        sound: SoundConfig,
        signal: Arc<SchedulerSignal>,
        sinks: Arc<SinkSlot>,
    ) -> Self {
        Self {
            hardware,
            inner: Mutex::new(MachineInner {
                state: SessionState::Idle,
                before_interruption: None,
                graph: None,
                notices: Vec::new(),
            }),
            sound: RwLock::new(sound),
            signal,
            sinks,
            graph_builds: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn sound_config(&self) -> SoundConfig {
        *self.sound.read()
    }

    pub fn hardware(&self) -> &Arc<dyn AudioHardware> {
        &self.hardware
    }

    /// Number of output graphs built since creation.
    pub fn graph_builds(&self) -> u64 {
        self.graph_builds.load(Ordering::SeqCst)
    }

    pub fn has_graph(&self) -> bool {
        self.inner.lock().graph.is_some()
    }

    /// Run `f` against a started, playing graph.
    ///
    /// Acquires the session and builds the graph when none exists.
    /// `Ok(None)` means the session cannot play right now (interrupted or
    /// recording) and the caller should retry later. On failure the machine
    /// is back in `Idle`.
    pub fn with_playback_graph<R>(
        &self,
        f: impl FnOnce(&mut dyn OutputGraph) -> R,
    ) -> Result<Option<PlaybackStep<R>>, SessionError> {
        self.locked(|inner| {
            if inner.state.is_interrupted() || inner.state.is_recording() {
                return Ok(None);
            }

            let mut rebuilt = false;
            if inner.graph.is_none() {
                if let Err(e) = self.acquire_graph(inner) {
                    log::error!("Failed to acquire playback session: {}", e);
                    self.release_session(inner);
                    inner.set_state(SessionState::Idle);
                    return Err(e);
                }
                rebuilt = true;
            }

            let started = match inner.graph.as_mut() {
                Some(graph) => start_player(graph.as_mut()),
                None => return Ok(None),
            };
            if let Err(e) = started {
                log::error!("Failed to start player: {}", e);
                self.destroy_graph(inner);
                self.release_session(inner);
                inner.set_state(SessionState::Idle);
                return Err(e);
            }
            inner.set_state(SessionState::PlaybackActive);

            match inner.graph.as_mut() {
                Some(graph) => Ok(Some(PlaybackStep {
                    rebuilt,
                    value: f(graph.as_mut()),
                })),
                None => Ok(None),
            }
        })
    }

    /// Halt the player, tear down the graph and relinquish the session.
    ///
    /// `hold` keeps the queue waiting for the next enqueue (pause).
    pub fn stop_playback(&self, hold: bool) {
        self.locked(|inner| {
            if hold {
                self.signal.hold();
            }
            if inner.graph.is_none() {
                if inner.state == SessionState::PlaybackPaused {
                    inner.set_state(SessionState::Idle);
                }
                return;
            }
            if inner.state.is_recording() {
                self.destroy_graph(inner);
                return;
            }
            self.destroy_graph(inner);
            self.release_session(inner);
            if !inner.state.is_interrupted() {
                inner.set_state(SessionState::Idle);
            }
        });
    }

    /// Replace the playback format. The next enqueue builds a graph with it.
    pub fn set_sound_config(&self, config: SoundConfig) -> Result<(), SessionError> {
        config.validate().map_err(SessionError::InvalidConfiguration)?;
        self.locked(|inner| {
            *self.sound.write() = config;
            if inner.graph.is_some() {
                self.destroy_graph(inner);
                if inner.state.is_playback() {
                    inner.set_state(SessionState::Idle);
                }
            }
            log::info!(
                "Sound config set: {} Hz, {} ch, {:?}",
                config.sample_rate,
                config.channels,
                config.playback_mode
            );
        });
        Ok(())
    }

    /// Switch the session to record-capable category. `Idle -> RecordingActive`.
    ///
    /// Tears down a live playback graph; queued entries wait until the
    /// capture ends. Refused while another process holds the session.
    pub fn begin_recording(&self) -> Result<(), SessionError> {
        self.locked(|inner| {
            if inner.state.is_recording() {
                return Err(SessionError::AlreadyActive("a capture is already running".into()));
            }
            if inner.state.is_interrupted() {
                return Err(SessionError::SessionUnavailable("audio session is interrupted".into()));
            }
            if inner.graph.is_some() {
                log::warn!("Capture start tears down the playback graph");
                self.destroy_graph(inner);
            }
            let activated = self
                .hardware
                .set_category(SessionCategory::PlayAndRecord)
                .and_then(|_| self.hardware.set_active(true));
            if let Err(e) = activated {
                log::error!("Failed to activate record session: {}", e);
                inner.set_state(SessionState::Idle);
                return Err(e);
            }
            inner.before_interruption = None;
            inner.set_state(SessionState::RecordingActive);
            Ok(())
        })
    }

    pub fn set_recording_paused(&self, paused: bool) -> Result<(), SessionError> {
        self.locked(|inner| {
            if inner.state.is_interrupted() && inner.before_interruption.is_some_and(|s| s.is_recording()) {
                inner.before_interruption = Some(if paused {
                    SessionState::RecordingPaused
                } else {
                    SessionState::RecordingActive
                });
                return Ok(());
            }
            let next = match (inner.state, paused) {
                (SessionState::RecordingActive, true) => SessionState::RecordingPaused,
                (SessionState::RecordingPaused, false) => SessionState::RecordingActive,
                (state, _) if state.is_recording() => state,
                (state, _) => {
                    return Err(SessionError::NotActive(format!("no recording to pause or resume (state {:?})", state)))
                }
            };
            inner.set_state(next);
            Ok(())
        })
    }

    /// Return the session to the playback category. `Recording* -> Idle`.
    ///
    /// Reset failures are logged; the capture result is still delivered.
    pub fn end_recording(&self) {
        self.locked(|inner| {
            let mode = self.sound.read().playback_mode;
            let reset = self
                .hardware
                .set_category(SessionCategory::Playback(mode))
                .and_then(|_| self.hardware.set_active(false))
                .and_then(|_| self.hardware.set_active(true));
            if let Err(e) = reset {
                log::warn!("Failed to reset session for playback: {}", e);
            }
            if inner.state.is_interrupted() {
                inner.before_interruption = Some(SessionState::Idle);
            } else {
                inner.set_state(SessionState::Idle);
            }
        });
        self.signal.notify();
    }

    /// React to an output route change.
    pub fn handle_route_change(&self, reason: RouteChangeReason) {
        let reconnected = self.locked(|inner| match reason {
            RouteChangeReason::CategoryChange => {
                log::debug!("Ignoring category-only route change");
                None
            }
            RouteChangeReason::Other => {
                log::debug!("Unhandled route change");
                Some(DeviceReconnectedReason::Unknown)
            }
            RouteChangeReason::NewDeviceAvailable | RouteChangeReason::OldDeviceUnavailable => {
                log::info!("Route change: {:?} (state {:?})", reason, inner.state);
                if inner.state.is_recording() {
                    // The record category keeps routing; nothing to rebuild.
                } else if inner.state.is_interrupted() {
                    self.destroy_graph(inner);
                } else if inner.graph.as_ref().is_some_and(|g| g.is_playing()) {
                    self.signal.hold();
                    self.destroy_graph(inner);
                    inner.set_state(SessionState::Idle);
                } else {
                    self.destroy_graph(inner);
                    match self.acquire_graph(inner) {
                        Ok(()) => log::info!("Playback graph rebuilt after route change"),
                        Err(e) => {
                            log::warn!("Failed to rebuild playback graph after route change: {}", e);
                            self.release_session(inner);
                        }
                    }
                    if inner.state.is_playback() {
                        inner.set_state(SessionState::Idle);
                    }
                }
                Some(reason.reconnected_reason())
            }
        });
        if let Some(reason) = reconnected {
            self.sinks.emit(|s| s.on_device_reconnected(reason));
        }
    }

    /// React to another process taking or returning audio focus.
    pub fn handle_interruption(&self, event: InterruptionEvent) {
        self.locked(|inner| match event {
            InterruptionEvent::Began => {
                if !inner.state.is_interrupted() {
                    log::info!("Audio session interrupted (state {:?})", inner.state);
                    inner.before_interruption = Some(inner.state);
                    inner.set_state(SessionState::Interrupted);
                }
            }
            InterruptionEvent::Ended { should_resume } => {
                if !inner.state.is_interrupted() {
                    return;
                }
                let prior = inner.before_interruption.take().unwrap_or(SessionState::Idle);
                log::info!("Interruption ended (resume: {}, prior {:?})", should_resume, prior);

                if !should_resume {
                    if prior.is_playback() {
                        // The halted buffer will never complete; drop it like a pause.
                        self.signal.hold();
                        self.destroy_graph(inner);
                        inner.set_state(SessionState::PlaybackPaused);
                    } else {
                        inner.set_state(prior);
                    }
                    return;
                }

                if let Err(e) = self.hardware.set_active(true) {
                    log::warn!("Failed to reactivate session after interruption: {}", e);
                    self.destroy_graph(inner);
                    inner.set_state(if prior.is_recording() { prior } else { SessionState::Idle });
                    return;
                }
                if prior.is_recording() {
                    inner.set_state(prior);
                    return;
                }
                if prior == SessionState::PlaybackActive {
                    if let Err(e) = self.resume_graph(inner) {
                        log::warn!("Failed to resume playback after interruption: {}", e);
                        self.destroy_graph(inner);
                        inner.set_state(SessionState::Idle);
                        return;
                    }
                }
                inner.set_state(prior);
            }
        });
        self.signal.notify();
    }

    /// Tear everything down and deactivate the session.
    pub fn shutdown(&self) {
        self.locked(|inner| {
            self.destroy_graph(inner);
            self.release_session(inner);
            inner.before_interruption = None;
            inner.set_state(SessionState::Idle);
        });
    }

    // --- Internal helpers ---

    /// Run `f` under the machine lock, then deliver state notices.
    fn locked<R>(&self, f: impl FnOnce(&mut MachineInner) -> R) -> R {
        let (result, notices) = {
            let mut inner = self.inner.lock();
            let result = f(&mut inner);
            (result, std::mem::take(&mut inner.notices))
        };
        for state in notices {
            self.sinks.emit(|s| s.on_state_changed(state));
        }
        result
    }

    fn acquire_graph(&self, inner: &mut MachineInner) -> Result<(), SessionError> {
        let sound = *self.sound.read();
        self.hardware.set_category(SessionCategory::Playback(sound.playback_mode))?;
        self.hardware.set_active(true)?;

        let mut graph = self.hardware.build_output_graph(sound.format())?;
        if let Err(e) = graph.start_engine() {
            graph.teardown();
            return Err(e);
        }
        let builds = self.graph_builds.fetch_add(1, Ordering::SeqCst) + 1;
        log::info!(
            "Output graph built at {} Hz, {} ch (build #{})",
            sound.sample_rate,
            sound.channels,
            builds
        );
        inner.graph = Some(graph);
        Ok(())
    }

    /// Restart a graph the hardware halted, rebuilding it if it is gone.
    fn resume_graph(&self, inner: &mut MachineInner) -> Result<(), SessionError> {
        if inner.graph.is_none() {
            self.acquire_graph(inner)?;
        }
        match inner.graph.as_mut() {
            Some(graph) => start_player(graph.as_mut()),
            None => Err(SessionError::GraphBuildFailure("graph missing after rebuild".into())),
        }
    }

    fn destroy_graph(&self, inner: &mut MachineInner) {
        if let Some(mut graph) = inner.graph.take() {
            graph.stop();
            graph.stop_engine();
            graph.teardown();
            log::info!("Output graph torn down");
            self.signal.reset_in_flight();
        }
    }

    fn release_session(&self, _inner: &mut MachineInner) {
        if let Err(e) = self.hardware.set_active(false) {
            log::warn!("Failed to deactivate audio session: {}", e);
        }
    }
}

fn start_player(graph: &mut dyn OutputGraph) -> Result<(), SessionError> {
    if !graph.is_engine_running() {
        graph.start_engine()?;
    }
    if !graph.is_playing() {
        graph.play()?;
    }
    Ok(())
}
