//! Progress stream engine.
//!
//! [`StreamEngine`] owns the event table and the cursor/pause state, and
//! drives a periodic timer task that emits one event per tick to every
//! attached [`Subscription`].
//!
//! # State machine
//!
//! ```text
//! Idle --attach--> Streaming --fault emitted--> PausedOnError
//!  ^                  |  ^                          |
//!  |                  |  +--------resume------------+
//!  +--cancel/detach/finished-----------------------+
//! ```
//!
//! Fault events are always emitted, even while paused. Progress events
//! are held while paused; the tick is a no-op wait cycle.
//!
//! # Concurrency
//!
//! All state sits behind one [`Mutex`] that is only held for short
//! synchronous sections. Events fan out through a [`broadcast`] channel.
//! Every subscriber shares one cursor, so concurrent subscribers see
//! each other's control commands.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use isasim_types::{EnginePhase, EngineStatus, StepEvent, SubscriberId};

/// Capacity of the event broadcast channel.
///
/// A subscriber that falls more than this many events behind skips to
/// the newest event.
const BROADCAST_CAPACITY: usize = 64;

/// Result of a single timer tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The event was emitted and the cursor advanced.
    Emitted(StepEvent),
    /// Paused with no fault at the cursor; nothing happened.
    Waiting,
    /// The cursor ran past the table; the timer has been stopped.
    Finished,
}

/// The running timer and the generation it was started under.
#[derive(Debug)]
struct Timer {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Mutable engine state.
#[derive(Debug, Default)]
struct EngineInner {
    cursor: usize,
    paused: bool,
    timer: Option<Timer>,
    generation: u64,
}

impl EngineInner {
    /// Stop the timer and rewind to the first event.
    fn reset(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.handle.abort();
        }
        self.cursor = 0;
        self.paused = false;
    }

    fn phase(&self) -> EnginePhase {
        match (&self.timer, self.paused) {
            (None, _) => EnginePhase::Idle,
            (Some(_), false) => EnginePhase::Streaming,
            (Some(_), true) => EnginePhase::PausedOnError,
        }
    }
}

/// The progress stream engine.
///
/// Shared as `Arc<StreamEngine>` between the HTTP handlers and the timer
/// task.
#[derive(Debug)]
pub struct StreamEngine {
    /// Pre-generated event table; never mutated.
    events: Vec<StepEvent>,
    /// Timer period.
    tick_interval: Duration,
    /// Fan-out to subscribers.
    tx: broadcast::Sender<StepEvent>,
    /// Cursor, pause flag and timer handle.
    inner: Mutex<EngineInner>,
    /// Wall-clock creation time.
    started_at: DateTime<Utc>,
}

impl StreamEngine {
    /// Create an idle engine over the given event table.
    pub fn new(events: Vec<StepEvent>, tick_interval: Duration) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            events,
            tick_interval,
            tx,
            inner: Mutex::new(EngineInner::default()),
            started_at: Utc::now(),
        }
    }

    /// Lock the engine state.
    ///
    /// No code path leaves the state half-updated across a panic point,
    /// so a poisoned lock is recovered rather than propagated.
    fn state(&self) -> MutexGuard<'_, EngineInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Attach / Detach
    // -----------------------------------------------------------------------

    /// Attach a subscriber and start the timer if it is not running.
    ///
    /// Attaching while a timer is running does not start a second one.
    /// The first tick fires one full period after the timer starts.
    /// Dropping the returned [`Subscription`] detaches.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn attach(self: &Arc<Self>) -> Subscription {
        let id = SubscriberId::new();
        let rx = self.tx.subscribe();

        let mut state = self.state();
        let running = state
            .timer
            .as_ref()
            .is_some_and(|timer| !timer.handle.is_finished());

        if running {
            debug!(subscriber = %id, "subscriber attached to running stream");
        } else {
            state.generation = state.generation.wrapping_add(1);
            let generation = state.generation;
            let handle = tokio::spawn(run_timer(
                Arc::downgrade(self),
                generation,
                self.tick_interval,
            ));
            state.timer = Some(Timer { generation, handle });
            info!(
                subscriber = %id,
                generation,
                cursor = state.cursor,
                tick_interval_ms = self.tick_interval.as_millis(),
                "stream timer started"
            );
        }
        drop(state);

        Subscription {
            id,
            rx,
            engine: Arc::clone(self),
        }
    }

    /// Stop the timer and rewind. Called when a subscriber's transport
    /// closes.
    pub fn detach(&self) {
        let mut state = self.state();
        let was_running = state.timer.is_some();
        state.reset();
        drop(state);
        info!(was_running, "stream detached, state reset");
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance the state machine by one tick.
    ///
    /// Normally driven by the timer task; exposed so the state machine can
    /// be stepped directly.
    pub fn tick(&self) -> TickOutcome {
        self.tick_inner(None)
    }

    /// Tick on behalf of the timer started under `generation`. A timer
    /// that has been superseded sees [`TickOutcome::Finished`] and exits.
    fn tick_for(&self, generation: u64) -> TickOutcome {
        self.tick_inner(Some(generation))
    }

    fn tick_inner(&self, generation: Option<u64>) -> TickOutcome {
        let mut state = self.state();

        if let Some(generation) = generation {
            let current = state.timer.as_ref().map(|timer| timer.generation);
            if current != Some(generation) {
                return TickOutcome::Finished;
            }
        }

        let Some(event) = self.events.get(state.cursor).cloned() else {
            if let Some(timer) = state.timer.take() {
                timer.handle.abort();
            }
            drop(state);
            info!(total_events = self.events.len(), "event table exhausted, stream idle");
            return TickOutcome::Finished;
        };

        if !event.is_fault() && state.paused {
            debug!(cursor = state.cursor, "paused, holding progress event");
            return TickOutcome::Waiting;
        }

        let cursor = state.cursor;
        state.cursor = cursor.saturating_add(1);
        if event.is_fault() {
            state.paused = true;
        }

        // Sent under the lock: no frame from before a cancel or detach can
        // follow it. Err means zero receivers.
        let receivers = self.tx.send(event.clone()).unwrap_or(0);
        drop(state);

        if let Some(fault) = event.error_info() {
            warn!(
                cursor,
                receivers,
                stage = %event.stage(),
                code = %fault.code,
                "fault emitted, stream paused"
            );
        } else {
            debug!(cursor, receivers, stage = %event.stage(), "progress emitted");
        }

        TickOutcome::Emitted(event)
    }

    // -----------------------------------------------------------------------
    // Control commands
    // -----------------------------------------------------------------------

    /// Clear the pause flag and skip the event after the fault.
    pub fn resume(&self) {
        let mut state = self.state();
        state.paused = false;
        state.cursor = state.cursor.saturating_add(1);
        let cursor = state.cursor;
        drop(state);
        info!(cursor, "stream resumed");
    }

    /// Acknowledge a tamper check. Same state effect as [`resume`](Self::resume).
    pub fn temper(&self) {
        let mut state = self.state();
        state.paused = false;
        state.cursor = state.cursor.saturating_add(1);
        let cursor = state.cursor;
        drop(state);
        info!(cursor, "tamper check cleared, stream resumed");
    }

    /// Stop the timer if running and rewind to the first event.
    pub fn cancel(&self) {
        let mut state = self.state();
        let was_running = state.timer.is_some();
        state.reset();
        drop(state);
        info!(was_running, "stream canceled, state reset");
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// Current lifecycle phase.
    pub fn phase(&self) -> EnginePhase {
        self.state().phase()
    }

    /// Index of the next event to consider.
    pub fn cursor(&self) -> usize {
        self.state().cursor
    }

    /// Whether emission is held after a fault.
    pub fn is_paused(&self) -> bool {
        self.state().paused
    }

    /// The event table.
    pub fn events(&self) -> &[StepEvent] {
        &self.events
    }

    /// Timer period.
    pub const fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Diagnostic snapshot.
    pub fn status(&self) -> EngineStatus {
        let state = self.state();
        EngineStatus {
            phase: state.phase(),
            cursor: state.cursor,
            paused: state.paused,
            total_events: self.events.len(),
            subscribers: self.tx.receiver_count(),
            started_at: self.started_at,
        }
    }
}

/// Timer task body: tick every `period` until the engine reports
/// [`TickOutcome::Finished`] or is dropped.
async fn run_timer(engine: Weak<StreamEngine>, generation: u64, period: Duration) {
    let mut interval = tokio::time::interval_at(
        Instant::now().checked_add(period).unwrap_or_else(Instant::now),
        period,
    );
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let Some(engine) = engine.upgrade() else {
            break;
        };
        if engine.tick_for(generation) == TickOutcome::Finished {
            break;
        }
    }
    debug!(generation, "stream timer exited");
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// A subscriber's handle on the event stream.
///
/// Dropping it detaches the engine: the timer stops and the cursor
/// rewinds, so no timer outlives the connection that started it.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    rx: broadcast::Receiver<StepEvent>,
    engine: Arc<StreamEngine>,
}

impl Subscription {
    /// This subscriber's identifier.
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next emitted event.
    ///
    /// Lagged events are skipped. Returns `None` only if the engine's
    /// sender is gone.
    pub async fn recv(&mut self) -> Option<StepEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(subscriber = %self.id, skipped, "subscriber lagged, skipping ahead");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        debug!(subscriber = %self.id, "subscriber disconnected");
        self.engine.detach();
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::arithmetic_side_effects
)]
mod tests {
    use isasim_types::{ErrorInfo, ErrorStatus, Stage, StepInfo};

    use super::*;
    use crate::config::EventTableConfig;
    use crate::event_table::build_event_table;

    const PERIOD: Duration = Duration::from_millis(2_000);

    fn progress(stage: Stage, completion: u8) -> StepEvent {
        StepEvent::progress(
            stage,
            StepInfo {
                completion,
                popup_step: stage.wire_name().to_owned(),
                pedal_position: 10,
                engine_rpm: 20,
            },
        )
    }

    fn fault(stage: Stage) -> StepEvent {
        StepEvent::fault(
            stage,
            ErrorInfo {
                code: String::from("E002"),
                message: String::from("Health check timed out."),
                status: ErrorStatus::Repeat,
                resume_step: stage,
            },
        )
    }

    /// `[p0, fault, p2, p3]`
    fn table_with_fault() -> Vec<StepEvent> {
        vec![
            progress(Stage::Health, 0),
            fault(Stage::Health),
            progress(Stage::Health, 50),
            progress(Stage::Health, 75),
        ]
    }

    fn progress_table(len: u8) -> Vec<StepEvent> {
        (0..len).map(|i| progress(Stage::Connect, i)).collect()
    }

    // -- state machine, stepped by hand --

    #[test]
    fn emits_in_order_then_finishes() {
        let engine = StreamEngine::new(progress_table(3), PERIOD);
        for expected in 0..3 {
            match engine.tick() {
                TickOutcome::Emitted(event) => {
                    assert_eq!(event.step_info().unwrap().completion, expected);
                }
                other => panic!("expected emission, got {other:?}"),
            }
        }
        assert_eq!(engine.tick(), TickOutcome::Finished);
        assert_eq!(engine.phase(), EnginePhase::Idle);
        assert_eq!(engine.cursor(), 3);
    }

    #[test]
    fn fault_pauses_and_holds_progress() {
        let engine = StreamEngine::new(table_with_fault(), PERIOD);
        assert!(matches!(engine.tick(), TickOutcome::Emitted(_)));
        let TickOutcome::Emitted(event) = engine.tick() else {
            panic!("fault should be emitted");
        };
        assert!(event.is_fault());
        assert!(engine.is_paused());
        assert_eq!(engine.cursor(), 2);

        assert_eq!(engine.tick(), TickOutcome::Waiting);
        assert_eq!(engine.tick(), TickOutcome::Waiting);
        assert_eq!(engine.cursor(), 2);
    }

    #[test]
    fn faults_are_emitted_while_paused() {
        let events = vec![fault(Stage::Connect), fault(Stage::Health)];
        let engine = StreamEngine::new(events, PERIOD);
        assert!(matches!(engine.tick(), TickOutcome::Emitted(_)));
        assert!(engine.is_paused());
        let TickOutcome::Emitted(second) = engine.tick() else {
            panic!("second fault should surface while paused");
        };
        assert_eq!(second.stage(), Stage::Health);
        assert_eq!(engine.cursor(), 2);
    }

    #[test]
    fn resume_skips_the_event_after_the_fault() {
        let events = table_with_fault();
        let engine = StreamEngine::new(events.clone(), PERIOD);
        engine.tick();
        engine.tick();
        engine.resume();
        assert!(!engine.is_paused());
        assert_eq!(engine.cursor(), 3);
        assert_eq!(engine.tick(), TickOutcome::Emitted(events[3].clone()));
    }

    #[test]
    fn temper_behaves_like_resume() {
        let engine = StreamEngine::new(table_with_fault(), PERIOD);
        engine.tick();
        engine.tick();
        engine.temper();
        assert!(!engine.is_paused());
        assert_eq!(engine.cursor(), 3);
    }

    #[test]
    fn cancel_rewinds() {
        let engine = StreamEngine::new(table_with_fault(), PERIOD);
        engine.tick();
        engine.tick();
        engine.cancel();
        assert_eq!(engine.cursor(), 0);
        assert!(!engine.is_paused());
        assert_eq!(engine.phase(), EnginePhase::Idle);
    }

    #[test]
    fn status_reports_table_and_cursor() {
        let engine = StreamEngine::new(progress_table(5), PERIOD);
        engine.tick();
        let status = engine.status();
        assert_eq!(status.phase, EnginePhase::Idle);
        assert_eq!(status.cursor, 1);
        assert_eq!(status.total_events, 5);
        assert_eq!(status.subscribers, 0);
        assert!(!status.paused);
    }

    #[test]
    fn emitted_event_is_queued_once_cursor_moves() {
        for _ in 0..200 {
            let engine = StreamEngine::new(progress_table(1), PERIOD);
            let mut rx = engine.tx.subscribe();

            std::thread::scope(|scope| {
                scope.spawn(|| engine.tick());
                while engine.cursor() == 0 {
                    std::thread::yield_now();
                }
                // The cursor is visible only after the frame was sent.
                assert!(rx.try_recv().is_ok());
            });
        }
    }

    // -- timer-driven, on virtual time --

    #[tokio::test(start_paused = true)]
    async fn streams_full_table_one_event_per_period() {
        let engine = Arc::new(StreamEngine::new(progress_table(4), PERIOD));
        let start = Instant::now();
        let mut sub = engine.attach();
        assert_eq!(engine.phase(), EnginePhase::Streaming);

        for i in 0..4_u32 {
            let event = sub.recv().await.unwrap();
            assert_eq!(event.step_info().unwrap().completion, u8::try_from(i).unwrap());
            assert_eq!(start.elapsed(), PERIOD * (i + 1));
        }

        // One more period: the timer sees the end of the table and stops.
        tokio::time::sleep(PERIOD * 2).await;
        assert_eq!(engine.phase(), EnginePhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn second_attach_does_not_start_second_timer() {
        let engine = Arc::new(StreamEngine::new(progress_table(6), PERIOD));
        let mut first = engine.attach();
        let mut second = engine.attach();
        assert_eq!(engine.status().subscribers, 2);

        let a = first.recv().await.unwrap();
        let b = second.recv().await.unwrap();
        assert_eq!(a, b);
        // A second timer would have advanced the cursor twice.
        assert_eq!(engine.cursor(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_holds_until_resume() {
        let events = table_with_fault();
        let engine = Arc::new(StreamEngine::new(events.clone(), PERIOD));
        let mut sub = engine.attach();

        assert_eq!(sub.recv().await.unwrap(), events[0]);
        assert!(sub.recv().await.unwrap().is_fault());
        assert_eq!(engine.phase(), EnginePhase::PausedOnError);

        tokio::time::sleep(PERIOD * 3).await;
        assert_eq!(engine.cursor(), 2);
        assert!(sub.rx.is_empty());

        engine.resume();
        assert_eq!(engine.phase(), EnginePhase::Streaming);
        assert_eq!(sub.recv().await.unwrap(), events[3]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_then_attach_restarts_from_zero() {
        let events = progress_table(5);
        let engine = Arc::new(StreamEngine::new(events.clone(), PERIOD));
        let mut sub = engine.attach();
        sub.recv().await.unwrap();
        sub.recv().await.unwrap();

        engine.cancel();
        assert_eq!(engine.phase(), EnginePhase::Idle);
        assert_eq!(engine.cursor(), 0);

        tokio::time::sleep(PERIOD * 3).await;
        assert_eq!(engine.cursor(), 0);

        let mut again = engine.attach();
        assert_eq!(again.recv().await.unwrap(), events[0]);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_subscription_detaches() {
        let engine = Arc::new(StreamEngine::new(progress_table(5), PERIOD));
        let mut sub = engine.attach();
        sub.recv().await.unwrap();
        sub.recv().await.unwrap();
        assert_eq!(engine.cursor(), 2);

        drop(sub);
        assert_eq!(engine.phase(), EnginePhase::Idle);
        assert_eq!(engine.cursor(), 0);
        assert!(!engine.is_paused());

        tokio::time::sleep(PERIOD * 3).await;
        assert_eq!(engine.cursor(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn finished_engine_restarts_on_attach() {
        let engine = Arc::new(StreamEngine::new(progress_table(1), PERIOD));
        let mut sub = engine.attach();
        sub.recv().await.unwrap();
        tokio::time::sleep(PERIOD * 2).await;
        assert_eq!(engine.phase(), EnginePhase::Idle);

        // The cursor stays at the end until a reset.
        let _other = engine.attach();
        assert_eq!(engine.phase(), EnginePhase::Streaming);
        tokio::time::sleep(PERIOD * 2).await;
        assert_eq!(engine.phase(), EnginePhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn generated_table_streams_to_completion() {
        let events = build_event_table(&EventTableConfig {
            error_probability: 0.0,
            seed: Some(42),
        });
        assert_eq!(events.len(), 35);
        let engine = Arc::new(StreamEngine::new(events.clone(), PERIOD));
        let mut sub = engine.attach();
        let mut last = Instant::now();

        for expected in &events {
            let event = sub.recv().await.unwrap();
            assert_eq!(&event, expected);
            assert_eq!(last.elapsed(), PERIOD);
            last = Instant::now();
        }

        tokio::time::sleep(PERIOD * 2).await;
        assert_eq!(engine.phase(), EnginePhase::Idle);
        assert_eq!(engine.cursor(), 35);
    }
}
