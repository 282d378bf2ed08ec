//! Frame-coalescing render scheduler.
//!
//! At most one render runs at a time and at most one more is queued behind
//! it. Any number of requests between two frames collapse into a single
//! render; a request that arrives while a render is running produces exactly
//! one follow-up render on the next frame.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use futures::future::LocalBoxFuture;
use tokio::sync::Notify;
use tokio::time::{interval, Interval, MissedTickBehavior};

pub type Renderer = Rc<dyn Fn() -> LocalBoxFuture<'static, ()>>;

enum SchedulerState {
    Idle,
    /// Waiting for the next frame; holds the renderer that will run
    Scheduled(Renderer),
    /// A render is in flight; `pending` is the follow-up request, if any
    Running { pending: Option<Renderer> },
}

impl SchedulerState {
    fn name(&self) -> &'static str {
        match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Scheduled(_) => "scheduled",
            SchedulerState::Running { .. } => "running",
        }
    }
}

pub struct RenderScheduler {
    renderer: RefCell<Option<Renderer>>,
    state: RefCell<SchedulerState>,
    slow_render_threshold: Option<Duration>,
    wake: Notify,
    frames_run: Cell<u64>,
}

impl RenderScheduler {
    pub fn new(slow_render_threshold: Option<Duration>) -> Self {
        Self {
            renderer: RefCell::new(None),
            state: RefCell::new(SchedulerState::Idle),
            slow_render_threshold,
            wake: Notify::new(),
            frames_run: Cell::new(0),
        }
    }

    /// Default renderer used by `request(None)`
    pub fn set_renderer(&self, renderer: Renderer) {
        *self.renderer.borrow_mut() = Some(renderer);
    }

    /// Ask for a render on the next frame. `renderer` overrides the default
    /// for this request; the last request before the frame wins.
    pub fn request(&self, renderer: Option<Renderer>) {
        let Some(renderer) = renderer.or_else(|| self.renderer.borrow().clone()) else {
            tracing::debug!("Render requested with no renderer set; ignoring");
            return;
        };
        let mut state = self.state.borrow_mut();
        if let SchedulerState::Running { pending } = &mut *state {
            *pending = Some(renderer);
            return;
        }
        *state = SchedulerState::Scheduled(renderer);
        drop(state);
        self.wake.notify_one();
    }

    /// Run the scheduled render, if any. Returns whether a render ran.
    pub async fn run_frame(&self) -> bool {
        let renderer = {
            let mut state = self.state.borrow_mut();
            match std::mem::replace(&mut *state, SchedulerState::Idle) {
                SchedulerState::Scheduled(renderer) => {
                    *state = SchedulerState::Running { pending: None };
                    renderer
                }
                other => {
                    *state = other;
                    return false;
                }
            }
        };

        let started = Instant::now();
        renderer().await;
        let elapsed = started.elapsed();
        self.frames_run.set(self.frames_run.get() + 1);
        if let Some(threshold) = self.slow_render_threshold {
            if elapsed > threshold {
                tracing::warn!("Slow render: {:?} (threshold {:?})", elapsed, threshold);
            }
        }

        let follow_up = {
            let mut state = self.state.borrow_mut();
            match std::mem::replace(&mut *state, SchedulerState::Idle) {
                SchedulerState::Running { pending } => pending,
                // Reset or re-scheduled while running
                other => {
                    *state = other;
                    None
                }
            }
        };
        if let Some(renderer) = follow_up {
            self.request(Some(renderer));
        }
        true
    }

    /// Resolves once a render is scheduled.
    pub async fn wait_scheduled(&self) {
        loop {
            if self.is_scheduled() {
                return;
            }
            self.wake.notified().await;
        }
    }

    /// Drop the default renderer and any scheduled or pending render.
    pub fn reset(&self) {
        *self.renderer.borrow_mut() = None;
        let mut state = self.state.borrow_mut();
        if let SchedulerState::Running { pending } = &mut *state {
            *pending = None;
        } else {
            *state = SchedulerState::Idle;
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(*self.state.borrow(), SchedulerState::Idle)
    }

    pub fn is_scheduled(&self) -> bool {
        matches!(*self.state.borrow(), SchedulerState::Scheduled(_))
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.state.borrow(), SchedulerState::Running { .. })
    }

    pub fn state_name(&self) -> &'static str {
        self.state.borrow().name()
    }

    pub fn frames_run(&self) -> u64 {
        self.frames_run.get()
    }
}

/// Animation-frame stand-in: ticks at a fixed cadence, never bursts.
pub struct FrameClock {
    interval: Interval,
}

impl FrameClock {
    pub fn new(period: Duration) -> Self {
        let mut interval = interval(period.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }
}
