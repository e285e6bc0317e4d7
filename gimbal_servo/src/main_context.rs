// THEORY:
// Windowing toolkits are rarely thread-safe: every call has to happen on one
// designated thread, usually the process's main thread. Frames, however, arrive
// on whatever thread the video collaborator happens to use.
//
// The `MainContext` bridges the two. It owns the display backend and a
// single-consumer job queue. Any thread holding a `MainContextHandle` can push a
// job; only the thread running the context executes it.
//
// Key architectural principles:
// 1.  **Ownership**: The backend never leaves the main context, so it does not
//     need to be `Send`. Only the boxed jobs cross threads.
// 2.  **Two submission styles**: `submit` is fire-and-forget; `call` blocks the
//     caller until the job has run and returns its result. Use `call` only when
//     the backend needs synchronous presentation, and never from the main
//     context itself (it would wait on its own queue forever).
// 3.  **Event pumping**: Between jobs the context pumps backend events, so the
//     window stays responsive even when no frames are arriving.

use crate::display::FrameDisplay;
use crate::error::DisplayError;
use crate::quit::QuitSignal;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use std::time::Duration;
use tracing::{debug, warn};

type Job<D> = Box<dyn FnOnce(&mut D) + Send + 'static>;

/// The runner side. Lives on, and must be driven by, the designated thread.
pub struct MainContext<D: 'static> {
    display: D,
    jobs: Receiver<Job<D>>,
}

/// Cloneable, `Send` submission side.
pub struct MainContextHandle<D: 'static> {
    jobs: Sender<Job<D>>,
}

impl<D: 'static> Clone for MainContextHandle<D> {
    fn clone(&self) -> Self {
        Self {
            jobs: self.jobs.clone(),
        }
    }
}

/// Creates a main context owning `display`, plus a handle for other threads.
pub fn main_context<D: FrameDisplay + 'static>(
    display: D,
) -> (MainContext<D>, MainContextHandle<D>) {
    let (tx, rx) = unbounded::<Job<D>>();
    (MainContext { display, jobs: rx }, MainContextHandle { jobs: tx })
}

impl<D: FrameDisplay + 'static> MainContext<D> {
    /// Runs queued jobs and pumps events until `quit` fires or every handle is dropped.
    pub fn run_until(&mut self, quit: &QuitSignal, pump_interval: Duration) {
        debug!("main context running");
        while !quit.is_fired() {
            match self.jobs.recv_timeout(pump_interval) {
                Ok(job) => job(&mut self.display),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            self.run_pending();
            if let Err(e) = self.display.pump_events() {
                warn!("display event pump failed: {e}");
            }
        }
        // Jobs already queued still belong to cycles that completed.
        self.run_pending();
        debug!("main context stopped");
    }

    /// Runs every job currently queued without waiting. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.jobs.try_recv() {
            job(&mut self.display);
            ran += 1;
        }
        ran
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn into_display(self) -> D {
        self.display
    }
}

impl<D: 'static> MainContextHandle<D> {
    /// Queues a job without waiting for it.
    pub fn submit(&self, job: impl FnOnce(&mut D) + Send + 'static) -> Result<(), DisplayError> {
        self.jobs
            .send(Box::new(job))
            .map_err(|_| DisplayError::Disconnected)
    }

    /// Queues a job and blocks until the main context has run it.
    pub fn call<R: Send + 'static>(
        &self,
        job: impl FnOnce(&mut D) -> R + Send + 'static,
    ) -> Result<R, DisplayError> {
        let (done_tx, done_rx) = bounded::<R>(1);
        self.submit(move |display| {
            let _ = done_tx.send(job(display));
        })?;
        done_rx.recv().map_err(|_| DisplayError::Disconnected)
    }
}
