// THEORY:
// Display seam.
//
// Two traits live here. `FrameDisplay` is the windowing backend itself; it is
// usually not thread-safe and is owned by the main context. `FrameSink` is
// what the control loop talks to: it may be called from any thread and is
// responsible for getting the frame to wherever the backend lives.
//
// A main context slower than the loop never accumulates frames: the
// non-blocking sink keeps one pending frame and overwrites it.

use crate::error::DisplayError;
use crate::main_context::MainContextHandle;
use image::RgbImage;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;

/// A windowing backend. Only ever touched from the main context.
pub trait FrameDisplay {
    fn show(&mut self, frame: &RgbImage) -> Result<(), DisplayError>;

    /// Keeps the backend responsive. Called regularly by the main context.
    fn pump_events(&mut self) -> Result<(), DisplayError> {
        Ok(())
    }
}

/// The control loop's view of the display.
pub trait FrameSink: Send {
    fn present(&mut self, frame: RgbImage) -> Result<(), DisplayError>;
}

/// Discards every frame. For headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn present(&mut self, _frame: RgbImage) -> Result<(), DisplayError> {
        Ok(())
    }
}

type PendingFrame = Arc<Mutex<Option<RgbImage>>>;

fn lock(pending: &PendingFrame) -> MutexGuard<'_, Option<RgbImage>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marshals frames onto the main context.
///
/// Non-blocking presentation holds at most one frame for the main context. A
/// frame presented before the previous one was shown replaces it.
pub struct MainContextSink<D: 'static> {
    handle: MainContextHandle<D>,
    /// Wait for the backend to finish showing the frame before returning.
    blocking: bool,
    pending: PendingFrame,
    superseded: u64,
}

impl<D: FrameDisplay + 'static> MainContextSink<D> {
    pub fn new(handle: MainContextHandle<D>, blocking: bool) -> Self {
        Self {
            handle,
            blocking,
            pending: Arc::new(Mutex::new(None)),
            superseded: 0,
        }
    }

    /// Frames replaced by a newer one before the main context got to them.
    pub fn superseded_frames(&self) -> u64 {
        self.superseded
    }
}

impl<D: FrameDisplay + 'static> FrameSink for MainContextSink<D> {
    fn present(&mut self, frame: RgbImage) -> Result<(), DisplayError> {
        if self.blocking {
            return self.handle.call(move |display| display.show(&frame))?;
        }

        // A job is queued whenever the slot is occupied; it shows whatever is
        // in the slot when it runs.
        if lock(&self.pending).replace(frame).is_some() {
            self.superseded += 1;
            return Ok(());
        }

        let pending = Arc::clone(&self.pending);
        let submitted = self.handle.submit(move |display| {
            let Some(frame) = lock(&pending).take() else {
                return;
            };
            if let Err(e) = display.show(&frame) {
                warn!("display failed to show frame: {e}");
            }
        });
        if submitted.is_err() {
            lock(&self.pending).take();
        }
        submitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::main_context::main_context;
    use crate::quit::QuitSignal;
    use std::thread;
    use std::time::Duration;

    struct Failing;

    impl FrameDisplay for Failing {
        fn show(&mut self, _frame: &RgbImage) -> Result<(), DisplayError> {
            Err(DisplayError::Backend("no window".into()))
        }
    }

    #[test]
    fn non_blocking_sink_returns_before_the_frame_is_shown() {
        let (mut context, handle) = main_context(Failing);
        let mut sink = MainContextSink::new(handle, false);

        // The backend error is only logged on the main context.
        assert_eq!(sink.present(RgbImage::new(2, 2)), Ok(()));
        assert_eq!(context.run_pending(), 1);
    }

    #[derive(Default)]
    struct Widths(Vec<u32>);

    impl FrameDisplay for Widths {
        fn show(&mut self, frame: &RgbImage) -> Result<(), DisplayError> {
            self.0.push(frame.width());
            Ok(())
        }
    }

    #[test]
    fn slow_main_context_holds_only_the_latest_frame() {
        let (mut context, handle) = main_context(Widths::default());
        let mut sink = MainContextSink::new(handle, false);

        for width in 1..=500 {
            sink.present(RgbImage::new(width, 1)).unwrap();
        }
        assert_eq!(sink.superseded_frames(), 499);
        assert_eq!(context.run_pending(), 1);
        assert_eq!(context.display().0, vec![500]);

        // Once drained, the next frame is queued again.
        sink.present(RgbImage::new(7, 1)).unwrap();
        assert_eq!(context.run_pending(), 1);
        assert_eq!(context.display().0, vec![500, 7]);
    }

    #[test]
    fn blocking_sink_reports_backend_errors() {
        let (mut context, handle) = main_context(Failing);
        let quit = QuitSignal::new();

        let presenter = {
            let quit = quit.clone();
            thread::spawn(move || {
                let result = MainContextSink::new(handle, true).present(RgbImage::new(2, 2));
                quit.fire();
                result
            })
        };

        context.run_until(&quit, Duration::from_millis(1));
        assert_eq!(
            presenter.join().unwrap(),
            Err(DisplayError::Backend("no window".into()))
        );
    }

    #[test]
    fn sink_fails_once_the_context_is_gone() {
        let (context, handle) = main_context(Failing);
        drop(context);
        assert_eq!(
            MainContextSink::new(handle, false).present(RgbImage::new(1, 1)),
            Err(DisplayError::Disconnected)
        );
    }
}
