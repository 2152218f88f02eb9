use crate::errors::{ErrorKind, LodeError, LodeResult};
use crate::SCHEDULER;
use parking_lot::Mutex;
use std::time::Duration;
use timer::{Guard, Timer};

/// Spawn a task on a new thread.
pub fn async_task<OP>(op: OP)
where
    OP: FnOnce() + Send + 'static,
{
    std::thread::spawn(op);
}

/// Runs `f` every `interval` on the shared scheduler until the returned handle is dropped
/// or cancelled.
#[inline]
pub fn schedule_task<F>(interval: Duration, f: F) -> LodeResult<ScheduledTask>
where
    F: 'static + FnMut() + Send,
{
    SCHEDULER.schedule(interval, f)
}

/// Handle to a repeating task. Dropping it cancels the task.
pub struct ScheduledTask {
    guard: Mutex<Option<Guard>>,
}

impl ScheduledTask {
    pub fn cancel(&self) {
        self.guard.lock().take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.guard.lock().is_none()
    }
}

pub(crate) struct Scheduler {
    timer: Timer,
}

impl Scheduler {
    pub fn new() -> Scheduler {
        Scheduler {
            timer: Timer::new(),
        }
    }

    pub fn schedule<F>(&self, interval: Duration, f: F) -> LodeResult<ScheduledTask>
    where
        F: 'static + FnMut() + Send,
    {
        let chrono_duration = chrono::Duration::from_std(interval).map_err(|e| {
            log::error!("Failed to convert duration to chrono::Duration: {}", e);
            LodeError::new(
                &format!("Invalid scheduling interval {:?}: {}", interval, e),
                ErrorKind::InvalidConfiguration,
            )
        })?;

        let guard = self.timer.schedule_repeating(chrono_duration, f);
        Ok(ScheduledTask {
            guard: Mutex::new(Some(guard)),
        })
    }
}
