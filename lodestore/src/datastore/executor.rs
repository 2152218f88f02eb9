use crate::common::async_task;
use crate::datastore::engine::Engine;
use crate::errors::{ErrorKind, LodeError, LodeResult};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::JoinHandle;

type Job = Box<dyn FnOnce(&mut Engine) + Send>;
type Reject = Box<dyn FnOnce(LodeError) + Send>;

/// Callback invoked once the automatic load has finished.
pub type LoadHook = std::sync::Arc<dyn Fn(Option<&LodeError>) + Send + Sync>;

/// Result of an operation queued on a datastore.
///
/// [Pending::wait] blocks until the worker has run the operation, [Pending::then] hands the
/// result to a callback on a separate thread.
pub struct Pending<T> {
    receiver: Receiver<LodeResult<T>>,
}

impl<T: Send + 'static> Pending<T> {
    /// A handle that is already resolved.
    pub(crate) fn ready(result: LodeResult<T>) -> Pending<T> {
        let (sender, receiver) = channel();
        // the receiver is alive, this cannot fail
        let _ = sender.send(result);
        Pending { receiver }
    }

    pub fn wait(self) -> LodeResult<T> {
        match self.receiver.recv() {
            Ok(result) => result,
            Err(_) => Err(store_closed()),
        }
    }

    /// Runs `callback` with the result once it is available. Panics raised by the callback
    /// are not caught.
    pub fn then<F>(self, callback: F)
    where
        F: FnOnce(LodeResult<T>) + Send + 'static,
    {
        async_task(move || callback(self.wait()));
    }
}

struct Task {
    job: Job,
    reject: Reject,
}

impl Task {
    fn new<T, OP>(op: OP) -> (Task, Pending<T>)
    where
        T: Send + 'static,
        OP: FnOnce(&mut Engine) -> LodeResult<T> + Send + 'static,
    {
        let (sender, receiver) = channel();
        let rejected = sender.clone();
        let task = Task {
            job: Box::new(move |engine| {
                let result = catch_unwind(AssertUnwindSafe(|| op(engine)))
                    .unwrap_or_else(|panic| Err(operation_panicked(panic)));
                // a caller that dropped its handle is not interested in the result
                let _ = sender.send(result);
            }),
            reject: Box::new(move |e| {
                let _ = rejected.send(Err(e));
            }),
        };
        (task, Pending { receiver })
    }

    fn background<OP>(name: &'static str, op: OP) -> Task
    where
        OP: FnOnce(&mut Engine) -> LodeResult<()> + Send + 'static,
    {
        Task {
            job: Box::new(move |engine| {
                let result = catch_unwind(AssertUnwindSafe(|| op(engine)))
                    .unwrap_or_else(|panic| Err(operation_panicked(panic)));
                if let Err(e) = result {
                    log::warn!("Background task {} failed: {}", name, e);
                }
            }),
            reject: Box::new(move |e| log::debug!("Background task {} rejected: {}", name, e)),
        }
    }
}

enum Message {
    Run(Task),
    Shutdown,
}

/// The single-writer queue of a datastore.
///
/// One worker thread owns the [Engine] and runs queued operations strictly in the order
/// they were submitted. An operation failing does not affect the ones queued after it,
/// except for a failed automatic load, after which every operation is rejected.
pub(crate) struct Executor {
    sender: Mutex<Option<Sender<Message>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Executor {
    pub(crate) fn start(
        engine: Engine,
        autoload: bool,
        on_load: Option<LoadHook>,
    ) -> LodeResult<Executor> {
        let (sender, receiver) = channel();
        let requeue = sender.clone();
        let worker = std::thread::Builder::new()
            .name("lodestore-worker".to_string())
            .spawn(move || run_worker(engine, receiver, requeue, autoload, on_load))?;

        Ok(Executor {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Queues `op` behind every operation submitted before it.
    pub(crate) fn submit<T, OP>(&self, op: OP) -> Pending<T>
    where
        T: Send + 'static,
        OP: FnOnce(&mut Engine) -> LodeResult<T> + Send + 'static,
    {
        let (task, pending) = Task::new(op);
        let guard = self.sender.lock();
        match guard.as_ref() {
            Some(sender) => {
                if let Err(e) = sender.send(Message::Run(task)) {
                    if let Message::Run(task) = e.0 {
                        (task.reject)(store_closed());
                    }
                }
            }
            None => (task.reject)(store_closed()),
        }
        pending
    }

    /// Queues `op` without a result handle; failures are logged.
    pub(crate) fn submit_background<OP>(&self, name: &'static str, op: OP)
    where
        OP: FnOnce(&mut Engine) -> LodeResult<()> + Send + 'static,
    {
        if let Some(sender) = self.sender.lock().as_ref() {
            let _ = sender.send(Message::Run(Task::background(name, op)));
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Lets every queued operation finish, then stops the worker. Later submissions are
    /// rejected with [ErrorKind::StoreClosed].
    pub(crate) fn close(&self) -> LodeResult<()> {
        let Some(sender) = self.sender.lock().take() else {
            return Ok(());
        };
        let _ = sender.send(Message::Shutdown);

        let Some(worker) = self.worker.lock().take() else {
            return Ok(());
        };
        if worker.thread().id() == std::thread::current().id() {
            // closed from a listener running on the worker itself
            return Ok(());
        }
        worker.join().map_err(|_| {
            log::error!("Datastore worker terminated with a panic");
            LodeError::new(
                "Datastore worker terminated with a panic",
                ErrorKind::InternalError,
            )
        })
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to stop datastore worker: {}", e);
        }
    }
}

fn run_worker(
    mut engine: Engine,
    receiver: Receiver<Message>,
    requeue: Sender<Message>,
    autoload: bool,
    on_load: Option<LoadHook>,
) {
    let mut load_failure = None;
    if autoload {
        let result = engine.load();
        if let Err(e) = &result {
            log::error!("Automatic load failed, rejecting every operation: {}", e);
            load_failure = Some(e.clone());
        }
        if let Some(hook) = on_load {
            // the hook may block on datastore operations
            async_task(move || hook(result.err().as_ref()));
        }
    }

    for message in receiver.iter() {
        let task = match message {
            Message::Run(task) => task,
            Message::Shutdown => break,
        };
        if let Some(failure) = &load_failure {
            (task.reject)(failure.clone());
            continue;
        }

        (task.job)(&mut engine);

        let expired = engine.take_expired();
        if !expired.is_empty() {
            log::debug!("Queueing removal of {} expired documents", expired.len());
            let reaper = Task::background("ttl", move |engine| {
                engine.remove_expired(expired).map(|_| ())
            });
            let _ = requeue.send(Message::Run(reaper));
        }
    }
    log::debug!("Datastore worker stopped");
}

pub(crate) fn store_closed() -> LodeError {
    log::error!("Datastore is closed");
    LodeError::new("Datastore is closed", ErrorKind::StoreClosed)
}

fn operation_panicked(panic: Box<dyn Any + Send>) -> LodeError {
    let reason = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    log::error!("Datastore operation panicked: {}", reason);
    LodeError::new(
        &format!("Datastore operation panicked: {}", reason),
        ErrorKind::InternalError,
    )
}
