//! Single-threaded executor that owns all protocol state.
//!
//! Mirrors `evbase` in `examples/original_source/src/evhelper.cpp`: one
//! worker thread runs a queue of posted closures to completion; foreign
//! threads interact only through [`EventLoop::dispatch`] (fire-and-forget)
//! and [`EventLoop::call`] (blocking, with the closure's panic rethrown to
//! the caller — our idiomatic stand-in for the original's C++ exception
//! propagation). All subscription FSM mutation and channel/connection state
//! belongs on this loop.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread::{self, JoinHandle, ThreadId};

use crate::error::EventLoopError;

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Msg {
    Job(Job),
    Stop,
}

struct Inner {
    tx: mpsc::Sender<Msg>,
    worker_thread: ThreadId,
    handle: Mutex<Option<JoinHandle<()>>>,
}

/// A cheap, `Clone`-able handle to a single worker thread's event loop.
#[derive(Clone)]
pub struct EventLoop(Arc<Inner>);

impl EventLoop {
    /// Spawn the worker thread and return a handle to it.
    pub fn start(name: impl Into<String>) -> Self {
        let name = name.into();
        let (tx, rx) = mpsc::channel::<Msg>();
        let thread_name = name.clone();
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || {
                tracing::info!(worker = %thread_name, "event loop worker entering");
                for msg in rx {
                    match msg {
                        Msg::Job(job) => job(),
                        Msg::Stop => break,
                    }
                }
                tracing::info!(worker = %thread_name, "event loop worker exiting");
            })
            .expect("failed to spawn event loop worker thread");
        let worker_thread = handle.thread().id();
        EventLoop(Arc::new(Inner { tx, worker_thread, handle: Mutex::new(Some(handle)) }))
    }

    fn post(&self, job: Job) -> Result<(), EventLoopError> {
        self.0.tx.send(Msg::Job(job)).map_err(|_| EventLoopError::QueueFailed)
    }

    /// Fire-and-forget: enqueue `f` to run on the worker thread.
    pub fn dispatch<F>(&self, f: F) -> Result<(), EventLoopError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.post(Box::new(f))
    }

    /// Run `f` on the worker thread and block for its result. If the
    /// calling thread IS the worker, `f` runs inline. A panic inside `f`
    /// is caught and re-raised (via [`panic::resume_unwind`]) on the
    /// caller's thread, the way the original rethrows a captured
    /// `std::exception_ptr`.
    pub fn call<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.in_loop() {
            return f();
        }

        let (tx, rx) = mpsc::sync_channel::<thread::Result<R>>(1);
        let job: Job = Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(f));
            let _ = tx.send(result);
        });
        self.post(job).expect("event loop worker has exited");

        match rx.recv().expect("event loop worker dropped the call without responding") {
            Ok(v) => v,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Block until a posted no-op has run on the worker — used by tests
    /// and shutdown to establish a happens-before with prior `dispatch`es.
    pub fn sync(&self) {
        self.call(|| {});
    }

    /// True if the calling thread is this loop's worker thread.
    pub fn in_loop(&self) -> bool {
        thread::current().id() == self.0.worker_thread
    }

    /// Panics if the calling thread is not this loop's worker thread.
    pub fn assert_in_loop(&self) {
        assert!(self.in_loop(), "operation requires the event loop thread");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let _ = self.tx.send(Msg::Stop);
        if let Some(handle) = self.handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}
