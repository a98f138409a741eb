//! Web Worker sandbox
//!
//! Implements `wos_hal::Sandbox` with one dedicated Web Worker per process.
//!
//! Worker callbacks never call into the kernel. They decode what the worker
//! posted into a [`HostEvent`] and push it onto a shared queue that the
//! supervisor drains from `poll()`.
//!
//! ```text
//! worker.postMessage ──▶ onmessage ──▶ HostEvent ──▶ queue ──▶ Supervisor::poll
//!                        onerror   ──▶ Fault     ──┘
//! ```

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{MessageEvent, Worker};
use wos_hal::{HostEvent, Sandbox, SandboxError};
use wos_ipc::{Message, Pid};

/// Handle to one worker
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorkerHandle(pub u32);

/// Events reported by workers, oldest first
pub type EventQueue = Rc<RefCell<VecDeque<(WorkerHandle, HostEvent)>>>;

/// A running worker and the callbacks attached to it
struct WorkerProcess {
    pid: Pid,
    worker: Worker,
    /// Closures must outlive the worker's use of them
    _onmessage: Closure<dyn FnMut(MessageEvent)>,
    _onerror: Closure<dyn FnMut(JsValue)>,
}

/// Sandbox running each process in a Web Worker
pub struct WorkerSandbox {
    /// Bootstrap script for paths that are not URLs
    loader_url: String,
    next_id: Cell<u32>,
    workers: RefCell<HashMap<u32, WorkerProcess>>,
    events: EventQueue,
}

impl WorkerSandbox {
    pub fn new(loader_url: &str) -> Self {
        Self {
            loader_url: String::from(loader_url),
            next_id: Cell::new(1),
            workers: RefCell::new(HashMap::new()),
            events: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    /// Take every queued event.
    pub fn drain_events(&self) -> Vec<(WorkerHandle, HostEvent)> {
        self.events.borrow_mut().drain(..).collect()
    }

    pub fn pending_events(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.borrow().len()
    }

    /// Pid a live worker was created for
    pub fn pid_of(&self, handle: &WorkerHandle) -> Option<Pid> {
        self.workers.borrow().get(&handle.0).map(|w| w.pid.clone())
    }

    /// Script URL a worker for `path` is started from.
    ///
    /// URLs and absolute paths load directly; anything else goes through the
    /// loader with the path as a query parameter.
    pub fn script_url(&self, path: &str) -> String {
        let direct = ["http://", "https://", "blob:", "data:", "/"];
        if direct.iter().any(|prefix| path.starts_with(prefix)) {
            return String::from(path);
        }
        let encoded: String = js_sys::encode_uri_component(path).into();
        let sep = if self.loader_url.contains('?') { '&' } else { '?' };
        format!("{}{}path={}", self.loader_url, sep, encoded)
    }

    fn push_event(events: &EventQueue, handle: WorkerHandle, event: HostEvent) {
        events.borrow_mut().push_back((handle, event));
    }
}

/// Decode whatever a worker posted.
///
/// Strings are lifecycle signals; anything else is an envelope object,
/// round-tripped through JSON.
fn decode_event(data: &JsValue) -> Option<HostEvent> {
    if let Some(raw) = data.as_string() {
        return HostEvent::from_signal(&raw);
    }
    let json: String = js_sys::JSON::stringify(data).ok()?.into();
    HostEvent::from_json(&json)
}

impl Sandbox for WorkerSandbox {
    type Handle = WorkerHandle;

    fn create(&self, pid: &Pid, path: &str) -> Result<WorkerHandle, SandboxError> {
        let url = self.script_url(path);
        let worker = Worker::new(&url).map_err(|e| {
            log::error!("[wasm-hal] Failed to create worker for {}: {:?}", path, e);
            SandboxError::CreateFailed(String::from(path))
        })?;

        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let handle = WorkerHandle(id);

        let events = self.events.clone();
        let onmessage = Closure::wrap(Box::new(move |event: MessageEvent| {
            match decode_event(&event.data()) {
                Some(host_event) => WorkerSandbox::push_event(&events, handle, host_event),
                None => log::debug!("[wasm-hal] Ignoring undecodable message from worker {}", id),
            }
        }) as Box<dyn FnMut(MessageEvent)>);
        worker.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));

        let events = self.events.clone();
        let onerror = Closure::wrap(Box::new(move |event: JsValue| {
            let message = js_sys::Reflect::get(&event, &JsValue::from_str("message"))
                .ok()
                .and_then(|m| m.as_string())
                .unwrap_or_else(|| String::from("unknown error"));
            WorkerSandbox::push_event(&events, handle, HostEvent::Fault(message));
        }) as Box<dyn FnMut(JsValue)>);
        worker.set_onerror(Some(onerror.as_ref().unchecked_ref()));

        // Messages posted before the script loads are queued by the browser,
        // so the context counts as created once the worker object exists.
        Self::push_event(&self.events, handle, HostEvent::Created);

        log::info!("[wasm-hal] Worker {} started for {} ({})", id, pid, url);
        self.workers.borrow_mut().insert(
            id,
            WorkerProcess {
                pid: pid.clone(),
                worker,
                _onmessage: onmessage,
                _onerror: onerror,
            },
        );
        Ok(handle)
    }

    fn post_message(&self, handle: &WorkerHandle, msg: &Message) -> Result<(), SandboxError> {
        let workers = self.workers.borrow();
        let process = workers.get(&handle.0).ok_or(SandboxError::ContextNotFound)?;

        let json = serde_json::to_string(msg)
            .map_err(|e| SandboxError::DeliveryFailed(e.to_string()))?;
        let value = js_sys::JSON::parse(&json)
            .map_err(|e| SandboxError::DeliveryFailed(format!("{:?}", e)))?;
        process
            .worker
            .post_message(&value)
            .map_err(|e| SandboxError::DeliveryFailed(format!("{:?}", e)))
    }

    fn terminate(&self, handle: &WorkerHandle) -> Result<(), SandboxError> {
        let process = self
            .workers
            .borrow_mut()
            .remove(&handle.0)
            .ok_or(SandboxError::ContextNotFound)?;

        process.worker.set_onmessage(None);
        process.worker.set_onerror(None);
        process.worker.terminate();
        log::info!("[wasm-hal] Worker {} for {} terminated", handle.0, process.pid);
        Ok(())
    }

    fn random_bytes(&self, buf: &mut [u8]) -> Result<(), SandboxError> {
        let window = web_sys::window().ok_or(SandboxError::EntropyUnavailable)?;
        let crypto = window.crypto().map_err(|_| SandboxError::EntropyUnavailable)?;
        crypto
            .get_random_values_with_u8_array(buf)
            .map_err(|_| SandboxError::EntropyUnavailable)?;
        Ok(())
    }
}
