//! JavaScript-facing supervisor
//!
//! The page constructs one `Supervisor`, installs callbacks and then calls
//! `poll()` on a timer or animation frame:
//!
//! ```js
//! const sup = new Supervisor(JSON.stringify({ programs: { webdav: src } }));
//! sup.set_console_callback(line => term.write(line));
//! sup.spawn("/apps/shell.js", ["--login"]);
//! setInterval(() => sup.poll(), 16);
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wos_ipc::Pid;
use wos_kernel::{InternalVolume, Kernel, KernelError, ProcessStatus};

use crate::config::SupervisorConfig;
use crate::console::{CallbackConsole, ConsoleLogger};
use crate::sandbox::WorkerSandbox;

type CallbackSlot = Rc<RefCell<Option<js_sys::Function>>>;

/// The browser supervisor: a kernel running on Web Workers.
#[wasm_bindgen]
pub struct Supervisor {
    kernel: Kernel<WorkerSandbox>,
    console: Rc<CallbackConsole>,
    status_callback: CallbackSlot,
}

#[wasm_bindgen]
impl Supervisor {
    /// Boot the kernel from an optional JSON configuration.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<Supervisor, JsValue> {
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        let config = match config_json.as_deref() {
            Some(json) => SupervisorConfig::from_json(json).map_err(js_error)?,
            None => SupervisorConfig::default(),
        };
        ConsoleLogger::init(config.log_level());

        let console = Rc::new(CallbackConsole::new());
        let mut internal = InternalVolume::new().with_console(console.clone());
        for (name, source) in &config.programs {
            internal = internal.with_program(name, source.as_str());
        }

        let sandbox = WorkerSandbox::new(&config.loader_url);
        let mut kernel = Kernel::boot(sandbox, &config.kernel, internal).map_err(js_error)?;

        let status_callback: CallbackSlot = Rc::new(RefCell::new(None));
        let slot = status_callback.clone();
        kernel.on_status(move |pid: &Pid, status: ProcessStatus| {
            if let Some(callback) = slot.borrow().as_ref() {
                let status = serde_json::to_value(status)
                    .ok()
                    .and_then(|v| v.as_str().map(String::from))
                    .unwrap_or_default();
                let _ = callback.call2(
                    &JsValue::null(),
                    &JsValue::from_str(pid.as_str()),
                    &JsValue::from_str(&status),
                );
            }
        });

        log::info!("[supervisor] Booted with loader {}", config.loader_url);
        Ok(Supervisor {
            kernel,
            console,
            status_callback,
        })
    }

    /// Receive lines written to `internal:console`. Buffered lines are
    /// flushed immediately.
    pub fn set_console_callback(&self, callback: js_sys::Function) {
        let buffered = self.console.buffered();
        self.console.set_callback(callback);
        log::debug!("[supervisor] Console callback set, flushed {} buffered lines", buffered);
    }

    /// Receive `(pid, status)` on every process status transition.
    pub fn set_status_callback(&self, callback: js_sys::Function) {
        *self.status_callback.borrow_mut() = Some(callback);
    }

    /// Spawn a process. `argv` defaults to an empty array.
    ///
    /// Returns the pid, or `null` when `argv` is not an array. Sandbox
    /// failures throw.
    pub fn spawn(&mut self, path: &str, argv: JsValue) -> Result<Option<String>, JsValue> {
        let argv = if argv.is_undefined() || argv.is_null() {
            Value::Array(Vec::new())
        } else {
            match from_js(&argv) {
                Ok(argv) => argv,
                Err(_) => {
                    log::error!("[supervisor] Unserializable argv for {}", path);
                    return Ok(None);
                }
            }
        };
        match self.kernel.spawn(path, argv) {
            Ok(pid) => Ok(Some(pid.0)),
            Err(KernelError::InvalidArgv { .. }) => Ok(None),
            Err(e) => Err(js_error(e)),
        }
    }

    pub fn terminate(&mut self, pid: &str) -> Result<(), JsValue> {
        self.kernel.terminate(&Pid::from(pid)).map_err(js_error)
    }

    /// Process listing as an array of `{pid, path, argv, status}`.
    pub fn ps(&self) -> Result<JsValue, JsValue> {
        to_js(&self.kernel.ps())
    }

    pub fn assign(&mut self, source: &str, dest: &str) -> bool {
        self.kernel.assign(source, dest)
    }

    pub fn unassign(&mut self, source: &str) -> bool {
        self.kernel.unassign(source)
    }

    /// Assigns as an array of `[source, dest]` pairs.
    pub fn assigns(&self) -> Result<JsValue, JsValue> {
        to_js(&self.kernel.assigns())
    }

    /// Resolve a path through the assigns.
    pub fn resolve(&self, path: &str) -> Result<String, JsValue> {
        self.kernel
            .resolve(path)
            .map(|(resolved, _, _)| resolved)
            .map_err(js_error)
    }

    /// Drive the kernel: run deferred handler calls, then route every event
    /// the workers have reported. Returns the number of events handled.
    ///
    /// An error here is a kernel configuration fault; the page should stop
    /// polling.
    pub fn poll(&mut self) -> Result<u32, JsValue> {
        self.kernel.run_pending();

        let events = self.kernel.sandbox().drain_events();
        let count = events.len();
        for (handled, (handle, event)) in events.into_iter().enumerate() {
            if let Err(e) = self.kernel.handle_event(&handle, event) {
                log::error!(
                    "[supervisor] Fatal kernel error: {} ({} queued events dropped)",
                    e,
                    count - handled - 1
                );
                return Err(js_error(e));
            }
        }
        Ok(count as u32)
    }

    /// Whether `poll()` has work waiting.
    pub fn has_pending(&self) -> bool {
        self.kernel.pending_tasks() > 0 || self.kernel.sandbox().pending_events() > 0
    }
}

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    let json = serde_json::to_string(value).map_err(js_error)?;
    js_sys::JSON::parse(&json)
}

fn from_js(value: &JsValue) -> Result<Value, JsValue> {
    let json: String = js_sys::JSON::stringify(value)?.into();
    serde_json::from_str(&json).map_err(js_error)
}
