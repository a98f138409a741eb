//! Console output for the browser supervisor.
//!
//! Two sinks live here:
//!
//! - [`CallbackConsole`] receives lines written to `internal:console` and
//!   hands them to a JavaScript callback, buffering until one is set.
//! - [`ConsoleLogger`] is the `log` backend, writing kernel diagnostics to
//!   the browser's developer console.

use std::cell::RefCell;

use wasm_bindgen::JsValue;
use wos_kernel::ConsoleSink;

// =============================================================================
// internal:console sink
// =============================================================================

/// Console sink that forwards lines to a JavaScript callback.
#[derive(Default)]
pub struct CallbackConsole {
    callback: RefCell<Option<js_sys::Function>>,
    /// Lines written before a callback was installed
    buffer: RefCell<Vec<String>>,
}

impl CallbackConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the callback and flush buffered lines through it.
    pub fn set_callback(&self, callback: js_sys::Function) {
        let pending: Vec<String> = self.buffer.borrow_mut().drain(..).collect();
        for line in &pending {
            emit(&callback, line);
        }
        *self.callback.borrow_mut() = Some(callback);
    }

    /// Lines still waiting for a callback.
    pub fn buffered(&self) -> usize {
        self.buffer.borrow().len()
    }
}

impl ConsoleSink for CallbackConsole {
    fn write_line(&self, line: &str) {
        match self.callback.borrow().as_ref() {
            Some(callback) => emit(callback, line),
            None => self.buffer.borrow_mut().push(String::from(line)),
        }
    }
}

fn emit(callback: &js_sys::Function, line: &str) {
    if let Err(e) = callback.call1(&JsValue::null(), &JsValue::from_str(line)) {
        web_sys::console::error_2(&JsValue::from_str("[supervisor] Console callback failed:"), &e);
    }
}

// =============================================================================
// log backend
// =============================================================================

/// `log` backend writing to the browser console.
pub struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl ConsoleLogger {
    /// Install the logger. Later calls only adjust the level.
    pub fn init(level: log::LevelFilter) {
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(level);
    }
}

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = JsValue::from_str(&record.args().to_string());
        match record.level() {
            log::Level::Error => web_sys::console::error_1(&line),
            log::Level::Warn => web_sys::console::warn_1(&line),
            log::Level::Info => web_sys::console::info_1(&line),
            log::Level::Debug | log::Level::Trace => web_sys::console::debug_1(&line),
        }
    }

    fn flush(&self) {}
}
