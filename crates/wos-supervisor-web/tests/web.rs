//! Browser tests for the Web Worker supervisor.
//!
//! Run with `wasm-pack test --headless --chrome crates/wos-supervisor-web`.

#![cfg(target_arch = "wasm32")]

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen_test::*;
use wos_hal::{HostEvent, Sandbox};
use wos_ipc::{Message, MessageType, Pid};
use wos_kernel::ConsoleSink;
use wos_supervisor_web::{CallbackConsole, Supervisor, WorkerSandbox};

wasm_bindgen_test_configure!(run_in_browser);

const BARE: &str = r#"{"mounts": [], "assigns": []}"#;

#[wasm_bindgen_test]
fn script_url_routes_through_loader() {
    let sandbox = WorkerSandbox::new("/loader.js");
    assert_eq!(sandbox.script_url("/apps/shell.js"), "/apps/shell.js");
    assert_eq!(sandbox.script_url("https://host/app.js"), "https://host/app.js");
    assert_eq!(
        sandbox.script_url("internal:webdav"),
        "/loader.js?path=internal%3Awebdav"
    );

    let sandbox = WorkerSandbox::new("/loader.js?v=2");
    assert_eq!(sandbox.script_url("a:b"), "/loader.js?v=2&path=a%3Ab");
}

#[wasm_bindgen_test]
fn random_bytes_uses_crypto() {
    let sandbox = WorkerSandbox::new("/loader.js");
    let mut buf = [0u8; 32];
    sandbox.random_bytes(&mut buf).unwrap();
    assert!(buf.iter().any(|b| *b != 0));
}

#[wasm_bindgen_test]
fn create_queues_created_event() {
    let sandbox = WorkerSandbox::new("/loader.js");
    let pid = Pid::from("abc1234");
    let handle = sandbox.create(&pid, "data:text/javascript,").unwrap();

    assert_eq!(sandbox.worker_count(), 1);
    assert_eq!(sandbox.pid_of(&handle), Some(pid));
    let events = sandbox.drain_events();
    assert_eq!(events, vec![(handle, HostEvent::Created)]);

    sandbox
        .post_message(&handle, &Message::new(MessageType::Data).with_payload("hi"))
        .unwrap();
    sandbox.terminate(&handle).unwrap();
    assert_eq!(sandbox.worker_count(), 0);
    assert!(sandbox
        .post_message(&handle, &Message::new(MessageType::Data))
        .is_err());
}

#[wasm_bindgen_test]
fn console_buffers_until_callback() {
    let console = CallbackConsole::new();
    console.write_line("early");
    assert_eq!(console.buffered(), 1);

    let seen = Rc::new(RefCell::new(Vec::<String>::new()));
    let sink = seen.clone();
    let callback = Closure::wrap(Box::new(move |line: JsValue| {
        sink.borrow_mut().push(line.as_string().unwrap_or_default());
    }) as Box<dyn FnMut(JsValue)>);
    console.set_callback(callback.as_ref().unchecked_ref::<js_sys::Function>().clone());
    console.write_line("late");

    assert_eq!(console.buffered(), 0);
    assert_eq!(*seen.borrow(), vec!["early".to_string(), "late".to_string()]);
}

#[wasm_bindgen_test]
fn supervisor_boots_and_manages_assigns() {
    let mut sup = Supervisor::new(Some(BARE.to_string())).unwrap();
    assert!(sup.assign("con:", "internal:console"));
    assert!(!sup.assign("nocolon", "internal:console"));
    assert_eq!(sup.resolve("con:debug").unwrap(), "internal:console/debug");
    assert!(sup.unassign("con:"));
    assert_eq!(sup.resolve("con:debug").unwrap(), "con:debug");
}

#[wasm_bindgen_test]
fn supervisor_spawn_and_terminate() {
    let mut sup = Supervisor::new(Some(BARE.to_string())).unwrap();
    let pid = sup
        .spawn("data:text/javascript,", JsValue::UNDEFINED)
        .unwrap()
        .expect("pid");
    assert_eq!(pid.len(), 7);
    assert!(sup.has_pending());

    assert_eq!(sup.poll().unwrap(), 1);
    let listing = js_sys::JSON::stringify(&sup.ps().unwrap()).unwrap();
    assert!(String::from(listing).contains("RUNNING"));

    sup.terminate(&pid).unwrap();
    assert!(sup.terminate(&pid).is_err());
}

#[wasm_bindgen_test]
fn supervisor_spawn_with_bad_argv_is_null() {
    let mut sup = Supervisor::new(Some(BARE.to_string())).unwrap();
    assert_eq!(sup.spawn("x", JsValue::from(5)).unwrap(), None);
    assert_eq!(sup.spawn("x", JsValue::from_str("argv")).unwrap(), None);
    assert!(!sup.has_pending());

    let argv = js_sys::Array::of1(&JsValue::from_str("--login"));
    assert!(sup.spawn("data:text/javascript,", argv.into()).unwrap().is_some());
}

#[wasm_bindgen_test]
fn supervisor_rejects_bad_config() {
    assert!(Supervisor::new(Some("not json".to_string())).is_err());
    assert!(Supervisor::new(Some(r#"{"assigns": [{"source": "x", "dest": "y"}]}"#.to_string())).is_err());
}
