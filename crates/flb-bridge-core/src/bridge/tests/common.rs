#![cfg(test)]

use std::collections::VecDeque;
use std::ffi::{CStr, CString, c_char, c_void};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rmpv::Value;

use crate::bridge::adapter::Bridge;
use crate::ffi::{FlbApi, FlbGoOutputPlugin, FlbOutputInstance, FlbPluginProxyContext};
use crate::plugin_system::config::{MapConfig, PluginConfig};
use crate::plugin_system::error::{PluginError, PluginResult};
use crate::plugin_system::info::PluginInfo;
use crate::plugin_system::records::{EventTime, FlushBuffer, Record, encode_records};
use crate::plugin_system::traits::OutputPlugin;

/// What the next `plugin_flush` call answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Ok,
    Retry,
    Error,
    Panic,
}

/// Shared view of everything the test double did.
#[derive(Debug, Default)]
pub struct Tracker {
    pub inits: AtomicUsize,
    pub flushes: AtomicUsize,
    pub records: AtomicUsize,
    pub exits: AtomicUsize,
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
    pub drops: AtomicUsize,
    pub seen: Mutex<Vec<(String, Vec<u8>)>>,
    script: Mutex<VecDeque<Step>>,
}

impl Tracker {
    pub fn script(&self, steps: &[Step]) {
        self.script.lock().unwrap().extend(steps.iter().copied());
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        self.script.lock().unwrap().pop_front().unwrap_or(Step::Ok)
    }
}

/// Output plugin that records its lifecycle in a [`Tracker`].
///
/// Init acquires a "resource" before validating `destination`, so a failed
/// init leaves something for exit to release.
pub struct Tracked {
    tracker: Arc<Tracker>,
    holding: bool,
}

impl Tracked {
    pub fn new(tracker: Arc<Tracker>) -> Self {
        Self { tracker, holding: false }
    }
}

impl OutputPlugin for Tracked {
    fn plugin_register() -> PluginInfo {
        PluginInfo::new("rs_tracked", "Lifecycle test double")
    }

    fn plugin_init(&mut self, config: &PluginConfig<'_>) -> PluginResult {
        self.tracker.inits.fetch_add(1, Ordering::SeqCst);
        self.tracker.acquired.fetch_add(1, Ordering::SeqCst);
        self.holding = true;

        if config.get("panic_init").is_some() {
            panic!("init panic requested");
        }
        config.require("destination")?;
        Ok(())
    }

    fn plugin_flush(&self, buffer: &FlushBuffer<'_>) -> PluginResult {
        self.tracker.flushes.fetch_add(1, Ordering::SeqCst);
        self.tracker
            .seen
            .lock()
            .unwrap()
            .push((buffer.tag().to_string(), buffer.data().to_vec()));

        match self.tracker.next_step() {
            Step::Ok => {
                let mut n = 0;
                for record in buffer.records() {
                    record?;
                    n += 1;
                }
                self.tracker.records.fetch_add(n, Ordering::SeqCst);
                Ok(())
            }
            Step::Retry => Err(PluginError::retry("backend unavailable")),
            Step::Error => Err(PluginError::error("backend rejected batch")),
            Step::Panic => panic!("flush panic requested"),
        }
    }

    fn plugin_exit(&mut self) -> PluginResult {
        self.tracker.exits.fetch_add(1, Ordering::SeqCst);
        if self.holding {
            self.holding = false;
            self.tracker.released.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.tracker.drops.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn tracked_bridge() -> (Bridge<Tracked, impl Fn() -> Tracked + Send + Sync>, Arc<Tracker>) {
    let tracker = Arc::new(Tracker::default());
    let shared = tracker.clone();
    (Bridge::new(move || Tracked::new(shared.clone())), tracker)
}

pub fn valid_config() -> MapConfig {
    MapConfig::new().with("destination", "memory")
}

/// `n` records encoded the way the host flushes them.
pub fn sample_batch(n: usize) -> Vec<u8> {
    let records: Vec<Record> = (0..n)
        .map(|i| {
            Record::new(
                EventTime::new(1_700_000_000 + i as i64, 0),
                Value::Map(vec![(Value::from("seq"), Value::from(i as u64))]),
            )
        })
        .collect();
    encode_records(&records).unwrap()
}

/// Stand-in for `struct flb_output_instance`: the properties the fake
/// `output_get_property` answers from.
pub struct FakeInstance {
    values: Vec<(String, CString)>,
}

unsafe extern "C" fn fake_get_property(key: *mut c_char, o_ins: *mut c_void) -> *mut c_char {
    let instance = unsafe { &*(o_ins as *const FakeInstance) };
    let key = unsafe { CStr::from_ptr(key) }.to_str().unwrap_or("");
    instance
        .values
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_ptr() as *mut c_char)
        .unwrap_or(ptr::null_mut())
}

/// The memory a host sets up around one `FLBPluginInit` call.
pub struct FakeHost {
    _api: Box<FlbApi>,
    _instance: Box<FakeInstance>,
    context: Box<FlbPluginProxyContext>,
    plugin: Box<FlbGoOutputPlugin>,
}

impl FakeHost {
    pub fn new(properties: &[(&str, &str)]) -> Self {
        Self::build(properties, Some(fake_get_property as crate::ffi::OutputGetPropertyFn))
    }

    /// A host whose API table has no property getter.
    pub fn without_getter() -> Self {
        Self::build(&[], None)
    }

    fn build(properties: &[(&str, &str)], getter: Option<crate::ffi::OutputGetPropertyFn>) -> Self {
        let mut api = Box::new(FlbApi {
            output_get_property: getter,
        });
        let mut instance = Box::new(FakeInstance {
            values: properties
                .iter()
                .map(|(k, v)| (k.to_string(), CString::new(*v).unwrap()))
                .collect(),
        });
        let mut context = Box::new(FlbPluginProxyContext {
            remote_context: ptr::null_mut(),
        });
        let plugin = Box::new(FlbGoOutputPlugin {
            _reserved: ptr::null_mut(),
            api: &mut *api,
            o_ins: (&mut *instance as *mut FakeInstance).cast::<FlbOutputInstance>(),
            context: &mut *context,
        });
        Self {
            _api: api,
            _instance: instance,
            context,
            plugin,
        }
    }

    pub fn plugin_ptr(&mut self) -> *mut c_void {
        (&mut *self.plugin as *mut FlbGoOutputPlugin).cast()
    }

    /// Without a proxy context, as older hosts call init.
    pub fn detach_context(&mut self) {
        self.plugin.context = ptr::null_mut();
    }

    pub fn remote_context(&self) -> *mut c_void {
        self.context.remote_context
    }
}
