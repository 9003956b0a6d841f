//! Test doubles shared by the unit tests.

use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::context::AffinityContext;
use crate::errors::BridgeError;
use crate::pattern::{InvokeProvider, ToggleProvider, ToggleState, ValueProvider, ValueStore};
use crate::peer::AutomationPeer;

/// Peer with nothing but a context.
pub struct PlainPeer {
    context: AffinityContext,
}

impl PlainPeer {
    pub fn new(context: AffinityContext) -> Self {
        Self { context }
    }
}

impl AutomationPeer for PlainPeer {
    fn context(&self) -> &AffinityContext {
        &self.context
    }
}

/// Value provider that rejects the empty string and records which thread
/// each call ran on.
pub struct StrictValue {
    store: ValueStore,
    calls: Mutex<Vec<(&'static str, ThreadId)>>,
}

impl StrictValue {
    pub fn new() -> Self {
        Self {
            store: ValueStore::new("initial"),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn empty_value_fault() -> BridgeError {
        BridgeError::OperationFault("value must not be empty".to_owned())
    }

    pub fn calls(&self) -> Vec<(&'static str, ThreadId)> {
        self.calls.lock().clone()
    }

    fn record(&self, op: &'static str) {
        self.calls.lock().push((op, thread::current().id()));
    }
}

impl ValueProvider for StrictValue {
    fn set_value(&self, value: &str) -> Result<(), BridgeError> {
        self.record("set_value");
        if value.is_empty() {
            return Err(Self::empty_value_fault());
        }
        self.store.set_value(value)
    }

    fn value(&self) -> Result<String, BridgeError> {
        self.record("value");
        self.store.value()
    }

    fn is_read_only(&self) -> Result<bool, BridgeError> {
        self.record("is_read_only");
        self.store.is_read_only()
    }
}

/// Two-state toggle.
#[derive(Default)]
pub struct CheckBox {
    state: Mutex<(bool, Option<ThreadId>)>,
}

impl CheckBox {
    pub fn last_thread(&self) -> Option<ThreadId> {
        self.state.lock().1
    }
}

impl ToggleProvider for CheckBox {
    fn toggle(&self) -> Result<(), BridgeError> {
        let mut state = self.state.lock();
        state.0 = !state.0;
        state.1 = Some(thread::current().id());
        Ok(())
    }

    fn toggle_state(&self) -> Result<ToggleState, BridgeError> {
        let state = self.state.lock();
        Ok(if state.0 { ToggleState::On } else { ToggleState::Off })
    }
}

/// Records the thread of every press.
#[derive(Default)]
pub struct PressCounter {
    presses: Mutex<Vec<ThreadId>>,
}

impl PressCounter {
    pub fn presses(&self) -> Vec<ThreadId> {
        self.presses.lock().clone()
    }
}

impl InvokeProvider for PressCounter {
    fn invoke(&self) -> Result<(), BridgeError> {
        self.presses.lock().push(thread::current().id());
        Ok(())
    }
}
