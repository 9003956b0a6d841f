//! Capability interfaces and their cross-thread wrappers.
//!
//! A capability interface (`ValueProvider`, `ToggleProvider`,
//! `InvokeProvider`) is the only surface an external caller sees.  The
//! implementation behind it belongs to a peer and must only be touched on
//! that peer's owning thread, so it is handed out wrapped: each wrapper
//! method packages its call as a callback and routes it through
//! [`invoke`](crate::invoke::invoke).
//!
//! Wrappers have private constructors.  They are created only through their
//! `wrap` functions, which return the capability trait object.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::errors::BridgeError;
use crate::invoke::{invoke, Marshalled};
use crate::peer::AutomationPeer;

// ---------------------------------------------------------------------------
// Capability interfaces
// ---------------------------------------------------------------------------

/// Text value of an element.
pub trait ValueProvider: Send + Sync {
    fn set_value(&self, value: &str) -> Result<(), BridgeError>;
    fn value(&self) -> Result<String, BridgeError>;
    fn is_read_only(&self) -> Result<bool, BridgeError>;
}

/// Two- or three-state toggle (check boxes, toggle buttons).
pub trait ToggleProvider: Send + Sync {
    fn toggle(&self) -> Result<(), BridgeError>;
    fn toggle_state(&self) -> Result<ToggleState, BridgeError>;
}

/// Single unambiguous action (buttons, menu items).
pub trait InvokeProvider: Send + Sync {
    fn invoke(&self) -> Result<(), BridgeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleState {
    Off,
    On,
    Indeterminate,
}

impl ToggleState {
    pub fn name(self) -> &'static str {
        match self {
            ToggleState::Off => "off",
            ToggleState::On => "on",
            ToggleState::Indeterminate => "indeterminate",
        }
    }
}

// ---------------------------------------------------------------------------
// Pattern identifiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PatternId {
    Value,
    Toggle,
    Invoke,
}

impl PatternId {
    /// Every pattern, in the order `supported_patterns` reports them.
    pub const ALL: [PatternId; 3] = [PatternId::Invoke, PatternId::Toggle, PatternId::Value];

    pub fn name(self) -> &'static str {
        match self {
            PatternId::Value => "ValuePattern",
            PatternId::Toggle => "TogglePattern",
            PatternId::Invoke => "InvokePattern",
        }
    }
}

/// A capability implementation, tagged with the pattern it provides.
#[derive(Clone)]
pub enum PatternProvider {
    Value(Arc<dyn ValueProvider>),
    Toggle(Arc<dyn ToggleProvider>),
    Invoke(Arc<dyn InvokeProvider>),
}

impl fmt::Debug for PatternProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PatternProvider").field(&self.id()).finish()
    }
}

impl PatternProvider {
    pub fn id(&self) -> PatternId {
        match self {
            PatternProvider::Value(_) => PatternId::Value,
            PatternProvider::Toggle(_) => PatternId::Toggle,
            PatternProvider::Invoke(_) => PatternId::Invoke,
        }
    }

    pub fn as_value(&self) -> Option<&Arc<dyn ValueProvider>> {
        match self {
            PatternProvider::Value(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_toggle(&self) -> Option<&Arc<dyn ToggleProvider>> {
        match self {
            PatternProvider::Toggle(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_invoke(&self) -> Option<&Arc<dyn InvokeProvider>> {
        match self {
            PatternProvider::Invoke(p) => Some(p),
            _ => None,
        }
    }
}

/// Wrap `provider` so every call on it is marshalled onto `peer`'s context.
pub fn wrap_pattern(peer: Arc<dyn AutomationPeer>, provider: PatternProvider) -> PatternProvider {
    match provider {
        PatternProvider::Value(iface) => {
            PatternProvider::Value(ValueProviderWrapper::wrap(peer, iface))
        }
        PatternProvider::Toggle(iface) => {
            PatternProvider::Toggle(ToggleProviderWrapper::wrap(peer, iface))
        }
        PatternProvider::Invoke(iface) => {
            PatternProvider::Invoke(InvokeProviderWrapper::wrap(peer, iface))
        }
    }
}

// ---------------------------------------------------------------------------
// ValueProviderWrapper
// ---------------------------------------------------------------------------

/// Cross-thread [`ValueProvider`]: delegates to `iface` on `peer`'s context.
pub struct ValueProviderWrapper {
    peer: Arc<dyn AutomationPeer>,
    iface: Arc<dyn ValueProvider>,
}

impl ValueProviderWrapper {
    fn new(peer: Arc<dyn AutomationPeer>, iface: Arc<dyn ValueProvider>) -> Self {
        Self { peer, iface }
    }

    pub fn wrap(
        peer: Arc<dyn AutomationPeer>,
        iface: Arc<dyn ValueProvider>,
    ) -> Arc<dyn ValueProvider> {
        Arc::new(Self::new(peer, iface))
    }

    // Owning-thread halves, one per entry point.

    fn set_value_internal(
        iface: &dyn ValueProvider,
        arg: Marshalled,
    ) -> Result<Marshalled, BridgeError> {
        iface.set_value(&arg.into_text()?)?;
        Ok(Marshalled::Unit)
    }

    fn get_value(
        iface: &dyn ValueProvider,
        _unused: Marshalled,
    ) -> Result<Marshalled, BridgeError> {
        Ok(Marshalled::Text(iface.value()?))
    }

    fn get_is_read_only(
        iface: &dyn ValueProvider,
        _unused: Marshalled,
    ) -> Result<Marshalled, BridgeError> {
        Ok(Marshalled::Flag(iface.is_read_only()?))
    }
}

impl ValueProvider for ValueProviderWrapper {
    fn set_value(&self, value: &str) -> Result<(), BridgeError> {
        let iface = Arc::clone(&self.iface);
        invoke(
            &*self.peer,
            move |arg| Self::set_value_internal(&*iface, arg),
            Marshalled::Text(value.to_owned()),
        )?
        .into_unit()
    }

    fn value(&self) -> Result<String, BridgeError> {
        let iface = Arc::clone(&self.iface);
        invoke(&*self.peer, move |arg| Self::get_value(&*iface, arg), Marshalled::Unit)?.into_text()
    }

    fn is_read_only(&self) -> Result<bool, BridgeError> {
        let iface = Arc::clone(&self.iface);
        invoke(
            &*self.peer,
            move |arg| Self::get_is_read_only(&*iface, arg),
            Marshalled::Unit,
        )?
        .into_flag()
    }
}

// ---------------------------------------------------------------------------
// ToggleProviderWrapper
// ---------------------------------------------------------------------------

/// Cross-thread [`ToggleProvider`].
pub struct ToggleProviderWrapper {
    peer: Arc<dyn AutomationPeer>,
    iface: Arc<dyn ToggleProvider>,
}

impl ToggleProviderWrapper {
    fn new(peer: Arc<dyn AutomationPeer>, iface: Arc<dyn ToggleProvider>) -> Self {
        Self { peer, iface }
    }

    pub fn wrap(
        peer: Arc<dyn AutomationPeer>,
        iface: Arc<dyn ToggleProvider>,
    ) -> Arc<dyn ToggleProvider> {
        Arc::new(Self::new(peer, iface))
    }
}

impl ToggleProvider for ToggleProviderWrapper {
    fn toggle(&self) -> Result<(), BridgeError> {
        let iface = Arc::clone(&self.iface);
        invoke(
            &*self.peer,
            move |_| {
                iface.toggle()?;
                Ok(Marshalled::Unit)
            },
            Marshalled::Unit,
        )?
        .into_unit()
    }

    fn toggle_state(&self) -> Result<ToggleState, BridgeError> {
        let iface = Arc::clone(&self.iface);
        invoke(
            &*self.peer,
            move |_| Ok(Marshalled::Toggle(iface.toggle_state()?)),
            Marshalled::Unit,
        )?
        .into_toggle_state()
    }
}

// ---------------------------------------------------------------------------
// InvokeProviderWrapper
// ---------------------------------------------------------------------------

/// Cross-thread [`InvokeProvider`].
pub struct InvokeProviderWrapper {
    peer: Arc<dyn AutomationPeer>,
    iface: Arc<dyn InvokeProvider>,
}

impl InvokeProviderWrapper {
    fn new(peer: Arc<dyn AutomationPeer>, iface: Arc<dyn InvokeProvider>) -> Self {
        Self { peer, iface }
    }

    pub fn wrap(
        peer: Arc<dyn AutomationPeer>,
        iface: Arc<dyn InvokeProvider>,
    ) -> Arc<dyn InvokeProvider> {
        Arc::new(Self::new(peer, iface))
    }
}

impl InvokeProvider for InvokeProviderWrapper {
    fn invoke(&self) -> Result<(), BridgeError> {
        let iface = Arc::clone(&self.iface);
        invoke(
            &*self.peer,
            move |_| {
                iface.invoke()?;
                Ok(Marshalled::Unit)
            },
            Marshalled::Unit,
        )?
        .into_unit()
    }
}

// ---------------------------------------------------------------------------
// ValueStore
// ---------------------------------------------------------------------------

/// Passthrough [`ValueProvider`]: stores whatever it is given.
///
/// A read-only store rejects every write with an operation fault.
#[derive(Debug, Default)]
pub struct ValueStore {
    value: RwLock<String>,
    read_only: bool,
}

impl ValueStore {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            value: RwLock::new(initial.into()),
            read_only: false,
        }
    }

    pub fn read_only(initial: impl Into<String>) -> Self {
        Self {
            value: RwLock::new(initial.into()),
            read_only: true,
        }
    }
}

impl ValueProvider for ValueStore {
    fn set_value(&self, value: &str) -> Result<(), BridgeError> {
        if self.read_only {
            return Err(BridgeError::OperationFault(
                "element is read-only; value cannot be set".to_owned(),
            ));
        }
        *self.value.write() = value.to_owned();
        Ok(())
    }

    fn value(&self) -> Result<String, BridgeError> {
        Ok(self.value.read().clone())
    }

    fn is_read_only(&self) -> Result<bool, BridgeError> {
        Ok(self.read_only)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextOptions, ContextThread, Dispatcher};
    use crate::testing::{CheckBox, PlainPeer, PressCounter, StrictValue};
    use std::thread;

    fn ui_with_peer() -> (ContextThread, Arc<dyn AutomationPeer>) {
        let ui = ContextThread::spawn(ContextOptions::default()).unwrap();
        let peer: Arc<dyn AutomationPeer> = Arc::new(PlainPeer::new(ui.context().clone()));
        (ui, peer)
    }

    #[test]
    fn test_round_trip_through_wrapper_from_foreign_thread() {
        let (_ui, peer) = ui_with_peer();
        let wrapped = ValueProviderWrapper::wrap(peer, Arc::new(ValueStore::new("")));

        wrapped.set_value("x").unwrap();
        assert_eq!(wrapped.value().unwrap(), "x");
        assert!(!wrapped.is_read_only().unwrap());
    }

    #[test]
    fn test_same_thread_wrapper_matches_direct_call() {
        let dispatcher = Dispatcher::attach("owner");
        let peer: Arc<dyn AutomationPeer> = Arc::new(PlainPeer::new(dispatcher.context()));
        let store = Arc::new(ValueStore::new("direct"));
        let wrapped = ValueProviderWrapper::wrap(peer, store.clone());

        assert_eq!(wrapped.value().unwrap(), store.value().unwrap());
        assert_eq!(wrapped.is_read_only().unwrap(), store.is_read_only().unwrap());
        // Nothing was queued: the owning thread never pumped.
        assert_eq!(dispatcher.pump_pending(), 0);
    }

    #[test]
    fn test_underlying_calls_run_on_owning_thread() {
        let (ui, peer) = ui_with_peer();
        let strict = Arc::new(StrictValue::new());
        let wrapped = ValueProviderWrapper::wrap(peer, strict.clone());

        wrapped.set_value("a").unwrap();
        wrapped.value().unwrap();
        wrapped.is_read_only().unwrap();

        let owner = ui.context().owner();
        let calls = strict.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|(_, thread)| *thread == owner));
    }

    #[test]
    fn test_set_value_fault_reaches_foreign_caller() {
        let (_ui, peer) = ui_with_peer();
        let wrapped = ValueProviderWrapper::wrap(peer, Arc::new(StrictValue::new()));

        let err = thread::spawn(move || wrapped.set_value(""))
            .join()
            .unwrap()
            .unwrap_err();
        assert_eq!(err, StrictValue::empty_value_fault());
    }

    #[test]
    fn test_set_value_fault_reaches_owning_thread_caller() {
        let dispatcher = Dispatcher::attach("owner");
        let peer: Arc<dyn AutomationPeer> = Arc::new(PlainPeer::new(dispatcher.context()));
        let wrapped = ValueProviderWrapper::wrap(peer, Arc::new(StrictValue::new()));

        assert_eq!(wrapped.set_value("").unwrap_err(), StrictValue::empty_value_fault());
    }

    #[test]
    fn test_read_only_store_rejects_writes() {
        let (_ui, peer) = ui_with_peer();
        let wrapped = ValueProviderWrapper::wrap(peer, Arc::new(ValueStore::read_only("locked")));

        assert!(wrapped.is_read_only().unwrap());
        let err = wrapped.set_value("changed").unwrap_err();
        assert!(matches!(err, BridgeError::OperationFault(_)));
        assert_eq!(wrapped.value().unwrap(), "locked");
    }

    #[test]
    fn test_wrapper_after_teardown_is_context_unavailable() {
        let (ui, peer) = ui_with_peer();
        let wrapped = ValueProviderWrapper::wrap(peer, Arc::new(ValueStore::new("v")));
        ui.shutdown().unwrap();

        assert!(matches!(wrapped.value(), Err(BridgeError::ContextUnavailable(_))));
        assert!(matches!(wrapped.set_value("w"), Err(BridgeError::ContextUnavailable(_))));
    }

    #[test]
    fn test_toggle_wrapper_marshals_state() {
        let (ui, peer) = ui_with_peer();
        let check_box = Arc::new(CheckBox::default());
        let wrapped = ToggleProviderWrapper::wrap(peer, check_box.clone());

        assert_eq!(wrapped.toggle_state().unwrap(), ToggleState::Off);
        wrapped.toggle().unwrap();
        assert_eq!(wrapped.toggle_state().unwrap(), ToggleState::On);
        assert_eq!(check_box.last_thread(), Some(ui.context().owner()));
    }

    #[test]
    fn test_invoke_wrapper_runs_on_owning_thread() {
        let (ui, peer) = ui_with_peer();
        let button = Arc::new(PressCounter::default());
        let wrapped = InvokeProviderWrapper::wrap(peer, button.clone());

        wrapped.invoke().unwrap();
        wrapped.invoke().unwrap();
        assert_eq!(button.presses(), vec![ui.context().owner(); 2]);
    }

    #[test]
    fn test_wrap_pattern_keeps_pattern_id() {
        let (_ui, peer) = ui_with_peer();
        let providers = [
            PatternProvider::Value(Arc::new(ValueStore::new(""))),
            PatternProvider::Toggle(Arc::new(CheckBox::default())),
            PatternProvider::Invoke(Arc::new(PressCounter::default())),
        ];

        for provider in providers {
            let id = provider.id();
            let wrapped = wrap_pattern(peer.clone(), provider);
            assert_eq!(wrapped.id(), id);
        }
    }

    #[test]
    fn test_pattern_names_and_toggle_state_serialization() {
        assert_eq!(PatternId::Value.name(), "ValuePattern");
        assert_eq!(ToggleState::Indeterminate.name(), "indeterminate");
        let json = serde_json::to_string(&ToggleState::On).unwrap();
        assert_eq!(json, "\"on\"");
    }
}
