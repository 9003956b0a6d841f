//! The invocation bridge: marshal one operation onto a peer's context.
//!
//! Every call crosses the boundary with the same shape: a single-argument
//! callback plus its argument, both carried as [`Marshalled`] values.  The
//! result comes back as a [`Marshalled`] too, and the caller narrows it to
//! the type it expects.  Narrowing to the wrong shape is a caller-side
//! contract violation and fails with [`BridgeError::ResultTypeMismatch`].

use log::trace;

use crate::errors::BridgeError;
use crate::pattern::{PatternProvider, ToggleState};
use crate::peer::{AutomationPeer, ControlType, Rect};

// ---------------------------------------------------------------------------
// Marshalled values
// ---------------------------------------------------------------------------

/// A value moved across the thread boundary, tagged with its shape.
#[derive(Debug, Clone)]
pub enum Marshalled {
    Unit,
    Text(String),
    Flag(bool),
    Toggle(ToggleState),
    Control(ControlType),
    Bounds(Rect),
    Pattern(Option<PatternProvider>),
}

impl Marshalled {
    /// Shape tag used in mismatch reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Marshalled::Unit => "unit",
            Marshalled::Text(_) => "text",
            Marshalled::Flag(_) => "flag",
            Marshalled::Toggle(_) => "toggle_state",
            Marshalled::Control(_) => "control_type",
            Marshalled::Bounds(_) => "bounds",
            Marshalled::Pattern(_) => "pattern",
        }
    }

    fn mismatch(&self, expected: &'static str) -> BridgeError {
        BridgeError::ResultTypeMismatch {
            expected,
            actual: self.kind(),
        }
    }

    pub fn into_unit(self) -> Result<(), BridgeError> {
        match self {
            Marshalled::Unit => Ok(()),
            other => Err(other.mismatch("unit")),
        }
    }

    pub fn into_text(self) -> Result<String, BridgeError> {
        match self {
            Marshalled::Text(text) => Ok(text),
            other => Err(other.mismatch("text")),
        }
    }

    pub fn into_flag(self) -> Result<bool, BridgeError> {
        match self {
            Marshalled::Flag(flag) => Ok(flag),
            other => Err(other.mismatch("flag")),
        }
    }

    pub fn into_toggle_state(self) -> Result<ToggleState, BridgeError> {
        match self {
            Marshalled::Toggle(state) => Ok(state),
            other => Err(other.mismatch("toggle_state")),
        }
    }

    pub fn into_control_type(self) -> Result<ControlType, BridgeError> {
        match self {
            Marshalled::Control(control_type) => Ok(control_type),
            other => Err(other.mismatch("control_type")),
        }
    }

    pub fn into_rect(self) -> Result<Rect, BridgeError> {
        match self {
            Marshalled::Bounds(rect) => Ok(rect),
            other => Err(other.mismatch("bounds")),
        }
    }

    pub fn into_pattern(self) -> Result<Option<PatternProvider>, BridgeError> {
        match self {
            Marshalled::Pattern(provider) => Ok(provider),
            other => Err(other.mismatch("pattern")),
        }
    }
}

// ---------------------------------------------------------------------------
// Pending invocation
// ---------------------------------------------------------------------------

type Callback = Box<dyn FnOnce(Marshalled) -> Result<Marshalled, BridgeError> + Send + 'static>;

/// One call in flight: the operation and the argument it will be applied to.
///
/// Created per call and consumed by [`PendingInvocation::run`] on the owning
/// thread; the result or fault travels back to the caller through the context.
pub struct PendingInvocation {
    operation: Callback,
    argument: Marshalled,
}

impl PendingInvocation {
    pub fn new<F>(operation: F, argument: Marshalled) -> Self
    where
        F: FnOnce(Marshalled) -> Result<Marshalled, BridgeError> + Send + 'static,
    {
        Self {
            operation: Box::new(operation),
            argument,
        }
    }

    pub fn run(self) -> Result<Marshalled, BridgeError> {
        (self.operation)(self.argument)
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run `callback(argument)` on `peer`'s affinity context.
///
/// Same-thread callers run inline; everyone else blocks until the owning
/// thread has processed the call.  Faults raised by `callback` are returned
/// as-is: the bridge neither logs nor absorbs them.
pub fn invoke<P, F>(peer: &P, callback: F, argument: Marshalled) -> Result<Marshalled, BridgeError>
where
    P: AutomationPeer + ?Sized,
    F: FnOnce(Marshalled) -> Result<Marshalled, BridgeError> + Send + 'static,
{
    let context = peer.context();
    trace!(
        "invoke: {} argument onto context '{}'",
        argument.kind(),
        context.name()
    );
    context.run_on_context(PendingInvocation::run, PendingInvocation::new(callback, argument))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextOptions, ContextThread};
    use crate::testing::PlainPeer;
    use std::thread;

    #[test]
    fn test_narrowing_matching_shape() {
        assert_eq!(Marshalled::Text("abc".into()).into_text().unwrap(), "abc");
        assert!(Marshalled::Flag(true).into_flag().unwrap());
        assert_eq!(
            Marshalled::Bounds(Rect::new(1.0, 2.0, 3.0, 4.0)).into_rect().unwrap(),
            Rect::new(1.0, 2.0, 3.0, 4.0)
        );
        assert!(Marshalled::Pattern(None).into_pattern().unwrap().is_none());
        Marshalled::Unit.into_unit().unwrap();
    }

    #[test]
    fn test_narrowing_wrong_shape_is_mismatch() {
        let err = Marshalled::Flag(false).into_text().unwrap_err();
        assert_eq!(
            err,
            BridgeError::ResultTypeMismatch {
                expected: "text",
                actual: "flag",
            }
        );

        let err = Marshalled::Unit.into_control_type().unwrap_err();
        assert!(matches!(
            err,
            BridgeError::ResultTypeMismatch {
                expected: "control_type",
                actual: "unit"
            }
        ));
    }

    #[test]
    fn test_pending_invocation_applies_operation_to_argument() {
        let pending = PendingInvocation::new(
            |arg| Ok(Marshalled::Text(arg.into_text()?.to_uppercase())),
            Marshalled::Text("shout".into()),
        );
        assert_eq!(pending.run().unwrap().into_text().unwrap(), "SHOUT");
    }

    #[test]
    fn test_invoke_runs_callback_on_peer_context() {
        let ui = ContextThread::spawn(ContextOptions::default()).unwrap();
        let peer = PlainPeer::new(ui.context().clone());
        let owner = ui.context().owner();

        let result = invoke(
            &peer,
            move |arg| {
                let on_owner = thread::current().id() == owner;
                Ok(Marshalled::Text(format!("{}:{on_owner}", arg.into_text()?)))
            },
            Marshalled::Text("hello".into()),
        )
        .unwrap();

        assert_eq!(result.into_text().unwrap(), "hello:true");
    }

    #[test]
    fn test_invoke_returns_callback_fault_unchanged() {
        let ui = ContextThread::spawn(ContextOptions::default()).unwrap();
        let peer = PlainPeer::new(ui.context().clone());

        let err = invoke(
            &peer,
            |_| Err(BridgeError::ResourceFault("window destroyed".into())),
            Marshalled::Unit,
        )
        .unwrap_err();

        assert_eq!(err, BridgeError::ResourceFault("window destroyed".into()));
    }

    #[test]
    fn test_invoke_argument_mismatch_surfaces_to_caller() {
        let ui = ContextThread::spawn(ContextOptions::default()).unwrap();
        let peer = PlainPeer::new(ui.context().clone());

        let err = invoke(&peer, |arg| Ok(Marshalled::Text(arg.into_text()?)), Marshalled::Unit)
            .unwrap_err();
        assert!(matches!(err, BridgeError::ResultTypeMismatch { .. }));
    }
}
