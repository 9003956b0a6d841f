//! `peerbridge_core` -- thread-affinity invocation bridge for accessibility
//! providers.
//!
//! UI objects may only be touched from the thread that owns them, while
//! accessibility clients call in from arbitrary threads (typically an RPC
//! dispatch thread).  This crate moves each call onto the owning thread,
//! blocks the caller until it has run, and hands back the result or fault.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`errors`] | `BridgeError` enum via `thiserror` |
//! | [`context`] | `AffinityContext`, `Dispatcher`, `ContextThread` |
//! | [`invoke`] | `invoke` bridge and the tagged `Marshalled` result |
//! | [`pattern`] | Capability interfaces and their cross-thread wrappers |
//! | [`peer`] | `AutomationPeer`, `ElementProxy`, `TextFieldPeer` |
//! | [`root`] | `GenericRootPeer` with stale-handle defaults |
//! | [`window`] | `NativeWindow` resource (`Win32Window` on Windows) |

pub mod context;
pub mod errors;
pub mod invoke;
pub mod pattern;
pub mod peer;
pub mod root;
pub mod window;

#[cfg(test)]
mod testing;
