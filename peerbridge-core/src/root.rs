//! Generic root peer: the `Pane` that stands for a top-level window.
//!
//! The root's name and bounds come from its native window, which may be
//! destroyed under it.  Those two queries absorb exactly one fault kind,
//! [`BridgeError::ResourceFault`], and substitute a documented default:
//!
//! | Query | Default on stale handle |
//! |-------|-------------------------|
//! | [`name`](AutomationPeer::name) | `""` |
//! | [`bounding_rectangle`](AutomationPeer::bounding_rectangle) | [`Rect::ZERO`] |
//!
//! Every other fault propagates unchanged.

use std::sync::Arc;

use crate::context::AffinityContext;
use crate::errors::BridgeError;
use crate::peer::{AutomationPeer, ControlType, Rect};
use crate::window::NativeWindow;

pub struct GenericRootPeer {
    context: AffinityContext,
    name: String,
    window: Option<Arc<dyn NativeWindow>>,
}

impl GenericRootPeer {
    /// `name` is the element's own name; when empty, the window title is used.
    pub fn new(
        context: AffinityContext,
        name: impl Into<String>,
        window: Option<Arc<dyn NativeWindow>>,
    ) -> Self {
        Self {
            context,
            name: name.into(),
            window,
        }
    }

    fn live_window(&self) -> Option<&Arc<dyn NativeWindow>> {
        self.window.as_ref().filter(|w| w.handle() != 0)
    }
}

impl AutomationPeer for GenericRootPeer {
    fn context(&self) -> &AffinityContext {
        &self.context
    }

    fn name(&self) -> Result<String, BridgeError> {
        if !self.name.is_empty() {
            return Ok(self.name.clone());
        }
        let Some(window) = self.live_window() else {
            return Ok(String::new());
        };
        match window.title() {
            Ok(title) => Ok(title),
            // Stale handle: the root reads as unnamed.
            Err(BridgeError::ResourceFault(_)) => Ok(String::new()),
            Err(e) => Err(e),
        }
    }

    fn class_name(&self) -> String {
        "Pane".to_owned()
    }

    fn control_type(&self) -> ControlType {
        ControlType::Pane
    }

    fn bounding_rectangle(&self) -> Result<Rect, BridgeError> {
        let Some(window) = self.live_window() else {
            return Ok(Rect::ZERO);
        };
        match window.rect() {
            Ok(rc) => Ok(rc.into()),
            // Stale handle: zero-sized bounds.
            Err(BridgeError::ResourceFault(_)) => Ok(Rect::ZERO),
            Err(e) => Err(e),
        }
    }
}
