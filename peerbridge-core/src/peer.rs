//! Automation peers and cross-thread element access.
//!
//! An [`AutomationPeer`] is the accessibility face of one UI element.  All of
//! its queries must run on its affinity context; [`ElementProxy`] is the
//! handle foreign threads use instead, marshalling every query through the
//! bridge and handing out pattern providers already wrapped for the peer.

use std::sync::Arc;

use serde::Serialize;

use crate::context::AffinityContext;
use crate::errors::BridgeError;
use crate::invoke::{invoke, Marshalled};
use crate::pattern::{wrap_pattern, PatternId, PatternProvider, ValueStore};

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// Element bounds in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
    };

    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ControlType {
    Button,
    CheckBox,
    Custom,
    Edit,
    Pane,
    Text,
    Window,
}

impl ControlType {
    pub fn name(self) -> &'static str {
        match self {
            ControlType::Button => "Button",
            ControlType::CheckBox => "CheckBox",
            ControlType::Custom => "Custom",
            ControlType::Edit => "Edit",
            ControlType::Pane => "Pane",
            ControlType::Text => "Text",
            ControlType::Window => "Window",
        }
    }
}

/// Owned snapshot of one element, safe to hand to any thread.
#[derive(Debug, Clone, Serialize)]
pub struct ElementInfo {
    pub name: String,
    pub class_name: String,
    pub control_type: String,
    pub bounding_rect: Rect,
    pub supported_patterns: Vec<String>,
}

// ---------------------------------------------------------------------------
// AutomationPeer
// ---------------------------------------------------------------------------

/// Accessibility face of a UI element bound to one affinity context.
///
/// Everything except [`context`](AutomationPeer::context) may only be called
/// on the owning thread.  Foreign threads go through [`ElementProxy`].
pub trait AutomationPeer: Send + Sync {
    fn context(&self) -> &AffinityContext;

    fn name(&self) -> Result<String, BridgeError> {
        Ok(String::new())
    }

    fn class_name(&self) -> String {
        String::new()
    }

    fn control_type(&self) -> ControlType {
        ControlType::Custom
    }

    fn bounding_rectangle(&self) -> Result<Rect, BridgeError> {
        Ok(Rect::ZERO)
    }

    /// Unwrapped provider for `id`, or `None` if the element lacks it.
    fn pattern(&self, _id: PatternId) -> Option<PatternProvider> {
        None
    }
}

// ---------------------------------------------------------------------------
// ElementProxy
// ---------------------------------------------------------------------------

/// Thread-agnostic handle to a peer.
#[derive(Clone)]
pub struct ElementProxy {
    peer: Arc<dyn AutomationPeer>,
}

impl ElementProxy {
    pub fn new(peer: Arc<dyn AutomationPeer>) -> Self {
        Self { peer }
    }

    pub fn name(&self) -> Result<String, BridgeError> {
        let peer = Arc::clone(&self.peer);
        invoke(&*self.peer, move |_| Ok(Marshalled::Text(peer.name()?)), Marshalled::Unit)?
            .into_text()
    }

    pub fn class_name(&self) -> Result<String, BridgeError> {
        let peer = Arc::clone(&self.peer);
        invoke(&*self.peer, move |_| Ok(Marshalled::Text(peer.class_name())), Marshalled::Unit)?
            .into_text()
    }

    pub fn control_type(&self) -> Result<ControlType, BridgeError> {
        let peer = Arc::clone(&self.peer);
        invoke(
            &*self.peer,
            move |_| Ok(Marshalled::Control(peer.control_type())),
            Marshalled::Unit,
        )?
        .into_control_type()
    }

    pub fn bounding_rectangle(&self) -> Result<Rect, BridgeError> {
        let peer = Arc::clone(&self.peer);
        invoke(
            &*self.peer,
            move |_| Ok(Marshalled::Bounds(peer.bounding_rectangle()?)),
            Marshalled::Unit,
        )?
        .into_rect()
    }

    /// Provider for `id`, wrapped so that calls on it are marshalled too.
    pub fn pattern(&self, id: PatternId) -> Result<Option<PatternProvider>, BridgeError> {
        let peer = Arc::clone(&self.peer);
        let provider = invoke(
            &*self.peer,
            move |_| Ok(Marshalled::Pattern(peer.pattern(id))),
            Marshalled::Unit,
        )?
        .into_pattern()?;
        Ok(provider.map(|p| wrap_pattern(Arc::clone(&self.peer), p)))
    }

    pub fn supported_patterns(&self) -> Result<Vec<PatternId>, BridgeError> {
        let mut supported = Vec::new();
        for id in PatternId::ALL {
            if self.pattern(id)?.is_some() {
                supported.push(id);
            }
        }
        Ok(supported)
    }

    pub fn snapshot(&self) -> Result<ElementInfo, BridgeError> {
        Ok(ElementInfo {
            name: self.name()?,
            class_name: self.class_name()?,
            control_type: self.control_type()?.name().to_owned(),
            bounding_rect: self.bounding_rectangle()?,
            supported_patterns: self
                .supported_patterns()?
                .into_iter()
                .map(|id| id.name().to_owned())
                .collect(),
        })
    }
}

// ---------------------------------------------------------------------------
// TextFieldPeer
// ---------------------------------------------------------------------------

/// Single-line edit control backed by a [`ValueStore`].
pub struct TextFieldPeer {
    context: AffinityContext,
    name: String,
    value: Arc<ValueStore>,
}

impl TextFieldPeer {
    pub fn new(context: AffinityContext, name: impl Into<String>, value: Arc<ValueStore>) -> Self {
        Self {
            context,
            name: name.into(),
            value,
        }
    }
}

impl AutomationPeer for TextFieldPeer {
    fn context(&self) -> &AffinityContext {
        &self.context
    }

    fn name(&self) -> Result<String, BridgeError> {
        Ok(self.name.clone())
    }

    fn class_name(&self) -> String {
        "TextBox".to_owned()
    }

    fn control_type(&self) -> ControlType {
        ControlType::Edit
    }

    fn pattern(&self, id: PatternId) -> Option<PatternProvider> {
        match id {
            PatternId::Value => Some(PatternProvider::Value(self.value.clone())),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
