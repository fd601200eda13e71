// src/core/call_graph/gui_model.rs
//! GUI event bindings supplied by the window/widget extraction stage.

use std::collections::HashMap;
use std::fmt;
use serde::{Serialize, Deserialize};

use crate::error::Result;

/// Kind of GUI node hosting a widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowKind {
    Activity,
    Dialog,
    Fragment,
    Menu,
    OptionsMenu,
    ContextMenu,
    View,
}

impl WindowKind {
    pub fn label(self) -> &'static str {
        match self {
            WindowKind::Activity => "ACT",
            WindowKind::Dialog => "DIALOG",
            WindowKind::Fragment => "FRAG",
            WindowKind::Menu => "MENU",
            WindowKind::OptionsMenu => "OptionsMenu",
            WindowKind::ContextMenu => "ContextMenu",
            WindowKind::View => "VIEW",
        }
    }

    /// Menus are attached to another window rather than shown on their own
    pub fn is_menu(self) -> bool {
        match self {
            WindowKind::Menu | WindowKind::OptionsMenu | WindowKind::ContextMenu => true,
            WindowKind::Activity | WindowKind::Dialog | WindowKind::Fragment | WindowKind::View => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GuiWindow {
    pub kind: WindowKind,
    /// Class implementing the window
    pub class: String,
}

impl fmt::Display for GuiWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.kind.label(), self.class)
    }
}

/// A (window, widget, event type) triple with the methods handling it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventBinding {
    pub window: GuiWindow,
    pub widget: String,
    pub event: String,
    pub handlers: Vec<String>,
}

/// Lookup from handler methods to the GUI events that invoke them
pub trait EventHandlerIndex {
    fn events_bound_to(&self, method: &str) -> Vec<&EventBinding>;

    fn is_event_handler(&self, method: &str) -> bool {
        !self.events_bound_to(method).is_empty()
    }

    /// Window classes that contain widgets of `view_class`
    fn view_hosts(&self, _view_class: &str) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuiSnapshot {
    #[serde(default)]
    pub bindings: Vec<EventBinding>,
    /// View class -> window classes whose layouts contain it
    #[serde(default)]
    pub view_hosts: HashMap<String, Vec<String>>,
}

/// In-memory event handler index
#[derive(Debug, Clone, Default)]
pub struct GuiModel {
    bindings: Vec<EventBinding>,
    by_handler: HashMap<String, Vec<usize>>,
    view_hosts: HashMap<String, Vec<String>>,
}

impl GuiModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let snapshot: GuiSnapshot = serde_json::from_str(content)?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn from_snapshot(snapshot: GuiSnapshot) -> Self {
        let mut model = Self::new();
        for binding in snapshot.bindings {
            model.add_binding(binding);
        }
        model.view_hosts = snapshot.view_hosts;
        model
    }

    pub fn add_binding(&mut self, binding: EventBinding) {
        if self.bindings.contains(&binding) {
            return;
        }
        let index = self.bindings.len();
        for handler in &binding.handlers {
            let slots = self.by_handler.entry(handler.clone()).or_default();
            if !slots.contains(&index) {
                slots.push(index);
            }
        }
        self.bindings.push(binding);
    }

    pub fn add_view_host(&mut self, view_class: &str, window_class: &str) {
        let hosts = self.view_hosts.entry(view_class.to_string()).or_default();
        if !hosts.iter().any(|h| h == window_class) {
            hosts.push(window_class.to_string());
        }
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }
}

impl EventHandlerIndex for GuiModel {
    fn events_bound_to(&self, method: &str) -> Vec<&EventBinding> {
        self.by_handler
            .get(method)
            .map(|slots| slots.iter().map(|&i| &self.bindings[i]).collect())
            .unwrap_or_default()
    }

    fn view_hosts(&self, view_class: &str) -> Vec<String> {
        self.view_hosts.get(view_class).cloned().unwrap_or_default()
    }
}
