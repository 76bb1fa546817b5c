//! Wire types exchanged between the engine and a browser backend.
//!
//! A [`PageSnapshot`] is produced by the backend's injected snapshot script and
//! deserialized here; everything the locator decides is decided against it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub elements: Vec<Element>,
}

impl PageSnapshot {
    pub fn get(&self, id: u32) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id)
    }

    /// True when any element sits inside a container of the given kind.
    pub fn has_container(&self, kind: ContainerKind) -> bool {
        self.elements
            .iter()
            .any(|e| e.visible && e.containers.contains(&kind))
    }
}

/// Structural containers the snapshot script recognizes around an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Dialog,
    BottomBar,
    TableHeader,
    Navigation,
    Form,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    pub id: u32,
    pub tag: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default, rename = "type")]
    pub input_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub aria_label: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub containers: Vec<ContainerKind>,
    #[serde(default)]
    pub checked: Option<bool>,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default = "default_true")]
    pub attached: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Element {
    fn default() -> Self {
        Self {
            id: 0,
            tag: String::new(),
            role: None,
            text: String::new(),
            input_type: None,
            name: None,
            classes: Vec::new(),
            aria_label: None,
            placeholder: None,
            icon: None,
            containers: Vec::new(),
            checked: None,
            visible: default_true(),
            disabled: false,
            attached: default_true(),
        }
    }
}

impl Element {
    /// Visible, enabled and still attached to the document.
    pub fn is_usable(&self) -> bool {
        self.visible && !self.disabled && self.attached
    }

    /// The element's effective role: explicit ARIA role, else derived from the tag.
    pub fn effective_role(&self) -> Option<&str> {
        if let Some(role) = self.role.as_deref() {
            return Some(role);
        }
        match self.tag.as_str() {
            "button" => Some("button"),
            "a" => Some("link"),
            "input" => match self.input_type.as_deref() {
                Some("checkbox") => Some("checkbox"),
                Some("submit") | Some("button") => Some("button"),
                _ => Some("textbox"),
            },
            "textarea" => Some("textbox"),
            "select" => Some("combobox"),
            "dialog" => Some("dialog"),
            _ => None,
        }
    }

    pub fn has_class_fragment(&self, fragment: &str) -> bool {
        let fragment = fragment.to_lowercase();
        self.classes
            .iter()
            .any(|c| c.to_lowercase().contains(&fragment))
    }

    /// Text used for matching: inner text, falling back to the aria label.
    pub fn label(&self) -> &str {
        if self.text.trim().is_empty() {
            self.aria_label.as_deref().unwrap_or("")
        } else {
            &self.text
        }
    }

    pub fn in_container(&self, kind: ContainerKind) -> bool {
        self.containers.contains(&kind)
    }
}

/// A reference to an element found by a locator chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
    pub id: u32,
    pub strategy: String,
    pub label: String,
    pub checked: Option<bool>,
}

/// One persisted browser cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    /// Seconds since the Unix epoch; negative or absent for session cookies.
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub same_site: Option<String>,
}

fn default_path() -> String {
    "/".to_string()
}

impl CookieRecord {
    pub fn is_expired_at(&self, unix_secs: f64) -> bool {
        matches!(self.expires, Some(exp) if exp > 0.0 && exp <= unix_secs)
    }
}

#[derive(Debug, Clone)]
pub struct NavigationResult {
    pub url: String,
    pub title: String,
}
