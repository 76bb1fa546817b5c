use crate::protocol::{ContainerKind, Element, PageSnapshot};

/// How a strategy compares element text against its expectation.
///
/// Both sides are whitespace-collapsed and lowercased before comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextMatch {
    Exact(String),
    Contains(String),
}

impl TextMatch {
    pub fn exact(text: impl Into<String>) -> Self {
        TextMatch::Exact(text.into())
    }

    pub fn contains(text: impl Into<String>) -> Self {
        TextMatch::Contains(text.into())
    }

    pub fn matches(&self, haystack: &str) -> bool {
        let haystack = normalize(haystack);
        match self {
            TextMatch::Exact(expected) => haystack == normalize(expected),
            TextMatch::Contains(needle) => {
                let needle = normalize(needle);
                !needle.is_empty() && haystack.contains(&needle)
            }
        }
    }
}

pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// One independent way of finding the element for an intent.
///
/// A strategy must be a pure function of the snapshot and must only return
/// usable candidates (see [`Element::is_usable`]).
pub trait LocatorStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn find<'a>(&self, snapshot: &'a PageSnapshot) -> Option<&'a Element>;
}

fn first_usable<'a>(
    snapshot: &'a PageSnapshot,
    predicate: impl Fn(&Element) -> bool,
) -> Option<&'a Element> {
    snapshot
        .elements
        .iter()
        .find(|e| e.is_usable() && predicate(e))
}

fn role_is(elem: &Element, role: &str) -> bool {
    elem.effective_role()
        .is_some_and(|r| r.eq_ignore_ascii_case(role))
}

/// Semantic match: ARIA role (explicit or implied by the tag), optionally
/// narrowed by a class-name fragment and by the element's label.
pub struct RoleStrategy {
    pub name: String,
    pub role: String,
    pub text: Option<TextMatch>,
    pub class_hint: Option<String>,
}

impl RoleStrategy {
    pub fn new(role: &str, text: Option<TextMatch>) -> Self {
        Self {
            name: format!("role:{}", role),
            role: role.to_string(),
            text,
            class_hint: None,
        }
    }

    pub fn with_class_hint(mut self, hint: &str) -> Self {
        self.name = format!("role:{}+class:{}", self.role, hint);
        self.class_hint = Some(hint.to_string());
        self
    }
}

impl LocatorStrategy for RoleStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn find<'a>(&self, snapshot: &'a PageSnapshot) -> Option<&'a Element> {
        first_usable(snapshot, |e| {
            role_is(e, &self.role)
                && self
                    .class_hint
                    .as_deref()
                    .is_none_or(|hint| e.has_class_fragment(hint))
                && self.text.as_ref().is_none_or(|t| t.matches(e.label()))
        })
    }
}

/// Bare text match, optionally restricted to a set of roles.
pub struct TextStrategy {
    pub name: String,
    pub text: TextMatch,
    pub roles: Vec<String>,
}

impl TextStrategy {
    pub fn new(text: TextMatch) -> Self {
        Self {
            name: format!("text:{:?}", text),
            text,
            roles: Vec::new(),
        }
    }

    pub fn with_roles(mut self, roles: &[&str]) -> Self {
        self.roles = roles.iter().map(|r| r.to_string()).collect();
        self
    }
}

impl LocatorStrategy for TextStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn find<'a>(&self, snapshot: &'a PageSnapshot) -> Option<&'a Element> {
        first_usable(snapshot, |e| {
            (self.roles.is_empty() || self.roles.iter().any(|r| role_is(e, r)))
                && self.text.matches(e.label())
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Type,
    Name,
    Placeholder,
    AriaLabel,
}

impl Attribute {
    fn value<'a>(&self, elem: &'a Element) -> Option<&'a str> {
        match self {
            Attribute::Type => elem.input_type.as_deref(),
            Attribute::Name => elem.name.as_deref(),
            Attribute::Placeholder => elem.placeholder.as_deref(),
            Attribute::AriaLabel => elem.aria_label.as_deref(),
        }
    }
}

/// Match on a single element attribute.
pub struct AttributeStrategy {
    pub name: String,
    pub attribute: Attribute,
    pub value: TextMatch,
}

impl AttributeStrategy {
    pub fn new(attribute: Attribute, value: TextMatch) -> Self {
        Self {
            name: format!("attr:{:?}={:?}", attribute, value),
            attribute,
            value,
        }
    }
}

impl LocatorStrategy for AttributeStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn find<'a>(&self, snapshot: &'a PageSnapshot) -> Option<&'a Element> {
        first_usable(snapshot, |e| {
            self.attribute
                .value(e)
                .is_some_and(|v| self.value.matches(v))
        })
    }
}

/// Structural scoping: only consider elements inside a known container.
pub struct ContainerStrategy {
    pub name: String,
    pub container: ContainerKind,
    pub role: Option<String>,
    pub text: Option<TextMatch>,
}

impl ContainerStrategy {
    pub fn new(container: ContainerKind, role: Option<&str>, text: Option<TextMatch>) -> Self {
        Self {
            name: format!("within:{:?}", container),
            container,
            role: role.map(str::to_string),
            text,
        }
    }
}

impl LocatorStrategy for ContainerStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn find<'a>(&self, snapshot: &'a PageSnapshot) -> Option<&'a Element> {
        first_usable(snapshot, |e| {
            e.in_container(self.container)
                && self.role.as_deref().is_none_or(|r| role_is(e, r))
                && self.text.as_ref().is_none_or(|t| t.matches(e.label()))
        })
    }
}

/// Match on the icon signature reported for an element (svg test id,
/// icon class or sprite reference).
pub struct IconStrategy {
    pub name: String,
    pub signature: String,
    pub container: Option<ContainerKind>,
}

impl IconStrategy {
    pub fn new(signature: &str) -> Self {
        Self {
            name: format!("icon:{}", signature),
            signature: signature.to_lowercase(),
            container: None,
        }
    }

    pub fn within(mut self, container: ContainerKind) -> Self {
        self.container = Some(container);
        self
    }
}

impl LocatorStrategy for IconStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn find<'a>(&self, snapshot: &'a PageSnapshot) -> Option<&'a Element> {
        first_usable(snapshot, |e| {
            e.icon
                .as_deref()
                .is_some_and(|icon| icon.to_lowercase().contains(&self.signature))
                && self.container.is_none_or(|c| e.in_container(c))
        })
    }
}
