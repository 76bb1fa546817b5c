//! Built-in chains for every control the workflow touches.

use super::strategy::*;
use super::LocatorChain;
use crate::config::WorkflowConfig;
use crate::protocol::ContainerKind;

pub fn email_field() -> LocatorChain {
    LocatorChain::new("login email field")
        .then(AttributeStrategy::new(Attribute::Type, TextMatch::exact("email")))
        .then(AttributeStrategy::new(Attribute::Name, TextMatch::contains("email")))
        .then(AttributeStrategy::new(
            Attribute::Placeholder,
            TextMatch::contains("email"),
        ))
        .then(AttributeStrategy::new(
            Attribute::AriaLabel,
            TextMatch::contains("email"),
        ))
        .then(AttributeStrategy::new(
            Attribute::Placeholder,
            TextMatch::contains("phone"),
        ))
}

pub fn password_field() -> LocatorChain {
    LocatorChain::new("login password field")
        .then(AttributeStrategy::new(
            Attribute::Type,
            TextMatch::exact("password"),
        ))
        .then(AttributeStrategy::new(
            Attribute::Name,
            TextMatch::contains("password"),
        ))
        .then(AttributeStrategy::new(
            Attribute::Placeholder,
            TextMatch::contains("password"),
        ))
        .then(AttributeStrategy::new(
            Attribute::AriaLabel,
            TextMatch::contains("password"),
        ))
}

pub fn login_submit() -> LocatorChain {
    LocatorChain::new("login submit button")
        .then(AttributeStrategy::new(Attribute::Type, TextMatch::exact("submit")))
        .then(TextStrategy::new(TextMatch::exact("log in")).with_roles(&["button"]))
        .then(TextStrategy::new(TextMatch::exact("login")).with_roles(&["button"]))
        .then(TextStrategy::new(TextMatch::exact("sign in")).with_roles(&["button"]))
        .then(ContainerStrategy::new(
            ContainerKind::Form,
            Some("button"),
            Some(TextMatch::contains("continue")),
        ))
}

pub fn orders_link(config: &WorkflowConfig) -> LocatorChain {
    let text = &config.orders_link_text;
    LocatorChain::new("orders navigation link")
        .then(RoleStrategy::new("link", Some(TextMatch::exact(text))))
        .then(ContainerStrategy::new(
            ContainerKind::Navigation,
            None,
            Some(TextMatch::exact(text)),
        ))
        .then(TextStrategy::new(TextMatch::exact(text)))
}

pub fn orders_tab(config: &WorkflowConfig) -> LocatorChain {
    let label = &config.tab_label;
    LocatorChain::new("orders tab")
        .then(RoleStrategy::new("tab", Some(TextMatch::exact(label))))
        .then(TextStrategy::new(TextMatch::exact(label)))
        .then(RoleStrategy::new("tab", Some(TextMatch::contains(label))))
        .then(TextStrategy::new(TextMatch::contains(label)))
}

pub fn filter_control(label: &str) -> LocatorChain {
    LocatorChain::new("filter control")
        .then(RoleStrategy::new("button", Some(TextMatch::exact(label))))
        .then(RoleStrategy::new("combobox", Some(TextMatch::contains(label))))
        .then(TextStrategy::new(TextMatch::contains(label)))
}

pub fn filter_option(value: &str) -> LocatorChain {
    LocatorChain::new("filter option")
        .then(RoleStrategy::new("option", Some(TextMatch::exact(value))))
        .then(RoleStrategy::new("radio", Some(TextMatch::exact(value))))
        .then(ContainerStrategy::new(
            ContainerKind::Dialog,
            None,
            Some(TextMatch::exact(value)),
        ))
        .then(TextStrategy::new(TextMatch::exact(value)))
}

pub fn filter_apply() -> LocatorChain {
    LocatorChain::new("filter apply button")
        .then(RoleStrategy::new("button", Some(TextMatch::exact("apply"))))
        .then(TextStrategy::new(TextMatch::exact("apply")))
}

pub fn select_all() -> LocatorChain {
    LocatorChain::new("select-all checkbox")
        .then(AttributeStrategy::new(
            Attribute::AriaLabel,
            TextMatch::contains("select all"),
        ))
        .then(ContainerStrategy::new(
            ContainerKind::TableHeader,
            Some("checkbox"),
            None,
        ))
        .then(TextStrategy::new(TextMatch::exact("select all")))
}

/// The control that starts server-side generation. The UI reuses generic
/// button classes and the same short label across unrelated buttons, so the
/// semantic match goes first and the icon match last.
pub fn generation_trigger(config: &WorkflowConfig) -> LocatorChain {
    let text = &config.trigger_text;
    LocatorChain::new("label generation trigger")
        .then(
            RoleStrategy::new("button", Some(TextMatch::exact(text)))
                .with_class_hint(&config.trigger_class_hint),
        )
        .then(TextStrategy::new(TextMatch::exact(text)))
        .then(ContainerStrategy::new(
            ContainerKind::Dialog,
            Some("button"),
            Some(TextMatch::contains(text)),
        ))
        .then(IconStrategy::new(&config.trigger_icon))
}

/// A confirmation surface that shows the job already produced something.
pub fn in_progress_surface(config: &WorkflowConfig) -> LocatorChain {
    let text = &config.download_text;
    LocatorChain::new("in-progress confirmation surface")
        .then(ContainerStrategy::new(
            ContainerKind::Dialog,
            Some("button"),
            Some(TextMatch::contains(text)),
        ))
        .then(ContainerStrategy::new(
            ContainerKind::BottomBar,
            Some("button"),
            Some(TextMatch::contains(text)),
        ))
}

pub fn modal_download(config: &WorkflowConfig) -> LocatorChain {
    let text = &config.download_text;
    LocatorChain::new("modal download button")
        .then(ContainerStrategy::new(
            ContainerKind::Dialog,
            Some("button"),
            Some(TextMatch::exact(text)),
        ))
        .then(ContainerStrategy::new(
            ContainerKind::Dialog,
            Some("button"),
            Some(TextMatch::contains(text)),
        ))
        .then(ContainerStrategy::new(
            ContainerKind::BottomBar,
            Some("button"),
            Some(TextMatch::contains(text)),
        ))
        .then(IconStrategy::new(&config.trigger_icon).within(ContainerKind::Dialog))
}
