pub mod loader;
pub mod schema;

pub use loader::{ConfigError, ConfigLoader, apply_overrides};
pub use schema::{
    BrowserConfig, Credentials, LabelgrabConfig, PathsConfig, SessionConfig, SiteConfig,
    WorkflowConfig,
};
