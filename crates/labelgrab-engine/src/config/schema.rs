use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelgrabConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub credentials: Credentials,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_landing_path")]
    pub landing_path: String,
    /// `{base_url}` and `{id}` are substituted.
    #[serde(default = "default_orders_url_template")]
    pub orders_url_template: String,
    /// First capture group yields the account identifier.
    #[serde(default = "default_identifier_pattern")]
    pub identifier_pattern: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            login_path: default_login_path(),
            landing_path: default_landing_path(),
            orders_url_template: default_orders_url_template(),
            identifier_pattern: default_identifier_pattern(),
        }
    }
}

impl SiteConfig {
    pub fn login_url(&self) -> String {
        join_url(&self.base_url, &self.login_path)
    }

    pub fn landing_url(&self) -> String {
        join_url(&self.base_url, &self.landing_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    match url::Url::parse(base).and_then(|b| b.join(path)) {
        Ok(joined) => joined.to_string(),
        Err(_) => format!("{}{}", base.trim_end_matches('/'), path),
    }
}

fn default_base_url() -> String {
    "https://supplier.meesho.com".to_string()
}

fn default_login_path() -> String {
    "/panel/v3/new/root/login".to_string()
}

fn default_landing_path() -> String {
    "/panel/v3/new/root/home".to_string()
}

fn default_orders_url_template() -> String {
    "{base_url}/panel/v3/new/fulfillment/{id}/orders/ready-to-ship".to_string()
}

fn default_identifier_pattern() -> String {
    r"/panel/v3/new/[a-z_-]+/([a-z0-9]{5,})(?:/|$)".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_file")]
    pub file: PathBuf,
    /// Any one of these texts on the landing page marks a logged-in session.
    #[serde(default = "default_marker_texts")]
    pub marker_texts: Vec<String>,
    /// Page-global expression; only an explicit `false` fails validation.
    #[serde(default = "default_auth_flag_expression")]
    pub auth_flag_expression: String,
    #[serde(default = "default_validity_wait_ms")]
    pub validity_wait_ms: u64,
    #[serde(default = "default_login_field_wait_ms")]
    pub login_field_wait_ms: u64,
    #[serde(default = "default_post_login_wait_ms")]
    pub post_login_wait_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            file: default_session_file(),
            marker_texts: default_marker_texts(),
            auth_flag_expression: default_auth_flag_expression(),
            validity_wait_ms: default_validity_wait_ms(),
            login_field_wait_ms: default_login_field_wait_ms(),
            post_login_wait_ms: default_post_login_wait_ms(),
        }
    }
}

impl SessionConfig {
    pub fn validity_wait(&self) -> Duration {
        Duration::from_millis(self.validity_wait_ms)
    }

    pub fn login_field_wait(&self) -> Duration {
        Duration::from_millis(self.login_field_wait_ms)
    }

    pub fn post_login_wait(&self) -> Duration {
        Duration::from_millis(self.post_login_wait_ms)
    }
}

fn default_session_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".labelgrab")
        .join("cookies.json")
}

fn default_marker_texts() -> Vec<String> {
    vec!["Orders".to_string(), "Payments".to_string()]
}

fn default_auth_flag_expression() -> String {
    "window.isLoggedIn".to_string()
}

fn default_validity_wait_ms() -> u64 {
    15000
}

fn default_login_field_wait_ms() -> u64 {
    30000
}

fn default_post_login_wait_ms() -> u64 {
    30000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_orders_link_text")]
    pub orders_link_text: String,
    #[serde(default = "default_tab_label")]
    pub tab_label: String,
    #[serde(default = "default_filter_label")]
    pub filter_label: Option<String>,
    #[serde(default = "default_filter_value")]
    pub filter_value: Option<String>,
    #[serde(default = "default_trigger_text")]
    pub trigger_text: String,
    #[serde(default = "default_trigger_class_hint")]
    pub trigger_class_hint: String,
    #[serde(default = "default_trigger_icon")]
    pub trigger_icon: String,
    #[serde(default = "default_download_text")]
    pub download_text: String,
    /// UI texts that mean the generated file is ready to download.
    #[serde(default = "default_ready_texts")]
    pub ready_texts: Vec<String>,
    /// UI texts that mean the server could not generate the file this time.
    #[serde(default = "default_transient_failure_texts")]
    pub transient_failure_texts: Vec<String>,
    #[serde(default = "default_artifact_extension")]
    pub artifact_extension: String,
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,
    #[serde(default = "default_secondary_navigation_timeout_ms")]
    pub secondary_navigation_timeout_ms: u64,
    #[serde(default = "default_element_wait_ms")]
    pub element_wait_ms: u64,
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_generation_timeout_ms")]
    pub generation_timeout_ms: u64,
    #[serde(default = "default_artifact_timeout_ms")]
    pub artifact_timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_typing_delay_min_ms")]
    pub typing_delay_min_ms: u64,
    #[serde(default = "default_typing_delay_max_ms")]
    pub typing_delay_max_ms: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            orders_link_text: default_orders_link_text(),
            tab_label: default_tab_label(),
            filter_label: default_filter_label(),
            filter_value: default_filter_value(),
            trigger_text: default_trigger_text(),
            trigger_class_hint: default_trigger_class_hint(),
            trigger_icon: default_trigger_icon(),
            download_text: default_download_text(),
            ready_texts: default_ready_texts(),
            transient_failure_texts: default_transient_failure_texts(),
            artifact_extension: default_artifact_extension(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
            secondary_navigation_timeout_ms: default_secondary_navigation_timeout_ms(),
            element_wait_ms: default_element_wait_ms(),
            settle_ms: default_settle_ms(),
            generation_timeout_ms: default_generation_timeout_ms(),
            artifact_timeout_ms: default_artifact_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            typing_delay_min_ms: default_typing_delay_min_ms(),
            typing_delay_max_ms: default_typing_delay_max_ms(),
        }
    }
}

impl WorkflowConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn secondary_navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.secondary_navigation_timeout_ms)
    }

    pub fn element_wait(&self) -> Duration {
        Duration::from_millis(self.element_wait_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }

    pub fn artifact_timeout(&self) -> Duration {
        Duration::from_millis(self.artifact_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_orders_link_text() -> String {
    "Orders".to_string()
}

fn default_tab_label() -> String {
    "Ready to Ship".to_string()
}

fn default_filter_label() -> Option<String> {
    Some("Dispatch Date".to_string())
}

fn default_filter_value() -> Option<String> {
    None
}

fn default_trigger_text() -> String {
    "Label".to_string()
}

fn default_trigger_class_hint() -> String {
    "label".to_string()
}

fn default_trigger_icon() -> String {
    "download".to_string()
}

fn default_download_text() -> String {
    "Download".to_string()
}

fn default_ready_texts() -> Vec<String> {
    vec![
        "Label generated".to_string(),
        "Labels generated".to_string(),
        "Labels are ready".to_string(),
    ]
}

fn default_transient_failure_texts() -> Vec<String> {
    vec!["Temporary issue with Label Generation".to_string()]
}

fn default_artifact_extension() -> String {
    "pdf".to_string()
}

fn default_navigation_timeout_ms() -> u64 {
    60000
}

fn default_secondary_navigation_timeout_ms() -> u64 {
    30000
}

fn default_element_wait_ms() -> u64 {
    15000
}

fn default_settle_ms() -> u64 {
    1500
}

fn default_generation_timeout_ms() -> u64 {
    120000
}

fn default_artifact_timeout_ms() -> u64 {
    60000
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_typing_delay_min_ms() -> u64 {
    40
}

fn default_typing_delay_max_ms() -> u64 {
    140
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_download_root")]
    pub download_root: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            download_root: default_download_root(),
        }
    }
}

fn default_download_root() -> PathBuf {
    PathBuf::from("./downloads")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default)]
    pub visible: bool,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub chrome_bin: Option<PathBuf>,
    #[serde(default)]
    pub user_data_dir: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            visible: false,
            window_width: default_window_width(),
            window_height: default_window_height(),
            user_agent: default_user_agent(),
            chrome_bin: None,
            user_data_dir: None,
        }
    }
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    800
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36".to_string()
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
