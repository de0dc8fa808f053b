use crate::results::NodeKind;
use crate::wait::Settle;
use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for a rip of one or more share sites
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RipConfig {
    /// Account email used to log in
    #[serde(default)]
    pub email: String,

    /// Account password used to log in
    #[serde(default)]
    pub password: String,

    /// Site links to process, in order
    #[serde(default)]
    pub site_links: Vec<String>,

    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Run the browser without a window
    #[serde(default)]
    pub headless: bool,

    /// Root directory that receives `<site>/<album>/<picture>.jpg`
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Path of the completion state document
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// Maximum number of crawl sessions before giving up
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Delay between a failed session and the next one, in milliseconds
    #[serde(default)]
    pub session_backoff_ms: u64,

    /// Regex a staged file name must match to count as a finished download
    #[serde(default = "default_download_pattern")]
    pub download_pattern: String,

    #[serde(default)]
    pub timings: Timings,

    /// How to let a list of children finish rendering
    #[serde(default)]
    pub settle: Settle,

    #[serde(default)]
    pub selectors: Selectors,

    #[serde(default)]
    pub login: LoginConfig,

    #[serde(default)]
    pub retries: NodeRetries,
}

/// Bounded waits used during a crawl, all in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Wait for an expected element (first child, album title, picture metadata)
    pub element_timeout_ms: u64,
    /// Probe for a first picture before an album is considered empty
    pub empty_album_timeout_ms: u64,
    /// Wait for optional controls such as "show all"
    pub optional_control_timeout_ms: u64,
    /// Wait for the detail image and its download menu entry
    pub download_trigger_timeout_ms: u64,
    /// Wait for a download to land in the staging directory
    pub download_timeout_ms: u64,
    /// Interval between two looks at the staging directory
    pub download_poll_ms: u64,
    /// Extra delay after a download is detected; the browser may still be writing it
    pub download_grace_ms: u64,
    /// Wait for the post-login marker
    pub login_timeout_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            element_timeout_ms: 15_000,
            empty_album_timeout_ms: 5_000,
            optional_control_timeout_ms: 5_000,
            download_trigger_timeout_ms: 5_000,
            download_timeout_ms: 30_000,
            download_poll_ms: 100,
            download_grace_ms: 5_000,
            login_timeout_ms: 10_000,
        }
    }
}

impl Timings {
    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }

    pub fn empty_album_timeout(&self) -> Duration {
        Duration::from_millis(self.empty_album_timeout_ms)
    }

    pub fn optional_control_timeout(&self) -> Duration {
        Duration::from_millis(self.optional_control_timeout_ms)
    }

    pub fn download_trigger_timeout(&self) -> Duration {
        Duration::from_millis(self.download_trigger_timeout_ms)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_millis(self.download_timeout_ms)
    }

    pub fn download_poll(&self) -> Duration {
        Duration::from_millis(self.download_poll_ms)
    }

    pub fn download_grace(&self) -> Duration {
        Duration::from_millis(self.download_grace_ms)
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_millis(self.login_timeout_ms)
    }
}

/// CSS selectors for every element the crawl touches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    /// Album links on a site page
    pub album_link: String,
    /// Title of an album page
    pub album_title: String,
    /// Any picture thumbnail on an album page
    pub picture_marker: String,
    /// Links to picture detail pages on an album page
    pub picture_link: String,
    /// Metadata text on a picture detail page
    pub picture_metadata: String,
    /// Image that opens the context menu on a picture detail page
    pub detail_image: String,
    /// Download entry of the context menu
    pub download_menu: String,
    /// "Show all" pagination control; `{kind}` is replaced by `album` or `picture`
    pub show_all: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            album_link: "div.pic-album-hdr a.pic-album-title".to_string(),
            album_title: "span.title-text".to_string(),
            picture_marker: "img.pic-img".to_string(),
            picture_link: "a:has(img.pic-img)".to_string(),
            picture_metadata: "div.pic-img-text.detail-footer-bottom".to_string(),
            detail_image: "img.detail-img".to_string(),
            download_menu: "div.i-download".to_string(),
            show_all: r#"div.pic-controls div.navbar-right a[aria-label="Show all {kind} per page"]"#
                .to_string(),
        }
    }
}

impl Selectors {
    /// Selector of the "show all" control for the given child kind
    pub fn show_all_for(&self, kind: NodeKind) -> String {
        self.show_all.replace("{kind}", &kind.to_string())
    }
}

/// Login form used by `FormLogin`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    pub url: String,
    pub email_input: String,
    pub password_input: String,
    pub submit_button: String,
    /// Element that only renders once the login succeeded
    pub success_marker: String,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            url: "https://accounts.shutterfly.com/".to_string(),
            email_input: "input#email".to_string(),
            password_input: "input#password".to_string(),
            submit_button: "button#signInButton".to_string(),
            success_marker: "span.title".to_string(),
        }
    }
}

/// Retry budget for one node
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub attempts: u32,
    /// Delay before the first retry; doubled for each further retry
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(1, 2_000)
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff_ms: u64) -> Self {
        Self {
            attempts,
            backoff_ms,
        }
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

/// Retry budgets per node class
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeRetries {
    pub site: RetryPolicy,
    pub album: RetryPolicy,
    pub picture: RetryPolicy,
}

impl Default for NodeRetries {
    fn default() -> Self {
        Self {
            site: RetryPolicy::new(1, 2_000),
            album: RetryPolicy::new(2, 2_000),
            picture: RetryPolicy::new(3, 2_000),
        }
    }
}

impl NodeRetries {
    pub fn for_kind(&self, kind: NodeKind) -> RetryPolicy {
        match kind {
            NodeKind::Site => self.site,
            NodeKind::Album => self.album,
            NodeKind::Picture => self.picture,
        }
    }
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_state_path() -> PathBuf {
    PathBuf::from(".state")
}

fn default_max_sessions() -> usize {
    10
}

fn default_download_pattern() -> String {
    r"(?i)\.jpe?g$".to_string()
}

impl RipConfig {
    /// Create a configuration with default values for the given sites
    pub fn new(site_links: Vec<String>) -> Self {
        Self {
            email: String::new(),
            password: String::new(),
            site_links,
            webdriver_url: default_webdriver_url(),
            headless: false,
            output_dir: default_output_dir(),
            state_path: default_state_path(),
            max_sessions: default_max_sessions(),
            session_backoff_ms: 0,
            download_pattern: default_download_pattern(),
            timings: Timings::default(),
            settle: Settle::default(),
            selectors: Selectors::default(),
            login: LoginConfig::default(),
            retries: NodeRetries::default(),
        }
    }

    /// Load configuration from a JSON file
    ///
    /// `WEBDRIVER_URL` overrides the WebDriver URL, and
    /// `SHUTTERRIP_EMAIL`/`SHUTTERRIP_PASSWORD` fill in missing credentials.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)
            .map_err(|e| Error::Config(format!("cannot open {}: {}", path.display(), e)))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let mut config = Self::from_json(&contents)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(format!("invalid config: {}", e)))
    }

    fn apply_env(&mut self) {
        if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
            if !webdriver_url.is_empty() {
                self.webdriver_url = webdriver_url;
            }
        }
        if self.email.is_empty() {
            if let Ok(email) = std::env::var("SHUTTERRIP_EMAIL") {
                self.email = email;
            }
        }
        if self.password.is_empty() {
            if let Ok(password) = std::env::var("SHUTTERRIP_PASSWORD") {
                self.password = password;
            }
        }
    }

    /// Reject configurations a crawl cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.site_links.is_empty() {
            return Err(Error::Config("site_links must not be empty".to_string()));
        }
        if self.max_sessions == 0 {
            return Err(Error::Config("max_sessions must be at least 1".to_string()));
        }
        self.download_regex()?;
        Ok(())
    }

    /// Compiled `download_pattern`
    pub fn download_regex(&self) -> Result<Regex> {
        Regex::new(&self.download_pattern)
            .map_err(|e| Error::Config(format!("invalid download_pattern: {}", e)))
    }

    pub fn session_backoff(&self) -> Duration {
        Duration::from_millis(self.session_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = RipConfig::from_json(
            r#"{"email": "me@example.com", "password": "pw", "site_links": ["https://a.example.com/s"]}"#,
        )
        .unwrap();
        assert_eq!(config.site_links.len(), 1);
        assert_eq!(config.max_sessions, 10);
        assert_eq!(config.state_path, PathBuf::from(".state"));
        assert_eq!(config.timings.download_timeout(), Duration::from_secs(30));
        assert_eq!(config.timings.download_poll(), Duration::from_millis(100));
        assert!(matches!(config.settle, Settle::Fixed { delay_ms: 5_000 }));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = RipConfig::from_json(
            r#"{
                "site_links": ["https://a.example.com/s"],
                "timings": {"download_grace_ms": 10},
                "settle": {"strategy": "stable", "interval_ms": 250, "max_wait_ms": 4000},
                "retries": {"picture": {"attempts": 5, "backoff_ms": 1}}
            }"#,
        )
        .unwrap();
        assert_eq!(config.timings.download_grace(), Duration::from_millis(10));
        assert_eq!(config.timings.element_timeout(), Duration::from_secs(15));
        assert!(matches!(
            config.settle,
            Settle::Stable {
                interval_ms: 250,
                max_wait_ms: 4000
            }
        ));
        assert_eq!(config.retries.for_kind(NodeKind::Picture).attempts, 5);
        assert_eq!(config.retries.for_kind(NodeKind::Album).attempts, 2);
    }

    #[test]
    fn test_retry_policy_accepts_missing_fields() {
        let config = RipConfig::from_json(
            r#"{
                "site_links": ["https://a.example.com/s"],
                "retries": {"picture": {"attempts": 5}, "album": {"backoff_ms": 10}}
            }"#,
        )
        .unwrap();
        let picture = config.retries.for_kind(NodeKind::Picture);
        assert_eq!(picture.attempts, 5);
        assert_eq!(picture.backoff_ms, 2_000);
        let album = config.retries.for_kind(NodeKind::Album);
        assert_eq!(album.attempts, 1);
        assert_eq!(album.delay_after(2), Duration::from_millis(20));
        assert_eq!(config.retries.for_kind(NodeKind::Site).attempts, 1);
    }

    #[test]
    fn test_validate_rejects_bad_configs() {
        let empty = RipConfig::new(vec![]);
        assert!(matches!(empty.validate(), Err(Error::Config(_))));

        let mut bad_pattern = RipConfig::new(vec!["https://a.example.com".to_string()]);
        bad_pattern.download_pattern = "(".to_string();
        assert!(matches!(bad_pattern.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_show_all_selector_per_kind() {
        let selectors = Selectors::default();
        assert!(
            selectors
                .show_all_for(NodeKind::Album)
                .contains("Show all album per page")
        );
        assert!(
            selectors
                .show_all_for(NodeKind::Picture)
                .contains("Show all picture per page")
        );
    }

    #[test]
    fn test_retry_backoff_doubles() {
        let policy = RetryPolicy::new(4, 100);
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
    }
}
