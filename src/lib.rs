//! Resumable downloader for share sites organised as site → album → picture
//!
//! Every node that is fully processed is recorded in a [`StateStore`], so a
//! run that is interrupted or restarted only fetches what is still missing.

pub mod config;
pub mod crawlers;
pub mod downloader;
pub mod links;
pub mod page;
pub mod results;
pub mod session;
pub mod state;
pub mod utils;
pub mod wait;

// Re-export commonly used types for convenience
pub use config::RipConfig;
pub use results::{CrawlSummary, NodeKind, NodeOutcome};
pub use state::StateStore;

use crawlers::web::WebSessionFactory;
use page::FormLogin;
use session::SessionDriver;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for crawl operations
#[derive(Debug, Error)]
pub enum Error {
    #[error("Element not found: {selector} (waited {timeout:?})")]
    ElementNotFound { selector: String, timeout: Duration },

    #[error("Download did not land within {0:?}")]
    DownloadTimeout(Duration),

    #[error("Download of {link} interrupted: {source}")]
    DownloadInterrupted {
        link: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Staging directory {path} holds {found} files, expected {expected}")]
    StagingViolation {
        path: PathBuf,
        found: usize,
        expected: usize,
    },

    #[error("Element has no {0} attribute")]
    MissingAttribute(String),

    #[error("WebDriver command failed: {0}")]
    WebDriver(#[from] fantoccini::error::CmdError),

    #[error("Could not start WebDriver session: {0}")]
    NewSession(#[from] fantoccini::error::NewSessionError),

    #[error("State store error: {0}")]
    State(#[from] state::StateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Gave up after {attempts} sessions; last error: {last}")]
    RetriesExhausted { attempts: usize, last: Box<Error> },
}

/// Result type for crawl operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Transient failures worth retrying on the same node
    ///
    /// Nothing that fails once a download was triggered qualifies: the file
    /// may still land in the session's staging directory.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ElementNotFound { .. } | Error::WebDriver(_))
    }

    /// Failures that another session cannot fix
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::State(_) | Error::RetriesExhausted { .. }
        )
    }
}

/// Main builder for a rip over WebDriver
pub struct Rip {
    config: RipConfig,
}

impl Rip {
    /// Create a new Rip with the given configuration
    pub fn new(config: RipConfig) -> Self {
        Self { config }
    }

    /// Load configuration from a file
    pub fn with_config_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Ok(Self::new(RipConfig::from_file(path)?))
    }

    /// Set the maximum number of sessions
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.config.max_sessions = max_sessions;
        self
    }

    /// Set the directory that receives the downloaded tree
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = output_dir.into();
        self
    }

    /// Set the path of the state document
    pub fn with_state_path(mut self, state_path: impl Into<PathBuf>) -> Self {
        self.config.state_path = state_path.into();
        self
    }

    /// Set the WebDriver URL
    pub fn with_webdriver_url(mut self, webdriver_url: impl Into<String>) -> Self {
        self.config.webdriver_url = webdriver_url.into();
        self
    }

    /// Run the browser without a window
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    pub fn config(&self) -> &RipConfig {
        &self.config
    }

    /// Run sessions until every configured site is completed
    pub async fn run(self) -> Result<CrawlSummary> {
        self.config.validate()?;
        let state = StateStore::open(&self.config.state_path)?;
        ::log::info!(
            "Loaded {} completed links from {}",
            state.len(),
            state.path().display()
        );

        let factory = WebSessionFactory::new(&self.config);
        let login = FormLogin::new(
            self.config.email.clone(),
            self.config.password.clone(),
            self.config.login.clone(),
            self.config.timings.login_timeout(),
            self.config.timings.element_timeout(),
        );

        SessionDriver::new(&factory, &login, &state, &self.config)
            .run()
            .await
    }
}
