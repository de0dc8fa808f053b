//! Whole-session restarts
//!
//! A session opens one page, logs in and crawls every configured site.
//! Failures that escape the per-node retries end the session; a new one
//! starts with a fresh page and staging directory and relies on the
//! state store to skip what is already done.

#![allow(async_fn_in_trait)]

use crate::config::RipConfig;
use crate::crawlers::crawler::Crawler;
use crate::page::{Authenticator, Page, PageDriver};
use crate::results::CrawlSummary;
use crate::state::StateStore;
use crate::{Error, Result};
use std::path::Path;
use tempfile::TempDir;

/// Opens a page whose downloads land in `staging`
pub trait SessionFactory {
    type Page: Page;

    async fn open(&self, staging: &Path) -> Result<Self::Page>;
}

/// Runs crawl sessions until one succeeds or the budget is used up
pub struct SessionDriver<'a, F, A> {
    factory: &'a F,
    auth: &'a A,
    state: &'a StateStore,
    config: &'a RipConfig,
}

impl<'a, F: SessionFactory, A: Authenticator> SessionDriver<'a, F, A> {
    pub fn new(factory: &'a F, auth: &'a A, state: &'a StateStore, config: &'a RipConfig) -> Self {
        Self {
            factory,
            auth,
            state,
            config,
        }
    }

    /// Run sessions until one completes
    ///
    /// Fatal errors end the run at once. Other errors start a new session,
    /// up to `max_sessions`; after that `RetriesExhausted` is returned.
    pub async fn run(&self) -> Result<CrawlSummary> {
        let max_sessions = self.config.max_sessions.max(1);
        let mut last_error = None;

        for attempt in 1..=max_sessions {
            ::log::info!("Starting session {}/{}", attempt, max_sessions);
            match self.run_session().await {
                Ok(summary) => {
                    ::log::info!("Session {} completed: {}", attempt, summary);
                    return Ok(summary);
                }
                Err(e) if e.is_fatal() => {
                    ::log::error!("Session {} failed fatally: {}", attempt, e);
                    return Err(e);
                }
                Err(e) => {
                    ::log::warn!("Session {} failed: {}", attempt, e);
                    last_error = Some(e);
                    if attempt < max_sessions {
                        tokio::time::sleep(self.config.session_backoff()).await;
                    }
                }
            }
        }

        let last = last_error.unwrap_or_else(|| Error::Config("no session was run".to_string()));
        Err(Error::RetriesExhausted {
            attempts: max_sessions,
            last: Box::new(last),
        })
    }

    /// One session: staging directory, page, login, every site
    pub async fn run_session(&self) -> Result<CrawlSummary> {
        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.config.output_dir)?;
        let staging_path = std::path::absolute(staging.path())?;

        let result = match self.factory.open(&staging_path).await {
            Ok(page) => {
                let result = self.crawl_all(&page, &staging_path).await;
                if let Err(e) = page.close().await {
                    ::log::warn!("Failed to close page: {}", e);
                }
                result
            }
            Err(e) => Err(e),
        };

        remove_staging(staging);
        result
    }

    async fn crawl_all(&self, page: &F::Page, staging: &Path) -> Result<CrawlSummary> {
        self.auth.log_in(page).await?;

        let crawler = Crawler::new(page, self.state, self.config, staging)?;
        let mut summary = CrawlSummary::default();
        for site_link in &self.config.site_links {
            let site = crawler.crawl(site_link).await?;
            summary.merge(&site);
        }
        Ok(summary)
    }
}

fn remove_staging(staging: TempDir) {
    let path = staging.path().to_path_buf();
    if let Err(e) = staging.close() {
        ::log::warn!("Failed to remove staging directory {}: {}", path.display(), e);
    }
}
