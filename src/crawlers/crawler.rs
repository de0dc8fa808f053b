//! Site, album and picture traversal with per-node retries

use crate::Result;
use crate::config::RipConfig;
use crate::downloader::{Downloader, PictureTarget};
use crate::links::site_identity;
use crate::page::{Page, href};
use crate::results::{CrawlSummary, NodeKind, NodeOutcome};
use crate::state::StateStore;
use crate::utils::{album_dir_name, sanitize_name};
use crate::wait::{click_optional, probe, wait_then_settle};
use std::future::Future;
use std::path::Path;

/// Resumable traversal of site → album → picture through one page
///
/// Every node is checked against the state store before it is opened and
/// marked completed only after all of its children are.
pub struct Crawler<'a, P> {
    page: &'a P,
    state: &'a StateStore,
    config: &'a RipConfig,
    downloader: Downloader<'a>,
}

impl<'a, P: Page> Crawler<'a, P> {
    pub fn new(
        page: &'a P,
        state: &'a StateStore,
        config: &'a RipConfig,
        staging: &'a Path,
    ) -> Result<Self> {
        Ok(Self {
            page,
            state,
            config,
            downloader: Downloader::new(config, state, staging)?,
        })
    }

    /// Crawl a site under the site retry policy
    pub async fn crawl(&self, site_link: &str) -> Result<CrawlSummary> {
        self.retrying(NodeKind::Site, site_link, move || self.crawl_site(site_link))
            .await
    }

    /// Crawl every album of a site, then mark the site completed
    pub async fn crawl_site(&self, site_link: &str) -> Result<CrawlSummary> {
        let mut summary = CrawlSummary::default();
        if self.state.contains(site_link) {
            ::log::info!("Skipping site: {}", site_link);
            summary.record(NodeKind::Site, NodeOutcome::Skipped);
            return Ok(summary);
        }

        ::log::info!("Finding albums in site: {}", site_link);
        let album_links = self
            .children(site_link, NodeKind::Album, &self.config.selectors.album_link)
            .await?;
        ::log::info!("Found {} albums in {}", album_links.len(), site_link);

        let site_dir = sanitize_name(&site_identity(site_link));
        let site_dir = site_dir.as_str();
        for (index, album_link) in album_links.iter().enumerate() {
            let album_link = album_link.as_str();
            let album = self
                .retrying(NodeKind::Album, album_link, move || {
                    self.crawl_album(site_dir, index, album_link)
                })
                .await?;
            summary.merge(&album);
        }

        self.state.mark_completed(site_link)?;
        summary.record(NodeKind::Site, NodeOutcome::Completed);
        Ok(summary)
    }

    /// Crawl every picture of the album at `index` within its site
    pub async fn crawl_album(
        &self,
        site_dir: &str,
        index: usize,
        album_link: &str,
    ) -> Result<CrawlSummary> {
        let mut summary = CrawlSummary::default();
        if self.state.contains(album_link) {
            ::log::info!("Skipping album link: {}", album_link);
            summary.record(NodeKind::Album, NodeOutcome::Skipped);
            return Ok(summary);
        }

        ::log::info!("Opening album link: {}", album_link);
        self.page.navigate(album_link).await?;

        let selectors = &self.config.selectors;
        let timings = &self.config.timings;
        let title = self
            .page
            .wait_for_first(&selectors.album_title, timings.element_timeout())
            .await?;
        let title = self.page.text(&title).await?;
        let album_dir = album_dir_name(index, title.trim());
        ::log::info!("Album name: {}", album_dir);
        tokio::fs::create_dir_all(self.config.output_dir.join(site_dir).join(&album_dir)).await?;

        let first = probe(
            self.page,
            &selectors.picture_marker,
            timings.empty_album_timeout(),
        )
        .await?;
        if first.is_none() {
            ::log::info!("Album is empty; marking completed: {}", album_link);
            self.state.mark_completed(album_link)?;
            summary.record(NodeKind::Album, NodeOutcome::Empty);
            return Ok(summary);
        }

        let picture_links = self
            .listed_links(NodeKind::Picture, &selectors.picture_link)
            .await?;
        ::log::info!("Found {} pictures in {}", picture_links.len(), album_link);

        for (index, picture_link) in picture_links.iter().enumerate() {
            let target = PictureTarget {
                link: picture_link,
                index,
                site_dir,
                album_dir: &album_dir,
            };
            let target = &target;
            let outcome = self
                .retrying(NodeKind::Picture, picture_link, move || {
                    self.crawl_picture(target)
                })
                .await?;
            summary.record(NodeKind::Picture, outcome);
        }

        self.state.mark_completed(album_link)?;
        summary.record(NodeKind::Album, NodeOutcome::Completed);
        Ok(summary)
    }

    /// Download a single picture unless it is already completed
    pub async fn crawl_picture(&self, target: &PictureTarget<'_>) -> Result<NodeOutcome> {
        if self.state.contains(target.link) {
            ::log::info!("Skipping picture link: {}", target.link);
            return Ok(NodeOutcome::Skipped);
        }
        self.downloader.download(self.page, target).await?;
        Ok(NodeOutcome::Completed)
    }

    /// Open `link` and collect the links of its children
    async fn children(&self, link: &str, kind: NodeKind, selector: &str) -> Result<Vec<String>> {
        self.page.navigate(link).await?;
        self.listed_links(kind, selector).await
    }

    /// Links of all children on the current page, in document order
    async fn listed_links(&self, kind: NodeKind, selector: &str) -> Result<Vec<String>> {
        let timings = &self.config.timings;
        click_optional(
            self.page,
            &self.config.selectors.show_all_for(kind),
            timings.optional_control_timeout(),
        )
        .await;

        let elements = wait_then_settle(
            self.page,
            selector,
            timings.element_timeout(),
            &self.config.settle,
        )
        .await?;

        let mut links = Vec::with_capacity(elements.len());
        for element in &elements {
            links.push(href(self.page, element).await?);
        }
        Ok(links)
    }

    /// Run `op` under the retry policy of `kind`
    ///
    /// Only retryable errors are retried; the last error escapes once the
    /// node's attempts are used up.
    async fn retrying<T, F, Fut>(&self, kind: NodeKind, link: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let policy = self.config.retries.for_kind(kind);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < policy.attempts => {
                    let delay = policy.delay_after(attempt);
                    ::log::warn!(
                        "{} {} failed (attempt {}/{}): {}; retrying in {:?}",
                        kind,
                        link,
                        attempt,
                        policy.attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
