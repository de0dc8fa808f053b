//! Acquisition of a single picture
//!
//! A download is triggered through the page's context menu, lands in the
//! session's staging directory, and is renamed into its destination once
//! it is complete. The staging directory holds at most one file at a time.

use crate::config::{RipConfig, Selectors, Timings};
use crate::page::Page;
use crate::state::StateStore;
use crate::utils::picture_file_name;
use crate::{Error, Result};
use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::time::{Instant, sleep};

/// Where a picture belongs in the output tree
#[derive(Debug, Clone, Copy)]
pub struct PictureTarget<'a> {
    /// Link of the picture detail page
    pub link: &'a str,
    /// Zero-based position within the album
    pub index: usize,
    /// Sanitized site directory name
    pub site_dir: &'a str,
    /// Sanitized album directory name
    pub album_dir: &'a str,
}

/// Downloads pictures through one page into one staging directory
#[derive(Debug)]
pub struct Downloader<'a> {
    staging: &'a Path,
    output_root: &'a Path,
    state: &'a StateStore,
    selectors: &'a Selectors,
    timings: &'a Timings,
    accepted: Regex,
}

impl<'a> Downloader<'a> {
    pub fn new(
        config: &'a RipConfig,
        state: &'a StateStore,
        staging: &'a Path,
    ) -> Result<Self> {
        Ok(Self {
            staging,
            output_root: &config.output_dir,
            state,
            selectors: &config.selectors,
            timings: &config.timings,
            accepted: config.download_regex()?,
        })
    }

    /// Download the picture and mark it completed; returns its destination
    pub async fn download<P: Page>(&self, page: &P, target: &PictureTarget<'_>) -> Result<PathBuf> {
        ::log::info!("Opening picture link: {}", target.link);
        page.navigate(target.link).await?;

        let metadata = page
            .wait_for_first(&self.selectors.picture_metadata, self.timings.element_timeout())
            .await?;
        let metadata = page.text(&metadata).await?;
        let destination = self
            .output_root
            .join(target.site_dir)
            .join(target.album_dir)
            .join(picture_file_name(target.index, metadata.trim()));

        self.expect_staged(0).await?;
        let staged = match self.fetch(page).await {
            Ok(staged) => staged,
            Err(e) if e.is_retryable() => {
                return Err(Error::DownloadInterrupted {
                    link: target.link.to_string(),
                    source: Box::new(e),
                });
            }
            Err(e) => return Err(e),
        };
        relocate(&staged, &destination).await?;
        self.state.mark_completed(target.link)?;

        ::log::info!("Saved {}", destination.display());
        Ok(destination)
    }

    /// Trigger the download and return the single file it staged
    async fn fetch<P: Page>(&self, page: &P) -> Result<PathBuf> {
        self.trigger(page).await?;
        wait_for_download(
            self.staging,
            &self.accepted,
            self.timings.download_timeout(),
            self.timings.download_poll(),
        )
        .await?;
        // Detection only means the name is final; the browser may still be writing
        sleep(self.timings.download_grace()).await;

        Ok(self.expect_staged(1).await?.remove(0))
    }

    async fn trigger<P: Page>(&self, page: &P) -> Result<()> {
        let timeout = self.timings.download_trigger_timeout();
        let image = page
            .wait_for_first(&self.selectors.detail_image, timeout)
            .await?;
        page.right_click_then_click(&image, &self.selectors.download_menu, timeout)
            .await
    }

    /// Check that the staging directory holds exactly `expected` files
    async fn expect_staged(&self, expected: usize) -> Result<Vec<PathBuf>> {
        let files = staged_files(self.staging).await?;
        if files.len() != expected {
            return Err(Error::StagingViolation {
                path: self.staging.to_path_buf(),
                found: files.len(),
                expected,
            });
        }
        Ok(files)
    }
}

/// Files currently present in the staging directory, sorted
pub async fn staged_files(staging: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(staging).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        files.push(entry.path());
    }
    files.sort();
    Ok(files)
}

/// Poll `staging` until a file whose name matches `accepted` appears
pub async fn wait_for_download(
    staging: &Path,
    accepted: &Regex,
    timeout: std::time::Duration,
    poll: std::time::Duration,
) -> Result<()> {
    let start = Instant::now();
    loop {
        let files = staged_files(staging).await?;
        let landed = files.iter().any(|file| {
            file.file_name()
                .map(|name| accepted.is_match(&name.to_string_lossy()))
                .unwrap_or(false)
        });
        if landed {
            ::log::debug!("Download landed after {:?}", start.elapsed());
            return Ok(());
        }
        if start.elapsed() >= timeout {
            return Err(Error::DownloadTimeout(timeout));
        }
        sleep(poll).await;
    }
}

/// Move `staged` to `destination`, replacing any existing file
///
/// Intermediate directories are created. A rename is used when both paths
/// are on the same filesystem; otherwise the file is copied next to the
/// destination first and renamed from there.
pub async fn relocate(staged: &Path, destination: &Path) -> io::Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).await?;
    }
    if fs::try_exists(destination).await? {
        ::log::debug!("Replacing existing file {}", destination.display());
        fs::remove_file(destination).await?;
    }

    match fs::rename(staged, destination).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            let mut partial = destination.as_os_str().to_owned();
            partial.push(".part");
            let partial = PathBuf::from(partial);
            fs::copy(staged, &partial).await?;
            fs::rename(&partial, destination).await?;
            fs::remove_file(staged).await
        }
        Err(e) => Err(e),
    }
}
