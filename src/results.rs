use serde::{Deserialize, Serialize};
use std::fmt;

/// Level of a node in the site → album → picture hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Site,
    Album,
    Picture,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Site => "site",
            NodeKind::Album => "album",
            NodeKind::Picture => "picture",
        };
        f.write_str(name)
    }
}

/// Successful result of processing one node
///
/// Failures are carried by `crate::Error`, which tells retryable and
/// fatal failures apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOutcome {
    /// The node was processed and marked completed
    Completed,
    /// The node was already completed in an earlier session
    Skipped,
    /// An album with no pictures, marked completed
    Empty,
}

/// Counters accumulated over a crawl
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub sites_completed: usize,
    pub sites_skipped: usize,
    pub albums_completed: usize,
    pub albums_skipped: usize,
    pub albums_empty: usize,
    pub pictures_downloaded: usize,
    pub pictures_skipped: usize,
}

impl CrawlSummary {
    /// Count the outcome of a single node
    pub fn record(&mut self, kind: NodeKind, outcome: NodeOutcome) {
        match (kind, outcome) {
            (NodeKind::Site, NodeOutcome::Skipped) => self.sites_skipped += 1,
            (NodeKind::Site, _) => self.sites_completed += 1,
            (NodeKind::Album, NodeOutcome::Completed) => self.albums_completed += 1,
            (NodeKind::Album, NodeOutcome::Skipped) => self.albums_skipped += 1,
            (NodeKind::Album, NodeOutcome::Empty) => {
                self.albums_completed += 1;
                self.albums_empty += 1;
            }
            (NodeKind::Picture, NodeOutcome::Skipped) => self.pictures_skipped += 1,
            (NodeKind::Picture, _) => self.pictures_downloaded += 1,
        }
    }

    /// Add the counters of another summary to this one
    pub fn merge(&mut self, other: &CrawlSummary) {
        self.sites_completed += other.sites_completed;
        self.sites_skipped += other.sites_skipped;
        self.albums_completed += other.albums_completed;
        self.albums_skipped += other.albums_skipped;
        self.albums_empty += other.albums_empty;
        self.pictures_downloaded += other.pictures_downloaded;
        self.pictures_skipped += other.pictures_skipped;
    }
}

impl fmt::Display for CrawlSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sites {} done / {} skipped, albums {} done ({} empty) / {} skipped, pictures {} downloaded / {} skipped",
            self.sites_completed,
            self.sites_skipped,
            self.albums_completed,
            self.albums_empty,
            self.albums_skipped,
            self.pictures_downloaded,
            self.pictures_skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_merge() {
        let mut album = CrawlSummary::default();
        album.record(NodeKind::Picture, NodeOutcome::Completed);
        album.record(NodeKind::Picture, NodeOutcome::Skipped);
        album.record(NodeKind::Album, NodeOutcome::Completed);

        let mut site = CrawlSummary::default();
        site.record(NodeKind::Album, NodeOutcome::Empty);
        site.merge(&album);
        site.record(NodeKind::Site, NodeOutcome::Completed);

        assert_eq!(site.sites_completed, 1);
        assert_eq!(site.albums_completed, 2);
        assert_eq!(site.albums_empty, 1);
        assert_eq!(site.pictures_downloaded, 1);
        assert_eq!(site.pictures_skipped, 1);
    }
}
