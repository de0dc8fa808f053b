use url::{Position, Url};

/// Create the identity key of a link
///
/// Two links that only differ by fragment, query parameter order, or a
/// trailing slash map to the same key. Links that do not parse as URLs
/// are only trimmed.
pub fn normalize_link(link: &str) -> String {
    match Url::parse(link.trim()) {
        Ok(url) => normalize_url(url).to_string(),
        Err(_) => link.trim().to_string(),
    }
}

/// Normalize a parsed URL (fragment, query order, trailing slash)
pub fn normalize_url(url: Url) -> Url {
    let mut normalized = url;
    normalized.set_fragment(None);

    let mut pairs: Vec<(String, String)> = normalized
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        normalized.set_query(None);
    } else {
        pairs.sort();
        normalized.query_pairs_mut().clear().extend_pairs(pairs);
    }

    let path = normalized.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        normalized.set_path(if trimmed.is_empty() { "/" } else { trimmed });
    }

    normalized
}

/// Identity of a site used as its top-level directory, e.g. `host/path`
///
/// Unparseable links are returned unchanged. The result still has to be
/// sanitized before it is used as a directory name.
pub fn site_identity(site_link: &str) -> String {
    match Url::parse(site_link.trim()) {
        Ok(url) => {
            let url = normalize_url(url);
            url[Position::BeforeHost..Position::AfterPath].to_string()
        }
        Err(_) => site_link.trim().to_string(),
    }
}
