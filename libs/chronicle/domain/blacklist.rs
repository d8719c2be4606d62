//! Which pages may be tracked
//!
//! Only `http`/`https` pages are trackable, and never those whose host
//! contains a blacklisted entry.

use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blacklist {
    sites: Vec<String>,
}

impl Blacklist {
    pub fn new(sites: impl IntoIterator<Item = String>) -> Self {
        let mut blacklist = Self::default();
        blacklist.set(sites);
        blacklist
    }

    /// Replace the entries; blank entries are ignored
    pub fn set(&mut self, sites: impl IntoIterator<Item = String>) {
        self.sites = sites
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    pub fn sites(&self) -> &[String] {
        &self.sites
    }

    /// A missing URL counts as blacklisted; an unparseable one does not
    pub fn is_blacklisted(&self, url: Option<&str>) -> bool {
        let Some(url) = url.filter(|u| !u.is_empty()) else {
            return true;
        };

        match Url::parse(url) {
            Ok(parsed) => {
                let host = parsed.host_str().unwrap_or_default();
                let hit = self.sites.iter().any(|site| host.contains(site.as_str()));
                if hit {
                    debug!("Site is blacklisted: {}", url);
                }
                hit
            }
            Err(e) => {
                debug!("Could not parse {:?} for blacklist check: {}", url, e);
                false
            }
        }
    }

    /// Both checks at once
    pub fn is_trackable(&self, url: Option<&str>) -> bool {
        is_host_allowed(url) && !self.is_blacklisted(url)
    }
}

/// True for `http` and `https` URLs only
pub fn is_host_allowed(url: Option<&str>) -> bool {
    url.and_then(|u| Url::parse(u).ok())
        .is_some_and(|u| matches!(u.scheme(), "http" | "https"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blacklist(sites: &[&str]) -> Blacklist {
        Blacklist::new(sites.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_host_substring_match() {
        let bl = blacklist(&["facebook.com", "bank"]);

        assert!(bl.is_blacklisted(Some("https://www.facebook.com/feed")));
        assert!(bl.is_blacklisted(Some("https://mybank.example.org/login")));
        assert!(!bl.is_blacklisted(Some("https://example.com/facebook.com")));
    }

    #[test]
    fn test_missing_url_is_blacklisted() {
        let bl = blacklist(&[]);
        assert!(bl.is_blacklisted(None));
        assert!(bl.is_blacklisted(Some("")));
    }

    #[test]
    fn test_unparseable_url_passes_blacklist_but_not_host_check() {
        let bl = blacklist(&["example"]);
        assert!(!bl.is_blacklisted(Some("not a url")));
        assert!(!is_host_allowed(Some("not a url")));
        assert!(!bl.is_trackable(Some("not a url")));
    }

    #[test]
    fn test_only_http_and_https_allowed() {
        assert!(is_host_allowed(Some("http://example.com")));
        assert!(is_host_allowed(Some("https://example.com")));
        assert!(!is_host_allowed(Some("chrome://extensions")));
        assert!(!is_host_allowed(Some("file:///tmp/x.html")));
        assert!(!is_host_allowed(None));
    }

    #[test]
    fn test_blank_entries_ignored() {
        let bl = blacklist(&["", "  ", "ads"]);
        assert_eq!(bl.sites(), &["ads".to_string()]);
        assert!(bl.is_trackable(Some("https://example.com")));
    }
}
