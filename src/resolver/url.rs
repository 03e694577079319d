// src/resolver/url.rs

//! Repository URL host filtering and normalization

use crate::error::{Error, Result};
use regex::Regex;

/// Accepts URLs under one hosting origin and truncates them to owner/repo
#[derive(Debug, Clone)]
pub struct HostFilter {
    prefix: String,
    owner_repo: Regex,
}

impl HostFilter {
    /// Build a filter for an origin such as `https://github.com/`
    pub fn new(prefix: &str) -> Result<Self> {
        let pattern = format!(r"^{}[^/?#]+/[^/?#]+", regex::escape(prefix));
        let owner_repo = Regex::new(&pattern)
            .map_err(|e| Error::PolicyError(format!("Invalid host prefix {prefix}: {e}")))?;
        Ok(Self {
            prefix: prefix.to_string(),
            owner_repo,
        })
    }

    /// Whether the URL is on the accepted host at all
    pub fn accepts(&self, url: &str) -> bool {
        url.starts_with(&self.prefix)
    }

    /// `origin/owner/repo` with everything after the repo segment dropped
    ///
    /// Returns `None` when the URL does not name both an owner and a repo.
    pub fn normalize(&self, url: &str) -> Option<String> {
        self.owner_repo.find(url).map(|m| m.as_str().to_string())
    }
}
