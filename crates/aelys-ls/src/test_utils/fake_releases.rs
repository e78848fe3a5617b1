//
// test_utils/fake_releases.rs
//
// In-memory release source
//

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::compiler::install::InstallError;
use crate::compiler::release::{Asset, Release, ReleaseSource};

/// Build a release whose assets download from a fake URL.
pub fn release(tag: &str, assets: &[&str]) -> Release {
    Release {
        tag_name: tag.to_string(),
        name: Some(format!("Aelys {}", tag)),
        published_at: Some("2025-01-01T00:00:00Z".to_string()),
        prerelease: false,
        assets: assets
            .iter()
            .map(|name| Asset {
                name: name.to_string(),
                browser_download_url: format!("https://example.invalid/{}/{}", tag, name),
            })
            .collect(),
    }
}

/// Releases listed newest first. `failing()` errors on every call.
pub struct FakeReleases {
    releases: Vec<Release>,
    fail: bool,
    downloads: AtomicUsize,
}

impl FakeReleases {
    pub fn new(releases: Vec<Release>) -> Self {
        Self {
            releases,
            fail: false,
            downloads: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), InstallError> {
        if self.fail {
            Err(InstallError::Network("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ReleaseSource for FakeReleases {
    async fn fetch_all(&self) -> Result<Vec<Release>, InstallError> {
        self.check()?;
        Ok(self.releases.clone())
    }

    async fn fetch_latest(&self) -> Result<Option<Release>, InstallError> {
        self.check()?;
        Ok(self.releases.first().cloned())
    }

    async fn fetch_tag(&self, tag: &str) -> Result<Option<Release>, InstallError> {
        self.check()?;
        Ok(self.releases.iter().find(|r| r.tag_name == tag).cloned())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, InstallError> {
        self.check()?;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(format!("#!/bin/sh\n# {}\n", url).into_bytes())
    }
}
