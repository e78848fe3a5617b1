//
// compiler/release.rs
//
// GitHub release listing and asset download for the Aelys compiler
//

use async_trait::async_trait;
use serde::Deserialize;

use super::install::InstallError;

pub const RELEASES_URL: &str = "https://api.github.com/repos/vbxq/aelys_lang/releases";

/// Tag that selects the most recent release.
pub const LATEST_TAG: &str = "latest";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Asset {
    pub name: String,
    pub browser_download_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

impl Release {
    pub fn find_asset(&self, name: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.name == name)
    }

    /// One-line description used in the version picker.
    pub fn describe(&self) -> String {
        let date = self
            .published_at
            .as_deref()
            .and_then(|d| d.split('T').next())
            .unwrap_or("unknown date");
        if self.prerelease {
            format!("{} ({}, pre-release)", self.tag_name, date)
        } else {
            format!("{} ({})", self.tag_name, date)
        }
    }
}

/// Platforms that have a prebuilt compiler binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPlatform {
    WindowsX64,
    MacosArm64,
    MacosX64,
    LinuxX64,
}

impl TargetPlatform {
    /// Map `std::env::consts::{OS, ARCH}` values to a platform.
    pub fn from_os_arch(os: &str, arch: &str) -> Option<Self> {
        match (os, arch) {
            ("windows", "x86_64") => Some(Self::WindowsX64),
            ("macos", "aarch64") => Some(Self::MacosArm64),
            ("macos", "x86_64") => Some(Self::MacosX64),
            ("linux", "x86_64") => Some(Self::LinuxX64),
            _ => None,
        }
    }

    pub fn detect() -> Option<Self> {
        Self::from_os_arch(std::env::consts::OS, std::env::consts::ARCH)
    }

    pub fn asset_name(self) -> &'static str {
        match self {
            Self::WindowsX64 => "aelys-x86_64-pc-windows-msvc.exe",
            Self::MacosArm64 => "aelys-aarch64-apple-darwin",
            Self::MacosX64 => "aelys-x86_64-apple-darwin",
            Self::LinuxX64 => "aelys-x86_64-unknown-linux-gnu",
        }
    }
}

/// Where releases come from. Implemented over HTTP by [`ReleaseClient`].
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<Release>, InstallError>;

    /// The newest release, falling back to the first entry of the full list.
    async fn fetch_latest(&self) -> Result<Option<Release>, InstallError>;

    /// `None` when the tag does not exist.
    async fn fetch_tag(&self, tag: &str) -> Result<Option<Release>, InstallError>;

    async fn download(&self, url: &str) -> Result<Vec<u8>, InstallError>;
}

pub struct ReleaseClient {
    client: reqwest::Client,
    base_url: String,
}

impl Default for ReleaseClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleaseClient {
    pub fn new() -> Self {
        Self::with_base_url(RELEASES_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        // GitHub rejects API requests without a User-Agent
        let client = reqwest::Client::builder()
            .user_agent(concat!("aelys-ls/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<Option<T>, InstallError> {
        log::trace!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response.error_for_status()?.json::<T>().await?;
        Ok(Some(body))
    }
}

#[async_trait]
impl ReleaseSource for ReleaseClient {
    async fn fetch_all(&self) -> Result<Vec<Release>, InstallError> {
        Ok(self
            .get_json::<Vec<Release>>(&self.base_url)
            .await?
            .unwrap_or_default())
    }

    async fn fetch_latest(&self) -> Result<Option<Release>, InstallError> {
        let url = format!("{}/latest", self.base_url);
        match self.get_json::<Release>(&url).await {
            Ok(Some(release)) => Ok(Some(release)),
            Ok(None) | Err(_) => {
                log::info!("Latest release endpoint unavailable, using release list");
                Ok(self.fetch_all().await?.into_iter().next())
            }
        }
    }

    async fn fetch_tag(&self, tag: &str) -> Result<Option<Release>, InstallError> {
        let url = format!("{}/tags/{}", self.base_url, tag);
        self.get_json(&url).await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, InstallError> {
        log::info!("Downloading {}", url);
        let bytes = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}
