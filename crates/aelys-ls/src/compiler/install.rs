//
// compiler/install.rs
//
// Managed compiler installs: version resolution, download, startup update check
//

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::release::{Release, ReleaseSource, TargetPlatform, LATEST_TAG};
use super::storage::{binary_file_name, default_storage_dir, StateStore};
use crate::config::AelysConfig;
use crate::host::HostContext;

pub const INSTALL_LATEST: &str = "Install Latest";
pub const INSTALL_NOW: &str = "Install Now";
pub const UPDATE_NOW: &str = "Update Now";
pub const LATER: &str = "Later";

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("Your OS or Architecture is not supported by Aelys yet.")]
    UnsupportedPlatform,
    #[error("No releases found on GitHub.")]
    NoReleases,
    #[error("Binary {asset} not found for version {version}.")]
    AssetNotFound { asset: String, version: String },
    #[error("{0}")]
    Network(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Installation cancelled.")]
    Cancelled,
}

impl From<reqwest::Error> for InstallError {
    fn from(err: reqwest::Error) -> Self {
        InstallError::Network(err.to_string())
    }
}

/// Locates, installs and updates the compiler binary.
pub struct Toolchain {
    storage_dir: PathBuf,
    compiler_override: Option<PathBuf>,
    store: StateStore,
    source: Arc<dyn ReleaseSource>,
    platform: Option<TargetPlatform>,
}

impl Toolchain {
    pub fn new(storage_dir: PathBuf, source: Arc<dyn ReleaseSource>) -> Self {
        Self {
            store: StateStore::new(&storage_dir),
            storage_dir,
            compiler_override: None,
            source,
            platform: TargetPlatform::detect(),
        }
    }

    pub fn from_config(config: &AelysConfig, source: Arc<dyn ReleaseSource>) -> Self {
        let storage_dir = config
            .storage_dir
            .clone()
            .unwrap_or_else(default_storage_dir);
        let mut toolchain = Self::new(storage_dir, source);
        toolchain.compiler_override = config.compiler_path.clone();
        toolchain
    }

    pub fn with_platform(mut self, platform: Option<TargetPlatform>) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_compiler_override(mut self, path: Option<PathBuf>) -> Self {
        self.compiler_override = path;
        self
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn source(&self) -> &dyn ReleaseSource {
        self.source.as_ref()
    }

    pub fn managed_binary_path(&self) -> PathBuf {
        self.storage_dir.join(binary_file_name())
    }

    /// The configured compiler if any, else the managed install.
    pub fn binary_path(&self) -> PathBuf {
        self.compiler_override
            .clone()
            .unwrap_or_else(|| self.managed_binary_path())
    }

    pub async fn binary_exists(&self) -> bool {
        tokio::fs::metadata(self.binary_path())
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    pub async fn installed_version(&self) -> Option<String> {
        self.store.load().await.installed_version
    }

    async fn resolve_release(&self, tag: &str, asset: &str) -> Result<Release, InstallError> {
        if tag == LATEST_TAG {
            return self
                .source
                .fetch_latest()
                .await?
                .ok_or(InstallError::NoReleases);
        }
        self.source
            .fetch_tag(tag)
            .await?
            .ok_or_else(|| InstallError::AssetNotFound {
                asset: asset.to_string(),
                version: tag.to_string(),
            })
    }

    /// Download `tag` (or `latest`) into the storage directory and record it
    /// as installed. Returns the installed tag.
    ///
    /// Nothing is written until the release asset has been found and
    /// downloaded in full; the binary is replaced by rename.
    pub async fn install_version(
        &self,
        tag: &str,
        cancel: &CancellationToken,
    ) -> Result<String, InstallError> {
        let platform = self.platform.ok_or(InstallError::UnsupportedPlatform)?;
        let asset_name = platform.asset_name();

        let release = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(InstallError::Cancelled),
            release = self.resolve_release(tag, asset_name) => release?,
        };
        let asset = release
            .find_asset(asset_name)
            .ok_or_else(|| InstallError::AssetNotFound {
                asset: asset_name.to_string(),
                version: release.tag_name.clone(),
            })?;

        let bytes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(InstallError::Cancelled),
            bytes = self.source.download(&asset.browser_download_url) => bytes?,
        };

        let target = self.managed_binary_path();
        let partial = target.with_extension("download");
        tokio::fs::create_dir_all(&self.storage_dir).await?;
        if let Err(err) = write_executable(&partial, &bytes).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(err.into());
        }
        if let Err(err) = tokio::fs::rename(&partial, &target).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(err.into());
        }

        let installed = release.tag_name.clone();
        self.store
            .update(|state| {
                state.installed_version = Some(installed.clone());
                state.ignored_version = None;
            })
            .await
            .map_err(|e| InstallError::Io(std::io::Error::other(e.to_string())))?;

        log::info!("Installed Aelys {} at {}", installed, target.display());
        Ok(installed)
    }

    /// [`Self::install_version`] under a progress notification, reporting
    /// the outcome to the user.
    pub async fn install_with_progress(
        &self,
        ctx: &HostContext,
        tag: &str,
        cancel: &CancellationToken,
    ) -> Option<String> {
        let host = ctx.host();
        let progress = host
            .progress_begin(&format!("Aelys: Installing {}...", tag))
            .await;
        host.progress_report(&progress, &format!("Downloading {}...", tag))
            .await;

        let result = self.install_version(tag, cancel).await;
        host.progress_end(&progress, None).await;

        match result {
            Ok(installed) => {
                host.show_info(&format!("Aelys {} installed successfully!", installed))
                    .await;
                self.refresh_status(ctx).await;
                Some(installed)
            }
            Err(InstallError::Cancelled) => {
                log::info!("Install of {} cancelled", tag);
                None
            }
            Err(err) => {
                log::warn!("Install of {} failed: {}", tag, err);
                host.show_error(&format!("Failed to install Aelys: {}", err))
                    .await;
                None
            }
        }
    }

    pub async fn refresh_status(&self, ctx: &HostContext) {
        let text = if self.compiler_override.is_some() {
            "Aelys (custom)".to_string()
        } else {
            match self.installed_version().await {
                Some(version) => format!("Aelys {}", version),
                None => "Aelys: not installed".to_string(),
            }
        };
        ctx.set_status(&text).await;
    }

    /// Path to a usable binary, offering an install when it is missing.
    /// `None` when the user declines or the install fails.
    pub async fn ensure_binary(
        &self,
        ctx: &HostContext,
        cancel: &CancellationToken,
    ) -> Option<PathBuf> {
        if self.binary_exists().await {
            return Some(self.binary_path());
        }
        let choice = ctx
            .host()
            .prompt("Aelys executable not found.", &[INSTALL_NOW])
            .await;
        if choice.as_deref() != Some(INSTALL_NOW) {
            return None;
        }
        self.install_with_progress(ctx, LATEST_TAG, cancel).await?;
        self.binary_exists().await.then(|| self.binary_path())
    }

    /// Startup check: offer an install when the binary is missing, otherwise
    /// offer an update when a newer, non-ignored release exists. Network
    /// failures are only logged.
    pub async fn smart_update_check(&self, ctx: &HostContext, cancel: &CancellationToken) {
        if self.compiler_override.is_some() {
            log::info!("Custom compiler configured, skipping update check");
            return;
        }

        if !self.binary_exists().await {
            let choice = ctx
                .host()
                .prompt(
                    "Aelys executable is missing. Download it to run scripts?",
                    &[INSTALL_LATEST],
                )
                .await;
            if choice.as_deref() == Some(INSTALL_LATEST) {
                self.install_with_progress(ctx, LATEST_TAG, cancel).await;
            }
            return;
        }

        let latest = match self.source.fetch_latest().await {
            Ok(Some(release)) => release,
            Ok(None) => return,
            Err(err) => {
                log::info!("Update check skipped: {}", err);
                return;
            }
        };

        let state = self.store.load().await;
        let tag = latest.tag_name;
        if state.installed_version.as_deref() == Some(tag.as_str())
            || state.ignored_version.as_deref() == Some(tag.as_str())
        {
            return;
        }

        let choice = ctx
            .host()
            .prompt(
                &format!("A new version of Aelys is available ({}).", tag),
                &[UPDATE_NOW, LATER],
            )
            .await;
        match choice.as_deref() {
            Some(UPDATE_NOW) => {
                self.install_with_progress(ctx, &tag, cancel).await;
            }
            Some(LATER) => {
                if let Err(err) = self
                    .store
                    .update(|s| s.ignored_version = Some(tag.clone()))
                    .await
                {
                    log::warn!("Failed to persist ignored version: {}", err);
                }
            }
            _ => {}
        }
    }
}

async fn write_executable(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(path, bytes).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::storage::PersistedState;
    use crate::test_utils::{release, FakeReleases, HostEvent, RecordingHost};

    const LINUX_ASSET: &str = "aelys-x86_64-unknown-linux-gnu";

    fn toolchain(dir: &Path, source: Arc<FakeReleases>) -> Toolchain {
        Toolchain::new(dir.to_path_buf(), source).with_platform(Some(TargetPlatform::LinuxX64))
    }

    #[tokio::test]
    async fn test_install_latest_writes_binary_and_state() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(FakeReleases::new(vec![
            release("v0.3.0", &[LINUX_ASSET]),
            release("v0.2.0", &[LINUX_ASSET]),
        ]));
        let tc = toolchain(dir.path(), source.clone());

        let tag = tc
            .install_version(LATEST_TAG, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(tag, "v0.3.0");
        assert!(tc.binary_exists().await);
        assert_eq!(tc.installed_version().await.as_deref(), Some("v0.3.0"));
        assert!(!dir.path().join("aelys.download").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(tc.managed_binary_path())
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[tokio::test]
    async fn test_unknown_tag_names_asset_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = dir.path().join("storage");
        let source = Arc::new(FakeReleases::new(vec![release("v0.3.0", &[LINUX_ASSET])]));
        let tc = toolchain(&storage, source.clone());

        let err = tc
            .install_version("v9.9.9", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Binary aelys-x86_64-unknown-linux-gnu not found for version v9.9.9."
        );
        assert!(!storage.exists());
        assert_eq!(source.download_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_rename_removes_download() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(FakeReleases::new(vec![release("v0.3.0", &[LINUX_ASSET])]));
        let tc = toolchain(dir.path(), source.clone());

        // A directory in place of the binary makes the final rename fail
        let target = tc.managed_binary_path();
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("keep"), "x").unwrap();

        let err = tc
            .install_version(LATEST_TAG, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::Io(_)));
        assert_eq!(source.download_count(), 1);
        assert!(!target.with_extension("download").exists());
        assert_eq!(tc.installed_version().await, None);
    }

    #[tokio::test]
    async fn test_release_without_platform_asset() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(FakeReleases::new(vec![release(
            "v0.3.0",
            &["aelys-aarch64-apple-darwin"],
        )]));
        let tc = toolchain(dir.path(), source);
        let err = tc
            .install_version("v0.3.0", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::AssetNotFound { ref version, .. } if version == "v0.3.0"));
        assert!(!tc.managed_binary_path().exists());
    }

    #[tokio::test]
    async fn test_unsupported_platform_and_empty_releases() {
        let dir = tempfile::tempdir().unwrap();
        let tc = Toolchain::new(dir.path().to_path_buf(), Arc::new(FakeReleases::new(vec![])))
            .with_platform(None);
        let err = tc
            .install_version(LATEST_TAG, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Your OS or Architecture is not supported by Aelys yet."
        );

        let tc = toolchain(dir.path(), Arc::new(FakeReleases::new(vec![])));
        let err = tc
            .install_version(LATEST_TAG, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No releases found on GitHub.");
    }

    #[tokio::test]
    async fn test_cancelled_install() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(FakeReleases::new(vec![release("v0.3.0", &[LINUX_ASSET])]));
        let tc = toolchain(dir.path(), source);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = tc.install_version(LATEST_TAG, &cancel).await.unwrap_err();
        assert!(matches!(err, InstallError::Cancelled));
        assert!(!tc.managed_binary_path().exists());
    }

    #[tokio::test]
    async fn test_install_clears_ignored_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        store
            .save(&PersistedState {
                installed_version: None,
                ignored_version: Some("v0.3.0".into()),
            })
            .await
            .unwrap();
        let source = Arc::new(FakeReleases::new(vec![release("v0.3.0", &[LINUX_ASSET])]));
        toolchain(dir.path(), source)
            .install_version("v0.3.0", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(store.load().await.ignored_version, None);
    }

    #[tokio::test]
    async fn test_update_check_later_persists_ignored_version() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(FakeReleases::new(vec![
            release("v0.3.0", &[LINUX_ASSET]),
            release("v0.2.0", &[LINUX_ASSET]),
        ]));
        let tc = toolchain(dir.path(), source.clone());
        tc.install_version("v0.2.0", &CancellationToken::new())
            .await
            .unwrap();

        let host = Arc::new(RecordingHost::new().with_answers([Some(LATER)]));
        let ctx = HostContext::new(host.clone());
        tc.smart_update_check(&ctx, &CancellationToken::new()).await;

        assert!(host.events().contains(&HostEvent::Prompt(
            "A new version of Aelys is available (v0.3.0).".to_string()
        )));
        let state = StateStore::new(dir.path()).load().await;
        assert_eq!(state.ignored_version.as_deref(), Some("v0.3.0"));
        assert_eq!(state.installed_version.as_deref(), Some("v0.2.0"));

        // An ignored version is not offered again
        let host = Arc::new(RecordingHost::new());
        let ctx = HostContext::new(host.clone());
        tc.smart_update_check(&ctx, &CancellationToken::new()).await;
        assert!(host.events().is_empty());
    }

    #[tokio::test]
    async fn test_update_check_network_failure_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(binary_file_name()), b"bin").unwrap();
        let source = Arc::new(FakeReleases::failing());
        let tc = toolchain(dir.path(), source);
        let host = Arc::new(RecordingHost::new());
        tc.smart_update_check(&HostContext::new(host.clone()), &CancellationToken::new())
            .await;
        assert!(host.events().is_empty());
    }

    #[tokio::test]
    async fn test_missing_binary_offers_install() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(FakeReleases::new(vec![release("v0.3.0", &[LINUX_ASSET])]));
        let tc = toolchain(dir.path(), source);
        let host = Arc::new(RecordingHost::new().with_answers([Some(INSTALL_LATEST)]));
        let ctx = HostContext::new(host.clone());

        tc.smart_update_check(&ctx, &CancellationToken::new()).await;

        let events = host.events();
        assert!(events.contains(&HostEvent::Prompt(
            "Aelys executable is missing. Download it to run scripts?".to_string()
        )));
        assert!(events.contains(&HostEvent::Info(
            "Aelys v0.3.0 installed successfully!".to_string()
        )));
        assert_eq!(ctx.status().as_deref(), Some("Aelys v0.3.0"));
        assert!(tc.binary_exists().await);
    }

    #[tokio::test]
    async fn test_failed_install_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let tc = toolchain(dir.path(), Arc::new(FakeReleases::new(vec![])));
        let host = Arc::new(RecordingHost::new());
        let ctx = HostContext::new(host.clone());
        let result = tc
            .install_with_progress(&ctx, "v1.0.0", &CancellationToken::new())
            .await;
        assert!(result.is_none());
        assert!(host.events().contains(&HostEvent::Error(
            "Failed to install Aelys: Binary aelys-x86_64-unknown-linux-gnu not found for version v1.0.0."
                .to_string()
        )));
    }

    #[tokio::test]
    async fn test_compiler_override_wins() {
        let dir = tempfile::tempdir().unwrap();
        let custom = dir.path().join("my-aelys");
        std::fs::write(&custom, b"bin").unwrap();
        let tc = toolchain(dir.path(), Arc::new(FakeReleases::new(vec![])))
            .with_compiler_override(Some(custom.clone()));
        assert_eq!(tc.binary_path(), custom);
        assert!(tc.binary_exists().await);
    }
}
