//
// config.rs
//
// Client settings for the workflow commands and compiler management
//

use std::path::PathBuf;

pub const DEFAULT_ASM_ARGUMENTS: &str = "-O0";
pub const DEFAULT_RUN_ARGUMENTS: &str = "--allow-caps=fs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AelysConfig {
    /// Arguments appended to `asm <file> --stdout`
    pub asm_default_arguments: String,
    /// Arguments placed before the script path when running a file
    pub run_arguments: String,
    /// Use this compiler binary instead of the managed install
    pub compiler_path: Option<PathBuf>,
    /// Where managed compiler binaries and `state.json` live
    pub storage_dir: Option<PathBuf>,
    pub check_updates_on_startup: bool,
}

impl Default for AelysConfig {
    fn default() -> Self {
        Self {
            asm_default_arguments: DEFAULT_ASM_ARGUMENTS.to_string(),
            run_arguments: DEFAULT_RUN_ARGUMENTS.to_string(),
            compiler_path: None,
            storage_dir: None,
            check_updates_on_startup: true,
        }
    }
}

/// Parse settings sent as `initializationOptions` or in
/// `workspace/didChangeConfiguration`.
///
/// Settings may be nested under an `aelys` section or given at the top
/// level. Keys read: `asm.defaultArguments`, `run.arguments`,
/// `compiler.path`, `compiler.storageDir`, `updates.checkOnStartup`. Absent
/// keys keep their defaults; empty paths count as absent.
///
/// Returns `None` when none of the known sections is present.
pub fn parse_config(settings: &serde_json::Value) -> Option<AelysConfig> {
    let root = settings.get("aelys").unwrap_or(settings);
    let asm = root.get("asm");
    let run = root.get("run");
    let compiler = root.get("compiler");
    let updates = root.get("updates");

    if asm.is_none() && run.is_none() && compiler.is_none() && updates.is_none() {
        return None;
    }

    let mut config = AelysConfig::default();

    if let Some(v) = asm
        .and_then(|s| s.get("defaultArguments"))
        .and_then(|v| v.as_str())
    {
        config.asm_default_arguments = v.to_string();
    }
    if let Some(v) = run.and_then(|s| s.get("arguments")).and_then(|v| v.as_str()) {
        config.run_arguments = v.to_string();
    }
    if let Some(compiler) = compiler {
        config.compiler_path = non_empty_path(compiler.get("path"));
        config.storage_dir = non_empty_path(compiler.get("storageDir"));
    }
    if let Some(v) = updates
        .and_then(|s| s.get("checkOnStartup"))
        .and_then(|v| v.as_bool())
    {
        config.check_updates_on_startup = v;
    }

    log::info!("Aelys configuration:");
    log::info!("  asm.defaultArguments: {:?}", config.asm_default_arguments);
    log::info!("  run.arguments: {:?}", config.run_arguments);
    log::info!("  compiler.path: {:?}", config.compiler_path);
    log::info!("  compiler.storageDir: {:?}", config.storage_dir);
    log::info!("  updates.checkOnStartup: {}", config.check_updates_on_startup);

    Some(config)
}

fn non_empty_path(value: Option<&serde_json::Value>) -> Option<PathBuf> {
    value
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}
