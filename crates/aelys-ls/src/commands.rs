//
// commands.rs
//
// `workspace/executeCommand` handlers: run, ASM inspection, REPL, compiler
// version management
//

use std::path::PathBuf;

use anyhow::{bail, Result};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::compiler::subprocess::{repl_command_line, run_command_line};
use crate::compiler::{AelysCompiler, Toolchain, LATEST_TAG};
use crate::config::AelysConfig;
use crate::host::{HostContext, OUTPUT_TERMINAL, REPL_TERMINAL};

pub const RUN: &str = "aelys.run";
pub const INSPECT_BYTECODE: &str = "aelys.inspectBytecode";
pub const INSPECT_BYTECODE_WITH_ARGS: &str = "aelys.inspectBytecodeWithArgs";
pub const OPEN_REPL: &str = "aelys.openRepl";
pub const SEND_TO_REPL: &str = "aelys.sendToRepl";
pub const UPDATE: &str = "aelys.update";
pub const INSTALL_VERSION: &str = "aelys.installVersion";
pub const REFRESH_STATUS: &str = "aelys.refreshStatus";

/// Advertised in `executeCommandProvider`.
pub const ALL_COMMANDS: &[&str] = &[
    RUN,
    INSPECT_BYTECODE,
    INSPECT_BYTECODE_WITH_ARGS,
    OPEN_REPL,
    SEND_TO_REPL,
    UPDATE,
    INSTALL_VERSION,
    REFRESH_STATUS,
];

const AELYS_EXTENSIONS: &[&str] = &["aelys", "ae"];

const ASM_ARGS_PROMPT: &str = "Enter ASM generation arguments (e.g., -O3 -Wall)";

/// Everything a command needs, borrowed from the backend for one call.
pub struct CommandContext<'a> {
    pub host: &'a HostContext,
    pub toolchain: &'a Toolchain,
    pub config: &'a AelysConfig,
    pub cancel: &'a CancellationToken,
    /// Terminal lines use the PowerShell call operator
    pub windows: bool,
}

pub async fn execute(ctx: &CommandContext<'_>, command: &str, args: &[Value]) -> Result<Option<Value>> {
    log::info!("Executing {} with {} argument(s)", command, args.len());
    match command {
        RUN => run(ctx, string_arg(args, 0)).await,
        INSPECT_BYTECODE => {
            let default_args = ctx.config.asm_default_arguments.clone();
            inspect_bytecode(ctx, string_arg(args, 0), &default_args).await
        }
        INSPECT_BYTECODE_WITH_ARGS => {
            let asm_args = match string_arg(args, 1) {
                Some(explicit) => Some(explicit.to_string()),
                None => {
                    ctx.host
                        .host()
                        .input(ASM_ARGS_PROMPT, &ctx.config.asm_default_arguments)
                        .await
                }
            };
            if let Some(asm_args) = asm_args {
                inspect_bytecode(ctx, string_arg(args, 0), &asm_args).await;
            }
        }
        OPEN_REPL => open_repl(ctx).await,
        SEND_TO_REPL => send_to_repl(ctx, string_arg(args, 0).unwrap_or_default()).await,
        UPDATE => {
            let installed = ctx
                .toolchain
                .install_with_progress(ctx.host, LATEST_TAG, ctx.cancel)
                .await;
            return Ok(installed.map(Value::String));
        }
        INSTALL_VERSION => {
            let installed = install_version(ctx, string_arg(args, 0)).await;
            return Ok(installed.map(Value::String));
        }
        REFRESH_STATUS => ctx.toolchain.refresh_status(ctx.host).await,
        other => bail!("Unknown command: {}", other),
    }
    Ok(None)
}

fn string_arg(args: &[Value], index: usize) -> Option<&str> {
    args.get(index).and_then(Value::as_str)
}

/// Path of an Aelys source file named by a `file:` URI argument.
fn aelys_file(uri: Option<&str>) -> Option<PathBuf> {
    let path = Url::parse(uri?).ok()?.to_file_path().ok()?;
    let ext = path.extension()?.to_str()?;
    AELYS_EXTENSIONS.contains(&ext).then_some(path)
}

async fn require_file(ctx: &CommandContext<'_>, uri: Option<&str>) -> Option<PathBuf> {
    let file = aelys_file(uri);
    if file.is_none() {
        ctx.host.host().show_error("Open an Aelys file to run it.").await;
    }
    file
}

async fn run(ctx: &CommandContext<'_>, uri: Option<&str>) {
    let Some(file) = require_file(ctx, uri).await else {
        return;
    };
    let Some(binary) = ctx.toolchain.ensure_binary(ctx.host, ctx.cancel).await else {
        return;
    };
    let line = run_command_line(&binary, &ctx.config.run_arguments, &file, ctx.windows);
    ctx.host.send_to_terminal(OUTPUT_TERMINAL, &line, true).await;
}

async fn inspect_bytecode(ctx: &CommandContext<'_>, uri: Option<&str>, asm_args: &str) {
    let Some(file) = require_file(ctx, uri).await else {
        return;
    };
    let Some(binary) = ctx.toolchain.ensure_binary(ctx.host, ctx.cancel).await else {
        return;
    };

    let host = ctx.host.host();
    let progress = host
        .progress_begin(&format!("Aelys: Generating ASM ({})...", asm_args))
        .await;
    let result = AelysCompiler::new(binary)
        .asm(&file, asm_args, ctx.cancel)
        .await;
    host.progress_end(&progress, None).await;

    match result {
        Ok(asm) => host.show_read_only(&asm, "aelys").await,
        Err(err) => {
            log::warn!("ASM generation failed for {}: {}", file.display(), err);
            host.show_error(&format!("ASM Error: {}", err)).await;
        }
    }
}

async fn open_repl(ctx: &CommandContext<'_>) {
    let Some(binary) = ctx.toolchain.ensure_binary(ctx.host, ctx.cancel).await else {
        return;
    };
    let line = repl_command_line(&binary, ctx.windows);
    ctx.host.send_to_terminal(REPL_TERMINAL, &line, true).await;
}

async fn send_to_repl(ctx: &CommandContext<'_>, text: &str) {
    if text.is_empty() {
        ctx.host
            .host()
            .show_warning("No text selected to send to REPL.")
            .await;
        return;
    }
    ctx.host.send_to_terminal(REPL_TERMINAL, text, false).await;
}

async fn install_version(ctx: &CommandContext<'_>, tag: Option<&str>) -> Option<String> {
    if let Some(tag) = tag {
        return ctx
            .toolchain
            .install_with_progress(ctx.host, tag, ctx.cancel)
            .await;
    }

    let host = ctx.host.host();
    let releases = match ctx.toolchain.source().fetch_all().await {
        Ok(releases) if releases.is_empty() => {
            host.show_error("No releases found on GitHub.").await;
            return None;
        }
        Ok(releases) => releases,
        Err(err) => {
            host.show_error(&format!("Failed to install Aelys: {}", err))
                .await;
            return None;
        }
    };

    let labels: Vec<String> = releases.iter().map(|r| r.describe()).collect();
    let picked = host.pick("Select Aelys version to install", &labels).await?;
    let release = releases.iter().find(|r| r.describe() == picked)?;
    ctx.toolchain
        .install_with_progress(ctx.host, &release.tag_name, ctx.cancel)
        .await
}
