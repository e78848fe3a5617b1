//
// main.rs
//
// Entry point for the aelys-ls binary
//

use std::env;

use anyhow::bail;

const USAGE: &str = r#"
Usage: aelys-ls [OPTIONS]

Available options:

--stdio                      Start the LSP server using stdio transport
--version                    Print the version
--help                       Print this help message

Logging goes to stderr and is filtered with RUST_LOG (default: warn).
"#;

#[derive(Debug, PartialEq, Eq)]
enum Mode {
    Serve,
    Version,
    Usage,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Mode> {
    let mut mode = Mode::Usage;
    for arg in args {
        match arg.as_str() {
            "--stdio" => mode = Mode::Serve,
            "--version" => return Ok(Mode::Version),
            "--help" => return Ok(Mode::Usage),
            other => bail!("Unknown argument: '{other}'"),
        }
    }
    Ok(mode)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match parse_args(env::args().skip(1))? {
        Mode::Version => println!("aelys-ls {}", env!("CARGO_PKG_VERSION")),
        Mode::Usage => {
            println!(
                "aelys-ls {}, a language server for the Aelys scripting language.",
                env!("CARGO_PKG_VERSION")
            );
            print!("{}", USAGE);
        }
        Mode::Serve => {
            // stdout carries the protocol
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
                .target(env_logger::Target::Stderr)
                .init();
            log::info!("Starting aelys-ls {}", env!("CARGO_PKG_VERSION"));
            aelys_ls::backend::start_lsp().await?;
        }
    }
    Ok(())
}
