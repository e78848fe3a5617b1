//! Deterministic Aelys workspaces for benches and integration tests.
//!
//! Each generated file imports the next one in a chain, pulls in a few
//! standard modules and declares a mix of public and private functions.
//! Output is byte-identical for identical configurations.

use std::fmt::Write;
use std::path::Path;
use tempfile::TempDir;

#[derive(Debug, Clone)]
pub struct FixtureConfig {
    pub file_count: usize,
    pub functions_per_file: usize,
    /// Files `0..import_chain_depth` import `module_{i + 1}`
    pub import_chain_depth: usize,
    pub std_imports_per_file: usize,
    pub extra_lines_per_file: usize,
}

const STD_MODULES: &[&str] = &["math", "io", "string", "convert", "time", "fs"];

impl FixtureConfig {
    pub fn small() -> Self {
        Self {
            file_count: 10,
            functions_per_file: 5,
            import_chain_depth: 3,
            std_imports_per_file: 1,
            extra_lines_per_file: 5,
        }
    }

    pub fn medium() -> Self {
        Self {
            file_count: 50,
            functions_per_file: 10,
            import_chain_depth: 10,
            std_imports_per_file: 2,
            extra_lines_per_file: 10,
        }
    }
}

pub fn file_name(index: usize) -> String {
    format!("module_{}.aelys", index)
}

/// Source text of file `index`.
pub fn generate_file_content(index: usize, config: &FixtureConfig) -> String {
    let mut content = String::new();

    for i in 0..config.std_imports_per_file {
        let module = STD_MODULES[(index + i) % STD_MODULES.len()];
        let _ = writeln!(content, "needs std.{} as s{}", module, i);
    }
    if index < config.import_chain_depth && index + 1 < config.file_count {
        let _ = writeln!(content, "needs module_{} as next", index + 1);
    }
    content.push('\n');

    for f in 0..config.functions_per_file {
        // every third function stays private
        let public = f % 3 != 2;
        if public {
            let _ = writeln!(content, "// Computes value {} of module {}", f, index);
        }
        let _ = writeln!(
            content,
            "{}fn func_{}_{}(x: int, y: int) {{",
            if public { "pub " } else { "" },
            index,
            f
        );
        let _ = writeln!(content, "    let result = x + y * {}", f + 1);
        let _ = writeln!(content, "    if result > 100 {{ return 0 }}");
        let _ = writeln!(content, "    return result");
        let _ = writeln!(content, "}}");
        content.push('\n');
    }

    for line in 0..config.extra_lines_per_file {
        let _ = writeln!(content, "let mut var_{}_{} = {}", index, line, line + 1);
    }
    content
}

pub fn create_fixture_workspace(config: &FixtureConfig) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory for fixture workspace");
    write_fixture_workspace(temp_dir.path(), config);
    temp_dir
}

pub fn write_fixture_workspace(dir: &Path, config: &FixtureConfig) {
    for i in 0..config.file_count {
        let name = file_name(i);
        std::fs::write(dir.join(&name), generate_file_content(i, config))
            .unwrap_or_else(|e| panic!("Failed to write fixture file {}: {}", name, e));
    }
}
