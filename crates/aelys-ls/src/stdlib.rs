//
// stdlib.rs
//
// Built-in signature and hover tables for the Aelys standard library
//

use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;

use anyhow::bail;
use indexmap::IndexMap;

/// A dotted `module.name` key such as `math.clamp`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName(String);

impl QualifiedName {
    pub fn new(module: &str, name: &str) -> Self {
        Self(format!("{}.{}", module, name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Everything before the last dot.
    pub fn module(&self) -> &str {
        self.0.rsplit_once('.').map_or("", |(module, _)| module)
    }

    /// Segment after the last dot.
    pub fn name(&self) -> &str {
        self.0.rsplit_once('.').map_or(&self.0, |(_, name)| name)
    }
}

impl Borrow<str> for QualifiedName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDescriptor {
    pub label: String,
    pub documentation: Option<String>,
}

impl ParameterDescriptor {
    /// Documentation shown in signature help; `Parameter: <label>` when none
    /// was given.
    pub fn documentation_or_default(&self) -> String {
        self.documentation
            .clone()
            .unwrap_or_else(|| format!("Parameter: {}", self.label))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StdlibEntry {
    pub name: QualifiedName,
    /// `math.clamp(x, min, max)`
    pub label: String,
    pub parameters: Vec<ParameterDescriptor>,
    pub returns: Option<String>,
    pub documentation: String,
}

impl StdlibEntry {
    /// Markdown used for hover: fenced signature then prose.
    pub fn hover_markdown(&self) -> String {
        let returns = self
            .returns
            .as_deref()
            .map(|r| format!(" -> {}", r))
            .unwrap_or_default();
        format!("```rust\n{}{}\n```\n{}", self.label, returns, self.documentation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StdlibConstant {
    pub name: QualifiedName,
    pub value: &'static str,
}

impl StdlibConstant {
    pub fn hover_markdown(&self) -> String {
        format!("```rust\n{}\n```\n{}", self.name, self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute {
    /// Including the `@`
    pub name: &'static str,
    pub documentation: &'static str,
}

// Static table rows

#[derive(Debug, Clone, Copy)]
pub struct FunctionSpec {
    pub module: &'static str,
    pub name: &'static str,
    pub params: &'static [&'static str],
    /// Positional parameter docs; may be shorter than `params`
    pub param_docs: &'static [&'static str],
    pub returns: Option<&'static str>,
    pub doc: &'static str,
}

impl FunctionSpec {
    const fn with_param_docs(self, param_docs: &'static [&'static str]) -> Self {
        Self { param_docs, ..self }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConstantSpec {
    pub module: &'static str,
    pub name: &'static str,
    pub value: &'static str,
}

const fn f(
    module: &'static str,
    name: &'static str,
    params: &'static [&'static str],
    returns: Option<&'static str>,
    doc: &'static str,
) -> FunctionSpec {
    FunctionSpec {
        module,
        name,
        params,
        param_docs: &[],
        returns,
        doc,
    }
}

pub static ATTRIBUTES: &[Attribute] = &[
    Attribute {
        name: "@no_gc",
        documentation: "### Attribute: `@no_gc`\n---\nSuspends the Garbage Collector for the duration of this function.\n\n**Usage:** Provides access to manual memory primitives like `alloc`, `store`, `load`, and `free` (Value-based) or `std.bytes` (Byte-based). Useful for real-time graphics, audio, or performance-critical loops.",
    },
    Attribute {
        name: "@inline",
        documentation: "### Attribute: `@inline`\n---\nHint to the compiler to substitute the function body at the call site. Respects code size thresholds.",
    },
    Attribute {
        name: "@inline_always",
        documentation: "### Attribute: `@inline_always`\n---\nForces the compiler to inline this function regardless of size. Use with caution.",
    },
];

pub static CONSTANTS: &[ConstantSpec] = &[
    ConstantSpec {
        module: "math",
        name: "PI",
        value: "3.141592653589793",
    },
    ConstantSpec {
        module: "math",
        name: "TAU",
        value: "6.283185307179586 (2π)",
    },
];

#[rustfmt::skip]
pub static FUNCTIONS: &[FunctionSpec] = &[
    // io
    f("io", "print", &["value"], None, "Prints value to stdout followed by a newline.")
        .with_param_docs(&["The value to print to the console."]),
    f("io", "println", &["value"], None,
        "Alias for `print`. Prints value followed by a newline."),
    f("io", "print_inline", &["value"], None, "Prints value without a newline."),
    f("io", "eprint", &["value"], None, "Prints value to stderr without a newline."),
    f("io", "eprintln", &["value"], None, "Prints value to stderr with a newline."),
    f("io", "flush", &[], None, "Flushes the stdout buffer."),
    f("io", "eflush", &[], None, "Flushes the stderr buffer."),
    f("io", "readline", &[], Some("string | null"),
        "Reads a line from stdin. Returns `null` on EOF."),
    f("io", "read_char", &[], Some("string"), "Reads a single character from stdin."),
    f("io", "input", &["prompt"], Some("string"),
        "Prints prompt, flushes, and reads a line from stdin."),
    f("io", "clear_screen", &[], None, "Clears the terminal using ANSI escape sequences."),
    f("io", "cursor_home", &[], None, "Moves terminal cursor to top-left."),
    f("io", "move_cursor", &["x", "y"], None, "Moves cursor to position (1-indexed)."),
    // math
    f("math", "abs", &["x"], None, "Returns the absolute value of `x`."),
    f("math", "sqrt", &["x"], None, "Returns the square root of `x`."),
    f("math", "pow", &["base", "exp"], None, "Returns `base` raised to the power `exp`.")
        .with_param_docs(&["The base number.", "The exponent."]),
    f("math", "clamp", &["x", "min", "max"], None, "Clamps `x` between `min` and `max`.")
        .with_param_docs(&["The value to clamp.", "The lower bound.", "The upper bound."]),
    f("math", "randint", &["min", "max"], None,
        "Returns a random integer in range [min, max] inclusive."),
    f("math", "sin", &["rad"], None, "Sine (radians)."),
    f("math", "cos", &["rad"], None, "Cosine (radians)."),
    f("math", "atan2", &["y", "x"], None, "Two-argument arc tangent."),
    // string
    f("string", "len", &["s"], Some("int"),
        "Returns the length of string `s` in **bytes**."),
    f("string", "char_len", &["s"], Some("int"),
        "Returns the length of string `s` in **Unicode characters**."),
    f("string", "char_at", &["s", "i"], Some("string"),
        "Returns character at index `i` (empty if out of bounds)."),
    f("string", "substr", &["s", "start", "len"], Some("string"),
        "Extracts substring starting at char position `start`."),
    f("string", "contains", &["s", "needle"], Some("bool"),
        "Checks if `s` contains `needle`."),
    f("string", "split", &["s", "sep"], Some("string"),
        "Splits `s` by `sep`. Returns newline-separated strings."),
    f("string", "join", &["parts", "sep"], Some("string"),
        "Joins newline-separated `parts` with `sep`."),
    // convert
    f("convert", "parse_int", &["s"], Some("int | null"),
        "Parses string to int. Supports `0x`, `0o`, `0b` prefixes."),
    f("convert", "to_string", &["x"], Some("string"),
        "Converts any value to its string representation."),
    f("convert", "to_hex", &["n"], Some("string"),
        "Converts integer `n` to a hexadecimal string."),
    f("convert", "ord", &["char"], Some("int"),
        "Returns the Unicode code point of a character."),
    f("convert", "chr", &["code"], Some("string"),
        "Returns character from Unicode code point."),
    f("convert", "type_of", &["x"], Some("string"),
        "Returns the type name as string (\"int\", \"string\", etc.)."),
    // time
    f("time", "now", &[], Some("float"), "Unix timestamp in seconds."),
    f("time", "timer", &[], Some("handle"), "Creates a high-precision timer handle."),
    f("time", "elapsed_ms", &["h"], Some("float"),
        "Milliseconds since timer `h` was created."),
    f("time", "sleep", &["ms"], None, "Suspends execution for `ms` milliseconds."),
    f("time", "iso", &[], Some("string"), "Returns current time in ISO 8601 format."),
    // fs
    f("fs", "read_text", &["path"], Some("string"),
        "Reads entire file as string. **Requires `--allow-caps=fs`**."),
    f("fs", "write_text", &["path", "content"], None,
        "Writes string to file (overwrites). **Requires `--allow-caps=fs`**."),
    f("fs", "exists", &["path"], Some("bool"), "Checks if path exists."),
    f("fs", "readdir", &["path"], Some("string"),
        "Lists directory contents as newline-separated string."),
    // net
    f("net", "connect", &["host", "port"], Some("handle"),
        "Connects to TCP server. **Requires `--allow-caps=net`**."),
    f("net", "listen", &["host", "port"], Some("handle"),
        "Starts TCP server listening on port. **Requires `--allow-caps=net`**."),
    f("net", "send", &["handle", "data"], None, "Sends string data over socket."),
    f("net", "recv_line", &["handle"], Some("string"), "Receives one line from socket."),
    // bytes
    f("bytes", "alloc", &["size"], Some("handle"),
        "Allocates `size` bytes. Manual memory, must be `free`'d."),
    f("bytes", "read_u16", &["buf", "offset"], Some("int"),
        "Reads 16-bit unsigned int (little-endian)."),
    f("bytes", "write_u16", &["buf", "offset", "value"], None,
        "Writes 16-bit unsigned int (little-endian)."),
    f("bytes", "decode", &["buf", "offset", "len"], Some("string"),
        "Decodes UTF-8 bytes from buffer to string."),
    // sys
    f("sys", "platform", &[], Some("string"),
        "Returns OS name (\"linux\", \"macos\", \"windows\")."),
    f("sys", "arch", &[], Some("string"),
        "Returns CPU architecture (\"x86_64\", \"aarch64\")."),
];

/// Signature, constant and hover tables. Built once at startup and shared
/// read-only.
#[derive(Debug, Clone, Default)]
pub struct StandardLibrary {
    signatures: IndexMap<QualifiedName, StdlibEntry>,
    constants: IndexMap<QualifiedName, StdlibConstant>,
    /// Bare word (or `@attribute`) to markdown
    hover_docs: IndexMap<String, String>,
    attributes: Vec<Attribute>,
}

impl StandardLibrary {
    /// The tables shipped with the server.
    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_tables(FUNCTIONS, CONSTANTS, ATTRIBUTES)
    }

    /// Build the tables, failing on a duplicate qualified name or attribute.
    pub fn from_tables(
        functions: &[FunctionSpec],
        constants: &[ConstantSpec],
        attributes: &[Attribute],
    ) -> anyhow::Result<Self> {
        Self::validate(functions, constants, attributes)?;

        let mut lib = Self {
            attributes: attributes.to_vec(),
            ..Self::default()
        };

        for attr in attributes {
            lib.hover_docs
                .insert(attr.name.to_string(), attr.documentation.to_string());
        }

        for spec in functions {
            let name = QualifiedName::new(spec.module, spec.name);
            let entry = StdlibEntry {
                label: format!("{}({})", name, spec.params.join(", ")),
                parameters: spec
                    .params
                    .iter()
                    .enumerate()
                    .map(|(i, label)| ParameterDescriptor {
                        label: label.to_string(),
                        documentation: spec.param_docs.get(i).map(|d| d.to_string()),
                    })
                    .collect(),
                returns: spec.returns.map(str::to_string),
                documentation: spec.doc.to_string(),
                name: name.clone(),
            };
            // Bare names shared by two modules keep the first module's doc
            lib.hover_docs
                .entry(spec.name.to_string())
                .or_insert_with(|| entry.hover_markdown());
            lib.signatures.insert(name, entry);
        }

        for spec in constants {
            let constant = StdlibConstant {
                name: QualifiedName::new(spec.module, spec.name),
                value: spec.value,
            };
            lib.hover_docs
                .entry(spec.name.to_string())
                .or_insert_with(|| constant.hover_markdown());
            lib.constants.insert(constant.name.clone(), constant);
        }

        log::trace!(
            "Standard library: {} functions, {} constants, {} hover docs",
            lib.signatures.len(),
            lib.constants.len(),
            lib.hover_docs.len()
        );
        Ok(lib)
    }

    /// Reject tables that define the same key twice.
    pub fn validate(
        functions: &[FunctionSpec],
        constants: &[ConstantSpec],
        attributes: &[Attribute],
    ) -> anyhow::Result<()> {
        let mut seen = HashSet::new();
        let keys = functions
            .iter()
            .map(|f| format!("{}.{}", f.module, f.name))
            .chain(constants.iter().map(|c| format!("{}.{}", c.module, c.name)))
            .chain(attributes.iter().map(|a| a.name.to_string()));
        for key in keys {
            if !seen.insert(key.clone()) {
                bail!("duplicate standard library entry '{}'", key);
            }
        }
        Ok(())
    }

    pub fn get(&self, qualified: &str) -> Option<&StdlibEntry> {
        self.signatures.get(qualified)
    }

    /// All function entries in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = &StdlibEntry> {
        self.signatures.values()
    }

    /// First function (in declaration order) whose last segment is `bare`.
    pub fn find_by_suffix(&self, bare: &str) -> Option<&StdlibEntry> {
        self.signatures.values().find(|e| e.name.name() == bare)
    }

    /// Functions of `module` (without the `std.` root), in declaration order.
    pub fn module_entries<'a>(&'a self, module: &'a str) -> impl Iterator<Item = &'a StdlibEntry> {
        self.signatures
            .values()
            .filter(move |e| e.name.module() == module)
    }

    pub fn module_constants<'a>(
        &'a self,
        module: &'a str,
    ) -> impl Iterator<Item = &'a StdlibConstant> {
        self.constants
            .values()
            .filter(move |c| c.name.module() == module)
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn hover_doc(&self, word: &str) -> Option<&str> {
        self.hover_docs.get(word).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables_validate() {
        assert!(StandardLibrary::validate(FUNCTIONS, CONSTANTS, ATTRIBUTES).is_ok());
        let lib = StandardLibrary::builtin().unwrap();
        assert!(lib.get("math.clamp").is_some());
        assert!(lib.get("io.print").is_some());
        assert!(lib.get("std.math.clamp").is_none());
    }

    #[test]
    fn test_duplicate_key_is_named() {
        let dup = [
            f("math", "abs", &[], None, "a"),
            f("math", "abs", &[], None, "b"),
        ];
        let err = StandardLibrary::from_tables(&dup, &[], &[]).unwrap_err();
        assert!(err.to_string().contains("math.abs"));
    }

    #[test]
    fn test_clamp_signature() {
        let lib = StandardLibrary::builtin().unwrap();
        let clamp = lib.get("math.clamp").unwrap();
        assert_eq!(clamp.label, "math.clamp(x, min, max)");
        assert_eq!(clamp.parameters.len(), 3);
        assert_eq!(clamp.name.module(), "math");
        assert_eq!(clamp.name.name(), "clamp");
    }

    #[test]
    fn test_parameter_doc_default() {
        let lib = StandardLibrary::builtin().unwrap();
        let substr = lib.get("string.substr").unwrap();
        assert_eq!(substr.parameters[1].documentation_or_default(), "Parameter: start");
        let pow = lib.get("math.pow").unwrap();
        assert_eq!(pow.parameters[1].documentation_or_default(), "The exponent.");
    }

    #[test]
    fn test_find_by_suffix_uses_declaration_order() {
        let lib = StandardLibrary::builtin().unwrap();
        assert_eq!(lib.find_by_suffix("print").unwrap().name.as_str(), "io.print");
        assert_eq!(lib.find_by_suffix("clamp").unwrap().name.as_str(), "math.clamp");
        assert!(lib.find_by_suffix("nonexistent").is_none());
    }

    #[test]
    fn test_module_entries() {
        let lib = StandardLibrary::builtin().unwrap();
        let names: Vec<_> = lib.module_entries("sys").map(|e| e.name.name()).collect();
        assert_eq!(names, vec!["platform", "arch"]);
        let consts: Vec<_> = lib.module_constants("math").map(|c| c.name.name()).collect();
        assert_eq!(consts, vec!["PI", "TAU"]);
    }

    #[test]
    fn test_hover_docs() {
        let lib = StandardLibrary::builtin().unwrap();
        assert!(lib.hover_doc("@no_gc").unwrap().contains("Garbage Collector"));
        assert_eq!(
            lib.hover_doc("readline").unwrap(),
            "```rust\nio.readline() -> string | null\n```\nReads a line from stdin. Returns `null` on EOF."
        );
        assert!(lib.hover_doc("PI").unwrap().contains("3.14159"));
        assert!(lib.hover_doc("unknown").is_none());
        assert_eq!(lib.attributes().len(), 3);
    }
}
