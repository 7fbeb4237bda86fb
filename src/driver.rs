//! Orchestrates the read -> parse -> lower -> emit -> link pipeline.
//!
//! Mirrors the clang-version gate and embedded-runtime-linking shape this
//! codebase has always used for turning rendered LLVM-IR text into a native
//! executable; `lowering.rs` and `ir.rs` never touch the filesystem or a
//! subprocess themselves; this is the one module that does.

use std::fmt;
use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;

use tracing::{debug, instrument};

use crate::codegen::Compiler;
use crate::config::CompilerConfig;
use crate::diagnostics::Diagnostic;
use crate::ir::{IrBuilder, LlvmTextBuilder};
use crate::parser::Parser;

/// Our generated IR uses opaque pointers (`ptr`), which requires LLVM 15+.
const MIN_CLANG_VERSION: u32 = 15;

static CLANG_VERSION_CHECKED: OnceLock<Result<u32, String>> = OnceLock::new();

/// The embedded native runtime, built from `runtime/anx_rt.c` by `build.rs`.
static RUNTIME_LIB: &[u8] = include_bytes!(env!("ANX_RUNTIME_LIB_PATH"));

#[derive(Debug)]
pub enum DriverError {
    Io(String),
    Diagnostic(Diagnostic),
    Clang(String),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::Io(msg) => write!(f, "{msg}"),
            DriverError::Diagnostic(d) => write!(f, "{d}"),
            DriverError::Clang(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for DriverError {}

impl From<Diagnostic> for DriverError {
    fn from(d: Diagnostic) -> Self {
        DriverError::Diagnostic(d)
    }
}

/// Checks that `clang` is available and meets the minimum version this
/// backend requires. The check runs once per process and the result is
/// cached, since every compilation in a batch (e.g. a test runner) pays the
/// same subprocess cost otherwise.
fn check_clang_version() -> Result<u32, String> {
    CLANG_VERSION_CHECKED
        .get_or_init(|| {
            let output = Command::new("clang").arg("--version").output().map_err(|e| {
                format!(
                    "failed to run clang: {e}. Please install clang {MIN_CLANG_VERSION} or later."
                )
            })?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(format!(
                    "clang --version failed with exit code {:?}: {stderr}",
                    output.status.code()
                ));
            }
            let version_str = String::from_utf8_lossy(&output.stdout);
            let version = parse_clang_version(&version_str).ok_or_else(|| {
                format!(
                    "could not parse clang version from: {}",
                    version_str.lines().next().unwrap_or(&version_str)
                )
            })?;
            let is_apple = version_str.contains("Apple clang");
            let effective_min = if is_apple { 14 } else { MIN_CLANG_VERSION };
            if version < effective_min {
                return Err(format!(
                    "clang version {version} detected, but anxc requires {} {effective_min} or later \
                     (generated IR uses opaque pointers, which need LLVM 15+)",
                    if is_apple { "Apple clang" } else { "clang" }
                ));
            }
            Ok(version)
        })
        .clone()
}

fn parse_clang_version(output: &str) -> Option<u32> {
    for line in output.lines() {
        if line.contains("clang version")
            && let Some(idx) = line.find("version ")
        {
            let after_version = &line[idx + 8..];
            let major: String = after_version.chars().take_while(|c| c.is_ascii_digit()).collect();
            if !major.is_empty() {
                return major.parse().ok();
            }
        }
    }
    None
}

/// Lexes, parses, and lowers `source`, returning the rendered LLVM-IR text
/// without invoking `clang`. This is steps 1-3 of the pipeline, and the
/// entry point `--emit-ir-only` and the in-process integration tests use.
#[instrument(skip_all)]
pub fn render_ir(source: &str, config: &CompilerConfig) -> Result<String, Diagnostic> {
    let program = {
        let mut parser = Parser::new(source)?;
        debug!("parsing source");
        parser.parse_program()?
    };
    let mut builder = LlvmTextBuilder::new();
    {
        debug!("lowering AST to IR");
        let mut compiler = Compiler::new(&mut builder, config);
        compiler.lower_program(&program)?;
    }
    Ok(builder.render())
}

/// Compiles a `.anx` source file to a native executable using default
/// configuration.
pub fn compile_file(source_path: &Path, output_path: &Path, keep_ir: bool) -> Result<(), DriverError> {
    compile_file_with_config(source_path, output_path, keep_ir, &CompilerConfig::default())
}

/// Compiles a `.anx` source file to a native executable, extending the
/// built-in intrinsic table with whatever the host registered in `config`.
#[instrument(skip(config))]
pub fn compile_file_with_config(
    source_path: &Path,
    output_path: &Path,
    keep_ir: bool,
    config: &CompilerConfig,
) -> Result<(), DriverError> {
    debug!(path = %source_path.display(), "reading source file");
    let source = fs::read_to_string(source_path)
        .map_err(|e| DriverError::Io(format!("could not open file '{}': {e}", source_path.display())))?;

    let ir_text = render_ir(&source, config)?;

    let ir_path = output_path.with_extension("ll");
    debug!(path = %ir_path.display(), "writing IR file");
    fs::write(&ir_path, &ir_text)
        .map_err(|e| DriverError::Io(format!("failed to write IR file: {e}")))?;

    debug!("checking clang version");
    check_clang_version().map_err(DriverError::Clang)?;

    let runtime_path = std::env::temp_dir().join("libanx_rt.a");
    {
        let mut file = fs::File::create(&runtime_path)
            .map_err(|e| DriverError::Io(format!("failed to create runtime lib: {e}")))?;
        file.write_all(RUNTIME_LIB)
            .map_err(|e| DriverError::Io(format!("failed to write runtime lib: {e}")))?;
    }

    debug!("invoking clang");
    let output = Command::new("clang")
        .arg("-O0")
        .arg(&ir_path)
        .arg("-o")
        .arg(output_path)
        .arg("-L")
        .arg(runtime_path.parent().expect("temp_dir has a parent"))
        .arg("-lanx_rt")
        .output()
        .map_err(|e| DriverError::Io(format!("failed to run clang: {e}")))?;

    fs::remove_file(&runtime_path).ok();

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DriverError::Clang(format!("clang compilation failed:\n{stderr}")));
    }

    if !keep_ir {
        fs::remove_file(&ir_path).ok();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_clang_version_standard() {
        let output = "clang version 15.0.0 (https://github.com/llvm/llvm-project)\nTarget: x86_64";
        assert_eq!(parse_clang_version(output), Some(15));
    }

    #[test]
    fn parse_clang_version_apple() {
        let output = "Apple clang version 14.0.3 (clang-1403.0.22.14.1)\nTarget: arm64-apple-darwin";
        assert_eq!(parse_clang_version(output), Some(14));
    }

    #[test]
    fn parse_clang_version_homebrew() {
        let output = "Homebrew clang version 17.0.6\nTarget: arm64-apple-darwin23.0.0";
        assert_eq!(parse_clang_version(output), Some(17));
    }

    #[test]
    fn parse_clang_version_invalid() {
        assert_eq!(parse_clang_version("no version here"), None);
        assert_eq!(parse_clang_version("version "), None);
    }

    #[test]
    fn render_ir_does_not_touch_the_filesystem() {
        let text = render_ir("pub fn main { ret 0; }", &CompilerConfig::new()).unwrap();
        assert!(text.contains("define i32 @main()"));
    }

    #[test]
    fn render_ir_surfaces_diagnostics() {
        let err = render_ir("pub fn main { break; }", &CompilerConfig::new());
        assert!(err.is_err());
    }
}
