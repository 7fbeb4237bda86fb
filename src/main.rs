//! `anxc` command-line interface: compile `.anx` programs to executables
//! and generate shell completions.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use anxc::config::CompilerConfig;
use anxc::driver;
use anxc::driver::DriverError;

#[derive(ClapParser)]
#[command(name = "anxc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Anx compiler - compile .anx programs to executables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a .anx file to an executable
    Build {
        /// Input .anx source file
        source: PathBuf,

        /// Output executable path
        #[arg(short, long, default_value = "a.out")]
        output: PathBuf,

        /// Keep the intermediate LLVM IR (.ll) file
        #[arg(long)]
        keep_ir: bool,

        /// Stop after lowering and print the rendered IR to stdout instead
        /// of invoking clang
        #[arg(long)]
        emit_ir_only: bool,

        /// TOML manifest(s) declaring additional `@`-prefixed intrinsics
        #[arg(long = "intrinsics", value_name = "PATH")]
        intrinsic_manifests: Vec<PathBuf>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("ANX_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("anxc=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build { source, output, keep_ir, emit_ir_only, intrinsic_manifests } => {
            run_build(&source, &output, keep_ir, emit_ir_only, &intrinsic_manifests);
        }
        Commands::Completions { shell } => run_completions(shell),
    }
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "anxc", &mut io::stdout());
}

fn run_build(
    source: &Path,
    output: &Path,
    keep_ir: bool,
    emit_ir_only: bool,
    intrinsic_manifests: &[PathBuf],
) {
    let text = match std::fs::read_to_string(source) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: could not open file '{}': {e}", source.display());
            process::exit(1);
        }
    };
    let lines: Vec<String> = text.lines().map(str::to_owned).collect();
    let file = source.display().to_string();

    let config = load_config(intrinsic_manifests);

    if emit_ir_only {
        match driver::render_ir(&text, &config) {
            Ok(ir) => print!("{ir}"),
            Err(diagnostic) => {
                eprint!("{}", diagnostic.render(&file, &lines));
                process::exit(1);
            }
        }
        return;
    }

    match driver::compile_file_with_config(source, output, keep_ir, &config) {
        Ok(()) => {}
        Err(DriverError::Diagnostic(d)) => {
            eprint!("{}", d.render(&file, &lines));
            process::exit(1);
        }
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

fn load_config(intrinsic_manifests: &[PathBuf]) -> CompilerConfig {
    let mut config = CompilerConfig::new();
    for path in intrinsic_manifests {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("error: could not open intrinsic manifest '{}': {e}", path.display());
                process::exit(1);
            }
        };
        match CompilerConfig::from_toml_str(&contents) {
            Ok(loaded) => config = config.with_intrinsics(loaded.external_intrinsics),
            Err(e) => {
                eprintln!("error: {e} (in '{}')", path.display());
                process::exit(1);
            }
        }
    }
    config
}
