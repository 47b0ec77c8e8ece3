//! `cfrontc`: command-line front end for the `cfront` library.
//!
//! Mirrors the teacher's `seqc` CLI shape (`Build`/`Lint`/`Completions`)
//! mapped onto this crate's two-phase pipeline: `check` stops after
//! parsing, `build` also runs the code generator and prints the resulting
//! IR, `completions` emits shell completion scripts.

use std::path::PathBuf;
use std::process;

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::EnvFilter;

use cfront::config::{CompilerConfig, Dialect};

#[derive(ClapParser)]
#[command(name = "cfrontc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "C-to-SSA-IR front end: parse and lower a C translation unit", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a C source file and report errors, without running codegen.
    Check {
        /// Input C source file
        input: PathBuf,

        /// C dialect to recognize
        #[arg(long, value_enum, default_value = "c89")]
        std: DialectArg,
    },

    /// Parse and lower a C source file, printing the resulting IR.
    Build {
        /// Input C source file
        input: PathBuf,

        /// C dialect to recognize
        #[arg(long, value_enum, default_value = "c89")]
        std: DialectArg,

        /// Load additional configuration from a TOML file, merged under
        /// the `--std` flag (the flag wins if both set it)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum DialectArg {
    C89,
    C99,
}

impl From<DialectArg> for Dialect {
    fn from(d: DialectArg) -> Self {
        match d {
            DialectArg::C89 => Dialect::C89,
            DialectArg::C99 => Dialect::C99,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { input, std } => run_check(&input, std.into()),
        Commands::Build { input, std, config } => run_build(&input, std.into(), config.as_deref()),
        Commands::Completions { shell } => run_completions(shell),
    }
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "cfrontc", &mut std::io::stdout());
}

fn run_check(input: &std::path::Path, dialect: Dialect) {
    let config = CompilerConfig::new().with_dialect(dialect);
    let source = match std::fs::read_to_string(input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading {}: {}", input.display(), e);
            process::exit(1);
        }
    };

    let tokens = cfront::lexer::tokenize(&source, config.std.allows_restrict());
    let parser = cfront::parser::Parser::new(tokens, config);
    match parser.parse_translation_unit() {
        Ok((unit, _)) => {
            println!("{}: OK ({} top-level declarations)", input.display(), unit.decls.len());
        }
        Err(e) => {
            eprintln!("{}: {}", input.display(), e);
            process::exit(1);
        }
    }
}

fn run_build(input: &std::path::Path, dialect: Dialect, config_path: Option<&std::path::Path>) {
    let mut config = CompilerConfig::new().with_dialect(dialect);
    if let Some(path) = config_path {
        match std::fs::read_to_string(path) {
            Ok(text) => match CompilerConfig::from_toml_str(&text) {
                Ok(loaded) => config = loaded,
                Err(e) => {
                    eprintln!("Error parsing {}: {}", path.display(), e);
                    process::exit(1);
                }
            },
            Err(e) => {
                eprintln!("Error reading {}: {}", path.display(), e);
                process::exit(1);
            }
        }
    }

    match cfront::compile_file(input, &config) {
        Ok(module) => {
            print!("{}", cfront::ir::display::print_module(&module));
        }
        Err(e) => {
            eprintln!("{}: {}", input.display(), e);
            process::exit(1);
        }
    }
}
