use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use git_sym::config::{DEFAULT_MAX_ARG_LEN, DEFAULT_RETRIEVER};
use git_sym::{GitSym, SymConfig, SymError};

#[derive(Parser)]
#[command(
    name = "git-sym",
    about = "Cache symlinks (presumably for large files).",
    after_help = "Links are committed; the files they reach live in the cache."
)]
struct Cli {
    /// Directory in which to store retrieved files/directories
    #[arg(long, env = "GIT_SYM_CACHE_DIR", global = true)]
    cache_dir: Option<PathBuf>,

    /// Directory of symlinks into the cache (first level of indirection)
    #[arg(long = "dir", env = "GIT_SYM_DIR", global = true)]
    sym_dir: Option<PathBuf>,

    /// Symlink to the --dir directory; must be ignored by git
    #[arg(long = "link", global = true)]
    sym_link: Option<PathBuf>,

    /// Program run with `-j -f git_sym.makefile <names...>` to fetch entries
    #[arg(long, default_value = DEFAULT_RETRIEVER, global = true)]
    retriever: String,

    /// Log every filesystem change and subprocess
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log internal decisions too, and print full errors
    #[arg(short = 'g', long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show symlinks: "O" ignored, "+" unresolved, "." or "/" a resolved
    /// file or directory, "?" not a symlink
    Show {
        /// If not given, walk through the tree to find relevant symlinks
        symlinks: Vec<PathBuf>,
    },

    /// Fill in symlinks and retrieve files into the cache
    Update {
        /// If not given, walk through the tree to find relevant symlinks
        symlinks: Vec<PathBuf>,
    },

    /// Fail on the first unresolved symlink (for scripts; humans want "missing")
    Check {
        /// If not given, walk through the tree to find relevant symlinks
        symlinks: Vec<PathBuf>,
    },

    /// Print all unresolved symlinks
    Missing {
        /// If not given, walk through the tree to find relevant symlinks
        symlinks: Vec<PathBuf>,
    },

    /// Re-point symlinks made through --dir so they go through --link.
    /// Changes are not committed
    Fix {
        /// If not given, walk through the tree to find relevant symlinks
        symlinks: Vec<PathBuf>,
    },

    /// Move files/directories into the cache and "git add" symlinks in their
    /// place. Commit before running "update" elsewhere
    Add {
        /// Files and/or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);
    let config = config(&cli);

    if let Err(e) = run(cli.command, &config) {
        eprintln!("Error: {}", e);
        if cli.debug {
            eprintln!("{:?}", e);
        }
        std::process::exit(1);
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.debug {
        log::LevelFilter::Debug
    } else if cli.verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn config(cli: &Cli) -> SymConfig {
    SymConfig {
        cache_dir: cli.cache_dir.clone(),
        sym_dir: cli.sym_dir.clone(),
        sym_link: cli.sym_link.clone(),
        retriever: cli.retriever.clone(),
        max_arg_len: DEFAULT_MAX_ARG_LEN,
    }
}

fn run(command: Commands, config: &SymConfig) -> Result<(), SymError> {
    let cwd = std::env::current_dir()?;
    let engine = GitSym::open(config, &cwd)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match command {
        Commands::Show { symlinks } => engine.show(&symlinks, &mut out)?,
        Commands::Update { symlinks } => engine.update(&symlinks)?,
        Commands::Check { symlinks } => engine.check(&symlinks)?,
        Commands::Missing { symlinks } => {
            engine.missing(&symlinks, &mut out)?;
        }
        Commands::Fix { symlinks } => {
            let fixed = engine.fix(&symlinks)?;
            log::info!("re-pointed {} symlinks", fixed);
        }
        Commands::Add { paths } => engine.add(&paths, &mut out)?,
    }
    out.flush()?;
    Ok(())
}
