//! TPGen CLI
//!
//! Command-line interface for validating, analyzing and storing hardware
//! test plans.

#![allow(clippy::doc_markdown)]

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tpgen_cli::{
    CliResult, Config, Overrides, analyze_file, build_analyzer, compare_record, delete_record,
    list_records, open_store, parse_format, show_record, template_skeleton, upload_file,
    validate_file,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tpgen")]
#[command(about = "Test plan validation, template comparison and machine compatibility", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (default: ./tpgen.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Reference template YAML (overrides the config file)
    #[arg(long, global = true)]
    template: Option<PathBuf>,

    /// Machine catalog YAML (overrides the config file)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Upload store directory (overrides the config file)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grammar-check a test plan
    Validate {
        /// Test plan YAML file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Analyze a test plan without storing it
    Analyze {
        /// Test plan YAML file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format (json, yaml, markdown)
        #[arg(short, long, default_value = "json")]
        format: String,
    },

    /// Validate, analyze and store a test plan
    Upload {
        /// Test plan YAML file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Uploader name
        #[arg(long, default_value = "anonymous")]
        user: String,
    },

    /// Show a stored upload
    Show {
        /// Upload id
        id: u64,

        /// Output format (json, yaml, markdown)
        #[arg(short, long, default_value = "markdown")]
        format: String,
    },

    /// Compare a stored upload with the reference template
    Compare {
        /// Upload id
        id: u64,

        /// Output format (json, yaml, markdown)
        #[arg(short, long, default_value = "markdown")]
        format: String,
    },

    /// List stored uploads, newest first
    List {
        /// Page number (1-based)
        #[arg(long, default_value = "1")]
        page: usize,

        /// Uploads per page
        #[arg(long, default_value = "20")]
        page_size: usize,

        /// Output format (json, yaml, markdown)
        #[arg(short, long, default_value = "markdown")]
        format: String,
    },

    /// Delete a stored upload
    Delete {
        /// Upload id
        id: u64,
    },

    /// Print the reference template skeleton
    Template,
}

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn exit_with(result: CliResult) {
    match result {
        CliResult::Success(msg) => println!("{msg}"),
        CliResult::Error(msg) => {
            eprintln!("{msg}");
            std::process::exit(1);
        }
    }
}

fn or_exit<T>(result: Result<T, String>) -> T {
    result.unwrap_or_else(|e| {
        eprintln!("{e}");
        std::process::exit(1);
    })
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let overrides = Overrides {
        template: cli.template,
        catalog: cli.catalog,
        store_dir: cli.store,
    };
    let config = or_exit(Config::load(cli.config.as_deref(), overrides));

    let result = match cli.command {
        Commands::Validate { file } => validate_file(&file),
        Commands::Analyze { file, format } => {
            let format = or_exit(parse_format(&format));
            let analyzer = or_exit(build_analyzer(&config));
            analyze_file(&analyzer, &file, format)
        }
        Commands::Upload { file, user } => {
            let analyzer = or_exit(build_analyzer(&config));
            let store = or_exit(open_store(&config, analyzer));
            upload_file(&store, &file, &user)
        }
        Commands::Show { id, format } => {
            let format = or_exit(parse_format(&format));
            let store = or_exit(build_analyzer(&config).and_then(|a| open_store(&config, a)));
            show_record(&store, id, format)
        }
        Commands::Compare { id, format } => {
            let format = or_exit(parse_format(&format));
            let store = or_exit(build_analyzer(&config).and_then(|a| open_store(&config, a)));
            compare_record(&store, id, format)
        }
        Commands::List {
            page,
            page_size,
            format,
        } => {
            let format = or_exit(parse_format(&format));
            let store = or_exit(build_analyzer(&config).and_then(|a| open_store(&config, a)));
            list_records(&store, page, page_size, format)
        }
        Commands::Delete { id } => {
            let store = or_exit(build_analyzer(&config).and_then(|a| open_store(&config, a)));
            delete_record(&store, id)
        }
        Commands::Template => {
            let analyzer = or_exit(build_analyzer(&config));
            template_skeleton(&analyzer)
        }
    };
    exit_with(result);
}
