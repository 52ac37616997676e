use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use classdex::config::{ConfigOverrides, GenerateConfig};
use classdex::inspect::inspect_files;

#[derive(Parser)]
#[command(name = "classdex")]
#[command(version, about = "Index concrete JVM subclasses at build time", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan classes and dependencies, then write the implementation index and reflect-config.json
    Generate(GenerateArgs),

    /// Print the headers of compiled class files as JSON
    Inspect {
        /// Class files to read
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Args)]
struct GenerateArgs {
    /// TOML config file; flags below override its values
    #[arg(short, long, env = "CLASSDEX_CONFIG")]
    config: Option<PathBuf>,

    /// Compiled output directory of the module
    #[arg(long, env = "CLASSDEX_CLASSES_DIR")]
    classes_dir: Option<PathBuf>,

    /// Dependency archive (repeatable)
    #[arg(long = "dependency", value_name = "JAR")]
    dependencies: Vec<PathBuf>,

    /// Dependency archives as a platform path list
    #[arg(long, env = "CLASSDEX_CLASSPATH")]
    classpath: Option<String>,

    /// Comma-separated base classes (dotted names)
    #[arg(short, long, env = "CLASSDEX_BASE_CLASSES")]
    base_classes: Option<String>,

    /// Index file name inside the fragment directory
    #[arg(long, env = "CLASSDEX_OUTPUT_FILE")]
    output_file: Option<String>,

    /// Directory of precomputed fragments inside archives
    #[arg(long, env = "CLASSDEX_FRAGMENT_DIR")]
    fragment_dir: Option<String>,

    /// Always scan dependency classes, ignoring precomputed fragments
    #[arg(long)]
    no_precomputed: bool,

    /// Do not write reflect-config.json
    #[arg(long)]
    no_reflect_config: bool,

    /// Extra comma-separated classes for reflect-config.json
    #[arg(long, env = "CLASSDEX_REFLECTED_CLASSES")]
    reflected_classes: Option<String>,

    /// Group id locating reflect-config.json
    #[arg(long, env = "CLASSDEX_GROUP_ID")]
    group_id: Option<String>,

    /// Artifact id locating reflect-config.json
    #[arg(long, env = "CLASSDEX_ARTIFACT_ID")]
    artifact_id: Option<String>,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

impl GenerateArgs {
    fn into_config(self) -> Result<(GenerateConfig, bool)> {
        let mut config = match &self.config {
            Some(path) => GenerateConfig::from_file(path)?,
            None => GenerateConfig::default(),
        };

        ConfigOverrides {
            classes_dir: self.classes_dir,
            dependencies: self.dependencies,
            classpath: self.classpath,
            base_classes: self.base_classes,
            output_file: self.output_file,
            fragment_dir: self.fragment_dir,
            no_precomputed: self.no_precomputed,
            no_reflect_config: self.no_reflect_config,
            reflected_classes: self.reflected_classes,
            group_id: self.group_id,
            artifact_id: self.artifact_id,
        }
        .apply(&mut config);

        Ok((config, self.json))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; RUST_LOG wins over the flags
    let level = if cli.debug {
        "trace"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.debug)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Generate(args) => handle_generate(args),
        Commands::Inspect { files } => {
            println!("{}", inspect_files(&files)?);
            Ok(())
        }
    }
}

fn handle_generate(args: GenerateArgs) -> Result<()> {
    let (config, json) = args.into_config()?;
    let report = classdex::run(&config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.skipped {
        info!("Nothing to do: {} does not exist", config.classes_dir.display());
        return Ok(());
    }
    for (base, implementations) in &report.implementations {
        info!(
            "{}: {} implementation(s)",
            classdex_core::names::to_dotted(base),
            implementations.len()
        );
    }
    Ok(())
}
