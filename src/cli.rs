use crate::config::ParserConfig;
use crate::engine::Parser as DocumentParser;
use crate::scanner::FileScanner;
use crate::serializer::{self, Format};
use crate::type_model::{source::SourceLoader, ClassRegistry};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// OpenAPI from metadata - Generate an OpenAPI document from endpoint class metadata
#[derive(Parser, Debug)]
#[command(name = "openapi-from-metadata")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Metadata dumps (.yaml, .yml, .json), Rust source files, or directories of them
    #[arg(value_name = "INPUT")]
    pub inputs: Vec<PathBuf>,

    /// Configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_path: Option<PathBuf>,

    /// Endpoint class to generate; repeatable. Overrides the configured roots
    #[arg(short = 'r', long = "root", value_name = "CLASS")]
    pub roots: Vec<String>,

    /// Output format (yaml or json); inferred from the output file extension when omitted
    #[arg(short = 'f', long = "format", value_enum)]
    pub output_format: Option<OutputFormat>,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

impl From<OutputFormat> for Format {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Yaml => Format::Yaml,
            OutputFormat::Json => Format::Json,
        }
    }
}

impl CliArgs {
    /// The requested format, else the one matching the output file, else YAML
    pub fn format(&self) -> Format {
        match (self.output_format, &self.output_path) {
            (Some(format), _) => format.into(),
            (None, Some(path)) => Format::for_path(path),
            (None, None) => Format::Yaml,
        }
    }
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliArgs> {
    let args = CliArgs::parse();
    parse_args_from_parsed(args)
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    for input in &args.inputs {
        if !input.exists() {
            anyhow::bail!("Input path does not exist: {}", input.display());
        }
    }
    if let Some(ref config) = args.config_path {
        if !config.is_file() {
            anyhow::bail!("Configuration file does not exist: {}", config.display());
        }
        info!("Configuration: {}", config.display());
    }

    info!("Inputs: {}", args.inputs.len());
    info!("Output format: {:?}", args.format());
    if let Some(ref output) = args.output_path {
        info!("Output file: {}", output.display());
    } else {
        info!("Output: stdout");
    }

    Ok(args)
}

/// Counts reported at the end of a run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub metadata_files: usize,
    pub rust_files: usize,
    pub skipped_files: usize,
}

/// Build the class registry from metadata locations.
///
/// Metadata dumps must load; Rust sources that fail to parse are skipped
/// with a warning.
pub fn load_metadata(inputs: &[PathBuf], excluded: &[&Path]) -> Result<(ClassRegistry, LoadSummary)> {
    let mut registry = ClassRegistry::new();
    let mut loader = SourceLoader::new();
    let mut summary = LoadSummary::default();

    for input in inputs {
        let scanner = excluded
            .iter()
            .fold(FileScanner::new(input.clone()), |scanner, path| scanner.exclude(path));
        let scan = scanner.scan()?;
        if scan.is_empty() {
            warn!("No metadata or Rust sources found in {}", input.display());
        }

        for file in &scan.metadata_files {
            debug!("Loading metadata dump {}", file.display());
            registry
                .load_file(file)
                .with_context(|| format!("Failed to load metadata from {}", file.display()))?;
            summary.metadata_files += 1;
        }

        for file in &scan.rust_files {
            match loader.load_file(file, &scan.source_root) {
                Ok(()) => summary.rust_files += 1,
                Err(e) => {
                    warn!("Skipping file due to parse error: {}", e);
                    summary.skipped_files += 1;
                }
            }
        }
    }

    registry.merge(loader.finish());
    Ok((registry, summary))
}

/// Metadata locations named in the configuration are relative to the configuration file
fn config_inputs(config: &ParserConfig, config_path: Option<&Path>) -> Vec<PathBuf> {
    let base = config_path.and_then(|p| p.parent()).unwrap_or_else(|| Path::new(""));
    config
        .class_path
        .iter()
        .map(|p| if p.is_absolute() { p.clone() } else { base.join(p) })
        .collect()
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    info!("Starting OpenAPI document generation...");

    // Step 1: Load configuration
    let mut config = match &args.config_path {
        Some(path) => ParserConfig::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => ParserConfig::default(),
    };
    if !args.roots.is_empty() {
        config.roots = args.roots.clone();
    }

    let inputs = if args.inputs.is_empty() {
        config_inputs(&config, args.config_path.as_deref())
    } else {
        args.inputs.clone()
    };
    if inputs.is_empty() {
        anyhow::bail!("No metadata inputs given; pass them as arguments or set `class_path` in the configuration");
    }

    // Step 2: Load metadata, leaving out our own configuration and output
    info!("Loading metadata from {} location(s)...", inputs.len());
    let excluded: Vec<&Path> = args
        .config_path
        .iter()
        .chain(args.output_path.iter())
        .map(|p| p.as_path())
        .collect();
    let (registry, summary) = load_metadata(&inputs, &excluded)?;
    info!("Loaded {} classes", registry.len());
    if registry.is_empty() {
        anyhow::bail!("No class metadata found in the inputs");
    }

    // Step 3: Run the plugin pipeline
    let parser = DocumentParser::from_config(config).context("Invalid plugin configuration")?;
    info!("Plugins: {}", parser.plugins().names().join(", "));
    let outcome = parser.run(&registry).context("Failed to generate the OpenAPI document")?;
    let document = outcome.document;

    // Step 4: Serialize to requested format
    let format = args.format();
    info!("Serializing to {:?} format...", format);
    let content = serializer::serialize(&document, format).context("Failed to serialize the document")?;

    // Step 5: Output to file or stdout
    if let Some(output_path) = &args.output_path {
        info!("Writing output to: {}", output_path.display());
        serializer::write_to_file(&content, output_path)
            .with_context(|| format!("Failed to write {}", output_path.display()))?;
    } else {
        println!("{}", content);
    }

    info!("Generation complete!");
    info!("Summary:");
    info!("  - Metadata files: {}", summary.metadata_files);
    info!("  - Rust files: {} ({} skipped)", summary.rust_files, summary.skipped_files);
    info!("  - Nodes: {}", outcome.graph.len());
    info!("  - Endpoints: {}", document.tags.len());
    info!("  - Operations: {}", document.paths.len());
    info!("  - Schemas: {}", document.components.schemas.len());

    Ok(())
}
