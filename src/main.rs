//! `openapi-from-metadata` - generates an OpenAPI document from endpoint class metadata.
//!
//! # Usage
//!
//! ```bash
//! openapi-from-metadata [OPTIONS] [INPUT]...
//! ```
//!
//! Inputs are metadata dumps (`.yaml`, `.yml`, `.json`), Rust source files, or
//! directories containing either. More inputs can be listed under `class_path`
//! in the configuration file.
//!
//! # Examples
//!
//! ```bash
//! openapi-from-metadata classes.yaml -o openapi.yaml
//! openapi-from-metadata ./my-service -c openapi-config.yaml -o openapi.json
//! openapi-from-metadata classes.yaml -r com.example.UserEndpoint -f json
//! ```

use anyhow::Result;
use clap::Parser;
use log::{info, LevelFilter};
use openapi_from_metadata::cli::{self, CliArgs};

fn init_logger(verbose: bool) {
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    env_logger::Builder::from_default_env().filter_level(level).init();
}

fn main() -> Result<()> {
    // the logger needs the verbose flag, so arguments are validated after it exists
    let args = CliArgs::parse();
    init_logger(args.verbose);

    let args = cli::parse_args_from_parsed(args)?;
    cli::run(args)?;

    info!("Done");
    Ok(())
}
