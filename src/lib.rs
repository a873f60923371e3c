//! OpenAPI from metadata - OpenAPI 3 documents from endpoint class metadata.
//!
//! The library reads reflected class metadata (serialized dumps, or Rust
//! sources read with `syn`), walks everything reachable from the endpoint
//! classes, and lets an ordered set of plugins turn each visited element into a
//! fragment of the output document.
//!
//! # Architecture
//!
//! 1. [`type_model`] - Classes, members, annotations and generic type signatures
//! 2. [`node`] / [`graph`] - Source entities paired with their document fragments
//! 3. [`plugin`] - The plugin contract, ordering, and the built-in plugins
//! 4. [`engine`] - Depth-first traversal driving the plugin phases
//! 5. [`openapi`] - The OpenAPI document model
//! 6. [`serializer`] - Serializes the document to YAML or JSON
//!
//! # Example Usage
//!
//! ```no_run
//! use openapi_from_metadata::{
//!     config::ParserConfig,
//!     engine::Parser,
//!     serializer::serialize_yaml,
//!     type_model::ClassRegistry,
//! };
//! use std::path::Path;
//!
//! let mut registry = ClassRegistry::new();
//! registry.load_file(Path::new("classes.yaml")).unwrap();
//!
//! let parser = Parser::from_config(ParserConfig::default()).unwrap();
//! let document = parser.parse(&registry).unwrap();
//! println!("{}", serialize_yaml(&document).unwrap());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod node;
pub mod openapi;
pub mod plugin;
pub mod scanner;
pub mod serializer;
pub mod storage;
pub mod type_model;

pub use config::ParserConfig;
pub use engine::{ParseOutcome, Parser};
pub use error::{Error, Result};
pub use openapi::OpenApiDocument;
pub use plugin::{Plugin, PluginContext};
pub use type_model::{ClassRegistry, MetadataProvider};
