use clap::Parser as _;
use openapi_from_metadata::cli::{self, load_metadata, CliArgs, LoadSummary};
use openapi_from_metadata::openapi::Schema;
use openapi_from_metadata::type_model::{ClassKind, MetadataProvider, TypeRef};
use openapi_from_metadata::{OpenApiDocument, Parser, ParserConfig};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn service_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("rust_service")
}

fn generate() -> OpenApiDocument {
    let (registry, _) = load_metadata(&[service_dir()], &[]).unwrap();
    Parser::from_config(ParserConfig::default())
        .unwrap()
        .parse(&registry)
        .unwrap()
}

fn property<'a>(schema: &'a Schema, name: &str) -> &'a Schema {
    schema
        .properties
        .as_ref()
        .and_then(|p| p.get(name))
        .unwrap_or_else(|| panic!("missing property {name}"))
}

fn request<'a>(doc: &'a OpenApiDocument, path: &str) -> &'a Schema {
    &doc.operation(path).unwrap().request_body.as_ref().unwrap().content["application/json"].schema
}

fn response<'a>(doc: &'a OpenApiDocument, path: &str) -> &'a Schema {
    &doc.operation(path).unwrap().responses["200"]
        .content
        .as_ref()
        .unwrap()["application/json"]
        .schema
}

#[test]
fn test_crate_sources_become_classes() {
    let (registry, summary) = load_metadata(&[service_dir()], &[]).unwrap();
    assert_eq!(
        summary,
        LoadSummary {
            metadata_files: 0,
            rust_files: 3,
            skipped_files: 0,
        }
    );

    let book = registry.find_class("crate::model::Book").unwrap();
    assert_eq!(book.fields.len(), 8);
    assert_eq!(book.fields[5].ty, TypeRef::class("crate::model::Genre"));

    let service = registry.find_class("crate::api::ReadService").unwrap();
    assert_eq!(service.kind, ClassKind::Interface);

    let endpoint = registry.find_class("crate::api::BookEndpoint").unwrap();
    assert_eq!(
        endpoint.interfaces,
        vec![TypeRef::parse("crate::api::ReadService<crate::model::Book, uuid::Uuid>").unwrap()]
    );
    assert_eq!(
        registry.package_annotations("crate::model")[0].name,
        "non_null_api"
    );
}

#[test]
fn test_endpoint_operations_from_sources() {
    let doc = generate();

    let paths: Vec<&str> = doc.paths.keys().map(|k| k.as_str()).collect();
    assert_eq!(paths, vec!["/books/get", "/books/save", "/books/search"]);
    assert_eq!(doc.tags[0].class_name.as_deref(), Some("crate::api::BookEndpoint"));

    let get = doc.operation("/books/get").unwrap();
    assert_eq!(get.access_control, vec!["roles_allowed(ADMIN)".to_string()]);
    assert_eq!(
        property(request(&doc, "/books/get"), "id").format.as_deref(),
        Some("uuid")
    );
    let found = response(&doc, "/books/get");
    assert!(found.is_nullable());
    assert_eq!(found.any_of, Some(vec![Schema::reference("crate.model.Book")]));

    let search = doc.operation("/books/search").unwrap();
    assert_eq!(
        search.access_control,
        vec!["permit_all".to_string(), "roles_allowed(ADMIN)".to_string()]
    );
    let search_request = request(&doc, "/books/search");
    assert_eq!(search_request.required, Some(vec!["query".to_string()]));
    assert!(property(search_request, "limit").is_nullable());
    assert_eq!(
        response(&doc, "/books/search"),
        &Schema::reference("crate.model.Listing_crate.model.Book")
    );
}

#[test]
fn test_entity_schemas_from_sources() {
    let doc = generate();

    let book = doc.schema("crate.model.Book").unwrap();
    let names: Vec<&str> = book
        .properties
        .as_ref()
        .unwrap()
        .keys()
        .map(|k| k.as_str())
        .collect();
    assert_eq!(
        names,
        vec!["id", "title", "authorName", "subtitle", "published", "genre", "tags"]
    );
    assert_eq!(
        book.required,
        Some(vec![
            "id".to_string(),
            "title".to_string(),
            "authorName".to_string(),
            "genre".to_string(),
            "tags".to_string(),
        ])
    );

    let title = property(book, "title");
    assert_eq!(title.min_length, Some(1));
    assert_eq!(title.max_length, Some(200));
    assert!(property(book, "subtitle").is_nullable());

    let published = property(book, "published");
    assert_eq!(published.format.as_deref(), Some("date"));
    assert!(published.is_nullable());

    let genre = doc.schema("crate.model.Genre").unwrap();
    assert_eq!(
        genre.enum_values,
        Some(vec!["Fiction".to_string(), "non_fiction".to_string()])
    );

    let listing = doc.schema("crate.model.Listing_crate.model.Book").unwrap();
    assert_eq!(
        property(listing, "items").items.as_deref(),
        Some(&Schema::reference("crate.model.Book"))
    );
    assert_eq!(property(listing, "total").format.as_deref(), Some("int64"));
}

#[test]
fn test_unparsable_sources_are_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::write(root.join("Cargo.toml"), "[package]\nname = \"broken\"").unwrap();
    fs::create_dir(root.join("src")).unwrap();
    fs::write(root.join("src/lib.rs"), "pub struct Valid { pub id: i64 }").unwrap();
    fs::write(root.join("src/broken.rs"), "pub struct {").unwrap();

    let (registry, summary) = load_metadata(&[root.to_path_buf()], &[]).unwrap();
    assert_eq!(summary.rust_files, 1);
    assert_eq!(summary.skipped_files, 1);
    assert!(registry.find_class("crate::Valid").is_some());
}

#[test]
fn test_cli_reads_class_path_from_config() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    let config = root.join("openapi.yaml");
    fs::write(
        &config,
        format!(
            "info:\n  title: Bookstore\n  version: 0.1.0\nclass_path:\n  - {}\n",
            service_dir().display()
        ),
    )
    .unwrap();
    let output = root.join("openapi.yaml.out");

    let args = CliArgs::parse_from([
        "openapi-from-metadata".to_string(),
        "-c".to_string(),
        config.display().to_string(),
        "-o".to_string(),
        output.display().to_string(),
        "-f".to_string(),
        "json".to_string(),
    ]);
    cli::run(cli::parse_args_from_parsed(args).unwrap()).unwrap();

    let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written["info"]["title"], "Bookstore");
    assert_eq!(written["paths"]["/books/save"]["post"]["operationId"], "books_save");
    assert_eq!(
        written["components"]["schemas"]["crate.model.Book"]["properties"]["authorName"]["type"],
        "string"
    );
}
