use openapi_from_metadata::config::PluginEntry;
use openapi_from_metadata::node::{NodePath, TargetFragment};
use openapi_from_metadata::openapi::Schema;
use openapi_from_metadata::plugin::{instantiate, BUILTIN_PLUGINS};
use openapi_from_metadata::serializer::{serialize_json, serialize_yaml};
use openapi_from_metadata::{
    ClassRegistry, Error, OpenApiDocument, Parser, ParserConfig, Plugin, PluginContext, Result,
};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load(name: &str) -> ClassRegistry {
    let mut registry = ClassRegistry::new();
    registry.load_file(&fixture(name)).unwrap();
    registry
}

fn generate(name: &str) -> OpenApiDocument {
    Parser::from_config(ParserConfig::default())
        .unwrap()
        .parse(&load(name))
        .unwrap()
}

fn schema<'a>(doc: &'a OpenApiDocument, name: &str) -> &'a Schema {
    doc.schema(name)
        .unwrap_or_else(|| panic!("missing schema {name}"))
}

fn property<'a>(schema: &'a Schema, name: &str) -> &'a Schema {
    schema
        .properties
        .as_ref()
        .and_then(|p| p.get(name))
        .unwrap_or_else(|| panic!("missing property {name}"))
}

fn property_names(schema: &Schema) -> Vec<&str> {
    schema
        .properties
        .as_ref()
        .map(|p| p.keys().map(|k| k.as_str()).collect())
        .unwrap_or_default()
}

fn response<'a>(doc: &'a OpenApiDocument, path: &str) -> &'a Schema {
    &doc.operation(path)
        .unwrap_or_else(|| panic!("missing operation {path}"))
        .responses["200"]
        .content
        .as_ref()
        .expect("response without content")["application/json"]
        .schema
}

fn request<'a>(doc: &'a OpenApiDocument, path: &str) -> &'a Schema {
    &doc.operation(path)
        .unwrap_or_else(|| panic!("missing operation {path}"))
        .request_body
        .as_ref()
        .expect("operation without request body")
        .content["application/json"]
        .schema
}

fn reference(component: &str) -> Schema {
    Schema::reference(component)
}

fn primitive(schema_type: &str, format: &str) -> Schema {
    Schema {
        format: Some(format.to_string()),
        ..Schema::of_type(schema_type)
    }
}

#[test]
fn test_shop_components_and_operations() {
    let doc = generate("shop.yaml");

    let schemas: Vec<&str> = doc.components.schemas.keys().map(|k| k.as_str()).collect();
    assert_eq!(
        schemas,
        vec![
            "com.example.shop.Customer",
            "com.example.shop.Order",
            "com.example.shop.OrderLine",
            "com.example.shop.Status",
            "openapi.mapped.Direction",
            "openapi.mapped.NullHandling",
            "openapi.mapped.Order",
            "openapi.mapped.Pageable",
            "openapi.mapped.Sort",
        ]
    );

    let tags: Vec<&str> = doc.tags.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(tags, vec!["OrderEndpoint", "customers"]);
    assert_eq!(
        doc.tags[1].class_name.as_deref(),
        Some("com.example.shop.CustomerEndpoint")
    );

    let paths: Vec<&str> = doc.paths.keys().map(|k| k.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "/OrderEndpoint/find",
            "/OrderEndpoint/recent",
            "/OrderEndpoint/save",
            "/customers/lookup",
            "/customers/orders",
        ]
    );

    let orders = doc.operation("/customers/orders").unwrap();
    assert_eq!(orders.operation_id, "customers_orders");
    assert_eq!(orders.tags, vec!["customers".to_string()]);
}

#[test]
fn test_shop_entity_schemas() {
    let doc = generate("shop.yaml");

    let order = schema(&doc, "com.example.shop.Order");
    assert_eq!(order.schema_type.as_deref(), Some("object"));
    assert_eq!(
        property_names(order),
        vec!["id", "customer", "note", "created", "lines", "status"]
    );
    assert_eq!(
        order.required,
        Some(vec![
            "id".to_string(),
            "customer".to_string(),
            "created".to_string(),
            "lines".to_string(),
            "status".to_string(),
        ])
    );
    assert_eq!(property(order, "id"), &primitive("integer", "int64"));
    assert_eq!(property(order, "customer"), &reference("com.example.shop.Customer"));
    assert_eq!(
        property(order, "created"),
        &primitive("string", "date-time")
    );

    let note = property(order, "note");
    assert_eq!(note.schema_type.as_deref(), Some("string"));
    assert!(note.is_nullable());

    let lines = property(order, "lines");
    assert!(lines.is_array());
    assert_eq!(
        lines.items.as_deref(),
        Some(&reference("com.example.shop.OrderLine"))
    );

    // the cycle back to Order is a reference
    let line = schema(&doc, "com.example.shop.OrderLine");
    assert_eq!(property(line, "order"), &reference("com.example.shop.Order"));

    let customer = schema(&doc, "com.example.shop.Customer");
    assert_eq!(customer.required, Some(vec!["name".to_string()]));
    let age = property(customer, "age");
    assert!(age.is_nullable());
    assert_eq!(age.format.as_deref(), Some("int32"));

    let status = schema(&doc, "com.example.shop.Status");
    assert_eq!(status.schema_type.as_deref(), Some("string"));
    assert_eq!(
        status.enum_values,
        Some(vec!["NEW".to_string(), "PAID".to_string(), "SHIPPED".to_string()])
    );
}

#[test]
fn test_shop_request_and_response_bodies() {
    let doc = generate("shop.yaml");

    let find = response(&doc, "/OrderEndpoint/find");
    assert!(find.is_nullable());
    assert_eq!(find.any_of, Some(vec![reference("com.example.shop.Order")]));
    assert_eq!(find.reference, None);

    let find_request = request(&doc, "/OrderEndpoint/find");
    assert_eq!(find_request.required, Some(vec!["id".to_string()]));
    assert_eq!(property(find_request, "id").format.as_deref(), Some("int64"));

    assert_eq!(
        response(&doc, "/OrderEndpoint/save"),
        &reference("com.example.shop.Order")
    );

    // paging types are substituted
    let recent = response(&doc, "/OrderEndpoint/recent");
    assert!(recent.is_array());
    assert_eq!(recent.items.as_deref(), Some(&reference("com.example.shop.Order")));
    assert_eq!(
        property(request(&doc, "/OrderEndpoint/recent"), "pageable"),
        &reference("openapi.mapped.Pageable")
    );
    let sort = schema(&doc, "openapi.mapped.Sort");
    assert_eq!(
        property(sort, "orders").items.as_deref(),
        Some(&reference("openapi.mapped.Order"))
    );

    // wrappers nested in containers are unwrapped too
    let lookup = response(&doc, "/customers/lookup");
    assert_eq!(lookup.schema_type.as_deref(), Some("object"));
    let values = lookup.additional_properties.as_deref().unwrap();
    assert!(values.is_array());
    assert_eq!(values.items.as_deref(), Some(&primitive("string", "uuid")));

    let list = response(&doc, "/customers/orders");
    assert!(list.is_array());
    assert_eq!(list.items.as_deref(), Some(&reference("com.example.shop.Order")));

    // non-public methods are not exposed
    assert!(doc.operation("/OrderEndpoint/helper").is_none());
}

#[test]
fn test_every_node_identity_is_unique() {
    let outcome = Parser::from_config(ParserConfig::default())
        .unwrap()
        .run(&load("shop.yaml"))
        .unwrap();

    let mut seen = HashSet::new();
    for node in outcome.graph.iter() {
        assert!(seen.insert(node.identity.clone()), "duplicate node {}", node.identity);
        assert!(node.is_exited(), "{} did not exit", node.identity);
    }
    assert_eq!(seen.len(), outcome.graph.len());
}

#[test]
fn test_exposed_generic_base() {
    let doc = generate("crud.yaml");

    let paths: Vec<&str> = doc.paths.keys().map(|k| k.as_str()).collect();
    assert_eq!(
        paths,
        vec!["/PersonEndpoint/get", "/PersonEndpoint/list", "/PersonEndpoint/page"]
    );

    let get = doc.operation("/PersonEndpoint/get").unwrap();
    assert_eq!(get.access_control, vec!["RolesAllowed(ADMIN)".to_string()]);
    let id = property(request(&doc, "/PersonEndpoint/get"), "id");
    assert_eq!(id.format.as_deref(), Some("int64"));
    let person = response(&doc, "/PersonEndpoint/get");
    assert!(person.is_nullable());
    assert_eq!(person.any_of, Some(vec![reference("com.example.crud.Person")]));

    // wildcards: lower bound for parameters, upper bound for results
    assert_eq!(
        property(request(&doc, "/PersonEndpoint/list"), "filter"),
        &reference("com.example.crud.Person")
    );
    let list = response(&doc, "/PersonEndpoint/list");
    assert_eq!(list.items.as_deref(), Some(&reference("com.example.crud.Person")));

    let page = doc.operation("/PersonEndpoint/page").unwrap();
    assert_eq!(
        page.access_control,
        vec!["PermitAll".to_string(), "RolesAllowed(ADMIN)".to_string()]
    );
    assert_eq!(
        response(&doc, "/PersonEndpoint/page"),
        &reference("com.example.crud.Page_com.example.crud.Person")
    );

    let bound_page = schema(&doc, "com.example.crud.Page_com.example.crud.Person");
    assert_eq!(
        property(bound_page, "items").items.as_deref(),
        Some(&reference("com.example.crud.Person"))
    );
    assert_eq!(
        bound_page.required,
        Some(vec!["items".to_string(), "total".to_string()])
    );
    assert!(doc.schema("com.example.crud.CrudService").is_none());
}

#[test]
fn test_polymorphic_subtypes() {
    let doc = generate("zoo.yaml");

    let animal = schema(&doc, "com.example.zoo.Animal");
    assert_eq!(
        animal.one_of,
        Some(vec![
            reference("com.example.zoo.Dog"),
            reference("com.example.zoo.Cat"),
            reference("com.example.zoo.Parrot"),
        ])
    );
    let discriminator = animal.discriminator.as_ref().unwrap();
    assert_eq!(discriminator.property_name, "kind");
    let mapping: Vec<(&str, &str)> = discriminator
        .mapping
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    assert_eq!(
        mapping,
        vec![
            ("cat", "#/components/schemas/com.example.zoo.Cat"),
            ("dog", "#/components/schemas/com.example.zoo.Dog"),
            ("polly", "#/components/schemas/com.example.zoo.Parrot"),
        ]
    );

    let dog = schema(&doc, "com.example.zoo.Dog");
    assert_eq!(property_names(dog), vec!["kind", "name", "goodBoy"]);
    assert_eq!(
        property(dog, "kind"),
        &Schema::string_enum(vec!["dog".to_string()])
    );
    assert!(dog.required.as_ref().unwrap().contains(&"kind".to_string()));

    let parrot = schema(&doc, "com.example.zoo.Parrot");
    assert_eq!(property_names(parrot), vec!["kind", "name"]);
    assert_eq!(
        property(parrot, "kind").enum_values,
        Some(vec!["polly".to_string()])
    );

    assert_eq!(
        property(request(&doc, "/ZooEndpoint/feed"), "animal"),
        &reference("com.example.zoo.Animal")
    );
    let feed = doc.operation("/ZooEndpoint/feed").unwrap();
    assert_eq!(feed.responses["200"].content, None);
}

#[test]
fn test_validation_constraints() {
    let config = ParserConfig {
        roots: vec!["com.example.signup.SignUpEndpoint".to_string()],
        ..ParserConfig::default()
    };
    let doc = Parser::from_config(config)
        .unwrap()
        .parse(&load("signup.yaml"))
        .unwrap();

    let form = schema(&doc, "com.example.signup.SignUp");
    let username = property(form, "username");
    assert_eq!(username.min_length, Some(3));
    assert_eq!(username.max_length, Some(20));

    let email = property(form, "email");
    assert_eq!(email.format.as_deref(), Some("email"));
    assert!(email.is_nullable());

    let tags = property(form, "tags");
    assert_eq!(tags.max_items, Some(5));
    assert_eq!(tags.max_length, None);

    let age = property(form, "age");
    assert_eq!(age.minimum, Some(18.0));
    assert_eq!(age.maximum, Some(130.0));

    assert_eq!(
        form.required,
        Some(vec!["username".to_string(), "tags".to_string(), "age".to_string()])
    );
    assert!(doc.operation("/ScopeEndpoint/check").is_none());
}

#[test]
fn test_invalid_constraint_names_plugin_and_member() {
    let registry = ClassRegistry::from_yaml(
        r#"
classes:
  - name: com.example.BadEndpoint
    annotations: [{ name: Endpoint }]
    methods:
      - name: submit
        parameters:
          - name: form
            type: com.example.Form
  - name: com.example.Form
    fields:
      - name: code
        type: string
        annotations:
          - name: Size
            values: { min: 5, max: 1 }
"#,
    )
    .unwrap();

    let err = match Parser::from_config(ParserConfig::default())
        .unwrap()
        .parse(&registry)
    {
        Err(err) => err,
        Ok(_) => panic!("expected the constraint to be rejected"),
    };
    match &err {
        Error::Resolution {
            plugin,
            phase,
            entity,
            ..
        } => {
            assert_eq!(plugin, "validation");
            assert_eq!(*phase, "exiting");
            assert_eq!(entity, "property:entity:com.example.Form.code");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(
        err.root_cause(),
        Error::InvalidAnnotationValue { annotation, .. } if annotation == "Size"
    ));
}

#[test]
fn test_nullability_scopes() {
    let config = ParserConfig::from_yaml(
        r#"
roots: [com.example.scope.ScopeEndpoint]
plugins:
  - name: transfer-types
  - name: backbone
  - name: nullability
    config:
      default_nullable: true
"#,
    )
    .unwrap();
    let doc = Parser::from_config(config)
        .unwrap()
        .parse(&load("signup.yaml"))
        .unwrap();

    // package scope
    let plain = schema(&doc, "com.example.scope.Plain");
    assert_eq!(plain.required, Some(vec!["x".to_string()]));

    // class scope, overridden on a member
    let lenient = schema(&doc, "com.example.scope.Lenient");
    assert!(property(lenient, "y").is_nullable());
    assert!(!property(lenient, "z").is_nullable());
    assert_eq!(lenient.required, Some(vec!["z".to_string()]));

    let check = request(&doc, "/ScopeEndpoint/check");
    assert_eq!(
        check.required,
        Some(vec!["plain".to_string(), "lenient".to_string()])
    );
}

#[test]
fn test_boxed_primitives_follow_nullability_annotations() {
    let registry = ClassRegistry::from_yaml(
        r#"
classes:
  - name: com.example.people.PersonEndpoint
    annotations: [{ name: Endpoint }]
    methods:
      - name: save
        parameters:
          - { name: person, type: com.example.people.Person }
          - { name: audit, type: com.example.people.Audit }
  - name: com.example.people.Person
    fields:
      - { name: name, type: String }
      - name: age
        type: Integer
        annotations: [{ name: Nullable }]
      - { name: score, type: java.lang.Long }
  - name: com.example.people.Audit
    annotations: [{ name: NullableApi }]
    fields:
      - { name: revision, type: java.lang.Integer }
      - { name: checksum, type: long }
"#,
    )
    .unwrap();
    let doc = Parser::from_config(ParserConfig::default())
        .unwrap()
        .parse(&registry)
        .unwrap();

    let person = schema(&doc, "com.example.people.Person");
    assert_eq!(
        person.required,
        Some(vec!["name".to_string(), "score".to_string()])
    );
    let age = property(person, "age");
    assert!(age.is_nullable());
    assert_eq!(age.format.as_deref(), Some("int32"));
    assert_eq!(property(person, "score").format.as_deref(), Some("int64"));

    // class scope reaches boxed fields, primitives stay required
    let audit = schema(&doc, "com.example.people.Audit");
    assert!(property(audit, "revision").is_nullable());
    assert!(!property(audit, "checksum").is_nullable());
    assert_eq!(audit.required, Some(vec!["checksum".to_string()]));
}

#[test]
fn test_overloaded_methods_are_rejected() {
    let registry = ClassRegistry::from_yaml(
        r#"
classes:
  - name: com.example.FinderEndpoint
    annotations: [{ name: Endpoint }]
    methods:
      - name: find
        parameters: [{ name: id, type: long }]
        returns: string
      - name: find
        parameters:
          - { name: name, type: string }
          - { name: limit, type: int }
        returns: string
"#,
    )
    .unwrap();

    let err = match Parser::from_config(ParserConfig::default())
        .unwrap()
        .parse(&registry)
    {
        Err(err) => err,
        Ok(doc) => panic!("overload silently merged into {:?}", doc.paths.keys()),
    };
    match err.root_cause() {
        Error::Configuration(message) => {
            assert!(message.contains("/FinderEndpoint/find"), "{message}");
            assert!(message.contains("find(i64)"), "{message}");
            assert!(message.contains("find(string, i32)"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_anonymous_referenced_entity_is_a_cycle_violation() {
    let registry = ClassRegistry::from_yaml(
        r#"
classes:
  - name: com.example.HolderEndpoint
    annotations: [{ name: Endpoint }]
    methods:
      - name: hold
        returns: com.example.Holder
  - name: com.example.Holder
    fields:
      - { name: callback, type: com.example.HolderCallback }
  - name: com.example.HolderCallback
    anonymous: true
    fields:
      - { name: fired, type: boolean }
"#,
    )
    .unwrap();

    let result = Parser::from_config(ParserConfig::default())
        .unwrap()
        .parse(&registry);
    match result {
        Err(err) => assert!(
            matches!(err.root_cause(), Error::CycleViolation(_)),
            "unexpected error: {err}"
        ),
        Ok(_) => panic!("anonymous class was given a component"),
    }
}

#[test]
fn test_unknown_type_fails_unless_allowed() {
    let yaml = r#"
classes:
  - name: com.example.LegacyEndpoint
    annotations: [{ name: Endpoint }]
    methods:
      - name: fetch
        returns: com.example.Missing
"#;
    let registry = ClassRegistry::from_yaml(yaml).unwrap();

    let err = match Parser::from_config(ParserConfig::default())
        .unwrap()
        .parse(&registry)
    {
        Err(err) => err,
        Ok(_) => panic!("expected an unknown type"),
    };
    assert!(matches!(err.root_cause(), Error::UnknownType(name) if name == "com.example.Missing"));

    let lenient = ParserConfig::from_yaml(
        r#"
plugins:
  - name: backbone
    config:
      allow_unknown_types: true
"#,
    )
    .unwrap();
    let doc = Parser::from_config(lenient).unwrap().parse(&registry).unwrap();
    assert_eq!(
        response(&doc, "/LegacyEndpoint/fetch").schema_type.as_deref(),
        Some("object")
    );
}

struct RequiredProbe {
    seen: Arc<Mutex<Vec<(String, bool)>>>,
}

impl Plugin for RequiredProbe {
    fn name(&self) -> &'static str {
        "required-probe"
    }

    fn order(&self) -> i32 {
        -1000
    }

    fn required_plugins(&self) -> Vec<&'static str> {
        vec!["nullability"]
    }

    fn exit(&self, path: &NodePath, ctx: &mut PluginContext) -> Result<()> {
        let node = ctx.current(path)?;
        if let TargetFragment::Property(property) = node.target() {
            self.seen
                .lock()
                .unwrap()
                .push((property.name.clone(), property.required));
        }
        Ok(())
    }
}

#[test]
fn test_custom_plugin_runs_after_its_requirements() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut plugins: Vec<Box<dyn Plugin>> = BUILTIN_PLUGINS
        .iter()
        .map(|name| instantiate(&PluginEntry::new(*name)).unwrap())
        .collect();
    plugins.push(Box::new(RequiredProbe { seen: seen.clone() }));

    let config = ParserConfig {
        roots: vec!["com.example.signup.SignUpEndpoint".to_string()],
        ..ParserConfig::default()
    };
    let parser = Parser::new(config, plugins).unwrap();
    assert_eq!(
        parser.plugins().names(),
        vec![
            "transfer-types",
            "backbone",
            "exposed-base",
            "subtypes",
            "nullability",
            "required-probe",
            "validation",
        ]
    );

    parser.parse(&load("signup.yaml")).unwrap();

    let seen = seen.lock().unwrap();
    // nullability has decided, validation has not run yet
    assert!(seen.contains(&("email".to_string(), false)));
    assert!(seen.contains(&("username".to_string(), true)));
    assert!(seen.contains(&("form".to_string(), true)));
}

#[test]
fn test_plugin_cycle_is_rejected() {
    struct Needy(&'static str, &'static str);

    impl Plugin for Needy {
        fn name(&self) -> &'static str {
            self.0
        }

        fn required_plugins(&self) -> Vec<&'static str> {
            vec![self.1]
        }
    }

    let result = Parser::new(
        ParserConfig::default(),
        vec![Box::new(Needy("a", "b")), Box::new(Needy("b", "a"))],
    );
    assert!(matches!(result, Err(Error::PluginOrdering(_))));
}

#[test]
fn test_output_is_byte_stable() {
    let first = generate("shop.yaml");
    let second = generate("shop.yaml");
    assert_eq!(serialize_yaml(&first).unwrap(), serialize_yaml(&second).unwrap());
    assert_eq!(serialize_json(&first).unwrap(), serialize_json(&second).unwrap());
}

#[test]
fn test_parallel_runs_share_a_parser() {
    let parser = Parser::from_config(ParserConfig::default()).unwrap();
    let registry = load("zoo.yaml");
    let expected = serialize_yaml(&parser.parse(&registry).unwrap()).unwrap();

    let outputs: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| serialize_yaml(&parser.parse(&registry).unwrap()).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for output in outputs {
        assert_eq!(output, expected);
    }
}
