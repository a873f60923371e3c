use crate::type_model::PrimitiveType;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const OPENAPI_VERSION: &str = "3.0.1";

/// Prefix of a reference to a component schema
pub const COMPONENTS_PREFIX: &str = "#/components/schemas/";

const JSON_CONTENT: &str = "application/json";

/// Complete OpenAPI document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiDocument {
    /// OpenAPI version
    pub openapi: String,
    /// API info
    pub info: Info,
    /// One tag per endpoint
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    /// API paths, `/{Endpoint}/{method}`
    pub paths: BTreeMap<String, PathItem>,
    /// Components (schemas)
    pub components: Components,
}

/// OpenAPI Info object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    /// API title
    pub title: String,
    /// API version
    pub version: String,
    /// API description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OpenAPI Tag object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    /// Fully qualified name of the endpoint class
    #[serde(rename = "x-class-name", default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

/// OpenAPI PathItem object; endpoint methods are always invoked with `POST`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
}

/// OpenAPI Operation object - represents a single endpoint method
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Operation ID, `{Endpoint}_{method}`
    #[serde(rename = "operationId")]
    pub operation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
    #[serde(rename = "requestBody", default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    pub responses: BTreeMap<String, Response>,
    /// Access-control annotations, captured verbatim and never interpreted
    #[serde(rename = "x-access-control", default, skip_serializing_if = "Vec::is_empty")]
    pub access_control: Vec<String>,
}

/// OpenAPI RequestBody object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    pub content: BTreeMap<String, MediaType>,
}

/// OpenAPI MediaType object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Schema,
}

/// OpenAPI Response object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<BTreeMap<String, MediaType>>,
}

/// OpenAPI Components object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Components {
    #[serde(default)]
    pub schemas: BTreeMap<String, Schema>,
}

/// OpenAPI Discriminator object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discriminator {
    #[serde(rename = "propertyName")]
    pub property_name: String,
    /// Subtype name to schema reference
    pub mapping: BTreeMap<String, String>,
}

/// OpenAPI Schema definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Reference to a component schema
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// The type of the schema (string, integer, object, array, etc.)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    /// Format for primitive types (e.g., "int32", "int64", "date-time")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
    /// Properties for object types, in declaration order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, Schema>>,
    /// Required property names for object types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// Items schema for array types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    /// Value schema for map types
    #[serde(rename = "additionalProperties", default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<Schema>>,
    /// Enum values for enum types
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(rename = "oneOf", default, skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<Schema>>,
    #[serde(rename = "anyOf", default, skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<Schema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<Discriminator>,
    #[serde(rename = "minLength", default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(rename = "maxLength", default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(rename = "minItems", default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(rename = "maxItems", default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(rename = "exclusiveMinimum", default, skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<bool>,
    #[serde(rename = "exclusiveMaximum", default, skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl Default for Info {
    fn default() -> Self {
        Self {
            title: "Generated API".to_string(),
            version: "1.0.0".to_string(),
            description: Some("API documentation generated from endpoint metadata".to_string()),
        }
    }
}

impl OpenApiDocument {
    pub fn new(info: Info) -> Self {
        debug!("Initializing OpenAPI document \"{}\"", info.title);
        Self {
            openapi: OPENAPI_VERSION.to_string(),
            info,
            tags: Vec::new(),
            paths: BTreeMap::new(),
            components: Components::default(),
        }
    }

    /// Register an endpoint tag and its operations
    pub fn add_endpoint(&mut self, name: &str, class_name: &str, operations: &IndexMap<String, Operation>) {
        debug!("Adding endpoint {} with {} operations", name, operations.len());
        if !self.tags.iter().any(|t| t.name == name) {
            self.tags.push(Tag {
                name: name.to_string(),
                class_name: Some(class_name.to_string()),
            });
            self.tags.sort_by(|a, b| a.name.cmp(&b.name));
        }
        for (path, operation) in operations {
            self.paths.entry(path.clone()).or_default().post = Some(operation.clone());
        }
    }

    /// Add a component schema; a schema already present under the name is extended
    pub fn add_schema(&mut self, name: &str, schema: Schema) {
        debug!("Adding component schema {}", name);
        match self.components.schemas.get_mut(name) {
            Some(existing) => existing.merge(schema),
            None => {
                self.components.schemas.insert(name.to_string(), schema);
            }
        }
    }

    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.components.schemas.get(name)
    }

    pub fn operation(&self, path: &str) -> Option<&Operation> {
        self.paths.get(path).and_then(|item| item.post.as_ref())
    }
}

impl Operation {
    /// Build an operation from its request object schema and optional response schema
    pub fn with_bodies(mut self, request: Schema, response: Option<Schema>) -> Self {
        let has_parameters = request
            .properties
            .as_ref()
            .map(|p| !p.is_empty())
            .unwrap_or(false);
        if has_parameters {
            self.request_body = Some(RequestBody {
                content: json_content(request),
            });
        }

        self.responses.insert(
            "200".to_string(),
            Response {
                description: String::new(),
                content: response.map(json_content),
            },
        );
        self
    }
}

fn json_content(schema: Schema) -> BTreeMap<String, MediaType> {
    let mut content = BTreeMap::new();
    content.insert(JSON_CONTENT.to_string(), MediaType { schema });
    content
}

impl Schema {
    pub fn of_type(schema_type: &str) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            ..Self::default()
        }
    }

    /// An object schema with an (empty) ordered property map
    pub fn object() -> Self {
        Self {
            schema_type: Some("object".to_string()),
            properties: Some(IndexMap::new()),
            ..Self::default()
        }
    }

    /// A reference to a component schema
    pub fn reference(component: &str) -> Self {
        Self {
            reference: Some(format!("{}{}", COMPONENTS_PREFIX, component)),
            ..Self::default()
        }
    }

    pub fn string_enum(values: Vec<String>) -> Self {
        Self {
            schema_type: Some("string".to_string()),
            enum_values: Some(values),
            ..Self::default()
        }
    }

    /// Convert a primitive type to an OpenAPI schema
    pub fn primitive(primitive: PrimitiveType) -> Self {
        use PrimitiveType::*;
        let (schema_type, format) = match primitive {
            String | Char => ("string", None),
            I8 | I16 | I32 | U8 | U16 | U32 => ("integer", Some("int32")),
            I64 | I128 | U64 | U128 => ("integer", Some("int64")),
            F32 => ("number", Some("float")),
            F64 => ("number", Some("double")),
            Bool => ("boolean", None),
            Date => ("string", Some("date")),
            DateTime => ("string", Some("date-time")),
            Time => ("string", Some("time")),
            Uuid => ("string", Some("uuid")),
            Binary => ("string", Some("binary")),
        };

        Self {
            schema_type: Some(schema_type.to_string()),
            format: format.map(|s| s.to_string()),
            ..Self::default()
        }
    }

    pub fn is_reference(&self) -> bool {
        self.reference.is_some()
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable == Some(true)
    }

    pub fn is_array(&self) -> bool {
        self.schema_type.as_deref() == Some("array")
    }

    /// Mark the schema nullable. A reference cannot carry sibling keywords, so it
    /// is wrapped as `anyOf: [$ref]` next to `nullable: true`.
    pub fn mark_nullable(&mut self) {
        if self.is_nullable() {
            return;
        }
        if self.is_reference() {
            let reference = std::mem::take(self);
            self.any_of = Some(vec![reference]);
        }
        self.nullable = Some(true);
    }

    /// Add a property; an existing property of the same name is extended
    pub fn add_property(&mut self, name: &str, schema: Schema, required: bool) {
        let properties = self.properties.get_or_insert_with(IndexMap::new);
        match properties.get_mut(name) {
            Some(existing) => existing.merge(schema),
            None => {
                properties.insert(name.to_string(), schema);
            }
        }
        if required {
            self.add_required(name);
        }
    }

    pub fn add_required(&mut self, name: &str) {
        let required = self.required.get_or_insert_with(Vec::new);
        if !required.iter().any(|r| r == name) {
            required.push(name.to_string());
        }
    }

    /// Merge another schema into this one without dropping anything already set:
    /// missing keywords are filled in, properties and required names are unioned.
    pub fn merge(&mut self, other: Schema) {
        fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
            if slot.is_none() {
                *slot = value;
            }
        }

        fill(&mut self.reference, other.reference);
        fill(&mut self.schema_type, other.schema_type);
        fill(&mut self.format, other.format);
        fill(&mut self.nullable, other.nullable);
        fill(&mut self.deprecated, other.deprecated);
        fill(&mut self.enum_values, other.enum_values);
        fill(&mut self.one_of, other.one_of);
        fill(&mut self.any_of, other.any_of);
        fill(&mut self.discriminator, other.discriminator);
        fill(&mut self.min_length, other.min_length);
        fill(&mut self.max_length, other.max_length);
        fill(&mut self.min_items, other.min_items);
        fill(&mut self.max_items, other.max_items);
        fill(&mut self.minimum, other.minimum);
        fill(&mut self.maximum, other.maximum);
        fill(&mut self.exclusive_minimum, other.exclusive_minimum);
        fill(&mut self.exclusive_maximum, other.exclusive_maximum);
        fill(&mut self.pattern, other.pattern);

        match (&mut self.items, other.items) {
            (Some(items), Some(other_items)) => items.merge(*other_items),
            (slot, value) => fill(slot, value),
        }
        match (&mut self.additional_properties, other.additional_properties) {
            (Some(values), Some(other_values)) => values.merge(*other_values),
            (slot, value) => fill(slot, value),
        }

        if let Some(properties) = other.properties {
            let own = self.properties.get_or_insert_with(IndexMap::new);
            for (name, schema) in properties {
                match own.get_mut(&name) {
                    Some(existing) => existing.merge(schema),
                    None => {
                        own.insert(name, schema);
                    }
                }
            }
        }
        for name in other.required.into_iter().flatten() {
            self.add_required(&name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_primitive_schemas() {
        let schema = Schema::primitive(PrimitiveType::I64);
        assert_eq!(schema.schema_type.as_deref(), Some("integer"));
        assert_eq!(schema.format.as_deref(), Some("int64"));

        let schema = Schema::primitive(PrimitiveType::DateTime);
        assert_eq!(schema.schema_type.as_deref(), Some("string"));
        assert_eq!(schema.format.as_deref(), Some("date-time"));

        assert_eq!(Schema::primitive(PrimitiveType::Bool).format, None);
    }

    #[test]
    fn test_mark_nullable_wraps_reference() {
        let mut schema = Schema::reference("com.example.User");
        schema.mark_nullable();

        assert_eq!(schema.reference, None);
        assert_eq!(schema.nullable, Some(true));
        assert_eq!(
            schema.any_of,
            Some(vec![Schema::reference("com.example.User")])
        );

        schema.mark_nullable();
        assert_eq!(schema.any_of.as_ref().map(|a| a.len()), Some(1));
    }

    #[test]
    fn test_merge_keeps_existing_values() {
        let mut schema = Schema::object();
        schema.add_property("name", Schema::of_type("string"), true);
        schema.format = Some("custom".to_string());

        let mut other = Schema::object();
        other.add_property("name", Schema { max_length: Some(5), ..Schema::default() }, false);
        other.add_property("age", Schema::of_type("integer"), true);
        other.format = Some("ignored".to_string());

        schema.merge(other);

        assert_eq!(schema.format.as_deref(), Some("custom"));
        let properties = schema.properties.as_ref().unwrap();
        let names: Vec<&String> = properties.keys().collect();
        assert_eq!(names, vec!["name", "age"]);
        assert_eq!(properties["name"].schema_type.as_deref(), Some("string"));
        assert_eq!(properties["name"].max_length, Some(5));
        assert_eq!(schema.required, Some(vec!["name".to_string(), "age".to_string()]));
    }

    #[test]
    fn test_operation_bodies() {
        let operation = Operation {
            operation_id: "UserEndpoint_list".to_string(),
            ..Operation::default()
        }
        .with_bodies(Schema::object(), Some(Schema::of_type("string")));

        assert!(operation.request_body.is_none());
        let response = &operation.responses["200"];
        assert_eq!(
            response.content.as_ref().unwrap()[JSON_CONTENT].schema,
            Schema::of_type("string")
        );
    }

    #[test]
    fn test_add_endpoint_registers_tag_once() {
        let mut document = OpenApiDocument::new(Info {
            title: "Test".to_string(),
            version: "1.0.0".to_string(),
            description: None,
        });
        let mut operations = IndexMap::new();
        operations.insert(
            "/UserEndpoint/list".to_string(),
            Operation::default().with_bodies(Schema::object(), None),
        );

        document.add_endpoint("UserEndpoint", "com.example.UserEndpoint", &operations);
        document.add_endpoint("UserEndpoint", "com.example.UserEndpoint", &operations);

        assert_eq!(document.tags.len(), 1);
        assert!(document.operation("/UserEndpoint/list").is_some());
    }
}
