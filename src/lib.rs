//! Asynchronous JSON:API document serializers
//!
//! This crate turns domain objects into JSON:API resource documents and
//! validates incoming documents back into typed values. The moving parts:
//!
//! - [`fields`]: primitive field declarations with type and custom
//!   validators, ordered by declaration.
//! - [`shape`]: [`shape::ResourceShape`], the per-resource declaration
//!   built from fields, explicit accessor closures and relations; shapes
//!   compose by extension with in-place shadowing.
//! - [`identifier`]: the `{type, id}` resource identifier codec.
//! - [`relations`]: to-one/to-many relation declarations backed by async
//!   loaders, with one-hop `included` harvesting.
//! - [`serializer`]: [`serializer::ResourceSerializer`], the single
//!   resource document composer and validation pipeline.
//! - [`many`]: [`many::ManySerializer`], the collection composer with a
//!   deduplicated, sorted `included` pool.
//! - [`pagination`]: limit/offset slicing with JSON:API top-level links.
//! - [`error`]: validation aggregates, the rendered error document and
//!   the relation precondition errors.
//!
//! # Examples
//!
//! ```
//! use jsonapi_serializers::fields::Field;
//! use jsonapi_serializers::serializer::ResourceSerializer;
//! use jsonapi_serializers::shape::ResourceShape;
//! use serde_json::{Value, json};
//!
//! struct University {
//!     id: i64,
//!     title: String,
//! }
//!
//! # futures::executor::block_on(async {
//! let shape = ResourceShape::builder("university", |u: &University| u.id)
//!     .attribute(Field::string("title"), |u| Value::from(u.title.clone()))
//!     .build();
//!
//! let mit = University { id: 1, title: "MIT".to_string() };
//! let mut serializer = ResourceSerializer::for_instance(shape.clone(), &mit);
//! let document = serializer.data().await.unwrap();
//! assert_eq!(
//!     serde_json::to_value(document).unwrap(),
//!     json!({
//!         "data": {
//!             "type": "university",
//!             "id": 1,
//!             "attributes": {"title": "MIT"},
//!             "relationships": {}
//!         },
//!         "included": []
//!     })
//! );
//! # });
//! ```

pub mod document;
pub mod error;
pub mod fields;
pub mod identifier;
pub mod many;
pub mod pagination;
pub mod registry;
pub mod relations;
pub mod serializer;
pub mod shape;

pub use document::{
	Attributes, CollectionDocument, Document, RelationData, RelationshipLinks, RelationshipObject,
	ResourceLinks, ResourceObject,
};
pub use error::{
	ErrorDocument, FieldError, RelationError, SerializerError, ValidationErrors,
};
pub use fields::{Field, Validator, ValueType};
pub use identifier::{IdentifierSerializer, ResourceIdentifier};
pub use many::ManySerializer;
pub use pagination::{LimitOffsetPagination, Page, PaginationLinks};
pub use relations::{RelationKind, RelationLoader};
pub use serializer::{ResourceSerializer, SerializerContext, UrlReverser, ValidatedResource};
pub use shape::{ResourceShape, ResourceShapeBuilder, resource_type_from_name};
