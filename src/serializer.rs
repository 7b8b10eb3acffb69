//! Resource document composer
//!
//! [`ResourceSerializer`] assembles or parses one full JSON:API resource
//! document. A serializer is bound at construction either to a domain
//! instance (serialize mode) or to raw input data (deserialize mode), and
//! exposes the DRF-style protocol: `data()` for the assembled document,
//! `is_valid()` / `validated_data()` / `errors()` for input validation.
//!
//! Assembled documents and validation outcomes are memoized write-once;
//! constructing a fresh serializer is the only way to force recomputation.
//! A document is an immutable snapshot of a point-in-time read.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::document::{Attributes, Document, IncludedSet, RelationData, ResourceLinks, ResourceObject};
use crate::error::{ErrorDocument, SerializerError, ValidationErrors};
use crate::fields::{Field, Validator};
use crate::relations::{deserialize_relations, serialize_relations};
use crate::shape::ResourceShape;

/// Routing collaborator: reverse a named view plus an id into an absolute
/// URL. The call is awaitable; it is one of the engine's suspension points.
#[async_trait]
pub trait UrlReverser: Send + Sync {
	async fn reverse(&self, view_name: &str, id: i64) -> Result<String, String>;
}

/// Per-request serializer context: hyperlink configuration and the request
/// URL used as the error document pointer.
#[derive(Clone, Default)]
pub struct SerializerContext {
	/// Base URL of the resource collection; enables `links` synthesis.
	pub collection_url: Option<String>,
	/// Full request URL, used as `source.pointer` in error documents.
	pub request_url: Option<String>,
	/// Routing collaborator for included resources' self links.
	pub reverser: Option<Arc<dyn UrlReverser>>,
}

impl SerializerContext {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_collection_url(mut self, url: impl Into<String>) -> Self {
		self.collection_url = Some(url.into());
		self
	}

	pub fn with_request_url(mut self, url: impl Into<String>) -> Self {
		self.request_url = Some(url.into());
		self
	}

	pub fn with_reverser(mut self, reverser: Arc<dyn UrlReverser>) -> Self {
		self.reverser = Some(reverser);
		self
	}
}

impl fmt::Debug for SerializerContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SerializerContext")
			.field("collection_url", &self.collection_url)
			.field("request_url", &self.request_url)
			.field("reverser", &self.reverser.is_some())
			.finish()
	}
}

/// Validated internal values of a successfully deserialized resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedResource {
	pub resource_type: String,
	/// Absent on creation payloads.
	pub id: Option<i64>,
	pub attributes: Attributes,
	/// Relationship blocks in declaration order.
	pub relationships: Vec<(String, RelationData)>,
}

impl ValidatedResource {
	pub fn relationship(&self, name: &str) -> Option<&RelationData> {
		self.relationships
			.iter()
			.find(|(n, _)| n == name)
			.map(|(_, data)| data)
	}
}

/// Serializer for a single JSON:API resource document.
///
/// # Examples
///
/// ```
/// use jsonapi_serializers::fields::Field;
/// use jsonapi_serializers::serializer::ResourceSerializer;
/// use jsonapi_serializers::shape::ResourceShape;
/// use serde_json::Value;
///
/// struct University {
///     id: i64,
///     title: String,
/// }
///
/// # futures::executor::block_on(async {
/// let shape = ResourceShape::builder("university", |u: &University| u.id)
///     .attribute(Field::string("title"), |u| Value::from(u.title.clone()))
///     .build();
/// let university = University { id: 1, title: "MIT".to_string() };
/// let mut serializer = ResourceSerializer::for_instance(shape, &university);
/// let document = serializer.data().await.unwrap();
/// assert_eq!(document.data.id, 1);
/// # });
/// ```
pub struct ResourceSerializer<'a, T> {
	shape: Arc<ResourceShape<T>>,
	instance: Option<&'a T>,
	initial_data: Option<Value>,
	context: SerializerContext,
	document: Option<Document>,
	validated: Option<ValidatedResource>,
	errors: Option<ValidationErrors>,
}

impl<'a, T: Send + Sync + 'static> ResourceSerializer<'a, T> {
	/// Serialize mode: bind to a domain instance.
	pub fn for_instance(shape: Arc<ResourceShape<T>>, instance: &'a T) -> Self {
		Self {
			shape,
			instance: Some(instance),
			initial_data: None,
			context: SerializerContext::default(),
			document: None,
			validated: None,
			errors: None,
		}
	}

	/// Deserialize mode: bind to raw input data.
	pub fn for_data(shape: Arc<ResourceShape<T>>, data: Value) -> Self {
		Self {
			shape,
			instance: None,
			initial_data: Some(data),
			context: SerializerContext::default(),
			document: None,
			validated: None,
			errors: None,
		}
	}

	pub fn with_context(mut self, context: SerializerContext) -> Self {
		self.context = context;
		self
	}

	pub fn shape(&self) -> &Arc<ResourceShape<T>> {
		&self.shape
	}

	/// The assembled resource document (serialize mode only).
	///
	/// The first call drives the identifier, attributes and relationships
	/// codecs and harvests side-loaded resources; repeated calls return
	/// the cached result without recomputation.
	pub async fn data(&mut self) -> Result<&Document, SerializerError> {
		if self.initial_data.is_some() {
			return Err(SerializerError::State(
				"a serializer constructed with input data exposes validated values; call `is_valid()` and `validated_data()` instead of `data()`",
			));
		}
		if self.document.is_none() {
			let instance = self.instance.ok_or(SerializerError::State(
				"serializer was constructed without an instance",
			))?;
			self.document = Some(self.assemble(instance).await?);
		}
		Ok(self.document.as_ref().expect("document was just assembled"))
	}

	/// The assembled document, consuming the serializer.
	pub async fn into_document(mut self) -> Result<Document, SerializerError> {
		self.data().await?;
		Ok(self.document.expect("document was just assembled"))
	}

	async fn assemble(&self, instance: &T) -> Result<Document, SerializerError> {
		let identifier = self.shape.identifier_of(instance);
		let resource_url = self
			.context
			.collection_url
			.as_deref()
			.map(|collection| format!("{collection}{}/", identifier.id));
		let attributes = self.shape.serialize_attributes(instance);
		let mut included = IncludedSet::new();
		let reverser = self.context.reverser.as_deref();
		let relationships = serialize_relations(
			&self.shape,
			instance,
			resource_url.as_deref(),
			Some((&mut included, reverser)),
		)
		.await?;
		debug!(
			resource_type = %identifier.resource_type,
			id = identifier.id,
			included = included.len(),
			"assembled resource document"
		);
		Ok(Document {
			data: ResourceObject {
				resource_type: identifier.resource_type,
				id: identifier.id,
				attributes: Some(attributes),
				relationships: Some(relationships),
				links: resource_url.map(|url| ResourceLinks { self_link: url }),
			},
			included: included.into_entries(),
		})
	}

	/// Run the validation pipeline (deserialize mode only).
	///
	/// Structural and type-mismatch problems short-circuit; field problems
	/// are aggregated across all attributes and relationships in one pass.
	/// The outcome is memoized.
	pub async fn is_valid(&mut self) -> Result<bool, SerializerError> {
		if self.instance.is_some() {
			return Err(SerializerError::State(
				"`is_valid()` requires the serializer to be constructed with input data",
			));
		}
		if self.validated.is_some() {
			return Ok(true);
		}
		if self.errors.is_some() {
			return Ok(false);
		}
		let payload = self.initial_data.as_ref().ok_or(SerializerError::State(
			"serializer was constructed without input data",
		))?;
		match validate_payload(&self.shape, payload) {
			Ok(validated) => {
				self.validated = Some(validated);
				Ok(true)
			}
			Err(errors) => {
				debug!(errors = errors.len(), "resource validation failed");
				self.errors = Some(errors);
				Ok(false)
			}
		}
	}

	/// Validated values after a successful `is_valid()`. An invalid
	/// serializer never exposes partial values.
	pub fn validated_data(&self) -> Result<&ValidatedResource, SerializerError> {
		if self.errors.is_some() {
			return Err(SerializerError::State(
				"validation failed; no validated data is available",
			));
		}
		self.validated.as_ref().ok_or(SerializerError::State(
			"`is_valid()` must be called before accessing validated data",
		))
	}

	pub fn errors(&self) -> Option<&ValidationErrors> {
		self.errors.as_ref()
	}

	/// The JSON:API error document for a failed validation, pointed at
	/// the contextual request URL.
	pub fn error_document(&self) -> Option<ErrorDocument> {
		let pointer = self.context.request_url.as_deref().unwrap_or("");
		self.errors.as_ref().map(|errors| errors.to_document(pointer))
	}
}

/// Structural checks, type check, then field validation.
fn validate_payload<T: Send + Sync + 'static>(
	shape: &ResourceShape<T>,
	payload: &Value,
) -> Result<ValidatedResource, ValidationErrors> {
	let mut errors = ValidationErrors::new();

	let Some(data) = payload.get("data") else {
		errors.push("data", "data", "The document must contain a data member.");
		return Err(errors);
	};
	// A one-element list is unwrapped; other arities are structural errors.
	let data = match data {
		Value::Array(elements) if elements.len() == 1 => &elements[0],
		Value::Array(elements) if elements.is_empty() => {
			errors.push("data", "data", "The data member must not be empty.");
			return Err(errors);
		}
		Value::Array(_) => {
			errors.push("data", "data", "Bulk action not supported.");
			return Err(errors);
		}
		other => other,
	};
	if !data.is_object() {
		errors.push("data", "data", "The data member must be an object.");
		return Err(errors);
	}
	let Some(type_value) = data.get("type") else {
		errors.push("data", "data", "The data object must contain a type member.");
		return Err(errors);
	};

	if type_value.as_str() != Some(shape.resource_type()) {
		errors.push("data.type", "type", "Incorrect object type.");
		return Err(errors);
	}

	let mut id = None;
	if let Some(raw_id) = data.get("id") {
		let id_field = Field::integer("id").with_validator(Validator::positive_integer());
		match id_field.validate(Some(raw_id)) {
			Ok(value) => id = value.and_then(|v| v.as_i64()),
			Err(message) => errors.push("data.id", "id", message),
		}
	}

	let mut attributes = Attributes::new();
	match shape.deserialize_attributes(data.get("attributes")) {
		Ok(validated) => attributes = validated,
		Err(attribute_errors) => errors.merge(attribute_errors),
	}

	let mut relationships = Vec::new();
	match deserialize_relations(shape, data.get("relationships")) {
		Ok(validated) => relationships = validated,
		Err(relation_errors) => errors.merge(relation_errors),
	}

	if errors.is_empty() {
		Ok(ValidatedResource {
			resource_type: shape.resource_type().to_string(),
			id,
			attributes,
			relationships,
		})
	} else {
		Err(errors)
	}
}
