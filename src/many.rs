//! Collection document composer
//!
//! [`ManySerializer`] wraps the single-resource serializer over a slice of
//! instances or a list payload. Serialization produces one collection
//! document whose `included` pool is deduplicated across members and sorted
//! for stable output; deserialization validates every element and is
//! all-or-nothing.

use serde_json::{Value, json};
use tracing::debug;

use std::sync::Arc;

use crate::document::{CollectionDocument, IncludedSet};
use crate::error::{ErrorDocument, SerializerError, ValidationErrors};
use crate::serializer::{ResourceSerializer, SerializerContext, ValidatedResource};
use crate::shape::ResourceShape;

/// Serializer for a JSON:API collection document.
///
/// # Examples
///
/// ```
/// use jsonapi_serializers::fields::Field;
/// use jsonapi_serializers::many::ManySerializer;
/// use jsonapi_serializers::shape::ResourceShape;
/// use serde_json::Value;
///
/// struct City {
///     id: i64,
///     name: String,
/// }
///
/// # futures::executor::block_on(async {
/// let shape = ResourceShape::builder("city", |c: &City| c.id)
///     .attribute(Field::string("name"), |c| Value::from(c.name.clone()))
///     .build();
/// let cities = vec![
///     City { id: 1, name: "Kyiv".to_string() },
///     City { id: 2, name: "Lviv".to_string() },
/// ];
/// let mut serializer = ManySerializer::for_instances(shape, &cities);
/// let document = serializer.data().await.unwrap();
/// assert_eq!(document.data.len(), 2);
/// # });
/// ```
pub struct ManySerializer<'a, T> {
	shape: Arc<ResourceShape<T>>,
	instances: Option<&'a [T]>,
	initial_data: Option<Value>,
	context: SerializerContext,
	document: Option<CollectionDocument>,
	validated: Option<Vec<ValidatedResource>>,
	errors: Option<ValidationErrors>,
}

impl<'a, T: Send + Sync + 'static> ManySerializer<'a, T> {
	/// Serialize mode: bind to a slice of domain instances.
	pub fn for_instances(shape: Arc<ResourceShape<T>>, instances: &'a [T]) -> Self {
		Self {
			shape,
			instances: Some(instances),
			initial_data: None,
			context: SerializerContext::default(),
			document: None,
			validated: None,
			errors: None,
		}
	}

	/// Deserialize mode: bind to a raw list payload.
	pub fn for_data(shape: Arc<ResourceShape<T>>, data: Value) -> Self {
		Self {
			shape,
			instances: None,
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

	/// The assembled collection document (serialize mode only), memoized.
	///
	/// Members keep input order. The included pool is deduplicated by
	/// `(type, id)` with the first occurrence winning, then sorted by the
	/// same key so equal collections always render identically.
	pub async fn data(&mut self) -> Result<&CollectionDocument, SerializerError> {
		if self.initial_data.is_some() {
			return Err(SerializerError::State(
				"a serializer constructed with input data exposes validated values; call `is_valid()` and `validated_data()` instead of `data()`",
			));
		}
		if self.document.is_none() {
			let instances = self.instances.ok_or(SerializerError::State(
				"serializer was constructed without instances",
			))?;
			let mut data = Vec::with_capacity(instances.len());
			let mut included = IncludedSet::new();
			for instance in instances {
				let child = ResourceSerializer::for_instance(Arc::clone(&self.shape), instance)
					.with_context(self.context.clone());
				let member = child.into_document().await?;
				data.push(member.data);
				included.merge(member.included);
			}
			debug!(
				resource_type = %self.shape.resource_type(),
				members = data.len(),
				included = included.len(),
				"assembled collection document"
			);
			self.document = Some(CollectionDocument {
				data,
				included: included.into_sorted_entries(),
			});
		}
		Ok(self.document.as_ref().expect("document was just assembled"))
	}

	/// The assembled collection document, consuming the serializer.
	pub async fn into_document(mut self) -> Result<CollectionDocument, SerializerError> {
		self.data().await?;
		Ok(self.document.expect("document was just assembled"))
	}

	/// Validate every element of the list payload (deserialize mode only).
	///
	/// Each element runs through the full single-resource pipeline; errors
	/// from element `i` are reported under `data.{i}.` and one failing
	/// element invalidates the whole collection.
	pub async fn is_valid(&mut self) -> Result<bool, SerializerError> {
		if self.instances.is_some() {
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
		let Some(Value::Array(elements)) = payload.get("data") else {
			let mut errors = ValidationErrors::new();
			errors.push("data", "data", "The data member must be a list.");
			self.errors = Some(errors);
			return Ok(false);
		};
		let elements = elements.clone();
		let mut errors = ValidationErrors::new();
		let mut validated = Vec::with_capacity(elements.len());
		for (index, element) in elements.into_iter().enumerate() {
			let mut child = ResourceSerializer::for_data(
				Arc::clone(&self.shape),
				json!({ "data": element }),
			);
			if child.is_valid().await? {
				validated.push(
					child
						.validated_data()
						.expect("element validation just succeeded")
						.clone(),
				);
			} else if let Some(element_errors) = child.errors() {
				errors.merge_prefixed(&format!("data.{index}."), element_errors.clone());
			}
		}
		if errors.is_empty() {
			self.validated = Some(validated);
			Ok(true)
		} else {
			debug!(errors = errors.len(), "collection validation failed");
			self.errors = Some(errors);
			Ok(false)
		}
	}

	/// Validated elements after a successful `is_valid()`.
	pub fn validated_data(&self) -> Result<&[ValidatedResource], SerializerError> {
		if self.errors.is_some() {
			return Err(SerializerError::State(
				"validation failed; no validated data is available",
			));
		}
		self.validated
			.as_deref()
			.ok_or(SerializerError::State(
				"`is_valid()` must be called before accessing validated data",
			))
	}

	pub fn errors(&self) -> Option<&ValidationErrors> {
		self.errors.as_ref()
	}

	/// The JSON:API error document for a failed validation.
	pub fn error_document(&self) -> Option<ErrorDocument> {
		let pointer = self.context.request_url.as_deref().unwrap_or("");
		self.errors.as_ref().map(|errors| errors.to_document(pointer))
	}
}
