//! Resource identifier codec
//!
//! The minimal `{type, id}` reference to a resource. Serialization derives
//! it from a shape's type name and id accessor; deserialization validates
//! the pair field by field. Whether the pair resolves to a real persisted
//! object is the persistence collaborator's business, not checked here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationErrors;
use crate::fields::{Field, Validator};
use crate::registry::DeclarationRegistry;

/// `{type, id}` pair identifying a resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ResourceIdentifier {
	#[serde(rename = "type")]
	pub resource_type: String,
	pub id: i64,
}

impl ResourceIdentifier {
	pub fn new(resource_type: impl Into<String>, id: i64) -> Self {
		Self {
			resource_type: resource_type.into(),
			id,
		}
	}

	/// Dedup key for included-set accounting.
	pub fn key(&self) -> (String, i64) {
		(self.resource_type.clone(), self.id)
	}

	pub fn to_value(&self) -> Value {
		serde_json::to_value(self).expect("identifier is always serializable")
	}
}

/// Validating codec for resource identifiers.
///
/// # Examples
///
/// ```
/// use jsonapi_serializers::identifier::IdentifierSerializer;
/// use serde_json::json;
///
/// let codec = IdentifierSerializer::new();
/// let ident = codec.deserialize(&json!({"type": "country", "id": 2})).unwrap();
/// assert_eq!(ident.resource_type, "country");
/// assert_eq!(ident.id, 2);
/// ```
#[derive(Debug, Clone)]
pub struct IdentifierSerializer {
	fields: DeclarationRegistry<Field>,
}

impl Default for IdentifierSerializer {
	fn default() -> Self {
		Self::new()
	}
}

impl IdentifierSerializer {
	pub fn new() -> Self {
		let type_field = Field::string("type").with_validator(Validator::not_blank());
		let id_field = Field::integer("id").with_validator(Validator::positive_integer());
		Self {
			fields: DeclarationRegistry::collect(
				&[],
				vec![("type".into(), type_field), ("id".into(), id_field)],
			),
		}
	}

	/// Validate a raw identifier payload.
	///
	/// Failures are field-scoped under the keys `type` and `id`; every
	/// failing field is reported, not just the first.
	pub fn deserialize(&self, payload: &Value) -> Result<ResourceIdentifier, ValidationErrors> {
		let mut errors = ValidationErrors::new();
		let object = payload.as_object();
		for (name, field) in self.fields.iter() {
			let value = object.and_then(|map| map.get(name));
			if let Err(message) = field.validate(value) {
				errors.push(name, name, message);
			}
		}
		if !errors.is_empty() {
			return Err(errors);
		}
		// Validation above guarantees both members are present and typed.
		let object = object.expect("validated payload is an object");
		Ok(ResourceIdentifier {
			resource_type: object["type"].as_str().unwrap_or_default().to_string(),
			id: object["id"].as_i64().unwrap_or_default(),
		})
	}
}
