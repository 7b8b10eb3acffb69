//! Error types for serialization and validation
//!
//! Two very different failure classes live here and must not be conflated:
//!
//! - [`ValidationErrors`] aggregates per-field problems found while
//!   deserializing client input. These render as JSON:API error documents.
//! - [`RelationError`] signals a server-side configuration defect: a
//!   relation was read without the persistence layer having eagerly loaded
//!   it. It propagates unmodified and is never shown as a validation entry.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// JSON:API version advertised in error documents.
pub const JSONAPI_VERSION: &str = "1.1";

/// Error code used for validation failures in error documents.
pub const VALIDATION_ERROR_CODE: u16 = 403;

/// A relation could not be read because the persistence collaborator did
/// not load it before handing the object to the serializer.
///
/// This is a programming/configuration defect (HTTP 500 class), not a
/// client input problem.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RelationError {
	#[error(
		"relation '{0}' was not selected; the query must select the foreign key before serializing"
	)]
	NotSelected(String),
	#[error(
		"relation '{0}' was not prefetched; the query must prefetch the association before serializing"
	)]
	NotPrefetched(String),
}

/// Top-level serializer error.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SerializerError {
	/// Malformed top-level payload (`data` missing, wrong arity, missing
	/// `type`). Reported once under the key `data`.
	#[error("invalid document structure: {0}")]
	Structure(String),

	/// The serializer was driven out of order, for example reading `.data()`
	/// before `is_valid()` on a deserializer.
	#[error("{0}")]
	State(&'static str),

	/// Relation precondition violation; see [`RelationError`].
	#[error(transparent)]
	Relation(#[from] RelationError),

	/// URL reversal through the routing collaborator failed.
	#[error("url reversal failed for view '{view}': {message}")]
	Reverse { view: String, message: String },

	/// Document encoding failed.
	#[error("serde error: {0}")]
	Serde(String),
}

impl From<serde_json::Error> for SerializerError {
	fn from(e: serde_json::Error) -> Self {
		SerializerError::Serde(e.to_string())
	}
}

/// One validation failure, addressed by a dotted key such as
/// `attributes.title` or `relationships.country.data.id`.
///
/// `field` keeps the leaf field name because the user-facing detail
/// template speaks about the field, not the full path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
	pub key: String,
	pub field: String,
	pub message: String,
}

/// Ordered aggregate of field validation failures.
///
/// Field errors are accumulated across all fields in one validation pass
/// before the operation fails, so a client sees every problem in one round
/// trip. Structural and type-mismatch errors short-circuit instead and end
/// up as a single entry here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
	entries: Vec<FieldError>,
}

impl ValidationErrors {
	pub fn new() -> Self {
		Self::default()
	}

	/// Record a failure. `key` is the full dotted path, `field` the leaf
	/// field name used in the rendered detail.
	pub fn push(
		&mut self,
		key: impl Into<String>,
		field: impl Into<String>,
		message: impl Into<String>,
	) {
		self.entries.push(FieldError {
			key: key.into(),
			field: field.into(),
			message: message.into(),
		});
	}

	/// Merge another aggregate, prefixing every key with `prefix`.
	pub fn merge_prefixed(&mut self, prefix: &str, other: ValidationErrors) {
		for mut error in other.entries {
			error.key = format!("{prefix}{}", error.key);
			self.entries.push(error);
		}
	}

	pub fn merge(&mut self, other: ValidationErrors) {
		self.entries.extend(other.entries);
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
		self.entries.iter()
	}

	/// Render as a JSON:API error document. `pointer` is the request URL.
	pub fn to_document(&self, pointer: &str) -> ErrorDocument {
		ErrorDocument {
			jsonapi: JsonApiObject::default(),
			errors: self
				.entries
				.iter()
				.map(|e| ErrorObject {
					code: VALIDATION_ERROR_CODE,
					source: ErrorSource {
						pointer: pointer.to_string(),
					},
					detail: format_detail(&e.field, &e.message),
				})
				.collect(),
		}
	}
}

/// Detail template shared by every rendered validation error.
///
/// The message is lowercased so `"The value 123 is wrong type."` renders as
/// `"... caused an exception: the value 123 is wrong type."`.
pub fn format_detail(field: &str, message: &str) -> String {
	format!(
		"The JSON field '{}' caused an exception: {}",
		field,
		message.to_lowercase()
	)
}

/// `{"jsonapi": {"version": "1.1"}}` member of an error document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JsonApiObject {
	pub version: String,
}

impl Default for JsonApiObject {
	fn default() -> Self {
		Self {
			version: JSONAPI_VERSION.to_string(),
		}
	}
}

/// One entry of the `errors` array.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorObject {
	pub code: u16,
	pub source: ErrorSource,
	pub detail: String,
}

/// `source` member pointing at the request URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorSource {
	pub pointer: String,
}

/// The document that replaces `data` entirely when validation fails.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorDocument {
	pub jsonapi: JsonApiObject,
	pub errors: Vec<ErrorObject>,
}

impl ErrorDocument {
	pub fn to_value(&self) -> Value {
		serde_json::to_value(self).expect("error document is always serializable")
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_detail_template_lowercases_message() {
		let detail = format_detail("title", "The value 123 is wrong type.");
		assert_eq!(
			detail,
			"The JSON field 'title' caused an exception: the value 123 is wrong type."
		);
	}

	#[test]
	fn test_validation_errors_aggregate_in_order() {
		let mut errors = ValidationErrors::new();
		errors.push("attributes.title", "title", "This field is required.");
		errors.push(
			"relationships.country.data.id",
			"id",
			"The value x is wrong type.",
		);
		assert_eq!(errors.len(), 2);
		let keys: Vec<_> = errors.iter().map(|e| e.key.as_str()).collect();
		assert_eq!(
			keys,
			vec!["attributes.title", "relationships.country.data.id"]
		);
	}

	#[test]
	fn test_merge_prefixed_rewrites_keys() {
		let mut inner = ValidationErrors::new();
		inner.push("type", "type", "This field is required.");
		let mut outer = ValidationErrors::new();
		outer.merge_prefixed("relationships.country.data.", inner);
		assert_eq!(
			outer.iter().next().unwrap().key,
			"relationships.country.data.type"
		);
	}

	#[test]
	fn test_error_document_wire_shape() {
		let mut errors = ValidationErrors::new();
		errors.push("attributes.title", "title", "The value 123 is wrong type.");
		let doc = errors.to_document("/universities/ua/");
		assert_eq!(
			doc.to_value(),
			json!({
				"jsonapi": {"version": "1.1"},
				"errors": [{
					"code": 403,
					"source": {"pointer": "/universities/ua/"},
					"detail": "The JSON field 'title' caused an exception: the value 123 is wrong type."
				}]
			})
		);
	}
}
