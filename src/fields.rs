//! Field primitives
//!
//! Leaf value descriptors for resource attributes: a declared value type,
//! a required contract and an ordered list of validators. Validators run in
//! declaration order and short-circuit on the first failure.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static CREATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Next value of the global declaration counter.
///
/// Every field and relation declaration takes a counter at construction
/// time; registries order declarations by it, never by map iteration order.
pub(crate) fn next_creation_counter() -> u64 {
	CREATION_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Expected runtime type of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
	String,
	Integer,
	/// Arbitrary JSON structure (object or array).
	Json,
	/// No type constraint.
	Any,
}

impl ValueType {
	pub fn matches(&self, value: &Value) -> bool {
		match self {
			ValueType::String => value.is_string(),
			ValueType::Integer => value.is_i64() || value.is_u64(),
			ValueType::Json => value.is_object() || value.is_array(),
			ValueType::Any => true,
		}
	}
}

/// Render a value the way it appears in validation messages: strings bare,
/// everything else as JSON.
pub(crate) fn display_value(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}

/// A single validation rule.
#[derive(Clone)]
pub enum Validator {
	/// Compare the runtime type against the expected one.
	OfType(ValueType),
	/// Arbitrary predicate returning an error message on failure.
	Custom(Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>),
}

impl Validator {
	pub fn run(&self, value: &Value) -> Result<(), String> {
		match self {
			Validator::OfType(expected) => {
				if expected.matches(value) {
					Ok(())
				} else {
					Err(format!("The value {} is wrong type.", display_value(value)))
				}
			}
			Validator::Custom(f) => f(value),
		}
	}

	/// Validator requiring a strictly positive integer.
	pub fn positive_integer() -> Self {
		Validator::Custom(Arc::new(|value: &Value| match value.as_i64() {
			Some(id) if id > 0 => Ok(()),
			_ => Err(format!(
				"The value {} is not a positive integer.",
				display_value(value)
			)),
		}))
	}

	/// Validator rejecting empty strings.
	pub fn not_blank() -> Self {
		Validator::Custom(Arc::new(|value: &Value| match value.as_str() {
			Some("") => Err("This field may not be blank.".to_string()),
			_ => Ok(()),
		}))
	}
}

impl fmt::Debug for Validator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Validator::OfType(t) => f.debug_tuple("OfType").field(t).finish(),
			Validator::Custom(_) => f.write_str("Custom(..)"),
		}
	}
}

/// A named, typed leaf contract.
///
/// Construction assigns a creation counter so that registries can order
/// declarations deterministically. Fields are cheap to clone; a clone is
/// taken per serializer instantiation so no state leaks across requests.
///
/// # Examples
///
/// ```
/// use jsonapi_serializers::fields::Field;
/// use serde_json::json;
///
/// let field = Field::string("title");
/// assert!(field.validate(Some(&json!("MIT"))).is_ok());
/// assert!(field.validate(Some(&json!(123))).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct Field {
	name: String,
	value_type: ValueType,
	required: bool,
	validators: Vec<Validator>,
	counter: u64,
}

impl Field {
	pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
		let mut validators = Vec::new();
		if value_type != ValueType::Any {
			validators.push(Validator::OfType(value_type));
		}
		Self {
			name: name.into(),
			value_type,
			required: true,
			validators,
			counter: next_creation_counter(),
		}
	}

	/// String field with a type-check validator.
	pub fn string(name: impl Into<String>) -> Self {
		Self::new(name, ValueType::String)
	}

	/// Integer field with a type-check validator.
	pub fn integer(name: impl Into<String>) -> Self {
		Self::new(name, ValueType::Integer)
	}

	/// Opaque JSON field with a type-check validator.
	pub fn json(name: impl Into<String>) -> Self {
		Self::new(name, ValueType::Json)
	}

	/// Mark the field optional; an absent value is then silently skipped.
	pub fn optional(mut self) -> Self {
		self.required = false;
		self
	}

	/// Append a validator; validators run in the order they were added.
	pub fn with_validator(mut self, validator: Validator) -> Self {
		self.validators.push(validator);
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn value_type(&self) -> ValueType {
		self.value_type
	}

	pub fn is_required(&self) -> bool {
		self.required
	}

	pub(crate) fn creation_order(&self) -> u64 {
		self.counter
	}

	/// Run the required contract and all validators against a raw value.
	///
	/// Returns `Ok(None)` for an absent optional value (skip), the first
	/// failing validator's message otherwise.
	pub fn validate(&self, value: Option<&Value>) -> Result<Option<Value>, String> {
		let Some(value) = value else {
			return if self.required {
				Err("This field is required.".to_string())
			} else {
				Ok(None)
			};
		};
		for validator in &self.validators {
			validator.run(value)?;
		}
		Ok(Some(value.clone()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_type_check_message() {
		let field = Field::string("title");
		let err = field.validate(Some(&json!(123))).unwrap_err();
		assert_eq!(err, "The value 123 is wrong type.");
	}

	#[test]
	fn test_type_check_message_renders_strings_bare() {
		let field = Field::integer("id");
		let err = field.validate(Some(&json!("one"))).unwrap_err();
		assert_eq!(err, "The value one is wrong type.");
	}

	#[test]
	fn test_required_absent_is_an_error() {
		let field = Field::string("title");
		assert_eq!(
			field.validate(None).unwrap_err(),
			"This field is required."
		);
	}

	#[test]
	fn test_optional_absent_is_skipped() {
		let field = Field::string("title").optional();
		assert_eq!(field.validate(None).unwrap(), None);
	}

	#[test]
	fn test_validators_short_circuit_in_order() {
		let field = Field::new("id", ValueType::Any)
			.with_validator(Validator::OfType(ValueType::Integer))
			.with_validator(Validator::positive_integer());
		// Wrong type fails on the first validator; the positive check
		// never runs.
		let err = field.validate(Some(&json!("x"))).unwrap_err();
		assert_eq!(err, "The value x is wrong type.");
		let err = field.validate(Some(&json!(-3))).unwrap_err();
		assert_eq!(err, "The value -3 is not a positive integer.");
	}

	#[test]
	fn test_creation_counter_is_monotonic() {
		let a = Field::string("a");
		let b = Field::string("b");
		assert!(a.creation_order() < b.creation_order());
	}

	#[test]
	fn test_json_field_accepts_objects_and_arrays() {
		let field = Field::json("payload");
		assert!(field.validate(Some(&json!({"k": 1}))).is_ok());
		assert!(field.validate(Some(&json!([1, 2]))).is_ok());
		assert!(field.validate(Some(&json!("nope"))).is_err());
	}
}
