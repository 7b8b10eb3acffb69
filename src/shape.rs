//! Resource shapes
//!
//! A [`ResourceShape`] is the declarative description of how a domain type
//! maps onto a JSON:API resource: its type name, an id accessor, attribute
//! fields with typed reader closures, and relation declarations. Shapes are
//! built once with [`ResourceShapeBuilder`] and shared behind an `Arc`;
//! accessors are explicit closures registered at definition time, never
//! reflection by field name.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::document::Attributes;
use crate::error::ValidationErrors;
use crate::fields::Field;
use crate::identifier::ResourceIdentifier;
use crate::registry::{Declared, DeclarationRegistry};
use crate::relations::{RelationDecl, RelationKind, RelationLoader, TypedRelation};

/// Closure reading one attribute value off an instance.
pub type ValueReader<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;

/// Derive the default resource type name from a domain type name:
/// lower-cased, underscores stripped.
///
/// # Examples
///
/// ```
/// use jsonapi_serializers::shape::resource_type_from_name;
///
/// assert_eq!(resource_type_from_name("University"), "university");
/// assert_eq!(resource_type_from_name("User_Profile"), "userprofile");
/// ```
pub fn resource_type_from_name(name: &str) -> String {
	name.to_lowercase().replace('_', "")
}

/// One declared attribute: the field contract plus its reader.
pub struct AttributeDecl<T> {
	field: Field,
	reader: ValueReader<T>,
}

impl<T> AttributeDecl<T> {
	pub fn field(&self) -> &Field {
		&self.field
	}

	pub fn read(&self, instance: &T) -> Value {
		(self.reader)(instance)
	}
}

impl<T> Clone for AttributeDecl<T> {
	fn clone(&self) -> Self {
		Self {
			field: self.field.clone(),
			reader: Arc::clone(&self.reader),
		}
	}
}

impl<T> Declared for AttributeDecl<T> {
	fn creation_order(&self) -> u64 {
		self.field.creation_order()
	}
}

impl<T> fmt::Debug for AttributeDecl<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AttributeDecl")
			.field("field", &self.field)
			.finish_non_exhaustive()
	}
}

/// Declarative mapping from a domain type to a JSON:API resource.
pub struct ResourceShape<T> {
	resource_type: String,
	view_name: Option<String>,
	id_reader: Arc<dyn Fn(&T) -> i64 + Send + Sync>,
	attributes: DeclarationRegistry<AttributeDecl<T>>,
	relations: DeclarationRegistry<RelationDecl<T>>,
}

impl<T: Sync> fmt::Debug for ResourceShape<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ResourceShape")
			.field("resource_type", &self.resource_type)
			.field("view_name", &self.view_name)
			.field("attributes", &self.attributes.len())
			.field("relations", &self.relations.len())
			.finish()
	}
}

impl<T> ResourceShape<T> {
	/// Start building a shape. `id` is the explicit id accessor; there is
	/// no fallback reflection path.
	pub fn builder(
		resource_type: impl Into<String>,
		id: impl Fn(&T) -> i64 + Send + Sync + 'static,
	) -> ResourceShapeBuilder<T> {
		ResourceShapeBuilder {
			resource_type: resource_type.into(),
			view_name: None,
			id_reader: Arc::new(id),
			attributes: Vec::new(),
			relations: Vec::new(),
			bases: Vec::new(),
		}
	}

	pub fn resource_type(&self) -> &str {
		&self.resource_type
	}

	pub fn view_name(&self) -> Option<&str> {
		self.view_name.as_deref()
	}

	pub fn id_of(&self, instance: &T) -> i64 {
		(self.id_reader)(instance)
	}

	/// Minimal `{type, id}` reference to an instance.
	pub fn identifier_of(&self, instance: &T) -> ResourceIdentifier {
		ResourceIdentifier::new(self.resource_type.clone(), self.id_of(instance))
	}

	pub fn attributes(&self) -> &DeclarationRegistry<AttributeDecl<T>> {
		&self.attributes
	}

	pub fn relations(&self) -> &DeclarationRegistry<RelationDecl<T>> {
		&self.relations
	}

	/// Read every declared attribute off an instance, in declaration
	/// order. The set is closed: nothing outside the declarations is
	/// emitted, whatever else the object carries.
	pub fn serialize_attributes(&self, instance: &T) -> Attributes {
		let mut attributes = Attributes::new();
		for (name, decl) in self.attributes.iter() {
			attributes.insert(name.to_string(), decl.read(instance));
		}
		attributes
	}

	/// Validate the `attributes` member of an incoming payload.
	///
	/// Every declared field is checked in one pass; failures are keyed
	/// `attributes.<field>`. Absent optional fields are skipped.
	pub fn deserialize_attributes(
		&self,
		payload_attributes: Option<&Value>,
	) -> Result<Attributes, ValidationErrors> {
		let mut errors = ValidationErrors::new();
		let mut validated = Attributes::new();
		let map = payload_attributes.and_then(Value::as_object);
		for (name, decl) in self.attributes.iter() {
			let raw = map.and_then(|m| m.get(name));
			match decl.field().validate(raw) {
				Ok(Some(value)) => {
					validated.insert(name.to_string(), value);
				}
				Ok(None) => {}
				Err(message) => errors.push(format!("attributes.{name}"), name, message),
			}
		}
		if errors.is_empty() {
			Ok(validated)
		} else {
			Err(errors)
		}
	}
}

/// Builder for [`ResourceShape`].
///
/// # Examples
///
/// ```
/// use jsonapi_serializers::fields::Field;
/// use jsonapi_serializers::shape::ResourceShape;
/// use serde_json::Value;
///
/// struct University {
///     id: i64,
///     title: String,
/// }
///
/// let shape = ResourceShape::builder("university", |u: &University| u.id)
///     .attribute(Field::string("title"), |u| Value::from(u.title.clone()))
///     .build();
/// assert_eq!(shape.resource_type(), "university");
/// ```
pub struct ResourceShapeBuilder<T> {
	resource_type: String,
	view_name: Option<String>,
	id_reader: Arc<dyn Fn(&T) -> i64 + Send + Sync>,
	attributes: Vec<(String, AttributeDecl<T>)>,
	relations: Vec<(String, RelationDecl<T>)>,
	bases: Vec<Arc<ResourceShape<T>>>,
}

impl<T: Send + Sync + 'static> ResourceShapeBuilder<T> {
	/// Inherit declarations from a base shape. Own declarations of the
	/// same name shadow the base's while keeping its position.
	pub fn extending(mut self, base: &Arc<ResourceShape<T>>) -> Self {
		self.bases.push(Arc::clone(base));
		self
	}

	/// View name used to reverse this resource's detail URL when it
	/// appears as an included entry.
	pub fn view_name(mut self, name: impl Into<String>) -> Self {
		self.view_name = Some(name.into());
		self
	}

	/// Declare an attribute field with its reader closure.
	pub fn attribute(
		mut self,
		field: Field,
		reader: impl Fn(&T) -> Value + Send + Sync + 'static,
	) -> Self {
		let name = field.name().to_string();
		self.attributes.push((
			name,
			AttributeDecl {
				field,
				reader: Arc::new(reader),
			},
		));
		self
	}

	/// Declare a singular forward association.
	///
	/// The loader yields zero or one related object; an unloaded relation
	/// must surface as [`crate::error::RelationError`].
	pub fn to_one<R: Send + Sync + 'static>(
		mut self,
		name: impl Into<String>,
		related: Arc<ResourceShape<R>>,
		load: RelationLoader<T, R>,
	) -> Self {
		let name = name.into();
		self.relations.push((
			name,
			RelationDecl::new(TypedRelation::declare(RelationKind::ToOne, related, load)),
		));
		self
	}

	/// Declare a multi-valued forward association.
	pub fn to_many<R: Send + Sync + 'static>(
		mut self,
		name: impl Into<String>,
		related: Arc<ResourceShape<R>>,
		load: RelationLoader<T, R>,
	) -> Self {
		let name = name.into();
		self.relations.push((
			name,
			RelationDecl::new(TypedRelation::declare(RelationKind::ToMany, related, load)),
		));
		self
	}

	pub fn build(self) -> Arc<ResourceShape<T>> {
		let attribute_bases: Vec<&DeclarationRegistry<AttributeDecl<T>>> =
			self.bases.iter().map(|b| &b.attributes).collect();
		let relation_bases: Vec<&DeclarationRegistry<RelationDecl<T>>> =
			self.bases.iter().map(|b| &b.relations).collect();
		let view_name = self
			.view_name
			.or_else(|| self.bases.iter().find_map(|b| b.view_name.clone()));
		Arc::new(ResourceShape {
			resource_type: self.resource_type,
			view_name,
			id_reader: self.id_reader,
			attributes: DeclarationRegistry::collect(&attribute_bases, self.attributes),
			relations: DeclarationRegistry::collect(&relation_bases, self.relations),
		})
	}
}
