//! Relationships codec
//!
//! Serializes a resource's declared forward associations into JSON:API
//! relationship blocks and harvests related objects for side-loading.
//! Harvesting goes exactly one hop deep: an included entry carries its own
//! attributes and its own relationships as identifier blocks, but its
//! transitive relations contribute no further included entries, which
//! bounds the size of the included graph.
//!
//! Relation loaders are asynchronous: reading a to-many association's
//! members or a lazily resolved singular reference is a suspension point.
//! A loader must return [`RelationError`] when the persistence layer did
//! not eagerly load the association; that error propagates unmodified.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::trace;

use crate::document::{
	IncludedSet, RelationData, RelationshipLinks, RelationshipObject, ResourceLinks,
	ResourceObject,
};
use crate::error::{RelationError, SerializerError, ValidationErrors};
use crate::fields::next_creation_counter;
use crate::identifier::{IdentifierSerializer, ResourceIdentifier};
use crate::registry::Declared;
use crate::serializer::UrlReverser;
use crate::shape::ResourceShape;

/// Relationship cardinality, fixed at declaration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
	ToOne,
	ToMany,
}

/// Async closure loading the related objects of an association.
///
/// A to-one association yields zero or one object; a to-many association
/// yields all members in the collaborator's iteration order.
pub type RelationLoader<T, R> =
	Arc<dyn for<'a> Fn(&'a T) -> BoxFuture<'a, Result<Vec<R>, RelationError>> + Send + Sync>;

/// Type-erased view of a declared relation, so shapes can hold relations
/// to heterogeneous related types.
#[async_trait]
pub(crate) trait ErasedRelation<T: Sync>: Send + Sync {
	fn kind(&self) -> RelationKind;
	fn creation_order(&self) -> u64;

	/// Load the association and reduce each member to its identifier.
	async fn identifiers(
		&self,
		instance: &T,
	) -> Result<Vec<ResourceIdentifier>, SerializerError>;

	/// Load the association, emit identifiers, and append a full one-hop
	/// description of each member to `included` (first occurrence wins).
	async fn harvest(
		&self,
		instance: &T,
		included: &mut IncludedSet,
		reverser: Option<&dyn UrlReverser>,
	) -> Result<Vec<ResourceIdentifier>, SerializerError>;
}

pub(crate) struct TypedRelation<T, R> {
	kind: RelationKind,
	counter: u64,
	related: Arc<ResourceShape<R>>,
	load: RelationLoader<T, R>,
}

impl<T, R> TypedRelation<T, R>
where
	T: Send + Sync + 'static,
	R: Send + Sync + 'static,
{
	pub(crate) fn declare(
		kind: RelationKind,
		related: Arc<ResourceShape<R>>,
		load: RelationLoader<T, R>,
	) -> Arc<dyn ErasedRelation<T>> {
		Arc::new(Self {
			kind,
			counter: next_creation_counter(),
			related,
			load,
		})
	}

	/// Describe one related object for the included array: identifier,
	/// attributes, and its own relationships one level deep. Empty
	/// sections are pruned.
	async fn describe(
		&self,
		object: &R,
		reverser: Option<&dyn UrlReverser>,
	) -> Result<ResourceObject, SerializerError> {
		let identifier = self.related.identifier_of(object);
		let attributes = self.related.serialize_attributes(object);
		let mut relationships = Map::new();
		for (name, relation) in self.related.relations().iter() {
			let identifiers = relation.identifiers(object).await?;
			if identifiers.is_empty() {
				continue;
			}
			let data = match relation.kind() {
				RelationKind::ToOne => RelationData::One(identifiers.into_iter().next()),
				RelationKind::ToMany => RelationData::Many(identifiers),
			};
			relationships.insert(
				name.to_string(),
				serde_json::to_value(RelationshipObject { data, links: None })?,
			);
		}
		let links = match (self.related.view_name(), reverser) {
			(Some(view), Some(reverser)) => {
				let url = reverser.reverse(view, identifier.id).await.map_err(|message| {
					SerializerError::Reverse {
						view: view.to_string(),
						message,
					}
				})?;
				Some(ResourceLinks { self_link: url })
			}
			_ => None,
		};
		Ok(ResourceObject {
			resource_type: identifier.resource_type,
			id: identifier.id,
			attributes: (!attributes.is_empty()).then_some(attributes),
			relationships: (!relationships.is_empty()).then_some(relationships),
			links,
		})
	}
}

#[async_trait]
impl<T, R> ErasedRelation<T> for TypedRelation<T, R>
where
	T: Send + Sync + 'static,
	R: Send + Sync + 'static,
{
	fn kind(&self) -> RelationKind {
		self.kind
	}

	fn creation_order(&self) -> u64 {
		self.counter
	}

	async fn identifiers(
		&self,
		instance: &T,
	) -> Result<Vec<ResourceIdentifier>, SerializerError> {
		let objects = (self.load)(instance).await?;
		Ok(objects
			.iter()
			.map(|object| self.related.identifier_of(object))
			.collect())
	}

	async fn harvest(
		&self,
		instance: &T,
		included: &mut IncludedSet,
		reverser: Option<&dyn UrlReverser>,
	) -> Result<Vec<ResourceIdentifier>, SerializerError> {
		let objects = (self.load)(instance).await?;
		let mut identifiers = Vec::with_capacity(objects.len());
		for object in &objects {
			let identifier = self.related.identifier_of(object);
			if !included.contains(&identifier) {
				let entry = self.describe(object, reverser).await?;
				included.insert(entry);
			} else {
				trace!(
					resource_type = %identifier.resource_type,
					id = identifier.id,
					"skipping already harvested resource"
				);
			}
			identifiers.push(identifier);
		}
		Ok(identifiers)
	}
}

/// One declared relation of a shape.
pub struct RelationDecl<T> {
	inner: Arc<dyn ErasedRelation<T>>,
}

impl<T: Sync> RelationDecl<T> {
	pub(crate) fn new(inner: Arc<dyn ErasedRelation<T>>) -> Self {
		Self { inner }
	}

	pub fn kind(&self) -> RelationKind {
		self.inner.kind()
	}

	pub(crate) async fn identifiers(
		&self,
		instance: &T,
	) -> Result<Vec<ResourceIdentifier>, SerializerError> {
		self.inner.identifiers(instance).await
	}

	pub(crate) async fn harvest(
		&self,
		instance: &T,
		included: &mut IncludedSet,
		reverser: Option<&dyn UrlReverser>,
	) -> Result<Vec<ResourceIdentifier>, SerializerError> {
		self.inner.harvest(instance, included, reverser).await
	}
}

impl<T> Clone for RelationDecl<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T: Sync> Declared for RelationDecl<T> {
	fn creation_order(&self) -> u64 {
		self.inner.creation_order()
	}
}

impl<T: Sync> std::fmt::Debug for RelationDecl<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RelationDecl")
			.field("kind", &self.inner.kind())
			.finish_non_exhaustive()
	}
}

/// Serialize every declared relationship of `instance`.
///
/// When `included` is supplied, related objects are harvested one hop deep
/// into it. When `resource_url` is supplied, each relationship block gets
/// `self`/`related` links derived from it.
pub(crate) async fn serialize_relations<T: Sync>(
	shape: &ResourceShape<T>,
	instance: &T,
	resource_url: Option<&str>,
	mut included: Option<(&mut IncludedSet, Option<&dyn UrlReverser>)>,
) -> Result<Map<String, Value>, SerializerError> {
	let mut relationships = Map::new();
	for (name, relation) in shape.relations().iter() {
		let identifiers = match included.as_mut() {
			Some((set, reverser)) => relation.harvest(instance, set, *reverser).await?,
			None => relation.identifiers(instance).await?,
		};
		let data = match relation.kind() {
			RelationKind::ToOne => RelationData::One(identifiers.into_iter().next()),
			RelationKind::ToMany => RelationData::Many(identifiers),
		};
		let links = resource_url.map(|url| RelationshipLinks::for_relation(url, name));
		relationships.insert(
			name.to_string(),
			serde_json::to_value(RelationshipObject { data, links })?,
		);
	}
	Ok(relationships)
}

/// Validate the `relationships` member of an incoming payload.
///
/// Every invalid identifier of every relationship is reported in one pass,
/// keyed `relationships.<name>.data.<field>`. A present-but-empty to-many
/// list deserializes to an empty block; an absent relationship is skipped,
/// permitting partial relationship updates.
pub(crate) fn deserialize_relations<T: Sync>(
	shape: &ResourceShape<T>,
	payload_relationships: Option<&Value>,
) -> Result<Vec<(String, RelationData)>, ValidationErrors> {
	let codec = IdentifierSerializer::new();
	let mut errors = ValidationErrors::new();
	let mut validated = Vec::new();
	let map = payload_relationships.and_then(Value::as_object);
	for (name, relation) in shape.relations().iter() {
		let Some(block) = map.and_then(|m| m.get(name)) else {
			continue;
		};
		let Some(data) = block.get("data") else {
			errors.push(
				format!("relationships.{name}.data"),
				"data",
				"This field is required.",
			);
			continue;
		};
		match (relation.kind(), data) {
			(RelationKind::ToMany, Value::Array(elements)) => {
				let mut identifiers = Vec::with_capacity(elements.len());
				let mut valid = true;
				for element in elements {
					match codec.deserialize(element) {
						Ok(identifier) => identifiers.push(identifier),
						Err(element_errors) => {
							valid = false;
							errors.merge_prefixed(
								&format!("relationships.{name}.data."),
								element_errors,
							);
						}
					}
				}
				if valid {
					validated.push((name.to_string(), RelationData::Many(identifiers)));
				}
			}
			(RelationKind::ToMany, _) => {
				errors.push(
					format!("relationships.{name}.data"),
					"data",
					"Expected a list of resource identifiers.",
				);
			}
			(RelationKind::ToOne, Value::Null) => {
				validated.push((name.to_string(), RelationData::One(None)));
			}
			(RelationKind::ToOne, element @ Value::Object(_)) => {
				match codec.deserialize(element) {
					Ok(identifier) => {
						validated.push((name.to_string(), RelationData::One(Some(identifier))));
					}
					Err(element_errors) => {
						errors.merge_prefixed(
							&format!("relationships.{name}.data."),
							element_errors,
						);
					}
				}
			}
			(RelationKind::ToOne, _) => {
				errors.push(
					format!("relationships.{name}.data"),
					"data",
					"Expected a single resource identifier.",
				);
			}
		}
	}
	if errors.is_empty() {
		Ok(validated)
	} else {
		Err(errors)
	}
}
