//! JSON:API document wire shapes
//!
//! Typed representations of the document boundary: resource objects,
//! relationship blocks, links and the top-level single/collection
//! documents. Attribute and relationship maps use `serde_json::Map` with
//! the `preserve_order` feature so members appear in declaration order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::identifier::ResourceIdentifier;

/// Flat attribute map of a resource object.
pub type Attributes = Map<String, Value>;

/// The `data` member of a relationship block.
///
/// Cardinality is fixed per relationship at declaration time; to-one
/// renders a single identifier or `null`, to-many an array.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RelationData {
	Many(Vec<ResourceIdentifier>),
	One(Option<ResourceIdentifier>),
}

impl RelationData {
	/// All identifiers carried by the block.
	pub fn identifiers(&self) -> Vec<&ResourceIdentifier> {
		match self {
			RelationData::Many(ids) => ids.iter().collect(),
			RelationData::One(Some(id)) => vec![id],
			RelationData::One(None) => vec![],
		}
	}

	pub fn is_empty(&self) -> bool {
		self.identifiers().is_empty()
	}
}

/// `links` member of a relationship block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelationshipLinks {
	#[serde(rename = "self")]
	pub self_link: String,
	pub related: String,
}

impl RelationshipLinks {
	/// Derive relationship links from the owning resource's URL.
	pub fn for_relation(resource_url: &str, name: &str) -> Self {
		Self {
			self_link: format!("{resource_url}relationships/{name}/"),
			related: format!("{resource_url}{name}/"),
		}
	}
}

/// One relationship block: `{data, links?}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationshipObject {
	pub data: RelationData,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub links: Option<RelationshipLinks>,
}

/// `links` member of a resource object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceLinks {
	#[serde(rename = "self")]
	pub self_link: String,
}

/// A full resource object: `{type, id, attributes, relationships, links}`.
///
/// Top-level resources always carry `attributes` and `relationships`
/// (possibly empty maps); included entries prune empty sections, matching
/// the side-loading behavior of the original document shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceObject {
	#[serde(rename = "type")]
	pub resource_type: String,
	pub id: i64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub attributes: Option<Attributes>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub relationships: Option<Map<String, Value>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub links: Option<ResourceLinks>,
}

impl ResourceObject {
	pub fn identifier(&self) -> ResourceIdentifier {
		ResourceIdentifier::new(self.resource_type.clone(), self.id)
	}
}

/// Top-level document for a single resource.
///
/// `included` is always present, even when empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
	pub data: ResourceObject,
	pub included: Vec<ResourceObject>,
}

impl Document {
	pub fn to_value(&self) -> Value {
		serde_json::to_value(self).expect("document is always serializable")
	}
}

/// Top-level document for a collection.
///
/// `included` is present only when non-empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionDocument {
	pub data: Vec<ResourceObject>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub included: Vec<ResourceObject>,
}

impl CollectionDocument {
	pub fn to_value(&self) -> Value {
		serde_json::to_value(self).expect("document is always serializable")
	}
}

/// Per-call accumulator of side-loaded resources, deduplicated by
/// `(type, id)`. First occurrence wins; later duplicates are dropped
/// without re-serialization.
#[derive(Debug, Default)]
pub struct IncludedSet {
	seen: HashSet<(String, i64)>,
	entries: Vec<ResourceObject>,
}

impl IncludedSet {
	pub fn new() -> Self {
		Self::default()
	}

	/// Whether a resource with this identity was already harvested.
	pub fn contains(&self, identifier: &ResourceIdentifier) -> bool {
		self.seen.contains(&identifier.key())
	}

	/// Insert an entry unless its identity is already present.
	/// Returns `true` if the entry was added.
	pub fn insert(&mut self, entry: ResourceObject) -> bool {
		if self.seen.insert(entry.identifier().key()) {
			self.entries.push(entry);
			true
		} else {
			false
		}
	}

	pub fn merge(&mut self, entries: Vec<ResourceObject>) {
		for entry in entries {
			self.insert(entry);
		}
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn into_entries(self) -> Vec<ResourceObject> {
		self.entries
	}

	/// Drain into a list sorted by `(type, id)`, the collection-level
	/// ordering of the `included` array.
	pub fn into_sorted_entries(self) -> Vec<ResourceObject> {
		let mut entries = self.entries;
		entries.sort_by(|a, b| {
			(a.resource_type.as_str(), a.id).cmp(&(b.resource_type.as_str(), b.id))
		});
		entries
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn entry(resource_type: &str, id: i64) -> ResourceObject {
		ResourceObject {
			resource_type: resource_type.to_string(),
			id,
			attributes: None,
			relationships: None,
			links: None,
		}
	}

	#[test]
	fn test_relation_data_serializes_untagged() {
		let one = RelationData::One(Some(ResourceIdentifier::new("city", 245)));
		assert_eq!(
			serde_json::to_value(&one).unwrap(),
			json!({"type": "city", "id": 245})
		);
		let none = RelationData::One(None);
		assert_eq!(serde_json::to_value(&none).unwrap(), json!(null));
		let many = RelationData::Many(vec![
			ResourceIdentifier::new("country", 2),
			ResourceIdentifier::new("country", 27),
		]);
		assert_eq!(
			serde_json::to_value(&many).unwrap(),
			json!([{"type": "country", "id": 2}, {"type": "country", "id": 27}])
		);
	}

	#[test]
	fn test_relationship_links_from_resource_url() {
		let links = RelationshipLinks::for_relation("/universities/ua/1/", "country");
		assert_eq!(links.self_link, "/universities/ua/1/relationships/country/");
		assert_eq!(links.related, "/universities/ua/1/country/");
	}

	#[test]
	fn test_included_set_first_occurrence_wins() {
		let mut set = IncludedSet::new();
		let mut first = entry("country", 2);
		first.attributes = Some(Attributes::new());
		assert!(set.insert(first.clone()));
		assert!(!set.insert(entry("country", 2)));
		assert_eq!(set.len(), 1);
		assert_eq!(set.into_entries()[0], first);
	}

	#[test]
	fn test_included_set_sorted_drain() {
		let mut set = IncludedSet::new();
		set.insert(entry("country", 27));
		set.insert(entry("city", 1334));
		set.insert(entry("country", 2));
		let sorted: Vec<_> = set
			.into_sorted_entries()
			.into_iter()
			.map(|e| (e.resource_type, e.id))
			.collect();
		assert_eq!(
			sorted,
			vec![
				("city".to_string(), 1334),
				("country".to_string(), 2),
				("country".to_string(), 27)
			]
		);
	}

	#[test]
	fn test_collection_document_elides_empty_included() {
		let doc = CollectionDocument {
			data: vec![],
			included: vec![],
		};
		assert_eq!(doc.to_value(), json!({"data": []}));
	}

	#[test]
	fn test_single_document_keeps_empty_included() {
		let doc = Document {
			data: entry("university", 1),
			included: vec![],
		};
		assert_eq!(
			doc.to_value(),
			json!({"data": {"type": "university", "id": 1}, "included": []})
		);
	}
}
