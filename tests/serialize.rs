//! Document assembly: single resources, collections and side-loading.

mod common;

use assert_json_diff::assert_json_eq;
use async_trait::async_trait;
use futures::FutureExt;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{
	City, Country, University, bare_university_shape, city_shape, country_shape,
	prefetched_countries, university_shape, unprefetched_countries,
};
use jsonapi_serializers::error::{RelationError, SerializerError};
use jsonapi_serializers::fields::Field;
use jsonapi_serializers::many::ManySerializer;
use jsonapi_serializers::relations::RelationLoader;
use jsonapi_serializers::serializer::{ResourceSerializer, SerializerContext, UrlReverser};
use jsonapi_serializers::shape::{ResourceShape, resource_type_from_name};

#[tokio::test]
async fn test_minimal_resource_document() {
	let shape = bare_university_shape();
	let mit = University {
		id: 1,
		title: "MIT".to_string(),
		countries: vec![],
	};
	let mut serializer = ResourceSerializer::for_instance(shape, &mit).with_context(
		SerializerContext::new().with_collection_url("https://api.test/universities/"),
	);
	let document = serializer.data().await.unwrap();
	assert_json_eq!(
		document.to_value(),
		json!({
			"data": {
				"type": "university",
				"id": 1,
				"attributes": {"title": "MIT"},
				"relationships": {},
				"links": {"self": "https://api.test/universities/1/"}
			},
			"included": []
		})
	);
}

#[tokio::test]
async fn test_to_many_relationship_with_included() {
	let country = country_shape();
	let shape = university_shape(&country, prefetched_countries());
	let university = University {
		id: 1,
		title: "MIT".to_string(),
		countries: vec![
			Country { id: 2, title: "Ukraine".to_string() },
			Country { id: 27, title: "Poland".to_string() },
		],
	};
	let mut serializer = ResourceSerializer::for_instance(shape, &university);
	let document = serializer.data().await.unwrap();
	assert_json_eq!(
		document.to_value(),
		json!({
			"data": {
				"type": "university",
				"id": 1,
				"attributes": {"title": "MIT"},
				"relationships": {
					"country": {
						"data": [
							{"type": "country", "id": 2},
							{"type": "country", "id": 27}
						]
					}
				}
			},
			"included": [
				{"type": "country", "id": 2, "attributes": {"title": "Ukraine"}},
				{"type": "country", "id": 27, "attributes": {"title": "Poland"}}
			]
		})
	);
}

#[tokio::test]
async fn test_relationship_links_derived_from_resource_url() {
	let country = country_shape();
	let shape = university_shape(&country, prefetched_countries());
	let university = University {
		id: 5,
		title: "LNU".to_string(),
		countries: vec![Country { id: 2, title: "Ukraine".to_string() }],
	};
	let mut serializer = ResourceSerializer::for_instance(shape, &university).with_context(
		SerializerContext::new().with_collection_url("https://api.test/universities/"),
	);
	let document = serializer.data().await.unwrap();
	let block = &document.to_value()["data"]["relationships"]["country"];
	assert_json_eq!(
		block["links"],
		json!({
			"self": "https://api.test/universities/5/relationships/country/",
			"related": "https://api.test/universities/5/country/"
		})
	);
}

#[tokio::test]
async fn test_to_one_relationship_renders_null_when_absent() {
	let country = country_shape();
	let shape = city_shape(&country);
	let city = City {
		id: 9,
		title: "Atlantis".to_string(),
		country: None,
	};
	let mut serializer = ResourceSerializer::for_instance(shape, &city);
	let document = serializer.data().await.unwrap();
	let value = document.to_value();
	assert_eq!(value["data"]["relationships"]["country"]["data"], Value::Null);
	assert_eq!(value["included"], json!([]));
}

#[tokio::test]
async fn test_attributes_are_exactly_the_declared_fields() {
	// `countries` is a property of the domain object but not a declared
	// field, so it never leaks into `attributes`.
	let shape = bare_university_shape();
	let university = University {
		id: 3,
		title: "KPI".to_string(),
		countries: vec![Country { id: 2, title: "Ukraine".to_string() }],
	};
	let mut serializer = ResourceSerializer::for_instance(shape, &university);
	let document = serializer.data().await.unwrap();
	let attributes = document.data.attributes.as_ref().unwrap();
	let names: Vec<_> = attributes.keys().collect();
	assert_eq!(names, vec!["title"]);
}

#[tokio::test]
async fn test_identifier_round_trip() {
	let shape = bare_university_shape();
	let university = University {
		id: 42,
		title: "MIT".to_string(),
		countries: vec![],
	};
	let identifier = shape.identifier_of(&university);
	let codec = jsonapi_serializers::identifier::IdentifierSerializer::new();
	let back = codec.deserialize(&identifier.to_value()).unwrap();
	assert_eq!(back, identifier);
	assert_eq!(back.resource_type, resource_type_from_name("University"));
}

#[tokio::test]
async fn test_document_is_assembled_once() {
	let calls = Arc::new(AtomicUsize::new(0));
	let counting = Arc::clone(&calls);
	let loader: RelationLoader<University, Country> = Arc::new(move |u: &University| {
		counting.fetch_add(1, Ordering::SeqCst);
		let countries = u.countries.clone();
		async move { Ok(countries) }.boxed()
	});
	let country = country_shape();
	let shape = university_shape(&country, loader);
	let university = University {
		id: 1,
		title: "MIT".to_string(),
		countries: vec![Country { id: 2, title: "Ukraine".to_string() }],
	};
	let mut serializer = ResourceSerializer::for_instance(shape, &university);
	let first = serializer.data().await.unwrap().to_value();
	let second = serializer.data().await.unwrap().to_value();
	assert_eq!(first, second);
	assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unprefetched_relation_is_fatal() {
	let country = country_shape();
	let shape = university_shape(&country, unprefetched_countries());
	let university = University {
		id: 1,
		title: "MIT".to_string(),
		countries: vec![],
	};
	let mut serializer = ResourceSerializer::for_instance(shape, &university);
	let error = serializer.data().await.unwrap_err();
	assert_eq!(
		error,
		SerializerError::Relation(RelationError::NotPrefetched("country".to_string()))
	);
}

#[tokio::test]
async fn test_included_traversal_stops_after_one_hop() {
	#[derive(Clone)]
	struct Region {
		id: i64,
		title: String,
	}
	#[derive(Clone)]
	struct Nation {
		id: i64,
		title: String,
		region: Region,
	}
	struct Town {
		id: i64,
		title: String,
		nation: Nation,
	}

	let region_shape = ResourceShape::builder("region", |r: &Region| r.id)
		.attribute(Field::string("title"), |r| Value::from(r.title.clone()))
		.build();
	let nation_loader: RelationLoader<Nation, Region> = Arc::new(|n: &Nation| {
		let region = n.region.clone();
		async move { Ok(vec![region]) }.boxed()
	});
	let nation_shape = ResourceShape::builder("nation", |n: &Nation| n.id)
		.attribute(Field::string("title"), |n| Value::from(n.title.clone()))
		.to_one("region", region_shape, nation_loader)
		.build();
	let town_loader: RelationLoader<Town, Nation> = Arc::new(|t: &Town| {
		let nation = t.nation.clone();
		async move { Ok(vec![nation]) }.boxed()
	});
	let town_shape = ResourceShape::builder("town", |t: &Town| t.id)
		.attribute(Field::string("title"), |t| Value::from(t.title.clone()))
		.to_one("nation", nation_shape, town_loader)
		.build();

	let town = Town {
		id: 1,
		title: "Lviv".to_string(),
		nation: Nation {
			id: 2,
			title: "Ukraine".to_string(),
			region: Region { id: 3, title: "Europe".to_string() },
		},
	};
	let mut serializer = ResourceSerializer::for_instance(town_shape, &town);
	let document = serializer.data().await.unwrap();

	// The nation is included with its region as an identifier block, but
	// the region itself contributes no included entry.
	assert_eq!(document.included.len(), 1);
	assert_json_eq!(
		serde_json::to_value(&document.included[0]).unwrap(),
		json!({
			"type": "nation",
			"id": 2,
			"attributes": {"title": "Ukraine"},
			"relationships": {
				"region": {"data": {"type": "region", "id": 3}}
			}
		})
	);
}

struct StaticReverser;

#[async_trait]
impl UrlReverser for StaticReverser {
	async fn reverse(&self, view_name: &str, id: i64) -> Result<String, String> {
		Ok(format!("https://api.test/{view_name}/{id}/"))
	}
}

#[tokio::test]
async fn test_included_entry_links_use_the_reverser() {
	let country = ResourceShape::builder("country", |c: &Country| c.id)
		.view_name("countries")
		.attribute(Field::string("title"), |c| Value::from(c.title.clone()))
		.build();
	let shape = university_shape(&country, prefetched_countries());
	let university = University {
		id: 1,
		title: "MIT".to_string(),
		countries: vec![Country { id: 2, title: "Ukraine".to_string() }],
	};
	let mut serializer = ResourceSerializer::for_instance(shape, &university)
		.with_context(SerializerContext::new().with_reverser(Arc::new(StaticReverser)));
	let document = serializer.data().await.unwrap();
	assert_eq!(
		document.to_value()["included"][0]["links"],
		json!({"self": "https://api.test/countries/2/"})
	);
}

#[tokio::test]
async fn test_collection_includes_shared_resources_once() {
	let country = country_shape();
	let shape = university_shape(&country, prefetched_countries());
	let ukraine = Country { id: 2, title: "Ukraine".to_string() };
	let poland = Country { id: 27, title: "Poland".to_string() };
	let universities = vec![
		University { id: 1, title: "MIT".to_string(), countries: vec![ukraine.clone()] },
		University {
			id: 2,
			title: "LNU".to_string(),
			countries: vec![poland.clone(), ukraine.clone()],
		},
		University { id: 3, title: "KPI".to_string(), countries: vec![ukraine] },
	];
	let mut serializer = ManySerializer::for_instances(shape, &universities);
	let document = serializer.data().await.unwrap();
	assert_eq!(document.data.len(), 3);
	// Three members referencing two distinct countries side-load exactly
	// two entries, sorted by (type, id).
	assert_json_eq!(
		document.to_value()["included"],
		json!([
			{"type": "country", "id": 2, "attributes": {"title": "Ukraine"}},
			{"type": "country", "id": 27, "attributes": {"title": "Poland"}}
		])
	);
}

#[tokio::test]
async fn test_collection_document_elides_empty_included() {
	let shape = bare_university_shape();
	let universities = vec![
		University { id: 1, title: "MIT".to_string(), countries: vec![] },
		University { id: 2, title: "LNU".to_string(), countries: vec![] },
	];
	let mut serializer = ManySerializer::for_instances(shape, &universities);
	let value = serializer.data().await.unwrap().to_value();
	assert!(value.get("included").is_none());
	assert_eq!(value["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_collection_propagates_precondition_violations() {
	let country = country_shape();
	let shape = university_shape(&country, unprefetched_countries());
	let universities = vec![University {
		id: 1,
		title: "MIT".to_string(),
		countries: vec![],
	}];
	let mut serializer = ManySerializer::for_instances(shape, &universities);
	let error = serializer.data().await.unwrap_err();
	assert!(matches!(error, SerializerError::Relation(_)));
}

#[tokio::test]
async fn test_serialize_mode_rejects_validation_calls() {
	let shape = bare_university_shape();
	let mit = University {
		id: 1,
		title: "MIT".to_string(),
		countries: vec![],
	};
	let mut serializer = ResourceSerializer::for_instance(shape, &mit);
	assert!(matches!(
		serializer.is_valid().await,
		Err(SerializerError::State(_))
	));
}
