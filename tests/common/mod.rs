//! Shared domain fixtures for integration tests.
#![allow(dead_code)]

use futures::FutureExt;
use serde_json::Value;
use std::sync::Arc;

use jsonapi_serializers::error::RelationError;
use jsonapi_serializers::fields::Field;
use jsonapi_serializers::relations::RelationLoader;
use jsonapi_serializers::shape::ResourceShape;

#[derive(Debug, Clone, PartialEq)]
pub struct Country {
	pub id: i64,
	pub title: String,
}

#[derive(Debug, Clone)]
pub struct City {
	pub id: i64,
	pub title: String,
	pub country: Option<Country>,
}

#[derive(Debug, Clone)]
pub struct University {
	pub id: i64,
	pub title: String,
	pub countries: Vec<Country>,
}

pub fn country_shape() -> Arc<ResourceShape<Country>> {
	ResourceShape::builder("country", |c: &Country| c.id)
		.attribute(Field::string("title"), |c| Value::from(c.title.clone()))
		.build()
}

/// Loader over data the persistence layer already prefetched.
pub fn prefetched_countries() -> RelationLoader<University, Country> {
	Arc::new(|u: &University| {
		let countries = u.countries.clone();
		async move { Ok(countries) }.boxed()
	})
}

/// Loader simulating a missing prefetch configuration.
pub fn unprefetched_countries() -> RelationLoader<University, Country> {
	Arc::new(|_: &University| {
		async move { Err(RelationError::NotPrefetched("country".to_string())) }.boxed()
	})
}

pub fn university_shape(
	country: &Arc<ResourceShape<Country>>,
	countries: RelationLoader<University, Country>,
) -> Arc<ResourceShape<University>> {
	ResourceShape::builder("university", |u: &University| u.id)
		.attribute(Field::string("title"), |u| Value::from(u.title.clone()))
		.to_many("country", Arc::clone(country), countries)
		.build()
}

/// Shape without any relations, for the minimal document scenarios.
pub fn bare_university_shape() -> Arc<ResourceShape<University>> {
	ResourceShape::builder("university", |u: &University| u.id)
		.attribute(Field::string("title"), |u| Value::from(u.title.clone()))
		.build()
}

pub fn city_shape(country: &Arc<ResourceShape<Country>>) -> Arc<ResourceShape<City>> {
	let loader: RelationLoader<City, Country> = Arc::new(|c: &City| {
		let country = c.country.clone();
		async move { Ok(country.into_iter().collect()) }.boxed()
	});
	ResourceShape::builder("city", |c: &City| c.id)
		.attribute(Field::string("title"), |c| Value::from(c.title.clone()))
		.to_one("country", Arc::clone(country), loader)
		.build()
}
