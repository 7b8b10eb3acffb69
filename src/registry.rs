//! Declaration registry
//!
//! Ordered collection of field and relation declarations for a resource
//! shape. Ordering is determined by the declaration creation counter, never
//! by map iteration order, so the output is deterministic. Inheritance
//! merging follows the subclass-shadows-base rule: a name declared by the
//! extending shape wins over the same name in a base, while a name absent
//! from the extending shape keeps the base's relative position.

/// A declaration that carries a creation counter.
pub trait Declared {
	fn creation_order(&self) -> u64;
}

impl Declared for crate::fields::Field {
	fn creation_order(&self) -> u64 {
		self.creation_order()
	}
}

/// Ordered `name -> declaration` mapping.
#[derive(Debug, Clone)]
pub struct DeclarationRegistry<V> {
	entries: Vec<(String, V)>,
}

impl<V> Default for DeclarationRegistry<V> {
	fn default() -> Self {
		Self {
			entries: Vec::new(),
		}
	}
}

impl<V: Declared + Clone> DeclarationRegistry<V> {
	/// Collect declarations from base registries plus own declarations.
	///
	/// Base entries come first, in base order; own declarations are sorted
	/// by creation counter and either shadow a base entry in place or
	/// append after the inherited ones.
	pub fn collect(bases: &[&DeclarationRegistry<V>], own: Vec<(String, V)>) -> Self {
		let mut entries: Vec<(String, V)> = Vec::new();
		for base in bases {
			for (name, decl) in &base.entries {
				if !entries.iter().any(|(n, _)| n == name) {
					entries.push((name.clone(), decl.clone()));
				}
			}
		}
		let mut own = own;
		own.sort_by_key(|(_, decl)| decl.creation_order());
		for (name, decl) in own {
			if let Some(slot) = entries.iter_mut().find(|(n, _)| *n == name) {
				slot.1 = decl;
			} else {
				entries.push((name, decl));
			}
		}
		Self { entries }
	}

	pub fn get(&self, name: &str) -> Option<&V> {
		self.entries
			.iter()
			.find(|(n, _)| n == name)
			.map(|(_, v)| v)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
		self.entries.iter().map(|(n, v)| (n.as_str(), v))
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.entries.iter().map(|(n, _)| n.as_str())
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
