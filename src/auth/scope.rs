//! Scopes requested from (and granted by) the token endpoint.

// std
use std::collections::BTreeSet;
// crates.io
use serde::{Deserializer, Serializer, de::Error as DeError};
// self
use crate::_prelude::*;

/// Rejections produced while normalizing scope strings.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ScopeValidationError {
	/// Empty scope entries are not allowed.
	#[error("Scope entries cannot be empty.")]
	Empty,
	/// Scopes cannot contain embedded whitespace characters.
	#[error("Scope contains whitespace: {scope}.")]
	ContainsWhitespace {
		/// The offending scope string.
		scope: String,
	},
}

/// Sorted, deduplicated scope tokens.
///
/// The wire form is the space-delimited string sent in the `scope` form field (RFC 6749 §3.3),
/// which is also what `Display` and `Serialize` produce. Deserialization accepts either that
/// string or a list of scopes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ScopeSet(Arc<[String]>);
impl ScopeSet {
	/// Validates and normalizes `scopes`.
	pub fn new<I, S>(scopes: I) -> Result<Self, ScopeValidationError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut unique = BTreeSet::new();

		for scope in scopes {
			let scope = scope.into();

			if scope.is_empty() {
				return Err(ScopeValidationError::Empty);
			}
			if scope.contains(char::is_whitespace) {
				return Err(ScopeValidationError::ContainsWhitespace { scope });
			}

			unique.insert(scope);
		}

		Ok(Self(unique.into_iter().collect()))
	}

	/// Number of distinct scopes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` if no scope is set.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Returns `true` if `scope` is part of the set.
	pub fn contains(&self, scope: &str) -> bool {
		self.0.binary_search_by(|candidate| candidate.as_str().cmp(scope)).is_ok()
	}

	/// Iterates the scopes in sorted order.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}

	/// Space-delimited wire form.
	pub fn normalized(&self) -> String {
		self.0.join(" ")
	}
}
impl Default for ScopeSet {
	fn default() -> Self {
		Self(Arc::from(Vec::new()))
	}
}
impl Debug for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_list().entries(self.iter()).finish()
	}
}
impl Display for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.normalized())
	}
}
impl FromStr for ScopeSet {
	type Err = ScopeValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"" => Ok(Self::default()),
			blank if blank.trim().is_empty() => Err(ScopeValidationError::Empty),
			delimited => Self::new(delimited.split_whitespace()),
		}
	}
}
impl Serialize for ScopeSet {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.collect_str(self)
	}
}
impl<'de> Deserialize<'de> for ScopeSet {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		#[derive(Deserialize)]
		#[serde(untagged)]
		enum Wire {
			Delimited(String),
			List(Vec<String>),
		}

		let parsed = match Wire::deserialize(deserializer)? {
			Wire::Delimited(value) => value.parse(),
			Wire::List(values) => Self::new(values),
		};

		parsed.map_err(DeError::custom)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn scopes_are_sorted_and_deduplicated() {
		let scopes =
			ScopeSet::new(["orders.write", "orders.read", "orders.write"]).expect("Scopes are valid.");

		assert_eq!(scopes.len(), 2);
		assert_eq!(scopes.normalized(), "orders.read orders.write");
		assert_eq!(scopes, ScopeSet::new(["orders.read", "orders.write"]).expect("Scopes are valid."));
		assert!(scopes.contains("orders.read"));
		assert!(!scopes.contains("orders"));
	}

	#[test]
	fn invalid_entries_are_rejected() {
		assert_eq!(ScopeSet::new([""]), Err(ScopeValidationError::Empty));
		assert!(matches!(
			ScopeSet::new(["read write"]),
			Err(ScopeValidationError::ContainsWhitespace { .. })
		));
		assert!(ScopeSet::from_str("").is_ok_and(|scopes| scopes.is_empty()));
		assert_eq!(ScopeSet::from_str("  \t"), Err(ScopeValidationError::Empty));
	}

	#[test]
	fn serde_uses_the_wire_form() {
		let delimited: ScopeSet =
			serde_json::from_str("\"write  read\"").expect("Delimited scopes should deserialize.");
		let listed: ScopeSet =
			serde_json::from_str("[\"read\",\"write\"]").expect("Scope lists should deserialize.");

		assert_eq!(delimited, listed);
		assert_eq!(serde_json::to_string(&listed).expect("Scopes should serialize."), "\"read write\"");
		assert_eq!(listed.iter().collect::<Vec<_>>(), ["read", "write"]);
		assert!(serde_json::from_str::<ScopeSet>("[\"with space\"]").is_err());
	}
}
