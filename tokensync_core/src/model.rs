use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use derive_more::Deref;
use derive_more::Display;
use serde::Deserialize;
use serde::Serialize;

use crate::TokenSyncError;

macro_rules! string_id {
	($(#[$meta:meta])* $name:ident) => {
		$(#[$meta])*
		#[derive(
			Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Deref, Display,
		)]
		#[serde(transparent)]
		pub struct $name(String);

		impl $name {
			pub fn new(value: impl Into<String>) -> Self {
				Self(value.into())
			}

			pub fn as_str(&self) -> &str {
				&self.0
			}
		}

		impl From<&str> for $name {
			fn from(value: &str) -> Self {
				Self(value.to_string())
			}
		}

		impl From<String> for $name {
			fn from(value: String) -> Self {
				Self(value)
			}
		}
	};
}

string_id!(
	/// Identifier of a scene node. Nodes nested inside component instances
	/// carry their ownership path encoded in the id (see
	/// [`crate::ancestry::PathEncodedAncestry`]).
	NodeId
);
string_id!(
	/// Document-local identifier of a variable.
	VariableId
);
string_id!(
	/// Document-local identifier of a variable collection.
	CollectionId
);
string_id!(
	/// Identifier of a mode within a collection.
	ModeId
);

/// The data type a variable resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolvedType {
	Boolean,
	Float,
	String,
	Color,
}

/// Usage-context tag restricting where the host offers a variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariableScope {
	AllScopes,
	TextContent,
	FontFamily,
	FontStyle,
	FontVariations,
	/// Any other host scope, kept verbatim.
	#[serde(untagged)]
	Other(String),
}

/// Reference from a value slot to a variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename = "VARIABLE_ALIAS")]
pub struct VariableAlias {
	pub id: VariableId,
}

impl VariableAlias {
	pub fn to(variable: &VariableId) -> Self {
		Self {
			id: variable.clone(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
	pub r: f64,
	pub g: f64,
	pub b: f64,
	#[serde(default = "opaque")]
	pub a: f64,
}

fn opaque() -> f64 {
	1.0
}

/// A single per-mode value of a variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
	Boolean(bool),
	Float(f64),
	String(String),
	Alias(VariableAlias),
	Color(Rgba),
}

impl VariableValue {
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(value) => Some(value),
			_ => None,
		}
	}
}

impl From<&str> for VariableValue {
	fn from(value: &str) -> Self {
		Self::String(value.to_string())
	}
}

impl From<String> for VariableValue {
	fn from(value: String) -> Self {
		Self::String(value)
	}
}

/// A named design token holding one value per mode, as the host exposes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
	pub id: VariableId,
	pub key: String,
	pub name: String,
	#[serde(rename = "variableCollectionId")]
	pub collection_id: CollectionId,
	pub resolved_type: ResolvedType,
	#[serde(default)]
	pub values_by_mode: BTreeMap<ModeId, VariableValue>,
	#[serde(default)]
	pub scopes: Vec<VariableScope>,
	#[serde(default)]
	pub description: String,
	/// True when the variable lives in another file and was imported.
	#[serde(default)]
	pub remote: bool,
	#[serde(default)]
	pub hidden_from_publishing: bool,
}

impl Variable {
	/// Iterate over the string values of every mode.
	pub fn string_values(&self) -> impl Iterator<Item = &str> {
		self.values_by_mode.values().filter_map(VariableValue::as_str)
	}
}

/// The reduced form of a [`Variable`] kept in the library cache and handed to
/// matching. Publishing metadata and descriptions are left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedVariable {
	pub id: VariableId,
	pub name: String,
	#[serde(rename = "variableCollectionId")]
	pub collection_id: CollectionId,
	pub key: String,
	pub resolved_type: ResolvedType,
	#[serde(default)]
	pub values_by_mode: BTreeMap<ModeId, VariableValue>,
	#[serde(default)]
	pub scopes: Vec<VariableScope>,
}

impl CachedVariable {
	pub fn string_values(&self) -> impl Iterator<Item = &str> {
		self.values_by_mode.values().filter_map(VariableValue::as_str)
	}
}

impl From<&Variable> for CachedVariable {
	fn from(variable: &Variable) -> Self {
		Self {
			id: variable.id.clone(),
			name: variable.name.clone(),
			collection_id: variable.collection_id.clone(),
			key: variable.key.clone(),
			resolved_type: variable.resolved_type,
			values_by_mode: variable.values_by_mode.clone(),
			scopes: variable.scopes.clone(),
		}
	}
}

impl From<Variable> for CachedVariable {
	fn from(variable: Variable) -> Self {
		Self {
			id: variable.id,
			name: variable.name,
			collection_id: variable.collection_id,
			key: variable.key,
			resolved_type: variable.resolved_type,
			values_by_mode: variable.values_by_mode,
			scopes: variable.scopes,
		}
	}
}

/// One variant axis of a collection, e.g. one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mode {
	pub mode_id: ModeId,
	pub name: String,
}

/// A named group of variables sharing one mode set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableCollection {
	pub id: CollectionId,
	pub name: String,
	pub modes: Vec<Mode>,
	pub default_mode_id: ModeId,
}

impl VariableCollection {
	pub fn mode_named(&self, name: &str) -> Option<&Mode> {
		self.modes.iter().find(|mode| mode.name == name)
	}

	pub fn default_mode(&self) -> Option<&Mode> {
		self.modes
			.iter()
			.find(|mode| mode.mode_id == self.default_mode_id)
	}

	pub fn mode_names(&self) -> Vec<&str> {
		self.modes.iter().map(|mode| mode.name.as_str()).collect()
	}
}

/// A collection published from another file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryCollection {
	pub key: String,
	pub name: String,
	#[serde(default)]
	pub library_name: String,
}

/// Summary of a variable inside a library collection, before import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryVariable {
	pub key: String,
	pub name: String,
	pub resolved_type: ResolvedType,
}

/// A row from the external data source, already flattened to strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRow {
	pub id: String,
	pub key: String,
	#[serde(default)]
	pub values: BTreeMap<String, String>,
	#[serde(default)]
	pub created_time: String,
	#[serde(default)]
	pub last_edited_time: String,
	#[serde(default)]
	pub url: String,
}

/// Structural node types the core cares about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
	Document,
	Page,
	Section,
	Group,
	Frame,
	Component,
	ComponentSet,
	Instance,
	Text,
	/// Shapes, vectors and every other node type, kept verbatim.
	#[serde(untagged)]
	Other(String),
}

impl NodeKind {
	/// Containers whose text descendants are collected when the container is
	/// selected.
	pub fn is_text_container(&self) -> bool {
		matches!(
			self,
			Self::Section
				| Self::Group
				| Self::Frame
				| Self::Component
				| Self::ComponentSet
				| Self::Instance
		)
	}

	/// Component or variant definitions (not instances).
	pub fn is_definition(&self) -> bool {
		matches!(self, Self::Component | Self::ComponentSet)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneNode {
	pub id: NodeId,
	#[serde(rename = "type")]
	pub kind: NodeKind,
	#[serde(default)]
	pub name: String,
}

/// Links from a text node's slots to overridable properties of the
/// enclosing component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentPropertyReferences {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub characters: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
	pub id: NodeId,
	pub characters: String,
	#[serde(default)]
	pub component_property_references: ComponentPropertyReferences,
	/// Variable currently bound to the text content, if any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub bound_characters: Option<VariableAlias>,
}

impl TextNode {
	pub fn characters_property(&self) -> Option<&str> {
		self.component_property_references.characters.as_deref()
	}
}

/// Which text nodes an operation looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextScope {
	#[default]
	Selection,
	#[serde(alias = "current-page")]
	CurrentPage,
	#[serde(alias = "all-pages")]
	AllPages,
}

impl fmt::Display for TextScope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let label = match self {
			Self::Selection => "selection",
			Self::CurrentPage => "current-page",
			Self::AllPages => "all-pages",
		};
		f.write_str(label)
	}
}

/// Which variables bulk matching draws from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CollectionSelector {
	/// Every local collection plus every available library collection.
	#[default]
	All,
	Local(CollectionId),
	/// A library collection, by its collection key.
	Library(String),
}

impl fmt::Display for CollectionSelector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::All => f.write_str("all"),
			Self::Local(id) => write!(f, "local:{id}"),
			Self::Library(key) => write!(f, "library:{key}"),
		}
	}
}

impl FromStr for CollectionSelector {
	type Err = TokenSyncError;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		if value == "all" {
			return Ok(Self::All);
		}

		match value.split_once(':') {
			Some(("local", id)) if !id.is_empty() => Ok(Self::Local(CollectionId::from(id))),
			Some(("library", key)) if !key.is_empty() => Ok(Self::Library(key.to_string())),
			_ => Err(TokenSyncError::UnknownCollectionSelector(value.to_string())),
		}
	}
}

impl TryFrom<String> for CollectionSelector {
	type Error = TokenSyncError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

impl From<CollectionSelector> for String {
	fn from(value: CollectionSelector) -> Self {
		value.to_string()
	}
}
