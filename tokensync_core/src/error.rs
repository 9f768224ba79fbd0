use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

/// Failure reported by the host scene-graph, variables, or storage APIs.
#[derive(Debug, Clone, Diagnostic, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum HostError {
	#[error("`{0}` no longer exists")]
	#[diagnostic(code(tokensync::host::not_found))]
	NotFound(String),

	#[error("storage capacity exceeded: {size} bytes (limit: {limit} bytes)")]
	#[diagnostic(
		code(tokensync::host::capacity_exceeded),
		help("clear cached library collections with `tokensync cache clear <key>`")
	)]
	CapacityExceeded { size: usize, limit: usize },

	#[error("host rejected the operation: {0}")]
	#[diagnostic(code(tokensync::host::rejected))]
	Rejected(String),
}

pub type HostResult<T> = Result<T, HostError>;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum TokenSyncError {
	#[error(transparent)]
	#[diagnostic(code(tokensync::io_error))]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	#[diagnostic(transparent)]
	Host(#[from] HostError),

	#[error("failed to serialize or parse stored data: {0}")]
	#[diagnostic(code(tokensync::serialization))]
	Serialization(#[from] serde_json::Error),

	#[error("Please select at least one element.")]
	#[diagnostic(
		code(tokensync::nothing_selected),
		help("select a text layer or a frame, group, section, component, or instance containing text")
	)]
	NothingSelected,

	#[error("No text elements are selected.")]
	#[diagnostic(code(tokensync::no_text_selected))]
	NoTextSelected,

	#[error("No text nodes found.")]
	#[diagnostic(
		code(tokensync::no_text_nodes),
		help("widen the scope or include components and instances")
	)]
	NoTextNodes,

	#[error("No text was found.")]
	#[diagnostic(code(tokensync::no_text_found))]
	NoTextFound,

	#[error("No variables found in the collection.")]
	#[diagnostic(
		code(tokensync::no_variables),
		help("sync a collection first or choose a collection that contains string variables")
	)]
	NoVariables,

	#[error("Variable not found: {0}")]
	#[diagnostic(code(tokensync::variable_not_found))]
	VariableNotFound(String),

	#[error("at least one value property name is required")]
	#[diagnostic(
		code(tokensync::no_value_properties),
		help("each value property becomes one mode of the collection")
	)]
	NoValueProperties,

	#[error("value property `{0}` is listed more than once")]
	#[diagnostic(code(tokensync::duplicate_value_property))]
	DuplicateValueProperty(String),

	#[error("collection name must not be empty")]
	#[diagnostic(code(tokensync::empty_collection_name))]
	EmptyCollectionName,

	#[error("No pages in this database.")]
	#[diagnostic(code(tokensync::source::no_pages))]
	NoPages,

	#[error("Key property name is wrong.")]
	#[diagnostic(
		code(tokensync::source::invalid_key_property),
		help("the key property must name a title, rich_text, or formula property of the source rows")
	)]
	InvalidKeyProperty(String),

	#[error("Value property '{0}' not found.")]
	#[diagnostic(code(tokensync::source::missing_value_property))]
	MissingValueProperty(String),

	#[error("Property '{0}' has invalid type. Expected 'title', 'rich_text', or 'formula'.")]
	#[diagnostic(code(tokensync::source::invalid_property_type))]
	InvalidPropertyType(String),

	#[error("Failed to fetch database: {0}")]
	#[diagnostic(code(tokensync::source::fetch_failed))]
	FetchFailed(String),

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(tokensync::config_parse),
		help("check that tokensync.toml is valid TOML with [sync], [apply], and/or [storage] sections")
	)]
	ConfigParse(String),

	#[error("unknown collection selector: `{0}`")]
	#[diagnostic(
		code(tokensync::unknown_collection_selector),
		help("use `all`, `local:<collection id>`, or `library:<collection key>`")
	)]
	UnknownCollectionSelector(String),
}

/// Coarse classification of failures used to decide how a caller recovers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	/// Bad input or empty working set. Nothing was mutated.
	Validation,
	/// Something vanished while the operation was running.
	NotFound,
	/// The external row source is unreachable or malformed.
	ExternalFetch,
	/// A persisted blob could not be written.
	Persistence,
	/// Any other host failure.
	Host,
	/// Local configuration or stored data could not be read.
	Config,
}

impl TokenSyncError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::NothingSelected
			| Self::NoTextSelected
			| Self::NoTextNodes
			| Self::NoTextFound
			| Self::NoVariables
			| Self::NoValueProperties
			| Self::DuplicateValueProperty(_)
			| Self::EmptyCollectionName
			| Self::UnknownCollectionSelector(_) => ErrorKind::Validation,
			Self::VariableNotFound(_) | Self::Host(HostError::NotFound(_)) => ErrorKind::NotFound,
			Self::NoPages
			| Self::InvalidKeyProperty(_)
			| Self::MissingValueProperty(_)
			| Self::InvalidPropertyType(_)
			| Self::FetchFailed(_) => ErrorKind::ExternalFetch,
			Self::Host(HostError::CapacityExceeded { .. }) => ErrorKind::Persistence,
			Self::Host(_) => ErrorKind::Host,
			Self::Io(_) | Self::Serialization(_) | Self::ConfigParse(_) => ErrorKind::Config,
		}
	}
}

/// The single message (plus error flag) shown to the user once an operation
/// finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessOutcome {
	pub message: String,
	pub error: bool,
}

impl ProcessOutcome {
	pub fn success(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
			error: false,
		}
	}

	pub fn failure(error: &TokenSyncError) -> Self {
		Self {
			message: error.to_string(),
			error: true,
		}
	}
}

pub type TokenSyncResult<T> = Result<T, TokenSyncError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
