//! Adapting external database pages into [`ExternalRow`]s.
//!
//! The data provider returns pages whose properties are typed values. Only
//! `title`, `rich_text`, and `formula` properties carry text the reconciler
//! can use; everything else is rejected when it is named as a key or value
//! property.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::ExternalRow;
use crate::TokenSyncError;
use crate::TokenSyncResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainText {
	#[serde(default)]
	pub plain_text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaValue {
	#[serde(default)]
	pub string: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceProperty {
	Title {
		#[serde(default)]
		title: Vec<PlainText>,
	},
	RichText {
		#[serde(default)]
		rich_text: Vec<PlainText>,
	},
	Formula {
		#[serde(default)]
		formula: FormulaValue,
	},
	#[serde(other)]
	Unsupported,
}

impl SourceProperty {
	/// The property's text: the first fragment for text properties, the
	/// string result for formulas. `None` for unsupported types.
	pub fn text(&self) -> Option<String> {
		match self {
			Self::Title { title: fragments } | Self::RichText { rich_text: fragments } => {
				Some(first_fragment(fragments))
			}
			Self::Formula { formula } => Some(formula.string.clone().unwrap_or_default()),
			Self::Unsupported => None,
		}
	}
}

fn first_fragment(fragments: &[PlainText]) -> String {
	fragments
		.first()
		.map(|fragment| fragment.plain_text.clone())
		.unwrap_or_default()
}

/// One row of the external database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePage {
	pub id: String,
	#[serde(default)]
	pub properties: BTreeMap<String, SourceProperty>,
	#[serde(default)]
	pub created_time: String,
	#[serde(default)]
	pub last_edited_time: String,
	#[serde(default)]
	pub url: String,
}

/// One page of a paginated database query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
	#[serde(default)]
	pub results: Option<Vec<SourcePage>>,
	#[serde(default)]
	pub has_more: bool,
	#[serde(default)]
	pub next_cursor: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QueryDump {
	Many(Vec<QueryResponse>),
	One(QueryResponse),
}

/// Parse one query response, or an array of consecutive responses, and
/// return every page in order.
pub fn parse_query_responses(json: &str) -> TokenSyncResult<Vec<SourcePage>> {
	let dump: QueryDump =
		serde_json::from_str(json).map_err(|e| TokenSyncError::FetchFailed(e.to_string()))?;
	let responses = match dump {
		QueryDump::Many(responses) => responses,
		QueryDump::One(response) => vec![response],
	};

	let mut pages = Vec::new();
	for response in responses {
		let Some(results) = response.results else {
			return Err(TokenSyncError::NoPages);
		};
		pages.extend(results);
	}

	Ok(pages)
}

/// Turn pages into rows keyed by `key_property`, with one value per entry of
/// `value_properties`.
pub fn rows_from_pages(
	pages: &[SourcePage],
	key_property: &str,
	value_properties: &[String],
) -> TokenSyncResult<Vec<ExternalRow>> {
	if pages.is_empty() {
		return Err(TokenSyncError::NoPages);
	}

	let rows = pages
		.iter()
		.map(|page| row_from_page(page, key_property, value_properties))
		.collect::<TokenSyncResult<Vec<_>>>()?;
	debug!(count = rows.len(), key_property, "adapted source pages");

	Ok(rows)
}

fn row_from_page(
	page: &SourcePage,
	key_property: &str,
	value_properties: &[String],
) -> TokenSyncResult<ExternalRow> {
	let key = page
		.properties
		.get(key_property)
		.ok_or_else(|| TokenSyncError::InvalidKeyProperty(key_property.to_string()))?
		.text()
		.ok_or_else(|| TokenSyncError::InvalidPropertyType(key_property.to_string()))?;

	let mut values = BTreeMap::new();
	for name in value_properties {
		let value = page
			.properties
			.get(name)
			.ok_or_else(|| TokenSyncError::MissingValueProperty(name.clone()))?
			.text()
			.ok_or_else(|| TokenSyncError::InvalidPropertyType(name.clone()))?;
		values.insert(name.clone(), value);
	}

	Ok(ExternalRow {
		id: page.id.clone(),
		key,
		values,
		created_time: page.created_time.clone(),
		last_edited_time: page.last_edited_time.clone(),
		url: page.url.clone(),
	})
}
