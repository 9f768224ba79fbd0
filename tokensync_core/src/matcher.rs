use std::collections::HashMap;
use std::fmt;

use futures::future::join_all;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::AncestryDecoder;
use crate::BindingResolver;
use crate::BindingTarget;
use crate::BlobStore;
use crate::CachedVariable;
use crate::CollectionSelector;
use crate::HostError;
use crate::HostResult;
use crate::LibraryCatalog;
use crate::LibraryVariableCache;
use crate::NodeFilter;
use crate::NodeId;
use crate::PathEncodedAncestry;
use crate::SceneGraph;
use crate::TextNode;
use crate::TextScope;
use crate::TokenSyncError;
use crate::TokenSyncResult;
use crate::VariableStore;
use crate::scope::collect_text_nodes;
use crate::scope::filter_text_nodes;
use crate::variables::candidate_variables;
use crate::variables::resolve_live_variable;

/// Collapse every whitespace run to a single space and trim both ends.
pub fn normalize_content(content: &str) -> String {
	content.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lookup from normalized string value to the first candidate carrying it.
#[derive(Debug)]
pub struct ContentIndex<'v> {
	by_value: HashMap<String, &'v CachedVariable>,
}

impl<'v> ContentIndex<'v> {
	pub fn new(candidates: &'v [CachedVariable]) -> Self {
		let mut by_value = HashMap::new();
		for candidate in candidates {
			for value in candidate.string_values() {
				by_value.entry(normalize_content(value)).or_insert(candidate);
			}
		}

		Self { by_value }
	}

	/// The first candidate, in candidate order, with any mode value equal to
	/// `content` after normalization.
	pub fn find(&self, content: &str) -> Option<&'v CachedVariable> {
		self.by_value.get(&normalize_content(content)).copied()
	}
}

/// Match one piece of content against a candidate list.
pub fn find_match<'v>(candidates: &'v [CachedVariable], content: &str) -> Option<&'v CachedVariable> {
	let content = normalize_content(content);
	candidates.iter().find(|candidate| {
		candidate
			.string_values()
			.any(|value| normalize_content(value) == content)
	})
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BulkApplyOptions {
	pub scope: TextScope,
	pub collection: CollectionSelector,
	#[serde(flatten)]
	pub filter: NodeFilter,
	/// Only variables whose name contains this text are considered.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub name_filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedBinding {
	pub node: NodeId,
	pub variable: String,
	pub target: BindingTarget,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkApplyReport {
	/// Text nodes left after scope collection and filtering.
	pub scanned: usize,
	pub candidates: usize,
	pub applied: Vec<AppliedBinding>,
	/// Nodes whose content matched no candidate.
	pub unmatched: usize,
	/// Matched nodes that were skipped because the node or the variable
	/// vanished.
	pub skipped: usize,
}

impl BulkApplyReport {
	pub fn count(&self) -> usize {
		self.applied.len()
	}
}

impl fmt::Display for BulkApplyReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Bulk applied variables to {} text elements.", self.count())
	}
}

enum NodeOutcome {
	Applied(AppliedBinding),
	Unmatched,
	Skipped,
}

/// Binds variables to text nodes whose content equals one of the variable's
/// values.
#[derive(Debug)]
pub struct BulkMatcher<'a, H, B, D = PathEncodedAncestry> {
	host: &'a H,
	cache: &'a LibraryVariableCache<B>,
	resolver: BindingResolver<'a, H, D>,
}

impl<'a, H, B> BulkMatcher<'a, H, B>
where
	H: SceneGraph + VariableStore + LibraryCatalog,
	B: BlobStore,
{
	pub fn new(host: &'a H, cache: &'a LibraryVariableCache<B>) -> Self {
		Self::with_resolver(host, cache, BindingResolver::new(host))
	}
}

impl<'a, H, B, D> BulkMatcher<'a, H, B, D>
where
	H: SceneGraph + VariableStore + LibraryCatalog,
	B: BlobStore,
	D: AncestryDecoder,
{
	pub fn with_resolver(
		host: &'a H,
		cache: &'a LibraryVariableCache<B>,
		resolver: BindingResolver<'a, H, D>,
	) -> Self {
		Self {
			host,
			cache,
			resolver,
		}
	}

	pub async fn apply(&self, options: &BulkApplyOptions) -> TokenSyncResult<BulkApplyReport> {
		let nodes = collect_text_nodes(self.host, options.scope).await?;
		let nodes =
			filter_text_nodes(self.host, self.resolver.decoder(), nodes, options.filter).await?;
		if nodes.is_empty() {
			return Err(TokenSyncError::NoTextNodes);
		}

		let mut candidates = candidate_variables(self.host, self.cache, &options.collection).await?;
		if candidates.is_empty() {
			return Err(TokenSyncError::NoVariables);
		}

		if let Some(filter) = options.name_filter.as_deref().filter(|f| !f.is_empty()) {
			candidates.retain(|variable| variable.name.contains(filter));
			debug!(filter, remaining = candidates.len(), "filtered candidates by name");
		}

		let index = ContentIndex::new(&candidates);
		let work = nodes.iter().map(|node| self.apply_to_node(&index, node));
		let outcomes = join_all(work).await;

		let mut report = BulkApplyReport {
			scanned: nodes.len(),
			candidates: candidates.len(),
			..BulkApplyReport::default()
		};
		for outcome in outcomes {
			match outcome? {
				NodeOutcome::Applied(binding) => report.applied.push(binding),
				NodeOutcome::Unmatched => report.unmatched += 1,
				NodeOutcome::Skipped => report.skipped += 1,
			}
		}

		info!(
			scope = %options.scope,
			collection = %options.collection,
			applied = report.count(),
			unmatched = report.unmatched,
			skipped = report.skipped,
			"bulk apply finished"
		);

		Ok(report)
	}

	async fn apply_to_node(
		&self,
		index: &ContentIndex<'_>,
		node: &TextNode,
	) -> HostResult<NodeOutcome> {
		let Some(candidate) = index.find(&node.characters) else {
			return Ok(NodeOutcome::Unmatched);
		};

		let variable = match resolve_live_variable(self.host, candidate).await {
			Ok(Some(variable)) => variable,
			Ok(None) | Err(HostError::NotFound(_)) => {
				warn!(node = %node.id, variable = %candidate.name, "matched variable no longer exists");
				return Ok(NodeOutcome::Skipped);
			}
			Err(error) => return Err(error),
		};

		match self.resolver.bind(node, &variable.id).await {
			Ok(target) => {
				Ok(NodeOutcome::Applied(AppliedBinding {
					node: node.id.clone(),
					variable: variable.name,
					target,
				}))
			}
			Err(HostError::NotFound(missing)) => {
				warn!(node = %node.id, %missing, "text node vanished before binding");
				Ok(NodeOutcome::Skipped)
			}
			Err(error) => Err(error),
		}
	}
}
