use std::fmt;

use futures::future::try_join_all;
use serde::Serialize;
use tracing::info;

use crate::AncestryDecoder;
use crate::BindingResolver;
use crate::BindingTarget;
use crate::HostResult;
use crate::NodeId;
use crate::SceneGraph;
use crate::TextNode;
use crate::TextScope;
use crate::TokenSyncError;
use crate::TokenSyncResult;
use crate::VariableAlias;
use crate::VariableStore;
use crate::scope::collect_text_nodes;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
	pub node: NodeId,
	pub characters: String,
	/// Where a binding for this node lives (or would be written).
	pub target: BindingTarget,
	/// Name of the bound variable, `None` when the text is unbound.
	pub variable: Option<String>,
}

impl AuditEntry {
	pub fn is_bound(&self) -> bool {
		self.variable.is_some()
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BindingAudit {
	pub entries: Vec<AuditEntry>,
}

impl BindingAudit {
	pub fn bound(&self) -> impl Iterator<Item = &AuditEntry> {
		self.entries.iter().filter(|entry| entry.is_bound())
	}

	pub fn unbound(&self) -> impl Iterator<Item = &AuditEntry> {
		self.entries.iter().filter(|entry| !entry.is_bound())
	}
}

impl fmt::Display for BindingAudit {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{} text elements ({} bound / {} unbound)",
			self.entries.len(),
			self.bound().count(),
			self.unbound().count()
		)
	}
}

/// Report, for every text node in `scope`, whether its content is driven by a
/// variable.
///
/// Text owned by an instance through a property reference is judged by the
/// instance property, since that is where bindings for it are written.
pub async fn audit_bindings<H, D>(
	host: &H,
	resolver: &BindingResolver<'_, H, D>,
	scope: TextScope,
) -> TokenSyncResult<BindingAudit>
where
	H: SceneGraph + VariableStore,
	D: AncestryDecoder,
{
	let nodes = collect_text_nodes(host, scope).await?;
	if nodes.is_empty() {
		return Err(TokenSyncError::NoTextFound);
	}

	let checks = nodes.iter().map(|node| audit_node(host, resolver, node));
	let entries = try_join_all(checks).await?;
	let audit = BindingAudit { entries };

	info!(
		%scope,
		bound = audit.bound().count(),
		unbound = audit.unbound().count(),
		"audited text bindings"
	);

	Ok(audit)
}

async fn audit_node<H, D>(
	host: &H,
	resolver: &BindingResolver<'_, H, D>,
	node: &TextNode,
) -> HostResult<AuditEntry>
where
	H: SceneGraph + VariableStore,
	D: AncestryDecoder,
{
	let target = resolver.resolve(node).await;
	let alias: Option<VariableAlias> = match &target {
		BindingTarget::DirectText { .. } => node.bound_characters.clone(),
		BindingTarget::InstanceProperty { instance, property } => {
			host.instance_property_binding(instance, property).await?
		}
	};

	let variable = match alias {
		Some(alias) => host.variable_by_id(&alias.id).await?.map(|variable| variable.name),
		None => None,
	};

	Ok(AuditEntry {
		node: node.id.clone(),
		characters: node.characters.clone(),
		target,
		variable,
	})
}
