use std::collections::BTreeSet;
use std::collections::HashSet;
use std::fmt;

use futures::future::try_join_all;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::ExternalRow;
use crate::HostError;
use crate::HostResult;
use crate::Mode;
use crate::ResolvedType;
use crate::TokenSyncError;
use crate::TokenSyncResult;
use crate::Variable;
use crate::VariableCollection;
use crate::VariableScope;
use crate::VariableStore;
use crate::VariableValue;

/// Everything needed to mirror a set of external rows into one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
	pub collection_name: String,
	pub rows: Vec<ExternalRow>,
	/// Mode names in display order. The first one becomes the default mode.
	pub value_properties: Vec<String>,
}

impl SyncRequest {
	pub fn validate(&self) -> TokenSyncResult<()> {
		if self.collection_name.trim().is_empty() {
			return Err(TokenSyncError::EmptyCollectionName);
		}

		if self.value_properties.is_empty() {
			return Err(TokenSyncError::NoValueProperties);
		}

		let mut seen = HashSet::new();
		for name in &self.value_properties {
			if !seen.insert(name.as_str()) {
				return Err(TokenSyncError::DuplicateValueProperty(name.clone()));
			}
		}

		Ok(())
	}
}

/// A row whose key collided with an earlier row and was given a new name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateKey {
	pub row_id: String,
	pub key: String,
	pub renamed_to: String,
}

/// Mode changes made while reconciling a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeChanges {
	/// `(from, to)` when the default mode was renamed.
	pub renamed_default: Option<(String, String)>,
	pub added: Vec<String>,
	pub removed: Vec<String>,
}

impl ModeChanges {
	pub fn is_empty(&self) -> bool {
		self.renamed_default.is_none() && self.added.is_empty() && self.removed.is_empty()
	}
}

/// Result of a sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
	pub collection: VariableCollection,
	pub collection_created: bool,
	pub modes: ModeChanges,
	/// Variable names created, in row order.
	pub created: Vec<String>,
	/// Variable names that already existed and were overwritten.
	pub updated: Vec<String>,
	/// Variable names removed because no row carries them any more.
	pub removed: Vec<String>,
	pub duplicates: Vec<DuplicateKey>,
}

impl fmt::Display for ReconcileReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("Collection synced successfully.")
	}
}

/// Give every row a name no earlier row has taken.
///
/// The first row with a key keeps it. Later rows are renamed to
/// `[Duplicated] <key> (<row id>)`, reapplying the pattern until the name is
/// free, so the returned keys are pairwise distinct. A row whose own key is
/// unique is still renamed when an earlier duplicate was already given that
/// name.
pub fn dedupe_rows(rows: &[ExternalRow]) -> (Vec<ExternalRow>, Vec<DuplicateKey>) {
	let mut taken = HashSet::new();
	let mut unique = Vec::with_capacity(rows.len());
	let mut duplicates = Vec::new();

	for row in rows {
		if taken.insert(row.key.clone()) {
			unique.push(row.clone());
			continue;
		}

		let mut renamed = duplicate_name(&row.key, &row.id);
		while taken.contains(&renamed) {
			renamed = duplicate_name(&renamed, &row.id);
		}
		taken.insert(renamed.clone());

		warn!(key = %row.key, row = %row.id, %renamed, "duplicate key renamed");
		duplicates.push(DuplicateKey {
			row_id: row.id.clone(),
			key: row.key.clone(),
			renamed_to: renamed.clone(),
		});
		unique.push(ExternalRow {
			key: renamed,
			..row.clone()
		});
	}

	(unique, duplicates)
}

fn duplicate_name(key: &str, row_id: &str) -> String {
	format!("[Duplicated] {key} ({row_id})")
}

/// Mirrors external rows into a variable collection.
///
/// After a successful call the collection's mode names equal the requested
/// value properties and its string variables are exactly the deduplicated
/// row keys. Running the same request twice leaves the store unchanged the
/// second time.
#[derive(Debug)]
pub struct CollectionReconciler<'a, S> {
	store: &'a S,
}

impl<'a, S: VariableStore> CollectionReconciler<'a, S> {
	pub fn new(store: &'a S) -> Self {
		Self { store }
	}

	pub async fn reconcile(&self, request: &SyncRequest) -> TokenSyncResult<ReconcileReport> {
		request.validate()?;

		let (collection, collection_created) =
			self.find_or_create_collection(&request.collection_name).await?;
		let (collection, modes) = self
			.reconcile_modes(collection, &request.value_properties)
			.await?;
		let (rows, duplicates) = dedupe_rows(&request.rows);

		let existing: Vec<Variable> = self
			.store
			.local_variables(ResolvedType::String)
			.await?
			.into_iter()
			.filter(|variable| variable.collection_id == collection.id)
			.collect();

		let removed = self.prune(&existing, &rows).await?;
		let kept: Vec<&Variable> = existing
			.iter()
			.filter(|variable| !removed.contains(&variable.name))
			.collect();

		let upserts = rows
			.iter()
			.map(|row| self.upsert_row(&collection, &kept, row));
		let outcomes = try_join_all(upserts).await?;

		let mut created = Vec::new();
		let mut updated = Vec::new();
		for (row, was_created) in rows.iter().zip(outcomes) {
			if was_created {
				created.push(row.key.clone());
			} else {
				updated.push(row.key.clone());
			}
		}

		info!(
			collection = %collection.name,
			created = created.len(),
			updated = updated.len(),
			removed = removed.len(),
			duplicates = duplicates.len(),
			"collection synced"
		);

		Ok(ReconcileReport {
			collection,
			collection_created,
			modes,
			created,
			updated,
			removed,
			duplicates,
		})
	}

	async fn find_or_create_collection(
		&self,
		name: &str,
	) -> HostResult<(VariableCollection, bool)> {
		let collections = self.store.local_collections().await?;
		if let Some(found) = collections.into_iter().find(|collection| collection.name == name) {
			debug!(collection = %found.id, name, "reusing existing collection");
			return Ok((found, false));
		}

		let created = self.store.create_collection(name).await?;
		info!(collection = %created.id, name, "created collection");
		Ok((created, true))
	}

	/// Make the collection's mode names equal `names`, with the default mode
	/// carrying `names[0]` whenever that can be done without losing a mode
	/// that is still requested.
	async fn reconcile_modes(
		&self,
		collection: VariableCollection,
		names: &[String],
	) -> TokenSyncResult<(VariableCollection, ModeChanges)> {
		let requested: HashSet<&str> = names.iter().map(String::as_str).collect();
		let mut changes = ModeChanges::default();
		let Some(default) = collection.default_mode().cloned() else {
			return Err(HostError::Rejected(format!(
				"collection `{}` has no default mode",
				collection.id
			))
			.into());
		};

		// Non-default modes that are not requested, or repeat a name already
		// carried by an earlier mode, go first.
		let mut seen = HashSet::from([default.name.as_str()]);
		let mut kept = Vec::new();
		for mode in &collection.modes {
			if mode.mode_id == default.mode_id {
				continue;
			}

			if requested.contains(mode.name.as_str()) && seen.insert(mode.name.as_str()) {
				kept.push(mode.clone());
				continue;
			}

			self.store.remove_mode(&collection.id, &mode.mode_id).await?;
			debug!(mode = %mode.name, "removed mode");
			changes.removed.push(mode.name.clone());
		}

		let first = &names[0];
		let mut default_name = default.name.clone();
		if &default_name != first {
			let conflict = kept.iter().position(|mode| &mode.name == first);
			let default_requested = requested.contains(default_name.as_str());

			match conflict {
				None => {}
				Some(index) if !default_requested => {
					let mode = kept.remove(index);
					self.store.remove_mode(&collection.id, &mode.mode_id).await?;
					debug!(mode = %mode.name, "removed mode to free its name for the default mode");
					changes.removed.push(mode.name);
				}
				Some(_) => {
					debug!(
						default = %default_name,
						first = %first,
						"default mode already carries a requested name"
					);
				}
			}

			if kept.iter().all(|mode| &mode.name != first) {
				self.store
					.rename_mode(&collection.id, &default.mode_id, first)
					.await?;
				changes.renamed_default = Some((default_name.clone(), first.clone()));
				default_name.clone_from(first);
			}
		}

		for name in names {
			if &default_name == name || kept.iter().any(|mode| &mode.name == name) {
				debug!(mode = %name, "mode already exists");
				continue;
			}

			let mode_id = self.store.add_mode(&collection.id, name).await?;
			debug!(mode = %name, %mode_id, "added mode");
			changes.added.push(name.clone());
			kept.push(Mode {
				mode_id,
				name: name.clone(),
			});
		}

		let Some(collection) = self.store.collection_by_id(&collection.id).await? else {
			return Err(HostError::NotFound(collection.id.to_string()).into());
		};

		if !changes.is_empty() {
			info!(
				collection = %collection.name,
				modes = ?collection.mode_names(),
				"reconciled modes"
			);
		}

		Ok((collection, changes))
	}

	/// Remove every variable whose name is not a row key.
	async fn prune(&self, existing: &[Variable], rows: &[ExternalRow]) -> HostResult<Vec<String>> {
		let keys: BTreeSet<&str> = rows.iter().map(|row| row.key.as_str()).collect();
		let stale: Vec<&Variable> = existing
			.iter()
			.filter(|variable| !keys.contains(variable.name.as_str()))
			.collect();

		let removals = stale
			.iter()
			.map(|variable| self.store.remove_variable(&variable.id));
		try_join_all(removals).await?;

		let removed: Vec<String> = stale.iter().map(|variable| variable.name.clone()).collect();
		if !removed.is_empty() {
			info!(count = removed.len(), "pruned variables without a row");
		}

		Ok(removed)
	}

	/// Find or create the row's variable and write every mode's value.
	/// Returns `true` when the variable was created.
	async fn upsert_row(
		&self,
		collection: &VariableCollection,
		existing: &[&Variable],
		row: &ExternalRow,
	) -> HostResult<bool> {
		let (id, created) = match existing.iter().find(|variable| variable.name == row.key) {
			Some(variable) => (variable.id.clone(), false),
			None => {
				let variable = self
					.store
					.create_variable(&row.key, &collection.id, ResolvedType::String)
					.await?;
				debug!(name = %row.key, variable = %variable.id, "created variable");
				(variable.id, true)
			}
		};

		self.store
			.set_scopes(&id, &[VariableScope::TextContent])
			.await?;

		for mode in &collection.modes {
			let value = row.values.get(&mode.name).cloned().map(VariableValue::from);
			self.store
				.set_value_for_mode(&id, &mode.mode_id, value)
				.await?;
		}

		Ok(created)
	}
}
