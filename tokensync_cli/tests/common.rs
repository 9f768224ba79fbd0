#![allow(dead_code)]

use std::path::Path;
use std::path::PathBuf;

use assert_cmd::Command;

pub fn tokensync_cmd() -> Command {
	let mut cmd = Command::new(env!("CARGO_BIN_EXE_tokensync"));
	cmd.env("NO_COLOR", "1").env_remove("RUST_LOG");
	cmd
}

/// One page holding a frame with two text layers and a button instance whose
/// label is driven by the `label#1` property, plus a loose text layer and a
/// rectangle. The frame is selected.
pub const DOCUMENT: &str = r#"{
	"nodes": [
		{ "id": "0:0", "type": "DOCUMENT" },
		{ "id": "1:1", "type": "PAGE", "name": "Home", "parent": "0:0" },
		{ "id": "2:1", "type": "FRAME", "parent": "1:1" },
		{ "id": "2:2", "type": "TEXT", "parent": "2:1", "characters": "Sign in" },
		{ "id": "2:3", "type": "TEXT", "parent": "2:1", "characters": "Sign  up" },
		{
			"id": "4:1",
			"type": "INSTANCE",
			"parent": "2:1",
			"componentProperties": { "label#1": { "value": "Sign in" } }
		},
		{
			"id": "4:1;3:2",
			"type": "TEXT",
			"parent": "4:1",
			"characters": "Sign in",
			"componentPropertyReferences": { "characters": "label#1" }
		},
		{ "id": "2:4", "type": "TEXT", "parent": "1:1", "characters": "OK" },
		{ "id": "2:5", "type": "RECTANGLE", "parent": "1:1" }
	],
	"currentPage": "1:1",
	"selection": ["2:1"],
	"libraries": [
		{
			"key": "lib-key-1",
			"name": "Shared",
			"libraryName": "Design System",
			"variables": [
				{
					"id": "VariableID:lib:1",
					"key": "lib-var-1",
					"name": "common/ok",
					"variableCollectionId": "VariableCollectionId:lib",
					"resolvedType": "STRING",
					"valuesByMode": { "9:0": "OK" },
					"scopes": ["TEXT_CONTENT", "WIDTH_HEIGHT"]
				}
			]
		}
	],
	"nextId": 100
}"#;

/// A saved query response with two rows.
pub const SOURCE: &str = r#"{
	"results": [
		{
			"id": "page-1",
			"properties": {
				"key": { "type": "title", "title": [{ "plain_text": "sign_in" }] },
				"ja": { "type": "rich_text", "rich_text": [{ "plain_text": "ログイン" }] },
				"en": { "type": "rich_text", "rich_text": [{ "plain_text": "Sign in" }] }
			}
		},
		{
			"id": "page-2",
			"properties": {
				"key": { "type": "title", "title": [{ "plain_text": "sign_up" }] },
				"ja": { "type": "rich_text", "rich_text": [{ "plain_text": "新規登録" }] },
				"en": { "type": "formula", "formula": { "string": "Sign up" } }
			}
		}
	],
	"has_more": false,
	"next_cursor": null
}"#;

pub fn write_document(dir: &Path) -> std::io::Result<PathBuf> {
	let path = dir.join("design.json");
	std::fs::write(&path, DOCUMENT)?;
	Ok(path)
}

pub fn write_source(dir: &Path) -> std::io::Result<PathBuf> {
	let path = dir.join("source.json");
	std::fs::write(&path, SOURCE)?;
	Ok(path)
}

/// Sync the sample rows into a `Messages` collection with `ja` and `en`
/// modes.
pub fn sync_messages(dir: &Path, document: &Path) -> std::io::Result<()> {
	let source = write_source(dir)?;
	tokensync_cmd()
		.arg("sync")
		.arg("--path")
		.arg(dir)
		.arg("--document")
		.arg(document)
		.arg("--source")
		.arg(source)
		.args(["--collection", "Messages", "--key-property", "key", "--values", "ja,en"])
		.assert()
		.success();
	Ok(())
}
