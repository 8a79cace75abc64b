//! `Cargo.toml` parsing and editing through `toml_edit`, which keeps
//! comments, key order and formatting of everything not edited.

use super::{Declaration, FieldDeclarations, FieldEdit};
use crate::{DependencyField, DependencySource, Ecosystem};
use toml_edit::{DocumentMut, Item, TableLike, Value};

type EditResult<T> = std::result::Result<T, String>;

/// Parse `Cargo.toml` text into its package name and dependency fields.
///
/// Target-specific tables (`[target.'cfg(..)'.dependencies]`) are not read.
pub(crate) fn parse(source: &str) -> EditResult<(Option<String>, Vec<FieldDeclarations>)> {
    let doc = source.parse::<DocumentMut>().map_err(|e| e.to_string())?;

    let name = doc
        .get("package")
        .and_then(|p| p.get("name"))
        .and_then(Item::as_str)
        .map(String::from);

    let mut fields = Vec::new();
    for (key, item) in doc.iter() {
        if key == "workspace" {
            if let Some(deps) = item.get("dependencies") {
                fields.push(parse_field(
                    DependencyField::Workspace,
                    "workspace.dependencies",
                    deps,
                )?);
            }
            continue;
        }
        if let Some(field) = DependencyField::from_key(Ecosystem::Rust, key) {
            fields.push(parse_field(field, key, item)?);
        }
    }

    Ok((name, fields))
}

fn parse_field(field: DependencyField, key: &str, item: &Item) -> EditResult<FieldDeclarations> {
    let table = item
        .as_table_like()
        .ok_or_else(|| format!("[{}] is not a table", key))?;

    let declarations = table
        .iter()
        .map(|(name, value)| parse_declaration(key, name, value))
        .collect::<EditResult<Vec<_>>>()?;

    Ok(FieldDeclarations {
        field,
        declarations,
    })
}

fn parse_declaration(key: &str, name: &str, item: &Item) -> EditResult<Declaration> {
    if let Some(range) = item.as_str() {
        return Ok(Declaration {
            name: name.to_string(),
            range: range.to_string(),
            source: DependencySource::Registry,
        });
    }

    let table = item.as_table_like().ok_or_else(|| {
        format!(
            "dependency \"{}\" in [{}] must be a string or a table",
            name, key
        )
    })?;

    let has = |k: &str| table.get(k).is_some();
    let source = if table.get("workspace").and_then(Item::as_bool) == Some(true) {
        DependencySource::Workspace
    } else if has("path") {
        DependencySource::Path
    } else if has("git") {
        DependencySource::Git
    } else if has("package") {
        DependencySource::Alias
    } else if has("registry") {
        DependencySource::AlternateRegistry
    } else {
        DependencySource::Registry
    };

    let range = match table.get("version") {
        Some(version) => version
            .as_str()
            .ok_or_else(|| format!("version of \"{}\" in [{}] is not a string", name, key))?
            .to_string(),
        None => "*".to_string(),
    };

    Ok(Declaration {
        name: name.to_string(),
        range,
        source,
    })
}

/// Apply edits in order and render the document.
pub(crate) fn apply_edits(source: &str, edits: &[FieldEdit<'_>]) -> EditResult<String> {
    let mut doc = source.parse::<DocumentMut>().map_err(|e| e.to_string())?;

    for edit in edits {
        match *edit {
            FieldEdit::Set { field, name, range } => {
                let table = field_table(&mut doc, field)?
                    .ok_or_else(|| format!("no [{}] table", field))?;
                let item = table
                    .get_mut(name)
                    .ok_or_else(|| format!("\"{}\" is not declared in [{}]", name, field))?;
                set_version(item, range)
                    .ok_or_else(|| format!("\"{}\" in [{}] has no version to set", name, field))?;
            }
            FieldEdit::Insert { field, name, range } => {
                let table = ensure_field_table(&mut doc, field)?;
                if table.contains_key(name) {
                    return Err(format!("\"{}\" is already declared in [{}]", name, field));
                }
                table.insert(name, toml_edit::value(range));
            }
            FieldEdit::Remove { field, name } => {
                let table = field_table(&mut doc, field)?
                    .ok_or_else(|| format!("no [{}] table", field))?;
                table
                    .remove(name)
                    .ok_or_else(|| format!("\"{}\" is not declared in [{}]", name, field))?;
            }
        }
    }

    Ok(doc.to_string())
}

fn field_key(field: DependencyField) -> EditResult<&'static str> {
    field
        .key(Ecosystem::Rust)
        .ok_or_else(|| format!("Cargo.toml has no {} table", field))
}

fn field_table(
    doc: &mut DocumentMut,
    field: DependencyField,
) -> EditResult<Option<&mut dyn TableLike>> {
    let key = field_key(field)?;
    let item = if field == DependencyField::Workspace {
        doc.get_mut("workspace")
            .and_then(|w| w.as_table_like_mut())
            .and_then(|w| w.get_mut(key))
    } else {
        doc.get_mut(key)
    };
    Ok(item.and_then(Item::as_table_like_mut))
}

fn ensure_field_table(
    doc: &mut DocumentMut,
    field: DependencyField,
) -> EditResult<&mut dyn TableLike> {
    let key = field_key(field)?;
    let parent: &mut dyn TableLike = if field == DependencyField::Workspace {
        doc.entry("workspace")
            .or_insert(toml_edit::table())
            .as_table_like_mut()
            .ok_or_else(|| "[workspace] is not a table".to_string())?
    } else {
        doc.as_table_mut()
    };

    if parent.get(key).is_none() {
        parent.insert(key, toml_edit::table());
    }
    parent
        .get_mut(key)
        .and_then(Item::as_table_like_mut)
        .ok_or_else(|| format!("[{}] is not a table", field))
}

/// Replace the version of a declaration, keeping the value's surrounding
/// whitespace and trailing comment.
fn set_version(item: &mut Item, range: &str) -> Option<()> {
    if item.is_str() {
        return replace_string(item, range);
    }
    let table = item.as_table_like_mut()?;
    replace_string(table.get_mut("version")?, range)
}

fn replace_string(item: &mut Item, text: &str) -> Option<()> {
    let Item::Value(value) = item else {
        return None;
    };
    if !value.is_str() {
        return None;
    }
    let decor = value.decor().clone();
    *value = Value::from(text);
    *value.decor_mut() = decor;
    Some(())
}
