//! `package.json` parsing and span-based editing.
//!
//! Documents are validated with `serde_json` first; a small scanner then
//! records the byte spans of top-level members and dependency entries so
//! edits splice only the bytes they change.

use super::{Declaration, FieldDeclarations, FieldEdit};
use crate::version::ParsedRange;
use crate::{DependencyField, DependencySource, Ecosystem};
use serde_json::Value;

type ScanResult<T> = std::result::Result<T, String>;

#[derive(Debug)]
struct Member {
    key: String,
    key_start: usize,
    value_start: usize,
    value_end: usize,
}

#[derive(Debug)]
struct ObjectSpan {
    /// Index of `{`
    open: usize,
    /// Index of `}`
    close: usize,
    members: Vec<Member>,
}

struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
        }
    }

    fn skip_ws(&self, mut pos: usize) -> usize {
        while pos < self.bytes.len() && matches!(self.bytes[pos], b' ' | b'\t' | b'\n' | b'\r') {
            pos += 1;
        }
        pos
    }

    fn expect(&self, pos: usize, byte: u8) -> ScanResult<()> {
        match self.bytes.get(pos) {
            Some(b) if *b == byte => Ok(()),
            Some(b) => Err(format!(
                "expected '{}' at byte {}, found '{}'",
                byte as char, pos, *b as char
            )),
            None => Err(format!("expected '{}' at end of input", byte as char)),
        }
    }

    /// `pos` is at the opening quote; returns the index after the closing quote.
    fn string_end(&self, pos: usize) -> ScanResult<usize> {
        self.expect(pos, b'"')?;
        let mut i = pos + 1;
        while i < self.bytes.len() {
            match self.bytes[i] {
                b'\\' => i += 2,
                b'"' => return Ok(i + 1),
                _ => i += 1,
            }
        }
        Err("unterminated string".to_string())
    }

    fn decode_string(&self, start: usize, end: usize) -> ScanResult<String> {
        serde_json::from_str(&self.src[start..end]).map_err(|e| e.to_string())
    }

    /// Returns the index just after the value starting at `pos`.
    fn value_end(&self, pos: usize) -> ScanResult<usize> {
        match self.bytes.get(pos) {
            Some(b'"') => self.string_end(pos),
            Some(b'{') | Some(b'[') => {
                let mut depth = 0usize;
                let mut i = pos;
                while i < self.bytes.len() {
                    match self.bytes[i] {
                        b'"' => {
                            i = self.string_end(i)?;
                            continue;
                        }
                        b'{' | b'[' => depth += 1,
                        b'}' | b']' => {
                            depth -= 1;
                            if depth == 0 {
                                return Ok(i + 1);
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
                Err("unterminated container".to_string())
            }
            Some(_) => {
                let mut i = pos;
                while i < self.bytes.len()
                    && !matches!(
                        self.bytes[i],
                        b',' | b'}' | b']' | b' ' | b'\t' | b'\n' | b'\r'
                    )
                {
                    i += 1;
                }
                Ok(i)
            }
            None => Err("unexpected end of input".to_string()),
        }
    }

    /// Scan the object whose `{` is at `pos`.
    fn object(&self, pos: usize) -> ScanResult<ObjectSpan> {
        self.expect(pos, b'{')?;
        let mut members = Vec::new();
        let mut i = self.skip_ws(pos + 1);

        if self.bytes.get(i) == Some(&b'}') {
            return Ok(ObjectSpan {
                open: pos,
                close: i,
                members,
            });
        }

        loop {
            let key_start = i;
            let key_end = self.string_end(key_start)?;
            let key = self.decode_string(key_start, key_end)?;

            i = self.skip_ws(key_end);
            self.expect(i, b':')?;
            let value_start = self.skip_ws(i + 1);
            let value_end = self.value_end(value_start)?;

            members.push(Member {
                key,
                key_start,
                value_start,
                value_end,
            });

            i = self.skip_ws(value_end);
            match self.bytes.get(i) {
                Some(b',') => i = self.skip_ws(i + 1),
                Some(b'}') => {
                    return Ok(ObjectSpan {
                        open: pos,
                        close: i,
                        members,
                    })
                }
                _ => return Err(format!("expected ',' or '}}' at byte {}", i)),
            }
        }
    }

    fn root(&self) -> ScanResult<ObjectSpan> {
        let start = self.skip_ws(bom_len(self.src));
        self.object(start)
    }

    /// Leading whitespace of the line containing `pos`, up to `pos`.
    fn line_indent(&self, pos: usize) -> &'a str {
        let line_start = self.src[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let indent_end = self.src[line_start..pos]
            .find(|c: char| c != ' ' && c != '\t')
            .map(|i| line_start + i)
            .unwrap_or(pos);
        &self.src[line_start..indent_end]
    }

    /// Whitespace immediately preceding `pos`.
    fn whitespace_before(&self, pos: usize) -> &'a str {
        let start = self.src[..pos]
            .trim_end_matches([' ', '\t', '\n', '\r'])
            .len();
        &self.src[start..pos]
    }
}

fn bom_len(src: &str) -> usize {
    if src.starts_with('\u{feff}') {
        '\u{feff}'.len_utf8()
    } else {
        0
    }
}

/// Classify an npm declaration by its specifier.
pub(crate) fn classify_source(range: &str) -> DependencySource {
    let spec = range.trim();
    if spec.starts_with("workspace:") {
        DependencySource::Workspace
    } else if ["file:", "link:", "portal:"].iter().any(|p| spec.starts_with(p)) {
        DependencySource::Path
    } else if spec.starts_with("npm:") {
        DependencySource::Alias
    } else if ["git+", "git:", "git@", "github:", "gitlab:", "bitbucket:"]
        .iter()
        .any(|p| spec.starts_with(p))
    {
        DependencySource::Git
    } else if spec.starts_with("http://") || spec.starts_with("https://") {
        DependencySource::Url
    } else if ParsedRange::parse(spec, Ecosystem::JavaScript).is_ok() {
        DependencySource::Registry
    } else if spec.contains('/') && !spec.contains(' ') {
        // `owner/repo` GitHub shorthand
        DependencySource::Git
    } else if is_dist_tag(spec) {
        DependencySource::Tag
    } else {
        DependencySource::Registry
    }
}

fn is_dist_tag(spec: &str) -> bool {
    let mut chars = spec.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'))
}

/// Parse `package.json` text into its name and dependency fields.
pub(crate) fn parse(source: &str) -> ScanResult<(Option<String>, Vec<FieldDeclarations>)> {
    let body = &source[bom_len(source)..];
    let value: Value = serde_json::from_str(body).map_err(|e| e.to_string())?;
    let object = value
        .as_object()
        .ok_or_else(|| "manifest root is not a JSON object".to_string())?;
    let name = object.get("name").and_then(Value::as_str).map(String::from);

    let scanner = Scanner::new(source);
    let root = scanner.root()?;
    let mut fields: Vec<FieldDeclarations> = Vec::new();

    for member in &root.members {
        let Some(field) = DependencyField::from_key(Ecosystem::JavaScript, &member.key) else {
            continue;
        };
        if fields.iter().any(|f| f.field == field) {
            return Err(format!("duplicate \"{}\" field", member.key));
        }
        if scanner.bytes.get(member.value_start) != Some(&b'{') {
            return Err(format!("\"{}\" is not an object", member.key));
        }

        let object = scanner.object(member.value_start)?;
        let mut declarations: Vec<Declaration> = Vec::with_capacity(object.members.len());
        for entry in &object.members {
            if scanner.bytes.get(entry.value_start) != Some(&b'"') {
                return Err(format!(
                    "range for \"{}\" in \"{}\" is not a string",
                    entry.key, member.key
                ));
            }
            if declarations.iter().any(|d| d.name == entry.key) {
                return Err(format!(
                    "\"{}\" is declared twice in \"{}\"",
                    entry.key, member.key
                ));
            }
            let range = scanner.decode_string(entry.value_start, entry.value_end)?;
            declarations.push(Declaration {
                name: entry.key.clone(),
                source: classify_source(&range),
                range,
            });
        }

        fields.push(FieldDeclarations {
            field,
            declarations,
        });
    }

    Ok((name, fields))
}

fn splice(src: &str, start: usize, end: usize, replacement: &str) -> String {
    let mut out = String::with_capacity(src.len() + replacement.len());
    out.push_str(&src[..start]);
    out.push_str(replacement);
    out.push_str(&src[end..]);
    out
}

fn quote(text: &str) -> ScanResult<String> {
    serde_json::to_string(text).map_err(|e| e.to_string())
}

fn field_key(field: DependencyField) -> ScanResult<&'static str> {
    field
        .key(Ecosystem::JavaScript)
        .ok_or_else(|| format!("package.json has no {} field", field))
}

/// Apply one edit, returning the new text.
pub(crate) fn apply_edit(src: &str, edit: &FieldEdit<'_>) -> ScanResult<String> {
    let scanner = Scanner::new(src);
    let root = scanner.root()?;

    match *edit {
        FieldEdit::Set { field, name, range } => {
            let key = field_key(field)?;
            let object = field_object(&scanner, &root, key)?
                .ok_or_else(|| format!("no \"{}\" field", key))?;
            let entry = object
                .members
                .iter()
                .find(|m| m.key == name)
                .ok_or_else(|| format!("\"{}\" is not declared in \"{}\"", name, key))?;
            Ok(splice(src, entry.value_start, entry.value_end, &quote(range)?))
        }
        FieldEdit::Remove { field, name } => {
            let key = field_key(field)?;
            let object = field_object(&scanner, &root, key)?
                .ok_or_else(|| format!("no \"{}\" field", key))?;
            let index = object
                .members
                .iter()
                .position(|m| m.key == name)
                .ok_or_else(|| format!("\"{}\" is not declared in \"{}\"", name, key))?;
            let members = &object.members;

            Ok(if members.len() == 1 {
                splice(src, object.open + 1, object.close, "")
            } else if index + 1 < members.len() {
                splice(src, members[index].key_start, members[index + 1].key_start, "")
            } else {
                splice(src, members[index - 1].value_end, members[index].value_end, "")
            })
        }
        FieldEdit::Insert { field, name, range } => {
            let key = field_key(field)?;
            let entry = format!("{}: {}", quote(name)?, quote(range)?);
            let newline = if src.contains("\r\n") { "\r\n" } else { "\n" };
            let multiline = src.contains('\n');
            let unit = indent_unit(&scanner, &root);

            match field_object(&scanner, &root, key)? {
                Some(object) => Ok(insert_into_object(
                    &scanner, &root, key, &object, &entry, name, newline, multiline, &unit,
                )),
                None => Ok(insert_field(
                    &scanner, &root, key, &entry, newline, multiline, &unit,
                )),
            }
        }
    }
}

fn field_object(
    scanner: &Scanner<'_>,
    root: &ObjectSpan,
    key: &str,
) -> ScanResult<Option<ObjectSpan>> {
    match root.members.iter().find(|m| m.key == key) {
        Some(member) => scanner.object(member.value_start).map(Some),
        None => Ok(None),
    }
}

fn indent_unit(scanner: &Scanner<'_>, root: &ObjectSpan) -> String {
    root.members
        .first()
        .map(|m| scanner.line_indent(m.key_start))
        .filter(|indent| !indent.is_empty())
        .unwrap_or("  ")
        .to_string()
}

#[allow(clippy::too_many_arguments)]
fn insert_into_object(
    scanner: &Scanner<'_>,
    root: &ObjectSpan,
    key: &str,
    object: &ObjectSpan,
    entry: &str,
    name: &str,
    newline: &str,
    multiline: bool,
    unit: &str,
) -> String {
    let src = scanner.src;
    let members = &object.members;

    if members.is_empty() {
        let interior = if multiline {
            let field_indent = root
                .members
                .iter()
                .find(|m| m.key == key)
                .map(|m| scanner.line_indent(m.key_start))
                .unwrap_or("");
            format!(
                "{nl}{fi}{unit}{entry}{nl}{fi}",
                nl = newline,
                fi = field_indent,
                unit = unit,
                entry = entry
            )
        } else {
            entry.to_string()
        };
        return splice(src, object.open + 1, object.close, &interior);
    }

    // Keep alphabetical order when the existing entries are sorted.
    let sorted = members.windows(2).all(|w| w[0].key <= w[1].key);
    let before = if sorted {
        members.iter().find(|m| m.key.as_str() > name)
    } else {
        None
    };

    match before {
        Some(next) => {
            let separator = scanner.whitespace_before(next.key_start);
            let text = format!("{},{}", entry, separator);
            splice(src, next.key_start, next.key_start, &text)
        }
        None => {
            // members is non-empty here
            let last = &members[members.len() - 1];
            let separator = scanner.whitespace_before(last.key_start);
            let text = format!(",{}{}", separator, entry);
            splice(src, last.value_end, last.value_end, &text)
        }
    }
}

fn insert_field(
    scanner: &Scanner<'_>,
    root: &ObjectSpan,
    key: &str,
    entry: &str,
    newline: &str,
    multiline: bool,
    unit: &str,
) -> String {
    let src = scanner.src;
    let (nl, field_indent, entry_indent) = if multiline {
        let field_indent = root
            .members
            .last()
            .map(|m| scanner.line_indent(m.key_start).to_string())
            .unwrap_or_else(|| unit.to_string());
        let entry_indent = format!("{}{}", field_indent, unit);
        (newline, field_indent, entry_indent)
    } else {
        ("", String::new(), String::new())
    };

    let block = format!(
        "\"{key}\": {{{nl}{ei}{entry}{nl}{fi}}}",
        key = key,
        nl = nl,
        ei = entry_indent,
        entry = entry,
        fi = field_indent
    );

    match root.members.last() {
        Some(last) => {
            let separator = scanner.whitespace_before(last.key_start);
            splice(
                src,
                last.value_end,
                last.value_end,
                &format!(",{}{}", separator, block),
            )
        }
        None => {
            let interior = if multiline {
                format!("{nl}{fi}{block}{nl}", nl = nl, fi = field_indent, block = block)
            } else {
                block
            };
            splice(src, root.open + 1, root.close, &interior)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
  "name": "web",
  "version": "1.0.0",
  "dependencies": {
    "lodash": "^4.17.0",
    "react": "18.2.0",
    "shared": "workspace:*"
  },
  "devDependencies": {
    "typescript": "~5.3.0"
  }
}
"#;

    fn set(field: DependencyField, name: &'static str, range: &'static str) -> FieldEdit<'static> {
        FieldEdit::Set { field, name, range }
    }

    #[test]
    fn test_parse_fields_in_declaration_order() {
        let (name, fields) = parse(MANIFEST).unwrap();
        assert_eq!(name.as_deref(), Some("web"));
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].field, DependencyField::Runtime);
        assert_eq!(fields[1].field, DependencyField::Dev);

        let names: Vec<_> = fields[0].declarations.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["lodash", "react", "shared"]);
        assert_eq!(fields[0].declarations[2].source, DependencySource::Workspace);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse("{").is_err());
        assert!(parse("[]").is_err());
        assert!(parse(r#"{"dependencies": ["a"]}"#).is_err());
        assert!(parse(r#"{"dependencies": {"a": 1}}"#).is_err());
        assert!(parse(r#"{"dependencies": {"a": "1", "a": "2"}}"#).is_err());
    }

    #[test]
    fn test_classify_source() {
        assert_eq!(classify_source("^1.0.0"), DependencySource::Registry);
        assert_eq!(classify_source("*"), DependencySource::Registry);
        assert_eq!(classify_source(""), DependencySource::Registry);
        assert_eq!(classify_source("workspace:^"), DependencySource::Workspace);
        assert_eq!(classify_source("file:../lib"), DependencySource::Path);
        assert_eq!(classify_source("npm:react@18"), DependencySource::Alias);
        assert_eq!(
            classify_source("git+https://github.com/a/b.git"),
            DependencySource::Git
        );
        assert_eq!(classify_source("expressjs/express"), DependencySource::Git);
        assert_eq!(
            classify_source("https://example.com/pkg.tgz"),
            DependencySource::Url
        );
        assert_eq!(classify_source("latest"), DependencySource::Tag);
    }

    #[test]
    fn test_set_changes_only_the_value() {
        let out = apply_edit(MANIFEST, &set(DependencyField::Runtime, "lodash", "^4.17.21")).unwrap();
        assert_eq!(out, MANIFEST.replace("\"^4.17.0\"", "\"^4.17.21\""));
    }

    #[test]
    fn test_set_preserves_unusual_formatting() {
        let src = "{\"dependencies\":{\"a\" :  \"1.0.0\" ,\"b\":\"2.0.0\"}}";
        let out = apply_edit(src, &set(DependencyField::Runtime, "a", "1.0.1")).unwrap();
        assert_eq!(out, "{\"dependencies\":{\"a\" :  \"1.0.1\" ,\"b\":\"2.0.0\"}}");
    }

    #[test]
    fn test_remove_middle_and_last() {
        let remove = |src: &str, name: &'static str| {
            apply_edit(
                src,
                &FieldEdit::Remove {
                    field: DependencyField::Runtime,
                    name,
                },
            )
            .unwrap()
        };

        let out = remove(MANIFEST, "react");
        assert!(out.contains("\"lodash\": \"^4.17.0\",\n    \"shared\": \"workspace:*\"\n"));
        assert!(serde_json::from_str::<Value>(&out).is_ok());

        let out = remove(MANIFEST, "shared");
        assert!(out.contains("\"react\": \"18.2.0\"\n  },"));
        assert!(serde_json::from_str::<Value>(&out).is_ok());
    }

    #[test]
    fn test_remove_only_entry_leaves_empty_object() {
        let out = apply_edit(
            MANIFEST,
            &FieldEdit::Remove {
                field: DependencyField::Dev,
                name: "typescript",
            },
        )
        .unwrap();
        assert!(out.contains("\"devDependencies\": {}"));
    }

    #[test]
    fn test_insert_sorted_position() {
        let out = apply_edit(
            MANIFEST,
            &FieldEdit::Insert {
                field: DependencyField::Runtime,
                name: "next",
                range: "^14.0.0",
            },
        )
        .unwrap();
        assert!(out.contains(
            "\"lodash\": \"^4.17.0\",\n    \"next\": \"^14.0.0\",\n    \"react\": \"18.2.0\","
        ));
    }

    #[test]
    fn test_insert_appends_after_last() {
        let out = apply_edit(
            MANIFEST,
            &FieldEdit::Insert {
                field: DependencyField::Dev,
                name: "vitest",
                range: "^1.0.0",
            },
        )
        .unwrap();
        assert!(out.contains("\"typescript\": \"~5.3.0\",\n    \"vitest\": \"^1.0.0\"\n  }"));
    }

    #[test]
    fn test_insert_creates_missing_field() {
        let out = apply_edit(
            MANIFEST,
            &FieldEdit::Insert {
                field: DependencyField::Peer,
                name: "react",
                range: "^18.0.0",
            },
        )
        .unwrap();
        assert!(out.ends_with(
            "  },\n  \"peerDependencies\": {\n    \"react\": \"^18.0.0\"\n  }\n}\n"
        ));
        let (_, fields) = parse(&out).unwrap();
        assert_eq!(fields[2].field, DependencyField::Peer);
    }

    #[test]
    fn test_insert_into_empty_root() {
        let out = apply_edit(
            "{}",
            &FieldEdit::Insert {
                field: DependencyField::Runtime,
                name: "a",
                range: "^1.0.0",
            },
        )
        .unwrap();
        assert_eq!(out, "{\"dependencies\": {\"a\": \"^1.0.0\"}}");
    }

    #[test]
    fn test_escaped_keys_and_values() {
        let src = r#"{"dependencies": {"we\"ird": "^1.0.0"}}"#;
        let (_, fields) = parse(src).unwrap();
        assert_eq!(fields[0].declarations[0].name, "we\"ird");

        let out = apply_edit(
            src,
            &FieldEdit::Set {
                field: DependencyField::Runtime,
                name: "we\"ird",
                range: "^1.1.0",
            },
        )
        .unwrap();
        assert_eq!(out, r#"{"dependencies": {"we\"ird": "^1.1.0"}}"#);
    }
}
