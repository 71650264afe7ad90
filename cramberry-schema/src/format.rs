//! Canonical pretty-printer for schema ASTs.
//!
//! Parsing the formatter's output yields the same AST back (free-standing
//! comment placement aside), so formatting is idempotent.

use std::fmt::Write;

use crate::ast::*;

/// Formatter knobs.
#[derive(Debug, Clone)]
pub struct FormatOptions {
    /// One level of indentation. Two spaces by default.
    pub indent: String,
}

impl Default for FormatOptions {
    fn default() -> Self {
        FormatOptions {
            indent: "  ".to_string(),
        }
    }
}

/// Render a schema to canonical source text with default options.
pub fn format_schema(schema: &Schema) -> String {
    format_schema_with(schema, &FormatOptions::default())
}

/// Render a schema to canonical source text.
pub fn format_schema_with(schema: &Schema, opts: &FormatOptions) -> String {
    let mut out = String::new();
    let indent = &opts.indent;

    if let Some(package) = &schema.package {
        let _ = writeln!(out, "package {package};");
    }

    for import in &schema.imports {
        match &import.alias {
            Some(alias) => {
                let _ = writeln!(out, "import \"{}\" as {alias};", import.path);
            }
            None => {
                let _ = writeln!(out, "import \"{}\";", import.path);
            }
        }
    }

    for option in &schema.options {
        let _ = writeln!(out, "option {} = {};", option.name, option.value);
    }

    for message in &schema.messages {
        if !out.is_empty() {
            out.push('\n');
        }
        write_docs(&mut out, &message.doc, "");
        match message.type_id {
            Some(type_id) => {
                let _ = writeln!(out, "message {} @{type_id} {{", message.name);
            }
            None => {
                let _ = writeln!(out, "message {} {{", message.name);
            }
        }
        for option in &message.options {
            let _ = writeln!(out, "{indent}option {} = {};", option.name, option.value);
        }
        for field in &message.fields {
            write_docs(&mut out, &field.doc, indent);
            let _ = write!(out, "{indent}{}: {} = {}", field.name, field.ty, field.number);
            let attrs = field_attrs(field);
            if !attrs.is_empty() {
                let _ = write!(out, " [{}]", attrs.join(", "));
            }
            out.push_str(";\n");
        }
        out.push_str("}\n");
    }

    for decl in &schema.enums {
        if !out.is_empty() {
            out.push('\n');
        }
        write_docs(&mut out, &decl.doc, "");
        let _ = writeln!(out, "enum {} {{", decl.name);
        for option in &decl.options {
            let _ = writeln!(out, "{indent}option {} = {};", option.name, option.value);
        }
        for value in &decl.values {
            write_docs(&mut out, &value.doc, indent);
            let _ = writeln!(out, "{indent}{} = {};", value.name, value.number);
        }
        out.push_str("}\n");
    }

    for decl in &schema.interfaces {
        if !out.is_empty() {
            out.push('\n');
        }
        write_docs(&mut out, &decl.doc, "");
        let _ = writeln!(out, "interface {} {{", decl.name);
        for option in &decl.options {
            let _ = writeln!(out, "{indent}option {} = {};", option.name, option.value);
        }
        for implementation in &decl.implementations {
            let _ = writeln!(
                out,
                "{indent}{} = {};",
                implementation.type_name, implementation.type_id
            );
        }
        out.push_str("}\n");
    }

    out
}

fn write_docs(out: &mut String, docs: &[String], indent: &str) {
    for line in docs {
        let _ = writeln!(out, "{indent}/// {line}");
    }
}

fn field_attrs(field: &FieldDecl) -> Vec<String> {
    let mut attrs = Vec::new();
    if field.modifiers.required {
        attrs.push("required".to_string());
    }
    if field.modifiers.optional {
        attrs.push("optional".to_string());
    }
    if field.modifiers.repeated {
        attrs.push("repeated".to_string());
    }
    if field.modifiers.deprecated {
        attrs.push("deprecated".to_string());
    }
    for option in &field.options {
        attrs.push(format!("{} = {}", option.name, option.value));
    }
    attrs
}

#[cfg(test)]
mod tests {
    use crate::parser::parse;

    use super::*;

    const SOURCE: &str = r#"package example;
import "types.cram" as types;

/// A user account.
message User {
  id: int64 = 1 [required];
  name: string = 2;
  tags: []string = 4;
  metadata: map[string]string = 5;
  address: *types.Address = 6;
}

enum Status {
  UNKNOWN = 0;
  ACTIVE = 1;
}

interface Principal {
  User = 128;
  Admin = 129;
}
"#;

    #[test]
    fn test_format_is_canonical() {
        let schema = parse(SOURCE).into_schema().unwrap();
        let formatted = format_schema(&schema);
        assert_eq!(formatted, SOURCE);
    }

    #[test]
    fn test_roundtrip_is_idempotent() {
        // parse . format . parse yields an equivalent AST; spans move, so
        // equivalence is judged through the canonical rendering.
        let schema = parse(SOURCE).into_schema().unwrap();
        let formatted = format_schema(&schema);
        let reparsed = parse(&formatted).into_schema().unwrap();
        assert_eq!(format_schema(&reparsed), formatted);
        assert_eq!(reparsed.messages.len(), schema.messages.len());
        assert_eq!(
            reparsed.messages[0].fields.len(),
            schema.messages[0].fields.len()
        );
    }

    #[test]
    fn test_custom_indent() {
        let schema = parse("message M { x: bool = 1; }").into_schema().unwrap();
        let formatted = format_schema_with(
            &schema,
            &FormatOptions {
                indent: "    ".to_string(),
            },
        );
        assert!(formatted.contains("    x: bool = 1;"));
    }

    #[test]
    fn test_explicit_type_id_rendered() {
        let schema = parse("message M @200 { x: bool = 1; }").into_schema().unwrap();
        let formatted = format_schema(&schema);
        assert!(formatted.contains("message M @200 {"));
    }
}
