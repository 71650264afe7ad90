//! Semantic validation of a parsed schema.
//!
//! Findings carry a severity: errors make the schema unusable, warnings
//! flag conventions worth fixing (a missing zero enum value, reserved
//! field numbers).

use std::collections::{HashMap, HashSet};

use crate::ast::*;
use crate::diagnostic::Diagnostic;

/// Smallest valid field number.
pub const MIN_FIELD_NUMBER: u32 = 1;
/// Largest valid field number.
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;
/// Field numbers reserved for internal use; using them is a warning.
pub const RESERVED_FIELD_RANGE: std::ops::RangeInclusive<u32> = 19000..=19999;
/// First TypeID available to user-defined types.
pub const FIRST_USER_TYPE_ID: u32 = 128;

/// Validate a schema on its own. Qualified names cannot be resolved and
/// are left to [`validate_with_imports`].
pub fn validate(schema: &Schema) -> Vec<Diagnostic> {
    Validator {
        schema,
        imports: None,
        findings: Vec::new(),
    }
    .run()
}

/// Validate a schema with access to its imported schemas, keyed by the
/// alias (or file stem) they are referenced through.
pub fn validate_with_imports(
    schema: &Schema,
    imports: &HashMap<String, Schema>,
) -> Vec<Diagnostic> {
    Validator {
        schema,
        imports: Some(imports),
        findings: Vec::new(),
    }
    .run()
}

struct Validator<'a> {
    schema: &'a Schema,
    imports: Option<&'a HashMap<String, Schema>>,
    findings: Vec<Diagnostic>,
}

/// What a (possibly imported) name resolved to.
enum Resolved {
    Message,
    Enum,
    Interface,
    /// Unresolvable for lack of import access; not an error by itself.
    Unknown,
}

impl<'a> Validator<'a> {
    fn error(&mut self, span: crate::token::Span, message: impl Into<String>) {
        self.findings.push(Diagnostic::error(span, message));
    }

    fn warning(&mut self, span: crate::token::Span, message: impl Into<String>) {
        self.findings.push(Diagnostic::warning(span, message));
    }

    fn run(mut self) -> Vec<Diagnostic> {
        self.check_unique_type_names();
        for message in &self.schema.messages {
            self.check_message(message);
        }
        for decl in &self.schema.enums {
            self.check_enum(decl);
        }
        for decl in &self.schema.interfaces {
            self.check_interface(decl);
        }
        self.findings
    }

    fn check_unique_type_names(&mut self) {
        let mut seen: HashMap<&str, &str> = HashMap::new();
        let names = self
            .schema
            .messages
            .iter()
            .map(|m| (m.name.as_str(), "message", m.span))
            .chain(self.schema.enums.iter().map(|e| (e.name.as_str(), "enum", e.span)))
            .chain(
                self.schema
                    .interfaces
                    .iter()
                    .map(|i| (i.name.as_str(), "interface", i.span)),
            )
            .collect::<Vec<_>>();
        for (name, kind, span) in names {
            if let Some(previous) = seen.insert(name, kind) {
                let msg = format!("type name '{name}' already declared as a {previous}");
                self.error(span, msg);
            }
        }
    }

    fn resolve(&self, name: &QualifiedName) -> Resolved {
        match &name.qualifier {
            None => {
                if self.schema.find_message(&name.name).is_some() {
                    Resolved::Message
                } else if self.schema.find_enum(&name.name).is_some() {
                    Resolved::Enum
                } else if self.schema.find_interface(&name.name).is_some() {
                    Resolved::Interface
                } else {
                    Resolved::Unknown
                }
            }
            Some(qualifier) => {
                let Some(imports) = self.imports else {
                    // No import access: cross-file names are out of reach.
                    return Resolved::Unknown;
                };
                let Some(imported) = imports.get(qualifier) else {
                    return Resolved::Unknown;
                };
                if imported.find_message(&name.name).is_some() {
                    Resolved::Message
                } else if imported.find_enum(&name.name).is_some() {
                    Resolved::Enum
                } else if imported.find_interface(&name.name).is_some() {
                    Resolved::Interface
                } else {
                    Resolved::Unknown
                }
            }
        }
    }

    /// Whether `qualifier.name` can even be looked up in this run.
    fn can_resolve(&self, name: &QualifiedName) -> bool {
        match &name.qualifier {
            None => true,
            Some(qualifier) => self
                .imports
                .is_some_and(|imports| imports.contains_key(qualifier)),
        }
    }

    fn check_message(&mut self, message: &Message) {
        if let Some(type_id) = message.type_id {
            if type_id < FIRST_USER_TYPE_ID {
                let msg = format!(
                    "TypeID {type_id} is in the reserved range; user types start at {FIRST_USER_TYPE_ID}"
                );
                self.warning(message.span, msg);
            }
        }

        let mut numbers: HashMap<u32, &str> = HashMap::new();
        for field in &message.fields {
            if let Some(previous) = numbers.insert(field.number, &field.name) {
                let msg = format!(
                    "field number {} reused by '{}' (already used by '{previous}')",
                    field.number, field.name
                );
                self.error(field.span, msg);
            }
            if !(MIN_FIELD_NUMBER..=MAX_FIELD_NUMBER).contains(&field.number) {
                let msg = format!(
                    "field number {} outside the valid range [{MIN_FIELD_NUMBER}, {MAX_FIELD_NUMBER}]",
                    field.number
                );
                self.error(field.span, msg);
            } else if RESERVED_FIELD_RANGE.contains(&field.number) {
                let msg = format!("field number {} is in the reserved range", field.number);
                self.warning(field.span, msg);
            }
            if field.modifiers.required && field.modifiers.optional {
                self.error(
                    field.span,
                    "'required' and 'optional' are mutually exclusive",
                );
            }
            self.check_typeref(&field.ty, field);
        }
    }

    fn check_typeref(&mut self, ty: &TypeRef, field: &FieldDecl) {
        match ty {
            TypeRef::Scalar(_) => {}
            TypeRef::Named(name) => {
                if self.can_resolve(name) {
                    if let Resolved::Unknown = self.resolve(name) {
                        let msg = format!("unknown type '{name}'");
                        self.error(field.span, msg);
                    }
                }
            }
            TypeRef::Array { element, .. } => self.check_typeref(element, field),
            TypeRef::Pointer(inner) => self.check_typeref(inner, field),
            TypeRef::Map { key, value } => {
                self.check_map_key(key, field);
                self.check_typeref(value, field);
            }
        }
    }

    /// Map keys must be a non-float, non-bytes scalar or an enum.
    fn check_map_key(&mut self, key: &TypeRef, field: &FieldDecl) {
        match key {
            TypeRef::Scalar(scalar) => {
                if scalar.is_float() || *scalar == ScalarType::Bytes {
                    let msg = format!("'{}' cannot be a map key", scalar.name());
                    self.error(field.span, msg);
                }
            }
            TypeRef::Named(name) => {
                if self.can_resolve(name) {
                    match self.resolve(name) {
                        Resolved::Enum => {}
                        Resolved::Unknown => {
                            let msg = format!("unknown type '{name}'");
                            self.error(field.span, msg);
                        }
                        Resolved::Message | Resolved::Interface => {
                            let msg = format!("map key '{name}' must be a scalar or enum");
                            self.error(field.span, msg);
                        }
                    }
                }
            }
            other => {
                let msg = format!("composite type '{other}' cannot be a map key");
                self.error(field.span, msg);
            }
        }
    }

    fn check_enum(&mut self, decl: &EnumDecl) {
        let mut numbers: HashSet<u32> = HashSet::new();
        let mut names: HashSet<&str> = HashSet::new();
        for value in &decl.values {
            if !numbers.insert(value.number) {
                let msg = format!(
                    "enum value number {} reused by '{}'",
                    value.number, value.name
                );
                self.error(value.span, msg);
            }
            if !names.insert(&value.name) {
                let msg = format!("enum value name '{}' reused", value.name);
                self.error(value.span, msg);
            }
        }
        if !numbers.contains(&0) {
            self.warning(decl.span, "enum has no zero value");
        }
    }

    fn check_interface(&mut self, decl: &InterfaceDecl) {
        let mut type_ids: HashSet<u32> = HashSet::new();
        for implementation in &decl.implementations {
            if !type_ids.insert(implementation.type_id) {
                let msg = format!("TypeID {} reused within interface", implementation.type_id);
                self.error(implementation.span, msg);
            }
            if implementation.type_id < FIRST_USER_TYPE_ID {
                let msg = format!(
                    "TypeID {} is in the reserved range; user types start at {FIRST_USER_TYPE_ID}",
                    implementation.type_id
                );
                self.warning(implementation.span, msg);
            }
            if self.can_resolve(&implementation.type_name) {
                match self.resolve(&implementation.type_name) {
                    Resolved::Message => {}
                    Resolved::Enum | Resolved::Interface => {
                        let msg = format!(
                            "interface implementation '{}' must be a message",
                            implementation.type_name
                        );
                        self.error(implementation.span, msg);
                    }
                    Resolved::Unknown => {
                        let msg = format!("unknown type '{}'", implementation.type_name);
                        self.error(implementation.span, msg);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::diagnostic::Severity;
    use crate::parser::parse;

    use super::*;

    fn check(source: &str) -> Vec<Diagnostic> {
        let schema = parse(source).into_schema().unwrap();
        validate(&schema)
    }

    fn errors(source: &str) -> Vec<String> {
        check(source)
            .into_iter()
            .filter(|d| d.is_error())
            .map(|d| d.message)
            .collect()
    }

    #[test]
    fn test_clean_schema() {
        let findings = check(
            "message User { id: int64 = 1 [required]; }\n\
             enum Status { UNKNOWN = 0; ACTIVE = 1; }\n\
             interface Principal { User = 128; }",
        );
        assert!(findings.is_empty(), "{findings:?}");
    }

    #[test]
    fn test_duplicate_type_names() {
        let found = errors("message A { x: int32 = 1; }\nenum A { ZERO = 0; }");
        assert_eq!(found.len(), 1);
        assert!(found[0].contains("already declared"));
    }

    #[test]
    fn test_duplicate_field_numbers() {
        let found = errors("message M { a: int32 = 1; b: int32 = 1; }");
        assert_eq!(found.len(), 1);
        assert!(found[0].contains("reused"));
    }

    #[test]
    fn test_reserved_field_number_warns() {
        let findings = check("message M { a: int32 = 19001; }");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
    }

    #[test]
    fn test_required_optional_conflict() {
        let found = errors("message M { a: int32 = 1 [required, optional]; }");
        assert!(found.iter().any(|m| m.contains("mutually exclusive")));
    }

    #[test]
    fn test_enum_checks() {
        let found = errors("enum E { A = 1; B = 1; }");
        assert!(found.iter().any(|m| m.contains("reused")));

        let findings = check("enum E { A = 1; }");
        assert!(findings
            .iter()
            .any(|d| d.severity == Severity::Warning && d.message.contains("zero")));
    }

    #[test]
    fn test_map_key_rules() {
        assert!(errors("message M { m: map[float64]string = 1; }")
            .iter()
            .any(|m| m.contains("map key")));
        assert!(errors("message M { m: map[bytes]string = 1; }")
            .iter()
            .any(|m| m.contains("map key")));
        // Enum keys are allowed.
        assert!(errors("enum E { Z = 0; }\nmessage M { m: map[E]string = 1; }").is_empty());
        // Message keys are not.
        assert!(
            !errors("message K { x: int32 = 1; }\nmessage M { m: map[K]string = 2; }").is_empty()
        );
    }

    #[test]
    fn test_interface_rules() {
        let found = errors("enum E { Z = 0; }\ninterface I { E = 128; }");
        assert!(found.iter().any(|m| m.contains("must be a message")));

        let found = errors("message A { x: int32 = 1; }\ninterface I { A = 128; A = 128; }");
        assert!(found.iter().any(|m| m.contains("reused")));
    }

    #[test]
    fn test_unknown_local_type() {
        let found = errors("message M { x: Missing = 1; }");
        assert!(found.iter().any(|m| m.contains("unknown type")));
    }

    #[test]
    fn test_qualified_resolution_with_imports() {
        let main = parse(
            "import \"types.cram\" as types;\n\
             message M { a: *types.Address = 1; b: types.Missing = 2; }",
        )
        .into_schema()
        .unwrap();
        let imported = parse("message Address { city: string = 1; }")
            .into_schema()
            .unwrap();

        let mut imports = HashMap::new();
        imports.insert("types".to_string(), imported);
        let findings = validate_with_imports(&main, &imports);
        let errors: Vec<_> = findings.iter().filter(|d| d.is_error()).collect();
        assert_eq!(errors.len(), 1, "{findings:?}");
        assert!(errors[0].message.contains("types.Missing"));
    }

    #[test]
    fn test_qualified_names_skipped_without_imports() {
        // Without import access the qualified name cannot be judged.
        let findings = check(
            "import \"types.cram\" as types;\nmessage M { a: types.Address = 1; }",
        );
        assert!(findings.is_empty(), "{findings:?}");
    }
}
