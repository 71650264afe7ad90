//! Schema compatibility checking.
//!
//! Diffs two schemas and classifies every change as breaking (previously
//! encoded data becomes undecodable or changes meaning) or merely worth a
//! warning.

use std::fmt;

use crate::ast::*;

/// The classified breaking changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakingKind {
    MessageRemoved,
    EnumRemoved,
    FieldTypeChanged,
    RequiredFieldAdded,
    RequiredFieldRemoved,
    EnumValueRemoved,
    EnumValueReused,
    InterfaceTypeRemoved,
    InterfaceTypeIdReused,
}

impl fmt::Display for BreakingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BreakingKind::MessageRemoved => "message removed",
            BreakingKind::EnumRemoved => "enum removed",
            BreakingKind::FieldTypeChanged => "field type changed",
            BreakingKind::RequiredFieldAdded => "required field added",
            BreakingKind::RequiredFieldRemoved => "required field removed",
            BreakingKind::EnumValueRemoved => "enum value removed",
            BreakingKind::EnumValueReused => "enum value number reused",
            BreakingKind::InterfaceTypeRemoved => "interface implementation removed",
            BreakingKind::InterfaceTypeIdReused => "interface TypeID changed",
        };
        f.write_str(name)
    }
}

/// One breaking change.
#[derive(Debug, Clone, PartialEq)]
pub struct Breaking {
    pub kind: BreakingKind,
    /// Dotted location, e.g. `User.id`.
    pub location: String,
    pub detail: String,
}

impl fmt::Display for Breaking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.location, self.kind, self.detail)
    }
}

/// One non-breaking but noteworthy change.
#[derive(Debug, Clone, PartialEq)]
pub struct CompatWarning {
    pub location: String,
    pub message: String,
}

impl fmt::Display for CompatWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// The outcome of a compatibility check.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompatibilityReport {
    pub breaking: Vec<Breaking>,
    pub warnings: Vec<CompatWarning>,
}

impl CompatibilityReport {
    /// True iff nothing breaking was found.
    pub fn is_compatible(&self) -> bool {
        self.breaking.is_empty()
    }
}

/// Diff `old` against `new`.
pub fn check_compatibility(old: &Schema, new: &Schema) -> CompatibilityReport {
    let mut report = CompatibilityReport::default();
    check_messages(old, new, &mut report);
    check_enums(old, new, &mut report);
    check_interfaces(old, new, &mut report);
    report
}

fn check_messages(old: &Schema, new: &Schema, report: &mut CompatibilityReport) {
    for old_message in &old.messages {
        let Some(new_message) = new.find_message(&old_message.name) else {
            report.breaking.push(Breaking {
                kind: BreakingKind::MessageRemoved,
                location: old_message.name.clone(),
                detail: format!("message '{}' no longer exists", old_message.name),
            });
            continue;
        };
        check_fields(old_message, new_message, report);
    }
}

fn check_fields(old: &Message, new: &Message, report: &mut CompatibilityReport) {
    for old_field in &old.fields {
        let location = format!("{}.{}", old.name, old_field.name);
        let Some(new_field) = new.fields.iter().find(|f| f.number == old_field.number) else {
            if old_field.modifiers.required {
                report.breaking.push(Breaking {
                    kind: BreakingKind::RequiredFieldRemoved,
                    location,
                    detail: format!(
                        "required field {} ('{}') was removed",
                        old_field.number, old_field.name
                    ),
                });
            } else {
                report.warnings.push(CompatWarning {
                    location,
                    message: format!(
                        "field {} ('{}') was removed",
                        old_field.number, old_field.name
                    ),
                });
            }
            continue;
        };

        if !are_types_compatible(&old_field.ty, &new_field.ty) {
            report.breaking.push(Breaking {
                kind: BreakingKind::FieldTypeChanged,
                location,
                detail: format!(
                    "field {} changed from '{}' to '{}'",
                    old_field.number, old_field.ty, new_field.ty
                ),
            });
        }
    }

    for new_field in &new.fields {
        let exists_in_old = old.fields.iter().any(|f| f.number == new_field.number);
        if new_field.modifiers.required && !exists_in_old {
            report.breaking.push(Breaking {
                kind: BreakingKind::RequiredFieldAdded,
                location: format!("{}.{}", new.name, new_field.name),
                detail: format!(
                    "new required field {} ('{}') rejects old data",
                    new_field.number, new_field.name
                ),
            });
        }
        if !exists_in_old && crate::validate::RESERVED_FIELD_RANGE.contains(&new_field.number) {
            report.warnings.push(CompatWarning {
                location: format!("{}.{}", new.name, new_field.name),
                message: format!(
                    "new field {} uses a reserved field number",
                    new_field.number
                ),
            });
        }
    }
}

fn check_enums(old: &Schema, new: &Schema, report: &mut CompatibilityReport) {
    for old_enum in &old.enums {
        let Some(new_enum) = new.find_enum(&old_enum.name) else {
            report.breaking.push(Breaking {
                kind: BreakingKind::EnumRemoved,
                location: old_enum.name.clone(),
                detail: format!("enum '{}' no longer exists", old_enum.name),
            });
            continue;
        };
        for old_value in &old_enum.values {
            let location = format!("{}.{}", old_enum.name, old_value.name);
            match new_enum.values.iter().find(|v| v.number == old_value.number) {
                None => report.breaking.push(Breaking {
                    kind: BreakingKind::EnumValueRemoved,
                    location,
                    detail: format!(
                        "value {} ('{}') was removed",
                        old_value.number, old_value.name
                    ),
                }),
                Some(new_value) if new_value.name != old_value.name => {
                    report.breaking.push(Breaking {
                        kind: BreakingKind::EnumValueReused,
                        location,
                        detail: format!(
                            "value {} renamed from '{}' to '{}'",
                            old_value.number, old_value.name, new_value.name
                        ),
                    });
                }
                Some(_) => {}
            }
        }
    }
}

fn check_interfaces(old: &Schema, new: &Schema, report: &mut CompatibilityReport) {
    for old_interface in &old.interfaces {
        let Some(new_interface) = new.find_interface(&old_interface.name) else {
            // The interface vanished wholesale: every slot that used it is
            // already broken at the type level, so this alone is a warning.
            report.warnings.push(CompatWarning {
                location: old_interface.name.clone(),
                message: format!("interface '{}' was removed", old_interface.name),
            });
            continue;
        };
        for old_impl in &old_interface.implementations {
            let location = format!("{}.{}", old_interface.name, old_impl.type_name);
            match new_interface
                .implementations
                .iter()
                .find(|i| i.type_name == old_impl.type_name)
            {
                None => report.breaking.push(Breaking {
                    kind: BreakingKind::InterfaceTypeRemoved,
                    location,
                    detail: format!(
                        "implementation '{}' (TypeID {}) was removed",
                        old_impl.type_name, old_impl.type_id
                    ),
                }),
                Some(new_impl) if new_impl.type_id != old_impl.type_id => {
                    report.breaking.push(Breaking {
                        kind: BreakingKind::InterfaceTypeIdReused,
                        location,
                        detail: format!(
                            "TypeID changed from {} to {}",
                            old_impl.type_id, new_impl.type_id
                        ),
                    });
                }
                Some(_) => {}
            }
        }
    }
}

/// Signed-integer widening rank; `None` for non-integers.
fn integer_rank(scalar: ScalarType) -> Option<(bool, u8)> {
    Some(match scalar {
        ScalarType::Int8 => (true, 1),
        ScalarType::Int16 => (true, 2),
        ScalarType::Int32 => (true, 3),
        ScalarType::Int64 => (true, 4),
        ScalarType::Uint8 => (false, 1),
        ScalarType::Uint16 => (false, 2),
        ScalarType::Uint32 => (false, 3),
        ScalarType::Uint64 => (false, 4),
        _ => return None,
    })
}

/// Whether data written as `old` still reads correctly as `new`.
pub fn are_types_compatible(old: &TypeRef, new: &TypeRef) -> bool {
    // Identical spellings are always compatible.
    if old.to_string() == new.to_string() {
        return true;
    }

    // A difference only in optionality is compatible.
    let old_base = old.without_pointers();
    let new_base = new.without_pointers();
    if old_base.to_string() == new_base.to_string() {
        return true;
    }

    // Integer widening within the same signedness.
    if let (TypeRef::Scalar(old_scalar), TypeRef::Scalar(new_scalar)) = (old_base, new_base) {
        if let (Some((old_signed, old_rank)), Some((new_signed, new_rank))) =
            (integer_rank(*old_scalar), integer_rank(*new_scalar))
        {
            return old_signed == new_signed && old_rank <= new_rank;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use crate::parser::parse;

    use super::*;

    fn schema(source: &str) -> Schema {
        parse(source).into_schema().unwrap()
    }

    fn report(old: &str, new: &str) -> CompatibilityReport {
        check_compatibility(&schema(old), &schema(new))
    }

    #[test]
    fn test_identical_schemas_compatible() {
        let source = "message User { id: int32 = 1 [required]; name: string = 2; }";
        let result = report(source, source);
        assert!(result.is_compatible());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_field_type_changed() {
        let result = report(
            "message User { id: int32 = 1 [required]; }",
            "message User { id: string = 1 [required]; }",
        );
        assert_eq!(result.breaking.len(), 1);
        assert_eq!(result.breaking[0].kind, BreakingKind::FieldTypeChanged);
        assert_eq!(result.breaking[0].location, "User.id");
    }

    #[test]
    fn test_integer_widening_compatible() {
        let result = report(
            "message User { id: int32 = 1 [required]; }",
            "message User { id: int64 = 1 [required]; }",
        );
        assert!(result.is_compatible(), "{:?}", result.breaking);
    }

    #[test]
    fn test_integer_narrowing_breaks() {
        let result = report(
            "message User { id: int64 = 1; }",
            "message User { id: int32 = 1; }",
        );
        assert_eq!(result.breaking[0].kind, BreakingKind::FieldTypeChanged);
    }

    #[test]
    fn test_cross_signedness_breaks() {
        let result = report(
            "message User { id: int32 = 1; }",
            "message User { id: uint64 = 1; }",
        );
        assert_eq!(result.breaking[0].kind, BreakingKind::FieldTypeChanged);
    }

    #[test]
    fn test_optionality_only_compatible() {
        let result = report(
            "message User { addr: Address = 1; }\nmessage Address { c: string = 1; }",
            "message User { addr: *Address = 1; }\nmessage Address { c: string = 1; }",
        );
        assert!(result.is_compatible(), "{:?}", result.breaking);
    }

    #[test]
    fn test_message_removed() {
        let result = report("message A { x: int32 = 1; }", "message B { x: int32 = 1; }");
        assert_eq!(result.breaking[0].kind, BreakingKind::MessageRemoved);
    }

    #[test]
    fn test_required_field_lifecycle() {
        let added = report(
            "message M { a: int32 = 1; }",
            "message M { a: int32 = 1; b: int32 = 2 [required]; }",
        );
        assert_eq!(added.breaking[0].kind, BreakingKind::RequiredFieldAdded);

        let removed = report(
            "message M { a: int32 = 1 [required]; }",
            "message M { }",
        );
        assert_eq!(removed.breaking[0].kind, BreakingKind::RequiredFieldRemoved);
    }

    #[test]
    fn test_plain_field_removal_warns() {
        let result = report("message M { a: int32 = 1; }", "message M { }");
        assert!(result.is_compatible());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_enum_changes() {
        let removed = report("enum E { A = 0; B = 1; }", "enum E { A = 0; }");
        assert_eq!(removed.breaking[0].kind, BreakingKind::EnumValueRemoved);

        let reused = report("enum E { A = 0; B = 1; }", "enum E { A = 0; C = 1; }");
        assert_eq!(reused.breaking[0].kind, BreakingKind::EnumValueReused);

        let gone = report("enum E { A = 0; }", "message M { x: int32 = 1; }");
        assert_eq!(gone.breaking[0].kind, BreakingKind::EnumRemoved);
    }

    #[test]
    fn test_interface_changes() {
        let base = "message U { x: int32 = 1; }\nmessage A { y: int32 = 1; }\n";
        let removed = report(
            &format!("{base}interface P {{ U = 128; A = 129; }}"),
            &format!("{base}interface P {{ U = 128; }}"),
        );
        assert_eq!(removed.breaking[0].kind, BreakingKind::InterfaceTypeRemoved);

        let reused = report(
            &format!("{base}interface P {{ U = 128; }}"),
            &format!("{base}interface P {{ U = 200; }}"),
        );
        assert_eq!(reused.breaking[0].kind, BreakingKind::InterfaceTypeIdReused);

        let whole = report(&format!("{base}interface P {{ U = 128; }}"), base);
        assert!(whole.is_compatible());
        assert_eq!(whole.warnings.len(), 1);
    }
}
