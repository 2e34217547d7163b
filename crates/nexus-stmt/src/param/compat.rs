//! Declared-versus-actual type compatibility.
//!
//! Runs before every attempt to invoke the plan. An incompatible
//! slot means the cached plan was compiled for the wrong parameter type and
//! must be rebuilt with the actual type as a hint.

use super::ParamSlot;
use crate::types::{ActualKind, SqlType};

/// Verdict for one parameter slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    /// The cached plan can run with this value.
    Compatible,
    /// The plan must be recompiled declaring the slot as `hint`.
    Reprepare {
        /// Type to declare on recompilation.
        hint: SqlType,
    },
}

/// Checks one bound slot against its declared type.
#[must_use]
pub fn check(slot: &ParamSlot) -> Compatibility {
    let actual = slot.actual();
    if actual == ActualKind::Null || slot.is_pinned() {
        return Compatibility::Compatible;
    }
    let compatible = match slot.declared() {
        SqlType::Integer { unsigned } => actual == ActualKind::Integer { unsigned },
        SqlType::Bool => actual == ActualKind::Integer { unsigned: false },
        SqlType::Bit => actual == ActualKind::Integer { unsigned: true },
        SqlType::Year => matches!(actual, ActualKind::Integer { .. }),
        SqlType::Decimal => matches!(actual, ActualKind::Integer { .. } | ActualKind::Decimal),
        SqlType::Float => matches!(
            actual,
            ActualKind::Integer { .. } | ActualKind::Decimal | ActualKind::Float
        ),
        SqlType::Date => !matches!(actual, ActualKind::DateTime | ActualKind::Time),
        SqlType::Time => actual != ActualKind::Date,
        SqlType::DateTime => true,
        SqlType::String | SqlType::Blob => {
            if actual != ActualKind::String {
                false
            } else {
                return match slot.numeric() {
                    Some(parse) if parse.is_complete() && parse.out_of_range => {
                        Compatibility::Reprepare {
                            hint: SqlType::Decimal,
                        }
                    }
                    _ => Compatibility::Compatible,
                };
            }
        }
    };
    if compatible {
        return Compatibility::Compatible;
    }
    match actual.as_sql_type() {
        Some(hint) => Compatibility::Reprepare { hint },
        None => Compatibility::Compatible,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ParamDeclaration;
    use crate::param::{ParamInput, ParamSlots, SurplusPolicy};
    use nexus_wire::FieldType;

    fn bound(declared: SqlType, input: ParamInput) -> Compatibility {
        let mut slots = ParamSlots::from_declarations(&[ParamDeclaration::new(declared, 0)], &[]);
        slots.bind(&[input], SurplusPolicy::Reject).unwrap();
        check(&slots.slots()[0])
    }

    #[test]
    fn test_integer_sign() {
        assert_eq!(
            bound(SqlType::BIGINT, ParamInput::int(7)),
            Compatibility::Compatible
        );
        assert_eq!(
            bound(SqlType::BIGINT_UNSIGNED, ParamInput::int(-1)),
            Compatibility::Reprepare {
                hint: SqlType::BIGINT
            }
        );
        assert_eq!(bound(SqlType::Year, ParamInput::int(-1)), Compatibility::Compatible);
    }

    #[test]
    fn test_numeric_string_on_integer() {
        assert_eq!(
            bound(SqlType::BIGINT, ParamInput::text("7")),
            Compatibility::Compatible
        );
        assert_eq!(
            bound(SqlType::BIGINT, ParamInput::text("99999999999999999999")),
            Compatibility::Reprepare {
                hint: SqlType::Decimal
            }
        );
    }

    #[test]
    fn test_string_declared() {
        assert_eq!(
            bound(SqlType::String, ParamInput::text("abc")),
            Compatibility::Compatible
        );
        assert_eq!(
            bound(SqlType::String, ParamInput::int(7)),
            Compatibility::Reprepare {
                hint: SqlType::BIGINT
            }
        );
        assert_eq!(
            bound(SqlType::String, ParamInput::text("99999999999999999999")),
            Compatibility::Reprepare {
                hint: SqlType::Decimal
            }
        );
        // Overflowing but not wholly numeric stays a string.
        assert_eq!(
            bound(SqlType::String, ParamInput::text("99999999999999999999x")),
            Compatibility::Compatible
        );
    }

    #[test]
    fn test_temporal() {
        let date = ParamInput::new(FieldType::Date, false, vec![4, 0xE8, 0x07, 1, 2]);
        assert_eq!(bound(SqlType::Date, date.clone()), Compatibility::Compatible);
        assert_eq!(
            bound(SqlType::Time, date.clone()),
            Compatibility::Reprepare {
                hint: SqlType::Date
            }
        );
        assert_eq!(bound(SqlType::DateTime, date), Compatibility::Compatible);
        assert_eq!(
            bound(SqlType::Date, ParamInput::text("2024-01-02")),
            Compatibility::Compatible
        );
    }

    #[test]
    fn test_null_and_pinned() {
        assert_eq!(bound(SqlType::BIGINT, ParamInput::null()), Compatibility::Compatible);

        let mut slots = ParamSlots::from_declarations(
            &[ParamDeclaration::pinned(SqlType::BIGINT_UNSIGNED, 0)],
            &[],
        );
        slots.bind(&[ParamInput::int(-5)], SurplusPolicy::Reject).unwrap();
        assert_eq!(check(&slots.slots()[0]), Compatibility::Compatible);
    }
}
