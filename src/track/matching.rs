use crate::common::schema::{
    same_columns, ConstraintInfo, ConstraintSpec, ConstraintType, IndexInfo, IndexSpec,
};

/// Named indexes match by name; unnamed ones by exact ordered columns and uniqueness.
pub fn index_matches(expected: &IndexSpec, actual: &IndexInfo) -> bool {
    match &expected.name {
        Some(name) => name.eq_ignore_ascii_case(&actual.name),
        None => expected.unique == actual.unique && same_columns(&expected.columns, &actual.columns),
    }
}

/// Named constraints match by name; unnamed ones by type, exact ordered
/// columns and, for foreign keys, the referenced table and columns.
pub fn constraint_matches(expected: &ConstraintSpec, actual: &ConstraintInfo) -> bool {
    if let Some(name) = &expected.name {
        return name.eq_ignore_ascii_case(&actual.name);
    }

    if expected.constraint_type.kind() != actual.kind
        || !same_columns(&expected.columns, &actual.columns)
    {
        return false;
    }

    match &expected.constraint_type {
        ConstraintType::ForeignKey { references } => actual
            .references
            .as_ref()
            .map_or(false, |target| references.matches(target)),
        _ => true,
    }
}

pub fn find_index<'a>(expected: &IndexSpec, actual: &'a [IndexInfo]) -> Option<&'a IndexInfo> {
    actual.iter().find(|index| index_matches(expected, index))
}

pub fn find_constraint<'a>(
    expected: &ConstraintSpec,
    actual: &'a [ConstraintInfo],
) -> Option<&'a ConstraintInfo> {
    actual
        .iter()
        .find(|constraint| constraint_matches(expected, constraint))
}
