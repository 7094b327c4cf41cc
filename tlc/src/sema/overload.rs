//! Overload resolution and the assignment-compatibility rules it's built
//! on, plus the edit-distance-1 name suggestion used for undefined names.

use tlc_parser::ast::DataType;

use super::symbol::Symbol;

/// Whether a value of type `from` may be used where `to` is expected, and
/// whether doing so is an implicit conversion worth a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    Exact,
    Implicit,
    Incompatible,
}

pub fn assignment_compatibility(from: &DataType, to: &DataType) -> Compatibility {
    if from == to {
        return Compatibility::Exact;
    }
    if *from == DataType::Null {
        return Compatibility::Exact;
    }
    match (from, to) {
        (a, b) if a.is_numeric() && b.is_numeric() => Compatibility::Implicit,
        (DataType::Int, DataType::Bool) | (DataType::Bool, DataType::Int) => Compatibility::Implicit,
        _ => Compatibility::Incompatible,
    }
}

/// The result of resolving a call's argument types against an overload set.
pub enum Resolution<'a> {
    Found(&'a Symbol),
    Ambiguous,
    NoMatch,
}

/// Exact match first, then lowest implicit-conversion count, with ties
/// reported as ambiguous. Candidates whose arity doesn't match, or that
/// require an incompatible conversion in any slot, are rejected outright.
pub fn resolve_overload<'a>(candidates: &'a [Symbol], arg_types: &[DataType]) -> Resolution<'a> {
    if let Some(exact) = candidates
        .iter()
        .find(|c| c.param_types.len() == arg_types.len() && c.param_types == arg_types)
    {
        return Resolution::Found(exact);
    }

    let mut scored: Vec<(usize, &Symbol)> = Vec::new();
    for candidate in candidates {
        if candidate.param_types.len() != arg_types.len() {
            continue;
        }
        let mut cost = 0usize;
        let mut disallowed = false;
        for (param_ty, arg_ty) in candidate.param_types.iter().zip(arg_types) {
            match assignment_compatibility(arg_ty, param_ty) {
                Compatibility::Exact => {}
                Compatibility::Implicit => cost += 1,
                Compatibility::Incompatible => {
                    disallowed = true;
                    break;
                }
            }
        }
        if !disallowed {
            scored.push((cost, candidate));
        }
    }

    scored.sort_by_key(|(cost, _)| *cost);
    match scored.as_slice() {
        [] => Resolution::NoMatch,
        [(_, only)] => Resolution::Found(only),
        [(best, first), (second, _), ..] if best < second => Resolution::Found(first),
        _ => Resolution::Ambiguous,
    }
}

/// A same-length, off-by-one, or single-swap match within edit distance 1,
/// used for "did you mean...?" suggestions on undefined-name errors.
pub fn suggest_name<'a>(target: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    candidates
        .into_iter()
        .find(|candidate| edit_distance_le_1(target, candidate))
}

fn edit_distance_le_1(a: &str, b: &str) -> bool {
    if a == b {
        return false;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.len() == b.len() {
        let diffs = a.iter().zip(&b).filter(|(x, y)| x != y).count();
        return diffs == 1;
    }
    let (shorter, longer) = if a.len() + 1 == b.len() {
        (&a, &b)
    } else if b.len() + 1 == a.len() {
        (&b, &a)
    } else {
        return false;
    };
    let mut i = 0;
    let mut j = 0;
    let mut skipped = false;
    while i < shorter.len() && j < longer.len() {
        if shorter[i] == longer[j] {
            i += 1;
            j += 1;
        } else if !skipped {
            skipped = true;
            j += 1;
        } else {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_assigns_to_anything() {
        assert_eq!(
            assignment_compatibility(&DataType::Null, &DataType::String),
            Compatibility::Exact
        );
    }

    #[test]
    fn numeric_widening_is_implicit() {
        assert_eq!(
            assignment_compatibility(&DataType::Int, &DataType::Double),
            Compatibility::Implicit
        );
    }

    #[test]
    fn string_to_int_is_incompatible() {
        assert_eq!(
            assignment_compatibility(&DataType::String, &DataType::Int),
            Compatibility::Incompatible
        );
    }

    #[test]
    fn suggests_single_character_typo() {
        assert_eq!(suggest_name("contnue", ["continue", "count"]), Some("continue"));
    }

    #[test]
    fn suggests_single_character_substitution() {
        assert_eq!(suggest_name("brerk", ["break", "bream"]), Some("break"));
    }

    #[test]
    fn does_not_suggest_unrelated_names() {
        assert_eq!(suggest_name("xyz", ["foo", "bar"]), None);
    }
}
