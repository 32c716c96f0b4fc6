//! The name phase of the two-phase filter evaluation (spec §4.3): narrows
//! the full name index down to a candidate superset *before* any upstream
//! fetch happens, so the (expensive) attribute phase only ever touches
//! entities that can possibly survive.

use xreg_core::filter::{self, Op, OrBranch};
use xreg_upstream::NameIndex;

/// Result of the name phase: either the sorted candidate name list, or a
/// notice explaining why an empty collection was returned without ever
/// touching the index or upstream (mandatory name constraint missing).
pub enum NamePhase {
    Candidates(Vec<String>),
    MissingNameConstraint(String),
}

const MISSING_NAME_NOTICE: &str =
    "no filter constrained the 'name' attribute; returning an empty collection to avoid an unbounded index scan";

/// Parse every `filter=` value's OR-branch and resolve name-phase
/// candidates. Returns `MissingNameConstraint` when `required` is set and
/// no branch constrains `name` at all (spec §4.3 mandatory name
/// constraint); unparseable filters are left to the attribute-phase
/// `apply_collection` call to report as `bad-request`, so this function
/// treats a parse failure as "no narrowing" rather than erroring twice.
pub fn resolve(filters: &[String], index: &NameIndex, required: bool) -> NamePhase {
    let branches: Vec<OrBranch> = filters
        .iter()
        .filter_map(|v| filter::parse_filter_value(v).ok())
        .collect();

    if filters.iter().any(|v| filter::parse_filter_value(v).is_err()) {
        // Let apply_collection surface the bad-request; give it the full
        // index so the eventual error path sees a non-empty candidate set
        // to run filtering against (it will fail before slicing anyway).
        return NamePhase::Candidates(index.all());
    }

    if required && (branches.is_empty() || !branches.iter().any(filter::branch_constrains_name)) {
        return NamePhase::MissingNameConstraint(MISSING_NAME_NOTICE.to_string());
    }

    if branches.is_empty() {
        return NamePhase::Candidates(index.all());
    }

    let mut candidates: Vec<String> = Vec::new();
    for branch in &branches {
        let branch_candidates = resolve_branch(branch, index);
        for name in branch_candidates {
            if !candidates.contains(&name) {
                candidates.push(name);
            }
        }
    }
    candidates.sort();
    NamePhase::Candidates(candidates)
}

fn resolve_branch(branch: &OrBranch, index: &NameIndex) -> Vec<String> {
    let name_exprs: Vec<_> = branch.iter().filter(|e| e.attribute == "name").collect();
    if name_exprs.is_empty() {
        // This branch doesn't constrain name at all; some other branch in
        // the OR satisfied the mandatory-constraint check, so fall back to
        // scanning the full (bounded) index for this branch.
        return index.all();
    }

    let mut result: Option<Vec<String>> = None;
    for expr in name_exprs {
        let set = match expr.op {
            Op::Eq if expr.literal.contains('*') => {
                let re = filter::compile_wildcard(&expr.literal);
                index.wildcard(&re)
            }
            Op::Eq => index
                .all()
                .into_iter()
                .filter(|n| n.eq_ignore_ascii_case(&expr.literal))
                .collect(),
            // Ordered and negated operators don't bound a name index scan
            // usefully; fall back to the full (still bounded) index.
            _ => index.all(),
        };
        result = Some(match result {
            None => set,
            Some(prev) => prev.into_iter().filter(|n| set.contains(n)).collect(),
        });
    }
    result.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> NameIndex {
        NameIndex::new(vec![
            "express".into(),
            "expressive".into(),
            "fastify".into(),
            "react".into(),
        ])
    }

    #[test]
    fn missing_name_constraint_when_required() {
        let idx = index();
        let result = resolve(&["description=foo".to_string()], &idx, true);
        assert!(matches!(result, NamePhase::MissingNameConstraint(_)));
    }

    #[test]
    fn wildcard_and_exact_union_across_branches() {
        let idx = index();
        let result = resolve(
            &["name=express*".to_string(), "name=fastify".to_string()],
            &idx,
            true,
        );
        let NamePhase::Candidates(mut names) = result else {
            panic!("expected candidates")
        };
        names.sort();
        assert_eq!(names, vec!["express", "expressive", "fastify"]);
    }

    #[test]
    fn not_required_with_no_filters_scans_full_index() {
        let idx = index();
        let result = resolve(&[], &idx, false);
        let NamePhase::Candidates(names) = result else {
            panic!("expected candidates")
        };
        assert_eq!(names.len(), 4);
    }
}
