//! Filter grammar parsing and predicate evaluation (spec §4.3).
//!
//! Grammar: a `filter` query parameter is one or more `attribute OP literal`
//! expressions joined by `&` (AND within one value); multiple `filter`
//! parameters combine with OR. This module hand-rolls the tokenizer since
//! the grammar is small and a parser-combinator dependency would be
//! disproportionate.

use regex::Regex;
use thiserror::Error;

use crate::attr::{AttrValue, Filterable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub attribute: String,
    pub op: Op,
    pub literal: String,
}

/// One AND-list parsed from a single `filter=` value.
pub type OrBranch = Vec<Expr>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unparseable filter expression at offset {offset}")]
pub struct FilterParseError {
    pub offset: usize,
}

/// Operators recognized, ordered longest-first so `>=` is matched before `>`.
const OPERATORS: &[(&str, Op)] = &[
    (">=", Op::Ge),
    ("<=", Op::Le),
    ("!=", Op::NotEq),
    ("<>", Op::NotEq),
    ("=", Op::Eq),
    ("<", Op::Lt),
    (">", Op::Gt),
];

/// Parse one `filter=` query value into its AND-list of expressions.
pub fn parse_filter_value(value: &str) -> Result<OrBranch, FilterParseError> {
    let mut branch = Vec::new();
    let mut offset = 0usize;
    for clause in value.split('&') {
        let trimmed = clause.trim();
        if trimmed.is_empty() {
            return Err(FilterParseError { offset });
        }
        branch.push(parse_expr(trimmed, offset)?);
        offset += clause.len() + 1;
    }
    Ok(branch)
}

fn parse_expr(clause: &str, base_offset: usize) -> Result<Expr, FilterParseError> {
    let mut best: Option<(usize, Op, usize)> = None; // (pos, op, op_len)
    for (token, op) in OPERATORS {
        if let Some(pos) = clause.find(token) {
            // Prefer the earliest match; among ties, longer operators already
            // precede shorter ones in OPERATORS so the first hit at a given
            // position is correct.
            match best {
                Some((best_pos, _, _)) if pos >= best_pos => {}
                _ => best = Some((pos, *op, token.len())),
            }
        }
    }
    let (pos, op, op_len) = best.ok_or(FilterParseError { offset: base_offset })?;
    if pos == 0 {
        return Err(FilterParseError { offset: base_offset });
    }
    let attribute = clause[..pos].trim().to_string();
    let literal = clause[pos + op_len..].trim().to_string();
    if attribute.is_empty() {
        return Err(FilterParseError { offset: base_offset });
    }
    Ok(Expr {
        attribute,
        op,
        literal,
    })
}

/// Whether any expression in this branch constrains the `name` attribute,
/// used to enforce the mandatory name constraint of spec §4.3 on
/// name-indexed adapters.
pub fn branch_constrains_name(branch: &OrBranch) -> bool {
    branch.iter().any(|e| e.attribute == "name")
}

/// Compile a wildcard literal (`*` = any sequence) into a case-insensitive
/// regex, escaping every other metacharacter.
pub fn compile_wildcard(literal: &str) -> Regex {
    let mut out = String::from("(?is)^");
    let parts: Vec<&str> = literal.split('*').collect();
    for (i, part) in parts.iter().enumerate() {
        out.push_str(&regex::escape(part));
        if i != parts.len() - 1 {
            out.push_str(".*");
        }
    }
    out.push('$');
    Regex::new(&out).unwrap_or_else(|_| Regex::new("(?!)").unwrap())
}

fn eval_ordered(op: Op, attr: &AttrValue, literal: &str) -> bool {
    let numeric = attr.as_number().zip(literal.trim().parse::<f64>().ok());
    let ordering = if let Some((a, b)) = numeric {
        a.partial_cmp(&b)
    } else {
        attr.as_display_string()
            .to_lowercase()
            .partial_cmp(&literal.to_lowercase())
    };
    match (op, ordering) {
        (Op::Lt, Some(std::cmp::Ordering::Less)) => true,
        (Op::Le, Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)) => true,
        (Op::Gt, Some(std::cmp::Ordering::Greater)) => true,
        (Op::Ge, Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)) => true,
        _ => false,
    }
}

fn eval_equality(op: Op, attr: Option<AttrValue>, literal: &str) -> bool {
    if literal == "null" {
        let is_null = attr.as_ref().map(AttrValue::is_null).unwrap_or(true);
        return match op {
            Op::Eq => is_null,
            Op::NotEq => !is_null,
            _ => unreachable!(),
        };
    }
    let Some(attr) = attr else {
        return op == Op::NotEq;
    };
    let matched = if literal.contains('*') {
        compile_wildcard(literal).is_match(&attr.as_display_string())
    } else {
        attr.as_display_string().to_lowercase() == literal.to_lowercase()
    };
    match op {
        Op::Eq => matched,
        Op::NotEq => !matched,
        _ => unreachable!(),
    }
}

/// Evaluate one expression against an item.
pub fn eval_expr<T: Filterable>(expr: &Expr, item: &T) -> bool {
    let attr = item.attr(&expr.attribute);
    if matches!(expr.op, Op::Eq | Op::NotEq) {
        eval_equality(expr.op, attr, &expr.literal)
    } else {
        match attr {
            Some(a) => eval_ordered(expr.op, &a, &expr.literal),
            None => false,
        }
    }
}

/// Evaluate an AND-list against an item.
pub fn eval_branch<T: Filterable>(branch: &OrBranch, item: &T) -> bool {
    branch.iter().all(|e| eval_expr(e, item))
}

/// Evaluate the OR of all branches against an item (the composition law of
/// spec §8 invariant 4).
pub fn eval_branches<T: Filterable>(branches: &[OrBranch], item: &T) -> bool {
    branches.is_empty() || branches.iter().any(|b| eval_branch(b, item))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_equality() {
        let branch = parse_filter_value("name=express").unwrap();
        assert_eq!(branch.len(), 1);
        assert_eq!(branch[0].attribute, "name");
        assert_eq!(branch[0].op, Op::Eq);
        assert_eq!(branch[0].literal, "express");
    }

    #[test]
    fn parses_and_list() {
        let branch = parse_filter_value("name=express&description!=null").unwrap();
        assert_eq!(branch.len(), 2);
        assert_eq!(branch[1].op, Op::NotEq);
        assert_eq!(branch[1].literal, "null");
    }

    #[test]
    fn rejects_missing_operator() {
        assert!(parse_filter_value("justaname").is_err());
    }

    #[test]
    fn rejects_empty_attribute() {
        assert!(parse_filter_value("=express").is_err());
    }

    #[test]
    fn s5_offset_zero_on_malformed_input() {
        let err = parse_filter_value("<<invalid>>").unwrap_err();
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn dotted_paths_supported() {
        let branch = parse_filter_value("labels.team=platform").unwrap();
        assert_eq!(branch[0].attribute, "labels.team");
    }

    #[test]
    fn wildcard_matches_prefix() {
        let re = compile_wildcard("express*");
        assert!(re.is_match("express"));
        assert!(re.is_match("expressive"));
        assert!(!re.is_match("fastify"));
    }

    #[test]
    fn ge_le_numeric_coercion() {
        assert!(eval_ordered(Op::Ge, &AttrValue::Str("10".into()), "9"));
        assert!(!eval_ordered(Op::Ge, &AttrValue::Str("2".into()), "10"));
    }

    #[test]
    fn ordered_falls_back_to_string_when_not_both_numeric() {
        assert!(eval_ordered(Op::Lt, &AttrValue::Str("apple".into()), "banana"));
    }

    struct Item(Vec<(&'static str, AttrValue)>);
    impl Filterable for Item {
        fn attr(&self, path: &str) -> Option<AttrValue> {
            self.0
                .iter()
                .find(|(k, _)| *k == path)
                .map(|(_, v)| v.clone())
        }
    }

    #[test]
    fn null_literal_tests_absence() {
        let item = Item(vec![("name", AttrValue::Str("x".into()))]);
        let branch = parse_filter_value("description=null").unwrap();
        assert!(eval_branch(&branch, &item));
        let branch = parse_filter_value("description!=null").unwrap();
        assert!(!eval_branch(&branch, &item));
    }

    #[test]
    fn branch_or_composition_law() {
        let a = parse_filter_value("name=express*").unwrap();
        let b = parse_filter_value("name=fastify").unwrap();
        let item_express = Item(vec![("name", AttrValue::Str("expressive".into()))]);
        let item_fastify = Item(vec![("name", AttrValue::Str("fastify".into()))]);
        let item_react = Item(vec![("name", AttrValue::Str("react".into()))]);
        let branches = vec![a, b];
        assert!(eval_branches(&branches, &item_express));
        assert!(eval_branches(&branches, &item_fastify));
        assert!(!eval_branches(&branches, &item_react));
    }

    #[test]
    fn name_constraint_detection() {
        let branch = parse_filter_value("description=foo").unwrap();
        assert!(!branch_constrains_name(&branch));
        let branch = parse_filter_value("name=foo").unwrap();
        assert!(branch_constrains_name(&branch));
    }
}
