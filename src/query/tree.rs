//! Method-name parser.
//!
//! Turns a derived-query method name into a [`PartTree`]:
//!
//! ```text
//! findTop3DistinctByActionIgnoreCaseAndSymbolOrTraderIdOrderByIdDesc
//! ^^^^                                                               operation kind
//!     ^^^^^^^^^^^^                                                   subject (limit, distinct)
//!                   ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^   predicate
//!                                                      ^^^^^^^^^^^^^ static ordering
//! ```
//!
//! The parser does not know the entity. Property paths are resolved, and unsupported
//! operators rejected, when the tree is compiled into a plan.

use crate::error::{PartQueryError, Result};
use crate::metadata::PropertyPath;
use crate::query::part::{IgnoreCase, Operator, PropertyCondition};
use crate::query::sort::{Direction, Sort, SortOrder};
use regex::Regex;
use std::fmt;

const PREFIXES: &str = "find|read|get|query|search|stream|count|exists|delete|remove";
const ORDER_BY: &str = "OrderBy";
const ALL_IGNORE_CASE: [&str; 2] = ["AllIgnoreCase", "AllIgnoringCase"];
const IGNORE_CASE: [&str; 2] = ["IgnoreCase", "IgnoringCase"];

/// What the statement does with the matching rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Find,
    Count,
    Exists,
    Delete,
}

impl OperationKind {
    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "find" | "read" | "get" | "query" | "search" | "stream" => Some(OperationKind::Find),
            "count" => Some(OperationKind::Count),
            "exists" => Some(OperationKind::Exists),
            "delete" | "remove" => Some(OperationKind::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Find => "find",
            OperationKind::Count => "count",
            OperationKind::Exists => "exists",
            OperationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conditions combined with AND; their order fixes tag numbering
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AndGroup {
    pub conditions: Vec<PropertyCondition>,
}

/// Parsed method name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartTree {
    pub method_name: String,
    pub kind: OperationKind,
    pub distinct: bool,
    /// `TopN` / `FirstN`
    pub limit: Option<u64>,
    /// OR-combined groups; empty when the name has no predicate
    pub groups: Vec<AndGroup>,
    /// Ordering declared after `OrderBy`
    pub order_by: Sort,
}

impl PartTree {
    /// Parse a derived-query method name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMethodName` if the name has no known prefix or a clause,
    /// property or ordering segment is empty or malformed.
    pub fn parse(method_name: &str) -> Result<Self> {
        let invalid = |reason: String| PartQueryError::InvalidMethodName {
            name: method_name.to_string(),
            reason,
        };

        let with_by = Regex::new(&format!(r"^({PREFIXES})(\p{{Lu}}.*?)??By(.*)$"))
            .map_err(|e| invalid(format!("Invalid regex: {e}")))?;
        let without_by = Regex::new(&format!(r"^({PREFIXES})(\p{{Lu}}.*)?$"))
            .map_err(|e| invalid(format!("Invalid regex: {e}")))?;

        let (prefix, subject, predicate) = if let Some(caps) = with_by.captures(method_name) {
            (
                caps.get(1).map_or("", |m| m.as_str()),
                caps.get(2).map_or("", |m| m.as_str()),
                caps.get(3).map_or("", |m| m.as_str()),
            )
        } else if let Some(caps) = without_by.captures(method_name) {
            (
                caps.get(1).map_or("", |m| m.as_str()),
                caps.get(2).map_or("", |m| m.as_str()),
                "",
            )
        } else {
            return Err(invalid(format!(
                "expected one of the prefixes [{}]",
                PREFIXES.replace('|', ", ")
            )));
        };

        let kind = OperationKind::from_prefix(prefix)
            .ok_or_else(|| invalid(format!("unknown prefix '{prefix}'")))?;
        let distinct = subject.contains("Distinct");
        let limit = parse_limit(subject).map_err(invalid)?;

        let (predicate, order_clause) = match predicate.find(ORDER_BY) {
            Some(idx) => (&predicate[..idx], Some(&predicate[idx + ORDER_BY.len()..])),
            None => (predicate, None),
        };

        let (predicate, all_ignore_case) = match strip_any_suffix(predicate, &ALL_IGNORE_CASE) {
            Some(rest) => (rest, true),
            None => (predicate, false),
        };

        let groups = if predicate.is_empty() {
            Vec::new()
        } else {
            split_keyword(predicate, "Or")
                .into_iter()
                .map(|group| {
                    let conditions = split_keyword(group, "And")
                        .into_iter()
                        .map(|clause| parse_condition(clause, all_ignore_case))
                        .collect::<std::result::Result<Vec<_>, String>>()?;
                    Ok(AndGroup { conditions })
                })
                .collect::<std::result::Result<Vec<_>, String>>()
                .map_err(invalid)?
        };

        let order_by = match order_clause {
            Some(clause) => parse_order_by(clause).map_err(invalid)?,
            None => Sort::unsorted(),
        };

        Ok(Self {
            method_name: method_name.to_string(),
            kind,
            distinct,
            limit,
            groups,
            order_by,
        })
    }

    /// Leaves in tag order: groups left to right, conditions left to right.
    pub fn leaves(&self) -> impl Iterator<Item = &PropertyCondition> {
        self.groups.iter().flat_map(|g| g.conditions.iter())
    }

    pub fn leaf_count(&self) -> usize {
        self.groups.iter().map(|g| g.conditions.len()).sum()
    }

    pub fn has_predicate(&self) -> bool {
        !self.groups.is_empty()
    }
}

fn parse_limit(subject: &str) -> std::result::Result<Option<u64>, String> {
    for keyword in ["Top", "First"] {
        if let Some(idx) = subject.find(keyword) {
            let digits: String = subject[idx + keyword.len()..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            if digits.is_empty() {
                return Ok(Some(1));
            }
            let limit = digits
                .parse::<u64>()
                .map_err(|e| format!("invalid limit '{digits}': {e}"))?;
            if limit == 0 {
                return Err(format!("{keyword}{digits} must select at least one row"));
            }
            return Ok(Some(limit));
        }
    }
    Ok(None)
}

fn strip_any_suffix<'a>(s: &'a str, suffixes: &[&str]) -> Option<&'a str> {
    suffixes.iter().find_map(|suffix| s.strip_suffix(suffix))
}

/// Split on `keyword` wherever it is followed by an upper-case letter.
fn split_keyword<'a>(s: &'a str, keyword: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut idx = 0;
    while let Some(found) = s[idx..].find(keyword) {
        let at = idx + found;
        let after = at + keyword.len();
        let next_is_upper = s[after..].chars().next().is_some_and(char::is_uppercase);
        if at > start && next_is_upper {
            parts.push(&s[start..at]);
            start = after;
        }
        idx = after;
    }
    parts.push(&s[start..]);
    parts
}

fn parse_condition(clause: &str, all_ignore_case: bool) -> std::result::Result<PropertyCondition, String> {
    if clause.is_empty() {
        return Err("empty condition between And/Or keywords".to_string());
    }

    let (rest, ignore_case) = match strip_any_suffix(clause, &IGNORE_CASE) {
        Some(rest) if !rest.is_empty() => (rest, IgnoreCase::Always),
        _ if all_ignore_case => (clause, IgnoreCase::WhenPossible),
        _ => (clause, IgnoreCase::Never),
    };

    let (property, operator) = Operator::detect(rest);
    let path = parse_property_path(property)
        .map_err(|reason| format!("clause '{clause}': {reason}"))?;

    Ok(PropertyCondition {
        path,
        operator,
        ignore_case,
        source: clause.to_string(),
    })
}

/// `Address_City` -> `address.city`
fn parse_property_path(property: &str) -> std::result::Result<PropertyPath, String> {
    let segments = property
        .split('_')
        .map(|segment| {
            if segment.is_empty() {
                Err(format!("empty property segment in '{property}'"))
            } else {
                Ok(uncapitalize(segment))
            }
        })
        .collect::<std::result::Result<Vec<_>, String>>()?;
    Ok(PropertyPath::new(segments))
}

fn uncapitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn parse_order_by(clause: &str) -> std::result::Result<Sort, String> {
    if clause.is_empty() {
        return Err("OrderBy must name at least one property".to_string());
    }

    let mut orders = Vec::new();
    let mut rest = clause;
    while !rest.is_empty() {
        let (segment, direction, remaining) = next_order_segment(rest);
        let path = parse_property_path(segment)
            .map_err(|reason| format!("OrderBy clause '{clause}': {reason}"))?;
        orders.push(SortOrder::new(path.dotted(), direction));
        rest = remaining;
    }
    Ok(Sort::by_orders(orders))
}

/// Next `Property(Asc|Desc)?` segment and the unparsed remainder.
///
/// A direction keyword only ends a segment when followed by an upper-case letter or
/// the end of the clause, so properties such as `Description` stay intact.
fn next_order_segment(s: &str) -> (&str, Direction, &str) {
    let mut best: Option<(usize, &str, Direction)> = None;
    for (keyword, direction) in [("Asc", Direction::Asc), ("Desc", Direction::Desc)] {
        let mut idx = 0;
        while let Some(found) = s[idx..].find(keyword) {
            let at = idx + found;
            let after = at + keyword.len();
            let boundary = after == s.len() || s[after..].chars().next().is_some_and(char::is_uppercase);
            if at > 0 && boundary {
                if best.map_or(true, |(b, _, _)| at < b) {
                    best = Some((at, keyword, direction));
                }
                break;
            }
            idx = after;
        }
    }
    match best {
        Some((at, keyword, direction)) => (&s[..at], direction, &s[at + keyword.len()..]),
        None => (s, Direction::Asc, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(tree: &PartTree) -> Vec<Vec<String>> {
        tree.groups
            .iter()
            .map(|g| g.conditions.iter().map(|c| c.path.dotted()).collect())
            .collect()
    }

    #[test]
    fn test_simple_find() {
        let tree = PartTree::parse("findByActionAndSymbol").unwrap();
        assert_eq!(tree.kind, OperationKind::Find);
        assert!(!tree.distinct);
        assert_eq!(tree.limit, None);
        assert_eq!(paths(&tree), vec![vec!["action", "symbol"]]);
        assert!(!tree.order_by.is_sorted());
    }

    #[test]
    fn test_compound_name() {
        let tree = PartTree::parse(
            "findTop3DistinctByActionIgnoreCaseAndSymbolOrTraderIdAndPriceLessThanOrPriceGreater\
             ThanEqualAndIdIsNotNullAndTraderIdIsNullAndTraderIdLikeAndPriceTrueAndPriceFalse\
             AndPriceGreaterThanAndPriceLessThanEqualAndPriceInAndValueLessThanOrderByIdDesc",
        )
        .unwrap();

        assert!(tree.distinct);
        assert_eq!(tree.limit, Some(3));
        assert_eq!(tree.groups.len(), 3);
        assert_eq!(tree.leaf_count(), 14);

        let ops: Vec<Operator> = tree.leaves().map(|c| c.operator).collect();
        assert_eq!(
            ops,
            vec![
                Operator::SimpleProperty,
                Operator::SimpleProperty,
                Operator::SimpleProperty,
                Operator::LessThan,
                Operator::GreaterThanEqual,
                Operator::IsNotNull,
                Operator::IsNull,
                Operator::Like,
                Operator::True,
                Operator::False,
                Operator::GreaterThan,
                Operator::LessThanEqual,
                Operator::In,
                Operator::LessThan,
            ]
        );
        assert_eq!(tree.groups[0].conditions[0].ignore_case, IgnoreCase::Always);
        assert_eq!(tree.groups[0].conditions[1].ignore_case, IgnoreCase::Never);
        assert_eq!(tree.order_by.orders, vec![SortOrder::desc("id")]);
    }

    #[test]
    fn test_prefix_kinds() {
        assert_eq!(PartTree::parse("countByActionIn").unwrap().kind, OperationKind::Count);
        assert_eq!(PartTree::parse("existsByAction").unwrap().kind, OperationKind::Exists);
        assert_eq!(PartTree::parse("deleteBySymbol").unwrap().kind, OperationKind::Delete);
        assert_eq!(PartTree::parse("removeBySymbol").unwrap().kind, OperationKind::Delete);
        assert_eq!(PartTree::parse("readByAction").unwrap().kind, OperationKind::Find);
        assert_eq!(PartTree::parse("streamByAction").unwrap().kind, OperationKind::Find);
    }

    #[test]
    fn test_subject_words_are_ignored() {
        let tree = PartTree::parse(
            "findTop3DistinctIdActionPriceByActionAndSymbolOrTraderIdOrderByIdDesc",
        )
        .unwrap();
        assert_eq!(tree.limit, Some(3));
        assert!(tree.distinct);
        assert_eq!(paths(&tree), vec![vec!["action", "symbol"], vec!["traderId"]]);
    }

    #[test]
    fn test_first_without_number_is_one() {
        assert_eq!(PartTree::parse("findFirstByAction").unwrap().limit, Some(1));
        assert_eq!(PartTree::parse("findTopByAction").unwrap().limit, Some(1));
        assert_eq!(PartTree::parse("findFirst10ByAction").unwrap().limit, Some(10));
        assert!(PartTree::parse("findTop0ByAction").is_err());
    }

    #[test]
    fn test_no_predicate() {
        let tree = PartTree::parse("findAll").unwrap();
        assert!(!tree.has_predicate());
        assert_eq!(tree.leaf_count(), 0);

        let tree = PartTree::parse("deleteAll").unwrap();
        assert_eq!(tree.kind, OperationKind::Delete);
        assert!(!tree.has_predicate());

        let tree = PartTree::parse("findByOrderByPriceDesc").unwrap();
        assert!(!tree.has_predicate());
        assert_eq!(tree.order_by.orders, vec![SortOrder::desc("price")]);
    }

    #[test]
    fn test_unknown_prefix() {
        let err = PartTree::parse("fetchByAction").unwrap_err();
        assert!(matches!(err, PartQueryError::InvalidMethodName { .. }));
        assert!(err.is_plan_error());
    }

    #[test]
    fn test_empty_clause_is_rejected() {
        assert!(PartTree::parse("findBy_Price").is_err());
        assert!(PartTree::parse("findByAddress__City").is_err());
        assert!(PartTree::parse("findByOrderBy").is_err());
    }

    #[test]
    fn test_keywords_inside_property_names_do_not_split() {
        let tree = PartTree::parse("findByOrderCountAndBrandName").unwrap();
        assert_eq!(paths(&tree), vec![vec!["orderCount", "brandName"]]);

        let tree = PartTree::parse("findByStandardOrOrigin").unwrap();
        assert_eq!(paths(&tree), vec![vec!["standard"], vec!["origin"]]);
    }

    #[test]
    fn test_all_ignore_case() {
        let tree = PartTree::parse("findBySymbolAndActionAllIgnoreCase").unwrap();
        assert!(tree
            .leaves()
            .all(|c| c.ignore_case == IgnoreCase::WhenPossible));
    }

    #[test]
    fn test_nested_property_path() {
        let tree = PartTree::parse("findByAddress_CityAndPrice").unwrap();
        assert_eq!(paths(&tree), vec![vec!["address.city", "price"]]);
    }

    #[test]
    fn test_order_by_multiple_keys() {
        let tree = PartTree::parse("findByActionOrderByPriceAscTraderIdDescSymbol").unwrap();
        assert_eq!(
            tree.order_by.orders,
            vec![
                SortOrder::asc("price"),
                SortOrder::desc("traderId"),
                SortOrder::asc("symbol"),
            ]
        );

        let tree = PartTree::parse("findByActionOrderByDescriptionDesc").unwrap();
        assert_eq!(tree.order_by.orders, vec![SortOrder::desc("description")]);
    }

    #[test]
    fn test_unsupported_operator_parses() {
        let tree = PartTree::parse("countByTraderIdBetween").unwrap();
        let leaf = tree.leaves().next().unwrap();
        assert_eq!(leaf.operator, Operator::Between);
        assert_eq!(leaf.parameter_count(), 2);
    }
}
