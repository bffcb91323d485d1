//! Evaluation of compiled [`JsonPath`] expressions.
//!
//! Evaluation never fails: anything that does not resolve simply produces no
//! match. Results borrow from the document and come back in document order.

use std::cmp::Ordering;

use serde_json::Value;

use crate::parser::path::{CompareOp, FilterExpr, JsonPath, Operand, Segment, Selector};

impl JsonPath {
    pub fn find<'a>(&self, document: &'a Value) -> Vec<&'a Value> {
        select(self.segments(), document, document)
    }

    pub fn find_first<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        self.find(document).into_iter().next()
    }
}

fn select<'a>(segments: &[Segment], root: &'a Value, start: &'a Value) -> Vec<&'a Value> {
    let mut current = vec![start];
    for segment in segments {
        let mut next = Vec::new();
        for node in current {
            if segment.descendant {
                let mut visited = Vec::new();
                collect_descendants(node, &mut visited);
                for inner in visited {
                    apply_selectors(&segment.selectors, root, inner, &mut next);
                }
            } else {
                apply_selectors(&segment.selectors, root, node, &mut next);
            }
        }
        if next.is_empty() {
            return next;
        }
        current = next;
    }
    current
}

/// Pre-order: the node itself, then each child subtree.
fn collect_descendants<'a>(node: &'a Value, out: &mut Vec<&'a Value>) {
    out.push(node);
    match node {
        Value::Array(items) => items.iter().for_each(|item| collect_descendants(item, out)),
        Value::Object(fields) => fields
            .values()
            .for_each(|field| collect_descendants(field, out)),
        _ => {}
    }
}

fn children(node: &Value) -> Vec<&Value> {
    match node {
        Value::Array(items) => items.iter().collect(),
        Value::Object(fields) => fields.values().collect(),
        _ => Vec::new(),
    }
}

fn apply_selectors<'a>(
    selectors: &[Selector],
    root: &'a Value,
    node: &'a Value,
    out: &mut Vec<&'a Value>,
) {
    for selector in selectors {
        match selector {
            Selector::Name(name) => {
                if let Some(found) = node.as_object().and_then(|fields| fields.get(name)) {
                    out.push(found);
                }
            }
            Selector::Wildcard => out.extend(children(node)),
            Selector::Index(index) => {
                if let Some(items) = node.as_array() {
                    if let Some(position) = normalize_index(*index, items.len()) {
                        out.push(&items[position]);
                    }
                }
            }
            Selector::Slice { start, end, step } => {
                if let Some(items) = node.as_array() {
                    for position in slice_positions(items.len(), *start, *end, *step) {
                        out.push(&items[position]);
                    }
                }
            }
            Selector::Filter(expr) => {
                out.extend(
                    children(node)
                        .into_iter()
                        .filter(|candidate| filter_matches(expr, root, candidate)),
                );
            }
        }
    }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let position = if index < 0 { len + index } else { index };
    (0..len).contains(&position).then_some(position as usize)
}

fn slice_positions(len: usize, start: Option<i64>, end: Option<i64>, step: Option<i64>) -> Vec<usize> {
    let len = len as i64;
    let step = step.unwrap_or(1);
    if step == 0 || len == 0 {
        return Vec::new();
    }

    let clamp = |bound: i64, low: i64, high: i64| {
        let bound = if bound < 0 { bound + len } else { bound };
        bound.clamp(low, high)
    };

    let mut positions = Vec::new();
    if step > 0 {
        let lower = start.map_or(0, |value| clamp(value, 0, len));
        let upper = end.map_or(len, |value| clamp(value, 0, len));
        let mut position = lower;
        while position < upper {
            positions.push(position as usize);
            match position.checked_add(step) {
                Some(next) => position = next,
                None => break,
            }
        }
    } else {
        let upper = start.map_or(len - 1, |value| clamp(value, -1, len - 1));
        let lower = end.map_or(-1, |value| clamp(value, -1, len - 1));
        let mut position = upper;
        while position > lower {
            positions.push(position as usize);
            match position.checked_add(step) {
                Some(next) => position = next,
                None => break,
            }
        }
    }
    positions
}

fn filter_matches(expr: &FilterExpr, root: &Value, current: &Value) -> bool {
    match expr {
        FilterExpr::Or(left, right) => {
            filter_matches(left, root, current) || filter_matches(right, root, current)
        }
        FilterExpr::And(left, right) => {
            filter_matches(left, root, current) && filter_matches(right, root, current)
        }
        FilterExpr::Not(inner) => !filter_matches(inner, root, current),
        FilterExpr::Exists(operand) => match operand {
            Operand::Literal(literal) => is_truthy(literal),
            _ => resolve(operand, root, current).is_some(),
        },
        FilterExpr::Compare { left, op, right } => compare(
            resolve(left, root, current),
            *op,
            resolve(right, root, current),
        ),
    }
}

fn resolve<'a>(operand: &'a Operand, root: &'a Value, current: &'a Value) -> Option<&'a Value> {
    match operand {
        Operand::Literal(literal) => Some(literal),
        Operand::Current(segments) => select(segments, root, current).into_iter().next(),
        Operand::Root(segments) => select(segments, root, root).into_iter().next(),
    }
}

fn compare(left: Option<&Value>, op: CompareOp, right: Option<&Value>) -> bool {
    match op {
        CompareOp::Eq => values_equal(left, right),
        CompareOp::Ne => !values_equal(left, right),
        CompareOp::Lt => ordering(left, right) == Some(Ordering::Less),
        CompareOp::Gt => ordering(left, right) == Some(Ordering::Greater),
        CompareOp::Le => {
            matches!(ordering(left, right), Some(Ordering::Less | Ordering::Equal))
        }
        CompareOp::Ge => {
            matches!(ordering(left, right), Some(Ordering::Greater | Ordering::Equal))
        }
    }
}

fn values_equal(left: Option<&Value>, right: Option<&Value>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(Value::Number(a)), Some(Value::Number(b))) => a.as_f64() == b.as_f64(),
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Only numbers and strings are ordered; everything else compares as false.
fn ordering(left: Option<&Value>, right: Option<&Value>) -> Option<Ordering> {
    match (left?, right?) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map_or(false, |n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn negative_step_slices_walk_backwards() {
        assert_eq!(slice_positions(5, None, None, Some(-1)), vec![4, 3, 2, 1, 0]);
        assert_eq!(slice_positions(5, Some(3), Some(0), Some(-2)), vec![3, 1]);
        assert_eq!(slice_positions(5, Some(-2), None, None), vec![3, 4]);
        assert!(slice_positions(5, None, None, Some(0)).is_empty());
    }

    #[test]
    fn extreme_steps_stop_instead_of_overflowing() {
        assert_eq!(slice_positions(3, Some(1), None, Some(i64::MAX)), vec![1]);
        assert_eq!(slice_positions(3, None, None, Some(i64::MIN)), vec![2]);
    }

    #[test]
    fn missing_operands_only_compare_equal_to_each_other() {
        assert!(compare(None, CompareOp::Eq, None));
        assert!(!compare(Some(&json!(1)), CompareOp::Eq, None));
        assert!(compare(Some(&json!(1)), CompareOp::Ne, None));
        assert!(!compare(Some(&json!("a")), CompareOp::Lt, Some(&json!(1))));
        assert!(compare(Some(&json!(1)), CompareOp::Eq, Some(&json!(1.0))));
    }
}
