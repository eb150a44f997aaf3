//! Arithmetic and comparison on script values.

use std::cmp::Ordering;

use crate::ast::{BinaryOperator, CompareOperator};

use super::value::{Value, range_contains};
use super::RuntimeError;

type Result<T> = std::result::Result<T, RuntimeError>;

/// Largest sequence, in elements (bytes for strings), that repetition builds.
const MAX_REPEAT_LEN: usize = 1 << 26;

#[derive(Debug, Clone, Copy)]
enum Numeric {
    Int(i64),
    Float(f64),
}

fn numeric(value: &Value) -> Option<Numeric> {
    match value {
        Value::Integer(value) => Some(Numeric::Int(*value)),
        Value::Boolean(value) => Some(Numeric::Int(i64::from(*value))),
        Value::Float(value) => Some(Numeric::Float(*value)),
        _ => None,
    }
}

fn unsupported(op: BinaryOperator, left: &Value, right: &Value) -> RuntimeError {
    RuntimeError::UnsupportedOperand {
        operation: op.symbol(),
        left: left.type_name(),
        right: right.type_name(),
    }
}

pub(super) fn binary(op: BinaryOperator, left: &Value, right: &Value) -> Result<Value> {
    if let (Some(l), Some(r)) = (numeric(left), numeric(right)) {
        return match (l, r) {
            (Numeric::Int(l), Numeric::Int(r)) => int_binary(op, l, r),
            (l, r) => float_binary(op, as_f64(l), as_f64(r)),
        };
    }

    match (op, left, right) {
        (BinaryOperator::Add, Value::String(l), Value::String(r)) => {
            Ok(Value::String(format!("{l}{r}")))
        }
        (BinaryOperator::Add, Value::List(l), Value::List(r)) => {
            let mut items = l.borrow().clone();
            items.extend(r.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (BinaryOperator::Add, Value::Tuple(l), Value::Tuple(r)) => {
            Ok(Value::tuple(l.iter().chain(r.iter()).cloned().collect()))
        }
        (BinaryOperator::Mul, sequence, count) | (BinaryOperator::Mul, count, sequence)
            if count.as_int().is_some() =>
        {
            let times = count
                .as_int()
                .map_or(0, |count| usize::try_from(count).unwrap_or(0));
            repeat(sequence, times).unwrap_or_else(|| Err(unsupported(op, left, right)))
        }
        _ => Err(unsupported(op, left, right)),
    }
}

fn as_f64(value: Numeric) -> f64 {
    match value {
        Numeric::Int(value) => value as f64,
        Numeric::Float(value) => value,
    }
}

/// `None` when `sequence` cannot be repeated at all.
fn repeat(sequence: &Value, times: usize) -> Option<Result<Value>> {
    let (len, type_name) = match sequence {
        Value::String(value) => (value.len(), "string"),
        Value::List(items) => (items.borrow().len(), "list"),
        Value::Tuple(items) => (items.len(), "tuple"),
        _ => return None,
    };
    if len
        .checked_mul(times)
        .is_none_or(|total| total > MAX_REPEAT_LEN)
    {
        return Some(Err(RuntimeError::SequenceTooLong { type_name }));
    }
    let times = if len == 0 { 0 } else { times };

    let repeated = match sequence {
        Value::String(value) => Value::String(value.repeat(times)),
        Value::List(items) => {
            let items = items.borrow();
            Value::list(std::iter::repeat_n(items.iter(), times).flatten().cloned().collect())
        }
        Value::Tuple(items) => Value::tuple(
            std::iter::repeat_n(items.iter(), times).flatten().cloned().collect(),
        ),
        _ => return None,
    };
    Some(Ok(repeated))
}

fn int_binary(op: BinaryOperator, left: i64, right: i64) -> Result<Value> {
    let checked = |value: Option<i64>| value.map(Value::Integer).ok_or(RuntimeError::IntegerOverflow);
    match op {
        BinaryOperator::Add => checked(left.checked_add(right)),
        BinaryOperator::Sub => checked(left.checked_sub(right)),
        BinaryOperator::Mul => checked(left.checked_mul(right)),
        BinaryOperator::Div => float_binary(op, left as f64, right as f64),
        BinaryOperator::FloorDiv => {
            if right == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            let quotient = left.checked_div(right).ok_or(RuntimeError::IntegerOverflow)?;
            if left % right != 0 && ((left < 0) != (right < 0)) {
                Ok(Value::Integer(quotient - 1))
            } else {
                Ok(Value::Integer(quotient))
            }
        }
        BinaryOperator::Mod => {
            if right == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            let remainder = left.checked_rem(right).ok_or(RuntimeError::IntegerOverflow)?;
            if remainder != 0 && ((remainder < 0) != (right < 0)) {
                Ok(Value::Integer(remainder + right))
            } else {
                Ok(Value::Integer(remainder))
            }
        }
        BinaryOperator::Pow => {
            if right < 0 {
                return float_binary(op, left as f64, right as f64);
            }
            let exponent = u32::try_from(right).map_err(|_| RuntimeError::IntegerOverflow)?;
            checked(left.checked_pow(exponent))
        }
    }
}

fn float_binary(op: BinaryOperator, left: f64, right: f64) -> Result<Value> {
    let value = match op {
        BinaryOperator::Add => left + right,
        BinaryOperator::Sub => left - right,
        BinaryOperator::Mul => left * right,
        BinaryOperator::Div => {
            if right == 0.0 {
                return Err(RuntimeError::DivisionByZero);
            }
            left / right
        }
        BinaryOperator::FloorDiv => {
            if right == 0.0 {
                return Err(RuntimeError::DivisionByZero);
            }
            (left / right).floor()
        }
        BinaryOperator::Mod => {
            if right == 0.0 {
                return Err(RuntimeError::DivisionByZero);
            }
            let remainder = left % right;
            if remainder != 0.0 && ((remainder < 0.0) != (right < 0.0)) {
                remainder + right
            } else {
                remainder
            }
        }
        BinaryOperator::Pow => {
            if left == 0.0 && right < 0.0 {
                return Err(RuntimeError::DivisionByZero);
            }
            left.powf(right)
        }
    };
    Ok(Value::Float(value))
}

pub(super) fn compare(op: CompareOperator, left: &Value, right: &Value) -> Result<bool> {
    match op {
        CompareOperator::Equal => Ok(left.equals(right)),
        CompareOperator::NotEqual => Ok(!left.equals(right)),
        CompareOperator::Is => Ok(left.is_same(right)),
        CompareOperator::IsNot => Ok(!left.is_same(right)),
        CompareOperator::In => contains(right, left),
        CompareOperator::NotIn => Ok(!contains(right, left)?),
        CompareOperator::Less => Ok(ordering(left, right, op.symbol())? == Some(Ordering::Less)),
        CompareOperator::LessEqual => Ok(matches!(
            ordering(left, right, op.symbol())?,
            Some(Ordering::Less | Ordering::Equal)
        )),
        CompareOperator::Greater => {
            Ok(ordering(left, right, op.symbol())? == Some(Ordering::Greater))
        }
        CompareOperator::GreaterEqual => Ok(matches!(
            ordering(left, right, op.symbol())?,
            Some(Ordering::Greater | Ordering::Equal)
        )),
    }
}

/// Ordering for `<` and friends. `None` means the values are unordered
/// (a NaN is involved).
pub(super) fn ordering(left: &Value, right: &Value, symbol: &'static str) -> Result<Option<Ordering>> {
    if let (Some(l), Some(r)) = (numeric(left), numeric(right)) {
        return Ok(match (l, r) {
            (Numeric::Int(l), Numeric::Int(r)) => Some(l.cmp(&r)),
            (l, r) => as_f64(l).partial_cmp(&as_f64(r)),
        });
    }
    match (left, right) {
        (Value::String(l), Value::String(r)) => Ok(Some(l.cmp(r))),
        (Value::List(l), Value::List(r)) => {
            let (l, r) = (l.borrow().clone(), r.borrow().clone());
            sequence_ordering(&l, &r, symbol)
        }
        (Value::Tuple(l), Value::Tuple(r)) => sequence_ordering(l, r, symbol),
        _ => Err(RuntimeError::UnorderableTypes {
            operation: symbol,
            left: left.type_name(),
            right: right.type_name(),
        }),
    }
}

fn sequence_ordering(left: &[Value], right: &[Value], symbol: &'static str) -> Result<Option<Ordering>> {
    for (l, r) in left.iter().zip(right) {
        if !l.equals(r) {
            return ordering(l, r, symbol);
        }
    }
    Ok(Some(left.len().cmp(&right.len())))
}

pub(super) fn less_than(left: &Value, right: &Value) -> Result<bool> {
    Ok(ordering(left, right, "<")? == Some(Ordering::Less))
}

/// Stable sort that stops at the first pair of values that cannot be
/// ordered.
pub(super) fn sort_values(items: Vec<Value>) -> Result<Vec<Value>> {
    let mut sorted: Vec<Value> = Vec::with_capacity(items.len());
    for item in items {
        let (mut low, mut high) = (0, sorted.len());
        while low < high {
            let mid = low + (high - low) / 2;
            if less_than(&item, &sorted[mid])? {
                high = mid;
            } else {
                low = mid + 1;
            }
        }
        sorted.insert(low, item);
    }
    Ok(sorted)
}

pub(super) fn contains(container: &Value, item: &Value) -> Result<bool> {
    match container {
        Value::List(items) => Ok(items.borrow().iter().any(|value| value.equals(item))),
        Value::Tuple(items) => Ok(items.iter().any(|value| value.equals(item))),
        Value::Dict(dict) => Ok(dict.borrow().contains_key(item)),
        Value::String(haystack) => match item {
            Value::String(needle) => Ok(haystack.contains(needle.as_str())),
            other => Err(RuntimeError::InvalidArgumentType {
                operation: "in".to_string(),
                argument: "left operand".to_string(),
                expected: "str",
                got: other.type_name(),
            }),
        },
        Value::Range { .. } => Ok(item
            .as_int()
            .is_some_and(|value| range_contains(container, value))),
        other => Err(RuntimeError::NotIterable {
            type_name: other.type_name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::ExceptionKind;
    use pretty_assertions::assert_eq;

    fn int(value: i64) -> Value {
        Value::Integer(value)
    }

    fn eval(op: BinaryOperator, left: Value, right: Value) -> String {
        binary(op, &left, &right).expect("operation failed").repr()
    }

    #[test]
    fn integer_division_floors_towards_negative_infinity() {
        assert_eq!(eval(BinaryOperator::FloorDiv, int(7), int(2)), "3");
        assert_eq!(eval(BinaryOperator::FloorDiv, int(-7), int(2)), "-4");
        assert_eq!(eval(BinaryOperator::Mod, int(-7), int(2)), "1");
        assert_eq!(eval(BinaryOperator::Mod, int(7), int(-2)), "-1");
        assert_eq!(eval(BinaryOperator::Div, int(7), int(2)), "3.5");
    }

    #[test]
    fn mixed_numbers_promote_to_float() {
        assert_eq!(eval(BinaryOperator::Add, int(1), Value::Float(0.5)), "1.5");
        assert_eq!(eval(BinaryOperator::Pow, int(2), int(-1)), "0.5");
        assert_eq!(eval(BinaryOperator::Add, Value::Boolean(true), int(1)), "2");
    }

    #[test]
    fn sequences_concatenate_and_repeat() {
        assert_eq!(eval(BinaryOperator::Add, "ab".into(), "cd".into()), "'abcd'");
        assert_eq!(eval(BinaryOperator::Mul, "ab".into(), int(2)), "'abab'");
        assert_eq!(eval(BinaryOperator::Mul, int(2), Value::list(vec![int(1)])), "[1, 1]");
        assert_eq!(eval(BinaryOperator::Mul, "ab".into(), int(-1)), "''");
    }

    #[test]
    fn oversized_repetition_is_an_overflow_error() {
        let huge = int(1 << 62);
        for sequence in [
            Value::from("ab"),
            Value::list(vec![int(1)]),
            Value::tuple(vec![int(1), int(2)]),
        ] {
            let error = binary(BinaryOperator::Mul, &sequence, &huge).expect_err("too long");
            assert_eq!(error.exception_kind(), ExceptionKind::OverflowError);
        }
        let error = binary(BinaryOperator::Mul, &huge, &"ab".into()).expect_err("too long");
        assert_eq!(error.to_string(), "repeated string is too long");

        // Empty sequences stay empty however often they repeat.
        assert_eq!(eval(BinaryOperator::Mul, "".into(), int(i64::MAX)), "''");
        assert_eq!(eval(BinaryOperator::Mul, Value::list(Vec::new()), int(i64::MAX)), "[]");
    }

    #[test]
    fn reports_faults() {
        assert_eq!(
            binary(BinaryOperator::Div, &int(1), &int(0)).expect_err("division by zero"),
            RuntimeError::DivisionByZero
        );
        assert_eq!(
            binary(BinaryOperator::Add, &int(i64::MAX), &int(1)).expect_err("overflow"),
            RuntimeError::IntegerOverflow
        );
        assert_eq!(
            binary(BinaryOperator::Add, &int(1), &"a".into()).expect_err("type mismatch"),
            RuntimeError::UnsupportedOperand {
                operation: "+",
                left: "int",
                right: "str"
            }
        );
    }

    #[test]
    fn comparisons_follow_python_rules() {
        assert!(compare(CompareOperator::Less, &int(1), &Value::Float(1.5)).expect("compare"));
        assert!(compare(CompareOperator::Less, &"a".into(), &"b".into()).expect("compare"));
        assert!(
            compare(
                CompareOperator::Less,
                &Value::tuple(vec![int(1), int(2)]),
                &Value::tuple(vec![int(1), int(3)])
            )
            .expect("compare")
        );
        assert!(!compare(CompareOperator::Less, &Value::Float(f64::NAN), &int(1)).expect("compare"));
        assert!(compare(CompareOperator::In, &"b".into(), &"abc".into()).expect("compare"));
        assert!(compare(CompareOperator::NotIn, &int(4), &Value::list(vec![int(1)])).expect("compare"));
        assert!(compare(CompareOperator::Less, &int(1), &"a".into()).is_err());
    }

    #[test]
    fn sorts_stably() {
        let sorted = sort_values(vec![int(3), int(1), Value::Float(1.0), int(2)]).expect("sort");
        let rendered: Vec<String> = sorted.iter().map(Value::repr).collect();
        assert_eq!(rendered, vec!["1", "1.0", "2", "3"]);
        assert!(sort_values(vec![int(1), "a".into()]).is_err());
    }
}
