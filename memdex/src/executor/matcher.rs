use super::ExecSource;
use crate::common::{RowId, Value};
use crate::condition::{BinaryOp, Condition, UnaryOp};
use crate::errors::{ErrorKind, MemdexError, MemdexResult};
use std::cmp::Ordering;

/// Whether the row identified by `id` satisfies `condition`.
pub(crate) fn matches(
    condition: &Condition,
    id: RowId,
    src: &dyn ExecSource,
) -> MemdexResult<bool> {
    Ok(eval(condition, id, src)?.is_truthy())
}

/// Interprets a condition tree against one row, producing a value.
///
/// `AND`/`OR` short-circuit and return an operand, so truthiness composes
/// the way the fluent surface suggests. Relational comparisons on
/// incompatible kinds surface a predicate error; equality does not.
pub(crate) fn eval(condition: &Condition, id: RowId, src: &dyn ExecSource) -> MemdexResult<Value> {
    match condition {
        Condition::Literal(value) => Ok(value.clone()),
        Condition::Attribute(name) => src.read_attr(id, name),
        Condition::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval(item, id, src)?);
            }
            Ok(Value::Array(values))
        }
        Condition::Unary { op, operand } => {
            let value = eval(operand, id, src)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                UnaryOp::Invert => match value.as_i64() {
                    Some(v) => Ok(Value::I64(!v)),
                    None => Err(type_error("~", &value)),
                },
            }
        }
        Condition::Binary { op, left, right } => match op {
            BinaryOp::And => {
                let lhs = eval(left, id, src)?;
                if lhs.is_truthy() {
                    eval(right, id, src)
                } else {
                    Ok(lhs)
                }
            }
            BinaryOp::Or => {
                let lhs = eval(left, id, src)?;
                if lhs.is_truthy() {
                    Ok(lhs)
                } else {
                    eval(right, id, src)
                }
            }
            _ => {
                let lhs = eval(left, id, src)?;
                let rhs = eval(right, id, src)?;
                apply_binary(*op, lhs, rhs)
            }
        },
    }
}

fn apply_binary(op: BinaryOp, lhs: Value, rhs: Value) -> MemdexResult<Value> {
    match op {
        BinaryOp::Eq | BinaryOp::Is => Ok(Value::Bool(lhs == rhs)),
        BinaryOp::Ne => Ok(Value::Bool(lhs != rhs)),
        BinaryOp::Lt => compare(op, &lhs, &rhs, |o| o == Ordering::Less),
        BinaryOp::Le => compare(op, &lhs, &rhs, |o| o != Ordering::Greater),
        BinaryOp::Gt => compare(op, &lhs, &rhs, |o| o == Ordering::Greater),
        BinaryOp::Ge => compare(op, &lhs, &rhs, |o| o != Ordering::Less),
        BinaryOp::In => match rhs {
            Value::Array(items) => Ok(Value::Bool(items.contains(&lhs))),
            other => Err(MemdexError::new(
                &format!("Right side of IN is not a container: {}", other),
                ErrorKind::TypeMismatch,
            )),
        },
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => arith(op, lhs, rhs),
        BinaryOp::Div => divide(lhs, rhs),
        BinaryOp::FloorDiv => floor_divide(lhs, rhs),
        BinaryOp::Mod => modulo(lhs, rhs),
        BinaryOp::Pow => power(lhs, rhs),
        BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::Xor | BinaryOp::Shl | BinaryOp::Shr => {
            bitwise(op, lhs, rhs)
        }
        BinaryOp::And | BinaryOp::Or => Err(MemdexError::new(
            "Logical operator fell through short-circuit evaluation",
            ErrorKind::InternalError,
        )),
    }
}

fn compare(
    op: BinaryOp,
    lhs: &Value,
    rhs: &Value,
    test: fn(Ordering) -> bool,
) -> MemdexResult<Value> {
    let ordering = lhs.try_compare(rhs).map_err(|cause| {
        MemdexError::new_with_cause(
            &format!("Cannot evaluate {} {} {}", lhs, op.symbol(), rhs),
            ErrorKind::TypeMismatch,
            cause,
        )
    })?;
    Ok(Value::Bool(test(ordering)))
}

fn type_error(op: &str, value: &Value) -> MemdexError {
    log::error!("Operator {} is not defined for {}", op, value);
    MemdexError::new(
        &format!("Operator {} is not defined for {}", op, value),
        ErrorKind::TypeMismatch,
    )
}

/// Both operands as exact integers, when neither is a float.
fn int_pair(lhs: &Value, rhs: &Value) -> Option<(i128, i128)> {
    let to_int = |v: &Value| match v {
        Value::I64(v) => Some(*v as i128),
        Value::U64(v) => Some(*v as i128),
        _ => None,
    };
    Some((to_int(lhs)?, to_int(rhs)?))
}

fn float_pair(lhs: &Value, rhs: &Value) -> Option<(f64, f64)> {
    Some((lhs.as_f64()?, rhs.as_f64()?))
}

/// Narrows an i128 intermediate back into a value, preferring `I64`.
fn narrow_int(v: i128) -> MemdexResult<Value> {
    if let Ok(v) = i64::try_from(v) {
        Ok(Value::I64(v))
    } else if let Ok(v) = u64::try_from(v) {
        Ok(Value::U64(v))
    } else {
        Err(MemdexError::new(
            "Integer overflow in predicate arithmetic",
            ErrorKind::FilterError,
        ))
    }
}

fn arith(op: BinaryOp, lhs: Value, rhs: Value) -> MemdexResult<Value> {
    if let Some((a, b)) = int_pair(&lhs, &rhs) {
        let result = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            _ => a.checked_mul(b),
        };
        return match result {
            Some(v) => narrow_int(v),
            None => Err(MemdexError::new(
                "Integer overflow in predicate arithmetic",
                ErrorKind::FilterError,
            )),
        };
    }
    if let Some((a, b)) = float_pair(&lhs, &rhs) {
        let v = match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            _ => a * b,
        };
        return Ok(Value::F64(v));
    }
    Err(type_error(op.symbol(), if lhs.is_number() { &rhs } else { &lhs }))
}

fn divide(lhs: Value, rhs: Value) -> MemdexResult<Value> {
    match float_pair(&lhs, &rhs) {
        Some((_, b)) if b == 0.0 => Err(MemdexError::new(
            "Division by zero",
            ErrorKind::FilterError,
        )),
        // true division always produces a float
        Some((a, b)) => Ok(Value::F64(a / b)),
        None => Err(type_error("/", if lhs.is_number() { &rhs } else { &lhs })),
    }
}

fn floor_divide(lhs: Value, rhs: Value) -> MemdexResult<Value> {
    if let Some((a, b)) = int_pair(&lhs, &rhs) {
        if b == 0 {
            return Err(MemdexError::new(
                "Division by zero",
                ErrorKind::FilterError,
            ));
        }
        // floored division: quotient rounds toward negative infinity
        let (q, r) = (a / b, a % b);
        let floored = if r != 0 && (r < 0) != (b < 0) { q - 1 } else { q };
        return narrow_int(floored);
    }
    match float_pair(&lhs, &rhs) {
        Some((_, b)) if b == 0.0 => Err(MemdexError::new(
            "Division by zero",
            ErrorKind::FilterError,
        )),
        Some((a, b)) => Ok(Value::F64((a / b).floor())),
        None => Err(type_error("//", if lhs.is_number() { &rhs } else { &lhs })),
    }
}

fn modulo(lhs: Value, rhs: Value) -> MemdexResult<Value> {
    if let Some((a, b)) = int_pair(&lhs, &rhs) {
        if b == 0 {
            return Err(MemdexError::new(
                "Division by zero",
                ErrorKind::FilterError,
            ));
        }
        // sign follows the divisor
        return narrow_int(((a % b) + b) % b);
    }
    match float_pair(&lhs, &rhs) {
        Some((_, b)) if b == 0.0 => Err(MemdexError::new(
            "Division by zero",
            ErrorKind::FilterError,
        )),
        Some((a, b)) => Ok(Value::F64(a - b * (a / b).floor())),
        None => Err(type_error("%", if lhs.is_number() { &rhs } else { &lhs })),
    }
}

fn power(lhs: Value, rhs: Value) -> MemdexResult<Value> {
    if let Some((a, b)) = int_pair(&lhs, &rhs) {
        if let Ok(exp) = u32::try_from(b) {
            return match a.checked_pow(exp) {
                Some(v) => narrow_int(v),
                None => Err(MemdexError::new(
                    "Integer overflow in predicate arithmetic",
                    ErrorKind::FilterError,
                )),
            };
        }
    }
    match float_pair(&lhs, &rhs) {
        Some((a, b)) => Ok(Value::F64(a.powf(b))),
        None => Err(type_error("**", if lhs.is_number() { &rhs } else { &lhs })),
    }
}

fn bitwise(op: BinaryOp, lhs: Value, rhs: Value) -> MemdexResult<Value> {
    let (a, b) = match (lhs.as_i64(), rhs.as_i64()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(type_error(
                op.symbol(),
                if lhs.as_i64().is_some() { &rhs } else { &lhs },
            ))
        }
    };
    let value = match op {
        BinaryOp::BitAnd => a & b,
        BinaryOp::BitOr => a | b,
        BinaryOp::Xor => a ^ b,
        BinaryOp::Shl | BinaryOp::Shr => {
            let shift = u32::try_from(b).ok().filter(|s| *s < 64).ok_or_else(|| {
                MemdexError::new(
                    &format!("Shift amount {} is out of range", b),
                    ErrorKind::FilterError,
                )
            })?;
            if op == BinaryOp::Shl {
                a.checked_shl(shift).unwrap_or(0)
            } else {
                a >> shift
            }
        }
        _ => {
            return Err(MemdexError::new(
                "Unsupported bitwise operator",
                ErrorKind::InternalError,
            ))
        }
    };
    Ok(Value::I64(value))
}
