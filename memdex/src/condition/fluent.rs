use crate::common::Value;
use crate::condition::{BinaryOp, Condition, UnaryOp};

/// Creates an attribute reference for the fluent builder API.
///
/// ```rust,ignore
/// use memdex::condition::attr;
///
/// let cond = attr("x").eq(1).and(attr("y").is_in(vec![1, 2]));
/// ```
pub fn attr(name: &str) -> Condition {
    Condition::Attribute(name.to_string())
}

/// Creates a literal condition node.
pub fn lit<T: Into<Value>>(value: T) -> Condition {
    Condition::Literal(value.into())
}

/// Combines conditions using logical AND.
///
/// Folds the conditions into a single left-leaning conjunction:
/// `all_of([a, b, c])` is `a AND b AND c`. An empty input yields the
/// always-true literal.
pub fn all_of<I: IntoIterator<Item = Condition>>(conditions: I) -> Condition {
    let mut iter = conditions.into_iter();
    match iter.next() {
        None => lit(true),
        Some(first) => iter.fold(first, |acc, cond| acc.and(cond)),
    }
}

/// Combines conditions using logical OR.
///
/// Folds the conditions into a single left-leaning disjunction:
/// `any_of([a, b, c])` is `a OR b OR c`. An empty input yields the
/// always-false literal.
pub fn any_of<I: IntoIterator<Item = Condition>>(conditions: I) -> Condition {
    let mut iter = conditions.into_iter();
    match iter.next() {
        None => lit(false),
        Some(first) => iter.fold(first, |acc, cond| acc.or(cond)),
    }
}

impl Condition {
    /// `self = value`
    pub fn eq<T: Into<Value>>(self, value: T) -> Condition {
        Condition::binary(BinaryOp::Eq, self, lit(value))
    }

    /// `self != value`
    pub fn ne<T: Into<Value>>(self, value: T) -> Condition {
        Condition::binary(BinaryOp::Ne, self, lit(value))
    }

    /// `self < value`
    pub fn lt<T: Into<Value>>(self, value: T) -> Condition {
        Condition::binary(BinaryOp::Lt, self, lit(value))
    }

    /// `self <= value`
    pub fn le<T: Into<Value>>(self, value: T) -> Condition {
        Condition::binary(BinaryOp::Le, self, lit(value))
    }

    /// `self > value`
    pub fn gt<T: Into<Value>>(self, value: T) -> Condition {
        Condition::binary(BinaryOp::Gt, self, lit(value))
    }

    /// `self >= value`
    pub fn ge<T: Into<Value>>(self, value: T) -> Condition {
        Condition::binary(BinaryOp::Ge, self, lit(value))
    }

    /// `self IS value` — null-safe strict equality; `attr("a").is(Value::Null)`
    /// matches null attributes.
    pub fn is<T: Into<Value>>(self, value: T) -> Condition {
        Condition::binary(BinaryOp::Is, self, lit(value))
    }

    /// `self IN [values…]` — membership in an array of literals. This is the
    /// form hash and range indexes expand into a union of lookups.
    pub fn is_in<T: Into<Value>>(self, values: Vec<T>) -> Condition {
        let items = values.into_iter().map(lit).collect();
        Condition::binary(BinaryOp::In, self, Condition::Array(items))
    }

    /// `self IN other` — membership in an arbitrary expression, typically a
    /// collection-valued attribute (`lit(1).member_of(attr("tags"))`, the
    /// form inverted indexes serve).
    pub fn member_of(self, other: Condition) -> Condition {
        Condition::binary(BinaryOp::In, self, other)
    }

    /// `self AND other`
    pub fn and(self, other: Condition) -> Condition {
        Condition::binary(BinaryOp::And, self, other)
    }

    /// `self OR other`
    pub fn or(self, other: Condition) -> Condition {
        Condition::binary(BinaryOp::Or, self, other)
    }

    /// `NOT self`
    pub fn not(self) -> Condition {
        Condition::unary(UnaryOp::Not, self)
    }

    /// `~self`
    pub fn invert(self) -> Condition {
        Condition::unary(UnaryOp::Invert, self)
    }

    /// `self + other`
    pub fn add(self, other: Condition) -> Condition {
        Condition::binary(BinaryOp::Add, self, other)
    }

    /// `self - other`
    pub fn sub(self, other: Condition) -> Condition {
        Condition::binary(BinaryOp::Sub, self, other)
    }

    /// `self * other`
    pub fn mul(self, other: Condition) -> Condition {
        Condition::binary(BinaryOp::Mul, self, other)
    }

    /// `self / other`
    pub fn div(self, other: Condition) -> Condition {
        Condition::binary(BinaryOp::Div, self, other)
    }

    /// `self // other` — integer floor division.
    pub fn floor_div(self, other: Condition) -> Condition {
        Condition::binary(BinaryOp::FloorDiv, self, other)
    }

    /// `self % other`
    pub fn rem(self, other: Condition) -> Condition {
        Condition::binary(BinaryOp::Mod, self, other)
    }

    /// `self ** other`
    pub fn pow(self, other: Condition) -> Condition {
        Condition::binary(BinaryOp::Pow, self, other)
    }
}
