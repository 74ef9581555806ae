//! Socket value representation.
//!
//! Components exchange `serde_json::Value` payloads; the scheduler adds
//! no further typing on top of that beyond tracking whether a socket is
//! single-valued or variadic (accumulating).

use serde_json::Value;

/// The value carried over a single socket connection.
pub type SocketValue = Value;

/// What the Input Store holds for one component's input socket.
///
/// A non-variadic socket holds at most one value at a time (the most
/// recent `set`); a variadic socket accumulates one value per sender,
/// in the order they were appended, and is drained as a whole on read.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    /// A single value, the common case for non-variadic sockets.
    Single(SocketValue),
    /// An ordered sequence of values, one per sender per run, for
    /// sockets declared variadic.
    Variadic(Vec<SocketValue>),
}

impl StoredValue {
    /// True if this holds a variadic sequence.
    pub fn is_variadic(&self) -> bool {
        matches!(self, StoredValue::Variadic(_))
    }

    /// Number of values currently held (1 for `Single`, length for
    /// `Variadic`).
    pub fn len(&self) -> usize {
        match self {
            StoredValue::Single(_) => 1,
            StoredValue::Variadic(values) => values.len(),
        }
    }

    /// True if a variadic socket has accumulated nothing yet. `Single`
    /// is never empty once constructed.
    pub fn is_empty(&self) -> bool {
        match self {
            StoredValue::Single(_) => false,
            StoredValue::Variadic(values) => values.is_empty(),
        }
    }

    /// Push a value onto a variadic accumulator. Panics if called on a
    /// `Single`. Callers must only append to sockets declared variadic;
    /// `InputStore::append` enforces this invariant before calling here.
    pub fn push(&mut self, value: SocketValue) {
        match self {
            StoredValue::Variadic(values) => values.push(value),
            StoredValue::Single(_) => {
                panic!("StoredValue::push called on a Single value")
            }
        }
    }

    /// Consume and return the underlying JSON value ready to hand to a
    /// component: a bare value for `Single`, a JSON array for
    /// `Variadic`.
    pub fn into_socket_value(self) -> SocketValue {
        match self {
            StoredValue::Single(value) => value,
            StoredValue::Variadic(values) => Value::Array(values),
        }
    }
}
