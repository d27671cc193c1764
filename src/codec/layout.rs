//! Layout-driven structure decoding.
//!
//! Walks an [`abi::layout::Layout`](crate::abi::layout::Layout) field by
//! field over a byte slice, and walks an opcode's item list over a message
//! body. Decoding is best effort: whatever does not match the expected shape
//! is returned as [`Value::Bytes`], never dropped.

use bytes::{Buf, Bytes};

use super::value::{Field, Struct, Value};
use crate::abi::layout::{FieldType, Layout, Scalar};
use crate::abi::Item;
use crate::protocol::ByteOrder;

/// Decode one structure from the front of `buf`.
///
/// Returns `None` if `buf` is shorter than the layout.
pub fn decode_struct(layout: &'static Layout, buf: &[u8], order: ByteOrder) -> Option<Struct> {
    if buf.len() < layout.size() {
        return None;
    }
    let mut cursor = buf;
    Some(read_struct(layout, &mut cursor, order))
}

fn read_struct(layout: &'static Layout, buf: &mut &[u8], order: ByteOrder) -> Struct {
    let fields = layout
        .fields
        .iter()
        .map(|&(name, ty)| Field {
            name,
            value: read_field(ty, buf, order),
        })
        .collect();
    Struct {
        name: layout.name,
        fields,
    }
}

fn read_field(ty: FieldType, buf: &mut &[u8], order: ByteOrder) -> Value {
    match ty {
        FieldType::Scalar(scalar) => read_scalar(scalar, buf, order),
        FieldType::Array(scalar, n) => {
            Value::List((0..n).map(|_| read_scalar(scalar, buf, order)).collect())
        }
        FieldType::Struct(layout) => Value::Struct(read_struct(layout, buf, order)),
    }
}

fn read_scalar(scalar: Scalar, buf: &mut &[u8], order: ByteOrder) -> Value {
    match scalar {
        Scalar::U16 => Value::Unsigned(order.get_u16(buf) as u64),
        Scalar::U32 => Value::Unsigned(order.get_u32(buf) as u64),
        Scalar::U64 => Value::Unsigned(order.get_u64(buf)),
        Scalar::I32 => Value::Signed(order.get_i32(buf) as i64),
        Scalar::I64 => Value::Signed(order.get_i64(buf)),
    }
}

/// Decode a body against an item list.
///
/// An empty body yields no values. Decoding stops at the first item that
/// does not fit; the unread remainder becomes a trailing `Bytes` value.
pub fn decode_items(items: &[Item], body: &[u8], order: ByteOrder) -> Vec<Value> {
    let mut values = Vec::with_capacity(items.len());
    let mut rest = body;

    for item in items {
        if rest.is_empty() {
            break;
        }
        match *item {
            Item::Struct(layout) => match decode_struct(layout, rest, order) {
                Some(decoded) => {
                    values.push(Value::Struct(decoded));
                    rest.advance(layout.size());
                }
                None => {
                    tracing::debug!(
                        layout = layout.name,
                        need = layout.size(),
                        have = rest.len(),
                        "structure does not fit"
                    );
                    break;
                }
            },
            Item::Name => match rest.iter().position(|&b| b == 0) {
                Some(end) => {
                    values.push(Value::Text(Bytes::copy_from_slice(&rest[..end])));
                    rest.advance(end + 1);
                }
                None => break,
            },
            Item::Data => {
                values.push(Value::Bytes(Bytes::copy_from_slice(rest)));
                rest = &[];
            }
        }
    }

    if !rest.is_empty() {
        values.push(Value::Bytes(Bytes::copy_from_slice(rest)));
    }
    values
}
