//! Name-indexed typed access to a data block byte buffer.
//!
//! Scalars are big-endian; packed boolean words are addressed
//! little-endian (bit 0 lives in the low, first byte), matching the bit
//! numbering the controller uses for non-optimized blocks.

use crate::ast::{DefaultAssignment, Literal, S7Type};
use crate::layout::{Layout, PhysicalField};
use crate::value::Value;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use log::warn;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("type mismatch for '{field}': cannot store {value} in {ty}")]
    TypeMismatch {
        field: String,
        ty: S7Type,
        value: Value,
    },
    #[error("duplicate field name: {0}")]
    DuplicateField(String),
}

/// Physical location of one field inside the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address {
    /// Scalar at a byte offset.
    Byte(usize),
    /// Packed boolean: word byte offset plus bit position 0..=15.
    Bit(usize, u8),
}

/// Name to address map for one layout. Keys are the flattened field names.
#[derive(Debug, Clone)]
pub struct AddressIndex {
    map: HashMap<String, (Address, S7Type)>,
    names: Vec<String>,
}

impl AddressIndex {
    pub fn build(layout: &Layout) -> Result<Self, CodecError> {
        let mut index = AddressIndex {
            map: HashMap::new(),
            names: Vec::new(),
        };
        for field in &layout.fields {
            match field {
                PhysicalField::Scalar { name, ty, offset } => {
                    index.insert(name, Address::Byte(*offset), *ty)?;
                }
                PhysicalField::BoolGroup { names, offset } => {
                    for (bit, name) in names.iter().enumerate() {
                        index.insert(name, Address::Bit(*offset, bit as u8), S7Type::Bool)?;
                    }
                }
            }
        }
        Ok(index)
    }

    fn insert(&mut self, name: &str, addr: Address, ty: S7Type) -> Result<(), CodecError> {
        if self
            .map
            .insert(name.to_string(), (addr, ty))
            .is_some()
        {
            return Err(CodecError::DuplicateField(name.to_string()));
        }
        self.names.push(name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<(Address, S7Type)> {
        self.map.get(name).copied()
    }

    /// Field names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A data block instance: address index plus the live byte buffer.
///
/// The buffer is exactly `layout.total_size` bytes and is never resized.
/// The block imposes no locking; a caller sharing it across threads must
/// serialize access itself (bit writes are read-modify-write on a word).
#[derive(Debug)]
pub struct DataBlock {
    layout: Layout,
    index: AddressIndex,
    buffer: Vec<u8>,
}

impl DataBlock {
    /// Fresh zero-filled buffer of exactly the layout's size.
    pub fn new(layout: Layout) -> Result<Self, CodecError> {
        let index = AddressIndex::build(&layout)?;
        let buffer = vec![0u8; layout.total_size];
        Ok(DataBlock {
            layout,
            index,
            buffer,
        })
    }

    /// Buffer initialized from an external byte source. A source of the
    /// wrong length is truncated or zero-padded to fit; the bytes may come
    /// from a stale layout version, so this warns instead of failing.
    pub fn from_bytes(layout: Layout, bytes: &[u8]) -> Result<Self, CodecError> {
        let mut block = Self::new(layout)?;
        if bytes.len() != block.buffer.len() {
            warn!(
                "buffer size mismatch: got {} bytes, layout expects {}; truncating/padding",
                bytes.len(),
                block.buffer.len()
            );
        }
        let n = bytes.len().min(block.buffer.len());
        block.buffer[..n].copy_from_slice(&bytes[..n]);
        Ok(block)
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn byte_size(&self) -> usize {
        self.buffer.len()
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.index.names()
    }

    /// Raw buffer, as transferred to/from the device.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Raw mutable buffer for the device I/O side refreshing the block.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// Read one field by its flattened name.
    pub fn get(&self, name: &str) -> Result<Value, CodecError> {
        let (addr, ty) = self
            .index
            .get(name)
            .ok_or_else(|| CodecError::UnknownField(name.to_string()))?;
        match addr {
            Address::Bit(offset, bit) => {
                let word = LittleEndian::read_u16(&self.buffer[offset..offset + 2]);
                Ok(Value::Bool(word >> bit & 1 == 1))
            }
            Address::Byte(offset) => Ok(self.read_scalar(offset, ty)),
        }
    }

    /// Write one field by its flattened name. Integer inputs wrap to the
    /// field's width; a failed set leaves the buffer untouched.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), CodecError> {
        let (addr, ty) = self
            .index
            .get(name)
            .ok_or_else(|| CodecError::UnknownField(name.to_string()))?;
        match addr {
            Address::Bit(offset, bit) => {
                let on = value.as_bool().ok_or_else(|| CodecError::TypeMismatch {
                    field: name.to_string(),
                    ty,
                    value: value.clone(),
                })?;
                let mut word = LittleEndian::read_u16(&self.buffer[offset..offset + 2]);
                if on {
                    word |= 1 << bit;
                } else {
                    word &= !(1 << bit);
                }
                LittleEndian::write_u16(&mut self.buffer[offset..offset + 2], word);
                Ok(())
            }
            Address::Byte(offset) => self.write_scalar(offset, ty, name, value),
        }
    }

    /// Replay a BEGIN default-value section onto the buffer. Assignments
    /// that do not match the layout (removed fields, stale literals) are
    /// skipped and reported; exports carry those routinely.
    pub fn apply_defaults(&mut self, defaults: &[DefaultAssignment]) -> Vec<String> {
        let mut skipped = Vec::new();
        for assign in defaults {
            let Some((_, ty)) = self.index.get(&assign.path) else {
                skipped.push(format!("{}: unknown field", assign.path));
                continue;
            };
            match literal_value(&assign.value, ty) {
                Some(value) => {
                    if let Err(e) = self.set(&assign.path, value) {
                        skipped.push(format!("{}: {}", assign.path, e));
                    }
                }
                None => skipped.push(format!(
                    "{}: default {:?} does not fit {}",
                    assign.path, assign.value, ty
                )),
            }
        }
        skipped
    }

    fn read_scalar(&self, o: usize, ty: S7Type) -> Value {
        let b = &self.buffer;
        match ty {
            S7Type::Bool => Value::Bool(b[o] & 1 == 1),
            S7Type::Byte => Value::Byte(b[o]),
            S7Type::Char => Value::Char(b[o]),
            S7Type::Int => Value::Int(BigEndian::read_i16(&b[o..o + 2])),
            S7Type::Word | S7Type::S5Time | S7Type::Date => {
                Value::Word(BigEndian::read_u16(&b[o..o + 2]))
            }
            S7Type::DInt | S7Type::Time => Value::DInt(BigEndian::read_i32(&b[o..o + 4])),
            S7Type::DWord | S7Type::UDInt | S7Type::TimeOfDay => {
                Value::DWord(BigEndian::read_u32(&b[o..o + 4]))
            }
            S7Type::Real => Value::Real(BigEndian::read_f32(&b[o..o + 4])),
            S7Type::DReal => Value::DReal(BigEndian::read_f64(&b[o..o + 8])),
            S7Type::S7String(max) => {
                let max_len = b[o].min(max);
                let cur = b[o + 1].min(max_len) as usize;
                let content = &b[o + 2..o + 2 + cur];
                Value::Str(content.iter().map(|&c| c as char).collect())
            }
        }
    }

    fn write_scalar(
        &mut self,
        o: usize,
        ty: S7Type,
        name: &str,
        value: Value,
    ) -> Result<(), CodecError> {
        let mismatch = |value: &Value| CodecError::TypeMismatch {
            field: name.to_string(),
            ty,
            value: value.clone(),
        };
        let b = &mut self.buffer;
        match ty {
            S7Type::Bool => {
                let on = value.as_bool().ok_or_else(|| mismatch(&value))?;
                b[o] = on as u8;
            }
            S7Type::Byte | S7Type::Char => {
                let i = value.as_i64().ok_or_else(|| mismatch(&value))?;
                b[o] = i as u8;
            }
            S7Type::Int => {
                let i = value.as_i64().ok_or_else(|| mismatch(&value))?;
                BigEndian::write_i16(&mut b[o..o + 2], i as i16);
            }
            S7Type::Word | S7Type::S5Time | S7Type::Date => {
                let i = value.as_i64().ok_or_else(|| mismatch(&value))?;
                BigEndian::write_u16(&mut b[o..o + 2], i as u16);
            }
            S7Type::DInt | S7Type::Time => {
                let i = value.as_i64().ok_or_else(|| mismatch(&value))?;
                BigEndian::write_i32(&mut b[o..o + 4], i as i32);
            }
            S7Type::DWord | S7Type::UDInt | S7Type::TimeOfDay => {
                let i = value.as_i64().ok_or_else(|| mismatch(&value))?;
                BigEndian::write_u32(&mut b[o..o + 4], i as u32);
            }
            S7Type::Real => {
                let f = value.as_f64().ok_or_else(|| mismatch(&value))?;
                BigEndian::write_f32(&mut b[o..o + 4], f as f32);
            }
            S7Type::DReal => {
                let f = value.as_f64().ok_or_else(|| mismatch(&value))?;
                BigEndian::write_f64(&mut b[o..o + 8], f);
            }
            S7Type::S7String(max) => {
                let s = value.as_str().ok_or_else(|| mismatch(&value))?;
                // Single-byte character set; anything wider is dropped.
                let data: Vec<u8> = s
                    .chars()
                    .filter(|c| (*c as u32) < 256)
                    .map(|c| c as u8)
                    .collect();
                let cur = data.len().min(max as usize);
                b[o] = max;
                b[o + 1] = cur as u8;
                b[o + 2..o + 2 + cur].copy_from_slice(&data[..cur]);
                for byte in &mut b[o + 2 + cur..o + 2 + max as usize] {
                    *byte = 0;
                }
            }
        }
        Ok(())
    }
}

fn literal_value(lit: &Literal, ty: S7Type) -> Option<Value> {
    match ty {
        S7Type::Bool => lit.as_bool().map(Value::Bool),
        S7Type::Byte => lit.as_i64().map(|i| Value::Byte(i as u8)),
        S7Type::Char => match lit {
            Literal::Str(s) => s.bytes().next().map(Value::Char),
            _ => lit.as_i64().map(|i| Value::Char(i as u8)),
        },
        S7Type::Int => lit.as_i64().map(|i| Value::Int(i as i16)),
        S7Type::Word | S7Type::S5Time | S7Type::Date => {
            lit.as_i64().map(|i| Value::Word(i as u16))
        }
        S7Type::DInt | S7Type::Time => lit.as_i64().map(|i| Value::DInt(i as i32)),
        S7Type::DWord | S7Type::UDInt | S7Type::TimeOfDay => {
            lit.as_i64().map(|i| Value::DWord(i as u32))
        }
        S7Type::Real => lit.as_f64().map(|f| Value::Real(f as f32)),
        S7Type::DReal => lit.as_f64().map(Value::DReal),
        S7Type::S7String(_) => match lit {
            Literal::Str(s) => Some(Value::Str(s.clone())),
            _ => None,
        },
    }
}
