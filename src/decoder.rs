//! Data-section decoding.
//!
//! Every value in the data section is self-describing: a control byte
//! carries the type in its top three bits and a size in the bottom
//! five, with extension bytes for sizes past 28 and an extension byte
//! for types past seven. Pointer values reference earlier offsets in
//! the same section and are resolved transparently; a pointer is never
//! allowed to target another pointer.
//!
//! String and byte payloads are returned as slices of the underlying
//! buffer. Nothing on this path copies payload bytes; composite values
//! allocate only the containers that hold their decoded children.

use crate::error::{Error, Result};
use crate::value::{Map, Value};

/// Wire type of a data field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Offset of another value in the data section
    Pointer,
    /// UTF-8 text
    String,
    /// IEEE 754 binary64
    Double,
    /// Raw bytes
    Bytes,
    /// Unsigned 16-bit integer
    Uint16,
    /// Unsigned 32-bit integer
    Uint32,
    /// String-keyed map
    Map,
    /// Signed 32-bit integer
    Int32,
    /// Unsigned 64-bit integer
    Uint64,
    /// Unsigned 128-bit integer
    Uint128,
    /// Ordered list of values
    Array,
    /// Reserved cache container; skippable, never materialized
    Container,
    /// Reserved end marker; skippable, never materialized
    Marker,
    /// Boolean, encoded entirely in the size bits
    Bool,
    /// IEEE 754 binary32
    Float,
}

impl FieldType {
    fn from_code(code: u8) -> Result<FieldType> {
        Ok(match code {
            1 => FieldType::Pointer,
            2 => FieldType::String,
            3 => FieldType::Double,
            4 => FieldType::Bytes,
            5 => FieldType::Uint16,
            6 => FieldType::Uint32,
            7 => FieldType::Map,
            8 => FieldType::Int32,
            9 => FieldType::Uint64,
            10 => FieldType::Uint128,
            11 => FieldType::Array,
            12 => FieldType::Container,
            13 => FieldType::Marker,
            14 => FieldType::Bool,
            15 => FieldType::Float,
            _ => return Err(Error::UnsupportedFieldType(code)),
        })
    }

    fn code(self) -> u8 {
        match self {
            FieldType::Pointer => 1,
            FieldType::String => 2,
            FieldType::Double => 3,
            FieldType::Bytes => 4,
            FieldType::Uint16 => 5,
            FieldType::Uint32 => 6,
            FieldType::Map => 7,
            FieldType::Int32 => 8,
            FieldType::Uint64 => 9,
            FieldType::Uint128 => 10,
            FieldType::Array => 11,
            FieldType::Container => 12,
            FieldType::Marker => 13,
            FieldType::Bool => 14,
            FieldType::Float => 15,
        }
    }
}

/// Cursor-based decoder over one data section.
///
/// The decoder itself is stateless; callers hold the cursor and pass
/// it to each read. Typed reads consume exactly one complete value,
/// resolving pointer indirection internally.
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'a> {
    data: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Decoder { data }
    }

    fn byte(&self, cursor: &mut usize) -> Result<u8> {
        let b = *self.data.get(*cursor).ok_or(Error::UnexpectedEof)?;
        *cursor += 1;
        Ok(b)
    }

    fn take(&self, cursor: &mut usize, len: usize) -> Result<&'a [u8]> {
        let end = cursor.checked_add(len).ok_or(Error::UnexpectedEof)?;
        if end > self.data.len() {
            return Err(Error::UnexpectedEof);
        }
        let bytes = &self.data[*cursor..end];
        *cursor = end;
        Ok(bytes)
    }

    /// Read a control byte: the field type and its size. For pointers
    /// the five size bits are pointer metadata and are returned raw,
    /// never run through the size extension.
    pub(crate) fn control(&self, cursor: &mut usize) -> Result<(FieldType, usize)> {
        let ctrl = self.byte(cursor)?;
        let code = ctrl >> 5;
        let size = (ctrl & 0x1F) as usize;
        if code == 0 {
            let ext = self.byte(cursor)?;
            if ext > 8 {
                return Err(Error::UnsupportedFieldType(ext));
            }
            let field_type = FieldType::from_code(ext + 7)?;
            return Ok((field_type, self.extend_size(cursor, size)?));
        }
        let field_type = FieldType::from_code(code)?;
        if field_type == FieldType::Pointer {
            return Ok((field_type, size));
        }
        Ok((field_type, self.extend_size(cursor, size)?))
    }

    /// Sizes 29..=31 pull 1..=3 extra bytes with cumulative biases.
    fn extend_size(&self, cursor: &mut usize, size: usize) -> Result<usize> {
        match size {
            0..=28 => Ok(size),
            29 => Ok(29 + self.byte(cursor)? as usize),
            30 => {
                let b = self.take(cursor, 2)?;
                Ok(285 + ((b[0] as usize) << 8 | b[1] as usize))
            }
            _ => {
                let b = self.take(cursor, 3)?;
                Ok(65821 + ((b[0] as usize) << 16 | (b[1] as usize) << 8 | b[2] as usize))
            }
        }
    }

    /// Unpack a pointer payload into a data-section offset. The two
    /// high size bits select how many bytes follow; the low three are
    /// prepended to them for the one-, two-, and three-byte classes.
    fn pointer_target(&self, cursor: &mut usize, size: usize) -> Result<usize> {
        let low3 = size & 0x7;
        let target = match (size >> 3) & 0x3 {
            0 => {
                let b = self.byte(cursor)? as usize;
                (low3 << 8) | b
            }
            1 => {
                let b = self.take(cursor, 2)?;
                2048 + ((low3 << 16) | (b[0] as usize) << 8 | b[1] as usize)
            }
            2 => {
                let b = self.take(cursor, 3)?;
                526_336
                    + ((low3 << 24) | (b[0] as usize) << 16 | (b[1] as usize) << 8 | b[2] as usize)
            }
            _ => {
                let b = self.take(cursor, 4)?;
                u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize
            }
        };
        if target >= self.data.len() {
            return Err(Error::CorruptedTree);
        }
        Ok(target)
    }

    /// Read the next control byte, following at most one pointer hop.
    /// `Some(at)` carries the pointee cursor when a hop happened; the
    /// stream cursor is then already past the pointer bytes.
    fn resolve(&self, cursor: &mut usize) -> Result<(FieldType, usize, Option<usize>)> {
        let (field_type, size) = self.control(cursor)?;
        if field_type != FieldType::Pointer {
            return Ok((field_type, size, None));
        }
        let mut at = self.pointer_target(cursor, size)?;
        let (field_type, size) = self.control(&mut at)?;
        if field_type == FieldType::Pointer {
            return Err(Error::CorruptedTree);
        }
        Ok((field_type, size, Some(at)))
    }

    fn str_payload(&self, cursor: &mut usize, size: usize) -> Result<&'a str> {
        let bytes = self.take(cursor, size)?;
        std::str::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
    }

    fn uint_payload(&self, cursor: &mut usize, size: usize, width: usize) -> Result<u64> {
        if size > width {
            return Err(Error::InvalidIntegerSize);
        }
        let mut value = 0u64;
        for &b in self.take(cursor, size)? {
            value = (value << 8) | b as u64;
        }
        Ok(value)
    }

    fn u128_payload(&self, cursor: &mut usize, size: usize) -> Result<u128> {
        if size > 16 {
            return Err(Error::InvalidIntegerSize);
        }
        let mut value = 0u128;
        for &b in self.take(cursor, size)? {
            value = (value << 8) | b as u128;
        }
        Ok(value)
    }

    fn f64_payload(&self, cursor: &mut usize, size: usize) -> Result<f64> {
        if size != 8 {
            return Err(Error::InvalidDoubleSize);
        }
        let b = self.take(cursor, 8)?;
        Ok(f64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn f32_payload(&self, cursor: &mut usize, size: usize) -> Result<f32> {
        if size != 4 {
            return Err(Error::InvalidFloatSize);
        }
        let b = self.take(cursor, 4)?;
        Ok(f32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn bool_payload(&self, size: usize) -> Result<bool> {
        match size {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(Error::InvalidBoolSize),
        }
    }

    /// Read one string value, returned as a slice of the section.
    pub fn read_str(&self, cursor: &mut usize) -> Result<&'a str> {
        match self.resolve(cursor)? {
            (FieldType::String, size, None) => self.str_payload(cursor, size),
            (FieldType::String, size, Some(mut at)) => self.str_payload(&mut at, size),
            _ => Err(Error::ExpectedString),
        }
    }

    /// Read one bytes value, returned as a slice of the section.
    pub fn read_bytes(&self, cursor: &mut usize) -> Result<&'a [u8]> {
        match self.resolve(cursor)? {
            (FieldType::Bytes, size, None) => self.take(cursor, size),
            (FieldType::Bytes, size, Some(mut at)) => self.take(&mut at, size),
            _ => Err(Error::ExpectedBytes),
        }
    }

    /// Read one unsigned 16-bit value.
    pub fn read_u16(&self, cursor: &mut usize) -> Result<u16> {
        match self.resolve(cursor)? {
            (FieldType::Uint16, size, None) => Ok(self.uint_payload(cursor, size, 2)? as u16),
            (FieldType::Uint16, size, Some(mut at)) => {
                Ok(self.uint_payload(&mut at, size, 2)? as u16)
            }
            _ => Err(Error::ExpectedUint16),
        }
    }

    /// Read one unsigned 32-bit value.
    pub fn read_u32(&self, cursor: &mut usize) -> Result<u32> {
        match self.resolve(cursor)? {
            (FieldType::Uint32, size, None) => Ok(self.uint_payload(cursor, size, 4)? as u32),
            (FieldType::Uint32, size, Some(mut at)) => {
                Ok(self.uint_payload(&mut at, size, 4)? as u32)
            }
            _ => Err(Error::ExpectedUint32),
        }
    }

    /// Read one signed 32-bit value.
    pub fn read_i32(&self, cursor: &mut usize) -> Result<i32> {
        match self.resolve(cursor)? {
            (FieldType::Int32, size, None) => Ok(self.uint_payload(cursor, size, 4)? as u32 as i32),
            (FieldType::Int32, size, Some(mut at)) => {
                Ok(self.uint_payload(&mut at, size, 4)? as u32 as i32)
            }
            _ => Err(Error::ExpectedInt32),
        }
    }

    /// Read one unsigned 64-bit value.
    pub fn read_u64(&self, cursor: &mut usize) -> Result<u64> {
        match self.resolve(cursor)? {
            (FieldType::Uint64, size, None) => self.uint_payload(cursor, size, 8),
            (FieldType::Uint64, size, Some(mut at)) => self.uint_payload(&mut at, size, 8),
            _ => Err(Error::ExpectedUint64),
        }
    }

    /// Read one unsigned 128-bit value.
    pub fn read_u128(&self, cursor: &mut usize) -> Result<u128> {
        match self.resolve(cursor)? {
            (FieldType::Uint128, size, None) => self.u128_payload(cursor, size),
            (FieldType::Uint128, size, Some(mut at)) => self.u128_payload(&mut at, size),
            _ => Err(Error::ExpectedUint128),
        }
    }

    /// Read one double value.
    pub fn read_f64(&self, cursor: &mut usize) -> Result<f64> {
        match self.resolve(cursor)? {
            (FieldType::Double, size, None) => self.f64_payload(cursor, size),
            (FieldType::Double, size, Some(mut at)) => self.f64_payload(&mut at, size),
            _ => Err(Error::ExpectedDouble),
        }
    }

    /// Read one float value.
    pub fn read_f32(&self, cursor: &mut usize) -> Result<f32> {
        match self.resolve(cursor)? {
            (FieldType::Float, size, None) => self.f32_payload(cursor, size),
            (FieldType::Float, size, Some(mut at)) => self.f32_payload(&mut at, size),
            _ => Err(Error::ExpectedFloat),
        }
    }

    /// Read one bool value. The payload lives entirely in the size
    /// bits: 0 is false, 1 is true, anything larger is an error.
    pub fn read_bool(&self, cursor: &mut usize) -> Result<bool> {
        match self.resolve(cursor)? {
            (FieldType::Bool, size, _) => self.bool_payload(size),
            _ => Err(Error::ExpectedBool),
        }
    }

    /// Iterate the entries of a map value at `cursor`, calling `entry`
    /// with each key and a cursor positioned at its value. `mismatch`
    /// is returned for a non-map value; struct tops and map fields
    /// report different errors.
    pub fn read_map_entries<F>(
        &self,
        cursor: &mut usize,
        mismatch: Error,
        mut entry: F,
    ) -> Result<()>
    where
        F: FnMut(&'a str, &mut usize) -> Result<()>,
    {
        let (field_type, count, site) = self.resolve(cursor)?;
        if field_type != FieldType::Map {
            return Err(mismatch);
        }
        let mut at;
        let cur: &mut usize = match site {
            Some(jumped) => {
                at = jumped;
                &mut at
            }
            None => cursor,
        };
        for _ in 0..count {
            let key = self.read_str(cur)?;
            entry(key, cur)?;
        }
        Ok(())
    }

    /// Iterate the items of an array value at `cursor`, calling `item`
    /// with a cursor positioned at each element.
    pub fn read_array_items<F>(
        &self,
        cursor: &mut usize,
        mismatch: Error,
        mut item: F,
    ) -> Result<()>
    where
        F: FnMut(&mut usize) -> Result<()>,
    {
        let (field_type, count, site) = self.resolve(cursor)?;
        if field_type != FieldType::Array {
            return Err(mismatch);
        }
        let mut at;
        let cur: &mut usize = match site {
            Some(jumped) => {
                at = jumped;
                &mut at
            }
            None => cursor,
        };
        for _ in 0..count {
            item(cur)?;
        }
        Ok(())
    }

    /// Advance past one value without materializing it. Bool consumes
    /// nothing beyond its control byte; maps and arrays skip their
    /// children recursively; pointers consume only the pointer bytes.
    pub fn skip_value(&self, cursor: &mut usize) -> Result<()> {
        let (field_type, size) = self.control(cursor)?;
        match field_type {
            FieldType::Pointer => {
                self.pointer_target(cursor, size)?;
                Ok(())
            }
            FieldType::Bool => Ok(()),
            FieldType::Map => {
                for _ in 0..size {
                    self.skip_value(cursor)?;
                    self.skip_value(cursor)?;
                }
                Ok(())
            }
            FieldType::Array => {
                for _ in 0..size {
                    self.skip_value(cursor)?;
                }
                Ok(())
            }
            _ => {
                self.take(cursor, size)?;
                Ok(())
            }
        }
    }

    /// Read one value of any type as a dynamic [`Value`].
    pub fn read_value(&self, cursor: &mut usize) -> Result<Value<'a>> {
        match self.resolve(cursor)? {
            (field_type, size, None) => self.value_payload(cursor, field_type, size),
            (field_type, size, Some(mut at)) => self.value_payload(&mut at, field_type, size),
        }
    }

    /// Dynamic read with a top-level key filter: map entries whose key
    /// is not in `names` are skipped, everything nested decodes fully.
    pub(crate) fn read_value_filtered(
        &self,
        cursor: &mut usize,
        names: &[&str],
    ) -> Result<Value<'a>> {
        let (field_type, size, site) = self.resolve(cursor)?;
        let mut at;
        let cur: &mut usize = match site {
            Some(jumped) => {
                at = jumped;
                &mut at
            }
            None => cursor,
        };
        if field_type != FieldType::Map {
            return self.value_payload(cur, field_type, size);
        }
        let mut entries = Vec::with_capacity(names.len().min(size));
        for _ in 0..size {
            let key = self.read_str(cur)?;
            if names.contains(&key) {
                entries.push((key, self.read_value(cur)?));
            } else {
                self.skip_value(cur)?;
            }
        }
        Ok(Value::Map(Map(entries)))
    }

    fn value_payload(
        &self,
        cursor: &mut usize,
        field_type: FieldType,
        size: usize,
    ) -> Result<Value<'a>> {
        match field_type {
            FieldType::String => Ok(Value::String(self.str_payload(cursor, size)?)),
            FieldType::Bytes => Ok(Value::Bytes(self.take(cursor, size)?)),
            FieldType::Double => Ok(Value::Double(self.f64_payload(cursor, size)?)),
            FieldType::Float => Ok(Value::Float(self.f32_payload(cursor, size)?)),
            FieldType::Uint16 => Ok(Value::Uint16(self.uint_payload(cursor, size, 2)? as u16)),
            FieldType::Uint32 => Ok(Value::Uint32(self.uint_payload(cursor, size, 4)? as u32)),
            FieldType::Int32 => Ok(Value::Int32(
                self.uint_payload(cursor, size, 4)? as u32 as i32,
            )),
            FieldType::Uint64 => Ok(Value::Uint64(self.uint_payload(cursor, size, 8)?)),
            FieldType::Uint128 => Ok(Value::Uint128(self.u128_payload(cursor, size)?)),
            FieldType::Bool => Ok(Value::Bool(self.bool_payload(size)?)),
            FieldType::Array => {
                let mut items = Vec::with_capacity(size.min(256));
                for _ in 0..size {
                    items.push(self.read_value(cursor)?);
                }
                Ok(Value::Array(items))
            }
            FieldType::Map => {
                let mut entries = Vec::with_capacity(size.min(256));
                for _ in 0..size {
                    let key = self.read_str(cursor)?;
                    entries.push((key, self.read_value(cursor)?));
                }
                Ok(Value::Map(Map(entries)))
            }
            FieldType::Container | FieldType::Marker | FieldType::Pointer => {
                Err(Error::UnsupportedFieldType(field_type.code()))
            }
        }
    }
}
