//! Wire representation of n-dimensional numeric arrays
//!
//! Arrays travel as `{ nd: true, dtype: "<f4", shape: [..], data: <bytes> }`
//! where `dtype` uses the NumPy type-string vocabulary: a byte-order marker
//! (`<` little, `>` big, `=` native, `|` not applicable) followed by a kind
//! letter and the element size in bytes.

use crate::errors::DecodeError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Numeric element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
}

impl ElementType {
    pub fn byte_size(&self) -> usize {
        match self {
            ElementType::Int8 | ElementType::UInt8 => 1,
            ElementType::Int16 | ElementType::UInt16 => 2,
            ElementType::Int32 | ElementType::UInt32 | ElementType::Float32 => 4,
            ElementType::Int64 | ElementType::UInt64 | ElementType::Float64 => 8,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Int8 => "i1",
            ElementType::UInt8 => "u1",
            ElementType::Int16 => "i2",
            ElementType::UInt16 => "u2",
            ElementType::Int32 => "i4",
            ElementType::UInt32 => "u4",
            ElementType::Int64 => "i8",
            ElementType::UInt64 => "u8",
            ElementType::Float32 => "f4",
            ElementType::Float64 => "f8",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        let element = match code {
            "i1" => ElementType::Int8,
            "u1" => ElementType::UInt8,
            "i2" => ElementType::Int16,
            "u2" => ElementType::UInt16,
            "i4" => ElementType::Int32,
            "u4" => ElementType::UInt32,
            "i8" => ElementType::Int64,
            "u8" => ElementType::UInt64,
            "f4" => ElementType::Float32,
            "f8" => ElementType::Float64,
            _ => return None,
        };
        Some(element)
    }
}

/// Byte order of multi-byte elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Little,
    Big,
}

/// Element type plus byte order, parsed from a wire dtype string
///
/// The marker the dtype was parsed with is written back unchanged; two
/// dtypes compare equal whenever element and byte order agree.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DType {
    pub element: ElementType,
    pub order: ByteOrder,
    marker: Option<char>,
}

impl PartialEq for DType {
    fn eq(&self, other: &Self) -> bool {
        self.element == other.element && self.order == other.order
    }
}

impl Eq for DType {}

impl Hash for DType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.element.hash(state);
        self.order.hash(state);
    }
}

impl DType {
    pub const fn new(element: ElementType, order: ByteOrder) -> Self {
        Self {
            element,
            order,
            marker: None,
        }
    }

    pub const fn little(element: ElementType) -> Self {
        Self::new(element, ByteOrder::Little)
    }

    pub fn byte_size(&self) -> usize {
        self.element.byte_size()
    }
}

impl FromStr for DType {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || DecodeError::UnknownDtype {
            dtype: s.to_string(),
        };

        let (marker, code) = match s.chars().next() {
            Some(c @ ('<' | '>' | '=' | '|')) => (Some(c), &s[1..]),
            _ => (None, s),
        };
        let element = ElementType::from_code(code).ok_or_else(unknown)?;

        let order = match marker {
            Some('>') => ByteOrder::Big,
            // '|' is only meaningful for single byte elements
            Some('|') if element.byte_size() != 1 => return Err(unknown()),
            _ => ByteOrder::Little,
        };

        Ok(Self {
            element,
            order,
            marker,
        })
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match (self.marker, self.element.byte_size(), self.order) {
            (Some(marker), _, _) => marker,
            (None, 1, _) => '|',
            (None, _, ByteOrder::Little) => '<',
            (None, _, ByteOrder::Big) => '>',
        };
        write!(f, "{}{}", marker, self.element.as_str())
    }
}

impl TryFrom<String> for DType {
    type Error = DecodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DType> for String {
    fn from(dtype: DType) -> Self {
        dtype.to_string()
    }
}

/// Rust scalar types that map onto a wire element type
pub trait NativeElement: Copy {
    const ELEMENT: ElementType;

    fn write_le(self, out: &mut Vec<u8>);
}

macro_rules! native_element {
    ($($ty:ty => $element:ident),* $(,)?) => {
        $(
            impl NativeElement for $ty {
                const ELEMENT: ElementType = ElementType::$element;

                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

native_element! {
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
}

/// One n-dimensional numeric array as transmitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawArrayPayload {
    pub nd: bool,
    /// Kept as the raw string so an unknown dtype is a decode error rather
    /// than a failure of the whole envelope
    pub dtype: String,
    pub shape: Vec<usize>,
    pub data: Bytes,
}

impl RawArrayPayload {
    pub fn new(dtype: DType, shape: Vec<usize>, data: impl Into<Bytes>) -> Self {
        Self {
            nd: true,
            dtype: dtype.to_string(),
            shape,
            data: data.into(),
        }
    }

    /// Encode native values as a little-endian payload
    pub fn from_slice<T: NativeElement>(values: &[T], shape: Vec<usize>) -> Self {
        let mut data = Vec::with_capacity(values.len() * T::ELEMENT.byte_size());
        for value in values {
            value.write_le(&mut data);
        }
        Self::new(DType::little(T::ELEMENT), shape, data)
    }

    /// One-dimensional payload over `values`
    pub fn from_vec<T: NativeElement>(values: &[T]) -> Self {
        Self::from_slice(values, vec![values.len()])
    }

    pub fn parsed_dtype(&self) -> Result<DType, DecodeError> {
        self.dtype.parse()
    }

    /// Product of the shape, checked for overflow
    pub fn element_count(&self) -> Result<usize, DecodeError> {
        self.shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
            .ok_or_else(|| DecodeError::ShapeOverflow {
                shape: self.shape.clone(),
            })
    }

    /// Check the payload invariants and return its dtype
    pub fn validate(&self) -> Result<DType, DecodeError> {
        if !self.nd {
            return Err(DecodeError::NotAnArray);
        }
        let dtype = self.parsed_dtype()?;
        let expected = self
            .element_count()?
            .checked_mul(dtype.byte_size())
            .ok_or_else(|| DecodeError::ShapeOverflow {
                shape: self.shape.clone(),
            })?;
        if self.data.len() != expected {
            return Err(DecodeError::LengthMismatch {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(dtype)
    }
}
