//! Typed, shaped views over wire array payloads
//!
//! A [`DecodedArray`] shares the payload's byte buffer and interprets it
//! according to the dtype on every access, so decoding never copies the
//! element data. Elements are read in row-major order and widened to `f64`.

use beamplot_shared::{ByteOrder, DType, DecodeError, Domain, ElementType, RawArrayPayload};
use bytes::{Bytes, BytesMut};

/// Upper bounds applied while decoding untrusted payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    pub max_array_bytes: usize,
    pub max_rank: usize,
}

impl DecodeLimits {
    pub const DEFAULT_MAX_ARRAY_BYTES: usize = 256 * 1024 * 1024;
    pub const DEFAULT_MAX_RANK: usize = 3;

    pub fn unbounded() -> Self {
        Self {
            max_array_bytes: usize::MAX,
            max_rank: usize::MAX,
        }
    }
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_array_bytes: Self::DEFAULT_MAX_ARRAY_BYTES,
            max_rank: Self::DEFAULT_MAX_RANK,
        }
    }
}

/// Read-only n-dimensional view over a decoded payload
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedArray {
    dtype: DType,
    shape: Vec<usize>,
    /// Row-major strides in elements
    strides: Vec<usize>,
    len: usize,
    data: Bytes,
}

fn row_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for k in (0..shape.len().saturating_sub(1)).rev() {
        strides[k] = strides[k + 1] * shape[k + 1];
    }
    strides
}

impl DecodedArray {
    /// Decode without size limits
    pub fn decode(payload: &RawArrayPayload) -> Result<Self, DecodeError> {
        Self::decode_with(payload, &DecodeLimits::unbounded())
    }

    /// Decode, failing on anything that violates the payload invariants or
    /// exceeds `limits`
    pub fn decode_with(payload: &RawArrayPayload, limits: &DecodeLimits) -> Result<Self, DecodeError> {
        let dtype = payload.validate()?;
        if payload.shape.len() > limits.max_rank {
            return Err(DecodeError::RankMismatch {
                expected: format!("at most {}", limits.max_rank),
                shape: payload.shape.clone(),
            });
        }
        if payload.data.len() > limits.max_array_bytes {
            return Err(DecodeError::TooLarge {
                bytes: payload.data.len(),
                limit: limits.max_array_bytes,
            });
        }

        let len = payload.element_count()?;
        Ok(Self {
            dtype,
            strides: row_major_strides(&payload.shape),
            shape: payload.shape.clone(),
            len,
            data: payload.data.clone(),
        })
    }

    /// One-dimensional `<f8` array over `values`
    pub fn from_f64(values: &[f64]) -> Self {
        let mut data = BytesMut::with_capacity(values.len() * 8);
        for value in values {
            data.extend_from_slice(&value.to_le_bytes());
        }
        Self {
            dtype: DType::little(ElementType::Float64),
            shape: vec![values.len()],
            strides: vec![1],
            len: values.len(),
            data: data.freeze(),
        }
    }

    /// Indices `start..end` as a one-dimensional `<f8` array
    pub fn indices(start: usize, end: usize) -> Self {
        let values: Vec<f64> = (start..end).map(|i| i as f64).collect();
        Self::from_f64(&values)
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Total element count; a rank-0 array holds one element
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Raw element bytes, laid out as the payload sent them
    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }

    /// Flat element offset of a multi-index
    pub fn offset(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut offset = 0;
        for ((&i, &dim), &stride) in index.iter().zip(&self.shape).zip(&self.strides) {
            if i >= dim {
                return None;
            }
            offset += i * stride;
        }
        Some(offset)
    }

    /// Element at a multi-index, `None` when any index is out of range
    pub fn get(&self, index: &[usize]) -> Option<f64> {
        self.offset(index).map(|offset| self.read(offset))
    }

    /// Element at a flat row-major position
    pub fn get_flat(&self, offset: usize) -> Option<f64> {
        (offset < self.len).then(|| self.read(offset))
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.len).map(move |offset| self.read(offset))
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.iter().collect()
    }

    /// NaN-ignoring extent; `None` when there is no non-NaN element
    pub fn min_max(&self) -> Option<Domain> {
        self.iter()
            .filter(|v| !v.is_nan())
            .fold(None, |acc: Option<Domain>, v| match acc {
                None => Some(Domain::new(v, v)),
                Some(d) => Some(Domain::new(d.min().min(v), d.max().max(v))),
            })
    }

    /// Re-encode with the same dtype and shape
    pub fn to_payload(&self) -> RawArrayPayload {
        RawArrayPayload::new(self.dtype, self.shape.clone(), self.data.clone())
    }

    /// Join along the first axis
    ///
    /// Trailing dimensions must agree. The dtype is kept when both sides
    /// share it, otherwise the result is widened to `<f8`.
    pub fn concat(&self, other: &DecodedArray) -> Result<DecodedArray, DecodeError> {
        if self.rank() == 0 || self.rank() != other.rank() || self.shape[1..] != other.shape[1..] {
            return Err(DecodeError::RankMismatch {
                expected: format!("trailing shape {:?}", self.shape.get(1..).unwrap_or(&[])),
                shape: other.shape.clone(),
            });
        }

        let mut shape = self.shape.clone();
        shape[0] += other.shape[0];

        let data = if self.dtype == other.dtype {
            let mut data = BytesMut::with_capacity(self.data.len() + other.data.len());
            data.extend_from_slice(&self.data);
            data.extend_from_slice(&other.data);
            data.freeze()
        } else {
            let mut data = BytesMut::with_capacity((self.len + other.len) * 8);
            for value in self.iter().chain(other.iter()) {
                data.extend_from_slice(&value.to_le_bytes());
            }
            data.freeze()
        };
        let dtype = if self.dtype == other.dtype {
            self.dtype
        } else {
            DType::little(ElementType::Float64)
        };

        Ok(DecodedArray {
            dtype,
            strides: row_major_strides(&shape),
            len: self.len + other.len,
            shape,
            data,
        })
    }

    /// Drop the first `count` rows along the first axis without copying
    pub fn skip_rows(&self, count: usize) -> DecodedArray {
        let rows = self.shape.first().copied().unwrap_or(0);
        let count = count.min(rows);
        let row_len = if rows == 0 { 0 } else { self.len / rows };
        let mut shape = self.shape.clone();
        if let Some(first) = shape.first_mut() {
            *first -= count;
        }
        let start = count * row_len * self.dtype.byte_size();
        DecodedArray {
            dtype: self.dtype,
            strides: row_major_strides(&shape),
            len: self.len - count * row_len,
            shape,
            data: self.data.slice(start..),
        }
    }

    fn read(&self, offset: usize) -> f64 {
        let size = self.dtype.byte_size();
        let bytes = &self.data[offset * size..(offset + 1) * size];
        let order = self.dtype.order;

        macro_rules! read_as {
            ($ty:ty) => {{
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                buf.copy_from_slice(bytes);
                match order {
                    ByteOrder::Little => <$ty>::from_le_bytes(buf) as f64,
                    ByteOrder::Big => <$ty>::from_be_bytes(buf) as f64,
                }
            }};
        }

        match self.dtype.element {
            ElementType::Int8 => read_as!(i8),
            ElementType::UInt8 => read_as!(u8),
            ElementType::Int16 => read_as!(i16),
            ElementType::UInt16 => read_as!(u16),
            ElementType::Int32 => read_as!(i32),
            ElementType::UInt32 => read_as!(u32),
            ElementType::Int64 => read_as!(i64),
            ElementType::UInt64 => read_as!(u64),
            ElementType::Float32 => read_as!(f32),
            ElementType::Float64 => read_as!(f64),
        }
    }
}
