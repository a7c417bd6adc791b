// This module defines host-side values: PrimitiveType (the element types understood by the
// front-ends, code generator and runtime), Shape (element type plus dimensions) and Literal (a
// shape plus typed element storage). Literals are what callers build arguments from and what
// device buffers materialize into. The NativeType trait maps Rust scalar types onto primitive
// types so literals can be built and read generically. Literals also own the byte codec used
// for host/device transfers: elements are stored little-endian at their natural width and
// predicates as one byte each. Display follows the familiar "s32[2] {1, 2}" notation.

//! Host literals, shapes and element types.

use super::error::{Error, Result};
use std::fmt;

/// Largest array a literal may hold, in bytes.
pub const MAX_LITERAL_BYTES: usize = 1 << 31;

/// Element type of an array value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Pred,
    S32,
    S64,
    F32,
    F64,
}

impl PrimitiveType {
    /// Size of one element in device memory.
    pub const fn byte_width(self) -> usize {
        match self {
            PrimitiveType::Pred => 1,
            PrimitiveType::S32 | PrimitiveType::F32 => 4,
            PrimitiveType::S64 | PrimitiveType::F64 => 8,
        }
    }

    /// Graph IR spelling (`s32`, `pred`, ...).
    pub const fn name(self) -> &'static str {
        match self {
            PrimitiveType::Pred => "pred",
            PrimitiveType::S32 => "s32",
            PrimitiveType::S64 => "s64",
            PrimitiveType::F32 => "f32",
            PrimitiveType::F64 => "f64",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pred" => Some(PrimitiveType::Pred),
            "s32" => Some(PrimitiveType::S32),
            "s64" => Some(PrimitiveType::S64),
            "f32" => Some(PrimitiveType::F32),
            "f64" => Some(PrimitiveType::F64),
            _ => None,
        }
    }

    /// Structured IR spelling (`i1`, `i32`, `f32`, ...).
    pub fn from_mlir_name(name: &str) -> Option<Self> {
        match name {
            "i1" => Some(PrimitiveType::Pred),
            "i32" => Some(PrimitiveType::S32),
            "i64" => Some(PrimitiveType::S64),
            "f32" => Some(PrimitiveType::F32),
            "f64" => Some(PrimitiveType::F64),
            _ => None,
        }
    }

    pub const fn is_integral(self) -> bool {
        matches!(self, PrimitiveType::S32 | PrimitiveType::S64)
    }

    pub const fn is_floating_point(self) -> bool {
        matches!(self, PrimitiveType::F32 | PrimitiveType::F64)
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Array shape: element type and dimensions. Rank 0 is a scalar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    element_type: PrimitiveType,
    dims: Vec<i64>,
}

impl Shape {
    pub fn new(element_type: PrimitiveType, dims: impl Into<Vec<i64>>) -> Self {
        Self {
            element_type,
            dims: dims.into(),
        }
    }

    pub fn scalar(element_type: PrimitiveType) -> Self {
        Self::new(element_type, Vec::new())
    }

    pub fn element_type(&self) -> PrimitiveType {
        self.element_type
    }

    pub fn dims(&self) -> &[i64] {
        &self.dims
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    /// Number of elements; saturates instead of overflowing, and negative dimensions count as 0.
    pub fn element_count(&self) -> usize {
        self.dims
            .iter()
            .fold(1usize, |acc, &d| acc.saturating_mul(usize::try_from(d).unwrap_or(0)))
    }

    pub fn byte_size(&self) -> usize {
        self.element_count().saturating_mul(self.element_type.byte_width())
    }

    /// Byte size, or `None` if a dimension is negative or the size overflows `usize`.
    pub fn checked_byte_size(&self) -> Option<usize> {
        self.dims
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(usize::try_from(d).ok()?))?
            .checked_mul(self.element_type.byte_width())
    }

    /// Byte size if an array of this shape may be materialized as a literal.
    pub fn literal_byte_size(&self) -> Option<usize> {
        self.checked_byte_size().filter(|&size| size <= MAX_LITERAL_BYTES)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.element_type)?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

/// Typed element storage of a [`Literal`].
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralData {
    Pred(Vec<bool>),
    S32(Vec<i32>),
    S64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl LiteralData {
    pub fn element_type(&self) -> PrimitiveType {
        match self {
            LiteralData::Pred(_) => PrimitiveType::Pred,
            LiteralData::S32(_) => PrimitiveType::S32,
            LiteralData::S64(_) => PrimitiveType::S64,
            LiteralData::F32(_) => PrimitiveType::F32,
            LiteralData::F64(_) => PrimitiveType::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            LiteralData::Pred(v) => v.len(),
            LiteralData::S32(v) => v.len(),
            LiteralData::S64(v) => v.len(),
            LiteralData::F32(v) => v.len(),
            LiteralData::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Rust scalar types that map onto a [`PrimitiveType`].
pub trait NativeType: Copy + PartialEq + fmt::Debug + sealed::Sealed + 'static {
    const PRIMITIVE_TYPE: PrimitiveType;

    fn into_data(values: Vec<Self>) -> LiteralData;

    fn slice(data: &LiteralData) -> Option<&[Self]>;
}

macro_rules! native_type {
    ($ty:ty, $variant:ident) => {
        impl sealed::Sealed for $ty {}

        impl NativeType for $ty {
            const PRIMITIVE_TYPE: PrimitiveType = PrimitiveType::$variant;

            fn into_data(values: Vec<Self>) -> LiteralData {
                LiteralData::$variant(values)
            }

            fn slice(data: &LiteralData) -> Option<&[Self]> {
                match data {
                    LiteralData::$variant(values) => Some(values),
                    _ => None,
                }
            }
        }
    };
}

native_type!(bool, Pred);
native_type!(i32, S32);
native_type!(i64, S64);
native_type!(f32, F32);
native_type!(f64, F64);

/// A host-resident array value.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    shape: Shape,
    data: LiteralData,
}

impl Literal {
    /// Build a literal, checking that `data` matches `shape`.
    pub fn new(shape: Shape, data: LiteralData) -> Result<Self> {
        if shape.element_type() != data.element_type() {
            return Err(Error::invalid_argument(format!(
                "literal data of type {} does not match shape {}",
                data.element_type(),
                shape
            )));
        }
        if shape.element_count() != data.len() {
            return Err(Error::invalid_argument(format!(
                "shape {} holds {} elements but {} were supplied",
                shape,
                shape.element_count(),
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn scalar<T: NativeType>(value: T) -> Self {
        Self {
            shape: Shape::scalar(T::PRIMITIVE_TYPE),
            data: T::into_data(vec![value]),
        }
    }

    pub fn vec1<T: NativeType>(values: &[T]) -> Self {
        Self {
            shape: Shape::new(T::PRIMITIVE_TYPE, vec![values.len() as i64]),
            data: T::into_data(values.to_vec()),
        }
    }

    pub fn from_vec<T: NativeType>(dims: &[i64], values: Vec<T>) -> Result<Self> {
        Self::new(Shape::new(T::PRIMITIVE_TYPE, dims.to_vec()), T::into_data(values))
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn data(&self) -> &LiteralData {
        &self.data
    }

    pub fn element_count(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice<T: NativeType>(&self) -> Option<&[T]> {
        T::slice(&self.data)
    }

    pub fn to_vec<T: NativeType>(&self) -> Result<Vec<T>> {
        self.as_slice::<T>().map(<[T]>::to_vec).ok_or_else(|| {
            Error::invalid_argument(format!(
                "literal of shape {} read as {}",
                self.shape,
                T::PRIMITIVE_TYPE
            ))
        })
    }

    pub fn get_first_element<T: NativeType>(&self) -> Result<T> {
        self.to_vec::<T>()?
            .first()
            .copied()
            .ok_or_else(|| Error::invalid_argument(format!("literal of shape {} is empty", self.shape)))
    }

    /// Reinterpret the same elements under new dimensions.
    pub fn reshape(&self, dims: &[i64]) -> Result<Self> {
        Self::new(Shape::new(self.shape.element_type(), dims.to_vec()), self.data.clone())
    }

    /// Little-endian device encoding of the elements.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.shape.byte_size());
        match &self.data {
            LiteralData::Pred(v) => out.extend(v.iter().map(|&b| b as u8)),
            LiteralData::S32(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            LiteralData::S64(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            LiteralData::F32(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            LiteralData::F64(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
        }
        out
    }

    /// Decode a device encoding produced by [`Literal::to_bytes`].
    pub fn from_bytes(shape: &Shape, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != shape.byte_size() {
            return Err(Error::transfer(format!(
                "expected {} bytes for shape {} but device holds {}",
                shape.byte_size(),
                shape,
                bytes.len()
            )));
        }

        let width = shape.element_type().byte_width();
        let chunks = bytes.chunks_exact(width);
        let data = match shape.element_type() {
            PrimitiveType::Pred => LiteralData::Pred(bytes.iter().map(|&b| b != 0).collect()),
            PrimitiveType::S32 => LiteralData::S32(
                chunks.map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect(),
            ),
            PrimitiveType::F32 => LiteralData::F32(
                chunks.map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect(),
            ),
            PrimitiveType::S64 => LiteralData::S64(chunks.map(|c| i64::from_le_bytes(le8(c))).collect()),
            PrimitiveType::F64 => LiteralData::F64(chunks.map(|c| f64::from_le_bytes(le8(c))).collect()),
        };

        Ok(Self {
            shape: shape.clone(),
            data,
        })
    }
}

fn le8(chunk: &[u8]) -> [u8; 8] {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(chunk);
    raw
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, values: &[T], scalar: bool) -> fmt::Result {
            if scalar {
                return write!(f, "{}", values[0]);
            }
            write!(f, "{{")?;
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", v)?;
            }
            write!(f, "}}")
        }

        write!(f, "{} ", self.shape)?;
        let scalar = self.shape.is_scalar() && self.data.len() == 1;
        match &self.data {
            LiteralData::Pred(v) => list(f, v, scalar),
            LiteralData::S32(v) => list(f, v, scalar),
            LiteralData::S64(v) => list(f, v, scalar),
            LiteralData::F32(v) => list(f, v, scalar),
            LiteralData::F64(v) => list(f, v, scalar),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_literal() {
        let lit = Literal::scalar(2i32);
        assert!(lit.shape().is_scalar());
        assert_eq!(lit.get_first_element::<i32>().unwrap(), 2);
        assert_eq!(lit.to_string(), "s32[] 2");
    }

    #[test]
    fn test_vector_display() {
        let lit = Literal::vec1(&[1i64, 2, 3]);
        assert_eq!(lit.to_string(), "s64[3] {1, 2, 3}");
    }

    #[test]
    fn test_new_rejects_mismatched_count() {
        let err = Literal::from_vec(&[2, 2], vec![1i32, 2, 3]).unwrap_err();
        assert_eq!(err.kind(), crate::core::ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_byte_codec() {
        let lit = Literal::from_vec(&[2], vec![-1i32, 258]).unwrap();
        let bytes = lit.to_bytes();
        assert_eq!(bytes, vec![0xff, 0xff, 0xff, 0xff, 0x02, 0x01, 0x00, 0x00]);
        assert_eq!(Literal::from_bytes(lit.shape(), &bytes).unwrap(), lit);

        let preds = Literal::vec1(&[true, false]);
        assert_eq!(preds.to_bytes(), vec![1, 0]);
    }

    #[test]
    fn test_from_bytes_size_mismatch_is_transfer_error() {
        let shape = Shape::scalar(PrimitiveType::S64);
        let err = Literal::from_bytes(&shape, &[0u8; 4]).unwrap_err();
        assert_eq!(err.kind(), crate::core::ErrorKind::TransferFailure);
    }

    #[test]
    fn test_shape_sizes_do_not_overflow() {
        let huge = Shape::new(PrimitiveType::S32, vec![1i64 << 32, 1 << 32]);
        assert_eq!(huge.checked_byte_size(), None);
        assert_eq!(huge.element_count(), usize::MAX);
        assert_eq!(huge.byte_size(), usize::MAX);

        let negative = Shape::new(PrimitiveType::S32, vec![-3i64]);
        assert_eq!(negative.checked_byte_size(), None);
        assert_eq!(negative.element_count(), 0);

        let large = Shape::new(PrimitiveType::S32, vec![100_000_000_000i64]);
        assert_eq!(large.checked_byte_size(), Some(400_000_000_000));
        assert_eq!(large.literal_byte_size(), None);
        assert_eq!(Shape::new(PrimitiveType::F64, vec![2, 3]).literal_byte_size(), Some(48));
    }

    #[test]
    fn test_wrong_type_read() {
        let lit = Literal::scalar(1.5f32);
        assert!(lit.to_vec::<i32>().is_err());
        assert_eq!(lit.as_slice::<f32>(), Some(&[1.5f32][..]));
    }
}
