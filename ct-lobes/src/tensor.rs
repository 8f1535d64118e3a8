//! 动态维数的类型化张量.
//!
//! 上游记录文件中的每个特征要么是待解码的原始字节, 要么是已解码的数值数组.
//! 后者用 [`Tensor`] 表示: 每种元素类型对应一个变体, 底层均为 `ArrayD<T>`.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, ArrayD, IxDyn};
use num::traits::AsPrimitive;
use ordered_float::NotNan;

use crate::error::FeatureError;
use crate::FeatureResult;

/// 张量元素类型.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DType {
    /// `f32`, 记录文件中写作 `float` 或 `float32`.
    Float32,

    /// `f64`, 记录文件中写作 `double` 或 `float64`.
    Float64,

    /// `i8`.
    Int8,

    /// `u8`.
    UInt8,

    /// `i16`.
    Int16,

    /// `u16`.
    UInt16,

    /// `i32`.
    Int32,

    /// `i64`.
    Int64,
}

impl DType {
    /// 单个元素的字节宽度.
    #[inline]
    pub const fn size_of(&self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Float32 | Self::Int32 => 4,
            Self::Float64 | Self::Int64 => 8,
        }
    }

    /// 是否为浮点类型.
    #[inline]
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Int8 => "int8",
            Self::UInt8 => "uint8",
            Self::Int16 => "int16",
            Self::UInt16 => "uint16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
        };
        f.write_str(name)
    }
}

impl FromStr for DType {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "float" | "float32" => Ok(Self::Float32),
            "double" | "float64" => Ok(Self::Float64),
            "int8" => Ok(Self::Int8),
            "uint8" => Ok(Self::UInt8),
            "int16" => Ok(Self::Int16),
            "uint16" => Ok(Self::UInt16),
            "int32" => Ok(Self::Int32),
            "int64" => Ok(Self::Int64),
            _ => Err(FeatureError::InvalidConfig(format!("未知元素类型 `{s}`"))),
        }
    }
}

/// 已解码的张量.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Tensor {
    /// `f32` 张量.
    F32(ArrayD<f32>),

    /// `f64` 张量.
    F64(ArrayD<f64>),

    /// `i8` 张量.
    I8(ArrayD<i8>),

    /// `u8` 张量.
    U8(ArrayD<u8>),

    /// `i16` 张量.
    I16(ArrayD<i16>),

    /// `u16` 张量.
    U16(ArrayD<u16>),

    /// `i32` 张量.
    I32(ArrayD<i32>),

    /// `i64` 张量.
    I64(ArrayD<i64>),
}

/// 对 [`Tensor`] 的每个变体执行同一段代码, 变体内部数组绑定为 `$a`.
macro_rules! with_array {
    ($tensor: expr, $a: ident => $body: expr) => {
        match $tensor {
            $crate::Tensor::F32($a) => $body,
            $crate::Tensor::F64($a) => $body,
            $crate::Tensor::I8($a) => $body,
            $crate::Tensor::U8($a) => $body,
            $crate::Tensor::I16($a) => $body,
            $crate::Tensor::U16($a) => $body,
            $crate::Tensor::I32($a) => $body,
            $crate::Tensor::I64($a) => $body,
        }
    };
}

/// 与 [`with_array`] 类似, 但把结果包回同一变体 (元素类型不变).
macro_rules! map_array {
    ($tensor: expr, $a: ident => $body: expr) => {
        match $tensor {
            $crate::Tensor::F32($a) => $crate::Tensor::F32($body),
            $crate::Tensor::F64($a) => $crate::Tensor::F64($body),
            $crate::Tensor::I8($a) => $crate::Tensor::I8($body),
            $crate::Tensor::U8($a) => $crate::Tensor::U8($body),
            $crate::Tensor::I16($a) => $crate::Tensor::I16($body),
            $crate::Tensor::U16($a) => $crate::Tensor::U16($body),
            $crate::Tensor::I32($a) => $crate::Tensor::I32($body),
            $crate::Tensor::I64($a) => $crate::Tensor::I64($body),
        }
    };
}

pub(crate) use map_array;
pub(crate) use with_array;

macro_rules! impl_from_array {
    ($t: ty, $variant: ident) => {
        impl From<ArrayD<$t>> for Tensor {
            #[inline]
            fn from(a: ArrayD<$t>) -> Self {
                Self::$variant(a)
            }
        }
    };
}

impl_from_array!(f32, F32);
impl_from_array!(f64, F64);
impl_from_array!(i8, I8);
impl_from_array!(u8, U8);
impl_from_array!(i16, I16);
impl_from_array!(u16, U16);
impl_from_array!(i32, I32);
impl_from_array!(i64, I64);

/// 按小端序把字节解码为一维 `$t` 数组. 调用方保证字节长度是元素宽度的整数倍.
macro_rules! decode_le {
    ($bytes: expr, $t: ty) => {{
        const WIDTH: usize = std::mem::size_of::<$t>();
        let v: Vec<$t> = $bytes
            .chunks_exact(WIDTH)
            .map(|c| {
                let mut buf = [0u8; WIDTH];
                buf.copy_from_slice(c);
                <$t>::from_le_bytes(buf)
            })
            .collect();
        Array1::from_vec(v).into_dyn()
    }};
}

impl Tensor {
    /// 把小端序原始字节解码为 `dtype` 类型的一维张量.
    ///
    /// 若字节长度不是元素宽度的整数倍, 返回 `Err`.
    pub fn decode_raw(bytes: &[u8], dtype: DType) -> FeatureResult<Self> {
        if bytes.len() % dtype.size_of() != 0 {
            return Err(FeatureError::ByteLength {
                len: bytes.len(),
                dtype,
            });
        }
        let t = match dtype {
            DType::Float32 => Self::F32(decode_le!(bytes, f32)),
            DType::Float64 => Self::F64(decode_le!(bytes, f64)),
            DType::Int8 => Self::I8(decode_le!(bytes, i8)),
            DType::UInt8 => Self::U8(decode_le!(bytes, u8)),
            DType::Int16 => Self::I16(decode_le!(bytes, i16)),
            DType::UInt16 => Self::U16(decode_le!(bytes, u16)),
            DType::Int32 => Self::I32(decode_le!(bytes, i32)),
            DType::Int64 => Self::I64(decode_le!(bytes, i64)),
        };
        Ok(t)
    }

    /// 元素类型.
    pub fn dtype(&self) -> DType {
        match self {
            Self::F32(_) => DType::Float32,
            Self::F64(_) => DType::Float64,
            Self::I8(_) => DType::Int8,
            Self::U8(_) => DType::UInt8,
            Self::I16(_) => DType::Int16,
            Self::U16(_) => DType::UInt16,
            Self::I32(_) => DType::Int32,
            Self::I64(_) => DType::Int64,
        }
    }

    /// 形状.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        with_array!(self, a => a.shape())
    }

    /// 维数.
    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// 元素个数.
    #[inline]
    pub fn len(&self) -> usize {
        with_array!(self, a => a.len())
    }

    /// 是否不含任何元素.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 最后一维的长度, 即通道数. 零维张量返回 `None`.
    #[inline]
    pub fn channels(&self) -> Option<usize> {
        self.shape().last().copied()
    }

    /// 按行优先序将张量变形为 `shape`, 元素顺序与个数保持不变.
    ///
    /// 元素个数不一致时返回 `Err`.
    pub fn reshape(self, shape: &[usize]) -> FeatureResult<Self> {
        let expected: usize = shape.iter().product();
        if expected != self.len() {
            return Err(FeatureError::ElementCount {
                shape: shape.to_vec(),
                actual: self.len(),
            });
        }
        Ok(map_array!(self, a => reshape_array(a, shape)?))
    }

    /// 数值转换为 `f32` 张量. 整数转换遵循 `as` 语义.
    pub fn to_f32(&self) -> ArrayD<f32> {
        with_array!(self, a => a.mapv(|v| AsPrimitive::<f32>::as_(v)))
    }

    /// 若为 `f32` 张量, 返回其底层数组.
    #[inline]
    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            Self::F32(a) => Some(a),
            _ => None,
        }
    }

    /// 若张量恰好包含一个整数元素, 返回该值. 浮点张量返回 `None`.
    pub fn as_i64(&self) -> Option<i64> {
        if self.len() != 1 {
            return None;
        }
        match self {
            Self::I8(a) => a.iter().next().copied().map(i64::from),
            Self::U8(a) => a.iter().next().copied().map(i64::from),
            Self::I16(a) => a.iter().next().copied().map(i64::from),
            Self::U16(a) => a.iter().next().copied().map(i64::from),
            Self::I32(a) => a.iter().next().copied().map(i64::from),
            Self::I64(a) => a.iter().next().copied(),
            Self::F32(_) | Self::F64(_) => None,
        }
    }

    /// 最小元素值 (忽略 NaN). 空张量返回 `None`.
    pub fn min_value(&self) -> Option<f64> {
        with_array!(self, a => a
            .iter()
            .filter_map(|v| NotNan::new(AsPrimitive::<f64>::as_(*v)).ok())
            .min()
            .map(NotNan::into_inner))
    }
}

/// 按行优先序变形. 调用方已检查元素个数.
fn reshape_array<T: Clone>(a: ArrayD<T>, shape: &[usize]) -> FeatureResult<ArrayD<T>> {
    let a = if a.is_standard_layout() {
        a
    } else {
        a.as_standard_layout().into_owned()
    };
    Ok(ArrayD::from_shape_vec(IxDyn(shape), a.into_raw_vec())?)
}

#[cfg(test)]
mod tests {
    use super::{DType, Tensor};
    use crate::FeatureError;
    use ndarray::{ArrayD, IxDyn};

    fn le_bytes_f32(v: &[f32]) -> Vec<u8> {
        v.iter().flat_map(|x| x.to_le_bytes()).collect()
    }

    #[test]
    fn test_dtype_from_str() {
        assert_eq!("float".parse::<DType>().unwrap(), DType::Float32);
        assert_eq!("float32".parse::<DType>().unwrap(), DType::Float32);
        assert_eq!("double".parse::<DType>().unwrap(), DType::Float64);
        assert_eq!("int8".parse::<DType>().unwrap(), DType::Int8);
        assert!("complex64".parse::<DType>().is_err());
        assert_eq!(DType::Int16.size_of(), 2);
        assert_eq!(DType::Int64.to_string(), "int64");
    }

    #[test]
    fn test_decode_raw_little_endian() {
        let t = Tensor::decode_raw(&le_bytes_f32(&[1.5, -2.0, 3.25]), DType::Float32).unwrap();
        assert_eq!(t.dtype(), DType::Float32);
        assert_eq!(t.shape(), &[3]);
        assert_eq!(t.as_f32().unwrap().as_slice().unwrap(), &[1.5, -2.0, 3.25]);

        let t = Tensor::decode_raw(&[0x01, 0x02, 0xff, 0xff], DType::Int16).unwrap();
        match t {
            Tensor::I16(a) => assert_eq!(a.as_slice().unwrap(), &[0x0201, -1]),
            _ => panic!("unexpected dtype"),
        }

        let t = Tensor::decode_raw(&[0xfe, 0x03], DType::Int8).unwrap();
        assert_eq!(t.to_f32().as_slice().unwrap(), &[-2.0, 3.0]);
    }

    #[test]
    fn test_decode_raw_bad_length() {
        let e = Tensor::decode_raw(&[0u8; 7], DType::Float32).unwrap_err();
        assert!(matches!(
            e,
            FeatureError::ByteLength {
                len: 7,
                dtype: DType::Float32
            }
        ));
    }

    /// rows x cols x classes 的缓冲区变形后, 元素顺序与总数不变.
    #[test]
    fn test_reshape_preserves_order() {
        let (rows, cols, classes) = (3, 4, 2);
        let data: Vec<f32> = (0..rows * cols * classes).map(|v| v as f32).collect();
        let t = Tensor::decode_raw(&le_bytes_f32(&data), DType::Float32).unwrap();
        let t = t.reshape(&[rows, cols, classes]).unwrap();
        assert_eq!(t.shape(), &[rows, cols, classes]);
        assert_eq!(t.len(), rows * cols * classes);

        let a = t.as_f32().unwrap();
        assert_eq!(a[[0, 0, 1]], 1.0);
        assert_eq!(a[[0, 1, 0]], 2.0);
        assert_eq!(a[[1, 0, 0]], (cols * classes) as f32);
        assert_eq!(a[[2, 3, 1]], 23.0);
        let flat: Vec<f32> = a.iter().copied().collect();
        assert_eq!(flat, data);
    }

    #[test]
    fn test_reshape_count_mismatch() {
        let t = Tensor::from(ArrayD::<u8>::zeros(IxDyn(&[6])));
        let e = t.reshape(&[4, 2]).unwrap_err();
        assert!(matches!(e, FeatureError::ElementCount { actual: 6, .. }));
    }

    #[test]
    fn test_scalar_and_min() {
        let t = Tensor::from(ArrayD::from_elem(IxDyn(&[1]), 512i64));
        assert_eq!(t.as_i64(), Some(512));
        assert_eq!(Tensor::from(ArrayD::<f32>::zeros(IxDyn(&[1]))).as_i64(), None);
        assert_eq!(Tensor::from(ArrayD::<i32>::zeros(IxDyn(&[2]))).as_i64(), None);

        let t = Tensor::from(
            ArrayD::from_shape_vec(IxDyn(&[4]), vec![3.0f32, f32::NAN, -1024.0, 12.0]).unwrap(),
        );
        assert_eq!(t.min_value(), Some(-1024.0));
        assert_eq!(Tensor::from(ArrayD::<u8>::zeros(IxDyn(&[0]))).min_value(), None);
    }
}
