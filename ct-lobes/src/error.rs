//! 运行时错误.

use std::fmt;

use ndarray::ShapeError;
use ndarray_npy::WriteNpzError;

use crate::DType;

/// 解码或变换单个样本时的运行时错误. 出错的样本应被整体丢弃.
#[derive(Debug)]
pub enum FeatureError {
    /// 特征字典中缺少必需的键.
    MissingKey(String),

    /// 该键需要原始字节才能解码, 但其值已经不是字节.
    NotBytes(String),

    /// 键对应的值类型不符合预期. 第二个参数描述期望的类型.
    UnexpectedValue(String, &'static str),

    /// 形状元信息不是合法的非负整数.
    InvalidDim(String, i64),

    /// 字节长度不是元素宽度的整数倍.
    ByteLength {
        /// 字节长度.
        len: usize,
        /// 目标元素类型.
        dtype: DType,
    },

    /// 元素个数与目标形状不一致.
    ElementCount {
        /// 目标形状.
        shape: Vec<usize>,
        /// 实际元素个数.
        actual: usize,
    },

    /// 张量维数不符合要求.
    Rank {
        /// 键名.
        key: String,
        /// 允许的维数描述.
        expected: &'static str,
        /// 实际维数.
        actual: usize,
    },

    /// 通道数不足.
    ///
    /// 第二个参数是至少需要的通道数, 第三个参数是实际通道数.
    TooFewChannels(String, usize, usize),

    /// 体素分辨率非正或非有限值.
    InvalidSpacing(f32),

    /// 变换参数不合法.
    InvalidConfig(String),

    /// 卷积核比 (补零后的) 输入还大.
    KernelTooLarge {
        /// 卷积核 (高, 宽).
        kernel: (usize, usize),
        /// 输入 (高, 宽).
        input: (usize, usize),
    },

    /// 底层 `ndarray` 形状错误, 如拼接时形状不一致.
    Shape(ShapeError),

    /// 底层 I/O 错误.
    Io(std::io::Error),

    /// 写 npz 文件错误.
    WriteNpz(WriteNpzError),
}

impl fmt::Display for FeatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKey(key) => write!(f, "特征中缺少键 `{key}`"),
            Self::NotBytes(key) => write!(f, "键 `{key}` 的值不是待解码的原始字节"),
            Self::UnexpectedValue(key, expected) => {
                write!(f, "键 `{key}` 的值类型错误, 期望 {expected}")
            }
            Self::InvalidDim(key, v) => write!(f, "键 `{key}` 的形状值 {v} 不合法"),
            Self::ByteLength { len, dtype } => write!(
                f,
                "{len} 字节无法解码为 {dtype} (元素宽度 {})",
                dtype.size_of()
            ),
            Self::ElementCount { shape, actual } => {
                write!(f, "无法将 {actual} 个元素变形为 {shape:?}")
            }
            Self::Rank {
                key,
                expected,
                actual,
            } => write!(f, "键 `{key}` 的维数为 {actual}, 期望 {expected}"),
            Self::TooFewChannels(key, need, actual) => {
                write!(f, "键 `{key}` 只有 {actual} 个通道, 至少需要 {need} 个")
            }
            Self::InvalidSpacing(s) => write!(f, "体素分辨率 {s} 不合法"),
            Self::InvalidConfig(msg) => write!(f, "参数不合法: {msg}"),
            Self::KernelTooLarge { kernel, input } => {
                write!(f, "卷积核 {kernel:?} 大于输入 {input:?}")
            }
            Self::Shape(e) => write!(f, "形状错误: {e}"),
            Self::Io(e) => write!(f, "I/O 错误: {e}"),
            Self::WriteNpz(e) => write!(f, "写 npz 错误: {e}"),
        }
    }
}

impl std::error::Error for FeatureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Shape(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::WriteNpz(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for FeatureError {
    #[inline]
    fn from(e: ShapeError) -> Self {
        Self::Shape(e)
    }
}

impl From<std::io::Error> for FeatureError {
    #[inline]
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<WriteNpzError> for FeatureError {
    #[inline]
    fn from(e: WriteNpzError) -> Self {
        Self::WriteNpz(e)
    }
}
