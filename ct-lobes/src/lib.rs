#![warn(missing_docs)] // <= 合适时移除它.

//! 放疗 / 肝段分割训练数据的特征字典变换.
//!
//! 上游的记录读取器为每个样本产出一个 [`FeatureMap`]: 键为特征名,
//! 值为原始字节, 整数元信息或已解码张量. 本 crate 提供一组作用于单个样本的变换,
//! 把它加工成训练流水线所需的形式:
//!
//! 1. [`DecodeImagesAnnotations`]: 按形状元信息把原始字节解码并变形为张量.
//!   同时兼容旧版记录格式 (见 [`DecodeStrategy`]).
//! 2. [`CombineLiverLobeSegments`]: 把肝段 5 ~ 8 的标注通道合并为一个.
//! 3. [`DiseaseMask`]: 生成前景掩膜, 可选地只保留病灶通道并抹去图像背景.
//! 4. [`CombineImageRtDose`]: 把图像, 标注, 剂量沿通道拼接.
//! 5. [`FuzzySegmentLiverLobes`]: 随机尺寸的盒式平滑, 产生模糊 (软) 标签.
//!
//! 各变换都实现了 [`ImageProcessor`], 可以用 [`ProcessorChain`] 串联.
//!
//! # 注意
//!
//! 1. 变换不做任何 I/O, 也不关心样本从何而来. [`dump`] 只用于离线查看结果.
//! 2. 前置条件 (如必需的键) 不满足时返回 [`FeatureError`], 该样本应被整体丢弃.
//! 3. 张量一律以行优先序存储, 标注的最后一维为类别通道.
//!
//! # Features
//!
//! - `rayon`: 盒式滤波时并行处理 batch 中的样本.
//! - `serde`: 为张量和各变换参数提供序列化支持.

mod error;
mod features;
mod tensor;

pub mod consts;
pub mod decode;
pub mod dump;
pub mod filter;
pub mod prelude;
pub mod processors;

pub use decode::{DTypeTable, DecodeImagesAnnotations, DecodeStrategy};
pub use error::FeatureError;
pub use features::{Feature, FeatureMap};
pub use processors::{
    CombineImageRtDose, CombineLiverLobeSegments, DiseaseMask, FuzzyConfig,
    FuzzySegmentLiverLobes, ImageProcessor, ProcessorChain,
};
pub use tensor::{DType, Tensor};

/// 解码 / 变换运行时错误.
pub type FeatureResult<T> = Result<T, FeatureError>;
