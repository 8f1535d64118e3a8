//! 原始字节特征的解码.
//!
//! 记录文件中的图像, 标注, 剂量等均以原始字节保存, 形状由伴随的元信息键描述.
//! 新格式为每个数据键 `<key>` 写入 `<key>_size_<axis>` 形式的形状键;
//! 旧格式则使用固定的 `rows`, `cols`, `z_images`, `num_classes` 等键.
//! 两种格式分别对应 [`DecodeStrategy::Modern`] 和 [`DecodeStrategy::Legacy`].

use std::collections::HashMap;

use crate::consts::{SIZE_MARK, SIZE_SEP};
use crate::{DType, FeatureMap, FeatureResult, ImageProcessor};

mod legacy;
mod modern;

/// 数据键到元素类型的覆盖表. 表中没有的键使用各解码策略的默认类型.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DTypeTable {
    inner: HashMap<String, DType>,
}

impl DTypeTable {
    /// 空表.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一项覆盖.
    #[inline]
    pub fn with(mut self, key: impl Into<String>, dtype: DType) -> Self {
        self.inner.insert(key.into(), dtype);
        self
    }

    /// 查询 `key` 的覆盖类型.
    #[inline]
    pub fn get(&self, key: &str) -> Option<DType> {
        self.inner.get(key).copied()
    }

    /// 查询 `key` 的类型, 没有覆盖时返回 `default`.
    #[inline]
    pub fn get_or(&self, key: &str, default: DType) -> DType {
        self.get(key).unwrap_or(default)
    }
}

impl<K: Into<String>> FromIterator<(K, DType)> for DTypeTable {
    fn from_iter<T: IntoIterator<Item = (K, DType)>>(iter: T) -> Self {
        Self {
            inner: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// 解码策略, 由特征字典中是否存在形状键决定.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DecodeStrategy {
    /// 每个数据键都带有 `<key>_size_<axis>` 形状键.
    Modern,

    /// 旧版记录格式, 形状由固定字段隐式给出.
    Legacy,
}

impl DecodeStrategy {
    /// 判断特征字典所属的格式: 只要有一个数据键拥有形状键, 即为新格式.
    pub fn detect(features: &FeatureMap) -> Self {
        let modern = features
            .keys()
            .filter(|k| !is_size_key(k))
            .any(|k| features.keys().any(|s| is_size_key_of(s, k)));
        if modern {
            Self::Modern
        } else {
            Self::Legacy
        }
    }
}

/// 键名是否为形状元信息.
#[inline]
pub(crate) fn is_size_key(key: &str) -> bool {
    key.contains(SIZE_MARK)
}

/// `size_key` 是否为 `key` 的形状键, 即其第一个 `_size` 之前的部分恰为 `key`.
#[inline]
pub(crate) fn is_size_key_of(size_key: &str, key: &str) -> bool {
    is_size_key(size_key) && size_key.split(SIZE_SEP).next() == Some(key)
}

/// 把图像, 标注, 剂量等原始字节解码并变形为张量.
///
/// 解码结果就地替换原字节. 元素类型默认 `f32`, 可以通过 [`DTypeTable`] 覆盖.
#[derive(Debug, Clone, Default)]
pub struct DecodeImagesAnnotations {
    dtypes: DTypeTable,
}

impl DecodeImagesAnnotations {
    /// 以给定的类型覆盖表构造解码器.
    #[inline]
    pub fn new(dtypes: DTypeTable) -> Self {
        Self { dtypes }
    }

    /// 类型覆盖表.
    #[inline]
    pub fn dtypes(&self) -> &DTypeTable {
        &self.dtypes
    }

    /// 解码 `features`, 返回实际使用的策略.
    pub fn decode(&self, features: &mut FeatureMap) -> FeatureResult<DecodeStrategy> {
        let strategy = DecodeStrategy::detect(features);
        match strategy {
            DecodeStrategy::Modern => modern::decode(features, &self.dtypes)?,
            DecodeStrategy::Legacy => legacy::decode(features, &self.dtypes)?,
        }
        Ok(strategy)
    }
}

impl ImageProcessor for DecodeImagesAnnotations {
    #[inline]
    fn parse(&mut self, features: &mut FeatureMap) -> FeatureResult<()> {
        self.decode(features).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::{is_size_key_of, DTypeTable, DecodeStrategy};
    use crate::{DType, FeatureMap};

    #[test]
    fn test_size_key_matching() {
        assert!(is_size_key_of("image_size_0", "image"));
        assert!(is_size_key_of("annotation_size_3", "annotation"));
        assert!(!is_size_key_of("image_size_0", "annotation"));
        assert!(!is_size_key_of("image_rows", "image"));
        assert!(!is_size_key_of("dose_image_size_0", "dose"));
    }

    #[test]
    fn test_detect() {
        let mut f = FeatureMap::new();
        f.insert("image", vec![0u8; 4]);
        f.insert("rows", 1i64);
        assert_eq!(DecodeStrategy::detect(&f), DecodeStrategy::Legacy);

        // 孤立的形状键不能使格式变为新格式.
        f.insert("spacing_size_0", 3i64);
        assert_eq!(DecodeStrategy::detect(&f), DecodeStrategy::Legacy);

        f.insert("image_size_0", 4i64);
        assert_eq!(DecodeStrategy::detect(&f), DecodeStrategy::Modern);
    }

    #[test]
    fn test_dtype_table() {
        let t: DTypeTable = [("annotation", DType::UInt8)].into_iter().collect();
        assert_eq!(t.get("annotation"), Some(DType::UInt8));
        assert_eq!(t.get_or("image", DType::Float32), DType::Float32);
        let t = t.with("image", DType::Int16);
        assert_eq!(t.get_or("image", DType::Float32), DType::Int16);
    }
}
