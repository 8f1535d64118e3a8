//! 特征字典.

use std::collections::btree_map::{self, BTreeMap};

use crate::error::FeatureError;
use crate::{FeatureResult, Tensor};

/// 特征字典中的一个值.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Feature {
    /// 尚未解码的原始字节.
    Bytes(Vec<u8>),

    /// 整数标量, 一般是形状元信息 (如 `rows`, `image_size_0`).
    Int(i64),

    /// 已解码的张量.
    Tensor(Tensor),
}

impl From<Vec<u8>> for Feature {
    #[inline]
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<i64> for Feature {
    #[inline]
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<Tensor> for Feature {
    #[inline]
    fn from(t: Tensor) -> Self {
        Self::Tensor(t)
    }
}

/// 特征名到特征值的有序映射. 各变换就地修改该结构.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeatureMap {
    inner: BTreeMap<String, Feature>,
}

impl FeatureMap {
    /// 创建空字典.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入特征, 返回被替换的旧值.
    #[inline]
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Feature>) -> Option<Feature> {
        self.inner.insert(key.into(), value.into())
    }

    /// 移除特征.
    #[inline]
    pub fn remove(&mut self, key: &str) -> Option<Feature> {
        self.inner.remove(key)
    }

    /// 获取特征.
    #[inline]
    pub fn get(&self, key: &str) -> Option<&Feature> {
        self.inner.get(key)
    }

    /// 是否包含 `key`.
    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// 按字典序迭代所有键.
    #[inline]
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(String::as_str)
    }

    /// 按键的字典序迭代所有特征.
    #[inline]
    pub fn iter(&self) -> btree_map::Iter<'_, String, Feature> {
        self.inner.iter()
    }

    /// 特征个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// 是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// 检查 `keys` 是否全部存在. 返回第一个缺失的键对应的错误.
    pub fn require<'k, I: IntoIterator<Item = &'k str>>(&self, keys: I) -> FeatureResult<()> {
        match keys.into_iter().find(|k| !self.contains_key(k)) {
            Some(k) => Err(FeatureError::MissingKey(k.to_owned())),
            None => Ok(()),
        }
    }

    /// 获取特征, 缺失时返回 `Err`.
    #[inline]
    pub fn feature(&self, key: &str) -> FeatureResult<&Feature> {
        self.get(key)
            .ok_or_else(|| FeatureError::MissingKey(key.to_owned()))
    }

    /// 获取已解码的张量.
    pub fn tensor(&self, key: &str) -> FeatureResult<&Tensor> {
        match self.feature(key)? {
            Feature::Tensor(t) => Ok(t),
            _ => Err(FeatureError::UnexpectedValue(key.to_owned(), "已解码张量")),
        }
    }

    /// 获取已解码张量的可变引用.
    pub fn tensor_mut(&mut self, key: &str) -> FeatureResult<&mut Tensor> {
        match self.inner.get_mut(key) {
            Some(Feature::Tensor(t)) => Ok(t),
            Some(_) => Err(FeatureError::UnexpectedValue(key.to_owned(), "已解码张量")),
            None => Err(FeatureError::MissingKey(key.to_owned())),
        }
    }

    /// 读取形状元信息 `key`.
    ///
    /// 值可以是 [`Feature::Int`], 也可以是只含一个整数元素的张量. 负数返回 `Err`.
    pub fn dim(&self, key: &str) -> FeatureResult<usize> {
        let v = match self.feature(key)? {
            Feature::Int(v) => *v,
            Feature::Tensor(t) => t
                .as_i64()
                .ok_or_else(|| FeatureError::UnexpectedValue(key.to_owned(), "整数标量"))?,
            Feature::Bytes(_) => {
                return Err(FeatureError::UnexpectedValue(key.to_owned(), "整数标量"))
            }
        };
        usize::try_from(v).map_err(|_| FeatureError::InvalidDim(key.to_owned(), v))
    }

    /// 依次读取 `keys` 对应的形状元信息, 组成形状.
    pub fn dims<'k, I: IntoIterator<Item = &'k str>>(&self, keys: I) -> FeatureResult<Vec<usize>> {
        keys.into_iter().map(|k| self.dim(k)).collect()
    }

    /// 取出 `key` 的原始字节. 若值不是字节, 原样放回并返回 `Err`.
    pub(crate) fn take_bytes(&mut self, key: &str) -> FeatureResult<Vec<u8>> {
        match self.inner.remove(key) {
            Some(Feature::Bytes(b)) => Ok(b),
            Some(other) => {
                self.inner.insert(key.to_owned(), other);
                Err(FeatureError::NotBytes(key.to_owned()))
            }
            None => Err(FeatureError::MissingKey(key.to_owned())),
        }
    }
}

impl FromIterator<(String, Feature)> for FeatureMap {
    fn from_iter<T: IntoIterator<Item = (String, Feature)>>(iter: T) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for FeatureMap {
    type Item = (String, Feature);
    type IntoIter = btree_map::IntoIter<String, Feature>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

impl<'a> IntoIterator for &'a FeatureMap {
    type Item = (&'a String, &'a Feature);
    type IntoIter = btree_map::Iter<'a, String, Feature>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}
