//! 作用于单个样本特征字典的变换.
//!
//! 每个变换实现 [`ImageProcessor`], 可以单独使用, 也可以按顺序组合进
//! [`ProcessorChain`]. 除 [`FuzzySegmentLiverLobes`] 持有随机数生成器外,
//! 其余变换都是无状态的.

mod combine;
mod disease;
mod fuzzy;
mod lobes;

pub use combine::CombineImageRtDose;
pub use disease::DiseaseMask;
pub use fuzzy::{FuzzyConfig, FuzzySegmentLiverLobes};
pub use lobes::CombineLiverLobeSegments;

use crate::{FeatureMap, FeatureResult};

/// 就地修改样本特征字典的变换.
pub trait ImageProcessor {
    /// 处理一个样本. 返回 `Err` 时该样本应被丢弃, 字典内容不再有意义.
    fn parse(&mut self, features: &mut FeatureMap) -> FeatureResult<()>;

    /// 用于日志的名称.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl<P: ImageProcessor + ?Sized> ImageProcessor for Box<P> {
    #[inline]
    fn parse(&mut self, features: &mut FeatureMap) -> FeatureResult<()> {
        (**self).parse(features)
    }

    #[inline]
    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// 按插入顺序依次执行的一组变换.
#[derive(Default)]
pub struct ProcessorChain {
    stages: Vec<Box<dyn ImageProcessor + Send>>,
}

impl ProcessorChain {
    /// 空链.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 在链尾追加一个变换.
    #[inline]
    pub fn then<P: ImageProcessor + Send + 'static>(mut self, stage: P) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// 在链尾追加一个变换.
    #[inline]
    pub fn push<P: ImageProcessor + Send + 'static>(&mut self, stage: P) {
        self.stages.push(Box::new(stage));
    }

    /// 变换个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// 是否为空链.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl ImageProcessor for ProcessorChain {
    /// 依次执行每个变换, 遇到第一个错误即停止.
    fn parse(&mut self, features: &mut FeatureMap) -> FeatureResult<()> {
        for stage in self.stages.iter_mut() {
            log::trace!("执行 {}", stage.name());
            stage.parse(features)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ProcessorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.stages.iter().map(|s| s.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CombineLiverLobeSegments, DiseaseMask, FuzzyConfig, FuzzySegmentLiverLobes,
        ImageProcessor, ProcessorChain,
    };
    use crate::{DType, DTypeTable, DecodeImagesAnnotations, FeatureError, FeatureMap};

    /// 新格式的 (4, 5) 切片: 9 通道 one-hot 标注, 每列一个肝段.
    fn raw_sample() -> FeatureMap {
        let (rows, cols, classes) = (4usize, 5usize, 9usize);
        let mut annotation = vec![0u8; rows * cols * classes];
        for r in 0..rows {
            for c in 0..cols {
                annotation[(r * cols + c) * classes + c + 4] = 1;
            }
        }
        let image: Vec<u8> = (0..rows * cols)
            .flat_map(|v| (v as f32 - 10.0).to_le_bytes())
            .collect();
        let spacing: Vec<u8> = [1.0f32, 1.0, 3.0].iter().flat_map(|v| v.to_le_bytes()).collect();

        let mut f = FeatureMap::new();
        f.insert("annotation", annotation);
        f.insert("annotation_size_0", rows as i64);
        f.insert("annotation_size_1", cols as i64);
        f.insert("annotation_size_2", classes as i64);
        f.insert("image", image);
        f.insert("image_size_0", rows as i64);
        f.insert("image_size_1", cols as i64);
        f.insert("spacing", spacing);
        f.insert("spacing_size_0", 3i64);
        f
    }

    #[test]
    fn test_chain_decode_merge_fuzzy() {
        let _ = simple_logger::SimpleLogger::new().init();
        let dtypes = DTypeTable::new().with("annotation", DType::UInt8);
        let mut chain = ProcessorChain::new()
            .then(DecodeImagesAnnotations::new(dtypes))
            .then(CombineLiverLobeSegments)
            .then(FuzzySegmentLiverLobes::with_seed(FuzzyConfig::new(1.0, 3.0), 3).unwrap());
        assert_eq!(chain.len(), 3);

        let mut f = raw_sample();
        chain.parse(&mut f).unwrap();

        let annotation = f.tensor("annotation").unwrap();
        assert_eq!(annotation.dtype(), DType::Float32);
        assert_eq!(annotation.shape(), &[4, 5, 6]);
        let a = annotation.as_f32().unwrap();
        for lane in a.lanes(ndarray::Axis(2)) {
            assert!((lane.sum() - 1.0).abs() < 1e-5);
            // 肝段 5 ~ 8 全部落在合并后的通道 5.
            assert_eq!(lane[0], 0.0);
        }
        assert_eq!(f.tensor("image").unwrap().shape(), &[4, 5]);
        assert_eq!(f.tensor("spacing").unwrap().shape(), &[3]);
    }

    #[test]
    fn test_chain_stops_at_first_error() {
        let mut chain = ProcessorChain::new();
        chain.push(DecodeImagesAnnotations::default());
        chain.push(DiseaseMask::default());
        let mut f = raw_sample();
        // 标注按默认 f32 解码: 180 字节可整除, 但元素个数不符.
        let e = chain.parse(&mut f).unwrap_err();
        assert!(matches!(e, FeatureError::ElementCount { .. }));
        assert!(!f.contains_key("mask"));
        assert!(format!("{chain:?}").contains("DiseaseMask"));
    }
}
