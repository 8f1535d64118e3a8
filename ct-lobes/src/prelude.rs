//! 🍋 常用类型一站式导入.

pub use crate::consts::keys;
pub use crate::{DType, DTypeTable, Feature, FeatureError, FeatureMap, FeatureResult, Tensor};

pub use crate::decode::{DecodeImagesAnnotations, DecodeStrategy};
pub use crate::processors::{
    CombineImageRtDose, CombineLiverLobeSegments, DiseaseMask, FuzzyConfig,
    FuzzySegmentLiverLobes, ImageProcessor, ProcessorChain,
};
