//! 图像, 标注, 剂量的通道拼接.

use ndarray::{concatenate, ArrayD, Axis};

use super::ImageProcessor;
use crate::consts::keys::{ANNOTATION, COMBINED, DOSE, IMAGE};
use crate::error::FeatureError;
use crate::{FeatureMap, FeatureResult, Tensor};

/// 将 `image`, `annotation`, `dose` 沿最后一维拼接为 `f32` 张量 `combined`.
///
/// 三者均转换为 `f32`. 维数比最高维数少 1 的输入 (如没有通道维的图像)
/// 会先在末尾补一个单通道维. 原有的三个特征保持不变.
#[derive(Copy, Clone, Debug, Default)]
pub struct CombineImageRtDose;

impl CombineImageRtDose {
    /// 构造.
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl ImageProcessor for CombineImageRtDose {
    fn parse(&mut self, features: &mut FeatureMap) -> FeatureResult<()> {
        features.require([IMAGE, ANNOTATION, DOSE])?;
        let parts = [IMAGE, ANNOTATION, DOSE]
            .into_iter()
            .map(|key| features.tensor(key).map(|t| (key, t)))
            .collect::<FeatureResult<Vec<(&str, &Tensor)>>>()?;

        let rank = parts.iter().map(|(_, t)| t.ndim()).max().unwrap_or(0);
        if rank == 0 {
            return Err(FeatureError::Rank {
                key: IMAGE.to_owned(),
                expected: ">= 1",
                actual: 0,
            });
        }
        let arrays = parts
            .into_iter()
            .map(|(key, t)| with_channel_axis(key, t.to_f32(), rank))
            .collect::<FeatureResult<Vec<ArrayD<f32>>>>()?;
        let views: Vec<_> = arrays.iter().map(|a| a.view()).collect();
        let combined = concatenate(Axis(rank - 1), &views)?;
        features.insert(COMBINED, Tensor::F32(combined));
        Ok(())
    }
}

/// 使 `a` 的维数等于 `rank`: 恰好少一维时补一个末尾单通道维, 否则报错.
fn with_channel_axis(key: &str, a: ArrayD<f32>, rank: usize) -> FeatureResult<ArrayD<f32>> {
    match rank - a.ndim() {
        0 => Ok(a),
        1 => Ok(a.insert_axis(Axis(rank - 1))),
        _ => Err(FeatureError::Rank {
            key: key.to_owned(),
            expected: "与其他输入相同或少 1",
            actual: a.ndim(),
        }),
    }
}
