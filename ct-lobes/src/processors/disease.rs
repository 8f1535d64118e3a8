//! 前景掩膜与病灶通道提取.

use ndarray::{ArrayD, Axis, Slice};
use num::traits::AsPrimitive;

use super::ImageProcessor;
use crate::consts::keys::{ANNOTATION, IMAGE, MASK};
use crate::consts::{DISEASE_CLASS, MASK_THRESHOLD};
use crate::error::FeatureError;
use crate::tensor::{map_array, with_array};
use crate::{FeatureMap, FeatureResult, Tensor};

/// 由标注生成前景掩膜 `mask`, 并可选地只保留病灶, 以及把图像背景替换为常数.
///
/// 标注的最后一维为 1 时视为标签编码, 否则视为 one-hot:
///
/// 1. one-hot: 通道 `1..` 之和大于 0.99 处掩膜为 1. 若 `on_disease`,
///    标注只保留通道 2 (保留末尾的单通道维).
/// 2. 标签编码: 标签大于 0 处掩膜为 1. 若 `on_disease`, 标注变为 `标签 == 2`.
///
/// 掩膜为 `i32` 张量. 若 `change_background`, 图像中掩膜为 0 的体素被替换为 0,
/// 或在 `cast_to_min` 时被替换为图像的最小值.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiseaseMask {
    on_disease: bool,
    change_background: bool,
    cast_to_min: bool,
}

impl Default for DiseaseMask {
    #[inline]
    fn default() -> Self {
        Self {
            on_disease: true,
            change_background: false,
            cast_to_min: false,
        }
    }
}

impl DiseaseMask {
    /// 构造.
    #[inline]
    pub fn new(on_disease: bool, change_background: bool, cast_to_min: bool) -> Self {
        Self {
            on_disease,
            change_background,
            cast_to_min,
        }
    }

    /// 是否只保留病灶.
    #[inline]
    pub fn on_disease(self, on: bool) -> Self {
        Self {
            on_disease: on,
            ..self
        }
    }

    /// 是否替换图像背景. `to_min` 为 `true` 时以图像最小值替换, 否则以 0 替换.
    #[inline]
    pub fn change_background(self, on: bool, to_min: bool) -> Self {
        Self {
            change_background: on,
            cast_to_min: to_min,
            ..self
        }
    }
}

impl ImageProcessor for DiseaseMask {
    fn parse(&mut self, features: &mut FeatureMap) -> FeatureResult<()> {
        let annotation = features.tensor(ANNOTATION)?;
        let channels = annotation.channels().ok_or_else(|| FeatureError::Rank {
            key: ANNOTATION.to_owned(),
            expected: ">= 1",
            actual: 0,
        })?;
        if channels == 0 {
            return Err(FeatureError::TooFewChannels(ANNOTATION.to_owned(), 1, 0));
        }

        let (mask, disease) = if channels != 1 {
            let values = annotation.to_f32();
            let mask = one_hot_mask(&values);
            let disease = if self.on_disease {
                if channels <= DISEASE_CLASS {
                    return Err(FeatureError::TooFewChannels(
                        ANNOTATION.to_owned(),
                        DISEASE_CLASS + 1,
                        channels,
                    ));
                }
                Some(map_array!(annotation, a => a
                    .index_axis(Axis(a.ndim() - 1), DISEASE_CLASS)
                    .to_owned()
                    .insert_axis(Axis(a.ndim() - 1))))
            } else {
                None
            };
            (mask, disease)
        } else {
            let values = annotation.to_f32();
            let mask = values.mapv(|v| i32::from(v > 0.0));
            let disease = self
                .on_disease
                .then(|| Tensor::I32(values.mapv(|v| i32::from(v == DISEASE_CLASS as f32))));
            (mask, disease)
        };

        if let Some(disease) = disease {
            features.insert(ANNOTATION, disease);
        }
        if self.change_background {
            let image = features.tensor_mut(IMAGE)?;
            let value = if self.cast_to_min {
                image.min_value().unwrap_or(0.0)
            } else {
                0.0
            };
            fill_background(image, &mask, value)?;
        }
        features.insert(MASK, Tensor::I32(mask));
        Ok(())
    }
}

/// one-hot 标注的前景掩膜: 非背景通道之和超过阈值处为 1. 末尾保留单通道维.
fn one_hot_mask(values: &ArrayD<f32>) -> ArrayD<i32> {
    let last = Axis(values.ndim() - 1);
    values
        .slice_axis(last, Slice::from(1..))
        .sum_axis(last)
        .mapv(|s| i32::from(s > MASK_THRESHOLD))
        .insert_axis(last)
}

/// 去掉末尾的单通道维后的形状.
#[inline]
fn squeeze_last(shape: &[usize]) -> &[usize] {
    match shape.split_last() {
        Some((1, rest)) => rest,
        _ => shape,
    }
}

/// 将 `image` 中 `mask` 为 0 的位置替换为 `value` (转换为图像的元素类型).
///
/// 两者忽略末尾单通道维后形状必须一致.
fn fill_background(image: &mut Tensor, mask: &ArrayD<i32>, value: f64) -> FeatureResult<()> {
    if squeeze_last(image.shape()) != squeeze_last(mask.shape()) {
        return Err(FeatureError::InvalidConfig(format!(
            "图像形状 {:?} 与掩膜形状 {:?} 不一致",
            image.shape(),
            mask.shape()
        )));
    }
    with_array!(image, a => fill_where_zero(a, mask, value));
    Ok(())
}

fn fill_where_zero<T>(image: &mut ArrayD<T>, mask: &ArrayD<i32>, value: f64)
where
    T: Copy + 'static,
    f64: AsPrimitive<T>,
{
    let value: T = value.as_();
    image
        .iter_mut()
        .zip(mask.iter())
        .filter(|(_, m)| **m == 0)
        .for_each(|(p, _)| *p = value);
}
