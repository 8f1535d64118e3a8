//! 肝段模糊标签.
//!
//! 对标注做随机大小的二维盒式平滑, 再逐像素归一化, 使通道向量成为类别概率分布.
//! 平滑窗口的物理尺寸 (毫米) 在 `[min_mm, max_mm)` 内均匀随机抽取, 每个样本抽取一次,
//! 再按体素分辨率换算为卷积核大小.

use ndarray::{Array4, ArrayD, ArrayView4, Axis, Ix4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::ImageProcessor;
use crate::consts::keys::{ANNOTATION, SPACING};
use crate::consts::DEFAULT_NUM_CLASSES;
use crate::error::FeatureError;
use crate::filter::{depthwise_box_sum, normalize_channels, pad_spatial, Padding};
use crate::{FeatureMap, FeatureResult, Tensor};

/// [`FuzzySegmentLiverLobes`] 的参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FuzzyConfig {
    /// 平滑窗口物理尺寸下限 (毫米), 含.
    pub min_mm: f32,

    /// 平滑窗口物理尺寸上限 (毫米), 不含. 与 `min_mm` 相等时窗口尺寸固定.
    pub max_mm: f32,

    /// 类别数. 标签编码 (单通道) 的标注会先展开为该数目的 one-hot 通道.
    pub num_classes: usize,
}

impl Default for FuzzyConfig {
    #[inline]
    fn default() -> Self {
        Self {
            min_mm: 0.0,
            max_mm: 1.0,
            num_classes: DEFAULT_NUM_CLASSES,
        }
    }
}

impl FuzzyConfig {
    /// 以窗口尺寸范围构造, 类别数取默认值.
    #[inline]
    pub fn new(min_mm: f32, max_mm: f32) -> Self {
        Self {
            min_mm,
            max_mm,
            ..Self::default()
        }
    }

    /// 设置类别数.
    #[inline]
    pub fn num_classes(self, num_classes: usize) -> Self {
        Self {
            num_classes,
            ..self
        }
    }

    fn validate(&self) -> FeatureResult<()> {
        let Self { min_mm, max_mm, .. } = *self;
        if !(min_mm.is_finite() && max_mm.is_finite()) || min_mm < 0.0 || min_mm > max_mm {
            return Err(FeatureError::InvalidConfig(format!(
                "窗口尺寸范围 [{min_mm}, {max_mm}) 不合法"
            )));
        }
        if self.num_classes == 0 {
            return Err(FeatureError::InvalidConfig("类别数不能为 0".to_owned()));
        }
        Ok(())
    }
}

/// 随机盒式平滑 + 逐像素归一化, 把硬标注变成模糊标注.
///
/// 标注可以是 `(h, w, c)` 或 `(batch, h, w, c)`; batch 中各样本独立卷积,
/// 但共用同一次抽取的窗口尺寸. 输出为 `f32`, 替换原标注.
///
/// 单通道 (标签编码) 的标注在 [`FuzzyConfig::num_classes`] 大于 1 时会先展开为
/// one-hot, 因此输出的通道数为 `num_classes` 而不是 1. 多通道标注的通道数保持不变.
#[derive(Debug, Clone)]
pub struct FuzzySegmentLiverLobes {
    config: FuzzyConfig,
    rng: StdRng,
}

impl FuzzySegmentLiverLobes {
    /// 以操作系统熵源初始化随机数生成器.
    pub fn new(config: FuzzyConfig) -> FeatureResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            rng: StdRng::from_os_rng(),
        })
    }

    /// 以固定种子初始化. 相同种子与相同输入总是产生相同输出.
    pub fn with_seed(config: FuzzyConfig, seed: u64) -> FeatureResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// 参数.
    #[inline]
    pub fn config(&self) -> &FuzzyConfig {
        &self.config
    }

    /// 抽取 (高, 宽) 两个方向的窗口物理尺寸, 各自在 `[min_mm, max_mm)` 内均匀分布.
    pub fn draw_extent(&mut self) -> [f32; 2] {
        let FuzzyConfig { min_mm, max_mm, .. } = self.config;
        let rng = &mut self.rng;
        let mut draw = || {
            if min_mm < max_mm {
                rng.random_range(min_mm..max_mm)
            } else {
                min_mm
            }
        };
        [draw(), draw()]
    }

    /// 以给定窗口物理尺寸平滑 `annotation`. `spacing` 为 (高, 宽) 方向的体素分辨率.
    pub fn smooth(
        &self,
        annotation: &Tensor,
        spacing: [f32; 2],
        extent_mm: [f32; 2],
    ) -> FeatureResult<ArrayD<f32>> {
        let values = annotation.to_f32();
        let rank = values.ndim();
        let batch = match rank {
            4 => values.into_dimensionality::<Ix4>()?,
            3 => values.insert_axis(Axis(0)).into_dimensionality::<Ix4>()?,
            _ => {
                return Err(FeatureError::Rank {
                    key: ANNOTATION.to_owned(),
                    expected: "3 或 4",
                    actual: rank,
                })
            }
        };
        let batch = if batch.dim().3 == 1 && self.config.num_classes > 1 {
            one_hot(batch.view(), self.config.num_classes)
        } else {
            batch
        };

        let (_, h, w, _) = batch.dim();
        let kernel = clamp_kernel(kernel_size(extent_mm, spacing)?, (h, w));
        log::debug!("模糊标签: 窗口 {extent_mm:?} mm, 分辨率 {spacing:?}, 卷积核 {kernel:?}");

        let padded = pad_spatial(batch.view(), Padding::same(kernel));
        let mut out = depthwise_box_sum(padded.view(), kernel)?;
        let area = (kernel.0 * kernel.1) as f32;
        out.mapv_inplace(|v| v / area);
        normalize_channels(&mut out);

        let out = out.into_dyn();
        Ok(if rank == 3 {
            out.index_axis_move(Axis(0), 0)
        } else {
            out
        })
    }
}

impl ImageProcessor for FuzzySegmentLiverLobes {
    fn parse(&mut self, features: &mut FeatureMap) -> FeatureResult<()> {
        features.require([ANNOTATION, SPACING])?;
        let spacing = spacing_2d(features.tensor(SPACING)?)?;
        let extent = self.draw_extent();
        let smoothed = self.smooth(features.tensor(ANNOTATION)?, spacing, extent)?;
        features.insert(ANNOTATION, Tensor::F32(smoothed));
        Ok(())
    }
}

/// 分辨率向量的前两个分量.
fn spacing_2d(spacing: &Tensor) -> FeatureResult<[f32; 2]> {
    let values = spacing.to_f32();
    let mut it = values.iter().copied();
    match (it.next(), it.next()) {
        (Some(h), Some(w)) => Ok([h, w]),
        _ => Err(FeatureError::UnexpectedValue(
            SPACING.to_owned(),
            "至少含两个分量的分辨率向量",
        )),
    }
}

/// 物理尺寸换算为卷积核大小: 向下取整, 至少为 1.
fn kernel_size(extent_mm: [f32; 2], spacing: [f32; 2]) -> FeatureResult<(usize, usize)> {
    let mut k = [1usize; 2];
    for ((size, e), s) in k.iter_mut().zip(extent_mm).zip(spacing) {
        if !(s.is_finite() && s > 0.0) {
            return Err(FeatureError::InvalidSpacing(s));
        }
        *size = ((e / s).floor() as usize).max(1);
    }
    Ok((k[0], k[1]))
}

/// 把卷积核限制在 `(2h - 1, 2w - 1)` 以内.
///
/// 补零后, 边长不小于 `2n - 1` 的窗口在每个位置都覆盖整条轴, 归一化后的结果与更大的卷积核相同.
fn clamp_kernel((kh, kw): (usize, usize), (h, w): (usize, usize)) -> (usize, usize) {
    let cap = |n: usize| (2 * n).saturating_sub(1).max(1);
    (kh.min(cap(h)), kw.min(cap(w)))
}

/// 把单通道标签展开为 `num_classes` 个 one-hot 通道. 超出范围的标签对应全 0.
fn one_hot(labels: ArrayView4<f32>, num_classes: usize) -> Array4<f32> {
    let (b, h, w, _) = labels.dim();
    Array4::from_shape_fn((b, h, w, num_classes), |(i, j, k, c)| {
        f32::from(u8::from(labels[(i, j, k, 0)].round() == c as f32))
    })
}
