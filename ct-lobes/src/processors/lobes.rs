//! 肝段合并.

use std::ops::Add;

use ndarray::{concatenate, ArrayD, Axis, Slice};
use num::Zero;

use super::ImageProcessor;
use crate::consts::keys::ANNOTATION;
use crate::consts::LOBE_MERGE_START;
use crate::error::FeatureError;
use crate::tensor::map_array;
use crate::{FeatureMap, FeatureResult};

/// 将肝段 5, 6, 7, 8 的通道合并为通道 5, 通道 0..=4 保持不变.
///
/// 输出标注恰有 6 个通道, 元素类型不变.
#[derive(Copy, Clone, Debug, Default)]
pub struct CombineLiverLobeSegments;

impl CombineLiverLobeSegments {
    /// 构造.
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl ImageProcessor for CombineLiverLobeSegments {
    fn parse(&mut self, features: &mut FeatureMap) -> FeatureResult<()> {
        let annotation = features.tensor_mut(ANNOTATION)?;
        match annotation.channels() {
            None => {
                return Err(FeatureError::Rank {
                    key: ANNOTATION.to_owned(),
                    expected: ">= 1",
                    actual: 0,
                })
            }
            Some(c) if c < LOBE_MERGE_START => {
                return Err(FeatureError::TooFewChannels(
                    ANNOTATION.to_owned(),
                    LOBE_MERGE_START,
                    c,
                ))
            }
            Some(_) => {}
        }
        let merged = map_array!(&*annotation, a => merge_tail_channels(a, LOBE_MERGE_START)?);
        *annotation = merged;
        Ok(())
    }
}

/// 保留前 `start` 个通道, 并把其余通道求和为一个新通道接在末尾.
pub(crate) fn merge_tail_channels<T>(a: &ArrayD<T>, start: usize) -> FeatureResult<ArrayD<T>>
where
    T: Clone + Zero + Add<Output = T>,
{
    let last = Axis(a.ndim() - 1);
    let head = a.slice_axis(last, Slice::from(..start));
    let tail = a
        .slice_axis(last, Slice::from(start..))
        .sum_axis(last)
        .insert_axis(last);
    Ok(concatenate(last, &[head, tail.view()])?)
}

#[cfg(test)]
mod tests {
    use super::CombineLiverLobeSegments;
    use crate::{DType, FeatureError, FeatureMap, ImageProcessor, Tensor};
    use ndarray::{s, Array3, ArrayD, IxDyn};

    fn one_lobe_per_row() -> Array3<u8> {
        // (4, 2, 9): 第 i 行像素属于通道 2 * i + 1.
        let mut a = Array3::<u8>::zeros((4, 2, 9));
        for i in 0..4 {
            a.slice_mut(s![i, .., 2 * i + 1]).fill(1);
        }
        a
    }

    #[test]
    fn test_merge_lobes() {
        let input = Array3::from_shape_fn((3, 2, 9), |(h, w, c)| (h * 100 + w * 10 + c) as f32);
        let mut f = FeatureMap::new();
        f.insert("annotation", Tensor::from(input.clone().into_dyn()));
        CombineLiverLobeSegments.parse(&mut f).unwrap();

        let out = f.tensor("annotation").unwrap();
        assert_eq!(out.shape(), &[3, 2, 6]);
        let out = out.as_f32().unwrap();
        for ((h, w), _) in input.slice(s![.., .., 0]).indexed_iter() {
            for c in 0..5 {
                assert_eq!(out[[h, w, c]], input[[h, w, c]]);
            }
            let tail: f32 = (5..9).map(|c| input[[h, w, c]]).sum();
            assert_eq!(out[[h, w, 5]], tail);
        }
    }

    #[test]
    fn test_merge_keeps_dtype_and_one_hot() {
        let mut f = FeatureMap::new();
        f.insert("annotation", Tensor::from(one_lobe_per_row().into_dyn()));
        CombineLiverLobeSegments::new().parse(&mut f).unwrap();
        let out = f.tensor("annotation").unwrap();
        assert_eq!(out.dtype(), DType::UInt8);
        let out = out.to_f32();
        // 合并后每个像素仍是 one-hot.
        for lane in out.lanes(ndarray::Axis(2)) {
            assert_eq!(lane.sum(), 1.0);
        }
        // 行 0 (通道 1), 行 1 (通道 3) 不变; 行 2 (通道 5), 行 3 (通道 7) 均进入通道 5.
        assert_eq!(out[[0, 0, 1]], 1.0);
        assert_eq!(out[[1, 1, 3]], 1.0);
        assert_eq!(out[[2, 0, 5]], 1.0);
        assert_eq!(out[[3, 1, 5]], 1.0);
    }

    #[test]
    fn test_merge_rejects_few_channels() {
        let mut f = FeatureMap::new();
        f.insert("annotation", Tensor::from(ArrayD::<u8>::zeros(IxDyn(&[2, 2, 3]))));
        let e = CombineLiverLobeSegments.parse(&mut f).unwrap_err();
        assert!(matches!(e, FeatureError::TooFewChannels(_, 5, 3)));

        let mut f = FeatureMap::new();
        let e = CombineLiverLobeSegments.parse(&mut f).unwrap_err();
        assert!(matches!(&e, FeatureError::MissingKey(k) if k == "annotation"));
    }

    #[test]
    fn test_merge_exactly_five_channels() {
        let mut f = FeatureMap::new();
        f.insert("annotation", Tensor::from(ArrayD::<i32>::ones(IxDyn(&[2, 5]))));
        CombineLiverLobeSegments.parse(&mut f).unwrap();
        let out = f.tensor("annotation").unwrap().to_f32();
        assert_eq!(out.shape(), &[2, 6]);
        assert_eq!(out[[1, 5]], 0.0);
        assert_eq!(out[[1, 4]], 1.0);
    }
}
