//! 二维盒式滤波, 即卷积核全为 1 的逐通道 (depthwise) 卷积.
//!
//! 输入统一为 `(batch, height, width, channel)` 布局. 卷积以 valid 模式进行,
//! 需要保持尺寸时先用 [`pad_spatial`] 补零. 每个 (样本, 通道) 平面借助积分图
//! (summed-area table) 求窗口和, 与卷积核大小无关.

use ndarray::{s, Array, Array2, Array4, ArrayView2, ArrayView3, ArrayView4, ArrayViewMut3};
use ndarray::{Axis, Dimension};

use crate::error::FeatureError;
use crate::FeatureResult;

/// 空间维的补零宽度.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Padding {
    /// 上方.
    pub top: usize,

    /// 下方.
    pub bottom: usize,

    /// 左方.
    pub left: usize,

    /// 右方.
    pub right: usize,
}

impl Padding {
    /// 使 `(kh, kw)` 卷积核在 valid 模式下输出与输入同尺寸的补零方式.
    ///
    /// 两侧尽量对称; 卷积核边长为偶数时, 多出的一个像素补在下方 (右方).
    pub fn same((kh, kw): (usize, usize)) -> Self {
        let (vh, vw) = (kh.saturating_sub(1), kw.saturating_sub(1));
        Self {
            top: vh / 2,
            bottom: vh - vh / 2,
            left: vw / 2,
            right: vw - vw / 2,
        }
    }
}

/// 在高, 宽两个维度上补零.
pub fn pad_spatial(x: ArrayView4<f32>, p: Padding) -> Array4<f32> {
    let (b, h, w, c) = x.dim();
    let mut out = Array4::zeros((b, h + p.top + p.bottom, w + p.left + p.right, c));
    out.slice_mut(s![.., p.top..p.top + h, p.left..p.left + w, ..])
        .assign(&x);
    out
}

/// 以 `kernel = (kh, kw)` 全 1 卷积核对 `x` 做逐通道 valid 卷积, 得到每个通道的局部和.
///
/// 输出形状为 `(b, h - kh + 1, w - kw + 1, c)`. 卷积核为空或大于输入时返回 `Err`.
pub fn depthwise_box_sum(x: ArrayView4<f32>, kernel: (usize, usize)) -> FeatureResult<Array4<f32>> {
    let (b, h, w, c) = x.dim();
    let (kh, kw) = kernel;
    if kh == 0 || kw == 0 || kh > h || kw > w {
        return Err(FeatureError::KernelTooLarge {
            kernel,
            input: (h, w),
        });
    }
    let mut out = Array4::zeros((b, h - kh + 1, w - kw + 1, c));
    box_sum_batch(x, kernel, &mut out);
    Ok(out)
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};

        /// 借助 `rayon`, 并行地处理 batch 中的每个样本.
        fn box_sum_batch(x: ArrayView4<f32>, kernel: (usize, usize), out: &mut Array4<f32>) {
            out.axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .for_each(|(i, dst)| box_sum_sample(x.index_axis(Axis(0), i), kernel, dst));
        }
    } else {
        fn box_sum_batch(x: ArrayView4<f32>, kernel: (usize, usize), out: &mut Array4<f32>) {
            x.axis_iter(Axis(0))
                .zip(out.axis_iter_mut(Axis(0)))
                .for_each(|(src, dst)| box_sum_sample(src, kernel, dst));
        }
    }
}

/// 单个样本 `(h, w, c)` 的逐通道窗口和.
fn box_sum_sample(src: ArrayView3<f32>, (kh, kw): (usize, usize), mut dst: ArrayViewMut3<f32>) {
    for (plane, mut out) in src.axis_iter(Axis(2)).zip(dst.axis_iter_mut(Axis(2))) {
        let table = integral_image(plane);
        for ((i, j), v) in out.indexed_iter_mut() {
            let sum = table[(i + kh, j + kw)] - table[(i, j + kw)] - table[(i + kh, j)]
                + table[(i, j)];
            *v = sum as f32;
        }
    }
}

/// 积分图. `table[(i, j)]` 为 `plane[..i, ..j]` 之和, 以 `f64` 累加.
fn integral_image(plane: ArrayView2<f32>) -> Array2<f64> {
    let (h, w) = plane.dim();
    let mut table = Array2::<f64>::zeros((h + 1, w + 1));
    for i in 0..h {
        let mut row = 0.0;
        for j in 0..w {
            row += f64::from(plane[(i, j)]);
            table[(i + 1, j + 1)] = table[(i, j + 1)] + row;
        }
    }
    table
}

/// 沿最后一维归一化, 使每个像素的通道向量之和为 1.
///
/// 通道和为 0 的像素保持全 0, 不产生 NaN.
pub fn normalize_channels<D: Dimension>(x: &mut Array<f32, D>) {
    let last = Axis(x.ndim() - 1);
    for mut lane in x.lanes_mut(last) {
        let sum = lane.sum();
        if sum != 0.0 {
            lane.mapv_inplace(|v| v / sum);
        }
    }
}
