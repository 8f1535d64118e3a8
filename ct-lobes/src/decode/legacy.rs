//! 旧格式: 形状由 `rows`, `cols`, `z_images`, `num_classes` 等固定字段给出.

use super::DTypeTable;
use crate::consts::keys::*;
use crate::{DType, Feature, FeatureMap, FeatureResult, Tensor};

/// 按旧格式约定解码图像, 标注, 分辨率和剂量.
///
/// 有 `z_images` 时图像与标注均为可选的三维体数据; 否则二者必需, 且为二维切片.
pub(super) fn decode(features: &mut FeatureMap, dtypes: &DTypeTable) -> FeatureResult<()> {
    log::warn!("特征中没有形状键, 按旧格式解码. 请更新到最新版本的记录生成工具");

    let image_dtype = dtypes.get_or(IMAGE, DType::Float32);
    let annotation_dtype = dtypes.get_or(ANNOTATION, DType::Int8);

    let has_classes = features.contains_key(NUM_CLASSES);
    if features.contains_key(Z_IMAGES) {
        if features.contains_key(IMAGE) {
            let shape = features.dims([Z_IMAGES, ROWS, COLS])?;
            decode_into(features, IMAGE, image_dtype, &shape)?;
        }
        if features.contains_key(ANNOTATION) {
            let shape = if has_classes {
                features.dims([Z_IMAGES, ROWS, COLS, NUM_CLASSES])?
            } else {
                features.dims([Z_IMAGES, ROWS, COLS])?
            };
            decode_into(features, ANNOTATION, annotation_dtype, &shape)?;
        }
    } else {
        features.require([IMAGE, ANNOTATION])?;
        let shape = features.dims([ROWS, COLS])?;
        decode_into(features, IMAGE, image_dtype, &shape)?;
        let shape = if has_classes {
            features.dims([ROWS, COLS, NUM_CLASSES])?
        } else {
            features.dims([ROWS, COLS])?
        };
        decode_into(features, ANNOTATION, annotation_dtype, &shape)?;
    }

    if let Some(Feature::Bytes(_)) = features.get(SPACING) {
        let bytes = features.take_bytes(SPACING)?;
        features.insert(SPACING, Tensor::decode_raw(&bytes, DType::Float32)?);
    }

    if features.contains_key(DOSE) {
        let dose_dtype = dtypes.get_or(DOSE, DType::Float32);
        let shape = features.dims([DOSE_IMAGES, DOSE_ROWS, DOSE_COLS])?;
        decode_into(features, DOSE, dose_dtype, &shape)?;
    }
    Ok(())
}

/// 把 `key` 的字节解码为 `dtype`, 变形为 `shape` 后放回.
fn decode_into(
    features: &mut FeatureMap,
    key: &str,
    dtype: DType,
    shape: &[usize],
) -> FeatureResult<()> {
    let bytes = features.take_bytes(key)?;
    let tensor = Tensor::decode_raw(&bytes, dtype)?.reshape(shape)?;
    features.insert(key, tensor);
    Ok(())
}
