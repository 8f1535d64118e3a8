//! 新格式: 形状由 `<key>_size_<axis>` 键给出.

use itertools::Itertools;

use super::{is_size_key, is_size_key_of, DTypeTable};
use crate::{DType, FeatureMap, FeatureResult, Tensor};

/// 解码所有拥有形状键的数据键. 没有形状键的键保持原样.
pub(super) fn decode(features: &mut FeatureMap, dtypes: &DTypeTable) -> FeatureResult<()> {
    let plan: Vec<(String, Vec<String>)> = features
        .keys()
        .filter(|k| !is_size_key(k))
        .map(|k| (k.to_owned(), size_keys_of(features, k)))
        .filter(|(_, size_keys)| !size_keys.is_empty())
        .collect();

    for (key, size_keys) in plan {
        let shape = features.dims(size_keys.iter().map(String::as_str))?;
        let dtype = dtypes.get_or(&key, DType::Float32);
        let bytes = features.take_bytes(&key)?;
        let tensor = Tensor::decode_raw(&bytes, dtype)?.reshape(&shape)?;
        log::debug!("解码 `{key}`: {dtype} {shape:?}");
        features.insert(key, tensor);
    }
    Ok(())
}

/// 收集 `key` 的全部形状键, 并按末尾的轴编号排序.
///
/// 注意排序按字符串进行, 因此 `_10` 会排在 `_2` 之前. 记录文件写入端保证轴数不超过 10.
fn size_keys_of(features: &FeatureMap, key: &str) -> Vec<String> {
    features
        .keys()
        .filter(|s| is_size_key_of(s, key))
        .map(str::to_owned)
        .sorted_by(|a, b| axis_suffix(a).cmp(axis_suffix(b)))
        .collect()
}

/// `<key>_size_<axis>` 中的 `<axis>` 部分.
#[inline]
fn axis_suffix(size_key: &str) -> &str {
    size_key.rsplit('_').next().unwrap_or(size_key)
}

#[cfg(test)]
mod tests {
    use crate::decode::{DTypeTable, DecodeImagesAnnotations, DecodeStrategy};
    use crate::{DType, Feature, FeatureError, FeatureMap, Tensor};

    fn f32_bytes(n: usize) -> Vec<u8> {
        (0..n).flat_map(|v| (v as f32).to_le_bytes()).collect()
    }

    fn modern_sample() -> FeatureMap {
        let mut f = FeatureMap::new();
        f.insert("image", f32_bytes(2 * 3 * 4));
        // 故意乱序插入, 解码时按轴编号排序.
        f.insert("image_size_2", 4i64);
        f.insert("image_size_0", 2i64);
        f.insert("image_size_1", 3i64);
        f.insert("annotation", vec![0u8, 1, 2, 1, 0, 0]);
        f.insert("annotation_size_0", 2i64);
        f.insert("annotation_size_1", 3i64);
        f.insert("spacing", Tensor::from(ndarray::arr1(&[0.8f32, 0.8, 5.0]).into_dyn()));
        f
    }

    #[test]
    fn test_modern_decode() {
        let mut f = modern_sample();
        let dtypes = DTypeTable::new().with("annotation", DType::UInt8);
        let strategy = DecodeImagesAnnotations::new(dtypes).decode(&mut f).unwrap();
        assert_eq!(strategy, DecodeStrategy::Modern);

        let image = f.tensor("image").unwrap();
        assert_eq!(image.dtype(), DType::Float32);
        assert_eq!(image.shape(), &[2, 3, 4]);
        assert_eq!(image.as_f32().unwrap()[[1, 2, 3]], 23.0);

        let annotation = f.tensor("annotation").unwrap();
        assert_eq!(annotation.dtype(), DType::UInt8);
        assert_eq!(annotation.shape(), &[2, 3]);

        // 没有形状键的特征与形状键本身保持原样.
        assert_eq!(f.tensor("spacing").unwrap().shape(), &[3]);
        assert_eq!(f.get("image_size_0"), Some(&Feature::Int(2)));
    }

    fn decoder() -> DecodeImagesAnnotations {
        DecodeImagesAnnotations::new(DTypeTable::new().with("annotation", DType::UInt8))
    }

    #[test]
    fn test_modern_decode_errors() {
        let mut f = modern_sample();
        f.insert("image_size_2", 5i64);
        let e = decoder().decode(&mut f).unwrap_err();
        assert!(matches!(e, FeatureError::ElementCount { actual: 24, .. }));

        let mut f = modern_sample();
        f.insert("image", 3i64);
        let e = decoder().decode(&mut f).unwrap_err();
        assert!(matches!(&e, FeatureError::NotBytes(k) if k == "image"));

        let mut f = modern_sample();
        f.insert("annotation_size_1", -3i64);
        let e = decoder().decode(&mut f).unwrap_err();
        assert!(matches!(e, FeatureError::InvalidDim(_, -3)));

        // 默认按 f32 解码, 6 个字节无法整除.
        let mut f = modern_sample();
        let e = DecodeImagesAnnotations::default().decode(&mut f).unwrap_err();
        assert!(matches!(e, FeatureError::ByteLength { len: 6, .. }));
    }
}
