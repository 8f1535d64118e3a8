//! 样本导出, 便于离线查看处理结果.

use std::fs::File;
use std::path::Path;

use ndarray_npy::NpzWriter;

use crate::tensor::with_array;
use crate::{Feature, FeatureMap, FeatureResult};

/// 把 `features` 中所有已解码的张量写入 `path` 处的 npz 文件, 每个键一个数组.
///
/// 原始字节和整数元信息不会写入. 返回写入的数组个数.
pub fn save_npz<P: AsRef<Path>>(features: &FeatureMap, path: P) -> FeatureResult<usize> {
    let file = File::create(path.as_ref())?;
    let mut npz = NpzWriter::new(file);
    let mut count = 0usize;
    for (key, feature) in features {
        if let Feature::Tensor(t) = feature {
            with_array!(t, a => npz.add_array(key.as_str(), a))?;
            count += 1;
        }
    }
    npz.finish()?;
    log::debug!("导出 {count} 个数组到 {}", path.as_ref().display());
    Ok(count)
}
