//! 通用常量.

/// 特征字典中约定俗成的键名.
pub mod keys {
    /// CT 扫描图像.
    pub const IMAGE: &str = "image";

    /// 标注 (最后一维为类别通道).
    pub const ANNOTATION: &str = "annotation";

    /// 放疗剂量.
    pub const DOSE: &str = "dose";

    /// 体素分辨率向量, 以毫米为单位.
    pub const SPACING: &str = "spacing";

    /// 前景掩膜, 由 [`crate::DiseaseMask`] 生成.
    pub const MASK: &str = "mask";

    /// 图像, 标注和剂量沿通道拼接后的结果.
    pub const COMBINED: &str = "combined";

    /// 旧格式: 图像行数.
    pub const ROWS: &str = "rows";

    /// 旧格式: 图像列数.
    pub const COLS: &str = "cols";

    /// 旧格式: 图像切片数.
    pub const Z_IMAGES: &str = "z_images";

    /// 旧格式: 类别数.
    pub const NUM_CLASSES: &str = "num_classes";

    /// 旧格式: 剂量切片数.
    pub const DOSE_IMAGES: &str = "dose_images";

    /// 旧格式: 剂量行数.
    pub const DOSE_ROWS: &str = "dose_rows";

    /// 旧格式: 剂量列数.
    pub const DOSE_COLS: &str = "dose_cols";
}

/// 形状元信息键的标记. 任何包含该子串的键都不会被当作数据解码.
pub const SIZE_MARK: &str = "size";

/// 形状元信息键的前缀分隔符, 即 `<key>_size_<axis>` 中的 `_size`.
pub const SIZE_SEP: &str = "_size";

/// 标签编码标注中肿瘤 (病灶) 的值, 同时也是 one-hot 标注中病灶的通道索引.
pub const DISEASE_CLASS: usize = 2;

/// 肝段 5, 6, 7, 8 合并时的起始通道.
pub const LOBE_MERGE_START: usize = 5;

/// one-hot 标注的前景通道和超过该值时视为前景. 略小于 1 以容忍浮点舍入.
///
/// 比较在 `f32` 下进行, 不先降到半精度; 前景和落在约 `(0.99, 0.9907)` 内时,
/// 结果可能与以 `f16` 比较的实现不同.
pub const MASK_THRESHOLD: f32 = 0.99;

/// 肝段标注默认类别数 (背景 + 8 个肝段).
pub const DEFAULT_NUM_CLASSES: usize = 9;
