//! Security Module
//!
//! 入力ブックを展開する際の上限値。ZIP bomb とパストラバーサルへの対策です。

use crate::error::QipExtractError;

/// 入力ブックに対する制限
///
/// デフォルト値:
///
/// | 項目 | 値 |
/// |------|----|
/// | 入力ファイルサイズ | 2GB |
/// | アーカイブ内のエントリ数 | 10000 |
/// | 1エントリの展開後サイズ | 100MB |
/// | 展開後サイズの合計 | 1GB |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityLimits {
    pub max_input_size: u64,
    pub max_entry_count: usize,
    pub max_entry_size: u64,
    pub max_decompressed_size: u64,
}

impl Default for SecurityLimits {
    fn default() -> Self {
        Self {
            max_input_size: 2_147_483_648,
            max_entry_count: 10_000,
            max_entry_size: 104_857_600,
            max_decompressed_size: 1_073_741_824,
        }
    }
}

impl SecurityLimits {
    /// 入力サイズを検査する
    pub fn check_input_size(&self, size: u64) -> Result<(), QipExtractError> {
        if size > self.max_input_size {
            return Err(QipExtractError::SecurityViolation(format!(
                "Input file size exceeds maximum: {} bytes (max: {} bytes)",
                size, self.max_input_size
            )));
        }
        Ok(())
    }

    /// アーカイブのエントリ数を検査する
    pub fn check_entry_count(&self, count: usize) -> Result<(), QipExtractError> {
        if count > self.max_entry_count {
            return Err(QipExtractError::SecurityViolation(format!(
                "ZIP archive contains too many files: {} (max: {})",
                count, self.max_entry_count
            )));
        }
        Ok(())
    }

    /// 1エントリのサイズを検査し、展開後サイズの累計に加算する
    ///
    /// # 引数
    ///
    /// * `name` - エントリ名
    /// * `size` - 展開後のサイズ
    /// * `total` - これまでの累計（加算後の値で上書きされます）
    pub fn check_entry(&self, name: &str, size: u64, total: &mut u64) -> Result<(), QipExtractError> {
        validate_zip_path(name)
            .map_err(|e| QipExtractError::SecurityViolation(format!("Invalid ZIP path: {}", e)))?;

        if size > self.max_entry_size {
            return Err(QipExtractError::SecurityViolation(format!(
                "File '{}' exceeds maximum size: {} bytes (max: {} bytes)",
                name, size, self.max_entry_size
            )));
        }

        *total = total.checked_add(size).ok_or_else(|| {
            QipExtractError::SecurityViolation("Total decompressed size overflow".to_string())
        })?;
        if *total > self.max_decompressed_size {
            return Err(QipExtractError::SecurityViolation(format!(
                "Total decompressed size exceeds maximum: {} bytes (max: {} bytes)",
                total, self.max_decompressed_size
            )));
        }
        Ok(())
    }
}

/// アーカイブ内のパスを検証する
///
/// 空のパス、絶対パス、`..`、バックスラッシュを含むパスを拒否します。
pub(crate) fn validate_zip_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("Empty path is not allowed".to_string());
    }

    let bytes = path.as_bytes();
    let has_drive = bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && &bytes[1..3] == b":\\";
    if path.starts_with('/') || has_drive {
        return Err(format!("Absolute path is not allowed: {}", path));
    }

    if path.split('/').any(|segment| segment == "..") {
        return Err(format!("Path traversal detected: {}", path));
    }

    if path.contains('\\') {
        return Err(format!("Backslash in path is not allowed: {}", path));
    }

    Ok(())
}
