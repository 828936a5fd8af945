//! Range Resolution Module
//!
//! 人が入力した範囲文字列（"K3:R10" など）を正規化された行・列の境界に変換する。

use serde::Serialize;

use crate::error::QipExtractError;
use crate::types::CellCoord;

/// Excelの最大行数
const MAX_ROWS: u32 = 1_048_576;

/// Excelの最大列数（XFD）
const MAX_COLS: u32 = 16_384;

/// 解析済みの範囲境界（1始まり、両端を含む）
///
/// 解析後は常に `start_row <= end_row` かつ `start_col <= end_col` が成立します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeBounds {
    pub start_row: u32,
    pub end_row: u32,
    pub start_col: u32,
    pub end_col: u32,
}

impl RangeBounds {
    /// 行数
    pub fn height(&self) -> u32 {
        self.end_row - self.start_row + 1
    }

    /// 列数
    pub fn width(&self) -> u32 {
        self.end_col - self.start_col + 1
    }

    /// 左上のセル座標（0始まり）
    pub fn top_left(&self) -> CellCoord {
        CellCoord::new(self.start_row - 1, self.start_col - 1)
    }
}

/// 範囲文字列を解析する
///
/// 単一セル（"A1"）と2点指定（"A1:B3"）の両方を受け付けます。
/// 2点の順序は任意で、左上・右下に正規化されます。`$` による絶対参照記号と
/// 前後の空白は無視されます。
///
/// # 引数
///
/// * `text` - 範囲文字列
///
/// # 戻り値
///
/// * `Ok(RangeBounds)` - 正規化された境界（1始まり）
/// * `Err(QipExtractError::InvalidRange)` - 空文字列、または形式が不正な場合
///
/// # 使用例
///
/// ```rust
/// use qipextract::parse_range;
///
/// let bounds = parse_range("R10:K3").unwrap();
/// assert_eq!((bounds.start_row, bounds.end_row), (3, 10));
/// assert_eq!((bounds.start_col, bounds.end_col), (11, 18));
/// ```
pub fn parse_range(text: &str) -> Result<RangeBounds, QipExtractError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(QipExtractError::invalid_range(text, "range is empty"));
    }

    let mut parts = trimmed.split(':');
    let first = parts.next().unwrap_or_default();
    let second = parts.next();
    if parts.next().is_some() {
        return Err(QipExtractError::invalid_range(text, "too many ':' separators"));
    }

    let start = parse_cell_address(first).map_err(|e| rewrap(text, e))?;
    let end = match second {
        Some(corner) => parse_cell_address(corner).map_err(|e| rewrap(text, e))?,
        None => start,
    };

    Ok(RangeBounds {
        start_row: start.row.min(end.row) + 1,
        end_row: start.row.max(end.row) + 1,
        start_col: start.col.min(end.col) + 1,
        end_col: start.col.max(end.col) + 1,
    })
}

/// A1形式のセルアドレスを0始まりの座標に変換する
///
/// # 戻り値
///
/// * `Err(QipExtractError::InvalidRange)` - 列文字・行番号が欠けている、または範囲外の場合
pub fn parse_cell_address(address: &str) -> Result<CellCoord, QipExtractError> {
    let cleaned: String = address
        .trim()
        .chars()
        .filter(|c| *c != '$')
        .collect();

    let split = cleaned
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(cleaned.len());
    let (letters, digits) = cleaned.split_at(split);

    if letters.is_empty() {
        return Err(QipExtractError::invalid_range(address, "missing column letters"));
    }
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(QipExtractError::invalid_range(address, "missing row number"));
    }

    let col = column_letters_to_index(letters)
        .ok_or_else(|| QipExtractError::invalid_range(address, "column out of bounds"))?;
    let row: u32 = digits
        .parse()
        .map_err(|_| QipExtractError::invalid_range(address, "row out of bounds"))?;
    if row == 0 || row > MAX_ROWS {
        return Err(QipExtractError::invalid_range(address, "row out of bounds"));
    }

    Ok(CellCoord::new(row - 1, col))
}

/// 列文字を0始まりのインデックスに変換する（"A" -> 0, "AA" -> 26）
pub(crate) fn column_letters_to_index(letters: &str) -> Option<u32> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut index: u32 = 0;
    for c in letters.chars() {
        let c = c.to_ascii_uppercase();
        if !c.is_ascii_uppercase() {
            return None;
        }
        index = index * 26 + (c as u32 - 'A' as u32 + 1);
    }
    (index <= MAX_COLS).then(|| index - 1)
}

/// セルアドレスのエラーを範囲文字列全体のエラーとして包み直す
fn rewrap(input: &str, error: QipExtractError) -> QipExtractError {
    match error {
        QipExtractError::InvalidRange { input: cell, reason } => {
            QipExtractError::invalid_range(input, format!("{} ('{}')", reason, cell))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::col_index_to_letter;
    use proptest::prelude::*;

    #[test]
    fn test_two_corner_range() {
        let bounds = parse_range("K3:R10").unwrap();
        assert_eq!(
            bounds,
            RangeBounds {
                start_row: 3,
                end_row: 10,
                start_col: 11,
                end_col: 18,
            }
        );
        assert_eq!(bounds.width(), 8);
        assert_eq!(bounds.height(), 8);
        assert_eq!(bounds.top_left(), CellCoord::new(2, 10));
    }

    #[test]
    fn test_single_cell_range() {
        let bounds = parse_range(" b2 ").unwrap();
        assert_eq!(bounds.start_row, 2);
        assert_eq!(bounds.end_row, 2);
        assert_eq!(bounds.start_col, 2);
        assert_eq!(bounds.end_col, 2);
    }

    #[test]
    fn test_mixed_corners_are_normalized() {
        // 右上・左下の指定
        let bounds = parse_range("D1:B3").unwrap();
        assert_eq!((bounds.start_row, bounds.end_row), (1, 3));
        assert_eq!((bounds.start_col, bounds.end_col), (2, 4));
    }

    #[test]
    fn test_absolute_references() {
        assert_eq!(parse_range("$A$1:$C$2").unwrap(), parse_range("A1:C2").unwrap());
    }

    #[test]
    fn test_malformed_ranges() {
        for input in ["", "   ", "K3:", ":R10", "K:R10", "3:10", "A0", "A1:B2:C3", "1A", "K3-R10"] {
            let result = parse_range(input);
            assert!(
                matches!(result, Err(QipExtractError::InvalidRange { .. })),
                "expected failure for {:?}",
                input
            );
        }
    }

    #[test]
    fn test_column_bounds() {
        assert_eq!(column_letters_to_index("A"), Some(0));
        assert_eq!(column_letters_to_index("z"), Some(25));
        assert_eq!(column_letters_to_index("AA"), Some(26));
        assert_eq!(column_letters_to_index("XFD"), Some(16_383));
        assert_eq!(column_letters_to_index("XFE"), None);
        assert_eq!(column_letters_to_index("ABCD"), None);
    }

    #[test]
    fn test_row_bounds() {
        assert!(parse_cell_address("A1048576").is_ok());
        assert!(parse_cell_address("A1048577").is_err());
        assert!(parse_cell_address("A99999999999").is_err());
    }

    proptest! {
        #[test]
        fn prop_bounds_are_ordered(
            c1 in 0u32..700, r1 in 1u32..5000,
            c2 in 0u32..700, r2 in 1u32..5000,
        ) {
            let text = format!(
                "{}{}:{}{}",
                col_index_to_letter(c1), r1,
                col_index_to_letter(c2), r2
            );
            let bounds = parse_range(&text).unwrap();
            prop_assert!(bounds.start_row <= bounds.end_row);
            prop_assert!(bounds.start_col <= bounds.end_col);
            prop_assert_eq!(bounds.start_row, r1.min(r2));
            prop_assert_eq!(bounds.end_col, c1.max(c2) + 1);
        }

        #[test]
        fn prop_column_letters_round_trip(col in 0u32..16_384) {
            prop_assert_eq!(column_letters_to_index(&col_index_to_letter(col)), Some(col));
        }
    }
}
