//! FormatToken Module
//!
//! 表示形式文字列のトークン定義。

/// 表示形式トークン
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FormatToken {
    /// 年（"yyyy" -> 4, "yy" -> 2）
    Year(usize),

    /// 月（"m" -> 1, "mm" -> 2, "mmm" -> 略称, "mmmm" -> 名称）
    Month(usize),

    /// 日（"d"/"dd" -> 日付, "ddd"/"dddd" -> 曜日）
    Day(usize),

    /// 時
    Hour(usize),

    /// 分（日付書式の"m"と区別して判定済み）
    Minute(usize),

    /// 秒
    Second(usize),

    /// 経過時間（"[h]" "[mm]" "[ss]"）
    Elapsed(char, usize),

    /// 午前/午後（"AM/PM"）
    AmPm,

    /// 必須桁（"0"）
    DigitZero,

    /// 任意桁（"#"）
    DigitHash,

    /// 空白で埋める桁（"?"）
    DigitSpace,

    /// 小数点
    DecimalPoint,

    /// 千の位区切り
    ThousandSeparator,

    /// パーセント
    Percent,

    /// 指数表記（"E+" "E-"）
    Exponent,

    /// リテラル文字列
    Literal(String),

    /// 文字列プレースホルダー（"@"）
    TextPlaceholder,

    /// "General"
    General,
}

impl FormatToken {
    pub fn is_datetime(&self) -> bool {
        matches!(
            self,
            FormatToken::Year(_)
                | FormatToken::Month(_)
                | FormatToken::Day(_)
                | FormatToken::Hour(_)
                | FormatToken::Minute(_)
                | FormatToken::Second(_)
                | FormatToken::Elapsed(..)
        )
    }

    /// 桁プレースホルダーかどうか
    pub fn is_digit(&self) -> bool {
        matches!(
            self,
            FormatToken::DigitZero | FormatToken::DigitHash | FormatToken::DigitSpace
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_kinds() {
        assert!(FormatToken::Year(4).is_datetime());
        assert!(FormatToken::Elapsed('h', 1).is_datetime());
        assert!(!FormatToken::DigitZero.is_datetime());
        assert!(FormatToken::DigitSpace.is_digit());
        assert!(!FormatToken::DecimalPoint.is_digit());
        assert!(!FormatToken::Literal("0".to_string()).is_digit());
    }
}
