//! FormatSection Module
//!
//! `;` で区切られた表示形式のセクション。

use super::tokens::FormatToken;

/// 1つのセクション
#[derive(Debug, Clone, Default)]
pub(crate) struct FormatSection {
    pub tokens: Vec<FormatToken>,

    /// `[>100]` のような条件が付いているか
    pub conditional: bool,
}

impl FormatSection {
    /// 日付・時刻書式かどうか
    pub fn is_datetime(&self) -> bool {
        self.tokens.iter().any(FormatToken::is_datetime)
    }

    /// 桁プレースホルダーを含むかどうか
    pub fn has_digits(&self) -> bool {
        self.tokens.iter().any(FormatToken::is_digit)
    }

    /// "General" を含む（または空の）セクションかどうか
    pub fn is_general(&self) -> bool {
        self.tokens.is_empty() || self.tokens.contains(&FormatToken::General)
    }
}
