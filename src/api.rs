//! Public API Types
//!
//! 公開APIで使用する列挙型と進捗イベントを定義するモジュール。

use serde::Serialize;

/// ページ処理エラーの分類
///
/// エラーメッセージに含まれるキーワードから分類されます。
/// 判定順は `Format` → `Data` → `Chart` → `Sheet` → `Range` で、
/// どれにも該当しない場合は `General` になります。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[non_exhaustive]
pub enum ErrorType {
    /// 格式錯誤（"格式" / "format"）
    Format,

    /// 數據錯誤（"數據" / "data"）
    Data,

    /// 圖表錯誤（"圖表" / "chart"）
    Chart,

    /// 工作表錯誤（"工作表" / "worksheet" / "sheet"）
    Sheet,

    /// 範圍錯誤（"範圍" / "range"）
    Range,

    /// 一般錯誤
    General,
}

impl ErrorType {
    /// メッセージからエラー種別を判定
    ///
    /// 英字キーワードは大文字・小文字を区別しません。
    ///
    /// # 使用例
    ///
    /// ```rust
    /// use qipextract::ErrorType;
    ///
    /// assert_eq!(ErrorType::classify("Invalid range 'K3:'"), ErrorType::Range);
    /// assert_eq!(ErrorType::classify("數據格式不正確"), ErrorType::Format);
    /// assert_eq!(ErrorType::classify("unexpected"), ErrorType::General);
    /// ```
    pub fn classify(message: &str) -> Self {
        const RULES: &[(ErrorType, &[&str])] = &[
            (ErrorType::Format, &["格式", "format"]),
            (ErrorType::Data, &["數據", "data"]),
            (ErrorType::Chart, &["圖表", "chart"]),
            (ErrorType::Sheet, &["工作表", "worksheet", "sheet"]),
            (ErrorType::Range, &["範圍", "range"]),
        ];

        let lowered = message.to_lowercase();
        RULES
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
            .map(|(kind, _)| *kind)
            .unwrap_or(ErrorType::General)
    }

    /// 表示用ラベル
    pub fn label(&self) -> &'static str {
        match self {
            ErrorType::Format => "格式錯誤",
            ErrorType::Data => "數據錯誤",
            ErrorType::Chart => "圖表錯誤",
            ErrorType::Sheet => "工作表錯誤",
            ErrorType::Range => "範圍錯誤",
            ErrorType::General => "一般錯誤",
        }
    }
}

impl Serialize for ErrorType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// 抽出実行のフェーズ
///
/// 1回の実行は `Idle → ReadingFiles → ExtractingPages → ResolvingSpecifications → Done`
/// の順にのみ遷移し、逆方向には戻りません。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RunPhase {
    Idle,
    ReadingFiles,
    ExtractingPages,
    ResolvingSpecifications,
    Done,
}

/// 進捗通知イベント
///
/// `ExtractorBuilder::with_progress` で登録したチャネルへ送信されます。
/// `percent` は1回の実行の中で単調非減少です。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// 現在のフェーズ
    pub phase: RunPhase,

    /// 処理中のファイル番号（1始まり、ファイル処理前は0）
    pub current_file: usize,

    /// ファイル総数
    pub total_files: usize,

    /// 進捗率（0〜100）
    pub percent: u8,

    /// 表示用メッセージ
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_keywords() {
        assert_eq!(ErrorType::classify("bad number format"), ErrorType::Format);
        assert_eq!(ErrorType::classify("數據缺失"), ErrorType::Data);
        assert_eq!(ErrorType::classify("Chart rendering failed"), ErrorType::Chart);
        assert_eq!(ErrorType::classify("找不到工作表"), ErrorType::Sheet);
        assert_eq!(
            ErrorType::classify("worksheet 'Batch1' is unavailable: x"),
            ErrorType::Sheet
        );
        assert_eq!(ErrorType::classify("超出範圍"), ErrorType::Range);
        assert_eq!(ErrorType::classify("boom"), ErrorType::General);
    }

    #[test]
    fn test_classify_order() {
        // "format" が "sheet" より優先される
        assert_eq!(
            ErrorType::classify("sheet has invalid FORMAT"),
            ErrorType::Format
        );
        // "data" が "range" より優先される
        assert_eq!(ErrorType::classify("data out of range"), ErrorType::Data);
    }

    #[test]
    fn test_labels() {
        assert_eq!(ErrorType::Range.label(), "範圍錯誤");
        assert_eq!(ErrorType::General.to_string(), "一般錯誤");
    }

    #[test]
    fn test_phase_order() {
        assert!(RunPhase::Idle < RunPhase::ReadingFiles);
        assert!(RunPhase::ResolvingSpecifications < RunPhase::Done);
    }
}
