//! Result Aggregate
//!
//! 抽出結果のデータモデル。検査項目ごとにバッチ別の穴番号→測定値マップ、
//! 観測された穴番号の集合、解決済みの規格を保持します。

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::error::QipExtractError;
use crate::error_log::ErrorLog;

/// 穴番号 → 測定値
pub type CavityValues = IndexMap<String, f64>;

/// 1検査項目の規格（公差）
///
/// `is_valid == false` は「見つからなかった」状態で、数値はすべて0です。
/// 有効な規格では常に `usl >= lsl` が成立し、公差は大きさ（非負）で保持されます。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecificationData {
    pub symbol: String,
    pub nominal_value: f64,
    pub upper_tolerance: f64,
    pub lower_tolerance: f64,
    pub usl: f64,
    pub lsl: f64,
    pub target: f64,
    pub is_valid: bool,
}

impl SpecificationData {
    /// 未検出（無効）の規格
    pub fn invalid() -> Self {
        Self::default()
    }
}

/// 製品情報
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInfo {
    pub product_name: String,
    pub measurement_unit: String,
}

/// 1検査項目の集計
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionItemAggregate {
    /// バッチ名 → 穴番号 → 測定値（バッチは発見順）
    pub batches: IndexMap<String, CavityValues>,

    /// これまでに観測したすべての穴番号
    pub all_cavities: IndexSet<String>,

    /// 解決済みの規格（規格解決前は`None`）
    pub specification: Option<SpecificationData>,
}

impl InspectionItemAggregate {
    /// バッチに測定値をマージする
    ///
    /// 既存のバッチには和集合としてマージし、同じ穴番号は後の値で上書きします。
    ///
    /// # 戻り値
    ///
    /// バッチが新規に作成された場合は`true`
    pub fn merge_batch(&mut self, batch_name: &str, values: &CavityValues) -> bool {
        let created = !self.batches.contains_key(batch_name);
        let batch = self.batches.entry(batch_name.to_string()).or_default();
        for (cavity, value) in values {
            batch.insert(cavity.clone(), *value);
            self.all_cavities.insert(cavity.clone());
        }
        created
    }
}

/// 1ページ分の抽出結果（集計前）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageExtraction {
    /// バッチ名（アンカーページ名）
    pub batch_name: String,

    /// 発見順の (検査項目名, 測定値) の組
    pub items: Vec<(String, CavityValues)>,
}

/// 実行結果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    /// 検査項目名 → 集計（発見順）
    pub inspection_items: IndexMap<String, InspectionItemAggregate>,

    /// 検査項目ごとに新しいバッチが追加された回数
    pub total_batches: usize,

    /// 検査項目ごとの穴番号集合の最大サイズ
    pub total_cavities: usize,

    /// 処理に成功したアンカーページ数
    pub processed_sheets: usize,

    pub product_info: ProductInfo,

    /// ページ処理エラーのログ
    pub errors: ErrorLog,

    pub has_errors: bool,
}

impl RunResult {
    /// 1ページ分の抽出結果を集計に畳み込む
    ///
    /// 項目名が空、または測定値が空の組は無視されます。
    pub fn absorb(&mut self, page: PageExtraction) {
        for (item_name, values) in page.items {
            self.add_values(&item_name, &page.batch_name, &values);
        }
    }

    /// 1つの (検査項目, バッチ, 測定値) を集計に加える
    pub fn add_values(&mut self, item_name: &str, batch_name: &str, values: &CavityValues) {
        if item_name.is_empty() || values.is_empty() {
            return;
        }

        let item = self
            .inspection_items
            .entry(item_name.to_string())
            .or_default();
        if item.merge_batch(batch_name, values) {
            self.total_batches += 1;
        }
        self.total_cavities = self.total_cavities.max(item.all_cavities.len());
    }

    /// 検査項目数
    pub fn item_count(&self) -> usize {
        self.inspection_items.len()
    }

    /// 整形済みJSON文字列に変換する
    pub fn to_json_pretty(&self) -> Result<String, QipExtractError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, f64)]) -> CavityValues {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_merge_is_union_with_last_write_wins() {
        let mut result = RunResult::default();
        result.add_values("外徑", "Batch1", &values(&[("1", 1.0), ("2", 2.0)]));
        result.add_values("外徑", "Batch1", &values(&[("2", 2.5), ("3", 3.0)]));

        let item = &result.inspection_items["外徑"];
        assert_eq!(item.batches["Batch1"], values(&[("1", 1.0), ("2", 2.5), ("3", 3.0)]));
        assert_eq!(item.all_cavities.len(), 3);
        assert_eq!(result.total_batches, 1);
        assert_eq!(result.total_cavities, 3);
    }

    #[test]
    fn test_total_cavities_is_max_not_sum() {
        let mut result = RunResult::default();
        result.add_values("A", "B1", &values(&[("1", 1.0), ("2", 1.0)]));
        result.add_values("B", "B1", &values(&[("1", 1.0), ("2", 1.0), ("3", 1.0)]));
        result.add_values("C", "B1", &values(&[("4", 1.0)]));

        assert_eq!(result.total_cavities, 3);
        assert_eq!(result.total_batches, 3);
        assert_eq!(result.item_count(), 3);
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let mut result = RunResult::default();
        result.add_values("A", "B1", &CavityValues::new());
        result.add_values("", "B1", &values(&[("1", 1.0)]));
        assert_eq!(result.item_count(), 0);
        assert_eq!(result.total_batches, 0);
    }

    #[test]
    fn test_absorb_page() {
        let mut result = RunResult::default();
        result.absorb(PageExtraction {
            batch_name: "Batch1".to_string(),
            items: vec![
                ("A".to_string(), values(&[("1", 1.0)])),
                ("B".to_string(), values(&[("1", 2.0)])),
            ],
        });
        result.absorb(PageExtraction {
            batch_name: "Batch2".to_string(),
            items: vec![("A".to_string(), values(&[("2", 1.5)]))],
        });

        let names: Vec<&String> = result.inspection_items.keys().collect();
        assert_eq!(names, vec!["A", "B"]);
        let batches: Vec<&String> = result.inspection_items["A"].batches.keys().collect();
        assert_eq!(batches, vec!["Batch1", "Batch2"]);
        assert_eq!(result.total_batches, 3);
    }

    #[test]
    fn test_json_field_names() {
        let mut result = RunResult::default();
        result.add_values("A", "Batch1", &values(&[("1", 1.0)]));
        let json: serde_json::Value =
            serde_json::from_str(&result.to_json_pretty().unwrap()).unwrap();

        assert_eq!(json["inspectionItems"]["A"]["batches"]["Batch1"]["1"], 1.0);
        assert_eq!(json["inspectionItems"]["A"]["allCavities"][0], "1");
        assert!(json["inspectionItems"]["A"]["specification"].is_null());
        assert_eq!(json["totalBatches"], 1);
        assert_eq!(json["productInfo"]["productName"], "");
        assert_eq!(json["hasErrors"], false);
    }

    #[test]
    fn test_invalid_specification_is_zeroed() {
        let spec = SpecificationData::invalid();
        assert!(!spec.is_valid);
        assert_eq!(spec.usl, 0.0);
        assert_eq!(spec.lsl, 0.0);
        assert!(spec.symbol.is_empty());
    }
}
