//! Extraction Schema
//!
//! 穴組（cavity group）ごとの抽出ルールを保持する設定モデル。
//! 1回の実行（複数ファイル）全体を1つのスキーマが駆動します。

use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::QipExtractError;
use crate::range::{parse_range, RangeBounds};

/// 穴組の数（固定）
pub const GROUP_COUNT: usize = 6;

/// 1つの穴組の抽出ルール
///
/// * `cavity_id_range` - 穴番号ラベルが並ぶ範囲（例: "K3:R3"）
/// * `data_range` - 測定値が並ぶ範囲（例: "K5:R20"）
/// * `page_offset` - アンカーページから対象ページまでのオフセット
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupConfig {
    pub cavity_id_range: String,
    pub data_range: String,
    pub page_offset: usize,
}

impl GroupConfig {
    /// オフセット0の穴組を生成
    pub fn new(cavity_id_range: impl Into<String>, data_range: impl Into<String>) -> Self {
        Self {
            cavity_id_range: cavity_id_range.into(),
            data_range: data_range.into(),
            page_offset: 0,
        }
    }

    /// ページオフセットを設定
    pub fn with_page_offset(mut self, page_offset: usize) -> Self {
        self.page_offset = page_offset;
        self
    }

    /// 範囲文字列を解析する（`index`は穴組番号）
    ///
    /// # 戻り値
    ///
    /// * `Err(QipExtractError::InvalidRange)` - どちらかの範囲が解析できない場合
    pub fn resolve(&self, index: usize) -> Result<ResolvedGroup, QipExtractError> {
        Ok(ResolvedGroup {
            index,
            cavity_ids: parse_range(&self.cavity_id_range)?,
            data: parse_range(&self.data_range)?,
            page_offset: self.page_offset,
        })
    }

    /// 両方の範囲が入力されているか
    fn has_ranges(&self) -> bool {
        !self.cavity_id_range.trim().is_empty() && !self.data_range.trim().is_empty()
    }
}

/// 範囲を解析済みの穴組
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedGroup {
    /// 穴組番号（1始まり）
    pub index: usize,
    /// 穴番号ラベルの範囲
    pub cavity_ids: RangeBounds,
    /// 測定値の範囲
    pub data: RangeBounds,
    pub page_offset: usize,
}

/// 抽出スキーマ
///
/// 6つの穴組スロットを持ち、各スロットは有効な穴組か `None` です。
///
/// # JSON形式
///
/// ```json
/// {
///   "cavityGroups": {
///     "1": { "cavityIdRange": "B1:D1", "dataRange": "B2:D2", "pageOffset": 0 },
///     "2": { "cavityIdRange": "B1:D1", "dataRange": "B2:D2", "pageOffset": 1 }
///   }
/// }
/// ```
///
/// キーは "1"〜"6" のみ受け付けます。範囲が空の穴組は無効（`None`）として読み込まれます。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SchemaDocument", into = "SchemaDocument")]
pub struct ExtractionSchema {
    groups: [Option<GroupConfig>; GROUP_COUNT],
}

impl ExtractionSchema {
    /// 空のスキーマを生成
    pub fn new() -> Self {
        Self::default()
    }

    /// JSON文字列から読み込む
    ///
    /// # 戻り値
    ///
    /// * `Err(QipExtractError::Json)` - JSONが不正、またはキーが1〜6の範囲外の場合
    pub fn from_json_str(json: &str) -> Result<Self, QipExtractError> {
        Ok(serde_json::from_str(json)?)
    }

    /// リーダーからJSONを読み込む
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, QipExtractError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// 穴組を設定する（`index`は1始まり）
    ///
    /// 範囲が空の穴組を渡した場合、そのスロットは無効になります。
    ///
    /// # 戻り値
    ///
    /// * `Err(QipExtractError::Config)` - `index`が1〜6の範囲外の場合
    pub fn set_group(
        &mut self,
        index: usize,
        group: Option<GroupConfig>,
    ) -> Result<(), QipExtractError> {
        let slot = slot_for(index)?;
        self.groups[slot] = group.filter(GroupConfig::has_ranges);
        Ok(())
    }

    /// 穴組を取得する（`index`は1始まり）
    pub fn group(&self, index: usize) -> Option<&GroupConfig> {
        index
            .checked_sub(1)
            .and_then(|slot| self.groups.get(slot))
            .and_then(Option::as_ref)
    }

    /// 有効な穴組を番号順に列挙する（番号は1始まり）
    pub fn active_groups(&self) -> impl Iterator<Item = (usize, &GroupConfig)> {
        self.groups
            .iter()
            .enumerate()
            .filter_map(|(slot, group)| group.as_ref().map(|g| (slot + 1, g)))
    }

    /// ページ走査の刻み幅（有効な穴組の最大オフセット + 1）
    pub fn step(&self) -> usize {
        self.active_groups()
            .map(|(_, group)| group.page_offset)
            .max()
            .unwrap_or(0)
            + 1
    }

    /// 実行可能なスキーマかを検証する
    ///
    /// # 戻り値
    ///
    /// * `Err(QipExtractError::Config)` - 有効な穴組が1つもない場合
    pub fn validate(&self) -> Result<(), QipExtractError> {
        if self.active_groups().next().is_none() {
            return Err(QipExtractError::Config(
                "at least one cavity group needs both cavityIdRange and dataRange".to_string(),
            ));
        }
        Ok(())
    }
}

fn slot_for(index: usize) -> Result<usize, QipExtractError> {
    if (1..=GROUP_COUNT).contains(&index) {
        Ok(index - 1)
    } else {
        Err(QipExtractError::Config(format!(
            "cavity group index {} is outside 1..={}",
            index, GROUP_COUNT
        )))
    }
}

/// JSON上の表現
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchemaDocument {
    #[serde(default)]
    cavity_groups: BTreeMap<String, GroupDocument>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GroupDocument {
    cavity_id_range: String,
    data_range: String,
    page_offset: usize,
}

impl TryFrom<SchemaDocument> for ExtractionSchema {
    type Error = QipExtractError;

    fn try_from(document: SchemaDocument) -> Result<Self, Self::Error> {
        let mut schema = ExtractionSchema::new();
        for (key, group) in document.cavity_groups {
            let index: usize = key.trim().parse().map_err(|_| {
                QipExtractError::Config(format!("cavity group key '{}' is not a number", key))
            })?;
            schema.set_group(
                index,
                Some(GroupConfig {
                    cavity_id_range: group.cavity_id_range.trim().to_string(),
                    data_range: group.data_range.trim().to_string(),
                    page_offset: group.page_offset,
                }),
            )?;
        }
        Ok(schema)
    }
}

impl From<ExtractionSchema> for SchemaDocument {
    fn from(schema: ExtractionSchema) -> Self {
        let cavity_groups = schema
            .active_groups()
            .map(|(index, group)| {
                (
                    index.to_string(),
                    GroupDocument {
                        cavity_id_range: group.cavity_id_range.clone(),
                        data_range: group.data_range.clone(),
                        page_offset: group.page_offset,
                    },
                )
            })
            .collect();
        SchemaDocument { cavity_groups }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_from_max_offset() {
        let mut schema = ExtractionSchema::new();
        assert_eq!(schema.step(), 1);

        schema
            .set_group(1, Some(GroupConfig::new("B1:D1", "B2:D2")))
            .unwrap();
        schema
            .set_group(3, Some(GroupConfig::new("B1:D1", "B2:D2").with_page_offset(2)))
            .unwrap();
        assert_eq!(schema.step(), 3);
    }

    #[test]
    fn test_blank_ranges_make_group_inactive() {
        let mut schema = ExtractionSchema::new();
        schema
            .set_group(2, Some(GroupConfig::new("B1:D1", "  ").with_page_offset(5)))
            .unwrap();
        assert!(schema.group(2).is_none());
        assert_eq!(schema.step(), 1);
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_index_out_of_range() {
        let mut schema = ExtractionSchema::new();
        assert!(matches!(
            schema.set_group(0, Some(GroupConfig::new("A1", "A2"))),
            Err(QipExtractError::Config(_))
        ));
        assert!(schema.set_group(7, None).is_err());
        assert!(schema.group(0).is_none());
        assert!(schema.group(7).is_none());
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "cavityGroups": {
                "1": { "cavityIdRange": "K3:R3", "dataRange": "K5:R20", "pageOffset": 0 },
                "2": { "cavityIdRange": "K3:R3", "dataRange": "K5:R20", "pageOffset": 1 },
                "4": { "cavityIdRange": "", "dataRange": "" }
            }
        }"#;
        let schema = ExtractionSchema::from_json_str(json).unwrap();
        let active: Vec<usize> = schema.active_groups().map(|(i, _)| i).collect();
        assert_eq!(active, vec![1, 2]);
        assert_eq!(schema.group(2).unwrap().page_offset, 1);
        assert_eq!(schema.step(), 2);
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_from_json_rejects_bad_keys() {
        let json = r#"{"cavityGroups": {"7": {"cavityIdRange": "A1", "dataRange": "A2"}}}"#;
        assert!(matches!(
            ExtractionSchema::from_json_str(json),
            Err(QipExtractError::Json(_))
        ));

        let json = r#"{"cavityGroups": {"one": {"cavityIdRange": "A1", "dataRange": "A2"}}}"#;
        assert!(ExtractionSchema::from_json_str(json).is_err());

        let json = r#"{"cavityGroups": {"1": {"cavityIdRange": "A1", "dataRange": "A2", "pageOffset": -1}}}"#;
        assert!(ExtractionSchema::from_json_str(json).is_err());
    }

    #[test]
    fn test_serialize_only_active_groups() {
        let mut schema = ExtractionSchema::new();
        schema
            .set_group(1, Some(GroupConfig::new("B1:D1", "B2:D2")))
            .unwrap();
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["cavityGroups"]["1"]["dataRange"], "B2:D2");
        assert_eq!(json["cavityGroups"]["1"]["pageOffset"], 0);
        assert!(json["cavityGroups"].get("2").is_none());

        let reread: ExtractionSchema = serde_json::from_value(json).unwrap();
        assert_eq!(reread, schema);
    }

    #[test]
    fn test_resolve_group() {
        let group = GroupConfig::new("B1:D1", "D2:B9").with_page_offset(2);
        let resolved = group.resolve(3).unwrap();
        assert_eq!(resolved.index, 3);
        assert_eq!(resolved.page_offset, 2);
        assert_eq!(resolved.data.start_col, 2);
        assert_eq!(resolved.data.end_row, 9);

        assert!(matches!(
            GroupConfig::new("B1:", "B2:D2").resolve(1),
            Err(QipExtractError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_from_reader() {
        let json = br#"{"cavityGroups": {"6": {"cavityIdRange": "A1", "dataRange": "A2"}}}"#;
        let schema = ExtractionSchema::from_json_reader(&json[..]).unwrap();
        assert!(schema.group(6).is_some());
    }
}
