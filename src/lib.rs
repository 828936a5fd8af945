//! qipextract - Position-based extraction of injection-molding QC measurements
//!
//! 射出成形の品質検査（QIP）ワークブックから、穴組ごとに設定したセル範囲の
//! 測定値を位置ベースで抽出し、検査項目 → バッチ → 穴番号の集計にまとめるクレートです。
//! 規格ページが見つかれば、検査項目ごとの規格（Target / USL / LSL）も解決します。
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use qipextract::{ExtractorBuilder, GroupConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 穴番号の行と測定値の範囲を穴組1に設定
//!     let extractor = ExtractorBuilder::new()
//!         .with_group(1, GroupConfig::new("K3:R3", "K5:R20"))
//!         .build()?;
//!
//!     let result = extractor.run_paths(&["QIP-0815.xlsx", "QIP-0816.xlsx"])?;
//!     for (item, aggregate) in &result.inspection_items {
//!         println!("{}: {} batches", item, aggregate.batches.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # JSON設定と進捗通知
//!
//! ```rust,no_run
//! use std::fs::File;
//! use std::sync::mpsc;
//! use qipextract::{ExtractionSchema, ExtractorBuilder};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let schema = ExtractionSchema::from_json_reader(File::open("schema.json")?)?;
//!     let (tx, rx) = mpsc::channel();
//!     let extractor = ExtractorBuilder::new()
//!         .with_schema(schema)
//!         .with_progress(tx)
//!         .build()?;
//!
//!     let result = extractor.run_paths(&["QIP-0815.xlsx"])?;
//!     drop(extractor);
//!     for event in rx {
//!         println!("{:>3}% {}", event.percent, event.message);
//!     }
//!     result.render_export_markdown(&mut std::io::stdout())?;
//!     Ok(())
//! }
//! ```

mod api;
mod builder;
mod config;
mod error;
mod error_log;
mod parser;
mod range;
mod result;
mod schema;
mod security;
mod types;

pub mod engine;
pub mod export;
pub mod extractor;
pub mod format;
pub mod logging;
pub mod specification;

// 公開API
pub use api::{ErrorType, ProgressEvent, RunPhase};
pub use builder::{Extractor, ExtractorBuilder};
pub use config::{ExtractionSchema, GroupConfig, ResolvedGroup, GROUP_COUNT};
pub use error::QipExtractError;
pub use error_log::{ErrorLog, ErrorRecord, ErrorSummary};
pub use export::{BatchRow, ExportSheet, SpecRow};
pub use parser::{SourceData, WorkbookParser, WorkbookSource};
pub use range::{parse_cell_address, parse_range, RangeBounds};
pub use result::{
    CavityValues, InspectionItemAggregate, PageExtraction, ProductInfo, RunResult,
    SpecificationData,
};
pub use schema::{
    is_eligible_page, is_excluded_page, SpecColumns, BATCH_NUMBER_HEADER, EXCLUDED_PAGES,
    SPEC_COLUMNS,
};
pub use security::SecurityLimits;
pub use types::{CellCoord, CellRecord, CellValue, Page, PageSlot, WorkbookData};
