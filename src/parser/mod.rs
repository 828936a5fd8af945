//! Parser Module
//!
//! ワークブックのデコード層。calamineでセル値を、XLSX内部XMLから表示形式を読み取ります。

mod metadata;
mod workbook;

pub(crate) use metadata::XlsxMetadata;
pub use workbook::{SourceData, WorkbookParser, WorkbookSource};
