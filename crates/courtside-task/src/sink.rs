use std::fs;
use std::path::Path;

use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("文件写入失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("写入 CSV 失败: {0}")]
    Csv(#[from] csv::Error),
}

/// 可写出的数据集记录；`COLUMNS` 与序列化字段顺序一致
pub trait Table: Serialize {
    const COLUMNS: &'static [&'static str];
}

/// 将数据集写为带表头的分隔文本文件
///
/// 表头取自 `T::COLUMNS`，没有记录时也会写出；NULL 写为空字段。
/// 写入失败不会回滚已写出的内容。
pub fn write_table<T: Table>(
    path: &Path,
    rows: &[T],
    delimiter: u8,
) -> Result<usize, SinkError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(T::COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    tracing::debug!("已写入 {:?}，共 {} 行", path, rows.len());
    Ok(rows.len())
}
