//! 表格存储服务 - 业务能力层
//!
//! 只负责"按行写入分析结果"能力：
//! - 保证表头与固定列一致
//! - 根据已有行数给出下一个 Clause ID
//! - 按 Clause ID 升序追加行

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::clause::{SheetRow, SHEET_HEADER};

/// 行式存储
#[async_trait]
pub trait SheetStore: Send + Sync {
    /// 表头不一致时改写第一行，返回是否做了修改
    async fn ensure_header(&self) -> Result<bool, StoreError>;

    /// 下一个可用的 Clause ID
    async fn next_id(&self) -> Result<u64, StoreError>;

    /// 按 Clause ID 升序追加
    async fn append_rows(&self, rows: &[SheetRow]) -> Result<(), StoreError>;
}

/// 本地制表符分隔文件
pub struct TsvSheet {
    path: PathBuf,
}

impl TsvSheet {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    async fn read_lines(&self) -> Result<Vec<String>, StoreError> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

fn header_line() -> String {
    SHEET_HEADER.join("\t")
}

/// 转义单元格中的反斜杠、制表符和换行
fn escape_cell(cell: &str) -> String {
    let mut escaped = String::with_capacity(cell.len());
    for c in cell.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\t' => escaped.push_str("\\t"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn format_row(row: &SheetRow) -> String {
    row.cells
        .iter()
        .map(|cell| escape_cell(cell))
        .collect::<Vec<_>>()
        .join("\t")
}

#[async_trait]
impl SheetStore for TsvSheet {
    async fn ensure_header(&self) -> Result<bool, StoreError> {
        let mut lines = self.read_lines().await?;
        let header = header_line();

        if lines.first() == Some(&header) {
            return Ok(false);
        }

        match lines.first_mut() {
            Some(first) => *first = header,
            None => lines.push(header),
        }

        let mut content = lines.join("\n");
        content.push('\n');
        fs::write(&self.path, content)
            .await
            .map_err(|e| self.io_error(e))?;

        info!("表头已更新: {}", self.path.display());
        Ok(true)
    }

    async fn next_id(&self) -> Result<u64, StoreError> {
        let lines = self.read_lines().await?;

        let mut rows = 0u64;
        let mut max_id = 0u64;
        for (idx, line) in lines.iter().enumerate().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            rows += 1;

            let value = line.split('\t').next().unwrap_or_default();
            let id = value
                .trim()
                .parse::<u64>()
                .map_err(|_| StoreError::BadClauseId {
                    line: idx + 1,
                    value: value.to_string(),
                })?;
            max_id = max_id.max(id);
        }

        let last = rows.max(max_id);
        last.checked_add(1).ok_or(StoreError::IdExhausted { last })
    }

    async fn append_rows(&self, rows: &[SheetRow]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut ordered: Vec<&SheetRow> = rows.iter().collect();
        ordered.sort_by_key(|row| row.clause_id);

        let mut buffer = String::new();
        for row in ordered {
            buffer.push_str(&format_row(row));
            buffer.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        file.write_all(buffer.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))?;

        debug!("写入 {} 行 -> {}", rows.len(), self.path.display());
        Ok(())
    }
}
