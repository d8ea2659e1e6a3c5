//! CSV / XLSX エクスポート
//!
//! 成果物は一時ディレクトリに書き出し、[`ExportBundle`] がそのディレクトリを所有する。
//! 呼び出し側が配送後にバンドルを破棄（または [`ExportBundle::close`]）した時点で削除される。

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use rust_xlsxwriter::{Format, Workbook};
use tempfile::TempDir;
use tracing::info;

use crate::config::{ExportFormat, PipelineConfig};
use crate::error::ExportError;
use crate::types::{VacancyRecord, COLUMNS};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const SHEET_NAME: &str = "vacancies";

/// 書き出し済みでクローズ済みの1ファイル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub format: ExportFormat,
    pub path: PathBuf,
    pub size: u64,
}

impl ExportArtifact {
    pub fn media_type(&self) -> &'static str {
        self.format.media_type()
    }
}

/// 1回分の成果物一式（破棄でファイルも消える）
#[derive(Debug)]
pub struct ExportBundle {
    dir: TempDir,
    artifacts: Vec<ExportArtifact>,
}

impl ExportBundle {
    pub fn artifacts(&self) -> &[ExportArtifact] {
        &self.artifacts
    }

    pub fn get(&self, format: ExportFormat) -> Option<&ExportArtifact> {
        self.artifacts.iter().find(|a| a.format == format)
    }

    pub fn read(&self, artifact: &ExportArtifact) -> std::io::Result<Vec<u8>> {
        std::fs::read(&artifact.path)
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn file_names(&self) -> Vec<String> {
        self.artifacts.iter().map(|a| a.file_name.clone()).collect()
    }

    /// 明示的に削除してエラーを受け取る
    pub fn close(self) -> std::io::Result<()> {
        self.dir.close()
    }
}

#[derive(Debug, Clone)]
pub struct ExportWriter {
    formats: Vec<ExportFormat>,
    base_name: String,
    parent_dir: Option<PathBuf>,
}

impl ExportWriter {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            formats: config.export_formats.clone(),
            base_name: config.export_base_name.clone(),
            parent_dir: config.export_dir.clone(),
        }
    }

    /// 形式ごとに1ファイル。途中で失敗したら一時ディレクトリごと破棄される
    pub fn export(&self, records: &[VacancyRecord]) -> Result<ExportBundle, ExportError> {
        let dir = match &self.parent_dir {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                tempfile::Builder::new().prefix("vacancy-export-").tempdir_in(parent)?
            }
            None => tempfile::Builder::new().prefix("vacancy-export-").tempdir()?,
        };

        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let mut artifacts = Vec::with_capacity(self.formats.len());

        for format in &self.formats {
            let file_name = format!("{}_{}.{}", self.base_name, stamp, format.extension());
            let path = dir.path().join(&file_name);
            match format {
                ExportFormat::Csv => write_csv(&path, records)?,
                ExportFormat::Xlsx => write_xlsx(&path, records)?,
            }
            let size = std::fs::metadata(&path)?.len();
            info!(file = %file_name, rows = records.len(), size, "artifact written");
            artifacts.push(ExportArtifact {
                file_name,
                format: *format,
                path,
                size,
            });
        }

        Ok(ExportBundle { dir, artifacts })
    }
}

/// BOM付きUTF-8のCSV
pub fn csv_bytes(records: &[VacancyRecord]) -> Result<Vec<u8>, ExportError> {
    let mut buffer = UTF8_BOM.to_vec();
    {
        let mut writer = csv::Writer::from_writer(&mut buffer);
        writer.write_record(COLUMNS)?;
        for record in records {
            writer.write_record(record.row())?;
        }
        writer.flush()?;
    }
    Ok(buffer)
}

fn write_csv(path: &Path, records: &[VacancyRecord]) -> Result<(), ExportError> {
    let bytes = csv_bytes(records)?;
    let mut file = BufWriter::new(File::create(path)?);
    file.write_all(&bytes)?;
    file.flush()?;
    file.get_ref().sync_all()?;
    Ok(())
}

pub fn xlsx_bytes(records: &[VacancyRecord]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, name) in COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *name, &header)?;
    }
    for (i, record) in records.iter().enumerate() {
        let row = (i + 1) as u32;
        for (col, value) in record.row().iter().enumerate() {
            sheet.write_string(row, col as u16, value)?;
        }
    }
    sheet.autofit();

    Ok(workbook.save_to_buffer()?)
}

fn write_xlsx(path: &Path, records: &[VacancyRecord]) -> Result<(), ExportError> {
    let bytes = xlsx_bytes(records)?;
    let mut file = File::create(path)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    Ok(())
}
