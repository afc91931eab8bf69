//! 申报上下文
//!
//! 封装"我正在处理哪一个申报请求"这一信息，并持有该请求私有的临时目录

use std::fmt::Display;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate, Utc};
use tempfile::TempDir;

use crate::models::FilingRequest;

/// 申报上下文
///
/// 每个请求一个，请求之间不共享任何目录；drop 时临时目录随之删除
#[derive(Debug)]
pub struct FilingCtx {
    /// 请求 ID（批处理时为请求文件名）
    pub request_id: String,

    pub session_id: String,

    pub return_id: String,

    /// 请求私有的工作目录
    work_dir: TempDir,

    /// 浏览器下载目录（工作目录的子目录）
    download_dir: PathBuf,

    pub started_at: DateTime<Utc>,

    /// 回执文件名中的日期
    pub filing_date: NaiveDate,
}

impl FilingCtx {
    /// 创建上下文和临时目录
    pub fn new(request_id: impl Into<String>, request: &FilingRequest) -> std::io::Result<Self> {
        Self::with_date(request_id, request, Local::now().date_naive())
    }

    /// 指定申报日期
    pub fn with_date(
        request_id: impl Into<String>,
        request: &FilingRequest,
        filing_date: NaiveDate,
    ) -> std::io::Result<Self> {
        let work_dir = tempfile::Builder::new().prefix("nil-return-").tempdir()?;
        let download_dir = work_dir.path().join("downloads");
        std::fs::create_dir_all(&download_dir)?;

        let correlation = request.correlation();
        Ok(Self {
            request_id: request_id.into(),
            session_id: correlation.session_id.clone(),
            return_id: correlation.return_id.clone(),
            work_dir,
            download_dir,
            started_at: Utc::now(),
            filing_date,
        })
    }

    pub fn work_dir(&self) -> &Path {
        self.work_dir.path()
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }
}

impl Display for FilingCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[申报 {}]", self.request_id)
    }
}
