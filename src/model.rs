use std::path::PathBuf;

use url::Url;

/// 单个相册的下载任务
#[derive(Debug, Clone)]
pub struct AlbumJob {
    pub name: String,
    pub source: Url,
    pub output_dir: PathBuf,
}

/// 原图请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub url: Url,
    pub file_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// 文件已存在
    Skipped,
    Saved { bytes: usize },
    Rejected,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlbumSummary {
    pub saved: usize,
    pub skipped: usize,
    pub rejected: usize,
}

impl AlbumSummary {
    pub fn record(&mut self, outcome: DownloadOutcome) {
        match outcome {
            DownloadOutcome::Skipped => self.skipped += 1,
            DownloadOutcome::Saved { .. } => self.saved += 1,
            DownloadOutcome::Rejected => self.rejected += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.saved + self.skipped + self.rejected
    }
}
