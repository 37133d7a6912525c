use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    thread,
};

use anyhow::Context as _;
use chrono::Local;
use clap::{Parser, Subcommand};
use env_logger::Builder;
use futures::{stream, StreamExt, TryStreamExt};
use tokio::fs;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::{load_config, AppConfig, Log};
use crate::context::Context;
use crate::error::{CustomError, EResult};
use crate::model::{AlbumJob, AlbumSummary};
use crate::request::{download_image, get_album_links};

pub const CONFIG_FILE_PATH: &str = "config.yaml";
pub const SOURCE_MARKER: &str = "_source.txt";

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// config file path
    #[arg(short, long, global = true, default_value = CONFIG_FILE_PATH)]
    pub config: PathBuf,
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// generate config file
    Generate,
    /// download every configured album
    Download {
        /// only download this album
        #[arg(short, long)]
        album: Option<String>,
    },
}

impl Commands {
    pub async fn run(&self, config_path: &Path, cancel: CancellationToken) -> anyhow::Result<()> {
        match self {
            Commands::Generate => {
                init_logger(&Log::default());
                generate(&AppConfig::default(), config_path)
            }
            Commands::Download { album } => {
                let config = load_config(config_path).with_context(|| {
                    format!("invalid configuration '{}'", config_path.display())
                })?;
                init_logger(&config.log);
                download(config, album.as_deref(), cancel).await
            }
        }
    }
}

/// 初始化日志, 重复调用时忽略
pub fn init_logger(log: &Log) {
    let _ = Builder::new()
        .parse_filters(log.level.to_string().as_str())
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{:5}] [{:20}] [{:20}] {}",
                Local::now().format("%Y-%m-%dT%H:%M:%S"),
                record.level(),
                record.target(),
                thread::current().name().unwrap_or("unknown"),
                record.args()
            )
        })
        .try_init();
}

/// 生成默认配置文件
///
/// # Arguments
///
/// * `config` - 配置
/// * `file` - 配置文件路径
fn generate(config: &AppConfig, file: &Path) -> anyhow::Result<()> {
    let config_str = serde_yaml::to_string(config)?;
    let mut out = File::create(file)
        .with_context(|| format!("cannot create config file '{}'", file.display()))?;
    out.write_all(config_str.as_bytes())?;
    log::info!("generate config file success: {}", file.display());
    Ok(())
}

///
/// 根据配置生成相册任务, 保持配置中的顺序
///
/// # Arguments
///
/// * `config` - 配置
/// * `only` - 只保留该名称的相册
///
pub fn album_jobs(config: &AppConfig, only: Option<&str>) -> EResult<Vec<AlbumJob>> {
    let root = PathBuf::from(&config.output_directory);
    let jobs: Vec<AlbumJob> = config
        .albums
        .iter()
        .filter(|(name, _)| only.map_or(true, |only| only == name.as_str()))
        .map(|(name, source)| AlbumJob {
            name: name.clone(),
            source: source.clone(),
            output_dir: root.join(format!("{}{}", config.album_prefix, name)),
        })
        .collect();
    if let Some(only) = only {
        if jobs.is_empty() {
            return Err(CustomError::ConfigError {
                message: format!("album '{}' is not configured", only),
            });
        }
    }
    Ok(jobs)
}

/// 依次下载所有相册
///
/// # Arguments
///
/// * `config` - 已校验的配置
/// * `only` - 只下载该名称的相册
/// * `cancel` - 取消信号
pub async fn download(
    config: AppConfig,
    only: Option<&str>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let jobs = album_jobs(&config, only)?;
    let ctx = Context::new(config, cancel).context("cannot build http client")?;
    log::info!("download start, {} albums", jobs.len());
    for job in &jobs {
        let summary = process_album(&ctx, job)
            .await
            .with_context(|| format!("album '{}' ({}) failed", job.name, job.source))?;
        log::info!(
            "album {} done: {} images, {} saved, {} skipped, {} rejected",
            job.name,
            summary.total(),
            summary.saved,
            summary.skipped,
            summary.rejected
        );
    }
    log::info!("download finished");
    Ok(())
}

/// 处理单个相册: 创建目录, 写入来源, 解析地址, 下载图片
pub async fn process_album(ctx: &Context, job: &AlbumJob) -> EResult<AlbumSummary> {
    ctx.check_cancelled()?;
    create_album_directory(ctx, &job.output_dir, &job.source).await?;
    let links = get_album_links(ctx, &job.source).await?;
    log::info!("album {}: {} images found", job.name, links.len());
    if ctx.config.use_parallel_downloading {
        download_in_parallel(ctx, &job.output_dir, links).await
    } else {
        download_serially(ctx, &job.output_dir, links).await
    }
}

async fn create_album_directory(ctx: &Context, output_dir: &Path, source: &Url) -> EResult<()> {
    fs::create_dir_all(output_dir).await?;
    let marker = output_dir.join(SOURCE_MARKER);
    ctx.cancellable(async { fs::write(&marker, source.as_str()).await.map_err(CustomError::from) })
        .await
}

async fn download_serially(ctx: &Context, output_dir: &Path, links: Vec<Url>) -> EResult<AlbumSummary> {
    let mut summary = AlbumSummary::default();
    for link in &links {
        ctx.check_cancelled()?;
        summary.record(download_image(ctx, output_dir, link).await?);
    }
    Ok(summary)
}

// 同一相册内最多 max_degree_of_parallelism 个下载同时进行
async fn download_in_parallel(
    ctx: &Context,
    output_dir: &Path,
    links: Vec<Url>,
) -> EResult<AlbumSummary> {
    let workers = ctx.config.max_degree_of_parallelism;
    stream::iter(links)
        .map(|link| async move {
            ctx.check_cancelled()?;
            download_image(ctx, output_dir, &link).await
        })
        .buffer_unordered(workers)
        .try_fold(AlbumSummary::default(), |mut summary, outcome| async move {
            summary.record(outcome);
            Ok::<_, CustomError>(summary)
        })
        .await
}

/// 进程退出码: 成功或取消为 0, 其余为 1
pub fn exit_code(result: &anyhow::Result<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) if is_cancellation(e) => 0,
        Err(_) => 1,
    }
}

pub fn is_cancellation(error: &anyhow::Error) -> bool {
    error
        .chain()
        .any(|cause| matches!(cause.downcast_ref::<CustomError>(), Some(e) if e.is_cancelled()))
}
