use std::path::Path;

use tokio::fs;
use url::Url;

use crate::context::Context;
use crate::error::{CustomError, EResult};
use crate::model::DownloadOutcome;
use crate::parse::{full_resolution_request, get_image_links};

/// 小于该字节数的响应视为错误页面
pub const MIN_IMAGE_SIZE: usize = 1_000;

/// 发送 HTTP Get 请求
///
/// # Arguments
///
/// * `ctx` - 运行上下文
/// * `url` - 请求的 URL
///
/// # Returns
///
/// * `EResult<String>` - 响应体文本
pub async fn navigate(ctx: &Context, url: &Url) -> EResult<String> {
    log::debug!("Sending GET request to {}", url);
    ctx.cancellable(async {
        let response = ctx.client.get(url.clone()).send().await?;
        if response.status().is_success() {
            Ok(response.text().await?)
        } else {
            log::error!("Request failed with status code: {}", response.status());
            Err(CustomError::RequestError {
                message: format!("GET {} failed", url),
                code: response.status().as_u16(),
            })
        }
    })
    .await
}

pub async fn fetch_bytes(ctx: &Context, url: &Url) -> EResult<Vec<u8>> {
    ctx.cancellable(async {
        let response = ctx.client.get(url.clone()).send().await?;
        if response.status().is_success() {
            Ok(response.bytes().await?.to_vec())
        } else {
            Err(CustomError::RequestError {
                message: format!("GET {} failed", url),
                code: response.status().as_u16(),
            })
        }
    })
    .await
}

///
/// 获取相册中的图片地址
///
/// 除取消外的错误只记录日志, 返回空列表
///
/// # Arguments
///
/// * `ctx` - 运行上下文
/// * `album_url` - 相册页地址
///
pub async fn get_album_links(ctx: &Context, album_url: &Url) -> EResult<Vec<Url>> {
    let result = match navigate(ctx, album_url).await {
        Ok(html) => get_image_links(&html),
        Err(e) => Err(e),
    };
    match result {
        Ok(links) => Ok(links),
        Err(CustomError::Cancelled) => Err(CustomError::Cancelled),
        Err(e) => {
            log::error!("ERROR ALBUM ({}): {}", e, album_url);
            Ok(Vec::new())
        }
    }
}

///
/// 下载单张原图
///
/// # Arguments
///
/// * `ctx` - 运行上下文
/// * `output_dir` - 相册目录
/// * `reference` - 相册页中的图片引用地址
///
/// # Errors
///
/// 只有取消和写文件失败会返回错误, 其余情况记录日志并返回 `Rejected`
///
pub async fn download_image(
    ctx: &Context,
    output_dir: &Path,
    reference: &Url,
) -> EResult<DownloadOutcome> {
    let request = match full_resolution_request(reference, &ctx.image_endpoint) {
        Ok(request) => request,
        Err(e) => {
            log::warn!("{}", e);
            return Ok(DownloadOutcome::Rejected);
        }
    };
    let output_file = output_dir.join(&request.file_name);
    if fs::try_exists(&output_file).await? {
        log::info!("File skip, already downloaded: '{}'", output_file.display());
        return Ok(DownloadOutcome::Skipped);
    }

    log::info!("[ image: {} ] downloading url: {}", request.file_name, request.url);
    let bytes = match fetch_bytes(ctx, &request.url).await {
        Ok(bytes) => bytes,
        Err(CustomError::Cancelled) => return Err(CustomError::Cancelled),
        Err(e) => {
            log::error!("ERROR IMAGE ({}) URL: {}", e, reference);
            return Ok(DownloadOutcome::Rejected);
        }
    };
    if bytes.len() < MIN_IMAGE_SIZE {
        log::debug!(
            "discard {} bytes from {}, not an image",
            bytes.len(),
            request.url
        );
        return Ok(DownloadOutcome::Rejected);
    }

    ctx.cancellable(async { fs::write(&output_file, &bytes).await.map_err(CustomError::from) })
        .await?;
    log::info!("FileName: {}", output_file.display());
    Ok(DownloadOutcome::Saved { bytes: bytes.len() })
}
