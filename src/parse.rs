use scraper::{Html, Selector};
use url::{form_urlencoded, Url};

use crate::error::{CustomError, EResult};
use crate::model::ImageRequest;

/// 存放原图地址的属性
const DESCRIPTION_ATTR: &str = "longdesc";
/// 缺少 file 参数时使用的文件名
const FALLBACK_FILE: &str = "fake";

///
/// 获取相册 html 中所有图片的引用地址
///
/// # Arguments
///
/// * `html` - html 字符串
///
/// # Returns
///
/// * `Vec<Url>` - `longdesc` 属性中解码后的地址, 空白属性跳过
///
pub fn get_image_links(html: &str) -> EResult<Vec<Url>> {
    let document = Html::parse_document(html);
    let img_tag = Selector::parse("img").map_err(|e| CustomError::ParseError {
        message: e.to_string(),
    })?;
    let mut links = Vec::new();
    for element in document.select(&img_tag) {
        let value = element.value().attr(DESCRIPTION_ATTR).unwrap_or_default();
        if value.trim().is_empty() {
            continue;
        }
        match decode_link(value) {
            Ok(url) => links.push(url),
            Err(e) => log::warn!("skip image reference '{}': {}", value, e),
        }
    }
    log::debug!("collected {} image links", links.len());
    Ok(links)
}

fn decode_link(value: &str) -> EResult<Url> {
    let decoded = urlencoding::decode(value.trim()).map_err(|e| CustomError::ParseError {
        message: e.to_string(),
    })?;
    Ok(Url::parse(&decoded)?)
}

///
/// 把缩略图地址改写成原图地址
///
/// # Arguments
///
/// * `reference` - 相册页中的图片引用地址
/// * `endpoint` - 原图请求地址
///
/// # Errors
///
/// * `CustomError::ParseError` - file 参数为空或不是合法的文件名
///
pub fn full_resolution_request(reference: &Url, endpoint: &Url) -> EResult<ImageRequest> {
    let raw_query = reference.query().unwrap_or_default();
    let query = raw_query.replace("&amp;", "&");
    let params: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    let param = |key: &str| {
        params
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    };
    let file = param("file").unwrap_or(FALLBACK_FILE);

    let mut url = endpoint.clone();
    url.query_pairs_mut()
        .clear()
        .append_pair("option", param("option").unwrap_or_default())
        .append_pair("mode", "full")
        .append_pair("view", "resizeimage")
        .append_pair("folder", param("folder").unwrap_or_default())
        .append_pair("file", file);

    let file_name = file.to_lowercase();
    if !is_plain_file_name(&file_name) {
        return Err(CustomError::ParseError {
            message: format!("Cannot parse file parameter from '{}' query", raw_query),
        });
    }
    Ok(ImageRequest { url, file_name })
}

fn is_plain_file_name(name: &str) -> bool {
    !name.trim().is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}
