use std::{collections::BTreeMap, fmt, fs, io, path::Path};

use indexmap::IndexMap;
use serde::{de, Deserialize, Deserializer, Serialize};
use url::Url;

use crate::error::{CustomError, EResult};

pub const MIN_PARALLELISM: usize = 2;
pub const MAX_PARALLELISM: usize = 100;
pub const DEFAULT_ALBUM_PREFIX: &str = "LiazCamion-Liaz";
pub const DEFAULT_IMAGE_ENDPOINT: &str =
    "http://liaz-dakar.com/components/com_eventgallery/helpers/image.php";

/// 配置文件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub log: Log,
    #[serde(default)]
    pub use_parallel_downloading: bool,
    pub max_degree_of_parallelism: usize,
    pub output_directory: String,
    /// 相册目录名前缀
    #[serde(default = "default_album_prefix")]
    pub album_prefix: String,
    /// 原图请求地址
    #[serde(default = "default_image_endpoint")]
    pub image_endpoint: String,
    #[serde(deserialize_with = "deserialize_albums")]
    pub albums: IndexMap<String, Url>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log: Log::default(),
            use_parallel_downloading: true,
            max_degree_of_parallelism: 4,
            output_directory: "download".to_owned(),
            album_prefix: default_album_prefix(),
            image_endpoint: default_image_endpoint(),
            albums: IndexMap::new(),
        }
    }
}

impl AppConfig {
    ///
    /// 校验配置, 不合法时返回错误
    ///
    /// # Errors
    ///
    /// * `CustomError::ConfigError` - 并发数越界, 输出目录为空, 原图地址无效
    ///
    pub fn validated(self) -> EResult<Self> {
        if !(MIN_PARALLELISM..=MAX_PARALLELISM).contains(&self.max_degree_of_parallelism) {
            return Err(CustomError::ConfigError {
                message: format!(
                    "max_degree_of_parallelism must be between {} and {}, got {}",
                    MIN_PARALLELISM, MAX_PARALLELISM, self.max_degree_of_parallelism
                ),
            });
        }
        if self.output_directory.trim().is_empty() {
            return Err(CustomError::ConfigError {
                message: "output_directory is required".to_owned(),
            });
        }
        self.image_endpoint_url()?;
        Ok(self)
    }

    pub fn image_endpoint_url(&self) -> EResult<Url> {
        Url::parse(&self.image_endpoint).map_err(|e| CustomError::ConfigError {
            message: format!("invalid image_endpoint '{}': {}", self.image_endpoint, e),
        })
    }
}

fn default_album_prefix() -> String {
    DEFAULT_ALBUM_PREFIX.to_owned()
}

fn default_image_endpoint() -> String {
    DEFAULT_IMAGE_ENDPOINT.to_owned()
}

// yaml 会把 `90:` 解析成数字
fn deserialize_albums<'de, D>(deserializer: D) -> Result<IndexMap<String, Url>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = IndexMap::<serde_yaml::Value, Url>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, url)| {
            let name = match key {
                serde_yaml::Value::String(name) => name,
                serde_yaml::Value::Number(number) => number.to_string(),
                other => {
                    return Err(de::Error::custom(format!("invalid album name: {:?}", other)));
                }
            };
            Ok((name, url))
        })
        .collect()
}

/// 读取并校验配置文件
///
/// # Arguments
///
/// * `file_name` - 文件名称
///
/// # Errors
///
/// 文件不存在, 格式错误或校验失败
pub fn load_config(file_name: &Path) -> EResult<AppConfig> {
    let contents = match fs::read_to_string(file_name) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(CustomError::ConfigError {
                message: format!(
                    "config file '{}' not found, run `generate` to create one",
                    file_name.display()
                ),
            });
        }
        Err(e) => return Err(e.into()),
    };
    let config: AppConfig = serde_yaml::from_str(&contents)?;
    config.validated()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Log {
    #[serde(default)]
    pub level: LogLevelMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLevelMap(BTreeMap<String, LogLevel>);

impl Default for LogLevelMap {
    fn default() -> Self {
        let mut map = BTreeMap::new();
        map.insert("liaz_gallery_dl".to_owned(), LogLevel::Info);
        Self(map)
    }
}

impl fmt::Display for LogLevelMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self
            .0
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        write!(f, "{}", pairs.join(","))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}
