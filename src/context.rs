use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::AppConfig;
use crate::error::{CustomError, EResult};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// 一次运行共享的上下文: 配置, http 客户端, 取消信号
#[derive(Debug, Clone)]
pub struct Context {
    pub config: AppConfig,
    pub image_endpoint: Url,
    pub client: Client,
    pub cancel: CancellationToken,
}

impl Context {
    pub fn new(config: AppConfig, cancel: CancellationToken) -> EResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        let image_endpoint = config.image_endpoint_url()?;
        Ok(Self {
            config,
            image_endpoint,
            client,
            cancel,
        })
    }

    ///
    /// 在取消信号触发时中断 future
    ///
    /// # Returns
    ///
    /// * `CustomError::Cancelled` - 取消信号已触发
    ///
    pub async fn cancellable<F, T>(&self, fut: F) -> EResult<T>
    where
        F: Future<Output = EResult<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(CustomError::Cancelled),
            res = fut => res,
        }
    }

    pub fn check_cancelled(&self) -> EResult<()> {
        if self.cancel.is_cancelled() {
            Err(CustomError::Cancelled)
        } else {
            Ok(())
        }
    }
}
