//! oss sdk
//!
//! 阿里云oss文档：<https://help.aliyun.com/zh/oss/>
//!
//! 注意：
//!
//! - 只支持Header携带签名（`Authorization: OSS AccessKeyId:Signature`）的方式
//! - 不支持STS，不会自动重试，也没有超时控制，这些由调用者决定

// 所有api的请求逻辑基本相同：构造url和资源路径 -> 补齐Date/Host -> 签名 -> 交给HttpTransport发送

pub mod object;
pub mod sign_v1;
pub mod transport;
pub mod utils;

mod clock;
mod config;
mod error;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::*;
pub use error::Error;
pub use sign_v1::HTTPVerb;
pub use transport::{HttpTransport, OssRequest, OssResponse, RequestBody, ReqwestTransport};

use crate::credentials::Credentials;
use bon::bon;
use log::debug;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Client {
    credentials: Credentials,
    host: String,
    bucket: String,
    scheme: String,
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
}

/// 创建oss客户端
#[bon]
impl Client {
    /// - `host`：如`oss-cn-qingdao.aliyuncs.com`，请求的url为`scheme://host/bucket/object`
    /// - `scheme`：`http`或`https`，默认为`http`
    /// - `transport`：默认使用[`ReqwestTransport`]
    /// - `clock`：默认使用[`SystemClock`]
    ///
    /// 必填项为空时返回[`Error::Config`]
    #[builder(on(String, into))]
    pub fn new(
        access_key_id: String,
        access_key_secret: String,
        host: String,
        bucket: String,
        #[builder(default = "http".to_owned())] scheme: String,
        transport: Option<Arc<dyn HttpTransport>>,
        clock: Option<Arc<dyn Clock>>,
    ) -> Result<Self, Error> {
        for (name, value) in [
            ("accessKeyId", &access_key_id),
            ("accessKeySecret", &access_key_secret),
            ("host", &host),
            ("bucket", &bucket),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("oss \"{name}\" required")));
            }
        }
        if scheme != "http" && scheme != "https" {
            return Err(Error::Config(format!("unsupported scheme: {scheme}")));
        }

        let client = Self {
            credentials: Credentials::new(access_key_id, access_key_secret),
            host,
            bucket,
            scheme,
            transport: transport.unwrap_or_else(|| Arc::new(ReqwestTransport::default())),
            clock: clock.unwrap_or_else(|| Arc::new(SystemClock)),
        };
        debug!(
            "oss client created: {}://{}/{}",
            client.scheme, client.host, client.bucket
        );
        Ok(client)
    }

    pub fn set_bucket_info(&mut self, bucket: Option<&str>, host: Option<&str>) {
        if let Some(s) = bucket {
            s.clone_into(&mut self.bucket);
        }
        if let Some(s) = host {
            s.clone_into(&mut self.host);
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

impl TryFrom<Config> for Client {
    type Error = Error;

    fn try_from(conf: Config) -> Result<Self, Self::Error> {
        Client::builder()
            .access_key_id(conf.access_key_id)
            .access_key_secret(conf.access_key_secret)
            .host(conf.host)
            .bucket(conf.bucket)
            .maybe_scheme(conf.scheme)
            .build()
    }
}
