use crate::oss::Error;
use serde::Deserialize;
use std::env;

pub const ALIBABA_CLOUD_ACCESS_KEY_ID: &str = "ALIBABA_CLOUD_ACCESS_KEY_ID";
pub const ALIBABA_CLOUD_ACCESS_KEY_SECRET: &str = "ALIBABA_CLOUD_ACCESS_KEY_SECRET";
pub const ALIBABA_CLOUD_OSS_HOST: &str = "ALIBABA_CLOUD_OSS_HOST";
pub const ALIBABA_CLOUD_OSS_BUCKET: &str = "ALIBABA_CLOUD_OSS_BUCKET";
pub const ALIBABA_CLOUD_OSS_SCHEME: &str = "ALIBABA_CLOUD_OSS_SCHEME";

/// client配置，可以从toml/json等文件反序列化得到，也可以从环境变量读取
///
/// ```toml
/// access_key_id = "xxx"
/// access_key_secret = "xxx"
/// host = "oss-cn-qingdao.aliyuncs.com"
/// bucket = "kloud"
/// ```
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub access_key_id: String,
    pub access_key_secret: String,
    pub host: String,
    pub bucket: String,
    pub scheme: Option<String>,
}

impl Config {
    /// 从环境变量读取，缺少的变量会返回[`Error::Config`]
    pub fn from_env() -> Result<Self, Error> {
        fn required(key: &str) -> Result<String, Error> {
            env::var(key).map_err(|_| Error::Config(format!("env {key} required")))
        }

        Ok(Self {
            access_key_id: required(ALIBABA_CLOUD_ACCESS_KEY_ID)?,
            access_key_secret: required(ALIBABA_CLOUD_ACCESS_KEY_SECRET)?,
            host: required(ALIBABA_CLOUD_OSS_HOST)?,
            bucket: required(ALIBABA_CLOUD_OSS_BUCKET)?,
            scheme: env::var(ALIBABA_CLOUD_OSS_SCHEME).ok(),
        })
    }
}
