#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("error: {0}")]
    Common(String),
    /// 构建client时缺少必要的配置，或者流式上传时缺少`Content-Length`
    #[error("configuration error: {0}")]
    Config(String),
    #[error("helper error: {0}")]
    Helper(#[from] kloud_common::Error),
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    /// 自定义`HttpTransport`返回的网络错误
    #[error("transport error: {0}")]
    Transport(Box<dyn std::error::Error + Send + Sync>),
    /// 读取本地上传数据失败
    #[error("source stream error: {0}")]
    SourceStream(std::io::Error),
    #[error("response status is not success: {status}, text: {text}")]
    RequestAPIFailed { status: String, text: String },
    #[error("io error: {0}")]
    IO(#[from] std::io::Error),
}

impl Error {
    /// 网络或HTTP层面的错误
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Reqwest(_) | Error::Transport(_))
    }
}

#[test]
fn is_transport_test() {
    let e = Error::Transport(Box::new(std::io::Error::other("connection reset")));
    assert!(e.is_transport());
    assert!(!Error::SourceStream(std::io::Error::other("read failed")).is_transport());
    assert!(!Error::Config("missing".to_owned()).is_transport());
}
