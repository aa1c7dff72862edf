//! 发送已签名请求的HTTP层
//!
//! client只负责构造和签名请求，真正发送请求交给实现了[`HttpTransport`]的类型，
//! 默认使用[`ReqwestTransport`]

use crate::oss::Error;
use crate::oss::sign_v1::HTTPVerb;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use std::fmt::{Debug, Formatter};
use std::pin::Pin;
use tokio_stream::{Stream, StreamExt};
use url::Url;

/// 上传数据流
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + Sync>>;

/// 响应体数据流
pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send>>;

pub enum RequestBody {
    Empty,
    Bytes(Bytes),
    /// 使用流上传时，请求头中必须有`Content-Length`
    Stream(ByteStream),
}

impl Debug for RequestBody {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestBody::Empty => write!(f, "Empty"),
            RequestBody::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            RequestBody::Stream(_) => write!(f, "Stream"),
        }
    }
}

/// 已经签名的请求
#[derive(Debug)]
pub struct OssRequest {
    pub(crate) verb: HTTPVerb,
    pub(crate) url: Url,
    pub(crate) resource: String,
    pub(crate) headers: HeaderMap,
    pub(crate) body: RequestBody,
}

impl OssRequest {
    pub(crate) fn new(verb: HTTPVerb, url: Url, resource: String, headers: HeaderMap) -> Self {
        Self {
            verb,
            url,
            resource,
            headers,
            body: RequestBody::Empty,
        }
    }

    /// 设置请求体，不会影响已经计算好的签名
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn verb(&self) -> HTTPVerb {
        self.verb
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// 参与签名的资源路径，如`/bucket/object`
    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    pub fn into_parts(self) -> (HTTPVerb, Url, HeaderMap, RequestBody) {
        (self.verb, self.url, self.headers, self.body)
    }
}

pub struct OssResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseStream,
}

impl Debug for OssResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OssResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl OssResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: ResponseStream) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// 响应体已经全部在内存中时使用
    pub fn from_bytes(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        let stream = tokio_stream::once(Ok::<_, Error>(body));
        Self::new(status, headers, Box::pin(stream))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn into_stream(self) -> ResponseStream {
        self.body
    }

    pub async fn bytes(mut self) -> Result<Bytes, Error> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }

    pub async fn text(self) -> Result<String, Error> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// 状态码不是2xx时，读取响应体并返回[`Error::RequestAPIFailed`]
    pub async fn error_for_status(self) -> Result<Self, Error> {
        if self.status.is_success() {
            return Ok(self);
        }
        let status = self.status.to_string();
        let text = self.text().await?;
        Err(Error::RequestAPIFailed { status, text })
    }
}

#[async_trait]
pub trait HttpTransport: Debug + Send + Sync + 'static {
    /// 发送请求，请求体为流时，流中的错误需要中断请求并返回错误
    async fn send(&self, req: OssRequest) -> Result<OssResponse, Error>;
}

#[derive(Debug, Default, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, req: OssRequest) -> Result<OssResponse, Error> {
        let (verb, url, headers, body) = req.into_parts();
        let builder = self.client.request(verb.into(), url).headers(headers);
        let builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Bytes(bytes) => builder.body(bytes),
            RequestBody::Stream(stream) => builder.body(reqwest::Body::wrap_stream(stream)),
        };

        let resp = builder.send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes_stream().map(|item| item.map_err(Error::Reqwest));

        Ok(OssResponse::new(status, headers, Box::pin(body)))
    }
}
