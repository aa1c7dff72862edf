//! 关于Object操作/基础操作
//!
//! [官方文档](https://help.aliyun.com/zh/oss/developer-reference/basic-operations-1/)
//!
//! - `put`/`get`/`head`/`del`/`copy`只构造已签名的请求，由调用者设置请求体后通过[`Client::send`]发送
//! - 其它方法会直接发送请求并返回响应，不会检查状态码，需要时调用[`OssResponse::error_for_status`]

use crate::oss::sign_v1::{self, HTTPVerb, SigningRequest};
use crate::oss::transport::{OssRequest, OssResponse, RequestBody};
use crate::oss::utils::{check_header_names, header_value, set_header, validate_object_name};
use crate::oss::{Client, Error};
use bytes::Bytes;
use kloud_common::helper::{gmt_format, into_header_map};
use log::{debug, warn};
use std::collections::HashMap;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;
use tokio_stream::{Stream, StreamExt};
use tokio_util::io::ReaderStream;

impl Client {
    /// 构造已签名的请求
    ///
    /// - url：`scheme://host/bucket/object_name`
    /// - 参与签名的资源路径：`/bucket/object_name`，`object_name`可以带有`?acl`这类子资源参数
    /// - `headers`中没有`Date`时使用client的时钟生成，`Host`和`Authorization`总是由这里设置
    /// - `headers`中有名称只有大小写不同的header时返回[`Error::Config`]
    pub fn request(
        &self,
        verb: HTTPVerb,
        object_name: &str,
        mut headers: HashMap<String, String>,
    ) -> Result<OssRequest, Error> {
        validate_object_name(object_name)?;
        check_header_names(&headers)?;

        let resource = format!("/{}/{}", self.bucket, object_name);
        let url = url::Url::parse(&format!("{}://{}{}", self.scheme, self.host, resource))?;

        if header_value(&headers, "Date").is_none() {
            set_header(&mut headers, "Date", gmt_format(&self.clock.now())?);
        }
        set_header(&mut headers, "Host", self.host.as_str());

        let authorization = sign_v1::authorization(&SigningRequest {
            verb,
            headers: &headers,
            resource: &resource,
            access_key_id: &self.credentials.access_key_id,
            access_key_secret: &self.credentials.access_key_secret,
        })?;
        set_header(&mut headers, "Authorization", authorization);

        let header_map = into_header_map(headers)?;
        Ok(OssRequest::new(verb, url, resource, header_map))
    }

    /// 把请求交给transport发送
    pub async fn send(&self, req: OssRequest) -> Result<OssResponse, Error> {
        debug!("{} {}", req.verb(), req.url());
        let resp = self.transport.send(req).await?;
        debug!("got response: {}", resp.status());
        Ok(resp)
    }

    pub fn put(&self, object_name: &str, headers: HashMap<String, String>) -> Result<OssRequest, Error> {
        self.request(HTTPVerb::Put, object_name, headers)
    }

    pub fn get(&self, object_name: &str, headers: HashMap<String, String>) -> Result<OssRequest, Error> {
        self.request(HTTPVerb::Get, object_name, headers)
    }

    pub fn head(&self, object_name: &str, headers: HashMap<String, String>) -> Result<OssRequest, Error> {
        self.request(HTTPVerb::Head, object_name, headers)
    }

    pub fn del(&self, object_name: &str, headers: HashMap<String, String>) -> Result<OssRequest, Error> {
        self.request(HTTPVerb::Delete, object_name, headers)
    }

    /// 在同一个bucket内拷贝，使用`x-oss-copy-source`指定源object
    pub fn copy(
        &self,
        source_object_name: &str,
        dest_object_name: &str,
        mut headers: HashMap<String, String>,
    ) -> Result<OssRequest, Error> {
        validate_object_name(source_object_name)?;
        set_header(
            &mut headers,
            "x-oss-copy-source",
            format!("/{}/{}", self.bucket, source_object_name),
        );
        self.put(dest_object_name, headers)
    }

    /// 上传内存中的数据，`Content-Length`自动设置
    pub async fn put_buffer(
        &self,
        buffer: impl Into<Bytes>,
        object_name: &str,
        mut headers: HashMap<String, String>,
    ) -> Result<OssResponse, Error> {
        let buffer = buffer.into();
        set_header(&mut headers, "Content-Length", buffer.len().to_string());

        let req = self
            .put(object_name, headers)?
            .with_body(RequestBody::Bytes(buffer));
        self.send(req).await
    }

    /// 流式上传
    ///
    /// - `headers`中必须有`Content-Length`，否则直接返回[`Error::Config`]，不会发送请求
    /// - 读取`stream`出错时会中断上传，并且只返回一次[`Error::SourceStream`]
    pub async fn put_stream<S>(
        &self,
        stream: S,
        object_name: &str,
        headers: HashMap<String, String>,
    ) -> Result<OssResponse, Error>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send + Sync + 'static,
    {
        let content_length = header_value(&headers, "Content-Length").map(str::trim);
        if content_length.is_none_or(|s| s.parse::<u64>().is_err()) {
            return Err(Error::Config(
                "You must specify a Content-Length header.".to_owned(),
            ));
        }

        let (tx, mut rx) = oneshot::channel();
        let body = guard_source_stream(stream, tx);
        let req = self
            .put(object_name, headers)?
            .with_body(RequestBody::Stream(Box::pin(body)));
        let res = self.send(req).await;

        // 本地数据流出错时transport也会失败，这里以数据流的错误为准
        match rx.try_recv() {
            Ok(e) => {
                warn!("upload source stream failed: {e}");
                Err(Error::SourceStream(e))
            }
            Err(_) => res,
        }
    }

    /// 上传本地文件
    ///
    /// `Content-Length`使用文件大小，`headers`中没有`Content-Type`时根据文件后缀名推测，
    /// 推测不出时使用`application/octet-stream`
    pub async fn put_file(
        &self,
        src: impl AsRef<Path>,
        object_name: &str,
        mut headers: HashMap<String, String>,
    ) -> Result<OssResponse, Error> {
        let src = src.as_ref();
        debug!("put {}", src.display());

        let metadata = tokio::fs::metadata(src).await?;
        if header_value(&headers, "Content-Type").is_none() {
            let content_type = mime_guess::from_path(src)
                .first_or_octet_stream()
                .to_string();
            set_header(&mut headers, "Content-Type", content_type);
        }
        set_header(&mut headers, "Content-Length", metadata.len().to_string());

        let file = tokio::fs::File::open(src).await?;
        self.put_stream(ReaderStream::new(file), object_name, headers)
            .await
    }

    pub async fn get_object(
        &self,
        object_name: &str,
        headers: HashMap<String, String>,
    ) -> Result<OssResponse, Error> {
        let req = self.get(object_name, headers)?;
        self.send(req).await
    }

    pub async fn head_object(
        &self,
        object_name: &str,
        headers: HashMap<String, String>,
    ) -> Result<OssResponse, Error> {
        let req = self.head(object_name, headers)?;
        self.send(req).await
    }

    /// 无论object是否存在，服务端都会返回成功
    pub async fn delete_object(
        &self,
        object_name: &str,
        headers: HashMap<String, String>,
    ) -> Result<OssResponse, Error> {
        let req = self.del(object_name, headers)?;
        self.send(req).await
    }

    pub async fn copy_object(
        &self,
        source_object_name: &str,
        dest_object_name: &str,
        headers: HashMap<String, String>,
    ) -> Result<OssResponse, Error> {
        let req = self.copy(source_object_name, dest_object_name, headers)?;
        self.send(req).await
    }

    /// 下载object到本地文件，状态码不是2xx时返回[`Error::RequestAPIFailed`]，不会创建文件
    ///
    /// 返回写入的字节数
    pub async fn download_to_file(
        &self,
        object_name: &str,
        headers: HashMap<String, String>,
        file_path: impl AsRef<Path>,
    ) -> Result<u64, Error> {
        let resp = self
            .get_object(object_name, headers)
            .await?
            .error_for_status()
            .await?;

        let mut stream = resp.into_stream();
        let mut file = tokio::fs::File::create(file_path).await?;
        let mut written = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }
}

/// 包装上传的数据流，第一次出错时把原始错误发送到`tx`，
/// 同时向transport返回一个同类型的错误用于中断请求
fn guard_source_stream<S>(
    stream: S,
    tx: oneshot::Sender<std::io::Error>,
) -> impl Stream<Item = std::io::Result<Bytes>> + Send + Sync + 'static
where
    S: Stream<Item = std::io::Result<Bytes>> + Send + Sync + 'static,
{
    let mut tx = Some(tx);
    stream.map(move |item| {
        item.map_err(|e| {
            let forwarded = std::io::Error::new(e.kind(), e.to_string());
            if let Some(tx) = tx.take() {
                // receiver只会在请求结束后读取，这里发送失败说明调用方已经放弃，忽略即可
                let _ = tx.send(e);
            }
            forwarded
        })
    })
}
