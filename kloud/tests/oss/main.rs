use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use kloud::oss::{
    self, Client, Error, FixedClock, HTTPVerb, HttpTransport, OssRequest, OssResponse,
    RequestBody,
};
use kloud::oss::sign_v1::{self, SigningRequest};
use kloud::oss::utils::content_md5;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use time::macros::datetime;
use tokio_stream::StreamExt;

const ACCESS_KEY_ID: &str = "9BEMD2aTsxg9mFJK";
const ACCESS_KEY_SECRET: &str = "oWadlaZ6TecruAACKSpjtSasEHWB5y";
const HOST: &str = "oss-cn-qingdao.aliyuncs.com";
const BUCKET: &str = "kloud";
const DATE: &str = "Tue, 01 Jan 2019 00:00:00 GMT";

/// transport收到的请求
#[derive(Debug, Clone)]
struct Recorded {
    verb: HTTPVerb,
    url: String,
    headers: HeaderMap,
    body: Bytes,
}

/// 在内存中记录请求并返回固定响应，读取请求体流出错时返回transport错误
#[derive(Debug, Clone)]
struct MockTransport {
    status: StatusCode,
    response_body: &'static str,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockTransport {
    fn new(status: StatusCode) -> Self {
        Self {
            status,
            response_body: "",
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn with_response_body(mut self, body: &'static str) -> Self {
        self.response_body = body;
        self
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, req: OssRequest) -> Result<OssResponse, Error> {
        let (verb, url, headers, body) = req.into_parts();
        let body = match body {
            RequestBody::Empty => Bytes::new(),
            RequestBody::Bytes(b) => b,
            RequestBody::Stream(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk.map_err(|e| Error::Transport(Box::new(e)))?;
                    buf.extend_from_slice(&chunk);
                }
                buf.freeze()
            }
        };
        self.requests.lock().unwrap().push(Recorded {
            verb,
            url: url.to_string(),
            headers,
            body,
        });

        Ok(OssResponse::from_bytes(
            self.status,
            HeaderMap::new(),
            self.response_body,
        ))
    }
}

fn get_oss_client(transport: &MockTransport) -> Client {
    let _ = env_logger::builder().is_test(true).try_init();

    Client::builder()
        .access_key_id(ACCESS_KEY_ID)
        .access_key_secret(ACCESS_KEY_SECRET)
        .host(HOST)
        .bucket(BUCKET)
        .transport(Arc::new(transport.clone()))
        .clock(Arc::new(FixedClock(datetime!(2019-01-01 00:00:00 UTC))))
        .build()
        .unwrap()
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers.get(name).unwrap().to_str().unwrap()
}

#[test]
fn build_client_missing_config_test() {
    let res = Client::builder()
        .access_key_id(ACCESS_KEY_ID)
        .access_key_secret("")
        .host(HOST)
        .bucket(BUCKET)
        .build();
    match res {
        Err(Error::Config(msg)) => assert!(msg.contains("accessKeySecret")),
        other => panic!("unexpected result: {other:?}"),
    }

    let res = Client::builder()
        .access_key_id(ACCESS_KEY_ID)
        .access_key_secret(ACCESS_KEY_SECRET)
        .host(HOST)
        .bucket(BUCKET)
        .scheme("ftp")
        .build();
    assert!(matches!(res, Err(Error::Config(_))));
}

#[test]
fn client_from_config_test() {
    let conf: oss::Config = toml::from_str(
        r#"
        access_key_id = "9BEMD2aTsxg9mFJK"
        access_key_secret = "oWadlaZ6TecruAACKSpjtSasEHWB5y"
        host = "oss-cn-qingdao.aliyuncs.com"
        bucket = "kloud"
        scheme = "https"
        "#,
    )
    .unwrap();
    let client = Client::try_from(conf).unwrap();
    assert_eq!(client.scheme(), "https");
    assert_eq!(client.bucket(), BUCKET);
    assert_eq!(client.host(), HOST);

    let conf = oss::Config {
        bucket: String::new(),
        ..Default::default()
    };
    assert!(matches!(Client::try_from(conf), Err(Error::Config(_))));
}

#[test]
fn request_test() {
    let transport = MockTransport::new(StatusCode::OK);
    let client = get_oss_client(&transport);

    let req = client.get("README.md?acl", HashMap::new()).unwrap();
    assert_eq!(req.verb(), HTTPVerb::Get);
    assert_eq!(
        req.url().as_str(),
        "http://oss-cn-qingdao.aliyuncs.com/kloud/README.md?acl"
    );
    assert_eq!(req.resource(), "/kloud/README.md?acl");
    assert_eq!(header(req.headers(), "Date"), DATE);
    assert_eq!(header(req.headers(), "Host"), HOST);
    assert_eq!(
        header(req.headers(), "Authorization"),
        "OSS 9BEMD2aTsxg9mFJK:KlO7j941vSD6N06hB3Ocbxk9xjE="
    );
    // 只构造请求，不发送
    assert!(transport.requests().is_empty());
}

#[test]
fn request_keeps_caller_date_test() {
    let transport = MockTransport::new(StatusCode::OK);
    let client = get_oss_client(&transport);

    let mut headers = HashMap::new();
    headers.insert("date".to_owned(), "Wed, 02 Jan 2019 00:00:00 GMT".to_owned());
    let req = client.head("a.txt", headers).unwrap();
    assert_eq!(header(req.headers(), "Date"), "Wed, 02 Jan 2019 00:00:00 GMT");
}

#[test]
fn request_invalid_object_name_test() {
    let transport = MockTransport::new(StatusCode::OK);
    let client = get_oss_client(&transport);

    assert!(client.get("/abs.txt", HashMap::new()).is_err());
    assert!(client.get("", HashMap::new()).is_err());
}

/// 使用实际发送的header重新计算签名，结果必须与发送的`Authorization`一致
fn resign(verb: HTTPVerb, resource: &str, headers: &HeaderMap) -> String {
    let headers = headers
        .iter()
        .filter(|(k, _)| k.as_str() != "authorization")
        .map(|(k, v)| (k.as_str().to_owned(), v.to_str().unwrap().to_owned()))
        .collect::<HashMap<_, _>>();
    sign_v1::authorization(&SigningRequest {
        verb,
        headers: &headers,
        resource,
        access_key_id: ACCESS_KEY_ID,
        access_key_secret: ACCESS_KEY_SECRET,
    })
    .unwrap()
}

#[tokio::test]
async fn signature_matches_sent_headers_test() {
    let transport = MockTransport::new(StatusCode::OK);
    let client = get_oss_client(&transport);

    let mut headers = HashMap::new();
    headers.insert("Content-Type".to_owned(), "text/plain ".to_owned());
    headers.insert("Content-MD5".to_owned(), format!(" {}", content_md5(b"## kloud")));
    headers.insert("x-oss-meta-author".to_owned(), " kloud ".to_owned());
    client
        .put_buffer("## kloud", "a.txt", headers)
        .await
        .unwrap();

    let requests = transport.requests();
    let req = &requests[0];
    assert_eq!(header(&req.headers, "content-type"), "text/plain");
    assert_eq!(
        header(&req.headers, "authorization"),
        resign(HTTPVerb::Put, "/kloud/a.txt", &req.headers)
    );

    // 调用者提供的Date同样去掉空白
    let mut headers = HashMap::new();
    headers.insert("Date".to_owned(), format!("{DATE} "));
    let req = client.get("README.md?acl", headers).unwrap();
    assert_eq!(header(req.headers(), "date"), DATE);
    assert_eq!(
        header(req.headers(), "authorization"),
        "OSS 9BEMD2aTsxg9mFJK:KlO7j941vSD6N06hB3Ocbxk9xjE="
    );
    assert_eq!(
        header(req.headers(), "authorization"),
        resign(HTTPVerb::Get, req.resource(), req.headers())
    );
}

#[tokio::test]
async fn duplicate_header_names_test() {
    let transport = MockTransport::new(StatusCode::OK);
    let client = get_oss_client(&transport);

    let mut headers = HashMap::new();
    headers.insert("X-Oss-Meta-A".to_owned(), "z".to_owned());
    headers.insert("x-oss-meta-a".to_owned(), "a".to_owned());
    match client.put("a.txt", headers.clone()) {
        Err(Error::Config(msg)) => assert!(msg.contains("x-oss-meta-a")),
        other => panic!("unexpected result: {other:?}"),
    }

    let res = client.put_buffer("a", "a.txt", headers).await;
    assert!(matches!(res, Err(Error::Config(_))));
    assert!(transport.requests().is_empty());
}

#[test]
fn set_bucket_info_test() {
    let transport = MockTransport::new(StatusCode::OK);
    let mut client = get_oss_client(&transport);
    assert_eq!(client.credentials().access_key_id, ACCESS_KEY_ID);
    assert!(client.credentials().is_valid());

    client.set_bucket_info(Some("other"), None);
    assert_eq!(client.bucket(), "other");
    assert_eq!(client.host(), HOST);

    client.set_bucket_info(None, Some("oss-cn-hangzhou.aliyuncs.com"));
    let req = client.get("a.txt", HashMap::new()).unwrap();
    assert_eq!(
        req.url().as_str(),
        "http://oss-cn-hangzhou.aliyuncs.com/other/a.txt"
    );
    assert_eq!(req.resource(), "/other/a.txt");
    assert_eq!(header(req.headers(), "host"), "oss-cn-hangzhou.aliyuncs.com");
}

#[tokio::test]
async fn put_buffer_test() {
    let transport = MockTransport::new(StatusCode::OK);
    let client = get_oss_client(&transport);

    let mut headers = HashMap::new();
    headers.insert("Content-Type".to_owned(), "text/markdown".to_owned());
    headers.insert("x-oss-meta-author".to_owned(), "kloud".to_owned());
    let resp = client
        .put_buffer("## kloud", "README.md", headers)
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.verb, HTTPVerb::Put);
    assert_eq!(req.body, Bytes::from_static(b"## kloud"));
    assert_eq!(header(&req.headers, "Content-Length"), "8");
    assert_eq!(header(&req.headers, "x-oss-meta-author"), "kloud");
    assert!(header(&req.headers, "Authorization").starts_with("OSS 9BEMD2aTsxg9mFJK:"));
}

#[tokio::test]
async fn put_stream_without_content_length_test() {
    let transport = MockTransport::new(StatusCode::OK);
    let client = get_oss_client(&transport);

    let stream = tokio_stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"data"))]);
    let res = client
        .put_stream(stream, "README.md", HashMap::new())
        .await;
    assert!(matches!(res, Err(Error::Config(_))));

    let mut headers = HashMap::new();
    headers.insert("Content-Length".to_owned(), "abc".to_owned());
    let stream = tokio_stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"data"))]);
    let res = client.put_stream(stream, "README.md", headers).await;
    assert!(matches!(res, Err(Error::Config(_))));

    // 没有发出任何请求
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn put_stream_test() {
    let transport = MockTransport::new(StatusCode::OK);
    let client = get_oss_client(&transport);

    let mut headers = HashMap::new();
    headers.insert("content-length".to_owned(), "6".to_owned());
    let stream = tokio_stream::iter(vec![
        Ok::<_, std::io::Error>(Bytes::from_static(b"ab")),
        Ok(Bytes::from_static(b"cdef")),
    ]);
    let resp = client.put_stream(stream, "stream.bin", headers).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body, Bytes::from_static(b"abcdef"));
    assert_eq!(header(&requests[0].headers, "content-length"), "6");
}

#[tokio::test]
async fn put_stream_source_error_test() {
    let transport = MockTransport::new(StatusCode::OK);
    let client = get_oss_client(&transport);

    let mut headers = HashMap::new();
    headers.insert("Content-Length".to_owned(), "100".to_owned());
    let stream = tokio_stream::iter(vec![
        Ok(Bytes::from_static(b"ab")),
        Err(std::io::Error::other("read failed")),
        Ok(Bytes::from_static(b"never")),
    ]);
    let res = client.put_stream(stream, "broken.bin", headers).await;

    // 只返回一次数据流的错误，而不是transport的错误或成功
    match res {
        Err(e @ Error::SourceStream(_)) => {
            assert!(!e.is_transport());
            assert!(e.to_string().contains("read failed"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn put_file_test() {
    let transport = MockTransport::new(StatusCode::OK);
    let client = get_oss_client(&transport);

    let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    file.write_all(b"hello kloud").unwrap();
    file.flush().unwrap();

    let resp = client
        .put_file(file.path(), "hello.txt", HashMap::new())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.body, Bytes::from_static(b"hello kloud"));
    assert_eq!(header(&req.headers, "Content-Length"), "11");
    assert_eq!(header(&req.headers, "Content-Type"), "text/plain");
}

#[tokio::test]
async fn put_file_not_found_test() {
    let transport = MockTransport::new(StatusCode::OK);
    let client = get_oss_client(&transport);

    let res = client
        .put_file("tests/oss/not_exist.bin", "a.bin", HashMap::new())
        .await;
    assert!(matches!(res, Err(Error::IO(_))));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn copy_object_test() {
    let transport = MockTransport::new(StatusCode::OK);
    let client = get_oss_client(&transport);

    client
        .copy_object("a.txt", "b.txt", HashMap::new())
        .await
        .unwrap();

    let requests = transport.requests();
    let req = &requests[0];
    assert_eq!(req.verb, HTTPVerb::Put);
    assert_eq!(req.url, "http://oss-cn-qingdao.aliyuncs.com/kloud/b.txt");
    assert_eq!(header(&req.headers, "x-oss-copy-source"), "/kloud/a.txt");
    assert_eq!(
        header(&req.headers, "Authorization"),
        "OSS 9BEMD2aTsxg9mFJK:5TN5q52DzpJcZTbsashBOhsJi28="
    );
}

#[tokio::test]
async fn delete_object_test() {
    let transport = MockTransport::new(StatusCode::NO_CONTENT);
    let client = get_oss_client(&transport);

    let resp = client
        .delete_object("README.md", HashMap::new())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let requests = transport.requests();
    assert_eq!(requests[0].verb, HTTPVerb::Delete);
    assert_eq!(
        header(&requests[0].headers, "Authorization"),
        "OSS 9BEMD2aTsxg9mFJK:HuQP+KzyzNxtEQ8reEU+47sWDU0="
    );
}

#[tokio::test]
async fn get_and_head_object_test() {
    let transport = MockTransport::new(StatusCode::OK).with_response_body("## kloud");
    let client = get_oss_client(&transport);

    let resp = client.get_object("README.md", HashMap::new()).await.unwrap();
    assert_eq!(resp.bytes().await.unwrap(), Bytes::from_static(b"## kloud"));

    let resp = client.head_object("README.md", HashMap::new()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let verbs = transport
        .requests()
        .iter()
        .map(|r| r.verb)
        .collect::<Vec<_>>();
    assert_eq!(verbs, vec![HTTPVerb::Get, HTTPVerb::Head]);
}

#[tokio::test]
async fn send_built_request_test() {
    let transport = MockTransport::new(StatusCode::OK);
    let client = get_oss_client(&transport);

    let mut headers = HashMap::new();
    headers.insert("Content-Length".to_owned(), "3".to_owned());
    let req = client
        .put("raw.txt", headers)
        .unwrap()
        .with_body(RequestBody::Bytes(Bytes::from_static(b"raw")));
    client.send(req).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].body, Bytes::from_static(b"raw"));
}

#[tokio::test]
async fn download_to_file_test() {
    let transport = MockTransport::new(StatusCode::OK).with_response_body("## kloud");
    let client = get_oss_client(&transport);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("README.md");
    let written = client
        .download_to_file("README.md", HashMap::new(), &path)
        .await
        .unwrap();
    assert_eq!(written, 8);
    assert_eq!(std::fs::read(&path).unwrap(), b"## kloud");
}

#[tokio::test]
async fn download_to_file_not_found_test() {
    let transport = MockTransport::new(StatusCode::NOT_FOUND).with_response_body("NoSuchKey");
    let client = get_oss_client(&transport);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.md");
    let res = client
        .download_to_file("missing.md", HashMap::new(), &path)
        .await;
    match res {
        Err(Error::RequestAPIFailed { text, .. }) => assert_eq!(text, "NoSuchKey"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(!path.exists());
}
