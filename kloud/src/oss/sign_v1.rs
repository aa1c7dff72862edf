//! OSS header签名（V1，HMAC-SHA1）
//!
//! 签名文档：<https://help.aliyun.com/zh/oss/developer-reference/include-signatures-in-the-authorization-header>
//!
//! ```text
//! Signature = base64(hmac-sha1(AccessKeySecret,
//!             VERB + "\n"
//!             + Content-MD5 + "\n"
//!             + Content-Type + "\n"
//!             + Date + "\n"
//!             + CanonicalizedOSSHeaders
//!             + CanonicalizedResource))
//! ```
//!
//! 签名算法固定为HMAC-SHA1，这是协议的一部分，不做参数化

use crate::oss::Error;
use crate::oss::utils::header_value;
use kloud_common::helper::{base64_hmac_sha1, gmt_format};
use log::debug;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HTTPVerb {
    Get,
    Put,
    Post,
    Delete,
    Head,
}

impl Display for HTTPVerb {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            HTTPVerb::Get => write!(f, "GET"),
            HTTPVerb::Put => write!(f, "PUT"),
            HTTPVerb::Post => write!(f, "POST"),
            HTTPVerb::Delete => write!(f, "DELETE"),
            HTTPVerb::Head => write!(f, "HEAD"),
        }
    }
}

impl FromStr for HTTPVerb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GET" => Ok(HTTPVerb::Get),
            "PUT" => Ok(HTTPVerb::Put),
            "POST" => Ok(HTTPVerb::Post),
            "DELETE" => Ok(HTTPVerb::Delete),
            "HEAD" => Ok(HTTPVerb::Head),
            other => Err(Error::Common(format!("unsupported http verb: {other}"))),
        }
    }
}

impl From<HTTPVerb> for reqwest::Method {
    fn from(verb: HTTPVerb) -> Self {
        match verb {
            HTTPVerb::Get => reqwest::Method::GET,
            HTTPVerb::Put => reqwest::Method::PUT,
            HTTPVerb::Post => reqwest::Method::POST,
            HTTPVerb::Delete => reqwest::Method::DELETE,
            HTTPVerb::Head => reqwest::Method::HEAD,
        }
    }
}

/// 可以作为子资源参与签名的query参数
///
/// `reponse-cache-control`的拼写是服务端约定的一部分，不能改成`response-cache-control`
const SUB_RESOURCES: &[&str] = &[
    "acl",
    "group",
    "uploadId",
    "partNumber",
    "uploads",
    "logging",
    "response-content-type",
    "response-content-language",
    "response-expires",
    "reponse-cache-control",
    "response-content-disposition",
    "response-content-encoding",
];

fn is_sub_resource(key: &str) -> bool {
    SUB_RESOURCES.contains(&key)
}

#[derive(Debug, Clone, Copy)]
pub struct SigningRequest<'a> {
    pub verb: HTTPVerb,
    /// header名称不区分大小写，`Content-MD5`，`Content-Type`不存在时按空字符串处理
    pub headers: &'a HashMap<String, String>,
    /// 形如`/bucket/object`，可以带有`?query`
    pub resource: &'a str,
    pub access_key_id: &'a str,
    pub access_key_secret: &'a str,
}

/// CanonicalizedOSSHeaders
///
/// - 只保留以`x-oss-`开头的header（名称小写并去掉首尾空白后判断）
/// - 值去掉首尾空白
/// - 按名称排序，结果与输入的顺序无关
/// - 调用者需要保证header名称不区分大小写时唯一，见[`Client::request`](crate::oss::Client::request)
/// - 使用`\n`连接，没有`x-oss-*`时返回空字符串
pub fn canonicalize_headers(headers: &HashMap<String, String>) -> String {
    let mut oss_headers = headers
        .iter()
        .filter_map(|(k, v)| {
            let name = k.trim().to_lowercase();
            name.starts_with("x-oss-")
                .then(|| (name, v.trim().to_owned()))
        })
        .collect::<Vec<_>>();
    oss_headers.sort();

    oss_headers
        .iter()
        .map(|(k, v)| format!("{k}:{v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// CanonicalizedResource
///
/// - path原样保留
/// - query只保留子资源参数，同名参数以第一次出现的为准
/// - 值为空时只输出`key`，否则输出`key=value`
/// - 按整个`key[=value]`字符串排序后使用`&`连接
pub fn canonicalize_resource(resource: &str) -> String {
    // fragment不属于资源的一部分
    let resource = resource.split_once('#').map_or(resource, |(r, _)| r);
    let Some((path, query)) = resource.split_once('?') else {
        return resource.to_owned();
    };

    let mut params: Vec<(String, String)> = Vec::new();
    for (k, v) in url::form_urlencoded::parse(query.as_bytes()) {
        if !is_sub_resource(&k) || params.iter().any(|(seen, _)| *seen == k) {
            continue;
        }
        params.push((k.into_owned(), v.into_owned()));
    }

    let mut tokens = params
        .into_iter()
        .map(|(k, v)| if v.is_empty() { k } else { format!("{k}={v}") })
        .collect::<Vec<_>>();
    if tokens.is_empty() {
        return path.to_owned();
    }
    tokens.sort();

    format!("{}?{}", path, tokens.join("&"))
}

/// 构造待签名字符串，请求中没有`Date`时使用当前时间
///
/// `Content-MD5`，`Content-Type`，`Date`的值去掉首尾空白，与实际发送的header保持一致
pub fn string_to_sign(req: &SigningRequest<'_>) -> Result<String, Error> {
    let date = match header_value(req.headers, "Date") {
        Some(d) => d.trim().to_owned(),
        None => gmt_format(&OffsetDateTime::now_utc())?,
    };

    let mut params = vec![
        req.verb.to_string(),
        header_value(req.headers, "Content-MD5")
            .unwrap_or_default()
            .trim()
            .to_owned(),
        header_value(req.headers, "Content-Type")
            .unwrap_or_default()
            .trim()
            .to_owned(),
        date,
    ];
    let oss_headers = canonicalize_headers(req.headers);
    if !oss_headers.is_empty() {
        params.push(oss_headers);
    }
    params.push(canonicalize_resource(req.resource));

    Ok(params.join("\n"))
}

/// 返回`Authorization`的值：`OSS AccessKeyId:Signature`
pub fn authorization(req: &SigningRequest<'_>) -> Result<String, Error> {
    let str_to_sign = string_to_sign(req)?;
    debug!("authorization with string to sign: {str_to_sign:?}");

    let signature = base64_hmac_sha1(req.access_key_secret, &str_to_sign);
    Ok(format!("OSS {}:{}", req.access_key_id, signature))
}
