use crate::oss::Error;
use base64::{Engine, engine::general_purpose};
use std::collections::HashMap;

/// 计算`Content-MD5`：base64编码的MD5值
pub fn content_md5(bytes: &[u8]) -> String {
    use md5::{Digest, Md5};

    let mut hasher = Md5::new();
    hasher.update(bytes);
    let res = hasher.finalize();

    general_purpose::STANDARD.encode(res)
}

#[test]
fn content_md5_test() {
    let s = content_md5(b"0123456789");
    assert_eq!(&s, "eB5eJF1ptWaXm4bijSPyxw==");
    assert_eq!(content_md5(b"## kloud"), "qPFshpJZBjO4/rvQM+Og8g==");
}

/// 不区分大小写获取header的值
///
/// 如果有多个名称只有大小写不同的header，取名称排序最小的那个，保证结果确定
pub(crate) fn header_value<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .filter(|(k, _)| k.trim().eq_ignore_ascii_case(name))
        .min_by(|a, b| a.0.cmp(b.0))
        .map(|(_, v)| v.as_str())
}

/// 设置header，会先移除所有同名（不区分大小写）的header
pub(crate) fn set_header(headers: &mut HashMap<String, String>, name: &str, value: impl Into<String>) {
    headers.retain(|k, _| !k.trim().eq_ignore_ascii_case(name));
    headers.insert(name.to_owned(), value.into());
}

#[test]
fn header_helpers_test() {
    let mut h = HashMap::new();
    h.insert("content-type".to_owned(), "a".to_owned());
    h.insert("Content-Type".to_owned(), "b".to_owned());
    // "Content-Type" < "content-type"
    assert_eq!(header_value(&h, "CONTENT-TYPE"), Some("b"));
    assert_eq!(header_value(&h, "Date"), None);

    set_header(&mut h, "Content-Type", "c");
    assert_eq!(h.len(), 1);
    assert_eq!(h.get("Content-Type").map(String::as_str), Some("c"));
}

/// 检查header名称，不区分大小写时不能重复
///
/// 发送时同名header只会保留一个，签名和实际发送的header必须一致
pub(crate) fn check_header_names(headers: &HashMap<String, String>) -> Result<(), Error> {
    let mut names = headers
        .keys()
        .map(|k| k.trim().to_lowercase())
        .collect::<Vec<_>>();
    names.sort();
    match names.windows(2).find(|w| w[0] == w[1]) {
        Some(w) => Err(Error::Config(format!("duplicate header: {}", w[0]))),
        None => Ok(()),
    }
}

#[test]
fn check_header_names_test() {
    let mut h = HashMap::new();
    h.insert("x-oss-meta-a".to_owned(), "a".to_owned());
    h.insert("Content-Type".to_owned(), "text/plain".to_owned());
    assert!(check_header_names(&h).is_ok());

    h.insert("X-Oss-Meta-A".to_owned(), "z".to_owned());
    match check_header_names(&h) {
        Err(Error::Config(msg)) => assert!(msg.contains("x-oss-meta-a")),
        other => panic!("unexpected result: {other:?}"),
    }

    let mut h = HashMap::new();
    h.insert("content-type".to_owned(), "a".to_owned());
    h.insert(" Content-Type".to_owned(), "b".to_owned());
    assert!(check_header_names(&h).is_err());
}

/// 对象名称规则：<https://help.aliyun.com/zh/oss/user-guide/object-naming-conventions>
///
/// 只检查`?`之前的部分，`?`之后的子资源参数由调用者保证
pub(crate) fn validate_object_name(name: &str) -> Result<(), Error> {
    let name = name.split_once('?').map_or(name, |(n, _)| n);

    // 1. 长度检查
    let len = name.len();
    if len == 0 {
        return Err(Error::Common("object_name cannot be empty".to_owned()));
    }
    if len > 1023 {
        return Err(Error::Common(
            "object_name is too long, max is 1023 bytes".to_owned(),
        ));
    }

    // 2. 前缀检查
    if name.starts_with('/') || name.starts_with('\\') {
        return Err(Error::Common(
            "object_name cannot start with '/' or '\\'".to_owned(),
        ));
    }

    // 3. 控制字符检查
    if name.bytes().any(|b| b == b'\r' || b == b'\n') {
        return Err(Error::Common(
            "object_name cannot contain control characters".to_owned(),
        ));
    }

    // 4. 空路径段检查，末尾的'/'表示目录，不算空段
    let segments: Vec<&str> = name.strip_suffix('/').unwrap_or(name).split('/').collect();
    if segments.iter().any(|seg| seg.is_empty()) {
        return Err(Error::Common(
            "object_name cannot contain empty path segments".to_owned(),
        ));
    }

    // 5. 相对路径段检查
    if segments.iter().any(|seg| *seg == "." || *seg == "..") {
        return Err(Error::Common(
            "object_name cannot contain relative path segments '.' or '..'".to_owned(),
        ));
    }

    Ok(())
}

#[test]
fn validate_object_name_test() {
    assert!(validate_object_name("exampleobject.txt").is_ok());
    assert!(validate_object_name("dir/subdir/file_测试-01.log").is_ok());
    assert!(validate_object_name("a/b/").is_ok());
    assert!(validate_object_name("README.md?acl").is_ok());

    assert!(validate_object_name("").is_err());
    assert!(validate_object_name("?acl").is_err());
    assert!(validate_object_name(&"a".repeat(1024)).is_err());
    assert!(validate_object_name("/badname").is_err());
    assert!(validate_object_name("\\badname").is_err());
    assert!(validate_object_name("bad\r\nname").is_err());
    assert!(validate_object_name("a//abc").is_err());
    assert!(validate_object_name("./abc").is_err());
    assert!(validate_object_name("abc/../def").is_err());
}
