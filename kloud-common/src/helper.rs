use crate::Error;
use base64::{Engine, engine::general_purpose};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use sha1::Sha1;
use std::collections::HashMap;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// 输出格式: Day, DD Mon YYYY hh:mm:ss GMT
///
/// eg: Tue, 01 Jan 2019 00:00:00 GMT
///
/// 传入的时间会先转换到UTC
pub fn gmt_format(date_time: &OffsetDateTime) -> Result<String, Error> {
    let s = date_time.to_offset(UtcOffset::UTC).format(format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    ))?;
    Ok(s)
}

pub fn sign_hmac_sha1(secret: &str, str_to_sign: &str) -> Vec<u8> {
    type HmacSha1 = Hmac<Sha1>;
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(str_to_sign.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

pub fn base64_hmac_sha1(secret: &str, str_to_sign: &str) -> String {
    general_purpose::STANDARD.encode(sign_hmac_sha1(secret, str_to_sign))
}

pub fn into_header_map(map: HashMap<String, String>) -> Result<HeaderMap, Error> {
    let mut header_map = HeaderMap::with_capacity(map.len());
    for (k, v) in map {
        let name = HeaderName::from_bytes(k.trim().as_bytes())?;
        let value = HeaderValue::from_str(v.trim())?;
        header_map.insert(name, value);
    }
    Ok(header_map)
}
