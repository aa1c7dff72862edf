use reqwest::header::{InvalidHeaderName, InvalidHeaderValue};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("error: {0}")]
    Common(String),
    #[error("invalid header name: {0}")]
    InvalidHeaderName(#[from] InvalidHeaderName),
    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] InvalidHeaderValue),
    #[error("time format error: {0}")]
    TimeFormat(#[from] time::error::Format),
}
