//! AccessKey相关定义
//!
//! `Debug`输出会隐藏AccessKey的内容，避免打印日志的时候泄露密钥

use std::fmt::{Debug, Formatter};

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub access_key_secret: String,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, access_key_secret: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.access_key_id.is_empty() && !self.access_key_secret.is_empty()
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &Redact(&self.access_key_id))
            .field("access_key_secret", &Redact(&self.access_key_secret))
            .finish()
    }
}

/// 少于12个字符的全部隐藏，否则只保留首尾各3个字符
struct Redact<'a>(&'a str);

impl Debug for Redact<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = self.0;
        if s.is_empty() {
            f.write_str("EMPTY")
        } else if s.chars().count() < 12 {
            f.write_str("***")
        } else {
            let head = s.chars().take(3).collect::<String>();
            let tail = s.chars().rev().take(3).collect::<Vec<_>>();
            write!(f, "{head}***{}", tail.into_iter().rev().collect::<String>())
        }
    }
}

#[test]
fn credentials_debug_test() {
    let creds = Credentials::new("9BEMD2aTsxg9mFJK", "short");
    let s = format!("{creds:?}");
    assert!(s.contains("9BE***FJK"));
    assert!(!s.contains("9BEMD2aTsxg9mFJK"));
    assert!(!s.contains("short"));
    assert!(creds.is_valid());
    assert!(!Credentials::new("", "secret").is_valid());
}
