use crate::config::Verification;
use crate::request::RequestEnvelope;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use tracing::{debug, warn};
use warp::http::HeaderMap;

const SIGNATURE_HEADERS: [&str; 2] = ["Signature-256", "Signature"];
const CERT_CHAIN_HEADER: &str = "SignatureCertChainUrl";
const CERT_HOST: &str = "s3.amazonaws.com";
const CERT_PATH_PREFIX: &str = "/echo.api/";

/// 判断请求是否来自语音平台
#[async_trait]
pub trait RequestValidator: Send + Sync {
    async fn validate(&self, headers: &HeaderMap, body: &[u8], envelope: &RequestEnvelope) -> bool;
}

/// 关闭校验时使用
pub struct AcceptAll;

#[async_trait]
impl RequestValidator for AcceptAll {
    async fn validate(&self, _: &HeaderMap, _: &[u8], _: &RequestEnvelope) -> bool {
        true
    }
}

/// 检查签名头, 证书链地址, 时间戳和技能id.
/// 签名本身的验证 (下载证书并校验 body) 不在这里做.
pub struct AlexaRequestValidator {
    tolerance_secs: i64,
    application_id: Option<String>,
}

impl AlexaRequestValidator {
    pub fn new(tolerance_secs: i64, application_id: Option<String>) -> Self {
        AlexaRequestValidator {
            tolerance_secs,
            application_id,
        }
    }

    pub fn from_config(verification: &Verification) -> Self {
        Self::new(
            verification.timestamp_tolerance_secs,
            verification.application_id.clone(),
        )
    }

    fn timestamp_is_fresh(&self, timestamp: &str, now: DateTime<Utc>) -> bool {
        match DateTime::parse_from_rfc3339(timestamp) {
            Ok(sent) => (now - sent.with_timezone(&Utc)).num_seconds().abs() <= self.tolerance_secs,
            Err(e) => {
                debug!("无法解析时间戳 {timestamp}: {e}");
                false
            }
        }
    }

    fn check(&self, headers: &HeaderMap, envelope: &RequestEnvelope, now: DateTime<Utc>) -> Result<(), &'static str> {
        let has_signature = SIGNATURE_HEADERS
            .iter()
            .filter_map(|name| headers.get(*name))
            .any(|value| !value.is_empty());
        if !has_signature {
            return Err("missing signature header");
        }

        let cert_url = headers
            .get(CERT_CHAIN_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or("missing certificate chain url")?;
        if !cert_chain_url_is_valid(cert_url) {
            return Err("invalid certificate chain url");
        }

        let timestamp = envelope.request.timestamp().ok_or("missing timestamp")?;
        if !self.timestamp_is_fresh(timestamp, now) {
            return Err("stale timestamp");
        }

        if let Some(expected) = &self.application_id {
            if envelope.application_id() != Some(expected.as_str()) {
                return Err("application id mismatch");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RequestValidator for AlexaRequestValidator {
    async fn validate(&self, headers: &HeaderMap, _body: &[u8], envelope: &RequestEnvelope) -> bool {
        match self.check(headers, envelope, Utc::now()) {
            Ok(()) => true,
            Err(reason) => {
                warn!("请求校验失败: {reason}");
                false
            }
        }
    }
}

/// https, s3.amazonaws.com, 443 端口, 路径以 /echo.api/ 开头 (路径先规范化)
pub fn cert_chain_url_is_valid(raw: &str) -> bool {
    let Ok(url) = Url::parse(raw) else {
        return false;
    };
    url.scheme() == "https"
        && url
            .host_str()
            .is_some_and(|host| host.eq_ignore_ascii_case(CERT_HOST))
        && url.port().map_or(true, |port| port == 443)
        && url.path().starts_with(CERT_PATH_PREFIX)
}
