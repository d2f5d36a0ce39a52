use crate::locale::{Locale, LocaleStore, MessageKey, FALLBACK_LOCALE};
use crate::request::{Intent, Request, RequestEnvelope};
use crate::response::{self, SkillResponse};
use crate::stats::{self, StatsSource};
use thiserror::Error;
use tracing::{error, info, warn};

pub const CANCEL_INTENT: &str = "AMAZON.CancelIntent";
pub const HELP_INTENT: &str = "AMAZON.HelpIntent";
pub const STOP_INTENT: &str = "AMAZON.StopIntent";

pub const LOCATION_SLOT: &str = "location";

#[derive(Debug, Error)]
pub enum SkillError {
    #[error("no {key:?} message for locale {locale}")]
    MissingMessage { locale: String, key: MessageKey },

    #[error("intent request {request_id:?} carries no intent")]
    MissingIntent { request_id: String },
}

pub struct Skill<'a> {
    stats: &'a dyn StatsSource,
    header_marker: &'a str,
}

impl<'a> Skill<'a> {
    pub fn new(stats: &'a dyn StatsSource, header_marker: &'a str) -> Self {
        Skill {
            stats,
            header_marker,
        }
    }

    /// 每个请求都只产生一个回复; 处理出错时说本地化的错误提示并保持会话
    pub async fn handle(&self, envelope: &RequestEnvelope) -> SkillResponse {
        let store = LocaleStore::new();
        let locale = store.resolve(envelope.request.locale().unwrap_or(FALLBACK_LOCALE));
        let request_id = envelope
            .request
            .meta()
            .map(|meta| meta.request_id.as_str())
            .unwrap_or("");
        info!(request_id, session_id = envelope.session_id(), locale = locale.code(), "收到请求");

        match self.dispatch(&envelope.request, &locale).await {
            Ok(response) => response,
            Err(err) => {
                error!("处理请求出错: {err}");
                error_response(&locale)
            }
        }
    }

    async fn dispatch(&self, request: &Request, locale: &Locale<'_>) -> Result<SkillResponse, SkillError> {
        match request {
            Request::LaunchRequest(_) => {
                info!("会话开始");
                Ok(response::ask(
                    message(locale, MessageKey::Welcome)?,
                    message(locale, MessageKey::WelcomeReprompt)?,
                ))
            }
            Request::IntentRequest(intent_request) => {
                let intent = intent_request
                    .intent
                    .as_ref()
                    .ok_or_else(|| SkillError::MissingIntent {
                        request_id: intent_request.meta.request_id.clone(),
                    })?;
                if let Some(response) = system_intent(intent, locale)? {
                    return Ok(response);
                }

                let location = normalize_location(intent.slot_value(LOCATION_SLOT));
                info!("槽位值: {location}");
                let data = stats::report(self.stats, self.header_marker, &location).await;
                info!("统计结果: {data}");
                Ok(response::tell(data))
            }
            Request::SessionEndedRequest(ended) => {
                info!("会话结束 {:?}", ended.reason);
                Ok(response::empty())
            }
            Request::Unknown => {
                warn!("不支持的请求类型");
                Ok(response::empty())
            }
        }
    }
}

/// 错误提示不结束会话, 让用户可以重试
fn error_response(locale: &Locale<'_>) -> SkillResponse {
    let mut response = response::tell(locale.get(MessageKey::Error).unwrap_or_default());
    response.response.should_end_session = Some(false);
    response
}

/// 平台内置意图优先处理
fn system_intent(intent: &Intent, locale: &Locale<'_>) -> Result<Option<SkillResponse>, SkillError> {
    let response = match intent.name() {
        CANCEL_INTENT => response::tell(message(locale, MessageKey::Cancel)?),
        HELP_INTENT => {
            let help = message(locale, MessageKey::Help)?;
            response::ask(help, help)
        }
        STOP_INTENT => response::tell(message(locale, MessageKey::Stop)?),
        _ => return Ok(None),
    };
    Ok(Some(response))
}

fn message(locale: &Locale<'_>, key: MessageKey) -> Result<&'static str, SkillError> {
    locale.get(key).ok_or_else(|| SkillError::MissingMessage {
        locale: locale.code().to_string(),
        key,
    })
}

/// 空值原样传递
fn normalize_location(value: &str) -> String {
    if value.is_empty() {
        String::new()
    } else {
        value.trim().to_uppercase()
    }
}
