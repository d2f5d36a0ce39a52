use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub application_id: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub session_id: String,
    pub application: Option<Application>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SystemState {
    pub application: Option<Application>,
}

#[derive(Debug, Deserialize, Default)]
pub struct Context {
    #[serde(rename = "System")]
    pub system: Option<SystemState>,
}

/// 每种请求共有的字段
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RequestMeta {
    #[serde(default)]
    pub request_id: String,
    /// RFC 3339
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub locale: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct Slot {
    pub value: Option<String>,
}

/// 平台可能发来 null 的名字, 槽位表或槽位
#[derive(Debug, Deserialize, Default)]
pub struct Intent {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slots: Option<HashMap<String, Option<Slot>>>,
}

impl Intent {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// 槽位不存在或没有值时返回空串
    pub fn slot_value(&self, name: &str) -> &str {
        self.slots
            .as_ref()
            .and_then(|slots| slots.get(name))
            .and_then(|slot| slot.as_ref())
            .and_then(|slot| slot.value.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Deserialize)]
pub struct LaunchRequest {
    #[serde(flatten)]
    pub meta: RequestMeta,
}

#[derive(Debug, Deserialize)]
pub struct IntentRequest {
    #[serde(flatten)]
    pub meta: RequestMeta,
    /// 缺少时由技能回复错误提示, 不在反序列化时拒绝
    #[serde(default)]
    pub intent: Option<Intent>,
}

#[derive(Debug, Deserialize)]
pub struct SessionEndedRequest {
    #[serde(flatten)]
    pub meta: RequestMeta,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    LaunchRequest(LaunchRequest),
    IntentRequest(IntentRequest),
    SessionEndedRequest(SessionEndedRequest),
    #[serde(other)]
    Unknown,
}

impl Request {
    pub fn meta(&self) -> Option<&RequestMeta> {
        match self {
            Request::LaunchRequest(r) => Some(&r.meta),
            Request::IntentRequest(r) => Some(&r.meta),
            Request::SessionEndedRequest(r) => Some(&r.meta),
            Request::Unknown => None,
        }
    }

    pub fn locale(&self) -> Option<&str> {
        self.meta()
            .map(|meta| meta.locale.as_str())
            .filter(|locale| !locale.is_empty())
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.meta()
            .map(|meta| meta.timestamp.as_str())
            .filter(|timestamp| !timestamp.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct RequestEnvelope {
    pub session: Option<Session>,
    pub context: Option<Context>,
    pub request: Request,
}

impl RequestEnvelope {
    pub fn session_id(&self) -> &str {
        self.session
            .as_ref()
            .map(|session| session.session_id.as_str())
            .unwrap_or("")
    }

    /// 优先取 context.System 中的技能id, 其次取 session 中的
    pub fn application_id(&self) -> Option<&str> {
        let from_context = self
            .context
            .as_ref()
            .and_then(|c| c.system.as_ref())
            .and_then(|s| s.application.as_ref());
        let from_session = self.session.as_ref().and_then(|s| s.application.as_ref());
        from_context
            .or(from_session)
            .map(|app| app.application_id.as_str())
    }
}
