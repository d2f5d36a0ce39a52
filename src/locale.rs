use std::collections::HashMap;

pub const FALLBACK_LOCALE: &str = "en";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    Welcome,
    WelcomeReprompt,
    Response,
    Cancel,
    Help,
    Stop,
    Error,
}

#[cfg(test)]
impl MessageKey {
    pub const ALL: [MessageKey; 7] = [
        MessageKey::Welcome,
        MessageKey::WelcomeReprompt,
        MessageKey::Response,
        MessageKey::Cancel,
        MessageKey::Help,
        MessageKey::Stop,
        MessageKey::Error,
    ];
}

/// 语言代码 -> 消息 -> 文本, 每次请求重新构建
#[derive(Debug)]
pub struct LocaleStore {
    languages: HashMap<&'static str, HashMap<MessageKey, &'static str>>,
}

impl Default for LocaleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocaleStore {
    pub fn new() -> Self {
        let mut store = LocaleStore {
            languages: HashMap::new(),
        };

        store.add_language(
            "en",
            [
                (MessageKey::Welcome, "Welcome to the skill!"),
                (
                    MessageKey::WelcomeReprompt,
                    "You can ask help if you need instructions on how to interact with the skill",
                ),
                (MessageKey::Response, "This is just a sample answer"),
                (MessageKey::Cancel, "Canceling..."),
                (MessageKey::Help, "Help..."),
                (MessageKey::Stop, "Bye bye!"),
                (
                    MessageKey::Error,
                    "I'm sorry, there was an unexpected error. Please, try again later.",
                ),
            ],
        );

        store.add_language(
            "it",
            [
                (MessageKey::Welcome, "Benvenuto nella skill!"),
                (
                    MessageKey::WelcomeReprompt,
                    "Se vuoi informazioni sulle mie funzionalità, prova a chiedermi aiuto",
                ),
                (MessageKey::Response, "Questa è solo una risposta di prova"),
                (MessageKey::Cancel, "Sto annullando..."),
                (MessageKey::Help, "Aiuto..."),
                (MessageKey::Stop, "A presto!"),
                (
                    MessageKey::Error,
                    "Mi dispiace, si è verificato un errore imprevisto. Per favore, riprova di nuovo in seguito.",
                ),
            ],
        );

        store
    }

    fn add_language(&mut self, code: &'static str, entries: [(MessageKey, &'static str); 7]) {
        self.languages.insert(code, entries.into_iter().collect());
    }

    pub fn supports(&self, code: &str) -> bool {
        self.languages.contains_key(code)
    }

    pub fn get(&self, code: &str, key: MessageKey) -> Option<&'static str> {
        self.languages.get(code)?.get(&key).copied()
    }

    /// 先完全匹配, 再匹配语言部分 (it-IT -> it), 最后回退到英语
    pub fn resolve(&self, requested: &str) -> Locale<'_> {
        let requested = requested.trim().to_ascii_lowercase();
        let language = requested.split(['-', '_']).next().unwrap_or_default();
        let code = [requested.as_str(), language]
            .into_iter()
            .find(|candidate| self.supports(candidate))
            .unwrap_or(FALLBACK_LOCALE)
            .to_string();
        Locale { store: self, code }
    }
}

/// 已选定语言的查询入口
#[derive(Debug)]
pub struct Locale<'a> {
    store: &'a LocaleStore,
    code: String,
}

impl Locale<'_> {
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn get(&self, key: MessageKey) -> Option<&'static str> {
        self.store.get(&self.code, key)
    }
}
