use serde::Serialize;

const VERSION: &str = "1.0";

#[derive(Debug, Serialize, PartialEq)]
pub struct OutputSpeech {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

impl OutputSpeech {
    fn plain_text(text: impl Into<String>) -> Self {
        OutputSpeech {
            kind: "PlainText",
            text: text.into(),
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reprompt {
    pub output_speech: OutputSpeech,
}

#[derive(Debug, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_speech: Option<OutputSpeech>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reprompt: Option<Reprompt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub should_end_session: Option<bool>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct SkillResponse {
    pub version: &'static str,
    pub response: ResponseBody,
}

impl SkillResponse {
    pub fn speech(&self) -> Option<&str> {
        self.response
            .output_speech
            .as_ref()
            .map(|speech| speech.text.as_str())
    }
}

#[cfg(test)]
impl SkillResponse {
    pub fn reprompt(&self) -> Option<&str> {
        self.response
            .reprompt
            .as_ref()
            .map(|reprompt| reprompt.output_speech.text.as_str())
    }
}

/// 回答后保持会话, 等待用户继续说话
pub fn ask(text: impl Into<String>, reprompt: impl Into<String>) -> SkillResponse {
    SkillResponse {
        version: VERSION,
        response: ResponseBody {
            output_speech: Some(OutputSpeech::plain_text(text)),
            reprompt: Some(Reprompt {
                output_speech: OutputSpeech::plain_text(reprompt),
            }),
            should_end_session: Some(false),
        },
    }
}

/// 回答后结束会话
pub fn tell(text: impl Into<String>) -> SkillResponse {
    SkillResponse {
        version: VERSION,
        response: ResponseBody {
            output_speech: Some(OutputSpeech::plain_text(text)),
            reprompt: None,
            should_end_session: Some(true),
        },
    }
}

pub fn empty() -> SkillResponse {
    SkillResponse {
        version: VERSION,
        response: ResponseBody::default(),
    }
}
