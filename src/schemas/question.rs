use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    #[serde(alias = "single", alias = "radio", alias = "singleChoice")]
    SingleChoice,
    #[serde(alias = "multiple", alias = "checkbox", alias = "multiChoice")]
    MultiChoice,
    Matching,
    #[serde(alias = "ordering")]
    Ranking,
    #[serde(alias = "text", alias = "essay", alias = "freeText")]
    FreeText,
}

impl QuestionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SingleChoice => "single_choice",
            Self::MultiChoice => "multi_choice",
            Self::Matching => "matching",
            Self::Ranking => "ranking",
            Self::FreeText => "free_text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchingColumns {
    #[serde(default)]
    pub left: Vec<Choice>,
    #[serde(default)]
    pub right: Vec<Choice>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[serde(alias = "passage")]
    Text,
    Image,
    Audio,
    Video,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedMedia {
    pub id: String,
    #[serde(alias = "type")]
    pub kind: MediaKind,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(rename = "type", alias = "kind", alias = "questionType")]
    pub kind: QuestionKind,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    #[serde(alias = "matchingColumns")]
    pub matching: Option<MatchingColumns>,
    #[serde(default)]
    #[serde(alias = "sharedMedia")]
    pub shared_media: Option<SharedMedia>,
}

impl Question {
    pub fn shared_media_id(&self) -> Option<&str> {
        self.shared_media.as_ref().map(|media| media.id.as_str())
    }
}
