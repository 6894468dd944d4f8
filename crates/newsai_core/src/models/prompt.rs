use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptType {
    Article,
    Image,
    Video,
    TextToSpeech,
}

impl PromptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Image => "image",
            Self::Video => "video",
            Self::TextToSpeech => "text-to-speech",
        }
    }
}

impl fmt::Display for PromptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "article" => Ok(Self::Article),
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "text-to-speech" => Ok(Self::TextToSpeech),
            other => Err(Error::Validation(format!("unknown prompt type: {}", other))),
        }
    }
}

/// A reusable AI prompt template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub prompt_type: PromptType,
    pub image_generation_prompt: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPrompt {
    pub name: String,
    pub prompt_type: PromptType,
    pub image_generation_prompt: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticlePrompt {
    pub article_id: Uuid,
    pub prompt_id: Uuid,
    pub created_at: DateTime<Utc>,
}
