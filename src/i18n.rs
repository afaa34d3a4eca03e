use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Zh,
}

#[derive(Debug, Clone, Copy)]
pub struct SlotMessages {
    pub generating: &'static str,
    pub completed: &'static str,
    pub retrying: &'static str,
    pub error: &'static str,
    pub cancelled: &'static str,
}

const EN_MESSAGES: SlotMessages = SlotMessages {
    generating: "Generating...",
    completed: "Completed",
    retrying: "Retrying",
    error: "Generation failed",
    cancelled: "Cancelled",
};

const ZH_MESSAGES: SlotMessages = SlotMessages {
    generating: "生成中...",
    completed: "已完成",
    retrying: "重试中",
    error: "生成失败",
    cancelled: "已取消",
};

impl Locale {
    pub const ALL: [Locale; 2] = [Locale::En, Locale::Zh];

    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Zh => "zh",
        }
    }

    pub fn messages(&self) -> &'static SlotMessages {
        match self {
            Locale::En => &EN_MESSAGES,
            Locale::Zh => &ZH_MESSAGES,
        }
    }

    pub fn localize_path(&self, path: &str) -> String {
        match path.strip_prefix('/') {
            Some(rest) => format!("/{}/{}", self.as_str(), rest),
            None => format!("/{}/{}", self.as_str(), path),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Locale::En),
            "zh" => Ok(Locale::Zh),
            other => Err(format!("Unsupported locale: {}", other)),
        }
    }
}
