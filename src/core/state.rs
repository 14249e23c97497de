use crate::core::config::{Config, Language};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Outline,
    Story,
    Script,
    Seo,
    Prompts,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Outline,
        Stage::Story,
        Stage::Script,
        Stage::Seo,
        Stage::Prompts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Outline => "outline",
            Stage::Story => "story",
            Stage::Script => "script",
            Stage::Seo => "seo",
            Stage::Prompts => "prompts",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageStatus {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OutlineItem {
    pub index: usize,
    pub title: String,
    pub focus: String,
    pub actions: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StoryBlock {
    pub index: usize,
    pub title: String,
    pub content: String,
}

/// A review-script segment. `chars` is fixed from `text` at construction.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ScriptBlock {
    index: usize,
    chapter: String,
    text: String,
    chars: usize,
}

impl ScriptBlock {
    pub fn new(index: usize, chapter: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let chars = text.chars().count();
        Self {
            index,
            chapter: chapter.into(),
            text,
            chars,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn chapter(&self) -> &str {
        &self.chapter
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn chars(&self) -> usize {
        self.chars
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct SeoResult {
    pub titles: Vec<String>,
    pub hashtags: Vec<String>,
    pub keywords: Vec<String>,
    pub description: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct PromptSet {
    pub video_prompts: Vec<String>,
    pub thumbnail_ideas: Vec<String>,
}

/// Inputs shared by every stage of one book.
#[derive(Debug, Clone, PartialEq)]
pub struct BookSettings {
    pub title: String,
    pub idea: String,
    pub chapters_count: u32,
    pub duration_min: u32,
    pub frame_ratio: String,
    pub language: Language,
    pub model: String,
}

impl BookSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            title: String::new(),
            idea: String::new(),
            chapters_count: config.book.chapters_count,
            duration_min: config.book.duration_min,
            frame_ratio: config.book.frame_ratio.clone(),
            language: config.language,
            model: config.llm.model.clone(),
        }
    }

    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }

    /// Total narration length aimed for, in characters.
    pub fn target_chars(&self) -> u64 {
        u64::from(self.duration_min) * 1000
    }

    pub fn chapter_target_chars(&self, chapters: usize) -> u64 {
        self.target_chars() / chapters.max(1) as u64
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusyFlags {
    pub outline: bool,
    pub story: bool,
    pub script: bool,
    pub seo: bool,
    pub prompts: bool,
}

impl BusyFlags {
    pub fn get(&self, stage: Stage) -> bool {
        match stage {
            Stage::Outline => self.outline,
            Stage::Story => self.story,
            Stage::Script => self.script,
            Stage::Seo => self.seo,
            Stage::Prompts => self.prompts,
        }
    }

    pub fn set(&mut self, stage: Stage, busy: bool) {
        let flag = match stage {
            Stage::Outline => &mut self.outline,
            Stage::Story => &mut self.story,
            Stage::Script => &mut self.script,
            Stage::Seo => &mut self.seo,
            Stage::Prompts => &mut self.prompts,
        };
        *flag = busy;
    }

    pub fn any(&self) -> Option<Stage> {
        Stage::ALL.into_iter().find(|s| self.get(*s))
    }
}

/// Everything a generation run has produced so far, plus UI-facing flags.
#[derive(Debug, Clone, Default)]
pub struct PipelineRunState {
    pub busy: BusyFlags,
    pub error: Option<String>,
    pub outline: Vec<OutlineItem>,
    pub story: Vec<StoryBlock>,
    pub script: Vec<ScriptBlock>,
    pub seo: Option<SeoResult>,
    pub prompts: PromptSet,
    /// Set when `story` came from an uploaded file rather than the Story stage.
    pub story_uploaded: bool,
    status: [StageStatus; 5],
}

impl PipelineRunState {
    pub fn status(&self, stage: Stage) -> StageStatus {
        self.status[stage as usize]
    }

    pub(crate) fn set_status(&mut self, stage: Stage, status: StageStatus) {
        self.status[stage as usize] = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_block_counts_chars_not_bytes() {
        let block = ScriptBlock::new(1, "Chương 1", "Chương một");
        assert_eq!(block.chars(), 10);
        assert_eq!(block.text().len(), 14);
    }

    #[test]
    fn test_book_settings_targets() {
        let mut settings = BookSettings::from_config(&Config::default());
        assert!(!settings.has_title());
        settings.title = "  ".to_string();
        assert!(!settings.has_title());
        assert_eq!(settings.target_chars(), 240_000);
        assert_eq!(settings.chapter_target_chars(12), 20_000);
        assert_eq!(settings.chapter_target_chars(0), 240_000);
    }

    #[test]
    fn test_busy_flags_any() {
        let mut flags = BusyFlags::default();
        assert_eq!(flags.any(), None);
        flags.set(Stage::Seo, true);
        assert_eq!(flags.any(), Some(Stage::Seo));
        assert!(flags.get(Stage::Seo));
        flags.set(Stage::Seo, false);
        assert_eq!(flags.any(), None);
    }

    #[test]
    fn test_status_defaults_to_idle() {
        let state = PipelineRunState::default();
        for stage in Stage::ALL {
            assert_eq!(state.status(stage), StageStatus::Idle);
        }
    }
}
