use crate::core::config::Language;
use crate::core::error::{GenerationError, GenerationResult};
use crate::core::state::{
    BookSettings, OutlineItem, PipelineRunState, PromptSet, ScriptBlock, Stage, StageStatus,
    StoryBlock,
};
use crate::services::generator::{ContentGenerator, Credentials};
use crate::services::llm::Provider;
use crate::utils::text::chunk_text;

/// Receives progress from a running stage. All methods default to no-ops.
pub trait PipelineObserver: Send + Sync {
    fn stage_started(&self, _stage: Stage, _units: usize) {}
    fn unit_completed(&self, _stage: Stage, _done: usize, _total: usize) {}
    fn stage_finished(&self, _stage: Stage, _error: Option<&str>) {}
}

/// Sequences the generation stages over one owned [`PipelineRunState`].
///
/// Every stage takes `&mut self`, so a pipeline runs one stage at a time.
/// A busy flag still set on entry (a stage future dropped mid-run) also
/// refuses the new stage with `StageBusy`.
pub struct Pipeline {
    generator: ContentGenerator,
    book: BookSettings,
    credentials: Credentials,
    upload_chunk_chars: usize,
    state: PipelineRunState,
    observer: Option<Box<dyn PipelineObserver>>,
}

impl Pipeline {
    pub fn new(
        generator: ContentGenerator,
        book: BookSettings,
        credentials: Credentials,
        upload_chunk_chars: usize,
    ) -> Self {
        Self {
            generator,
            book,
            credentials,
            upload_chunk_chars,
            state: PipelineRunState::default(),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn PipelineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn state(&self) -> &PipelineRunState {
        &self.state
    }

    pub fn book(&self) -> &BookSettings {
        &self.book
    }

    pub fn book_mut(&mut self) -> &mut BookSettings {
        &mut self.book
    }

    pub fn set_credentials(&mut self, credentials: Credentials) {
        self.credentials = credentials;
    }

    pub fn status(&self, stage: Stage) -> StageStatus {
        self.state.status(stage)
    }

    pub fn error(&self) -> Option<&str> {
        self.state.error.as_deref()
    }

    fn check_entry(&self, stage: Stage) -> GenerationResult<()> {
        if !self.book.has_title() {
            return Err(GenerationError::Validation(match self.book.language {
                Language::Vi => "Vui lòng nhập tên sách trước.".to_string(),
                Language::En => "Please enter a book title first.".to_string(),
            }));
        }

        let provider = Provider::for_model(&self.book.model);
        if provider.requires_own_credential() {
            if let Err(GenerationError::MissingCredential { .. }) =
                self.generator.key_pool(provider, &self.credentials)
            {
                return Err(GenerationError::Validation(format!(
                    "{} requires a {} API key. Add one in the API key settings.",
                    self.book.model, provider
                )));
            }
        }

        if let Some(running) = self.state.busy.any() {
            log::warn!("Refusing {} while {} is running", stage, running);
            return Err(GenerationError::StageBusy(running));
        }

        match stage {
            Stage::Story if self.state.outline.is_empty() => {
                let message = if self.state.story_uploaded {
                    "The story was loaded from an uploaded file. Generate a new outline before writing it again."
                } else {
                    "An outline is required before writing the story. Generate one or upload a story file."
                };
                Err(GenerationError::PreconditionNotMet(message.to_string()))
            }
            Stage::Script if self.state.story.is_empty() => {
                Err(GenerationError::PreconditionNotMet(
                    "No story content yet. Write the story or upload a story file first."
                        .to_string(),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Runs the entry checks and flips the stage to `Running`.
    fn begin(&mut self, stage: Stage, units: usize) -> GenerationResult<()> {
        if let Err(e) = self.check_entry(stage) {
            self.state.error = Some(e.to_string());
            return Err(e);
        }
        self.state.error = None;
        self.state.busy.set(stage, true);
        self.state.set_status(stage, StageStatus::Running);
        log::info!("Stage {} started ({} unit(s))", stage, units);
        if let Some(observer) = &self.observer {
            observer.stage_started(stage, units);
        }
        Ok(())
    }

    fn finish(&mut self, stage: Stage, result: GenerationResult<()>) -> GenerationResult<()> {
        self.state.busy.set(stage, false);
        match &result {
            Ok(()) => {
                self.state.error = None;
                self.state.set_status(stage, StageStatus::Succeeded);
                log::info!("Stage {} succeeded", stage);
            }
            Err(e) => {
                let message = format!("Error while generating {}: {}", stage, e);
                log::error!("{}", message);
                self.state.error = Some(message);
                self.state.set_status(stage, StageStatus::Failed);
            }
        }
        if let Some(observer) = &self.observer {
            observer.stage_finished(stage, self.state.error.as_deref());
        }
        result
    }

    fn unit_done(&self, stage: Stage, done: usize, total: usize) {
        log::debug!("Stage {}: {}/{} done", stage, done, total);
        if let Some(observer) = &self.observer {
            observer.unit_completed(stage, done, total);
        }
    }

    pub async fn generate_outline(&mut self) -> GenerationResult<()> {
        self.begin(Stage::Outline, 1)?;
        let result = self.run_outline().await;
        self.finish(Stage::Outline, result)
    }

    async fn run_outline(&mut self) -> GenerationResult<()> {
        let drafts = self.generator.outline(&self.book, &self.credentials).await?;
        self.state.outline = drafts
            .into_iter()
            .enumerate()
            .map(|(index, d)| OutlineItem {
                index,
                title: d.title,
                focus: d.focus,
                actions: d.actions,
            })
            .collect();
        self.state.story.clear();
        self.state.script.clear();
        self.state.story_uploaded = false;
        self.unit_done(Stage::Outline, 1, 1);
        Ok(())
    }

    pub async fn generate_story(&mut self) -> GenerationResult<()> {
        let units = self.state.outline.len();
        self.begin(Stage::Story, units)?;
        let result = self.run_story().await;
        self.finish(Stage::Story, result)
    }

    async fn run_story(&mut self) -> GenerationResult<()> {
        self.state.story.clear();
        self.state.story_uploaded = false;

        let outline = self.state.outline.clone();
        let target = self.book.chapter_target_chars(outline.len());
        for (done, item) in outline.iter().enumerate() {
            let content = self
                .generator
                .story_block(item, &self.book, &self.credentials, target)
                .await?;
            self.state.story.push(StoryBlock {
                index: item.index,
                title: item.title.clone(),
                content,
            });
            self.unit_done(Stage::Story, done + 1, outline.len());
        }
        Ok(())
    }

    pub async fn generate_review_script(&mut self) -> GenerationResult<()> {
        let units = self.state.story.len();
        self.begin(Stage::Script, units)?;
        let result = self.run_review_script().await;
        self.finish(Stage::Script, result)
    }

    async fn run_review_script(&mut self) -> GenerationResult<()> {
        self.state.script.clear();

        let story = self.state.story.clone();
        for (done, block) in story.iter().enumerate() {
            let text = self
                .generator
                .review_block(block, &self.book, &self.credentials)
                .await?;
            self.state
                .script
                .push(ScriptBlock::new(block.index, block.title.clone(), text));
            self.unit_done(Stage::Script, done + 1, story.len());
        }
        Ok(())
    }

    pub async fn generate_seo(&mut self) -> GenerationResult<()> {
        self.begin(Stage::Seo, 1)?;
        let result = self.run_seo().await;
        self.finish(Stage::Seo, result)
    }

    async fn run_seo(&mut self) -> GenerationResult<()> {
        let seo = self.generator.seo(&self.book, &self.credentials).await?;
        self.state.seo = Some(seo);
        self.unit_done(Stage::Seo, 1, 1);
        Ok(())
    }

    pub async fn generate_prompts(&mut self) -> GenerationResult<()> {
        self.begin(Stage::Prompts, 2)?;
        let result = self.run_prompts().await;
        self.finish(Stage::Prompts, result)
    }

    async fn run_prompts(&mut self) -> GenerationResult<()> {
        let (video_prompts, thumbnail_ideas) = futures_util::future::try_join(
            self.generator.video_prompts(&self.book, &self.credentials),
            self.generator.thumbnail_ideas(&self.book, &self.credentials),
        )
        .await?;
        self.state.prompts = PromptSet {
            video_prompts,
            thumbnail_ideas,
        };
        self.unit_done(Stage::Prompts, 2, 2);
        Ok(())
    }

    /// Replaces outline, story and script with chunks of an uploaded text.
    ///
    /// Returns the number of story blocks created.
    pub fn load_uploaded_story(&mut self, text: &str) -> GenerationResult<usize> {
        let refused = if let Some(running) = self.state.busy.any() {
            Some(GenerationError::StageBusy(running))
        } else if text.trim().is_empty() {
            Some(GenerationError::Validation(
                "The uploaded file contains no text.".to_string(),
            ))
        } else {
            None
        };
        if let Some(e) = refused {
            self.state.error = Some(e.to_string());
            return Err(e);
        }

        let label = match self.book.language {
            Language::Vi => "Phần",
            Language::En => "Part",
        };
        self.state.story = chunk_text(text, self.upload_chunk_chars)
            .into_iter()
            .enumerate()
            .map(|(i, content)| StoryBlock {
                index: i + 1,
                title: format!("{} {} (Upload)", label, i + 1),
                content,
            })
            .collect();
        self.state.outline.clear();
        self.state.script.clear();
        self.state.story_uploaded = true;
        self.state.error = None;

        log::info!("Loaded {} story block(s) from upload", self.state.story.len());
        Ok(self.state.story.len())
    }
}
