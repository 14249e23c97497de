use crate::core::error::{GenerationError, GenerationResult};
use crate::core::prefs::{self, Preferences};
use crate::core::state::{BookSettings, OutlineItem, SeoResult, StoryBlock};
use crate::services::decode::{decode_json, Validate};
use crate::services::keys::KeyPool;
use crate::services::llm::{ClientFactory, GenerationRequest, LlmConfig, Provider};
use crate::services::prompts;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Raw key text per provider, exactly as typed or persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub gemini: String,
    pub openai: String,
}

impl Credentials {
    pub fn from_prefs(prefs: &Preferences) -> Self {
        Self {
            gemini: prefs.get_or_empty(prefs::GEMINI_API_KEY).to_string(),
            openai: prefs.get_or_empty(prefs::OPENAI_API_KEY).to_string(),
        }
    }

    pub fn raw_for(&self, provider: Provider) -> &str {
        match provider {
            Provider::Gemini => &self.gemini,
            Provider::OpenAI => &self.openai,
        }
    }
}

/// Outline entry as returned by the model, before an index is assigned.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutlineDraft {
    pub title: String,
    pub focus: String,
    pub actions: Vec<String>,
}

impl Validate for Vec<OutlineDraft> {
    fn validate(&self) -> Result<(), String> {
        if self.is_empty() {
            return Err("outline is empty".to_string());
        }
        for (i, item) in self.iter().enumerate() {
            if item.title.trim().is_empty() {
                return Err(format!("outline item {} has no title", i + 1));
            }
            if item.actions.is_empty() {
                return Err(format!("outline item {} has no actions", i + 1));
            }
        }
        Ok(())
    }
}

impl Validate for SeoResult {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// One function per generation call; every call goes through the key pool.
pub struct ContentGenerator {
    factory: Arc<dyn ClientFactory>,
    config: LlmConfig,
}

impl ContentGenerator {
    pub fn new(factory: Arc<dyn ClientFactory>, config: LlmConfig) -> Self {
        Self { factory, config }
    }

    fn env_var(&self, provider: Provider) -> &str {
        match provider {
            Provider::Gemini => &self.config.gemini.env_key,
            Provider::OpenAI => &self.config.openai.env_key,
        }
    }

    /// Re-parses the key text on every call so edits apply immediately.
    pub fn key_pool(&self, provider: Provider, creds: &Credentials) -> GenerationResult<KeyPool> {
        KeyPool::from_env(provider, Some(creds.raw_for(provider)), self.env_var(provider))
    }

    async fn request_text(
        &self,
        book: &BookSettings,
        creds: &Credentials,
        prompt: String,
    ) -> GenerationResult<String> {
        let pool = self.key_pool(Provider::for_model(&book.model), creds)?;
        let request = GenerationRequest::text(&book.model, prompt);
        let request = &request;

        pool.execute(self.factory.as_ref(), |client| async move {
            let text = client.generate(request).await?;
            if text.trim().is_empty() {
                return Err(anyhow::Error::from(GenerationError::EmptyResponse));
            }
            Ok(text.trim().to_string())
        })
        .await
        .map_err(surface_decode)
    }

    async fn request_json<T>(
        &self,
        book: &BookSettings,
        creds: &Credentials,
        prompt: String,
        schema: Value,
    ) -> GenerationResult<T>
    where
        T: DeserializeOwned + Validate,
    {
        let pool = self.key_pool(Provider::for_model(&book.model), creds)?;
        let request = GenerationRequest::json(&book.model, prompt, schema);
        let request = &request;

        pool.execute(self.factory.as_ref(), |client| async move {
            let text = client.generate(request).await?;
            Ok(decode_json::<T>(&text)?)
        })
        .await
        .map_err(surface_decode)
    }

    pub async fn outline(
        &self,
        book: &BookSettings,
        creds: &Credentials,
    ) -> GenerationResult<Vec<OutlineDraft>> {
        self.request_json(book, creds, prompts::outline(book), prompts::outline_schema())
            .await
    }

    pub async fn story_block(
        &self,
        item: &OutlineItem,
        book: &BookSettings,
        creds: &Credentials,
        target_chars: u64,
    ) -> GenerationResult<String> {
        self.request_text(book, creds, prompts::story_block(item, book, target_chars))
            .await
    }

    pub async fn review_block(
        &self,
        block: &StoryBlock,
        book: &BookSettings,
        creds: &Credentials,
    ) -> GenerationResult<String> {
        self.request_text(
            book,
            creds,
            prompts::review_block(&block.content, &block.title, book),
        )
        .await
    }

    pub async fn seo(&self, book: &BookSettings, creds: &Credentials) -> GenerationResult<SeoResult> {
        self.request_json(book, creds, prompts::seo(book), prompts::seo_schema())
            .await
    }

    pub async fn video_prompts(
        &self,
        book: &BookSettings,
        creds: &Credentials,
    ) -> GenerationResult<Vec<String>> {
        self.request_json(
            book,
            creds,
            prompts::video_prompts(book),
            prompts::string_list_schema(),
        )
        .await
    }

    pub async fn thumbnail_ideas(
        &self,
        book: &BookSettings,
        creds: &Credentials,
    ) -> GenerationResult<Vec<String>> {
        self.request_json(
            book,
            creds,
            prompts::thumbnail_ideas(book),
            prompts::string_list_schema(),
        )
        .await
    }
}

/// When the last key failed only because its output was undecodable, report
/// the decode error itself rather than a generic key failure.
fn surface_decode(err: GenerationError) -> GenerationError {
    match err {
        GenerationError::AllCandidatesFailed { attempts, last } => {
            match last.downcast::<GenerationError>() {
                Ok(inner) if inner.is_decode() => inner,
                Ok(inner) => GenerationError::AllCandidatesFailed {
                    attempts,
                    last: inner.into(),
                },
                Err(last) => GenerationError::AllCandidatesFailed { attempts, last },
            }
        }
        other => other,
    }
}
