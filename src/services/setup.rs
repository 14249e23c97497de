use crate::core::prefs::{self, Preferences};
use crate::services::keys::{parse_candidates, redact};
use crate::services::llm::LlmConfig;
use anyhow::Result;
use inquire::{Confirm, Select, Text};

const DONE: &str = "Save and return";

/// Whether no Gemini key is available from preferences or the environment.
pub fn needs_setup(prefs: &Preferences, config: &LlmConfig) -> bool {
    parse_candidates(prefs.get_or_empty(prefs::GEMINI_API_KEY)).is_empty()
        && std::env::var(&config.gemini.env_key)
            .map(|v| parse_candidates(&v).is_empty())
            .unwrap_or(true)
}

/// One-line summary of a key list, e.g. `3 key(s): ...abcd, ...wxyz, ...1234`.
pub fn describe_keys(raw: &str) -> String {
    let keys = parse_candidates(raw);
    if keys.is_empty() {
        return "not set".to_string();
    }
    let shown: Vec<String> = keys.iter().map(|k| redact(k)).collect();
    format!("{} key(s): {}", keys.len(), shown.join(", "))
}

/// Input with no key in it; the stored keys are kept unless clearing is confirmed.
fn keeps_current_keys(input: &str) -> bool {
    parse_candidates(input).is_empty()
}

fn menu_entries(prefs: &Preferences) -> Vec<String> {
    vec![
        format!("Gemini API keys [{}]", describe_keys(prefs.get_or_empty(prefs::GEMINI_API_KEY))),
        format!("OpenAI API keys [{}]", describe_keys(prefs.get_or_empty(prefs::OPENAI_API_KEY))),
        format!("Channel name [{}]", prefs.get_or_empty(prefs::CHANNEL_NAME)),
        format!("Narrator name [{}]", prefs.get_or_empty(prefs::NARRATOR_NAME)),
        DONE.to_string(),
    ]
}

/// Interactive editor for the stored key text and display names.
///
/// Key text is stored exactly as typed; it is split into candidates per request.
pub async fn run_setup(prefs: &mut Preferences) -> Result<()> {
    let mut changed = false;

    loop {
        let entries = menu_entries(prefs);
        let choice = Select::new("API key settings:", entries.clone()).prompt()?;
        let Some(position) = entries.iter().position(|e| *e == choice) else {
            continue;
        };

        let (key, label, is_secret) = match position {
            0 => (prefs::GEMINI_API_KEY, "Gemini API keys:", true),
            1 => (prefs::OPENAI_API_KEY, "OpenAI API keys:", true),
            2 => (prefs::CHANNEL_NAME, "Channel name:", false),
            3 => (prefs::NARRATOR_NAME, "Narrator name:", false),
            _ => break,
        };

        let prompt = Text::new(label);
        let value = if is_secret {
            let input = prompt
                .with_help_message(
                    "Separate multiple keys with commas or semicolons. Leave empty to keep the current keys.",
                )
                .prompt()?;
            if keeps_current_keys(&input) {
                let stored = prefs.get_or_empty(key);
                if stored.trim().is_empty()
                    || !Confirm::new("Clear all stored keys?")
                        .with_default(false)
                        .prompt()?
                {
                    continue;
                }
                String::new()
            } else {
                log::info!("Updated {}: {}", key, describe_keys(&input));
                input
            }
        } else {
            prompt.with_initial_value(prefs.get_or_empty(key)).prompt()?
        };

        prefs.set(key, value);
        changed = true;
    }

    if changed {
        prefs.save().await?;
        println!("Preferences saved.");
    }
    Ok(())
}
