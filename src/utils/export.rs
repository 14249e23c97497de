use crate::core::io::Storage;
use crate::core::state::{PipelineRunState, ScriptBlock, StoryBlock};
use crate::utils::text::slugify;
use anyhow::Result;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use std::path::Path;

const BOM: &str = "\u{FEFF}";

/// UTF-8 CSV with BOM, every field quoted, CRLF line endings.
pub fn to_csv(rows: &[Vec<String>]) -> Result<Vec<u8>> {
    let mut out = BOM.as_bytes().to_vec();
    {
        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .terminator(Terminator::CRLF)
            .flexible(true)
            .from_writer(&mut out);
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
    }
    Ok(out)
}

pub fn script_rows(blocks: &[ScriptBlock]) -> Vec<Vec<String>> {
    let mut rows = vec![header(&["STT", "Chapter", "Review Script"])];
    rows.extend(blocks.iter().map(|b| {
        vec![
            b.index().to_string(),
            b.chapter().to_string(),
            b.text().to_string(),
        ]
    }));
    rows
}

pub fn story_rows(blocks: &[StoryBlock]) -> Vec<Vec<String>> {
    let mut rows = vec![header(&["STT", "Chapter", "Story Content"])];
    rows.extend(
        blocks
            .iter()
            .map(|b| vec![b.index.to_string(), b.title.clone(), b.content.clone()]),
    );
    rows
}

pub fn prompt_rows(prompts: &[String]) -> Vec<Vec<String>> {
    let mut rows = vec![header(&["STT", "Prompt"])];
    rows.extend(
        prompts
            .iter()
            .enumerate()
            .map(|(i, p)| vec![(i + 1).to_string(), p.clone()]),
    );
    rows
}

fn header(cols: &[&str]) -> Vec<String> {
    cols.iter().map(|c| c.to_string()).collect()
}

/// Writes every non-empty document for `title` into `folder`; returns written paths.
pub async fn export_all(
    storage: &dyn Storage,
    folder: &str,
    title: &str,
    state: &PipelineRunState,
) -> Result<Vec<String>> {
    let slug = slugify(title);
    let mut documents = Vec::new();
    if !state.script.is_empty() {
        documents.push((format!("review_{}.csv", slug), script_rows(&state.script)));
    }
    if !state.story.is_empty() {
        documents.push((format!("story_{}.csv", slug), story_rows(&state.story)));
    }
    if !state.prompts.video_prompts.is_empty() {
        documents.push((
            format!("prompts_{}.csv", slug),
            prompt_rows(&state.prompts.video_prompts),
        ));
    }

    let mut written = Vec::new();
    for (name, rows) in documents {
        let path = Path::new(folder).join(name).to_string_lossy().to_string();
        storage.write(&path, &to_csv(&rows)?).await?;
        log::info!("Exported {} ({} rows)", path, rows.len() - 1);
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::NativeStorage;

    #[test]
    fn test_format_bom_quotes_crlf() {
        let rows = vec![header(&["STT", "Prompt"]), vec!["1".into(), "a \"b\"".into()]];
        let bytes = to_csv(&rows).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "\u{FEFF}\"STT\",\"Prompt\"\r\n\"1\",\"a \"\"b\"\"\"\r\n");
    }

    #[test]
    fn test_round_trips_through_reader() {
        let blocks = vec![
            ScriptBlock::new(0, "Hook, \"mở đầu\"", "Line one\nLine two, with comma"),
            ScriptBlock::new(1, "Kết", "He said \"hi\"; then left"),
        ];
        let rows = script_rows(&blocks);
        let bytes = to_csv(&rows).unwrap();

        let body = &bytes[BOM.len()..];
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(body);
        let parsed: Vec<Vec<String>> = reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect();
        assert_eq!(parsed, rows);
    }

    #[test]
    fn test_prompt_rows_are_one_based() {
        let rows = prompt_rows(&["a".to_string(), "b".to_string()]);
        assert_eq!(rows[1], vec!["1", "a"]);
        assert_eq!(rows[2], vec!["2", "b"]);
    }

    #[tokio::test]
    async fn test_export_all_skips_empty_documents() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let storage = NativeStorage::new(dir.path());
        let mut state = PipelineRunState::default();
        state.story.push(StoryBlock {
            index: 1,
            title: "Part 1 (Upload)".to_string(),
            content: "Once".to_string(),
        });

        let written = export_all(&storage, "output", "Nhà Giả Kim", &state).await?;
        assert_eq!(written.len(), 1);
        assert!(written[0].ends_with("story_nha-gia-kim.csv"));
        assert!(storage.exists(&written[0]).await?);
        Ok(())
    }
}
