use anyhow::{Context, Result};
use bookscript::core::config::{Config, CONFIG_FILE};
use bookscript::core::io::{NativeStorage, Storage};
use bookscript::core::prefs::{self, Preferences, PREFS_FILE};
use bookscript::core::state::{BookSettings, Stage, StageStatus};
use bookscript::services::generator::{ContentGenerator, Credentials};
use bookscript::services::llm::HttpClientFactory;
use bookscript::services::setup;
use bookscript::services::workflow::{Pipeline, PipelineObserver};
use bookscript::utils::export::export_all;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{CustomType, InquireError, Select, Text};
use std::path::Path;
use std::sync::{Arc, Mutex};

const MODELS: [&str; 4] = [
    "gemini-3-pro-preview",
    "gemini-3-flash-preview",
    "gpt-5.2-auto",
    "gpt-5.2-instant",
];

const QUIT: &str = "Quit";

const MENU: [&str; 10] = [
    "1. Generate outline",
    "2. Write story",
    "3. Write review script",
    "4. Generate SEO",
    "5. Generate video prompts & thumbnails",
    "Upload story file",
    "Export CSV",
    "Book settings",
    "API key settings",
    QUIT,
];

/// Draws one progress bar per running stage.
#[derive(Default)]
struct CliProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl PipelineObserver for CliProgress {
    fn stage_started(&self, stage: Stage, units: usize) {
        let pb = ProgressBar::new(units as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(stage.to_string());
        if let Ok(mut bar) = self.bar.lock() {
            *bar = Some(pb);
        }
    }

    fn unit_completed(&self, _stage: Stage, done: usize, _total: usize) {
        if let Ok(bar) = self.bar.lock() {
            if let Some(pb) = bar.as_ref() {
                pb.set_position(done as u64);
            }
        }
    }

    fn stage_finished(&self, _stage: Stage, error: Option<&str>) {
        if let Ok(mut bar) = self.bar.lock() {
            if let Some(pb) = bar.take() {
                match error {
                    None => pb.finish_with_message("done"),
                    Some(_) => pb.abandon_with_message("failed"),
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            eprintln!("Please create '{}' (all fields have defaults).", CONFIG_FILE);
            return Err(e);
        }
    };
    config.ensure_directories()?;

    let storage: Arc<dyn Storage> = Arc::new(NativeStorage::new("."));
    let prefs_path = Path::new(&config.data_folder)
        .join(PREFS_FILE)
        .to_string_lossy()
        .to_string();
    let mut prefs = Preferences::load(storage.clone(), prefs_path).await?;

    if setup::needs_setup(&prefs, &config.llm) {
        println!("No Gemini API key found. Let's add one.");
        setup::run_setup(&mut prefs).await?;
    }

    let channel = prefs.get_or_empty(prefs::CHANNEL_NAME);
    if !channel.is_empty() {
        println!("Channel: {}", channel);
    }

    let factory = Arc::new(HttpClientFactory::new(&config.llm)?);
    let generator = ContentGenerator::new(factory, config.llm.clone());

    let mut book = BookSettings::from_config(&config);
    book.title = Text::new("Book title:").prompt()?;
    book.idea = Text::new("Idea / extra context (optional):").prompt()?;

    let mut pipeline = Pipeline::new(
        generator,
        book,
        Credentials::from_prefs(&prefs),
        config.upload_chunk_chars,
    )
    .with_observer(Box::new(CliProgress::default()));

    loop {
        let choice = match Select::new("What next?", MENU.to_vec()).prompt() {
            Ok(choice) => choice,
            Err(InquireError::OperationCanceled) => continue,
            Err(InquireError::OperationInterrupted) => break,
            Err(e) => return Err(e.into()),
        };
        if choice == QUIT {
            break;
        }

        match run_action(choice, &mut pipeline, &mut prefs, &storage, &config).await {
            Ok(()) => {}
            Err(e) => {
                if quits_menu(&e) {
                    break;
                }
                report(&e);
            }
        }

        if let Some(error) = pipeline.error() {
            eprintln!("{}", error);
        }
        print_status(&pipeline);
    }

    Ok(())
}

/// Ctrl-C leaves the menu; every other failure is reported and the menu continues.
fn quits_menu(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<InquireError>(),
        Some(InquireError::OperationInterrupted)
    )
}

fn report(e: &anyhow::Error) {
    match e.downcast_ref::<InquireError>() {
        Some(InquireError::OperationCanceled) => println!("Cancelled."),
        _ => eprintln!("{:#}", e),
    }
}

/// Runs one menu entry. Stage failures land in the pipeline's error slot;
/// prompt and I/O failures come back as errors for the menu to report.
async fn run_action(
    choice: &str,
    pipeline: &mut Pipeline,
    prefs: &mut Preferences,
    storage: &Arc<dyn Storage>,
    config: &Config,
) -> Result<()> {
    match choice {
        "1. Generate outline" => {
            if pipeline.generate_outline().await.is_ok() {
                for item in &pipeline.state().outline {
                    println!("{:>3}. {} - {}", item.index + 1, item.title, item.focus);
                }
            }
        }
        "2. Write story" => {
            let _ = pipeline.generate_story().await;
            println!("{} story block(s).", pipeline.state().story.len());
        }
        "3. Write review script" => {
            let _ = pipeline.generate_review_script().await;
            let total: usize = pipeline.state().script.iter().map(|b| b.chars()).sum();
            println!(
                "{} script block(s), {} characters.",
                pipeline.state().script.len(),
                total
            );
        }
        "4. Generate SEO" => {
            if pipeline.generate_seo().await.is_ok() {
                if let Some(seo) = &pipeline.state().seo {
                    println!("Titles:\n  {}", seo.titles.join("\n  "));
                    println!("Hashtags: {}", seo.hashtags.join(" "));
                    println!("Keywords: {}", seo.keywords.join(", "));
                    println!("Description:\n{}", seo.description);
                }
            }
        }
        "5. Generate video prompts & thumbnails" => {
            if pipeline.generate_prompts().await.is_ok() {
                let prompts = &pipeline.state().prompts;
                println!("Video prompts:\n  {}", prompts.video_prompts.join("\n  "));
                println!("Thumbnail ideas:\n  {}", prompts.thumbnail_ideas.join("\n  "));
            }
        }
        "Upload story file" => {
            let path = Text::new("Path to a .txt file:").prompt()?;
            let text = storage
                .read_to_string(path.trim())
                .await
                .with_context(|| format!("Could not read {}", path.trim()))?;
            if let Ok(n) = pipeline.load_uploaded_story(&text) {
                println!("Loaded {} story block(s). The review script can run now.", n);
            }
        }
        "Export CSV" => {
            let written = export_all(
                storage.as_ref(),
                &config.output_folder,
                &pipeline.book().title,
                pipeline.state(),
            )
            .await
            .context("Export failed")?;
            if written.is_empty() {
                println!("Nothing to export yet.");
            }
            for path in written {
                println!("Wrote {}", path);
            }
        }
        "Book settings" => edit_book(pipeline.book_mut())?,
        "API key settings" => {
            setup::run_setup(prefs).await?;
            pipeline.set_credentials(Credentials::from_prefs(prefs));
        }
        _ => {}
    }
    Ok(())
}

fn edit_book(book: &mut BookSettings) -> Result<()> {
    book.title = Text::new("Book title:")
        .with_initial_value(&book.title)
        .prompt()?;
    book.idea = Text::new("Idea / extra context:")
        .with_initial_value(&book.idea)
        .prompt()?;
    book.chapters_count = CustomType::new("Main chapters:")
        .with_default(book.chapters_count)
        .prompt()?;
    book.duration_min = CustomType::new("Video length (minutes):")
        .with_default(book.duration_min)
        .prompt()?;
    book.frame_ratio = Select::new("Frame ratio:", vec!["9:16", "16:9", "1:1"])
        .prompt()?
        .to_string();

    let mut models: Vec<String> = MODELS.iter().map(|m| m.to_string()).collect();
    if !models.contains(&book.model) {
        models.insert(0, book.model.clone());
    }
    book.model = Select::new("Model:", models).prompt()?;
    Ok(())
}

fn print_status(pipeline: &Pipeline) {
    let line: Vec<String> = Stage::ALL
        .into_iter()
        .map(|stage| {
            let mark = match pipeline.status(stage) {
                StageStatus::Idle => " ",
                StageStatus::Running => "~",
                StageStatus::Succeeded => "x",
                StageStatus::Failed => "!",
            };
            format!("[{}] {}", mark, stage)
        })
        .collect();
    println!("{}", line.join("  "));
}
