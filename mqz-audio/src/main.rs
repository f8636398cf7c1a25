//! mqz-audio - Quiz narration and sound effects
//!
//! Command-line front end for the audio core: speak a line, play an effect,
//! warm the narration cache, import pre-rendered narration into the durable
//! store, or run a short scripted quiz.
//!
//! Startup order:
//! 1. Bootstrap TOML (`--config`, working directory, platform config dir)
//! 2. Logging (`RUST_LOG` overrides `[logging] level`)
//! 3. Data folder (`--data-folder`, `MQZ_DATA_FOLDER`, TOML, OS default)
//! 4. Database (runtime settings + durable store; optional)
//! 5. Output device, static asset source, speech engine

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mqz_audio::audio::output::CpalOutput;
use mqz_audio::audio::{pcm, NullOutput, OutputDevice, SharedOutput};
use mqz_audio::cache::{source_for, StaticAssetSource, TieredAudioCache};
use mqz_audio::db::{self, settings, DurableStore, SqliteAudioStore};
use mqz_audio::playback::{
    EspeakEngine, PlaybackCoordinator, SilentEngine, SpeechEngine, SpeechSettings,
};
use mqz_audio::session::SessionPrefetchBuffer;
use mqz_common::config::{ensure_data_folder, resolve_data_folder, LoggingConfig, TomlConfig};
use mqz_common::phrases;
use mqz_common::question::{Difficulty, Operation, QuestionGenerator, LEVELS};
use sqlx::SqlitePool;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for mqz-audio
#[derive(Parser, Debug)]
#[command(name = "mqz-audio")]
#[command(about = "Narration cache and sound effects for the math quiz")]
#[command(version)]
struct Cli {
    /// Bootstrap configuration file
    #[arg(short, long, env = "MQZ_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding the database and packaged assets
    #[arg(short, long)]
    data_folder: Option<PathBuf>,

    /// Run without opening an output device
    #[arg(long)]
    no_audio: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Narrate one line
    Speak {
        text: String,

        /// Language tag (defaults to the configured language)
        #[arg(short, long)]
        lang: Option<String>,

        /// Packaged asset name, e.g. math_mul_3_4.mp3
        #[arg(short, long)]
        static_id: Option<String>,

        /// Seconds to keep running while the line plays
        #[arg(long, default_value_t = 4.0)]
        hold: f64,
    },

    /// Play one sound effect
    Effect {
        name: Effect,

        /// Seconds to keep running while the effect plays
        #[arg(long, default_value_t = 3.0)]
        hold: f64,
    },

    /// Resolve the fixed phrases and a session's worth of questions
    Preload {
        #[command(flatten)]
        quiz: QuizArgs,
    },

    /// Load pre-rendered narration (*.pcm raw, *.b64 base64) into the store
    Import {
        dir: PathBuf,
    },

    /// Show or change runtime settings
    Settings {
        /// Master volume (0.0-1.0)
        #[arg(long)]
        volume: Option<f32>,

        /// Output device name, or "default"
        #[arg(long)]
        device: Option<String>,
    },

    /// List output devices
    Devices,

    /// Play a short scripted quiz
    Demo {
        #[command(flatten)]
        quiz: QuizArgs,

        /// Questions to ask
        #[arg(long, default_value_t = 3)]
        questions: usize,
    },
}

#[derive(clap::Args, Debug)]
struct QuizArgs {
    /// mul, div, add or sub
    #[arg(long, default_value = "mul")]
    operation: Operation,

    /// easy, medium or hard
    #[arg(long, default_value = "easy")]
    difficulty: Difficulty,

    /// Restrict to one times table
    #[arg(long)]
    table: Option<u32>,
}

impl QuizArgs {
    fn generator(&self) -> QuestionGenerator {
        let generator = QuestionGenerator::new(self.operation, self.difficulty);
        match self.table {
            Some(table) => generator.with_table(table),
            None => generator,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Effect {
    Ding,
    Correct,
    Intro,
    Celebration,
    Wrong,
    Suspense,
    Phone,
    Audience,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let toml_config = TomlConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;
    init_tracing(&toml_config.logging)?;

    info!(
        "Starting mqz-audio v{} [{}] ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE")
    );

    let data_folder = resolve_data_folder(cli.data_folder.as_deref(), &toml_config);
    ensure_data_folder(&data_folder).context("Failed to create data folder")?;
    info!("Data folder: {}", data_folder.display());

    let db_path = toml_config.database_path(&data_folder);
    let pool = match db::init_database(&db_path).await {
        Ok(pool) => {
            info!("Database: {}", db_path.display());
            Some(pool)
        }
        Err(e) => {
            warn!("Database unavailable, running without durable cache: {}", e);
            None
        }
    };

    match &cli.command {
        Command::Devices => {
            for name in CpalOutput::list_devices()? {
                println!("{}", name);
            }
            return Ok(());
        }
        Command::Settings { volume, device } => {
            let pool = pool.context("Settings need the database")?;
            return update_settings(&pool, *volume, device.clone()).await;
        }
        Command::Import { dir } => {
            let pool = pool.context("Import needs the database")?;
            let store: Arc<dyn DurableStore> = Arc::new(SqliteAudioStore::new(pool));
            let cache = TieredAudioCache::new(None, Some(store.clone()));
            let imported = import_dir(&cache, dir).await?;
            info!(
                "Imported {} files, store now holds {} entries",
                imported,
                store.count().await?
            );
            return Ok(());
        }
        _ => {}
    }

    let coordinator = build_coordinator(&cli, &toml_config, &data_folder, pool).await;
    let lang = toml_config.language.clone();

    match cli.command {
        Command::Speak {
            text,
            lang: line_lang,
            static_id,
            hold,
        } => {
            let lang = line_lang.unwrap_or(lang);
            coordinator.speak(&text, &lang, static_id.as_deref()).await;
            hold_for(hold).await;
        }
        Command::Effect { name, hold } => {
            play_effect(&coordinator, name);
            hold_for(hold).await;
            coordinator.stop_all_sounds();
        }
        Command::Preload { quiz } => {
            preload(&coordinator, &quiz, &lang, &toml_config).await;
        }
        Command::Demo { quiz, questions } => {
            run_demo(&coordinator, &quiz, &lang, &toml_config, questions).await;
        }
        Command::Devices | Command::Settings { .. } | Command::Import { .. } => {}
    }

    let stats = coordinator.cache().stats();
    info!(
        "Cache: {} memory hits, {} static hits, {} store hits, {} misses, {} entries",
        stats.memory_hits, stats.static_hits, stats.store_hits, stats.misses, stats.memory_entries
    );

    Ok(())
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` wins over the configured level; with a log file configured,
/// output goes there instead of stderr.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "mqz_audio={0},mqz_common={0}",
            logging.level
        ))
    });
    let registry = tracing_subscriber::registry().with(filter);

    match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(Mutex::new(file))
                        .with_ansi(false),
                )
                .init();
        }
        None => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    Ok(())
}

async fn build_coordinator(
    cli: &Cli,
    toml_config: &TomlConfig,
    data_folder: &Path,
    pool: Option<SqlitePool>,
) -> PlaybackCoordinator {
    let (volume, db_device) = match &pool {
        Some(pool) => (
            settings::get_volume(pool)
                .await
                .unwrap_or(settings::DEFAULT_VOLUME),
            settings::get_audio_device(pool).await.ok(),
        ),
        None => (settings::DEFAULT_VOLUME, None),
    };

    let output: Arc<dyn OutputDevice> = if cli.no_audio {
        info!("Audio output disabled");
        Arc::new(NullOutput)
    } else {
        // TOML device overrides the stored runtime setting
        let device = toml_config.output.device.clone().or(db_device);
        Arc::new(SharedOutput::new(device, volume))
    };

    let statics: Option<Arc<dyn StaticAssetSource>> = match toml_config
        .asset_location(data_folder)
        .map_err(mqz_audio::Error::from)
        .and_then(|location| source_for(&location))
    {
        Ok(source) => Some(source),
        Err(e) => {
            warn!("Static assets unavailable: {}", e);
            None
        }
    };

    let store = pool.map(|pool| Arc::new(SqliteAudioStore::new(pool)) as Arc<dyn DurableStore>);
    let cache = TieredAudioCache::new(statics, store);

    let speech: Arc<dyn SpeechEngine> = match EspeakEngine::detect(&toml_config.speech.command).await
    {
        Some(engine) => Arc::new(engine),
        None => {
            warn!("No speech engine, cache misses will be silent");
            Arc::new(SilentEngine)
        }
    };

    PlaybackCoordinator::new(
        cache,
        output,
        speech,
        SpeechSettings::from(&toml_config.speech),
    )
}

async fn hold_for(seconds: f64) {
    tokio::time::sleep(Duration::from_secs_f64(seconds.max(0.0))).await;
}

fn play_effect(coordinator: &PlaybackCoordinator, effect: Effect) {
    match effect {
        Effect::Ding => coordinator.play_ding(),
        Effect::Correct => coordinator.play_correct_sound(),
        Effect::Intro => coordinator.play_intro_music(),
        Effect::Celebration => coordinator.play_celebration_music(),
        Effect::Wrong => coordinator.play_wrong_sound(),
        Effect::Suspense => coordinator.start_suspense_music(),
        Effect::Phone => coordinator.play_phone_ring(),
        Effect::Audience => coordinator.play_audience_thinking(),
    }
}

async fn update_settings(
    pool: &SqlitePool,
    volume: Option<f32>,
    device: Option<String>,
) -> Result<()> {
    if let Some(volume) = volume {
        settings::set_volume(pool, volume).await?;
    }
    if let Some(device) = device {
        settings::set_audio_device(pool, &device).await?;
    }

    println!("volume_level = {:.2}", settings::get_volume(pool).await?);
    println!("audio_sink   = {}", settings::get_audio_device(pool).await?);
    Ok(())
}

/// Import every `*.pcm` / `*.b64` file in `dir`, keyed by file name without
/// that extension (`math_mul_3_4.mp3.b64` → `math_mul_3_4.mp3`).
async fn import_dir(cache: &TieredAudioCache, dir: &Path) -> Result<usize> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read {}", dir.display()))?;
    let mut imported = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let (Some(stem), Some(ext)) = (
            path.file_stem().and_then(|s| s.to_str()),
            path.extension().and_then(|s| s.to_str()),
        ) else {
            continue;
        };

        let asset = match ext {
            "pcm" => pcm::decode_raw(&tokio::fs::read(&path).await?),
            "b64" => match pcm::decode_base64(tokio::fs::read_to_string(&path).await?.trim()) {
                Ok(asset) => asset,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            },
            _ => continue,
        };

        if asset.is_empty() {
            warn!("Skipping empty {}", path.display());
            continue;
        }

        cache.persist(stem, Arc::new(asset)).await?;
        info!("Imported {}", stem);
        imported += 1;
    }

    if imported == 0 {
        bail!("No *.pcm or *.b64 files in {}", dir.display());
    }
    Ok(imported)
}

/// Resolve every fixed phrase and one session of questions, reporting which
/// ones have recorded narration.
async fn preload(
    coordinator: &PlaybackCoordinator,
    quiz: &QuizArgs,
    lang: &str,
    toml_config: &TomlConfig,
) {
    coordinator.warm_up();

    let mut buffer = SessionPrefetchBuffer::new(
        Box::new(quiz.generator()),
        coordinator.cache().clone(),
        lang,
        toml_config.session.length,
        toml_config.session.length,
    );
    buffer.prime();

    let cache = coordinator.cache();
    let mut cached = 0;
    let mut total = 0;

    for phrase in phrases::all() {
        total += 1;
        if cache
            .resolve(phrase.text, phrase.lang, Some(&phrase.static_id))
            .await
            .is_some()
        {
            cached += 1;
        } else {
            println!("missing  {}", phrase.static_id);
        }
    }

    for question in buffer.upcoming() {
        total += 1;
        let static_id = question.static_asset_id();
        if cache
            .resolve(&question.audio_text(), lang, static_id.as_deref())
            .await
            .is_some()
        {
            cached += 1;
        } else {
            println!(
                "missing  {} ({})",
                question,
                static_id.unwrap_or_else(|| "no static asset".to_string())
            );
        }
    }

    println!("{} of {} narration lines available offline", cached, total);
}

/// Scripted session: intro, a few questions answered correctly, celebration.
async fn run_demo(
    coordinator: &PlaybackCoordinator,
    quiz: &QuizArgs,
    lang: &str,
    toml_config: &TomlConfig,
    questions: usize,
) {
    coordinator.warm_up();
    let session_length = toml_config.session.length.min(LEVELS.len());
    let mut buffer = SessionPrefetchBuffer::new(
        Box::new(quiz.generator()),
        coordinator.cache().clone(),
        lang,
        toml_config.session.lookahead,
        session_length,
    );
    buffer.prime();

    coordinator.play_intro_music();
    hold_for(2.5).await;

    let intro = phrases::generic_intro();
    coordinator
        .speak(intro.text, intro.lang, Some(&intro.static_id))
        .await;
    hold_for(3.0).await;

    for level in LEVELS.iter().take(questions.min(session_length)) {
        let question = buffer.advance();
        println!("[{}] {}", level, question);

        let static_id = question.static_asset_id();
        coordinator
            .speak(&question.audio_text(), lang, static_id.as_deref())
            .await;
        hold_for(3.0).await;

        coordinator.start_suspense_music();
        hold_for(2.0).await;
        coordinator.stop_suspense_music();

        println!("     → {}", question.correct_answer);
        coordinator.play_correct_sound();
        coordinator.encourage(true).await;
        buffer.on_correct_answer();
        hold_for(2.5).await;
    }

    coordinator.play_celebration_music();
    hold_for(4.5).await;
    coordinator.stop_all_sounds();
}
