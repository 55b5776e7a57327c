use anyhow::Context;
use clap::{Arg, Command};
use log::LevelFilter;
use mail_parser::MessageParser;
use screenr::spam::{JsonTrainingStore, SpamTrainingStore, TrainingSources};
use screenr::{
    Config, Folders, JsonGuidelineStore, MailContent, Mailbox, MaildirMailbox, Scheduler,
    Screener, SpamDetector, SpamTrainer,
};
use std::process;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "/etc/screenr.yaml";
const CONFIG_PATH_VAR: &str = "SCREENR_CONFIG_FILE";

#[tokio::main]
async fn main() {
    let matches = Command::new("screenr")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Sorts mail into folders by sender, learning from where you put it")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path (default: $SCREENR_CONFIG_FILE or /etc/screenr.yaml)"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Validate the configuration and print the folder layout")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("once")
                .long("once")
                .help("Screen the mailbox once and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("train")
                .long("train")
                .help("Retrain the spam detector once and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("check-folder")
                .long("check-folder")
                .value_name("FOLDER")
                .help("Classify every mail in a folder and print the verdicts")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("classify")
                .long("classify")
                .value_name("FILE")
                .help("Classify a raw email file against the stored spam training")
                .action(clap::ArgAction::Set),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_path = config_path(matches.get_one::<String>("config"));
    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e:#}");
            process::exit(1);
        }
    };

    let folders = match config.folders() {
        Ok(folders) => folders,
        Err(e) => {
            eprintln!("❌ Invalid folder configuration: {e:#}");
            process::exit(1);
        }
    };

    if matches.get_flag("test-config") {
        print_folders(&config, &folders);
        return;
    }

    if let Some(email_file) = matches.get_one::<String>("classify") {
        if let Err(e) = classify_file(&config, email_file).await {
            eprintln!("❌ {e:#}");
            process::exit(1);
        }
        return;
    }

    let app = match App::build(&config, folders).await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("❌ Failed to start: {e:#}");
            process::exit(1);
        }
    };

    if let Some(folder) = matches.get_one::<String>("check-folder") {
        let Some(spam) = &app.spam else {
            eprintln!("❌ Spam detection is not configured");
            process::exit(1);
        };
        match spam.trainer.check_folder(folder).await {
            Ok(rows) => print_folder_check(folder, &rows),
            Err(e) => {
                eprintln!("❌ Folder check failed: {e:#}");
                process::exit(1);
            }
        }
        return;
    }

    if matches.get_flag("train") {
        let Some(spam) = &app.spam else {
            eprintln!("❌ Spam detection is not configured");
            process::exit(1);
        };
        match spam.trainer.train().await {
            Ok(training) => println!(
                "✅ Trained on {} ham and {} spam messages",
                training.ham.dataset_size, training.spam.dataset_size
            ),
            Err(e) => {
                eprintln!("❌ Training failed: {e:#}");
                process::exit(1);
            }
        }
        return;
    }

    if matches.get_flag("once") {
        match app.screener.screen_mail().await {
            Ok(report) => println!(
                "✅ {} mails seen, {} guidelines learned, {} moved, {} failed moves",
                report.mails_seen, report.guideline_changes, report.moved, report.failed_moves
            ),
            Err(_) => process::exit(1),
        }
        return;
    }

    log::info!("Starting screenr...");
    let screening_interval = Duration::from_secs(config.screening_interval_seconds);
    let mut scheduler = Scheduler::new(app.screener, screening_interval);
    if let Some(spam) = app.spam {
        scheduler = scheduler.with_training(spam.trainer, spam.interval);
    }
    if let Err(e) = scheduler.run(tokio::signal::ctrl_c()).await {
        log::error!("Scheduler error: {e:#}");
        process::exit(1);
    }
}

struct SpamParts {
    trainer: SpamTrainer,
    interval: Duration,
}

struct App {
    screener: Screener,
    spam: Option<SpamParts>,
}

impl App {
    async fn build(config: &Config, folders: Folders) -> anyhow::Result<Self> {
        let mailbox: Arc<dyn Mailbox> = Arc::new(MaildirMailbox::new(config.maildir()));
        let guidelines = Arc::new(JsonGuidelineStore::open(config.guidelines_path())?);
        log::info!("Loaded {} sender guidelines", guidelines.len());

        let screener = Screener::new(folders.clone(), Arc::clone(&mailbox), guidelines);
        let Some(spam_config) = &config.spam else {
            log::info!("Spam detection is not configured");
            return Ok(Self {
                screener,
                spam: None,
            });
        };

        let store = Arc::new(JsonTrainingStore::new(config.training_path()));
        let training = store
            .load()
            .await
            .context("Failed to load spam training")?;
        let detector = Arc::new(SpamDetector::new(training));
        let screener =
            screener.with_spam_routing(detector.clone(), spam_config.spam_folder.clone());
        let trainer = SpamTrainer::new(
            mailbox,
            store,
            detector,
            TrainingSources::from_config(spam_config, &folders),
        );

        Ok(Self {
            screener,
            spam: Some(SpamParts {
                trainer,
                interval: Duration::from_secs(spam_config.training_interval_hours * 3600),
            }),
        })
    }
}

fn config_path(flag: Option<&String>) -> String {
    flag.cloned()
        .or_else(|| std::env::var(CONFIG_PATH_VAR).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file(path)
    } else {
        log::warn!("Configuration file '{path}' not found, using default configuration");
        Ok(Config::default())
    }
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}

fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn print_folders(config: &Config, folders: &Folders) {
    println!("🔍 Testing configuration...");
    println!();
    println!("Maildir: {}", config.maildir().display());
    println!("Guidelines: {}", config.guidelines_path().display());
    println!("Intake folder: {}", folders.intake_folder());
    println!("Manual screening folder: {}", folders.for_screening().folder);
    println!();
    for entry in folders.iter() {
        let mut flags = Vec::new();
        if !entry.scans_for_spam() {
            flags.push("no spam scan");
        }
        if entry.is_training_source() {
            flags.push("ham source");
        }
        println!(
            "  {:<16} {:<28} screening in {}{}",
            entry.alias.name(),
            entry.folder,
            entry.screening_folder(),
            if flags.is_empty() {
                String::new()
            } else {
                format!(" ({})", flags.join(", "))
            }
        );
    }
    match &config.spam {
        Some(spam) => {
            println!();
            println!(
                "Spam detection: reference {}, spam {}, training every {}h",
                spam.reference_folder, spam.spam_folder, spam.training_interval_hours
            );
        }
        None => println!("Spam detection disabled"),
    }
    println!("✅ Configuration is valid");
}

fn print_folder_check(folder: &str, rows: &[screenr::spam::FolderCheck]) {
    println!("📊 Spam verdicts for {folder}");
    println!("┌────────────┬──────────────────────────────────────────────────┬──────┐");
    println!("│ Id         │ Subject                                          │ Spam │");
    println!("├────────────┼──────────────────────────────────────────────────┼──────┤");
    for row in rows {
        println!(
            "│ {:<10} │ {:<48} │ {:<4} │",
            truncate_string(&row.id, 10),
            truncate_string(&row.subject, 48),
            if row.is_spam { "yes" } else { "no" }
        );
    }
    println!("└────────────┴──────────────────────────────────────────────────┴──────┘");
    let spam = rows.iter().filter(|row| row.is_spam).count();
    println!("{spam} of {} mails classified as spam", rows.len());
}

async fn classify_file(config: &Config, email_file: &str) -> anyhow::Result<()> {
    let raw = std::fs::read(email_file).with_context(|| format!("Failed to read {email_file}"))?;
    let message = MessageParser::default()
        .parse(&raw)
        .with_context(|| format!("Failed to parse {email_file}"))?;
    let content = MailContent {
        id: email_file.to_string(),
        subject: message.subject().unwrap_or_default().to_string(),
        body: message
            .body_text(0)
            .map(|body| body.into_owned())
            .unwrap_or_default(),
    };

    let training = JsonTrainingStore::new(config.training_path())
        .load()
        .await
        .context("Failed to load spam training")?;
    let detector = SpamDetector::new(training);
    let (ham_size, spam_size) = detector.dataset_sizes();
    let analysis = detector.analyze(&content);

    println!("🧪 Classifying: {email_file}");
    println!("Subject: {}", content.subject);
    println!("Corpora: {ham_size} ham, {spam_size} spam messages");
    println!("Tokens ({}): {}", analysis.tokens.len(), analysis.tokens.join(" "));
    println!("Ham score:  {:.8}", analysis.ham_score);
    println!("Spam score: {:.8}", analysis.spam_score);
    println!(
        "Verdict: {}",
        if analysis.is_spam { "🚫 spam" } else { "✅ not spam" }
    );
    Ok(())
}
