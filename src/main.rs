use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use calc_autocomplete::completion::{AutocompleteManager, Suggestion};
use calc_autocomplete::config::AutocompleteConfig;
use calc_autocomplete::logging::init_logger;
use calc_autocomplete::metrics::metrics;
use calc_autocomplete::session::InMemorySession;

/// Ranked autocomplete suggestions for calculator expressions.
#[derive(Parser, Debug)]
#[command(name = "calc-autocomplete")]
#[command(about = "Ranked autocomplete suggestions for calculator expressions", long_about = None)]
struct Cli {
    /// JSON configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pattern catalog file; defaults to the bundled catalog.
    #[arg(long, global = true)]
    patterns: Option<PathBuf>,

    /// Learning-data file used for load and save.
    #[arg(long, global = true)]
    learning_data: Option<PathBuf>,

    /// Session variable as name=value (repeatable).
    #[arg(long = "var", value_name = "NAME=VALUE", global = true, value_parser = parse_variable)]
    vars: Vec<(String, String)>,

    /// Log level filter (otherwise RUST_LOG, else "info").
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Disable ANSI colors in log output.
    #[arg(long, global = true)]
    no_color: bool,

    /// Also write a DEBUG session log to the cache directory.
    #[arg(long, global = true)]
    log_file: bool,

    /// Use the character-overlap heuristic instead of fuzzy matching.
    #[arg(long, global = true)]
    no_fuzzy: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print ranked suggestions for an input.
    Suggest {
        text: String,

        /// Cursor position (char index) of the token to complete.
        #[arg(long)]
        cursor: Option<usize>,
    },
    /// Record expressions as used and save the learning data.
    Record {
        #[arg(required = true)]
        expressions: Vec<String>,
    },
    /// Print the most used expressions.
    Top {
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
    /// Drop usage records older than the retention window and save.
    Prune {
        /// Retention window in days; defaults to the configured value.
        #[arg(long)]
        days: Option<f64>,
    },
    /// List pattern categories and their templates.
    Categories,
    /// Read inputs line by line and print debounced suggestions.
    Interactive,
}

fn parse_variable(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got {:?}", raw)),
    }
}

fn load_config(cli: &Cli) -> Result<AutocompleteConfig> {
    let mut config = match cli.config {
        Some(ref path) => AutocompleteConfig::from_file(path)?,
        None => AutocompleteConfig::default(),
    };
    if let Some(ref path) = cli.patterns {
        config.patterns_path = Some(path.clone());
    }
    if let Some(ref path) = cli.learning_data {
        config.learning_data_path = Some(path.clone());
    }
    if cli.no_fuzzy {
        config.fuzzy_matching = false;
    }
    Ok(config)
}

fn print_suggestions(suggestions: &[Suggestion]) {
    if suggestions.is_empty() {
        println!("(no suggestions)");
        return;
    }
    for (index, suggestion) in suggestions.iter().enumerate() {
        let mut line = format!(
            "{:>2}. {} {:<28} [{}] {:>6.1}",
            index,
            suggestion.icon(),
            suggestion.display_label(),
            suggestion.type_name(),
            suggestion.score
        );
        if let Some(ref description) = suggestion.description {
            line.push_str("  ");
            line.push_str(description);
        }
        println!("{line}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logger(cli.no_color, cli.log_level.as_deref(), cli.log_file)
        .context("failed to initialize logging")?;

    let config = load_config(&cli)?;
    let learning_data = config.resolved_learning_data_path();
    let session = Arc::new(InMemorySession::with_variables(cli.vars.clone()));

    let (manager, receiver) = AutocompleteManager::builder(config).session(session).build()?;
    let status = manager.load_learning_data(&learning_data);
    debug!("Learning data at {}: {:?}", learning_data.display(), status);

    match cli.command {
        Commands::Suggest { text, cursor } => {
            print_suggestions(&manager.query_at(&text, cursor));
        }
        Commands::Record { expressions } => {
            for expression in &expressions {
                manager.record_usage(expression);
            }
            manager.save_learning_data(&learning_data)?;
            println!("Recorded {} expression(s)", expressions.len());
        }
        Commands::Top { count } => {
            for (expression, record) in manager.get_top(count) {
                println!("{:>5}  {}", record.count, expression);
            }
        }
        Commands::Prune { days } => {
            let removed = match days {
                Some(days) if days < 0.0 => bail!("--days must not be negative"),
                Some(days) => manager.prune(days),
                None => manager.prune_expired(),
            };
            manager.save_learning_data(&learning_data)?;
            println!("Pruned {} expression(s)", removed);
        }
        Commands::Categories => {
            let store = manager.patterns();
            for category in store.categories() {
                println!("{category}:");
                for pattern in store.patterns_in(category) {
                    println!("  {:<32} {}", pattern.name, pattern.template);
                }
            }
        }
        Commands::Interactive => {
            interactive(&manager, receiver, &learning_data).await?;
        }
    }

    let summary = metrics().summary();
    debug!("Metrics: {:?}", summary);
    Ok(())
}

async fn interactive(
    manager: &Arc<AutocompleteManager>,
    mut receiver: calc_autocomplete::completion::SuggestionReceiver,
    learning_data: &std::path::Path,
) -> Result<()> {
    let latest: Arc<Mutex<Vec<Suggestion>>> = Arc::new(Mutex::new(Vec::new()));

    let printer_latest = Arc::clone(&latest);
    let printer = tokio::spawn(async move {
        while let Some(suggestions) = receiver.recv().await {
            print_suggestions(&suggestions);
            *printer_latest.lock() = suggestions;
        }
    });

    info!("Type an expression; :accept N, :vars, :save, :quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let command = line.trim();
        if let Some(index) = command.strip_prefix(":accept") {
            let index: usize = match index.trim().parse() {
                Ok(index) => index,
                Err(_) => {
                    println!("usage: :accept N");
                    continue;
                }
            };
            let accepted = latest.lock().get(index).cloned();
            match accepted {
                Some(mut suggestion) => {
                    manager.on_suggestion_accepted(&mut suggestion);
                    println!("accepted {}", suggestion.text);
                }
                None => println!("no suggestion at {}", index),
            }
        } else if command == ":vars" {
            print_suggestions(&manager.get_variable_suggestions());
        } else if command == ":save" {
            manager.save_learning_data(learning_data)?;
        } else if command == ":quit" {
            break;
        } else {
            manager.on_text_changed(&line);
        }
    }

    // Let the last debounced search finish before shutting down
    tokio::time::sleep(manager.config().debounce_delay() * 2).await;
    printer.abort();
    Ok(())
}
