use anyhow::{Context, Result};
use casegen::config::AppConfig;
use casegen::export::{export_selected, ExportFormat};
use casegen::generate::llm::Dispatcher;
use casegen::model::{
    FileBlob, GenerationRequest, NewProviderConfig, NewTranscript, ProviderKind, TestCase,
    Transcript, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, DEFAULT_TEST_CASE_COUNT,
    DEFAULT_TEST_TYPE,
};
use casegen::server::{self, AppState};
use casegen::store::Store;
use casegen::util::truncate;
use clap::{Args, Parser, Subcommand};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{prelude::*, EnvFilter};
use uuid::Uuid;

const DEFAULT_LOG_FILTER: &str = "casegen=info,tower_http=warn";
const API_KEY_ENV: &str = "CASEGEN_API_KEY";

#[derive(Parser, Debug)]
#[command(
    name = "casegen",
    about = "Generate structured test cases from requirements, documents and meeting transcripts",
    version
)]
struct Cli {
    /// Override the data directory for this run
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to listen on (defaults to the configured bind address)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Manage AI provider configurations
    #[command(subcommand)]
    Provider(ProviderCommand),
    /// Generate test cases with the active provider
    Generate(GenerateArgs),
    /// Manage meeting transcripts
    #[command(subcommand)]
    Transcript(TranscriptCommand),
    /// Inspect and curate stored test cases
    #[command(subcommand)]
    Cases(CasesCommand),
    /// Show or persist the effective configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Export selected test cases
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the configuration after file and environment overrides
    Show,
    /// Write the effective configuration to the config file
    Save,
}

#[derive(Subcommand, Debug)]
enum ProviderCommand {
    /// Add a configuration and make it the active one
    Add(ProviderAddArgs),
    /// List stored configurations
    List,
    /// Show the active configuration
    Active,
    /// List suggested models per provider
    Models {
        /// Only this provider (openai, anthropic, google)
        provider: Option<String>,
    },
}

#[derive(Args, Debug)]
struct ProviderAddArgs {
    /// openai, anthropic or google
    #[arg(long)]
    provider: String,
    #[arg(long)]
    model: String,
    /// API key (falls back to the CASEGEN_API_KEY environment variable)
    #[arg(long)]
    api_key: Option<String>,
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: u32,
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f32,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Requirement text
    #[arg(long)]
    prompt: String,
    #[arg(long, default_value = DEFAULT_TEST_TYPE)]
    test_type: String,
    #[arg(long, default_value_t = NonZeroU32::new(DEFAULT_TEST_CASE_COUNT).unwrap_or(NonZeroU32::MIN))]
    count: NonZeroU32,
    /// Document to include as context (.txt, .md, .pdf, .docx); repeatable
    #[arg(long = "file")]
    files: Vec<PathBuf>,
    /// Stored transcript to include as context; repeatable
    #[arg(long = "transcript")]
    transcripts: Vec<Uuid>,
    /// Persist the generated cases
    #[arg(long)]
    save: bool,
    /// Print cases as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum TranscriptCommand {
    /// Store a transcript from a file or inline text
    Add {
        /// Title (defaults to the file stem)
        #[arg(long)]
        title: Option<String>,
        #[arg(long, conflicts_with = "content")]
        file: Option<PathBuf>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        meeting_date: Option<String>,
        #[arg(long)]
        participants: Option<String>,
    },
    List,
    Rm { id: Uuid },
}

#[derive(Subcommand, Debug)]
enum CasesCommand {
    List {
        /// Only cases selected for export
        #[arg(long)]
        selected: bool,
    },
    /// Mark cases as selected for export
    Select {
        #[arg(required = true)]
        ids: Vec<Uuid>,
    },
    Rm { id: Uuid },
    /// Delete every stored case
    Clear,
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(env_filter),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = AppConfig::load();
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }
    config
        .validate()
        .with_context(|| format!("Invalid config at {}", AppConfig::config_location()))?;

    let store = Store::open(config.resolved_data_dir())?;

    match cli.command {
        Commands::Serve { bind } => {
            let dispatcher = Dispatcher::from_config(&config)?;
            let state = AppState::new(store, Arc::new(dispatcher));
            let bind = bind.unwrap_or_else(|| config.bind.clone());
            server::serve(state, &bind).await
        }
        Commands::Provider(command) => run_provider(command, store),
        Commands::Generate(args) => run_generate(args, &config, store).await,
        Commands::Transcript(command) => run_transcript(command, &store),
        Commands::Cases(command) => run_cases(command, &store),
        Commands::Config(command) => run_config(command, &config),
        Commands::Export { format, out } => {
            let bytes = export_selected(&store, format)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, &bytes)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    eprintln!("  + Exported to {}", path.display());
                }
                None => {
                    use std::io::Write;
                    std::io::stdout().write_all(&bytes)?;
                }
            }
            Ok(())
        }
    }
}

fn run_config(command: ConfigCommand, config: &AppConfig) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            println!("{}", serde_json::to_string_pretty(config)?);
            eprintln!("  Data directory: {}", config.resolved_data_dir().display());
        }
        ConfigCommand::Save => {
            let path = config.save()?;
            eprintln!("  + Saved config to {}", path.display());
        }
    }
    Ok(())
}

fn run_provider(command: ProviderCommand, store: Store) -> Result<()> {
    let registry = casegen::registry::ProviderRegistry::new(store);
    match command {
        ProviderCommand::Add(args) => {
            let api_key = match args.api_key {
                Some(key) => key,
                None => std::env::var(API_KEY_ENV).with_context(|| {
                    format!("No API key given. Pass --api-key or set {}", API_KEY_ENV)
                })?,
            };
            let config = registry.activate(NewProviderConfig {
                provider: args.provider,
                api_key,
                model: args.model,
                max_tokens: args.max_tokens,
                temperature: args.temperature,
            })?;
            eprintln!(
                "  + {} ({}) is now the active provider [{}]",
                config.provider, config.model, config.id
            );
        }
        ProviderCommand::List => {
            for config in registry.list()? {
                let marker = if config.is_active { "*" } else { " " };
                println!(
                    "{} {}  {:<10} {:<28} key={}  max_tokens={} temperature={}",
                    marker,
                    config.id,
                    config.provider,
                    config.model,
                    casegen::util::mask_secret(&config.api_key),
                    config.max_tokens,
                    config.temperature
                );
            }
        }
        ProviderCommand::Active => match registry.active()? {
            Some(config) => println!("{}", serde_json::to_string_pretty(&config.redacted())?),
            None => eprintln!("  No active provider. Run 'casegen provider add' first."),
        },
        ProviderCommand::Models { provider } => {
            let kinds = match provider {
                Some(p) => vec![p.parse::<ProviderKind>()?],
                None => ProviderKind::all().to_vec(),
            };
            for kind in kinds {
                println!("{}:", kind.label());
                for model in kind.suggested_models() {
                    println!("  {}", model);
                }
            }
        }
    }
    Ok(())
}

fn read_blob(path: &Path) -> Result<FileBlob> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid file name: {}", path.display()))?
        .to_string();
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(FileBlob::new(name, bytes))
}

async fn run_generate(args: GenerateArgs, config: &AppConfig, store: Store) -> Result<()> {
    let files = args
        .files
        .iter()
        .map(|p| read_blob(p))
        .collect::<Result<Vec<_>>>()?;

    let request = GenerationRequest::new(args.prompt)
        .with_test_type(args.test_type)
        .with_count(args.count)
        .with_files(files)
        .with_transcripts(args.transcripts);

    let dispatcher = Dispatcher::from_config(config)?;
    let state = AppState::new(store, Arc::new(dispatcher));

    eprintln!("  Generating {} test cases...", request.count);
    let cases = state.orchestrator.generate(&request).await?;

    if args.save {
        state.store.insert_many(&cases)?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&cases)?);
    } else {
        print_cases(&cases);
    }
    if args.save {
        eprintln!("  + Saved {} test cases", cases.len());
    }
    Ok(())
}

fn run_transcript(command: TranscriptCommand, store: &Store) -> Result<()> {
    match command {
        TranscriptCommand::Add {
            title,
            file,
            content,
            meeting_date,
            participants,
        } => {
            let (default_title, content) = match (file, content) {
                (Some(path), _) => {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    let stem = path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .map(str::to_string);
                    (stem, text)
                }
                (None, Some(text)) => (None, text),
                (None, None) => anyhow::bail!("Pass --file or --content"),
            };
            let title = title
                .or(default_title)
                .context("A title is required when adding inline content")?;
            let transcript = store.insert(
                NewTranscript {
                    title,
                    content,
                    meeting_date,
                    participants,
                }
                .into_transcript(),
            )?;
            eprintln!("  + Stored transcript '{}' [{}]", transcript.title, transcript.id);
        }
        TranscriptCommand::List => {
            let mut transcripts = store.all::<Transcript>()?;
            transcripts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            for t in transcripts {
                println!(
                    "{}  {:<30} {}",
                    t.id,
                    truncate(&t.title, 30),
                    t.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        TranscriptCommand::Rm { id } => {
            if !store.delete::<Transcript>(id)? {
                anyhow::bail!("Transcript not found: {}", id);
            }
            eprintln!("  + Deleted transcript {}", id);
        }
    }
    Ok(())
}

fn run_cases(command: CasesCommand, store: &Store) -> Result<()> {
    match command {
        CasesCommand::List { selected } => {
            let mut cases = store.find::<TestCase>(|c| !selected || c.is_selected)?;
            cases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            for case in cases {
                let marker = if case.is_selected { "x" } else { " " };
                println!(
                    "[{}] {}  {:<6} {:<14} {}",
                    marker,
                    case.id,
                    case.priority.as_str(),
                    truncate(&case.category, 14),
                    case.title
                );
            }
        }
        CasesCommand::Select { ids } => {
            let count =
                store.update_where::<TestCase>(|c| ids.contains(&c.id), |c| c.is_selected = true)?;
            eprintln!("  + Selected {} test cases", count);
        }
        CasesCommand::Rm { id } => {
            if !store.delete::<TestCase>(id)? {
                anyhow::bail!("Test case not found: {}", id);
            }
            eprintln!("  + Deleted test case {}", id);
        }
        CasesCommand::Clear => {
            let count = store.delete_all::<TestCase>()?;
            eprintln!("  + Deleted {} test cases", count);
        }
    }
    Ok(())
}

fn print_cases(cases: &[TestCase]) {
    for (i, case) in cases.iter().enumerate() {
        println!("{}. {} [{} / {}]", i + 1, case.title, case.priority, case.category);
        if !case.description.is_empty() {
            println!("   {}", case.description);
        }
        if !case.preconditions.is_empty() {
            println!("   Preconditions: {}", case.preconditions);
        }
        for (n, step) in case.steps.iter().enumerate() {
            println!("   {}) {}", n + 1, step);
        }
        println!("   Expected: {}", case.expected_result);
        println!();
    }
}
