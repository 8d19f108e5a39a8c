use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use qapipe::config::Settings;
use qapipe::stages::{AnnotationStage, AnswerStage, Boxer, QueryBuilder, RetrievalStage};
use qapipe::{
    AnnotationKind, ConfigurationError, Document, DocumentSet, ElasticClientBuilder,
    FailurePolicy, LineReader, LlmExtractor, OllamaClientBuilder, Pipeline, PipelineError,
    SrlClientBuilder, StageError, TextReader, Unit,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Passages longer than this are cut when printed.
const PASSAGE_PREVIEW_CHARS: usize = 1000;

/// qapipe - answer questions from an indexed passage collection
#[derive(Parser)]
#[command(name = "qapipe")]
#[command(about = "Semantic-role driven question answering over Elasticsearch passages")]
#[command(version)]
struct Cli {
    /// Print each checkpointed unit as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Annotate questions with tokens and semantic roles
    Nlu(QuestionArgs),
    /// Build the search query for questions
    Query(QueryCommand),
    /// Answer questions from retrieved passages
    Ask(QuestionArgs),
}

#[derive(Args)]
struct QuestionArgs {
    /// Question to process; read line by line from stdin when omitted
    #[arg(value_name = "QUESTION")]
    question: Option<String>,
}

#[derive(Args)]
struct QueryCommand {
    #[command(flatten)]
    input: QuestionArgs,

    /// Indexed field to match the phrase against
    #[arg(long, value_name = "FIELD")]
    field: Option<String>,

    /// Maximum number of passages to request
    #[arg(long, value_name = "N")]
    size: Option<u32>,
}

impl Commands {
    fn question(&self) -> Option<&str> {
        match self {
            Commands::Nlu(args) | Commands::Ask(args) => args.question.as_deref(),
            Commands::Query(cmd) => cmd.input.question.as_deref(),
        }
    }

    /// Stage the run stops after, if any.
    fn checkpoint(&self) -> Option<&'static str> {
        match self {
            Commands::Nlu(_) => Some("srl"),
            Commands::Query(_) => Some("query_builder"),
            Commands::Ask(_) => None,
        }
    }
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "qapipe=debug"
    } else {
        "qapipe=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(&cli) {
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code);
    }
}

/// Empty input and configuration mistakes are the user's to fix; everything
/// else is internal.
fn is_user_error(error: &anyhow::Error) -> bool {
    if error.to_string().contains("cannot be empty") {
        return true;
    }
    error.chain().any(|cause| {
        cause.is::<ConfigurationError>()
            || matches!(
                cause.downcast_ref::<PipelineError>(),
                Some(PipelineError::Configuration(_))
            )
            || matches!(
                cause.downcast_ref::<StageError>(),
                Some(StageError::Configuration(_))
            )
    })
}

fn settings_for(command: &Commands) -> Result<Settings> {
    let mut settings = Settings::from_env();
    if let Commands::Query(cmd) = command {
        if let Some(field) = &cmd.field {
            settings.query_builder.field = field.clone();
        }
        if let Some(size) = cmd.size {
            settings.query_builder.size = size;
        }
    }
    settings.validate().context("Invalid configuration")?;
    Ok(settings)
}

fn build_pipeline(command: &Commands, settings: Settings) -> Result<Pipeline> {
    let srl = SrlClientBuilder::new()
        .build()
        .context("Failed to create SRL client")?;
    let elastic = ElasticClientBuilder::new()
        .build()
        .context("Failed to create Elasticsearch client")?;
    let ollama = OllamaClientBuilder::new()
        .build()
        .context("Failed to create Ollama client")?;
    let model = ollama.model().to_string();
    let extractor = LlmExtractor::new(Arc::new(ollama), model);

    let builder = match command.question() {
        Some(question) => Pipeline::builder().reader(TextReader::new([question])),
        None => Pipeline::builder().reader(LineReader::stdin()),
    };

    Ok(builder
        .stage(AnnotationStage::srl(Arc::new(srl)))
        .stage(Boxer::with_config(settings.boxer))
        .stage(QueryBuilder::new(settings.query_builder))
        .stage(RetrievalStage::new(settings.retrieval, Arc::new(elastic)))
        .stage(AnswerStage::new(settings.answer, Arc::new(extractor)))
        .failure_policy(FailurePolicy::Continue)
        .build()?)
}

fn run(cli: &Cli) -> Result<()> {
    if let Some(question) = cli.command.question()
        && question.trim().is_empty()
    {
        anyhow::bail!("Question cannot be empty");
    }

    let settings = settings_for(&cli.command)?;
    let mut pipeline = build_pipeline(&cli.command, settings)?;

    let result = print_run(cli, &mut pipeline);
    pipeline.close();
    result
}

fn print_run(cli: &Cli, pipeline: &mut Pipeline) -> Result<()> {
    let mut failed = 0;
    for result in pipeline.run(cli.command.checkpoint())? {
        match result {
            Ok(unit) if cli.json => println!("{}", serde_json::to_string_pretty(&unit)?),
            Ok(unit) => print_unit(&cli.command, &unit)?,
            Err(failure) if failure.source.is_fatal() => return Err(failure.into()),
            Err(failure) => {
                eprintln!("Skipped: {failure}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        tracing::warn!(failed, "some questions could not be processed");
    }
    Ok(())
}

fn print_unit(command: &Commands, unit: &Unit) -> Result<()> {
    match (command, unit) {
        (Commands::Nlu(_), Unit::Document(doc)) => print_annotations(doc),
        (Commands::Query(_), Unit::Set(set)) => print_query(set)?,
        (Commands::Ask(_), Unit::Set(set)) => print_answers(set),
        _ => anyhow::bail!("Unexpected unit at checkpoint"),
    }
    Ok(())
}

fn print_annotations(doc: &Document) {
    println!("{}", doc.text());
    for token in doc.annotations(AnnotationKind::Token) {
        println!(
            "  {}\t{}\t{}",
            doc.covered_text(token),
            token.pos().unwrap_or("-"),
            token.lemma().unwrap_or("-")
        );
    }
    for link in doc.predicate_links() {
        if let Some((verb, argument)) = doc.link_ends(link) {
            println!(
                "  {} -> {} [{}]",
                doc.covered_text(verb),
                doc.covered_text(argument),
                link.arg_type
            );
        }
    }
}

fn print_query(set: &DocumentSet) -> Result<()> {
    let query = set
        .query_key()
        .and_then(|key| set.get(key))
        .and_then(Document::query)
        .context("No query was built")?;
    println!("{}", serde_json::to_string_pretty(&query.to_search_body())?);
    Ok(())
}

fn print_answers(set: &DocumentSet) {
    for (key, doc) in set.members() {
        if set.is_query(key) {
            println!("Question: {}", doc.text());
        } else {
            println!("[{}] {}", key, preview(doc.text()));
        }
    }
    for answer in set.answers() {
        println!(
            "Answer from {}: {} (score {:.2})",
            answer.source_key, answer.answer_text, answer.score
        );
    }
    for failure in set.failures() {
        println!("No answer from {}: {}", failure.key, failure.reason);
    }
}

/// First `PASSAGE_PREVIEW_CHARS` characters of `text`.
fn preview(text: &str) -> &str {
    match text.char_indices().nth(PASSAGE_PREVIEW_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
