use anyhow::Context;
use docqa::{
    build_state,
    cli::{output::Output, Cli, Commands},
    create_app,
    types::Document,
    utils::toml_config::LogFormat,
    DocqaConfig,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    let config = match DocqaConfig::from_file_and_env(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            output.error(&format!("Failed to load configuration: {}", e));
            return Err(e).context("loading configuration");
        }
    };

    init_tracing(&config, cli.verbose);

    match cli.command {
        None | Some(Commands::Serve) => serve(config, &output).await,
        Some(Commands::Ingest { files }) => ingest(config, files, &output).await,
        Some(Commands::Ask { question, top_k }) => ask(config, &question, top_k, &output).await,
        Some(Commands::Config { validate }) => show_config(&config, &cli.config, validate, &output),
    }
}

fn init_tracing(config: &DocqaConfig, verbose: bool) {
    let fallback = if verbose {
        "debug".to_string()
    } else {
        format!("docqa={0},docqa_server={0},tower_http=info", config.server.log_level)
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let registry = tracing_subscriber::registry().with(filter);
    match config.server.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: DocqaConfig, output: &Output) -> anyhow::Result<()> {
    output.banner();

    let addr = format!("{}:{}", config.server.host, config.server.port);
    output.kv("Vector store", config.vector_store.provider.name());
    output.kv("Collection", &config.vector_store.collection);
    output.kv("Embedding model", &config.embedding.model);
    output.kv("Generation model", &config.generation.model);

    let state = build_state(config)
        .await
        .context("building application state")?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    output.success(&format!("Listening on http://{}", addr));
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
    }
}

async fn ingest(config: DocqaConfig, files: Vec<PathBuf>, output: &Output) -> anyhow::Result<()> {
    let mut documents = Vec::with_capacity(files.len());
    for path in &files {
        let raw_text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        documents.push(Document::new(name, raw_text));
    }

    let state = build_state(config)
        .await
        .context("building application state")?;

    output.header("Indexing");
    let batch = state.pipeline.ingest_many(&documents).await;
    let total = documents.len();
    for (i, report) in batch.indexed.iter().enumerate() {
        if report.newly_indexed {
            output.step(
                i + 1,
                total,
                &format!("{} ({} chunks)", report.name, report.chunks),
            );
        } else {
            output.warning(&format!("{} is already indexed, skipped", report.name));
        }
    }

    if let Some((name, err)) = batch.failed {
        output.error(&format!("{}: {}", name, err));
        return Err(err).with_context(|| format!("indexing {}", name));
    }

    output.success(&format!("Indexed {} document(s)", total));
    Ok(())
}

async fn ask(
    config: DocqaConfig,
    question: &str,
    top_k: Option<usize>,
    output: &Output,
) -> anyhow::Result<()> {
    let state = build_state(config)
        .await
        .context("building application state")?;

    let answer = state
        .pipeline
        .ask(question, top_k)
        .await
        .context("answering question")?;

    output.header("Answer");
    output.answer(&answer.text);

    if !answer.sources.is_empty() {
        output.header("Sources");
        for source in &answer.sources {
            output.list_item(source);
        }
    }
    output.kv("topK", &answer.top_k.to_string());
    Ok(())
}

fn show_config(
    config: &DocqaConfig,
    path: &std::path::Path,
    validate: bool,
    output: &Output,
) -> anyhow::Result<()> {
    config.validate().context("validating configuration")?;

    if validate {
        output.success(&format!("Configuration is valid ({})", path.display()));
        return Ok(());
    }

    let rendered = toml::to_string_pretty(config).context("rendering configuration")?;
    println!("{}", rendered);
    if !path.exists() {
        output.hint(&format!(
            "{} not found, showing defaults with environment overrides",
            path.display()
        ));
    }
    Ok(())
}
