use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tmx_align::align::Aligner;
use tmx_align::config::Config;
use tmx_align::openai::AlignmentClient;
use tmx_align::parser::ResponseParser;
use tmx_align::pipeline::{self, DocumentPair, RunOptions};
use tmx_align::progress::LogProgress;
use tmx_align::tmx::TmxHeader;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "tmx-align")]
#[command(about = "Align parallel documents with an LLM and build TMX translation memories", long_about = None)]
struct Args {
    /// Document pair as SOURCE=TARGET (repeatable, processed in order)
    #[arg(long = "pair", value_name = "SOURCE=TARGET", value_parser = parse_pair, required = true)]
    pairs: Vec<DocumentPair>,

    /// Directory for per-pair and master TMX files (overrides OUTPUT_DIR)
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Source language name used in prompts (e.g. English)
    #[arg(long)]
    source_name: Option<String>,

    /// Source language code written to xml:lang (e.g. EN)
    #[arg(long)]
    source_code: Option<String>,

    /// Target language name used in prompts (e.g. Khmer)
    #[arg(long)]
    target_name: Option<String>,

    /// Target language code written to xml:lang (e.g. KM)
    #[arg(long)]
    target_code: Option<String>,

    /// Chat model (overrides OPENAI_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Skip building the master TMX
    #[arg(long)]
    no_master: bool,
}

fn parse_pair(value: &str) -> Result<DocumentPair, String> {
    let (source, target) = value
        .split_once('=')
        .ok_or_else(|| format!("expected SOURCE=TARGET, got '{}'", value))?;
    if source.trim().is_empty() || target.trim().is_empty() {
        return Err(format!("both sides of '{}' must be non-empty", value));
    }
    Ok(DocumentPair::new(source.trim(), target.trim()))
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(name) = &self.source_name {
            config.source_lang_name = name.clone();
        }
        if let Some(code) = &self.source_code {
            config.source_lang_code = code.clone();
        }
        if let Some(name) = &self.target_name {
            config.target_lang_name = name.clone();
        }
        if let Some(code) = &self.target_code {
            config.target_lang_code = code.clone();
        }
        if let Some(model) = &self.model {
            config.openai_model = model.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when not present)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tmx_align=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::from_env()?;
    args.apply(&mut config);
    config.validate()?;

    let languages = config.languages()?;
    info!(
        "Aligning {} ({}) with {} ({}) using {}",
        languages.source.name(),
        languages.source.code(),
        languages.target.name(),
        languages.target.code(),
        config.openai_model
    );

    let client = AlignmentClient::from_config(&config)?;
    let parser = ResponseParser::new(&languages)?;
    let header = TmxHeader::new(languages.source.code(), config.admin_lang.clone());
    let aligner = Aligner::new(client, parser, languages, header);

    let options = RunOptions {
        output_dir: config.output_dir.clone(),
        build_master: !args.no_master,
    };

    let report = pipeline::run(
        &aligner,
        &args.pairs,
        &options,
        Arc::new(LogProgress::new("align")),
    )
    .await
    .context("Processing failed")?;

    for file in report.generated_files() {
        println!("{}", file.display());
    }
    if let Some(master) = &report.master {
        println!("{}", master.output.display());
        for (path, reason) in &master.skipped {
            warn!("Not merged: {} ({})", path.display(), reason);
        }
    }

    if !report.failures.is_empty() {
        for failure in &report.failures {
            warn!("Failed: {} ({})", failure.pair.display_label(), failure.error);
        }
        anyhow::bail!(
            "{} of {} document pairs failed",
            report.failures.len(),
            args.pairs.len()
        );
    }

    info!("All document pairs processed successfully");
    Ok(())
}
