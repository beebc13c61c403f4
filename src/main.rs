use std::io::Write;
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use manuscript_review_lib::cli::Cli;
use manuscript_review_lib::config::{APP_NAME, APP_VERSION};
use manuscript_review_lib::logging;
use manuscript_review_lib::pipeline::artifacts::RUN_LOG_FILE;
use manuscript_review_lib::pipeline::figures::PdfiumRenderer;
use manuscript_review_lib::pipeline::inference::OllamaClient;
use manuscript_review_lib::pipeline::retrieval::build_embedder;
use manuscript_review_lib::pipeline::ReviewPipeline;

fn main() {
    let cli = Cli::parse();

    if let Err(err) = logging::init_tracing(Some(&cli.out_dir.join(RUN_LOG_FILE))) {
        eprintln!("{APP_NAME}: {err}");
        std::process::exit(1);
    }

    if let Err(err) = run(cli) {
        error!(error = %err, "review failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let input = cli.input.clone();
    let out_dir = cli.out_dir.clone();
    let config = cli.into_config();

    info!(
        version = APP_VERSION,
        input = %input.display(),
        out_dir = %out_dir.display(),
        "{APP_NAME} starting"
    );
    config.validate().context("invalid configuration")?;

    let llm = OllamaClient::new(
        &config.inference.base_url,
        config.inference.timeout_secs,
        config.inference.allow_remote,
    )
    .context("cannot create inference client")?;
    let embedder = build_embedder(&config.retrieval, llm.base_url(), config.inference.timeout_secs);
    let stream = config.inference.stream;

    let mut pipeline = ReviewPipeline::new(config, Arc::new(llm), embedder);
    match PdfiumRenderer::new() {
        Ok(renderer) => pipeline = pipeline.with_renderer(Box::new(renderer)),
        Err(e) => warn!(error = %e, "PDFium unavailable; figure pages will not be rendered"),
    }

    let mut printer = None;
    if stream {
        let (tx, rx) = mpsc::channel();
        pipeline = pipeline.with_token_sink(tx);
        printer = Some(spawn_token_printer(rx));
    }

    let result = pipeline.run(&input, &out_dir);
    // Dropping the pipeline closes the token channel so the printer exits.
    drop(pipeline);
    if let Some(handle) = printer {
        let _ = handle.join();
    }

    let outcome = result.with_context(|| format!("review of {} failed", input.display()))?;
    info!(
        run_id = %outcome.run_id,
        review = %outcome.review_path.display(),
        manifest = %outcome.manifest_path.display(),
        figures = %outcome.figures.summary(),
        "Review written"
    );
    println!("{}", outcome.review_path.display());
    Ok(())
}

/// Forward streamed model output to stderr as it arrives.
fn spawn_token_printer(rx: mpsc::Receiver<String>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for token in rx {
            let mut stderr = std::io::stderr().lock();
            let _ = stderr.write_all(token.as_bytes());
            let _ = stderr.flush();
        }
    })
}
