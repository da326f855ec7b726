use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use rustml_load::{
    CancellationToken, LoadConfig, LoadError, ModelLoader, ModelReference, NoSanitize, QuantizationSpec,
};
use rustml_nn::ModuleGraph;

/// Exit status used when a load is interrupted.
const EXIT_CANCELLED: i32 = 130;

#[derive(Args)]
pub struct LoadArgs {
    /// Local directory, or a HuggingFace model identifier.
    model: String,

    /// JSON loader configuration; flags below take precedence.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the hub cache directory.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// HuggingFace API token for private models.
    #[arg(long)]
    token: Option<String>,

    /// Tensors forced per evaluation batch.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Quantization group size for modules stored quantized.
    #[arg(long, default_value_t = 64)]
    group_size: usize,

    /// Quantization bit width for modules stored quantized.
    #[arg(long, default_value_t = 4)]
    bits: u32,

    /// Leave every module unquantized.
    #[arg(long)]
    no_quantize: bool,

    /// Print every module with its kind.
    #[arg(long)]
    modules: bool,
}

fn build_config(args: &LoadArgs) -> Result<LoadConfig> {
    let mut config = match &args.config {
        Some(path) => LoadConfig::from_file(path)
            .with_context(|| format!("Failed to read loader config: {}", path.display()))?,
        None => LoadConfig::default(),
    };
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if args.cache_dir.is_some() {
        config.cache_dir = args.cache_dir.clone();
    }
    if args.token.is_some() {
        config.token = args.token.clone();
    }
    log::debug!("Loader batch size {}, patterns {:?}", config.batch_size, config.patterns);
    Ok(config)
}

pub fn run(args: LoadArgs) -> Result<()> {
    let config = build_config(&args)?;
    let quantization = if args.no_quantize {
        None
    } else {
        Some(QuantizationSpec::new(args.group_size, args.bits)?)
    };

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel()).context("Failed to install Ctrl-C handler")?;

    let bar = super::transfer_bar();
    let loader = ModelLoader::new(config)
        .with_cancellation(cancel)
        .with_progress(Arc::new(super::report_to(&bar)));
    let hub = loader.hub();
    let reference = ModelReference::parse(&args.model);

    let result = loader
        .load_weights(&reference, &hub, &NoSanitize)
        .and_then(|(dir, weights)| {
            bar.finish_and_clear();
            let mut graph = ModuleGraph::scaffold(&weights).map_err(LoadError::Module)?;
            let report = loader.finish(&dir, weights, &mut graph, quantization.as_ref())?;
            Ok((graph, report))
        });
    bar.finish_and_clear();

    let (graph, report) = match result {
        Ok(loaded) => loaded,
        Err(e) if e.is_cancelled() => {
            eprintln!("Cancelled.");
            std::process::exit(EXIT_CANCELLED);
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to load model: {}", reference)),
    };

    let leaves = graph.leaves();
    println!("directory: {}", report.directory.display());
    println!("tensors: {}", report.tensors);
    println!("modules: {}", leaves.len());
    println!("quantized: {}", report.quantized.len());
    println!("batches: {}", report.eval.batch_sizes.len());
    if args.modules {
        for (path, layer) in leaves {
            let marker = if layer.is_quantized() { " (quantized)" } else { "" };
            println!("  {path}: {}{marker}", layer.kind());
        }
    }

    Ok(())
}
