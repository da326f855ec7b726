pub mod hub;
pub mod load;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Command {
    /// Download, cache, and inspect HuggingFace models.
    Hub(hub::HubArgs),

    /// Load a model's SafeTensors weights into a module graph.
    Load(load::LoadArgs),
}

pub fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Hub(args) => hub::run(args),
        Command::Load(args) => load::run(args),
    }
}

/// A byte-count bar for hub transfers, hidden until the first report.
pub(crate) fn transfer_bar() -> indicatif::ProgressBar {
    let bar = indicatif::ProgressBar::hidden();
    if let Ok(style) = indicatif::ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

/// Forward `(transferred, total)` reports to `bar`.
pub(crate) fn report_to(bar: &indicatif::ProgressBar) -> impl Fn(u64, u64) + Send + Sync + 'static {
    let bar = bar.clone();
    move |done: u64, total: u64| {
        if bar.is_hidden() {
            bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        }
        bar.set_length(total);
        bar.set_position(done);
    }
}
