use anyhow::Result;
use clap::Parser;
use shared::{history::default_history_path, logging, run_bot, RunOptions};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "crypto-news-bot")]
#[command(about = "Generate a daily crypto market summary and post it to Telegram")]
struct Args {
    /// Build the post and print it without sending anything
    #[arg(long)]
    dry_run: bool,

    /// Send text only, skipping image selection
    #[arg(long)]
    no_image: bool,

    /// Date to show in the post header (defaults to today, e.g. "June 1, 2025")
    #[arg(long)]
    date: Option<String>,

    /// Do not read or update the recent image history
    #[arg(long)]
    no_history: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn run_options(&self) -> RunOptions {
        RunOptions {
            dry_run: self.dry_run,
            with_image: !self.no_image,
            history_path: if self.no_history {
                None
            } else {
                default_history_path()
            },
            date: self.date.clone(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose);

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("❌ Bot failed: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(args: &Args) -> Result<()> {
    let report = run_bot(args.run_options()).await?;

    if args.dry_run {
        println!("{}", report.post.rendered_text);
        if let Some(image) = &report.image {
            println!("\n🖼️  {}", image.url);
        }
    }

    tracing::info!(
        "🎉 Run complete at {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}
