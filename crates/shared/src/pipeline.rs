//! One linear bot run: validate, probe, generate, check, deliver.

use chrono::Utc;
use std::fmt;
use std::path::PathBuf;
use tracing::Instrument;

use crate::config::Config;
use crate::error::{BotError, Result};
use crate::extractor::ContentExtractor;
use crate::formatter::BulletFormatter;
use crate::history::{default_history_path, ImageHistory};
use crate::images::{HttpProbe, ImageSelector};
use crate::models::{ContentRequest, DeliveryResult, FormattedPost, ImageCandidate};
use crate::normalizer::normalize;
use crate::perplexity::{ContentSource, PerplexityClient};
use crate::tables::fallback_summary;
use crate::telegram::{all_delivered, TelegramClient};

/// Longest message the delivery platform accepts
pub const PLATFORM_MAX_CHARS: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    ValidateEnv,
    Connect,
    Generate,
    ValidateContent,
    Deliver,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::ValidateEnv => "validate-env",
            Stage::Connect => "connect",
            Stage::Generate => "generate",
            Stage::ValidateContent => "validate-content",
            Stage::Deliver => "deliver",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("run failed during {stage}")]
pub struct RunFailure {
    pub stage: Stage,
    #[source]
    pub source: BotError,
}

impl RunFailure {
    fn at(stage: Stage) -> impl FnOnce(BotError) -> Self {
        move |source| Self { stage, source }
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Generate the post but skip the delivery probe and delivery
    pub dry_run: bool,
    pub with_image: bool,
    /// Where the image recency history lives; `None` disables it
    pub history_path: Option<PathBuf>,
    /// Overrides the date shown in the prompt and post header
    pub date: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            with_image: true,
            history_path: default_history_path(),
            date: None,
        }
    }
}

/// Identity of a single run, passed to every stage
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub date: String,
}

impl RunContext {
    pub fn new(date: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            run_id: now.format("%Y%m%d-%H%M%S").to_string(),
            date: date
                .map(String::from)
                .unwrap_or_else(|| ContentRequest::format_date(now)),
        }
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub post: FormattedPost,
    pub image: Option<ImageCandidate>,
    pub deliveries: Vec<DeliveryResult>,
    pub used_fallback_content: bool,
    pub used_fallback_post: bool,
    pub stages: Vec<Stage>,
}

pub struct Pipeline {
    source: Box<dyn ContentSource>,
    delivery: TelegramClient,
    images: ImageSelector,
    formatter: BulletFormatter,
    destinations: Vec<String>,
    options: RunOptions,
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(
        source: Box<dyn ContentSource>,
        delivery: TelegramClient,
        images: ImageSelector,
        formatter: BulletFormatter,
        destinations: Vec<String>,
        options: RunOptions,
    ) -> Self {
        Self {
            source,
            delivery,
            images,
            formatter,
            destinations,
            options,
            // Built only from a validated configuration
            stages: vec![Stage::Init, Stage::ValidateEnv],
        }
    }

    pub fn from_config(config: &Config, options: RunOptions) -> Result<Self> {
        let source = PerplexityClient::new(
            config.perplexity_api_key.clone(),
            config.perplexity_model.clone(),
            config.perplexity_api_url.clone(),
        )?;
        let delivery = TelegramClient::new(&config.telegram_api_url, &config.telegram_bot_token)?;
        let images = ImageSelector::new(Box::new(HttpProbe::new()?));

        Ok(Self::new(
            Box::new(source),
            delivery,
            images,
            BulletFormatter::default(),
            config.destinations.clone(),
            options,
        ))
    }

    pub fn stage(&self) -> Stage {
        self.stages.last().copied().unwrap_or(Stage::Init)
    }

    fn enter(&mut self, stage: Stage) {
        tracing::debug!(from = %self.stage(), to = %stage, "Stage transition");
        self.stages.push(stage);
    }

    pub async fn run(&mut self, ctx: &RunContext) -> std::result::Result<RunReport, RunFailure> {
        match self.run_stages(ctx).await {
            Ok(report) => Ok(report),
            Err(e) => {
                let failed_at = self.stage();
                self.enter(Stage::Failed);
                let _span = stage_span(ctx, failed_at).entered();
                tracing::error!("💥 {}", e);
                Err(RunFailure {
                    stage: failed_at,
                    source: e,
                })
            }
        }
    }

    async fn run_stages(&mut self, ctx: &RunContext) -> Result<RunReport> {
        self.enter(Stage::Connect);
        self.connect().instrument(stage_span(ctx, Stage::Connect)).await?;

        self.enter(Stage::Generate);
        let generated = self
            .generate(ctx)
            .instrument(stage_span(ctx, Stage::Generate))
            .await;

        self.enter(Stage::ValidateContent);
        {
            let _span = stage_span(ctx, Stage::ValidateContent).entered();
            validate_post(&generated.post)?;
            if !self.fits_window(&generated.post) {
                tracing::warn!(
                    chars = generated.post.character_count,
                    "Post is outside the target length window"
                );
            }
        }

        self.enter(Stage::Deliver);
        let deliveries = self
            .deliver(&generated.post, generated.image.as_ref())
            .instrument(stage_span(ctx, Stage::Deliver))
            .await?;

        self.enter(Stage::Done);
        let _span = stage_span(ctx, Stage::Done).entered();
        let report = RunReport {
            post: generated.post,
            image: generated.image,
            deliveries,
            used_fallback_content: generated.used_fallback_content,
            used_fallback_post: generated.used_fallback_post,
            stages: self.stages.clone(),
        };
        log_report(&report);
        Ok(report)
    }

    async fn connect(&self) -> Result<()> {
        tracing::info!("🔗 Testing API connections...");
        self.source.probe().await?;
        if self.options.dry_run {
            tracing::info!("Dry run, skipping delivery API check");
            return Ok(());
        }
        self.delivery.test_connection().await
    }

    async fn generate(&self, ctx: &RunContext) -> Generated {
        tracing::info!("📰 Generating crypto content...");
        let request = ContentRequest::new(ctx.date.clone(), self.formatter.config().min_chars);

        let extracted = match self.source.fetch(&request).await {
            Ok(raw) => ContentExtractor::extract(&raw).map(|shape| shape.into_text()),
            Err(e) => {
                tracing::warn!(error = %e, "Content request failed");
                None
            }
        };

        let used_fallback_content = extracted.is_none();
        let text = extracted.unwrap_or_else(|| {
            tracing::warn!("⚠️ No content extracted, using fallback");
            fallback_summary(&ctx.date)
        });

        let normalized = normalize(&text);
        let (post, used_fallback_post) = match self.formatter.format(&normalized, &ctx.date) {
            Ok(post) => (post, false),
            Err(e) => {
                tracing::warn!(error = %e, "Formatting failed, using minimal post");
                (FormattedPost::minimal(&ctx.date), true)
            }
        };

        let image = if self.options.with_image {
            Some(self.pick_image(&post).await)
        } else {
            None
        };

        Generated {
            post,
            image,
            used_fallback_content,
            used_fallback_post,
        }
    }

    async fn pick_image(&self, post: &FormattedPost) -> ImageCandidate {
        let Some(path) = self.options.history_path.as_ref() else {
            return self.images.select(&post.rendered_text, None).await;
        };

        let mut history = ImageHistory::load_or_default(path);
        let chosen = self
            .images
            .select(&post.rendered_text, Some(&mut history))
            .await;
        if let Err(e) = history.save(path) {
            tracing::warn!(path = %path.display(), error = %e, "Could not save image history");
        }
        chosen
    }

    async fn deliver(
        &self,
        post: &FormattedPost,
        image: Option<&ImageCandidate>,
    ) -> Result<Vec<DeliveryResult>> {
        if self.options.dry_run {
            tracing::info!("Dry run, not sending");
            return Ok(Vec::new());
        }

        tracing::info!(destinations = self.destinations.len(), "📤 Sending content...");
        let results = self
            .delivery
            .send_to_all(
                &self.destinations,
                &post.rendered_text,
                image.map(|i| i.url.as_str()),
            )
            .await;

        if !all_delivered(&results) {
            let failed: Vec<&str> = results
                .iter()
                .filter(|r| !r.success)
                .map(|r| r.channel.as_str())
                .collect();
            return Err(BotError::Delivery(format!(
                "{} of {} destinations failed: {}",
                failed.len(),
                self.destinations.len(),
                failed.join(", ")
            )));
        }

        Ok(results)
    }

    fn fits_window(&self, post: &FormattedPost) -> bool {
        let config = self.formatter.config();
        (config.min_chars..=config.max_chars).contains(&post.character_count)
    }
}

fn stage_span(ctx: &RunContext, stage: Stage) -> tracing::Span {
    tracing::info_span!("run", run_id = %ctx.run_id, stage = %stage)
}

struct Generated {
    post: FormattedPost,
    image: Option<ImageCandidate>,
    used_fallback_content: bool,
    used_fallback_post: bool,
}

fn validate_post(post: &FormattedPost) -> Result<()> {
    if post.rendered_text.trim().is_empty() || post.bullets.is_empty() {
        return Err(BotError::Formatting("generated post is empty".to_string()));
    }
    if post.character_count > PLATFORM_MAX_CHARS {
        return Err(BotError::Formatting(format!(
            "post has {} characters, the platform limit is {}",
            post.character_count, PLATFORM_MAX_CHARS
        )));
    }
    Ok(())
}

fn log_report(report: &RunReport) {
    tracing::info!("✅ Content generated:");
    tracing::info!("   📏 Characters: {}", report.post.character_count);
    tracing::info!(
        "   🖼️  Has image: {}",
        if report.image.is_some() { "Yes" } else { "No" }
    );
    tracing::info!("   📝 Preview: {}...", report.post.preview(80));
    for delivery in &report.deliveries {
        tracing::info!(
            "   📬 {}: {}{}",
            delivery.channel,
            if delivery.success { "delivered" } else { "failed" },
            if delivery.fell_back_to_text { " (text only)" } else { "" }
        );
    }
}

/// Runs the bot once against the process environment
pub async fn run_bot(options: RunOptions) -> std::result::Result<RunReport, RunFailure> {
    execute(Config::from_env, options).await
}

/// Runs the bot once with configuration from `load_config`
pub async fn execute<F>(load_config: F, options: RunOptions) -> std::result::Result<RunReport, RunFailure>
where
    F: FnOnce() -> Result<Config>,
{
    let ctx = RunContext::new(options.date.as_deref());

    let mut pipeline = {
        let _span = stage_span(&ctx, Stage::ValidateEnv).entered();
        tracing::info!("🚀 Starting crypto news bot");
        tracing::info!("⏰ Current time: {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));

        let config = load_config().map_err(RunFailure::at(Stage::ValidateEnv))?;
        tracing::info!(destinations = config.destinations.len(), "✅ Environment variables validated");

        Pipeline::from_config(&config, options).map_err(RunFailure::at(Stage::ValidateEnv))?
    };

    pipeline.run(&ctx).await
}
