// Public modules
pub mod config;
pub mod error;
pub mod extractor;
pub mod formatter;
pub mod history;
pub mod images;
pub mod logging;
pub mod markup;
pub mod models;
pub mod normalizer;
pub mod perplexity;
pub mod pipeline;
pub mod tables;
pub mod telegram;

// Re-export commonly used types
pub use config::Config;
pub use error::{BotError, Result};
pub use extractor::{ContentExtractor, ResponseShape};
pub use formatter::{BulletFormatter, FormatConfig};
pub use history::ImageHistory;
pub use images::ImageSelector;
pub use models::{ContentRequest, DeliveryResult, FormattedPost, ImageCandidate};
pub use normalizer::normalize;
pub use perplexity::{ContentSource, PerplexityClient};
pub use pipeline::{run_bot, Pipeline, RunFailure, RunOptions, RunReport, Stage};
pub use telegram::TelegramClient;
