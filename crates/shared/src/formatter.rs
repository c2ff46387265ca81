//! Turns normalized summary text into a bulleted post that fits the length window.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{BotError, Result};
use crate::models::{render, FormattedPost};
use crate::tables::{
    EnhancementRule, BULLET_MARKER, DEFAULT_TITLE, ENHANCEMENTS, GENERIC_BULLETS, HASHTAG_LINE,
};

static HASHTAGS: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"#[A-Za-z]\w*").ok());

const ELLIPSIS: char = '…';

/// Longest stretch of characters a word-boundary cut may give up before
/// falling back to a hard cut
const MAX_WORD_BACKOFF: usize = 20;

#[derive(Debug, Clone)]
pub struct FormatConfig {
    pub min_chars: usize,
    pub max_chars: usize,
    pub min_bullets: usize,
    pub max_bullets: usize,
    pub title_max_chars: usize,
    pub min_unit_chars: usize,
    pub enhance_below_chars: usize,
    pub max_bullet_chars: usize,
    pub min_survivors: usize,
    pub min_partial_chars: usize,
    pub dedup_prefix_chars: usize,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            min_chars: 900,
            // Keeps the visible caption under the photo caption limit
            max_chars: 1000,
            min_bullets: 4,
            max_bullets: 6,
            title_max_chars: 120,
            min_unit_chars: 15,
            enhance_below_chars: 60,
            max_bullet_chars: 280,
            min_survivors: 3,
            min_partial_chars: 40,
            dedup_prefix_chars: 24,
        }
    }
}

impl FormatConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_bullets == 0 || self.min_bullets > self.max_bullets {
            return Err(BotError::Formatting(format!(
                "bullet band {}..={} is empty",
                self.min_bullets, self.max_bullets
            )));
        }
        // Truncation can land up to one partial bullet (plus word backoff) short of max_chars
        if self.max_chars < self.min_chars + self.min_partial_chars + MAX_WORD_BACKOFF + 2 {
            return Err(BotError::Formatting(format!(
                "length window {}..={} is too narrow",
                self.min_chars, self.max_chars
            )));
        }
        if self.min_partial_chars <= BULLET_MARKER.chars().count() + 1 {
            return Err(BotError::Formatting(
                "partial bullets must leave room for text".to_string(),
            ));
        }
        Ok(())
    }
}

pub struct BulletFormatter {
    config: FormatConfig,
    enhancements: &'static [EnhancementRule],
    pool: &'static [&'static str],
}

impl BulletFormatter {
    pub fn new(config: FormatConfig) -> Self {
        Self {
            config,
            enhancements: ENHANCEMENTS,
            pool: GENERIC_BULLETS,
        }
    }

    pub fn config(&self) -> &FormatConfig {
        &self.config
    }

    pub fn format(&self, text: &str, date: &str) -> Result<FormattedPost> {
        self.config.validate()?;

        let (title, body) = self.split_title(text);
        let body = strip_hashtags(&body);

        let mut bullets = Vec::new();
        for unit in split_sentences(&body) {
            if char_len(unit.trim_end_matches(['.', '!', '?'])) < self.config.min_unit_chars {
                continue;
            }
            let line = self.bullet_line(&unit);
            if !self.is_near_duplicate(&line, &bullets) {
                bullets.push(line);
            }
        }

        if bullets.len() < self.config.min_bullets {
            self.splice_from_pool(&mut bullets, |b| b.len() >= self.config.min_bullets);
        }
        bullets.truncate(self.config.max_bullets);

        let overhead = char_len(&render(&title, date, &[], HASHTAG_LINE));
        let min_block = self.config.min_chars.saturating_sub(overhead);
        let max_block = self.config.max_chars.saturating_sub(overhead);

        if block_len(&bullets) < min_block {
            self.pad_to_window(&mut bullets, min_block, max_block);
            if block_len(&bullets) < min_block {
                return Err(BotError::Formatting(format!(
                    "cannot reach {} characters with the available bullets",
                    self.config.min_chars
                )));
            }
        }

        if block_len(&bullets) > max_block {
            bullets = self.truncate_to_budget(bullets, max_block)?;
        }

        let rendered_text = render(&title, date, &bullets, HASHTAG_LINE);
        let character_count = char_len(&rendered_text);

        Ok(FormattedPost {
            title,
            date: date.to_string(),
            bullets,
            hashtag_line: HASHTAG_LINE.to_string(),
            rendered_text,
            character_count,
        })
    }

    /// Takes a short leading line as the title when the text spans several lines
    fn split_title(&self, text: &str) -> (String, String) {
        let trimmed = text.trim();
        if let Some((first, rest)) = trimmed.split_once('\n') {
            let first = first.trim().trim_matches(|c: char| c == '#' || c == '*').trim();
            let rest = rest.trim();
            if !first.is_empty()
                && !rest.is_empty()
                && char_len(first) < self.config.title_max_chars
                && !starts_with_bullet(first)
            {
                return (first.to_string(), rest.to_string());
            }
        }
        (DEFAULT_TITLE.to_string(), trimmed.to_string())
    }

    fn bullet_line(&self, unit: &str) -> String {
        let text: &str = match enhance(self.enhancements, unit) {
            Some(replacement) if char_len(unit) < self.config.enhance_below_chars => replacement,
            _ => unit,
        };
        shorten(
            &format!("{}{}", BULLET_MARKER, text),
            self.config.max_bullet_chars,
        )
    }

    /// Appends generic bullets until `done` holds, preferring ones that are not
    /// already represented and reusing the pool only if that is not enough
    fn splice_from_pool<F>(&self, bullets: &mut Vec<String>, done: F)
    where
        F: Fn(&[String]) -> bool,
    {
        for allow_duplicates in [false, true] {
            for generic in self.pool {
                if done(bullets.as_slice()) {
                    return;
                }
                let line = format!("{}{}", BULLET_MARKER, generic);
                if allow_duplicates || !self.is_near_duplicate(&line, bullets) {
                    bullets.push(line);
                }
            }
        }
    }

    /// Grows the block towards `min_block` with unused generic text, never
    /// leaving the bullet band and never passing `max_block`.
    ///
    /// New bullets are appended while the band has room. Once it is full the
    /// shortest bullet gets a generic sentence appended instead.
    fn pad_to_window(&self, bullets: &mut Vec<String>, min_block: usize, max_block: usize) {
        for generic in self.pool {
            let block = block_len(bullets);
            if block >= min_block {
                return;
            }
            if self.is_pool_text_used(generic, bullets) {
                continue;
            }
            // One separator character comes with every addition
            let room = max_block.saturating_sub(block + 1);

            if bullets.len() < self.config.max_bullets {
                let limit = room.min(self.config.max_bullet_chars);
                if limit < self.config.min_partial_chars {
                    return;
                }
                bullets.push(shorten(&format!("{}{}", BULLET_MARKER, generic), limit));
                continue;
            }

            let Some(index) = shortest_extendable(bullets) else {
                return;
            };
            let headroom = self
                .config
                .max_bullet_chars
                .saturating_sub(char_len(&bullets[index]) + 1);
            let limit = room.min(headroom);
            if limit < self.config.min_partial_chars {
                return;
            }
            let extended = format!("{} {}", bullets[index], shorten(generic, limit));
            bullets[index] = extended;
        }
    }

    fn is_pool_text_used(&self, generic: &str, bullets: &[String]) -> bool {
        bullets.iter().any(|b| b.contains(generic))
            || self.is_near_duplicate(&format!("{}{}", BULLET_MARKER, generic), bullets)
    }

    /// Keeps whole bullets while they fit `budget`, then shortens the next one.
    ///
    /// Reserves room so at least `min_survivors` bullets remain when that many
    /// were available.
    fn truncate_to_budget(&self, bullets: Vec<String>, budget: usize) -> Result<Vec<String>> {
        let survivors = self.config.min_survivors.min(bullets.len());
        let partial = self.config.min_partial_chars;

        if budget < survivors * (partial + 1) {
            return Err(BotError::Formatting(format!(
                "only {} characters left for bullets",
                budget
            )));
        }

        let mut kept: Vec<String> = Vec::new();
        let mut used = 0;

        for (index, bullet) in bullets.into_iter().enumerate() {
            let separator = usize::from(!kept.is_empty());
            let still_needed = survivors.saturating_sub(index + 1);
            let reserve = still_needed * (partial + 1);
            let room = budget.saturating_sub(used + separator + reserve);

            let len = char_len(&bullet);
            if len <= room {
                used += separator + len;
                kept.push(bullet);
                continue;
            }

            if room >= partial {
                let short = shorten(&bullet, room);
                used += separator + char_len(&short);
                kept.push(short);
            }

            if still_needed == 0 {
                break;
            }
        }

        Ok(kept)
    }

    fn is_near_duplicate(&self, line: &str, existing: &[String]) -> bool {
        let key = dedup_key(line, self.config.dedup_prefix_chars);
        existing
            .iter()
            .any(|b| dedup_key(b, self.config.dedup_prefix_chars) == key)
    }
}

impl Default for BulletFormatter {
    fn default() -> Self {
        Self::new(FormatConfig::default())
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Length of the bullet lines joined by newlines
fn block_len(bullets: &[String]) -> usize {
    let lines: usize = bullets.iter().map(|b| char_len(b)).sum();
    lines + bullets.len().saturating_sub(1)
}

/// Index of the shortest bullet that was not already cut short
fn shortest_extendable(bullets: &[String]) -> Option<usize> {
    bullets
        .iter()
        .enumerate()
        .filter(|(_, b)| !b.ends_with(ELLIPSIS))
        .min_by_key(|(_, b)| char_len(b))
        .map(|(index, _)| index)
}

fn starts_with_bullet(line: &str) -> bool {
    let line = line.trim_start();
    if line.starts_with(['-', '*', '•']) {
        return true;
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && line[digits..].starts_with(['.', ')'])
}

fn strip_hashtags(text: &str) -> String {
    match HASHTAGS.as_ref() {
        Some(re) => re.replace_all(text, "").trim().to_string(),
        None => text.to_string(),
    }
}

/// Splits on `.`, `!` and `?` when followed by whitespace or the end of text.
///
/// Terminal punctuation stays with its sentence; leading list markers are dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut units = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let at_boundary = matches!(c, '.' | '!' | '?')
            && chars.peek().map_or(true, |next| next.is_whitespace());
        if at_boundary {
            push_unit(&mut units, &current);
            current.clear();
        }
    }
    push_unit(&mut units, &current);

    units
}

fn push_unit(units: &mut Vec<String>, raw: &str) {
    let unit = raw
        .trim()
        .trim_start_matches(|c: char| c == '-' || c == '*' || c == '•' || c.is_whitespace());
    let unit = strip_numbering(unit)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let has_text = unit
        .trim_end_matches(['.', '!', '?'])
        .chars()
        .any(|c| c.is_alphanumeric());
    if has_text {
        units.push(unit);
    }
}

fn strip_numbering(unit: &str) -> &str {
    let digits = unit.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 && unit[digits..].starts_with(")") {
        &unit[digits + 1..]
    } else {
        unit
    }
}

/// Canned replacement for the first rule with a keyword matching the start of a word
fn enhance(rules: &'static [EnhancementRule], unit: &str) -> Option<&'static str> {
    let lower = unit.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    rules
        .iter()
        .find(|rule| {
            rule.keywords
                .iter()
                .any(|keyword| words.iter().any(|word| word.starts_with(keyword)))
        })
        .map(|rule| rule.replacement)
}

/// Cuts `text` to at most `max_chars`, ending in an ellipsis.
///
/// Prefers a word boundary unless that would throw away too much text.
pub fn shorten(text: &str, max_chars: usize) -> String {
    if char_len(text) <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }

    let head: String = text.chars().take(max_chars - 1).collect();
    let cut = match head.rfind(' ') {
        Some(pos) if char_len(&head[pos..]) <= MAX_WORD_BACKOFF => &head[..pos],
        _ => head.as_str(),
    };
    let cut = cut.trim_end_matches(|c: char| c.is_whitespace() || ",;:-".contains(c));

    format!("{}{}", cut, ELLIPSIS)
}

fn dedup_key(line: &str, prefix_chars: usize) -> String {
    line.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .take(prefix_chars)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str =
        "Bitcoin rose 3%. Ethereum network upgrades continue. Altcoins mixed. Sentiment neutral.";

    fn bullet_lines(post: &FormattedPost) -> Vec<&str> {
        post.rendered_text
            .lines()
            .filter(|line| line.starts_with(BULLET_MARKER))
            .collect()
    }

    fn assert_in_window(post: &FormattedPost) {
        let config = FormatConfig::default();
        assert!(
            post.character_count >= config.min_chars && post.character_count <= config.max_chars,
            "character count {} outside window",
            post.character_count
        );
        assert_eq!(post.character_count, post.rendered_text.chars().count());
    }

    // ==================== End-to-End Layout Tests ====================

    #[test]
    fn test_market_update_scenario() {
        let post = BulletFormatter::default()
            .format(SAMPLE, "June 1, 2025")
            .unwrap();

        let mut lines = post.rendered_text.lines();
        assert_eq!(lines.next(), Some("📈 **🚀 Crypto Market Update**"));
        assert_eq!(lines.next(), Some("📅 June 1, 2025"));

        let bullets = bullet_lines(&post);
        assert!(bullets.len() >= 4 && bullets.len() <= 6, "got {} bullets", bullets.len());
        assert_eq!(bullets.len(), post.bullets.len());

        assert_eq!(post.rendered_text.lines().last(), Some(HASHTAG_LINE));
        assert_in_window(&post);
    }

    #[test]
    fn test_short_units_are_enhanced() {
        let post = BulletFormatter::default()
            .format(SAMPLE, "June 1, 2025")
            .unwrap();

        assert!(post.bullets[0].starts_with("• Bitcoin holds its role"));
        assert!(post.bullets[1].starts_with("• Ethereum network development"));
        // "Altcoins mixed" is below the noise floor and never becomes a bullet
        assert!(post.bullets[2].starts_with("• Overall market sentiment"));
    }

    #[test]
    fn test_empty_text_uses_generic_pool() {
        let post = BulletFormatter::default().format("", "June 1, 2025").unwrap();

        assert!(post.bullets.len() >= 4);
        assert!(post.bullets[0].contains("Market participants"));
        assert_in_window(&post);
    }

    #[test]
    fn test_window_holds_for_varied_inputs() {
        let long_sentence = "Bitcoin traded in a wide range throughout the session as buyers and sellers \
            traded control several times, leaving the market roughly where it began after a very long \
            and volatile day of price discovery that kept everyone watching the charts closely. ";
        let inputs = vec![
            "x".to_string(),
            "Short. Tiny. Small.".to_string(),
            SAMPLE.to_string(),
            long_sentence.repeat(2),
            long_sentence.repeat(12),
            "A".repeat(5000),
            "Stablecoin supply is growing quickly across multiple chains this week. ".repeat(20),
            "Regulators spoke. Institutions bought ETFs today. DeFi yields fell sharply overnight. \
             Trading volume spiked on major venues. Solana outperformed other large caps. \
             Fear and greed index sits at neutral levels. Bitcoin dominance ticked higher."
                .to_string(),
        ];

        let formatter = BulletFormatter::default();
        for input in inputs {
            let post = formatter.format(&input, "December 31, 2025").unwrap();
            assert_in_window(&post);
        }
    }

    #[test]
    fn test_hashtags_in_body_are_not_bullets() {
        let text = "Bitcoin consolidated above recent support levels during the afternoon session today. \
                    #CryptoNews #MarketOverview";
        let post = BulletFormatter::default().format(text, "June 1, 2025").unwrap();

        assert!(post.bullets.iter().all(|b| !b.contains('#')));
        assert_eq!(post.rendered_text.matches("#CryptoNews").count(), 1);
    }

    // ==================== Title Tests ====================

    #[test]
    fn test_short_first_line_becomes_title() {
        let text = "Weekend Crypto Recap\nBitcoin consolidated above recent support during the weekend session.";
        let post = BulletFormatter::default().format(text, "June 1, 2025").unwrap();

        assert_eq!(post.title, "Weekend Crypto Recap");
        assert!(post.rendered_text.starts_with("📈 **Weekend Crypto Recap**\n"));
    }

    #[test]
    fn test_bullet_first_line_is_not_a_title() {
        let text = "- Bitcoin consolidated above recent support\nEthereum followed closely behind it.";
        let post = BulletFormatter::default().format(text, "June 1, 2025").unwrap();

        assert_eq!(post.title, DEFAULT_TITLE);
    }

    #[test]
    fn test_single_line_keeps_default_title() {
        let post = BulletFormatter::default()
            .format(SAMPLE, "June 1, 2025")
            .unwrap();
        assert_eq!(post.title, DEFAULT_TITLE);
    }

    // ==================== Bullet Band Tests ====================

    #[test]
    fn test_excess_bullets_are_dropped() {
        let text = (1..=10)
            .map(|i| {
                format!(
                    "Observation number {} from the trading desks: flows stayed two-way, spreads were tight and order books remained deep for most of the session.",
                    i
                )
            })
            .collect::<Vec<_>>()
            .join(" ");
        let post = BulletFormatter::default().format(&text, "June 1, 2025").unwrap();

        assert_eq!(post.bullets.len(), 6);
        assert!(post.bullets[0].contains("Observation number 1 "));
        assert!(post.bullets[5].contains("Observation number 6 "));
        assert_in_window(&post);
    }

    #[test]
    fn test_typical_answers_stay_in_band_and_window() {
        let sentences = [
            "Bitcoin climbed 2.4% to trade near $67,800 as spot ETF inflows resumed after a quiet start to the week.",
            "Ethereum held above $3,500 while staking deposits rose and layer-2 activity reached a new monthly high.",
            "Solana outperformed large caps with an 8% gain, helped by rising decentralized exchange volumes on the network.",
            "Spot ETF products recorded combined net inflows of roughly $420 million, led by the largest issuers.",
            "Stablecoin supply expanded for a third straight week, signalling fresh capital waiting on the sidelines.",
            "Market sentiment improved to greed territory, though analysts warned that leverage is building in futures.",
        ];

        let formatter = BulletFormatter::default();
        for count in 4..=sentences.len() {
            let text = sentences[..count].join(" ");
            let post = formatter.format(&text, "June 1, 2025").unwrap();

            assert!(
                (4..=6).contains(&post.bullets.len()),
                "{} sentences gave {} bullets",
                count,
                post.bullets.len()
            );
            assert_in_window(&post);
            for (bullet, sentence) in post.bullets.iter().zip(&sentences[..count]) {
                assert!(bullet.starts_with(&format!("{}{}", BULLET_MARKER, sentence)));
            }
        }
    }

    #[test]
    fn test_full_band_is_padded_by_extending_bullets() {
        let text = ["one", "two", "three", "four", "five", "six", "seven"]
            .iter()
            .map(|n| format!("Desk note {} reported steady two-way flows.", n))
            .collect::<Vec<_>>()
            .join(" ");
        let post = BulletFormatter::default().format(&text, "June 1, 2025").unwrap();

        assert_eq!(post.bullets.len(), 6);
        assert!(post.bullets[0].starts_with("• Desk note one reported steady two-way flows. "));
        assert!(post.bullets.iter().all(|b| b.chars().count() <= 280));
        assert!(!post.rendered_text.contains("Desk note seven"));
        assert_in_window(&post);
    }

    #[test]
    fn test_duplicate_enhancements_are_skipped() {
        let text = "Bitcoin is up today. BTC looks strong now. Bitcoin buyers stepped in.";
        let post = BulletFormatter::default().format(text, "June 1, 2025").unwrap();

        let btc = post
            .bullets
            .iter()
            .filter(|b| b.contains("Bitcoin holds its role"))
            .count();
        assert_eq!(btc, 1);
    }

    // ==================== Truncation Tests ====================

    #[test]
    fn test_truncation_keeps_three_survivors() {
        let formatter = BulletFormatter::default();
        let bullets: Vec<String> = (0..5)
            .map(|i| format!("• {}", format!("item{} ", i).repeat(40)))
            .collect();

        let kept = formatter.truncate_to_budget(bullets, 400).unwrap();

        assert!(kept.len() >= 3);
        assert!(block_len(&kept) <= 400);
        assert!(kept.last().unwrap().ends_with(ELLIPSIS));
    }

    #[test]
    fn test_truncation_keeps_whole_bullets_that_fit() {
        let formatter = BulletFormatter::default();
        let bullets = vec![
            format!("• {}", "a".repeat(98)),
            format!("• {}", "b".repeat(98)),
            format!("• {}", "c".repeat(98)),
            format!("• {}", "d".repeat(98)),
        ];

        let kept = formatter.truncate_to_budget(bullets.clone(), 350).unwrap();

        assert_eq!(&kept[..3], &bullets[..3]);
        assert_eq!(kept.len(), 4);
        assert!(kept[3].ends_with(ELLIPSIS));
        assert!(block_len(&kept) <= 350);
    }

    #[test]
    fn test_truncation_rejects_impossible_budget() {
        let formatter = BulletFormatter::default();
        let bullets = vec!["• one".to_string(), "• two".to_string(), "• three".to_string()];

        let err = formatter.truncate_to_budget(bullets, 20).unwrap_err();
        assert!(matches!(err, BotError::Formatting(_)));
    }

    // ==================== Helper Tests ====================

    #[test]
    fn test_split_sentences_ignores_decimals() {
        let units = split_sentences("BTC hit 67.5k today! Is ETH next? Maybe.");
        assert_eq!(units, vec!["BTC hit 67.5k today!", "Is ETH next?", "Maybe."]);
    }

    #[test]
    fn test_split_sentences_drops_list_markers() {
        let units = split_sentences("- First point here. 2) Second point here.");
        assert_eq!(units, vec!["First point here.", "Second point here."]);
    }

    #[test]
    fn test_shorten_prefers_word_boundary() {
        assert_eq!(shorten("alpha beta gamma delta", 13), "alpha beta…");
        assert_eq!(shorten("short", 10), "short");
    }

    #[test]
    fn test_shorten_hard_cuts_long_words() {
        let text = "x".repeat(100);
        let short = shorten(&text, 30);
        assert_eq!(short.chars().count(), 30);
        assert!(short.ends_with(ELLIPSIS));
    }

    #[test]
    fn test_enhance_matches_word_prefixes_only() {
        assert!(enhance(ENHANCEMENTS, "Altcoins mixed").is_some());
        assert!(enhance(ENHANCEMENTS, "Nothing whatsoever here").is_none());
    }

    #[test]
    fn test_invalid_config_is_a_formatting_error() {
        let config = FormatConfig {
            min_chars: 1000,
            max_chars: 900,
            ..FormatConfig::default()
        };
        let err = BulletFormatter::new(config).format(SAMPLE, "June 1, 2025").unwrap_err();
        assert!(matches!(err, BotError::Formatting(_)));
    }
}
