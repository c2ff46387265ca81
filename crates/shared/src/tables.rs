//! Static lookup tables used by the formatter and the image selector.
//!
//! Keeping these out of the code paths means the formatter stays a pure
//! function over its inputs and the tables can be swapped in tests.

use crate::models::ImageCategory;

pub const DEFAULT_TITLE: &str = "🚀 Crypto Market Update";
pub const BULLET_MARKER: &str = "• ";
pub const HASHTAG_LINE: &str = "#CryptoNews #MarketOverview";

/// Replacement for a short bullet whose text mentions one of `keywords`
#[derive(Debug, Clone, Copy)]
pub struct EnhancementRule {
    pub keywords: &'static [&'static str],
    pub replacement: &'static str,
}

// Checked in order, first keyword hit wins
pub const ENHANCEMENTS: &[EnhancementRule] = &[
    EnhancementRule {
        keywords: &["bitcoin", "btc"],
        replacement: "Bitcoin holds its role as the market bellwether, with price action around key support and resistance levels shaping risk appetite across the wider digital asset space.",
    },
    EnhancementRule {
        keywords: &["ethereum", "eth"],
        replacement: "Ethereum network development keeps moving forward, as upgrades, staking activity and layer-2 growth continue to drive interest from both developers and investors.",
    },
    EnhancementRule {
        keywords: &["altcoin", "solana", "xrp", "cardano"],
        replacement: "Major altcoins show mixed performance, with capital rotating between large-cap projects as traders weigh network fundamentals against short-term momentum.",
    },
    EnhancementRule {
        keywords: &["sentiment", "fear", "greed", "mood"],
        replacement: "Overall market sentiment remains balanced, with investors watching macroeconomic signals and on-chain data closely before committing to larger positions.",
    },
    EnhancementRule {
        keywords: &["regulat", "policy", "law"],
        replacement: "Regulatory developments stay in focus, as policymakers in several jurisdictions refine frameworks that could shape how digital assets are traded and held.",
    },
    EnhancementRule {
        keywords: &["institution", "etf", "fund"],
        replacement: "Institutional participation continues to build, with fund flows and custody offerings signalling steady long-term interest from professional investors.",
    },
    EnhancementRule {
        keywords: &["defi", "stablecoin", "yield"],
        replacement: "Decentralized finance and stablecoin activity remain resilient, as on-chain lending, liquidity pools and payment use cases keep attracting fresh capital.",
    },
    EnhancementRule {
        keywords: &["volume", "trading", "liquidity"],
        replacement: "Trading volumes across major exchanges point to active participation, with liquidity concentrated in leading pairs as traders position for the next move.",
    },
];

/// Stock bullets used to reach the minimum bullet count and length budget
pub const GENERIC_BULLETS: &[&str] = &[
    "Market participants continue to track price action across leading digital assets, with volatility staying within recent ranges as traders look for a clear directional signal.",
    "Institutional adoption trends remain a key theme, as asset managers, payment firms and public companies expand their exposure to blockchain-based products and services.",
    "Regulatory headlines continue to influence short-term moves, with market watchers following guidance from major financial authorities on custody, trading and disclosure rules.",
    "On-chain metrics such as active addresses, exchange balances and network fees offer additional context on how holders are positioning during the current market phase.",
    "Developer activity across smart contract platforms stays robust, with new protocol upgrades and scaling solutions aimed at lowering costs and improving user experience.",
    "Macroeconomic factors including interest rate expectations and equity market performance continue to shape risk appetite across the cryptocurrency landscape.",
    "Stablecoin supply and settlement volumes remain important liquidity gauges, reflecting how much capital is parked on the sidelines ready to move into the market.",
    "Long-term holders appear largely unmoved by daily swings, suggesting conviction remains steady even as short-term traders react quickly to every new headline.",
    "The derivatives market offers further signals, as funding rates and open interest show how leveraged traders are positioned heading into the next trading sessions.",
    "Analysts recommend a measured approach for investors, emphasizing research, diversification and risk management while the market digests recent developments.",
];

/// Stock paragraph used when the content API yields nothing usable
pub fn fallback_summary(date: &str) -> String {
    format!(
        "Crypto markets continue to evolve on {}. Bitcoin maintains its position as the leading digital asset while Ethereum shows ongoing development activity. Major altcoins display mixed performance as the market navigates current economic conditions. Traders remain watchful of regulatory developments and institutional adoption trends affecting the broader cryptocurrency landscape.",
        date
    )
}

/// A named group of image URL templates.
///
/// `{sig}` in a template is replaced with a slice of the content digest so
/// each post gets its own URL.
#[derive(Debug, Clone, Copy)]
pub struct ImageGroup {
    pub category: ImageCategory,
    pub templates: &'static [&'static str],
}

pub const IMAGE_CATALOG: &[ImageGroup] = &[
    ImageGroup {
        category: ImageCategory::Bitcoin,
        templates: &[
            "https://images.unsplash.com/photo-1518546305927-5a555bb7020d?w=1200&h=800&fit=crop&sig={sig}",
            "https://images.unsplash.com/photo-1621761191319-c6fb62004040?w=1200&h=800&fit=crop&sig={sig}",
            "https://images.unsplash.com/photo-1605792657660-596af9009e82?w=1200&h=800&fit=crop&sig={sig}",
            "https://images.unsplash.com/photo-1592496431122-2349e0fbc666?w=1200&h=800&fit=crop&sig={sig}",
        ],
    },
    ImageGroup {
        category: ImageCategory::Ethereum,
        templates: &[
            "https://images.unsplash.com/photo-1622630998477-20aa696ecb05?w=1200&h=800&fit=crop&sig={sig}",
            "https://images.unsplash.com/photo-1621504450181-5d356f61d307?w=1200&h=800&fit=crop&sig={sig}",
            "https://images.unsplash.com/photo-1644143379190-08a5f055de1d?w=1200&h=800&fit=crop&sig={sig}",
        ],
    },
    ImageGroup {
        category: ImageCategory::Trading,
        templates: &[
            "https://images.unsplash.com/photo-1611974789855-9c2a0a7236a3?w=1200&h=800&fit=crop&sig={sig}",
            "https://images.unsplash.com/photo-1642790106117-e829e14a795f?w=1200&h=800&fit=crop&sig={sig}",
            "https://images.unsplash.com/photo-1640340434855-6084b1f4901c?w=1200&h=800&fit=crop&sig={sig}",
            "https://images.unsplash.com/photo-1590283603385-17ffb3a7f29f?w=1200&h=800&fit=crop&sig={sig}",
        ],
    },
    ImageGroup {
        category: ImageCategory::Blockchain,
        templates: &[
            "https://images.unsplash.com/photo-1639762681485-074b7f938ba0?w=1200&h=800&fit=crop&sig={sig}",
            "https://images.unsplash.com/photo-1639322537228-f710d846310a?w=1200&h=800&fit=crop&sig={sig}",
            "https://images.unsplash.com/photo-1558494949-ef010cbdcc31?w=1200&h=800&fit=crop&sig={sig}",
        ],
    },
];

/// Known-good images used once probing has been exhausted
pub const FALLBACK_IMAGES: &[&str] = &[
    "https://images.unsplash.com/photo-1640340434855-6084b1f4901c?w=1200&h=800&fit=crop",
    "https://images.unsplash.com/photo-1518546305927-5a555bb7020d?w=1200&h=800&fit=crop",
    "https://images.unsplash.com/photo-1611974789855-9c2a0a7236a3?w=1200&h=800&fit=crop",
];

/// Last-resort URL, parametrized so it still varies per post
pub const PLACEHOLDER_TEMPLATE: &str = "https://picsum.photos/seed/{sig}/1200/800";
