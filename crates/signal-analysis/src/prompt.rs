//! Analysis prompt construction
//!
//! The prompt embeds the retrieved candidate stocks and the serialized news
//! block into a fixed template instructing the model to return only the JSON
//! shape the validator enforces. Candidate count and field rules are chosen
//! to bound prompt size and keep the output parseable.

use crate::error::Result;
use crate::types::NewsItem;
use minijinja::Environment;
use signal_universe::StockRecord;

/// Fixed analysis prompt template
///
/// The JSON example sits in a raw block so the braces survive rendering.
const ANALYSIS_TEMPLATE: &str = r#"Analyze news and identify trading signals. Map companies to these stocks:

{{ stock_universe }}

News:
{{ news_text }}

Return JSON with:
1. Trading signals (buy/sell) with confidence (0-1)
2. Matched companies to stocks
3. Key points and metrics

Format:
{% raw %}{
    "signals": [
        {
            "type": "buy/sell",
            "symbol": "STOCK_SYMBOL",
            "confidence": 0.0-1.0,
            "reason": "Brief explanation",
            "timestamp": "ISO8601 timestamp"
        }
    ],
    "news": [
        {
            "title": "Original title",
            "summary": "Brief summary",
            "content": "Full content",
            "publishedAt": "ISO8601 timestamp",
            "source": "Source name",
            "url": "URL",
            "tags": {
                "stocks": ["Stock symbols"],
                "matched_stocks": [
                    {
                        "symbol": "STOCK_SYMBOL",
                        "company_name": "COMPANY_NAME",
                        "industry": "INDUSTRY"
                    }
                ],
                "sentiment": "positive/negative/neutral",
                "impact": "high/medium/low",
                "key_points": ["Key points"],
                "financial_metrics": {
                    "revenue": "value if mentioned",
                    "profit": "value if mentioned",
                    "growth": "value if mentioned"
                }
            }
        }
    ]
}{% endraw %}

Rules:
1. Use exact stock symbols from the list
2. Include current timestamp for signals
3. Map all companies to stocks in the list
4. Provide confidence (0-1) for signals
5. Extract key metrics and points
6. Keep all text fields on a single line
7. Return only valid JSON"#;

/// Serialize news items into the compact text block fed to retrieval and
/// the prompt
pub fn render_news_block(items: &[NewsItem]) -> String {
    items
        .iter()
        .map(|item| {
            format!(
                "Title: {}\nDescription: {}\nPublished: {}\nSource: {}\nURL: {}",
                item.title,
                item.summary,
                item.published_at.to_rfc3339(),
                item.source,
                item.url
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render candidate stocks as "SYMBOL: company name" lines
///
/// Industry is deliberately omitted to save prompt tokens.
pub fn candidate_lines(stocks: &[StockRecord]) -> String {
    stocks
        .iter()
        .map(|s| format!("{}: {}", s.symbol, s.company_name))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the full analysis prompt from candidates and news text
pub fn build_analysis_prompt(stocks: &[StockRecord], news_text: &str) -> Result<String> {
    let env = Environment::new();
    let rendered = env.render_str(
        ANALYSIS_TEMPLATE,
        minijinja::context! {
            stock_universe => candidate_lines(stocks),
            news_text => news_text,
        },
    )?;
    Ok(rendered)
}
