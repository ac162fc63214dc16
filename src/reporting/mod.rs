//! Reporting Engine (C7, spec §4.7): builds the hourly/live digest for a
//! single subscriber from its tracked symbols' persisted liquidations.
//! Window selection, per-symbol aggregation, live-window prior scaling,
//! and section rendering order all follow §4.7 exactly.

use crate::format::{format_signed_pct, format_usd};
use crate::market_data::Aggregator;
use crate::models::{LiquidationEvent, Subscriber};
use crate::storage::Storage;
use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

const NO_LIQUIDATIONS_SENTINEL: &str = "No liquidations recorded in this window.";

/// Per-symbol `(long, short)` notional sums over one window.
type SideTotals = HashMap<String, (f64, f64)>;

pub struct ReportGenerator {
    storage: Arc<dyn Storage>,
    aggregator: Arc<Aggregator>,
    universe: &'static [&'static str],
}

impl ReportGenerator {
    pub fn new(storage: Arc<dyn Storage>, aggregator: Arc<Aggregator>, universe: &'static [&'static str]) -> Self {
        Self {
            storage,
            aggregator,
            universe,
        }
    }

    pub async fn generate_report(
        &self,
        subscriber: &Subscriber,
        interval_hours: u32,
        scheduled: bool,
    ) -> Option<String> {
        let now = Utc::now();
        let window = ChronoDuration::hours(interval_hours as i64);

        let (current_start, current_end, prior_start, prior_end, scale) = if scheduled {
            (now - window, now, now - window * 2, now - window, None)
        } else {
            let start_of_hour = start_of_current_hour(now);
            let minutes_elapsed = (now - start_of_hour).num_seconds() as f64 / 60.0;
            let scale = minutes_elapsed / (interval_hours as f64 * 60.0);
            (start_of_hour, now, start_of_hour - window, start_of_hour, Some(scale))
        };

        let current = self
            .window_totals(&subscriber.tracked_symbols, current_start, current_end)
            .await;
        if current.is_empty() {
            return Some(NO_LIQUIDATIONS_SENTINEL.to_string());
        }

        let mut prior = self
            .window_totals(&subscriber.tracked_symbols, prior_start, prior_end)
            .await;
        if let Some(scale) = scale {
            for totals in prior.values_mut() {
                totals.0 *= scale;
                totals.1 *= scale;
            }
        }

        let funding = self.funding_map().await;

        let longs = render_side_section("\u{1F534} LONGS LIQUIDATED", &current, &prior, true, &funding);
        let shorts = render_side_section("\u{1F7E2} SHORTS LIQUIDATED", &current, &prior, false, &funding);

        if longs.is_none() && shorts.is_none() {
            return None;
        }

        let mut sections = Vec::new();
        sections.push(title_line(interval_hours, scheduled));

        let mut long_subtotal = 0.0;
        let mut short_subtotal = 0.0;
        if let Some((text, subtotal)) = &longs {
            sections.push(text.clone());
            long_subtotal = *subtotal;
        }
        if let Some((text, subtotal)) = &shorts {
            sections.push(text.clone());
            short_subtotal = *subtotal;
        }

        sections.push(format!(
            "Longs subtotal: {}\nShorts subtotal: {}\n*TOTAL: {}*",
            format_usd(long_subtotal),
            format_usd(short_subtotal),
            format_usd(long_subtotal + short_subtotal),
        ));

        if let Some(rank) = render_top_rank(&current) {
            sections.push(rank);
        }

        Some(sections.join("\n\n"))
    }

    async fn window_totals(&self, symbols: &[String], start: DateTime<Utc>, end: DateTime<Utc>) -> SideTotals {
        let mut totals = SideTotals::new();
        for symbol in symbols {
            let events = self
                .storage
                .get_liquidations_between(symbol, start, end)
                .await
                .unwrap_or_default();
            let (long, short) = sum_sides(&events);
            if long > 0.0 || short > 0.0 {
                totals.insert(symbol.clone(), (long, short));
            }
        }
        totals
    }

    /// Best-effort (spec §4.7: "funding-map lookup is best-effort; on
    /// failure, omit funding suffixes").
    async fn funding_map(&self) -> HashMap<String, f64> {
        self.aggregator
            .top_funding_ranking(self.universe)
            .await
            .into_iter()
            .collect()
    }
}

fn sum_sides(events: &[LiquidationEvent]) -> (f64, f64) {
    let mut long = 0.0;
    let mut short = 0.0;
    for event in events {
        match event.side {
            crate::models::Side::LongLiquidated => long += event.notional(),
            crate::models::Side::ShortLiquidated => short += event.notional(),
        }
    }
    (long, short)
}

fn start_of_current_hour(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(now.hour(), 0, 0)
        .expect("valid hour component")
        .and_utc()
}

fn trend_arrow(current: f64, prior: f64) -> &'static str {
    match current.partial_cmp(&prior) {
        Some(Ordering::Greater) => "\u{2B06}",
        Some(Ordering::Less) => "\u{2B07}",
        _ => "",
    }
}

fn title_line(interval_hours: u32, scheduled: bool) -> String {
    if scheduled {
        format!("\u{1F4CA} *{interval_hours}H LIQUIDATION REPORT*")
    } else {
        format!("\u{1F4CA} *LIVE REPORT (last {interval_hours}h)*")
    }
}

fn render_side_section(
    header: &str,
    current: &SideTotals,
    prior: &SideTotals,
    is_long: bool,
    funding: &HashMap<String, f64>,
) -> Option<(String, f64)> {
    let mut symbols: Vec<&String> = current.keys().collect();
    symbols.sort();

    let mut lines = Vec::new();
    let mut subtotal = 0.0;
    for symbol in symbols {
        let (cur_long, cur_short) = current[symbol];
        let value = if is_long { cur_long } else { cur_short };
        if value <= 0.0 {
            continue;
        }
        subtotal += value;

        let (prior_long, prior_short) = prior.get(symbol).copied().unwrap_or((0.0, 0.0));
        let prior_value = if is_long { prior_long } else { prior_short };
        let arrow = trend_arrow(value, prior_value);
        let arrow_suffix = if arrow.is_empty() { String::new() } else { format!(" {arrow}") };
        let funding_suffix = funding
            .get(symbol.as_str())
            .map(|rate| format!(" (funding {}%)", format_signed_pct(*rate)))
            .unwrap_or_default();

        lines.push(format!("{symbol}: {}{arrow_suffix}{funding_suffix}", format_usd(value)));
    }

    if lines.is_empty() {
        return None;
    }
    Some((format!("*{header}*\n{}", lines.join("\n")), subtotal))
}

fn render_top_rank(current: &SideTotals) -> Option<String> {
    let long_rank = top_n(current, true);
    let short_rank = top_n(current, false);
    if long_rank.is_empty() && short_rank.is_empty() {
        return None;
    }

    const MEDALS: [&str; 3] = ["\u{1F947}", "\u{1F948}", "\u{1F949}"];
    let mut lines = vec!["*Top rekted rank*".to_string()];
    for (medal, (symbol, value)) in MEDALS.iter().zip(long_rank.iter()) {
        lines.push(format!("{medal} {symbol} (long): {}", format_usd(*value)));
    }
    for (medal, (symbol, value)) in MEDALS.iter().zip(short_rank.iter()) {
        lines.push(format!("{medal} {symbol} (short): {}", format_usd(*value)));
    }
    Some(lines.join("\n"))
}

fn top_n(current: &SideTotals, is_long: bool) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = current
        .iter()
        .map(|(symbol, (long, short))| (symbol.clone(), if is_long { *long } else { *short }))
        .filter(|(_, value)| *value > 0.0)
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    ranked.truncate(3);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::models::Side;
    use crate::storage::InMemoryStorage;
    use chrono::Duration;

    fn event(symbol: &str, side: Side, notional: f64, secs_ago: i64) -> LiquidationEvent {
        LiquidationEvent::new(symbol, side, notional, 1.0, Utc::now() - Duration::seconds(secs_ago)).unwrap()
    }

    fn subscriber(symbols: &[&str]) -> Subscriber {
        let mut sub = Subscriber::new_default(1, None, None);
        sub.tracked_symbols = symbols.iter().map(|s| s.to_string()).collect();
        sub
    }

    #[tokio::test]
    async fn no_liquidations_returns_sentinel() {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let cache: Arc<dyn crate::cache::Cache> = Arc::new(InMemoryCache::new());
        let aggregator = Arc::new(Aggregator::new(cache).unwrap());
        let report_generator = ReportGenerator::new(storage, aggregator, &["BTCUSDT"]);

        let sub = subscriber(&["BTCUSDT"]);
        let report = report_generator.generate_report(&sub, 4, true).await.unwrap();
        assert_eq!(report, NO_LIQUIDATIONS_SENTINEL);
    }

    /// Spec §8 S6: prior[1h,2h) long=1000, current[0,1h) long=500 at the
    /// scheduled top of the hour => ⬇ next to the symbol, shorts section
    /// omitted since current.short=0.
    #[tokio::test]
    async fn hourly_digest_trend_matches_spec_s6() {
        let storage = Arc::new(InMemoryStorage::new());
        // current window [now-1h, now)
        storage
            .save_liquidation(&event("XUSDT", Side::LongLiquidated, 500_000.0, 60))
            .await
            .unwrap();
        // prior window [now-2h, now-1h)
        storage
            .save_liquidation(&event("XUSDT", Side::LongLiquidated, 1_000_000.0, 90 * 60))
            .await
            .unwrap();

        let cache: Arc<dyn crate::cache::Cache> = Arc::new(InMemoryCache::new());
        let aggregator = Arc::new(Aggregator::new(cache).unwrap());
        let report_generator = ReportGenerator::new(storage, aggregator, &["XUSDT"]);

        let sub = subscriber(&["XUSDT"]);
        let report = report_generator.generate_report(&sub, 1, true).await.unwrap();

        assert!(report.contains("LONGS LIQUIDATED"));
        assert!(report.contains("XUSDT: $500k \u{2B07}"));
        assert!(!report.contains("SHORTS LIQUIDATED"));
        assert!(report.contains("Longs subtotal: $500k"));
    }

    /// Spec §8 invariant 8: calling generateReport twice over a frozen
    /// event set yields identical output.
    #[tokio::test]
    async fn report_round_trip_is_stable() {
        let storage = Arc::new(InMemoryStorage::new());
        storage
            .save_liquidation(&event("BTCUSDT", Side::LongLiquidated, 60_000.0, 30))
            .await
            .unwrap();
        storage
            .save_liquidation(&event("BTCUSDT", Side::ShortLiquidated, 20_000.0, 20))
            .await
            .unwrap();

        let cache: Arc<dyn crate::cache::Cache> = Arc::new(InMemoryCache::new());
        let aggregator = Arc::new(Aggregator::new(cache).unwrap());
        let report_generator = ReportGenerator::new(storage, aggregator, &["BTCUSDT"]);
        let sub = subscriber(&["BTCUSDT"]);

        let first = report_generator.generate_report(&sub, 1, true).await;
        let second = report_generator.generate_report(&sub, 1, true).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn top_rank_uses_medals_for_top_three_per_side() {
        let storage = Arc::new(InMemoryStorage::new());
        for (symbol, notional) in [("A", 100_000.0), ("B", 80_000.0), ("C", 60_000.0), ("D", 40_000.0)] {
            storage
                .save_liquidation(&event(symbol, Side::LongLiquidated, notional, 10))
                .await
                .unwrap();
        }
        let cache: Arc<dyn crate::cache::Cache> = Arc::new(InMemoryCache::new());
        let aggregator = Arc::new(Aggregator::new(cache).unwrap());
        let report_generator = ReportGenerator::new(storage, aggregator, &["A"]);
        let sub = subscriber(&["A", "B", "C", "D"]);

        let report = report_generator.generate_report(&sub, 1, true).await.unwrap();
        assert!(report.contains("Top rekted rank"));
        assert!(report.contains("\u{1F947} A (long)"));
        assert!(report.contains("\u{1F948} B (long)"));
        assert!(report.contains("\u{1F949} C (long)"));
        assert!(!report.contains("D (long)"));
    }
}
