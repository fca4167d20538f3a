//! Registry of trades awaiting settlement, for status display.

use dashmap::DashMap;

/// A trade currently awaiting settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTrade {
    pub symbol: String,
    pub timeframe: String,
}

/// Thread-safe board of pending trades keyed by venue trade id.
#[derive(Debug, Default)]
pub struct PendingTradeBoard {
    pending: DashMap<String, PendingTrade>,
}

impl PendingTradeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, trade_id: impl Into<String>, symbol: &str, timeframe: &str) {
        self.pending.insert(
            trade_id.into(),
            PendingTrade {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            },
        );
    }

    /// Remove a settled trade. Returns whether it was present.
    pub fn unregister(&self, trade_id: &str) -> bool {
        self.pending.remove(trade_id).is_some()
    }

    /// Short human-readable summary: up to three "SYMBOL TF" entries plus a
    /// "+N" overflow marker. `None` when nothing is pending.
    pub fn summary(&self) -> Option<String> {
        let mut entries: Vec<(String, PendingTrade)> = self
            .pending
            .iter()
            .map(|item| (item.key().clone(), item.value().clone()))
            .collect();
        if entries.is_empty() {
            return None;
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let shown: Vec<String> = entries
            .iter()
            .take(3)
            .map(|(_, trade)| format!("{} {}", trade.symbol, trade.timeframe))
            .collect();
        let extra = entries.len().saturating_sub(shown.len());

        let mut text = shown.join(", ");
        if extra > 0 {
            text.push_str(&format!(" +{extra}"));
        }
        Some(text)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&self) {
        self.pending.clear();
    }
}
