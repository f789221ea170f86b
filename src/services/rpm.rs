// src/services/rpm.rs
use std::collections::HashMap;
use std::sync::OnceLock;

/// Niche key of the mandatory fallback row. Lookups are case-sensitive.
pub const GENERAL_NICHE: &str = "General";

/// RPM (USD per 1000 views) for one content niche, by format. Shorts
/// monetize roughly an order of magnitude below long-form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NicheRpmRate {
    pub long_form_rpm: f64,
    pub shorts_rpm: f64,
}

/// Immutable RPM reference table. Loaded once at startup, read-only after.
#[derive(Debug)]
pub struct NicheRpmTable {
    rates: HashMap<&'static str, NicheRpmRate>,
}

impl NicheRpmTable {
    fn new() -> Self {
        let mut rates = HashMap::new();
        let mut add = |niche, long_form_rpm, shorts_rpm| {
            rates.insert(niche, NicheRpmRate { long_form_rpm, shorts_rpm });
        };

        add(GENERAL_NICHE, 4.0, 0.10);
        add("finance", 22.0, 0.18);
        add("tech", 12.0, 0.15);
        add("education", 9.5, 0.12);
        add("business", 14.0, 0.15);
        add("health", 8.0, 0.12);
        add("travel", 7.0, 0.12);
        add("food", 6.0, 0.10);
        add("lifestyle", 5.5, 0.10);
        add("gaming", 4.5, 0.10);
        add("entertainment", 3.0, 0.08);
        add("music", 2.5, 0.08);

        Self { rates }
    }

    /// Process-wide table. Every value is non-negative and the
    /// [`GENERAL_NICHE`] row is always present.
    pub fn builtin() -> &'static NicheRpmTable {
        static TABLE: OnceLock<NicheRpmTable> = OnceLock::new();
        TABLE.get_or_init(NicheRpmTable::new)
    }

    /// RPM for a niche and format. Unknown niches fall back to the
    /// "General" row explicitly; this never fails.
    pub fn rate_for(&self, niche: &str, is_short: bool) -> f64 {
        let rate = match self.rates.get(niche) {
            Some(rate) => rate,
            None => &self.rates[GENERAL_NICHE],
        };
        if is_short {
            rate.shorts_rpm
        } else {
            rate.long_form_rpm
        }
    }

    pub fn known_niches(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rates.keys().copied()
    }
}
