//! Treatments turn a fetched body into a cached payload and its expiry.
//!
//! A treatment pairs a [`Reduction`] (what to keep of the body) with an
//! [`ExpiryPolicy`] (how long to keep it). Applying a treatment either yields
//! both, or fails with [`Error::Classification`] and yields nothing.

pub mod lifetime;
pub mod trim;

use chrono::{DateTime, Utc};
use pagecache_core::Error;
use rand::Rng;
use regex::Regex;
use std::time::Duration;

pub use lifetime::{academic_rollover, academic_year, expiry_after, jittered_lifetime};
pub use trim::{clean_html, extract_section};

/// How long a treated payload stays valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpiryPolicy {
    /// Exponentially jittered lifetime with this half-life.
    HalfLife(Duration),
    /// Valid until `month`/`day` after the current academic year ends.
    AcademicYearRollover { month: u32, day: u32 },
    /// Valid until a fixed instant.
    Until(DateTime<Utc>),
}

impl ExpiryPolicy {
    /// Compute the expiry for a payload written at `now`.
    pub fn expiry<R: Rng + ?Sized>(&self, now: DateTime<Utc>, rng: &mut R) -> Result<DateTime<Utc>, Error> {
        match self {
            ExpiryPolicy::HalfLife(half_life) => Ok(expiry_after(now, jittered_lifetime(*half_life, rng))),
            ExpiryPolicy::AcademicYearRollover { month, day } => academic_rollover(now, *month, *day)
                .ok_or_else(|| Error::Classification(format!("invalid rollover date {month:02}-{day:02}"))),
            ExpiryPolicy::Until(at) => Ok(*at),
        }
    }
}

/// What part of a fetched body is kept.
#[derive(Debug, Clone)]
pub enum Reduction {
    /// The whole document, cleaned of scripts, styles and comments.
    Clean,
    /// A single element by id, cleaned, minus the descendants in `drop`.
    ///
    /// When `marker` is set and the cleaned document does not match it, the
    /// page is not of the expected kind and is kept whole instead. When the
    /// marker matches but `keep` is missing, the page is malformed and the
    /// reduction fails.
    Section { keep: String, drop: Vec<String>, marker: Option<Regex> },
}

impl Reduction {
    pub fn section(keep: impl Into<String>) -> Self {
        Reduction::Section { keep: keep.into(), drop: Vec::new(), marker: None }
    }

    /// Reduce `raw` to its payload.
    pub fn reduce(&self, raw: &str) -> Result<String, Error> {
        let cleaned = clean_html(raw)?;
        match self {
            Reduction::Clean => Ok(cleaned),
            Reduction::Section { keep, drop, marker } => {
                if let Some(marker) = marker
                    && !marker.is_match(&cleaned)
                {
                    tracing::debug!(section = %keep, "marker absent, keeping whole page");
                    return Ok(cleaned);
                }

                extract_section(&cleaned, keep, drop)?
                    .ok_or_else(|| Error::Classification(format!("expected section #{keep} not found")))
            }
        }
    }
}

/// The outcome of applying a treatment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Treated {
    pub payload: String,
    pub expiry: DateTime<Utc>,
}

/// A reduction together with an expiry policy.
#[derive(Debug, Clone)]
pub struct Treatment {
    pub reduction: Reduction,
    pub expiry: ExpiryPolicy,
}

impl Treatment {
    pub fn new(reduction: Reduction, expiry: ExpiryPolicy) -> Self {
        Self { reduction, expiry }
    }

    /// Clean the whole page and expire it on a jittered half-life.
    pub fn half_life(half_life: Duration) -> Self {
        Self::new(Reduction::Clean, ExpiryPolicy::HalfLife(half_life))
    }

    /// Apply the treatment to a fetched body.
    ///
    /// Deterministic for the same `raw`, `now` and rng state. The rng is only
    /// consulted once the reduction has succeeded.
    pub fn apply<R: Rng + ?Sized>(&self, raw: &str, now: DateTime<Utc>, rng: &mut R) -> Result<Treated, Error> {
        let payload = self.reduction.reduce(raw)?;
        let expiry = self.expiry.expiry(now, rng)?;
        Ok(Treated { payload, expiry })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use crate::classify::{Classifier, Matcher};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    const PAGE: &str = r#"<html><head><script>x()</script></head><body>
        <div id="envolvente"><div id="colunaprincipal">nav</div><p>2019/2020</p></div>
        <div id="conteudo"><p>Teacher</p></div>
    </body></html>"#;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_classified_key_gets_seeded_expiry() {
        let classifier = Classifier::new(Treatment::half_life(2 * DAY)).with_rule(
            "units",
            Matcher::Prefix("unit/".into()),
            Treatment::half_life(30 * DAY),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let treated = classifier.classify("unit/123").treatment.apply(PAGE, now(), &mut rng).unwrap();

        // first draw of this seed is u = 0.68189..., about 49.57 days
        let expected = Utc.with_ymd_and_hms(2024, 4, 20, 1, 44, 59).unwrap() + TimeDelta::milliseconds(736);
        assert_eq!(treated.expiry, expected);
    }

    #[test]
    fn test_half_life_expiry_bounds() {
        let treatment = Treatment::half_life(DAY);
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        for _ in 0..500 {
            let treated = treatment.apply("<p>x</p>", now(), &mut rng).unwrap();
            let ttl = treated.expiry - now();
            assert!(ttl >= TimeDelta::zero());
            assert!(ttl <= TimeDelta::days(4));
        }
    }

    #[test]
    fn test_rollover_expiry() {
        let treatment = Treatment::new(Reduction::Clean, ExpiryPolicy::AcademicYearRollover { month: 9, day: 20 });
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let treated = treatment.apply(PAGE, now(), &mut rng).unwrap();
        assert_eq!(treated.expiry, Utc.with_ymd_and_hms(2024, 9, 20, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_rollover_invalid_date_fails() {
        let policy = ExpiryPolicy::AcademicYearRollover { month: 13, day: 1 };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(matches!(policy.expiry(now(), &mut rng), Err(Error::Classification(_))));
    }

    #[test]
    fn test_until_expiry() {
        let at = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(ExpiryPolicy::Until(at).expiry(now(), &mut rng).unwrap(), at);
    }

    #[test]
    fn test_clean_reduction() {
        let payload = Reduction::Clean.reduce(PAGE).unwrap();
        assert!(!payload.contains("<script"));
        assert!(payload.contains("Teacher"));
    }

    #[test]
    fn test_section_reduction() {
        let payload = Reduction::section("conteudo").reduce(PAGE).unwrap();
        assert!(payload.contains("Teacher"));
        assert!(!payload.contains("2019/2020"));
    }

    #[test]
    fn test_section_missing_is_classification_error() {
        let result = Reduction::section("conteudo-extra").reduce(PAGE);
        assert!(matches!(result, Err(Error::Classification(_))));
    }

    #[test]
    fn test_section_marker_present_trims() {
        let reduction = Reduction::Section {
            keep: "envolvente".into(),
            drop: vec!["colunaprincipal".into()],
            marker: Some(Regex::new(r"\d{4}/\d{4}").unwrap()),
        };
        let payload = reduction.reduce(PAGE).unwrap();
        assert!(payload.contains("2019/2020"));
        assert!(!payload.contains("nav"));
        assert!(!payload.contains("Teacher"));
    }

    #[test]
    fn test_section_marker_absent_keeps_page() {
        let reduction = Reduction::Section {
            keep: "envolvente".into(),
            drop: vec![],
            marker: Some(Regex::new(r"\d{4}/\d{4}").unwrap()),
        };
        let page = "<html><body><div id=\"other\">Foreign faculty</div></body></html>";

        let payload = reduction.reduce(page).unwrap();
        assert!(payload.contains("Foreign faculty"));
    }

    #[test]
    fn test_failed_reduction_leaves_rng_untouched() {
        let treatment = Treatment::new(Reduction::section("missing"), ExpiryPolicy::HalfLife(DAY));
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let before = rng.clone();

        assert!(treatment.apply(PAGE, now(), &mut rng).is_err());
        assert_eq!(rng, before);
    }
}
