//! Key classification.
//!
//! A [`Classifier`] is an ordered rule table. Each rule pairs a [`Matcher`]
//! over the key with a [`Treatment`]; the first matching rule wins and keys
//! no rule matches get the fallback treatment.
//!
//! [`Classifier::standard`] builds the table for the known page classes in
//! [`ResourceClass`].

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::time::Duration;

use crate::treatment::{ExpiryPolicy, Reduction, Treatment};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Label reported for keys no rule matches.
pub const FALLBACK_LABEL: &str = "page";

/// Predicate over a key.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Key contains the substring.
    Contains(String),
    /// Key starts with the prefix.
    Prefix(String),
    /// Key matches the pattern anywhere.
    Pattern(Regex),
}

impl Matcher {
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Matcher::Contains(needle) => key.contains(needle.as_str()),
            Matcher::Prefix(prefix) => key.starts_with(prefix.as_str()),
            Matcher::Pattern(pattern) => pattern.is_match(key),
        }
    }
}

/// Page classes with dedicated treatments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    /// Curricular unit sheets. Past years practically never change.
    CurricularUnit,
    /// Staff profile pages.
    Teacher,
    /// Student course listings, refreshed once per academic year.
    Student,
}

impl ResourceClass {
    /// Priority order used by [`Classifier::standard`].
    pub const ALL: [ResourceClass; 3] = [ResourceClass::CurricularUnit, ResourceClass::Teacher, ResourceClass::Student];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceClass::CurricularUnit => "curricular_unit",
            ResourceClass::Teacher => "teacher",
            ResourceClass::Student => "student",
        }
    }

    /// The page-view name that identifies this class in a key.
    pub fn view(self) -> &'static str {
        match self {
            ResourceClass::CurricularUnit => "ucurr_geral.ficha_uc_view",
            ResourceClass::Teacher => "func_geral.formview",
            ResourceClass::Student => "fest_geral.cursos_list",
        }
    }

    pub fn matcher(self) -> Matcher {
        Matcher::Contains(self.view().to_string())
    }

    pub fn treatment(self) -> Treatment {
        match self {
            ResourceClass::CurricularUnit => Treatment::new(
                Reduction::Section {
                    keep: "envolvente".into(),
                    drop: vec!["colunaprincipal".into()],
                    marker: Some(ACADEMIC_YEAR.clone()),
                },
                ExpiryPolicy::HalfLife(180 * DAY),
            ),
            ResourceClass::Teacher => {
                Treatment::new(Reduction::section("conteudo"), ExpiryPolicy::HalfLife(60 * DAY))
            }
            ResourceClass::Student => Treatment::new(
                Reduction::section("conteudo-extra"),
                ExpiryPolicy::AcademicYearRollover { month: 9, day: 20 },
            ),
        }
    }
}

/// An academic year such as `2019/2020`.
static ACADEMIC_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}/\d{4}").unwrap());

/// One row of the classification table.
#[derive(Debug, Clone)]
pub struct Rule {
    pub label: Cow<'static, str>,
    pub matcher: Matcher,
    pub treatment: Treatment,
}

/// The selected treatment for a key.
#[derive(Debug, Clone, Copy)]
pub struct Classification<'a> {
    pub label: &'a str,
    pub treatment: &'a Treatment,
}

/// Ordered, first-match-wins classification table.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<Rule>,
    fallback: Treatment,
}

impl Classifier {
    /// An empty table that sends every key to `fallback`.
    pub fn new(fallback: Treatment) -> Self {
        Self { rules: Vec::new(), fallback }
    }

    /// The known page classes, falling back to a cleaned page with the given
    /// half-life.
    pub fn standard(default_half_life: Duration) -> Self {
        ResourceClass::ALL.into_iter().fold(
            Self::new(Treatment::half_life(default_half_life)),
            |classifier, class| classifier.with_rule(class.as_str(), class.matcher(), class.treatment()),
        )
    }

    /// Append a rule. Rules added earlier take priority.
    pub fn with_rule(mut self, label: impl Into<Cow<'static, str>>, matcher: Matcher, treatment: Treatment) -> Self {
        self.rules.push(Rule { label: label.into(), matcher, treatment });
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Select the treatment for `key`.
    pub fn classify(&self, key: &str) -> Classification<'_> {
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(key))
            .map(|rule| Classification { label: &rule.label, treatment: &rule.treatment })
            .unwrap_or(Classification { label: FALLBACK_LABEL, treatment: &self.fallback })
    }
}
