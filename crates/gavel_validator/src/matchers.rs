//! Shared matching policies used by filters and terms.
//!
//! These are the three comparison building blocks contracts configure over
//! and over: pattern lists, count windows and string equality policies.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

/// A value that may be given as a single string or a list of strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    /// Flattens into a vector.
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::None => Vec::new(),
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

/// Include/exclude pattern matching over names and paths.
///
/// Patterns are regular expressions anchored at the start of the value. With
/// no include patterns, every value is included. When `match_all` is set, all
/// include patterns must match and all exclude patterns must fail to match;
/// otherwise one matching include (and no matching exclude) suffices.
#[derive(Debug, Clone, Default)]
pub struct PatternMatcher {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    match_all: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PatternArgs {
    #[serde(default)]
    include: OneOrMany,
    #[serde(default)]
    exclude: OneOrMany,
    #[serde(default)]
    match_all: bool,
}

/// Compiles a pattern, anchoring it at the start of the value.
pub(crate) fn compile_anchored(pattern: &str) -> Result<Regex, String> {
    Regex::new(&format!("^(?:{pattern})"))
        .map_err(|e| format!("invalid pattern '{pattern}': {e}"))
}

impl PatternMatcher {
    /// Builds a matcher from raw rule arguments, compiling every pattern.
    pub fn from_args(args: Option<&Value>) -> Result<Self, String> {
        let args: PatternArgs = match args {
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| e.to_string())?,
            None => PatternArgs::default(),
        };
        Self::from_patterns(
            args.include.into_vec(),
            args.exclude.into_vec(),
            args.match_all,
        )
    }

    /// Builds a matcher from pattern strings.
    pub fn from_patterns(
        include: Vec<String>,
        exclude: Vec<String>,
        match_all: bool,
    ) -> Result<Self, String> {
        Ok(Self {
            include: include
                .iter()
                .map(|p| compile_anchored(p))
                .collect::<Result<_, _>>()?,
            exclude: exclude
                .iter()
                .map(|p| compile_anchored(p))
                .collect::<Result<_, _>>()?,
            match_all,
        })
    }

    /// Whether `value` passes the include/exclude policy.
    pub fn matches(&self, value: &str) -> bool {
        if self.match_all {
            return self.include.iter().all(|p| p.is_match(value))
                && self.exclude.iter().all(|p| !p.is_match(value));
        }

        if self.exclude.iter().any(|p| p.is_match(value)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|p| p.is_match(value))
    }
}

/// An inclusive `[min_count, max_count]` window over an observed count.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeMatcher {
    /// The minimum count allowed
    #[serde(default = "default_min_count")]
    pub min_count: usize,

    /// The maximum count allowed; absent means unbounded
    #[serde(default)]
    pub max_count: Option<usize>,
}

fn default_min_count() -> usize {
    1
}

impl Default for RangeMatcher {
    fn default() -> Self {
        Self {
            min_count: 1,
            max_count: None,
        }
    }
}

impl RangeMatcher {
    /// Builds a matcher from raw rule arguments.
    ///
    /// `min_floor` is the smallest acceptable `min_count` and its default:
    /// 1 for cardinality checks, 0 for dependency checks where an absent
    /// window only validates edge targets.
    pub fn from_args(args: Option<&Value>, min_floor: usize) -> Result<Self, String> {
        let mut matcher: Self = match args {
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| e.to_string())?,
            None => Self::default(),
        };
        if args.map(|v| v.get("min_count").is_none()).unwrap_or(true) {
            matcher.min_count = min_floor;
        }
        if matcher.min_count < min_floor {
            return Err(format!(
                "min_count must be >= {min_floor}, got {}",
                matcher.min_count
            ));
        }
        if let Some(max) = matcher.max_count {
            if max < matcher.min_count {
                return Err(format!(
                    "max_count must be >= min_count, got {max} < {}",
                    matcher.min_count
                ));
            }
        }
        Ok(matcher)
    }

    /// Whether `count` falls inside the window.
    pub fn contains(&self, count: usize) -> bool {
        count >= self.min_count && self.max_count.map(|max| count <= max).unwrap_or(true)
    }

    /// Failure message for an out-of-window count, `None` when in range.
    pub fn mismatch(&self, kind: &str, count: usize) -> Option<String> {
        if count < self.min_count {
            Some(format!(
                "Too few {kind} found: {count}. Expected: {}.",
                self.min_count
            ))
        } else if self.max_count.is_some_and(|max| count > max) {
            Some(format!(
                "Too many {kind} found: {count}. Expected: {}.",
                self.max_count.unwrap()
            ))
        } else {
            None
        }
    }
}

/// Text equality with configurable whitespace, case and prefix policies.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StringMatcher {
    /// Ignore any whitespace when comparing
    #[serde(default)]
    pub ignore_whitespace: bool,

    /// Compare case-insensitively
    #[serde(default)]
    pub case_insensitive: bool,

    /// Match when one value is a prefix of the other
    #[serde(default)]
    pub compare_start_only: bool,
}

impl StringMatcher {
    /// Builds a matcher from raw rule arguments.
    pub fn from_args(args: Option<&Value>) -> Result<Self, String> {
        match args {
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| e.to_string()),
            None => Ok(Self::default()),
        }
    }

    /// Whether the two values match under the configured policy.
    ///
    /// Two empty/absent values match; an empty value never matches a
    /// non-empty one.
    pub fn matches(&self, actual: Option<&str>, expected: Option<&str>) -> bool {
        let (actual, expected) = match (actual, expected) {
            (Some(a), Some(e)) if !a.is_empty() && !e.is_empty() => (a, e),
            (a, e) => {
                return a.map(str::is_empty).unwrap_or(true) && e.map(str::is_empty).unwrap_or(true);
            }
        };

        let mut actual = actual.to_string();
        let mut expected = expected.to_string();
        if self.ignore_whitespace {
            actual.retain(|c| !c.is_whitespace());
            expected.retain(|c| !c.is_whitespace());
        }
        if self.case_insensitive {
            actual = actual.to_lowercase();
            expected = expected.to_lowercase();
        }

        if self.compare_start_only {
            expected.starts_with(&actual) || actual.starts_with(&expected)
        } else {
            actual == expected
        }
    }
}
