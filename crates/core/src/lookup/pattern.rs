use crate::error::Result;
use regex::Regex;

/// Compiled FQN wildcard pattern. `*` matches any run of characters,
/// including dots and the empty string.
#[derive(Debug, Clone)]
pub enum FqnPattern {
    Exact(String),
    PrefixSuffix { prefix: String, suffix: String },
    Wildcard { prefix: String, regex: Regex },
}

impl FqnPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let stars = pattern.matches('*').count();
        Ok(match stars {
            0 => FqnPattern::Exact(pattern.to_string()),
            1 => {
                let (prefix, suffix) = pattern.split_once('*').unwrap_or((pattern, ""));
                FqnPattern::PrefixSuffix {
                    prefix: prefix.to_string(),
                    suffix: suffix.to_string(),
                }
            }
            _ => {
                let prefix = pattern.split('*').next().unwrap_or_default().to_string();
                let body = pattern
                    .split('*')
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(".*");
                FqnPattern::Wildcard {
                    prefix,
                    regex: Regex::new(&format!("^{body}$"))?,
                }
            }
        })
    }

    /// Literal part before the first `*`; used for the index range scan.
    pub fn prefix(&self) -> &str {
        match self {
            FqnPattern::Exact(fqn) => fqn,
            FqnPattern::PrefixSuffix { prefix, .. } | FqnPattern::Wildcard { prefix, .. } => prefix,
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, FqnPattern::Exact(_))
    }

    pub fn matches(&self, fqn: &str) -> bool {
        match self {
            FqnPattern::Exact(expected) => fqn == expected,
            FqnPattern::PrefixSuffix { prefix, suffix } => {
                fqn.len() >= prefix.len() + suffix.len()
                    && fqn.starts_with(prefix.as_str())
                    && fqn.ends_with(suffix.as_str())
            }
            FqnPattern::Wildcard { regex, .. } => regex.is_match(fqn),
        }
    }
}
