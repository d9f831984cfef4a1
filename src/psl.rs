//! Public suffix matching.
//!
//! Rules are read from the line-oriented `public_suffix_list.dat` format:
//! `//` starts a comment, `!` marks an exception rule, `*` as the leftmost
//! label matches any single label, every other non-blank line is a suffix.
//!
//! ```
//! use reshelf::psl::PublicSuffixList;
//!
//! let psl = PublicSuffixList::parse("com\nuk\nco.uk\n");
//! assert_eq!(psl.registrable_domain("cdn.files.example.co.uk").as_deref(), Some("example.co.uk"));
//! assert_eq!(psl.registrable_domain("127.0.0.1"), None);
//! ```

use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};

static IPV4_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+){3}$").expect("valid IPv4 regex"));

/// Returns true for dotted-quad literals such as `10.0.0.1`.
pub fn is_ipv4_literal(host: &str) -> bool {
    IPV4_LITERAL.is_match(host)
}

/// An immutable public suffix rule set.
#[derive(Debug, Default, Clone)]
pub struct PublicSuffixList {
    rules: HashSet<String>,
    exceptions: HashSet<String>,
}

impl PublicSuffixList {
    /// Loads rules from a file. An unreadable file yields an empty rule set,
    /// which still resolves hosts through the two-label fallback.
    pub fn load(path: &Path) -> Self {
        match fs::read(path) {
            Ok(bytes) => {
                let list = Self::parse(&String::from_utf8_lossy(&bytes));
                debug!(
                    path = %path.display(),
                    rules = list.rules.len(),
                    exceptions = list.exceptions.len(),
                    "loaded public suffix list"
                );
                list
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "public suffix list unavailable");
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Self {
        let mut list = Self::default();
        for line in content.lines() {
            let Some(token) = line.split_whitespace().next() else {
                continue;
            };
            if token.starts_with("//") {
                continue;
            }
            let token = token.trim_end_matches('.').to_lowercase();
            match token.strip_prefix('!') {
                Some(exception) if !exception.is_empty() => {
                    list.exceptions.insert(exception.to_string());
                }
                Some(_) => {}
                None if !token.is_empty() => {
                    list.rules.insert(token);
                }
                None => {}
            }
        }
        list
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.exceptions.is_empty()
    }

    /// Returns the registrable domain of `hostname`.
    ///
    /// Exception rules win over every ordinary rule. Among ordinary rules the
    /// one covering the most labels wins. Without any match the last two
    /// labels are used.
    pub fn registrable_domain(&self, hostname: &str) -> Option<String> {
        let lowered = hostname.trim().to_lowercase();
        let host = lowered.trim_end_matches('.');
        if host.is_empty() || is_ipv4_literal(host) || host.starts_with('[') || host.contains(':')
        {
            return None;
        }

        let labels: Vec<&str> = host.split('.').collect();
        let count = labels.len();

        // Smallest start index is the longest suffix, so the first hit wins.
        for start in 1..count {
            if self.exceptions.contains(&labels[start..].join(".")) {
                let keep = count - start + 1;
                return Some(labels[count - keep..].join("."));
            }
        }

        let matched = (0..count)
            .find(|&start| self.matches_rule(&labels[start..]))
            .map(|start| count - start);

        match matched {
            Some(rule_len) if count > rule_len => Some(labels[count - rule_len - 1..].join(".")),
            Some(_) => Some(host.to_string()),
            None if count >= 2 => Some(labels[count - 2..].join(".")),
            None => None,
        }
    }

    fn matches_rule(&self, suffix: &[&str]) -> bool {
        if self.rules.contains(&suffix.join(".")) {
            return true;
        }
        suffix.len() >= 2 && self.rules.contains(&format!("*.{}", suffix[1..].join(".")))
    }
}
