//! Maps a file to a folder label derived from the site it was downloaded from.

use crate::provenance::{ProvenanceReader, ZoneIdentifierReader};
use crate::psl::{PublicSuffixList, is_ipv4_literal};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

static HOST_CHARSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9.\-]+$").expect("valid host regex"));

/// Accepts plain DNS names only: no IP literals, no `localhost`.
pub fn host_is_valid(host: &str) -> bool {
    HOST_CHARSET.is_match(host) && !is_ipv4_literal(host) && !host.eq_ignore_ascii_case("localhost")
}

/// Strips characters that are unsafe in folder names and capitalizes the
/// result (`"gitHUB"` becomes `"Github"`).
pub fn sanitize_folder_name(name: &str) -> Option<String> {
    let kept: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' '))
        .collect();
    let trimmed = kept.trim();
    if trimmed.chars().all(|c| c == '.') {
        return None;
    }

    let mut chars = trimmed.chars();
    let first = chars.next()?;
    Some(
        first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
    )
}

/// Combines a [`ProvenanceReader`] with a [`PublicSuffixList`].
pub struct DomainClassifier {
    psl: PublicSuffixList,
    reader: Box<dyn ProvenanceReader>,
}

impl DomainClassifier {
    pub fn new(psl: PublicSuffixList) -> Self {
        Self::with_reader(psl, ZoneIdentifierReader)
    }

    pub fn with_reader(psl: PublicSuffixList, reader: impl ProvenanceReader + 'static) -> Self {
        Self {
            psl,
            reader: Box::new(reader),
        }
    }

    /// Returns the brand label of the file's origin, e.g. `"Github"` for a file
    /// downloaded from `https://codeload.github.com/...`.
    pub fn classify(&self, file: &Path) -> Option<String> {
        let origin = self.reader.origin_url(file)?;
        let label = self.label_for_url(&origin);
        debug!(path = %file.display(), origin = %origin, label = ?label, "classified");
        label
    }

    /// Label for an origin URL, without touching the filesystem.
    pub fn label_for_url(&self, origin: &str) -> Option<String> {
        let url = Url::parse(origin).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        let host = url.host_str()?;
        if !host_is_valid(host) {
            return None;
        }

        let registrable = self.psl.registrable_domain(host)?;
        let labels: Vec<&str> = registrable.split('.').collect();
        if labels.len() < 2 {
            return None;
        }
        sanitize_folder_name(labels[labels.len() - 2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    struct MapReader(HashMap<PathBuf, String>);

    impl ProvenanceReader for MapReader {
        fn origin_url(&self, file: &Path) -> Option<String> {
            self.0.get(file).cloned()
        }
    }

    fn classifier() -> DomainClassifier {
        DomainClassifier::new(PublicSuffixList::parse("com\nuk\nco.uk\nio\ngithub.io\n"))
    }

    #[test]
    fn test_brand_label_from_registrable_domain() {
        let c = classifier();
        assert_eq!(
            c.label_for_url("https://dl.cdn.example.com/a.zip").as_deref(),
            Some("Example")
        );
        assert_eq!(
            c.label_for_url("http://www.GitHub.com/x").as_deref(),
            Some("Github")
        );
        assert_eq!(
            c.label_for_url("https://someone.github.io/file.pdf").as_deref(),
            Some("Github")
        );
    }

    #[test]
    fn test_brand_is_second_to_last_label_under_multi_label_suffix() {
        // The brand is taken literally from the registrable domain, so every
        // site under co.uk lands in the same folder.
        let c = classifier();
        for url in [
            "https://dl.cdn.example.co.uk/a.zip",
            "https://www.council.co.uk/minutes.pdf",
        ] {
            assert_eq!(c.label_for_url(url).as_deref(), Some("Co"), "{url}");
        }
        assert_eq!(
            c.label_for_url("https://www.gov.uk/form.pdf").as_deref(),
            Some("Gov")
        );
    }

    #[test]
    fn test_rejects_non_http_and_literals() {
        let c = classifier();
        assert_eq!(c.label_for_url("ftp://files.example.com/a"), None);
        assert_eq!(c.label_for_url("file:///C:/Users/a.txt"), None);
        assert_eq!(c.label_for_url("http://localhost:8080/a"), None);
        assert_eq!(c.label_for_url("http://10.0.0.5/a"), None);
        assert_eq!(c.label_for_url("http://[::1]/a"), None);
        assert_eq!(c.label_for_url("not a url"), None);
    }

    #[test]
    fn test_single_label_host_has_no_brand() {
        let c = classifier();
        assert_eq!(c.label_for_url("http://intranet/a"), None);
    }

    #[test]
    fn test_sanitize_folder_name() {
        assert_eq!(sanitize_folder_name("gitHUB").as_deref(), Some("Github"));
        assert_eq!(sanitize_folder_name("  my-site_1 ").as_deref(), Some("My-site_1"));
        assert_eq!(sanitize_folder_name("a/b\\c:d").as_deref(), Some("Abcd"));
        assert_eq!(sanitize_folder_name("???"), None);
        assert_eq!(sanitize_folder_name(".."), None);
        assert_eq!(sanitize_folder_name(""), None);
    }

    #[test]
    fn test_host_is_valid() {
        assert!(host_is_valid("cdn.example.com"));
        assert!(!host_is_valid("LOCALHOST"));
        assert!(!host_is_valid("127.0.0.1"));
        assert!(!host_is_valid("exa_mple.com"));
    }

    #[test]
    fn test_classify_reads_provenance() {
        let file = PathBuf::from("/downloads/report.pdf");
        let reader = MapReader(HashMap::from([(
            file.clone(),
            "https://static.example.com/report.pdf".to_string(),
        )]));
        let c = DomainClassifier::with_reader(PublicSuffixList::parse("com\n"), reader);

        assert_eq!(c.classify(&file).as_deref(), Some("Example"));
        assert_eq!(c.classify(Path::new("/downloads/other.pdf")), None);
    }
}
