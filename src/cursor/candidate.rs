use std::fmt;

/// A single domain name awaiting classification
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    text: String,
    tld: String,
}

impl Candidate {
    pub fn new(text: impl Into<String>, tld: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tld: tld.into(),
        }
    }

    /// Splits `name.tld` at the first dot
    pub fn parse(domain: &str) -> Option<Self> {
        let (text, tld) = domain.split_once('.')?;
        if text.is_empty() || tld.is_empty() {
            return None;
        }
        Some(Self::new(text.to_ascii_lowercase(), tld.to_ascii_lowercase()))
    }

    /// The label without its TLD
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tld(&self) -> &str {
        &self.tld
    }

    /// Label length in characters
    pub fn length(&self) -> u32 {
        self.text.chars().count() as u32
    }

    /// Fully qualified form, e.g. `abc.io`
    pub fn domain(&self) -> String {
        format!("{}.{}", self.text, self.tld)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.text, self.tld)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_and_length() {
        let candidate = Candidate::new("abc", "io");
        assert_eq!(candidate.domain(), "abc.io");
        assert_eq!(candidate.to_string(), "abc.io");
        assert_eq!(candidate.length(), 3);
    }

    #[test]
    fn test_parse() {
        let candidate = Candidate::parse("Google.COM").unwrap();
        assert_eq!(candidate.text(), "google");
        assert_eq!(candidate.tld(), "com");

        let nested = Candidate::parse("bbc.co.uk").unwrap();
        assert_eq!(nested.text(), "bbc");
        assert_eq!(nested.tld(), "co.uk");

        assert!(Candidate::parse("localhost").is_none());
        assert!(Candidate::parse(".io").is_none());
        assert!(Candidate::parse("abc.").is_none());
    }
}
