//! Link safety heuristics for decoded URLs

use serde::{Deserialize, Serialize};
use url::{Host, Url};

const DANGEROUS_SCHEMES: &[&str] = &["javascript", "data", "file", "vbscript"];

const SHORTENERS: &[&str] = &[
    "bit.ly",
    "tinyurl.com",
    "t.co",
    "goo.gl",
    "ow.ly",
    "is.gd",
    "buff.ly",
    "cutt.ly",
    "rebrand.ly",
    "shorturl.at",
    "tiny.cc",
];

const SUSPICIOUS_TLDS: &[&str] = &[
    "zip", "mov", "xyz", "top", "tk", "ml", "ga", "cf", "gq", "work", "click", "country", "kim",
    "loan",
];

const MAX_SUBDOMAIN_LABELS: usize = 4;
const MAX_URL_LENGTH: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Safe,
    Suspicious,
    Dangerous,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum LinkFinding {
    Unparseable(String),
    DangerousScheme(String),
    InsecureScheme,
    IpAddressHost(String),
    Punycode(String),
    EmbeddedCredentials,
    Shortener(String),
    SuspiciousTld(String),
    DeepSubdomains(usize),
    ExcessiveLength(usize),
    NonStandardPort(u16),
}

impl LinkFinding {
    pub fn severity(&self) -> Verdict {
        match self {
            LinkFinding::DangerousScheme(_) | LinkFinding::EmbeddedCredentials => Verdict::Dangerous,
            _ => Verdict::Suspicious,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkReport {
    pub url: String,
    pub verdict: Verdict,
    pub findings: Vec<LinkFinding>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LinkInspector;

impl LinkInspector {
    pub fn new() -> Self {
        Self
    }

    pub fn inspect(&self, link: &str) -> LinkReport {
        let link = link.trim();
        let candidate = if link.to_ascii_lowercase().starts_with("www.") {
            format!("https://{}", link)
        } else {
            link.to_string()
        };

        let findings = match Url::parse(&candidate) {
            Ok(url) => self.examine(&url, candidate.len()),
            Err(e) => vec![LinkFinding::Unparseable(e.to_string())],
        };

        let verdict = findings
            .iter()
            .map(LinkFinding::severity)
            .max()
            .unwrap_or(Verdict::Safe);

        if verdict != Verdict::Safe {
            log::info!("Link check: {} is {:?} ({} findings)", candidate, verdict, findings.len());
        }

        LinkReport {
            url: candidate,
            verdict,
            findings,
        }
    }

    fn examine(&self, url: &Url, length: usize) -> Vec<LinkFinding> {
        let mut findings = Vec::new();
        let scheme = url.scheme();

        if DANGEROUS_SCHEMES.contains(&scheme) {
            findings.push(LinkFinding::DangerousScheme(scheme.to_string()));
            return findings;
        }
        if scheme == "http" {
            findings.push(LinkFinding::InsecureScheme);
        }
        if !url.username().is_empty() || url.password().is_some() {
            findings.push(LinkFinding::EmbeddedCredentials);
        }

        match url.host() {
            Some(Host::Ipv4(ip)) => findings.push(LinkFinding::IpAddressHost(ip.to_string())),
            Some(Host::Ipv6(ip)) => findings.push(LinkFinding::IpAddressHost(ip.to_string())),
            Some(Host::Domain(domain)) => self.examine_domain(domain, &mut findings),
            None => {}
        }

        if let Some(port) = url.port() {
            findings.push(LinkFinding::NonStandardPort(port));
        }
        if length > MAX_URL_LENGTH {
            findings.push(LinkFinding::ExcessiveLength(length));
        }

        findings
    }

    fn examine_domain(&self, domain: &str, findings: &mut Vec<LinkFinding>) {
        let domain = domain.trim_end_matches('.').to_ascii_lowercase();
        let labels: Vec<&str> = domain.split('.').collect();

        if labels.iter().any(|label| label.starts_with("xn--")) {
            findings.push(LinkFinding::Punycode(domain.clone()));
        }

        let bare = domain.strip_prefix("www.").unwrap_or(&domain);
        if SHORTENERS.contains(&bare) {
            findings.push(LinkFinding::Shortener(bare.to_string()));
        }

        if let Some(tld) = labels.last() {
            if SUSPICIOUS_TLDS.contains(tld) {
                findings.push(LinkFinding::SuspiciousTld(tld.to_string()));
            }
        }

        if labels.len() > MAX_SUBDOMAIN_LABELS {
            findings.push(LinkFinding::DeepSubdomains(labels.len()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inspect(link: &str) -> LinkReport {
        LinkInspector::new().inspect(link)
    }

    #[test]
    fn test_plain_https_is_safe() {
        let report = inspect("https://www.example.com/path?query=value");
        assert_eq!(report.verdict, Verdict::Safe);
        assert!(report.findings.is_empty());
    }

    #[test]
    fn test_bare_www_gets_scheme() {
        let report = inspect("www.example.com");
        assert_eq!(report.url, "https://www.example.com");
        assert_eq!(report.verdict, Verdict::Safe);
    }

    #[test]
    fn test_dangerous_schemes() {
        for link in ["javascript:alert(1)", "data:text/html,<b>x</b>", "file:///etc/passwd"] {
            assert_eq!(inspect(link).verdict, Verdict::Dangerous, "{}", link);
        }
    }

    #[test]
    fn test_credentials_are_dangerous() {
        let report = inspect("https://paypal.com@evil.example/login");
        assert!(report.findings.contains(&LinkFinding::EmbeddedCredentials));
        assert_eq!(report.verdict, Verdict::Dangerous);
    }

    #[test]
    fn test_suspicious_signals() {
        let report = inspect("http://192.168.1.10:8080/admin");
        assert_eq!(report.verdict, Verdict::Suspicious);
        assert!(report.findings.contains(&LinkFinding::InsecureScheme));
        assert!(report
            .findings
            .contains(&LinkFinding::IpAddressHost("192.168.1.10".into())));
        assert!(report.findings.contains(&LinkFinding::NonStandardPort(8080)));

        assert!(inspect("https://bit.ly/abc")
            .findings
            .contains(&LinkFinding::Shortener("bit.ly".into())));
        assert!(inspect("https://prize.xyz")
            .findings
            .contains(&LinkFinding::SuspiciousTld("xyz".into())));
        assert!(inspect("https://a.b.c.d.example.com")
            .findings
            .contains(&LinkFinding::DeepSubdomains(6)));
    }

    #[test]
    fn test_idn_host_is_flagged_as_punycode() {
        let report = inspect("https://аpple.com");
        assert!(matches!(report.findings[0], LinkFinding::Punycode(_)));
    }

    #[test]
    fn test_garbage_is_suspicious() {
        let report = inspect("not a url");
        assert_eq!(report.verdict, Verdict::Suspicious);
        assert!(matches!(report.findings[0], LinkFinding::Unparseable(_)));
    }
}
