//! Built-in shortener, ad-redirect and link-appender domain lists.

use std::collections::HashSet;

/// Ad-supported redirectors that interpose an interstitial page.
///
/// Resolving one of these with a plain request usually lands on the ad page,
/// so the resolver hands them to the brute-force unshortener instead.
pub const AD_REDIRECT_DOMAINS: &[&str] = &[
    "sh.st",
    "adf.ly",
    "lnx.lu",
    "adfoc.us",
    "j.gs",
    "q.gs",
    "u.bb",
    "ay.gy",
    "atominik.com",
    "tinyium.com",
    "microify.com",
    "linkbucks.com",
    "www.linkbucks.com",
    "jzrputtbut.net",
    "any.gs",
    "cash4links.co",
    "cache4files.co",
    "dyo.gs",
    "filesonthe.net",
    "goneviral.com",
    "megaline.co",
    "miniurls.co",
    "qqc.co",
    "seriousdeals.net",
    "theseblogs.com",
    "theseforums.com",
    "tinylinks.co",
    "tubeviral.com",
    "ultrafiles.net",
    "urlbeat.net",
    "whackyvidz.com",
    "yyv.co",
    "href.li",
    "anonymz.com",
    "festyy.com",
    "ceesty.com",
    "tiny.cc",
];

/// Classic link shorteners.
pub const SHORTENER_DOMAINS: &[&str] = &[
    "dlvr.it",
    "bit.ly",
    "buff.ly",
    "ow.ly",
    "goo.gl",
    "shar.es",
    "ift.tt",
    "fb.me",
    "washex.am",
    "smq.tc",
    "trib.al",
    "is.gd",
    "paper.li",
    "waa.ai",
    "tinyurl.com",
    "ht.ly",
    "1.usa.gov",
    "deck.ly",
    "bit.do",
    "lc.chat",
    "urls.tn",
    "soo.gd",
    "s2r.co",
    "clicky.me",
    "budurl.com",
    "bc.vc",
    "branch.io",
    "capsulink.com",
    "ux9.de",
    "fuck.it",
    "t2m.io",
    "shrt.li",
    "elbo.in",
    "shrtfly.com",
    "hiveam.com",
    "slink.be",
    "plu.sh",
    "cutt.ly",
    "zii.bz",
    "munj.pw",
    "t.co",
    "go.usa.gov",
    "on.fb.me",
    "j.mp",
    "amp.twimg.com",
    "ofa.bo",
    "apne.ws",
];

/// Shorteners operated by news organizations for their own articles.
pub const MEDIA_SHORTENER_DOMAINS: &[&str] = &[
    "on.rt.com",
    "wapo.st",
    "hill.cm",
    "dailym.ai",
    "cnn.it",
    "nyti.ms",
    "politi.co",
    "fxn.ws",
    "usat.ly",
    "huff.to",
    "nyp.st",
    "cbsloc.al",
    "wpo.st",
    "on.wsj.com",
    "nydn.us",
    "abcn.ws",
    "cbsn.ws",
    "cnb.cx",
    "reut.rs",
    "hann.it",
    "cs.pn",
];

/// Services that wrap a target URL by prepending their own host to it.
pub const LINK_APPENDER_DOMAINS: &[&str] = &["ln.is", "linkis.com"];

/// Post-processing decision taken after a primary resolution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostProcess<'a> {
    /// Keep the resolved URL and domain as they are.
    Accept,
    /// Remove the appender host from the resolved URL and reclassify it.
    StripAppender(&'a str),
    /// Hand the original URL to the brute-force unshortener.
    Unshorten,
}

/// The configurable domain lists consulted during resolution and filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainLists {
    /// Classic link shorteners.
    pub shorteners: HashSet<String>,
    /// Ad-supported redirectors.
    pub ad_redirects: HashSet<String>,
    /// News-organization shorteners.
    pub media_shorteners: HashSet<String>,
    /// Host-prepending wrappers.
    pub link_appenders: HashSet<String>,
}

impl Default for DomainLists {
    fn default() -> Self {
        Self {
            shorteners: to_set(SHORTENER_DOMAINS),
            ad_redirects: to_set(AD_REDIRECT_DOMAINS),
            media_shorteners: to_set(MEDIA_SHORTENER_DOMAINS),
            link_appenders: to_set(LINK_APPENDER_DOMAINS),
        }
    }
}

impl DomainLists {
    /// Creates lists with no entries at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            shorteners: HashSet::new(),
            ad_redirects: HashSet::new(),
            media_shorteners: HashSet::new(),
            link_appenders: HashSet::new(),
        }
    }

    /// Adds a link-appender domain.
    #[must_use]
    pub fn with_link_appender(mut self, domain: impl Into<String>) -> Self {
        self.link_appenders.insert(domain.into().to_lowercase());
        self
    }

    /// Adds an ad-redirect domain.
    #[must_use]
    pub fn with_ad_redirect(mut self, domain: impl Into<String>) -> Self {
        self.ad_redirects.insert(domain.into().to_lowercase());
        self
    }

    /// Adds a shortener domain.
    #[must_use]
    pub fn with_shortener(mut self, domain: impl Into<String>) -> Self {
        self.shorteners.insert(domain.into().to_lowercase());
        self
    }

    /// Union of ad redirects, shorteners and link appenders.
    ///
    /// This is the set used when filtering input down to links worth resolving.
    #[must_use]
    pub fn all_short_domains(&self) -> HashSet<String> {
        self.ad_redirects
            .iter()
            .chain(&self.shorteners)
            .chain(&self.link_appenders)
            .cloned()
            .collect()
    }

    /// Returns true if `domain` is a link appender.
    #[must_use]
    pub fn is_link_appender(&self, domain: &str) -> bool {
        self.link_appenders.contains(domain)
    }

    /// Returns true if `domain` is an ad redirector.
    #[must_use]
    pub fn is_ad_redirect(&self, domain: &str) -> bool {
        self.ad_redirects.contains(domain)
    }

    /// Decides what to do with a primary resolution that produced `domain`.
    ///
    /// Appenders win over ad redirects when a domain sits in both lists.
    #[must_use]
    pub fn post_process_for<'a>(&self, domain: &'a super::Domain) -> PostProcess<'a> {
        match domain {
            super::Domain::Name(name) if self.is_link_appender(name) => {
                PostProcess::StripAppender(name)
            }
            super::Domain::Name(name) if self.is_ad_redirect(name) => PostProcess::Unshorten,
            super::Domain::Unknown => PostProcess::Unshorten,
            super::Domain::Name(_) | super::Domain::Unparsable => PostProcess::Accept,
        }
    }
}

fn to_set(domains: &[&str]) -> HashSet<String> {
    domains.iter().map(|domain| (*domain).to_string()).collect()
}
