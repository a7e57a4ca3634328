//! Link extraction from tweet JSON.
//!
//! [`links_of`] turns one tweet object (streaming or search API, v1.1 shape)
//! into one [`TweetLink`] row per shared URL. URLs in a retweeted or quoted
//! status are reported too, tagged with the [`TweetType`] they came from.
//!
//! ```
//! use expander_core::tweet::{TweetType, links_of};
//! use serde_json::json;
//!
//! let tweet = json!({
//!     "id": 1, "created_at": "Mon Jan 01 00:00:00 +0000 2018",
//!     "user": {"id": 7}, "text": "read this https://t.co/x",
//!     "entities": {"urls": [{"url": "https://t.co/x", "expanded_url": "https://nyti.ms/2abc"}]}
//! });
//! let links = links_of(&tweet);
//! assert_eq!(links.len(), 1);
//! assert_eq!(links[0].tweet_type, TweetType::Original);
//! assert_eq!(links[0].link_domain.to_string(), "nyti.ms");
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::domain::{Domain, domain_of};

/// Where in the tweet a link was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TweetType {
    /// The tweet's own entities.
    #[serde(rename = "OG")]
    Original,
    /// The entities of the retweeted status.
    #[serde(rename = "RT")]
    Retweet,
    /// The entities of the quoted status.
    #[serde(rename = "Q")]
    Quote,
}

/// One shared link, with the metadata of the tweet that carried it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TweetLink {
    /// Author of the outer tweet.
    pub user_id: u64,
    /// ID of the outer tweet.
    pub tweet_id: u64,
    /// Creation time as the API rendered it.
    pub tweet_created_at: String,
    /// Full text of the outer tweet, if any.
    pub tweet_text: Option<String>,
    /// Which status the link came from.
    pub tweet_type: TweetType,
    /// The expanded URL as Twitter reported it (possibly still a short link).
    pub link_url_long: String,
    /// The `t.co` wrapper URL.
    pub link_url_short: Option<String>,
    /// Registrable domain of `link_url_long`.
    pub link_domain: Domain,
}

#[derive(Deserialize)]
struct RawTweet {
    id: u64,
    created_at: String,
    user: RawUser,
    text: Option<String>,
    full_text: Option<String>,
    extended_tweet: Option<RawExtended>,
    #[serde(default)]
    entities: RawEntities,
    retweeted_status: Option<RawStatus>,
    quoted_status: Option<RawStatus>,
}

#[derive(Deserialize)]
struct RawUser {
    id: u64,
}

#[derive(Deserialize)]
struct RawExtended {
    full_text: Option<String>,
}

#[derive(Deserialize)]
struct RawStatus {
    #[serde(default)]
    entities: RawEntities,
}

#[derive(Deserialize, Default)]
struct RawEntities {
    #[serde(default)]
    urls: Option<Vec<RawUrl>>,
}

#[derive(Deserialize)]
struct RawUrl {
    url: Option<String>,
    expanded_url: Option<String>,
}

impl RawTweet {
    /// `extended_tweet.full_text`, then `full_text`, then `text`.
    fn full_text(&self) -> Option<String> {
        self.extended_tweet
            .as_ref()
            .and_then(|extended| extended.full_text.clone())
            .or_else(|| self.full_text.clone())
            .or_else(|| self.text.clone())
    }
}

/// Returns one row per link in `tweet`, in the order own, retweeted, quoted.
///
/// Anything that is not a tweet object with `id`, `created_at` and `user.id`
/// yields no rows. URL entities without an expanded URL are skipped.
#[must_use]
pub fn links_of(tweet: &Value) -> Vec<TweetLink> {
    let raw = match RawTweet::deserialize(tweet) {
        Ok(raw) => raw,
        Err(error) => {
            debug!(error = %error, "not a tweet object; no links extracted");
            return Vec::new();
        }
    };

    let tweet_text = raw.full_text();
    let sources = [
        (TweetType::Original, Some(&raw.entities)),
        (
            TweetType::Retweet,
            raw.retweeted_status.as_ref().map(|status| &status.entities),
        ),
        (
            TweetType::Quote,
            raw.quoted_status.as_ref().map(|status| &status.entities),
        ),
    ];

    let mut links = Vec::new();
    for (tweet_type, entities) in sources {
        let Some(urls) = entities.and_then(|entities| entities.urls.as_ref()) else {
            continue;
        };
        for url in urls {
            let Some(long) = url.expanded_url.as_deref().filter(|long| !long.is_empty()) else {
                continue;
            };
            links.push(TweetLink {
                user_id: raw.user.id,
                tweet_id: raw.id,
                tweet_created_at: raw.created_at.clone(),
                tweet_text: tweet_text.clone(),
                tweet_type,
                link_url_long: long.to_string(),
                link_url_short: url.url.clone(),
                link_domain: domain_of(long),
            });
        }
    }
    links
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn tweet(extra: Value) -> Value {
        let mut base = json!({
            "id": 950_000_000_000_000_001_u64,
            "created_at": "Sun Dec 31 23:59:59 +0000 2017",
            "user": {"id": 42},
            "text": "short text",
            "entities": {"urls": [{
                "url": "https://t.co/own",
                "expanded_url": "https://www.nytimes.com/2017/12/31/a.html"
            }]}
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            for (key, value) in extra {
                base.insert(key.clone(), value.clone());
            }
        }
        base
    }

    #[test]
    fn test_original_link_row() {
        let links = links_of(&tweet(json!({})));
        assert_eq!(
            links,
            vec![TweetLink {
                user_id: 42,
                tweet_id: 950_000_000_000_000_001,
                tweet_created_at: "Sun Dec 31 23:59:59 +0000 2017".to_string(),
                tweet_text: Some("short text".to_string()),
                tweet_type: TweetType::Original,
                link_url_long: "https://www.nytimes.com/2017/12/31/a.html".to_string(),
                link_url_short: Some("https://t.co/own".to_string()),
                link_domain: Domain::Name("nytimes.com".to_string()),
            }]
        );
    }

    #[test]
    fn test_text_prefers_extended_tweet_then_full_text() {
        let extended = tweet(json!({
            "full_text": "full",
            "extended_tweet": {"full_text": "extended full"}
        }));
        assert_eq!(links_of(&extended)[0].tweet_text.as_deref(), Some("extended full"));

        let full = tweet(json!({"full_text": "full"}));
        assert_eq!(links_of(&full)[0].tweet_text.as_deref(), Some("full"));

        let no_extended_text = tweet(json!({"extended_tweet": {}}));
        assert_eq!(links_of(&no_extended_text)[0].tweet_text.as_deref(), Some("short text"));
    }

    #[test]
    fn test_retweet_and_quote_links_are_tagged() {
        let links = links_of(&tweet(json!({
            "retweeted_status": {"entities": {"urls": [
                {"url": "https://t.co/rt", "expanded_url": "https://bit.ly/2rt"}
            ]}},
            "quoted_status": {"entities": {"urls": [
                {"url": "https://t.co/q", "expanded_url": "http://news.bbc.co.uk/q"},
                {"url": "https://t.co/none", "expanded_url": null}
            ]}}
        })));

        let kinds: Vec<TweetType> = links.iter().map(|link| link.tweet_type).collect();
        assert_eq!(
            kinds,
            vec![TweetType::Original, TweetType::Retweet, TweetType::Quote]
        );
        assert_eq!(links[1].link_domain, Domain::Name("bit.ly".to_string()));
        assert_eq!(links[2].link_domain, Domain::Name("bbc.co.uk".to_string()));
        assert_eq!(links[2].link_url_short.as_deref(), Some("https://t.co/q"));
        assert!(links.iter().all(|link| link.tweet_id == 950_000_000_000_000_001));
    }

    #[test]
    fn test_missing_metadata_yields_nothing() {
        assert!(links_of(&json!({"text": "no ids", "entities": {"urls": []}})).is_empty());
        assert!(links_of(&json!("not an object")).is_empty());
    }

    #[test]
    fn test_tweet_without_urls_yields_nothing() {
        let bare = tweet(json!({"entities": {"urls": []}}));
        assert!(links_of(&bare).is_empty());
        let no_entities = tweet(json!({"entities": {}}));
        assert!(links_of(&no_entities).is_empty());
    }

    #[test]
    fn test_tweet_type_serializes_as_short_codes() {
        assert_eq!(serde_json::to_string(&TweetType::Original).unwrap(), "\"OG\"");
        assert_eq!(serde_json::to_string(&TweetType::Retweet).unwrap(), "\"RT\"");
        assert_eq!(serde_json::to_string(&TweetType::Quote).unwrap(), "\"Q\"");
    }
}
