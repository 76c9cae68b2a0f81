//! The `Link` record and its ordering.

use std::cmp::Ordering;

use freshtab_common::LinkError;
use serde::{Deserialize, Serialize};

/// A visited-site record as delivered by the history source.
///
/// Fields are optional because records cross an untyped boundary; the
/// comparator treats a missing `url`, `frecency`, or `last_visit_date` as
/// an upstream data bug and errors rather than inventing an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Combined frequency+recency ranking score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frecency: Option<i64>,
    /// Microseconds since the epoch, host-assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_visit_date: Option<i64>,
}

impl Link {
    pub fn new(url: &str, frecency: i64, last_visit_date: i64) -> Self {
        Self {
            url: Some(url.to_string()),
            title: None,
            frecency: Some(frecency),
            last_visit_date: Some(last_visit_date),
        }
    }
}

struct ValidLink<'a> {
    url: &'a str,
    frecency: i64,
    last_visit_date: i64,
}

fn validate(link: &Link) -> Result<ValidLink<'_>, LinkError> {
    let url = link
        .url
        .as_deref()
        .ok_or(LinkError::MissingField { field: "url" })?;
    let frecency = link
        .frecency
        .ok_or(LinkError::MissingField { field: "frecency" })?;
    let last_visit_date = link.last_visit_date.ok_or(LinkError::MissingField {
        field: "lastVisitDate",
    })?;
    Ok(ValidLink {
        url,
        frecency,
        last_visit_date,
    })
}

/// Three-way comparison placing more recently visited links first.
///
/// Ties on `last_visit_date` break on `frecency` descending, then `url`
/// ascending, so a full sort is deterministic.
///
/// Errors if either record lacks `url`, `frecency`, or `last_visit_date`,
/// regardless of argument order. Callers must not swallow the error; a
/// malformed record indicates a bug in the upstream data source.
pub fn compare_links(a: &Link, b: &Link) -> Result<Ordering, LinkError> {
    let a = validate(a)?;
    let b = validate(b)?;

    Ok(b.last_visit_date
        .cmp(&a.last_visit_date)
        .then(b.frecency.cmp(&a.frecency))
        .then(a.url.cmp(b.url)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(url: &str, frecency: i64, last_visit_date: i64) -> Link {
        Link {
            url: Some(url.to_string()),
            title: Some("Example".to_string()),
            frecency: Some(frecency),
            last_visit_date: Some(last_visit_date),
        }
    }

    #[test]
    fn newer_sorts_first() {
        let older = fixture("http://example.org/older", 1337, 1_394_678_824_766_431);
        let newer = fixture("http://example.org/newer", 1337, 1_494_678_824_766_431);

        assert_eq!(compare_links(&newer, &older).unwrap(), Ordering::Less);
        assert_eq!(compare_links(&older, &newer).unwrap(), Ordering::Greater);
    }

    #[test]
    fn positive_when_second_argument_is_newer() {
        let a = fixture("a", 1, 100);
        let b = fixture("b", 1, 200);
        // b is newer, so it sorts first and a compares greater.
        assert_eq!(compare_links(&a, &b).unwrap(), Ordering::Greater);
    }

    #[test]
    fn identity_compares_equal() {
        let link = fixture("http://example.org/", 1337, 1_394_678_824_766_431);
        assert_eq!(compare_links(&link, &link).unwrap(), Ordering::Equal);
    }

    #[test]
    fn date_tie_breaks_on_frecency_then_url() {
        let base = fixture("http://example.org/older", 1337, 1_394_678_824_766_431);
        let more_frecent = fixture("http://example.org/zzz", 1_337_357, 1_394_678_824_766_431);
        // Higher frecency wins the date tie despite the later url.
        assert_eq!(compare_links(&more_frecent, &base).unwrap(), Ordering::Less);

        let first = fixture("http://example.org/a", 1337, 1_394_678_824_766_431);
        // Full tie falls back to url order.
        assert_eq!(compare_links(&first, &base).unwrap(), Ordering::Less);
    }

    #[test]
    fn missing_fields_error_in_either_position() {
        let good = fixture("http://example.org/", 1337, 1_394_678_824_766_431);

        let missing_frecency = Link {
            frecency: None,
            ..good.clone()
        };
        let missing_date = Link {
            last_visit_date: None,
            ..good.clone()
        };
        let missing_url = Link {
            url: None,
            ..good.clone()
        };

        for bad in [&missing_frecency, &missing_date, &missing_url] {
            assert!(compare_links(&good, bad).is_err());
            assert!(compare_links(bad, &good).is_err());
        }
        assert!(compare_links(&missing_frecency, &missing_date).is_err());
    }

    #[test]
    fn missing_field_error_names_the_field() {
        let bad = Link {
            url: Some("http://example.org/".into()),
            title: None,
            frecency: Some(1),
            last_visit_date: None,
        };
        let good = Link::new("http://example.org/x", 1, 2);
        let err = compare_links(&good, &bad).unwrap_err();
        assert_eq!(
            err.to_string(),
            "link record missing required field 'lastVisitDate'"
        );
    }

    #[test]
    fn wire_format_uses_camel_case() {
        let link: Link = serde_json::from_str(
            r#"{"url":"http://example.org/","frecency":3,"lastVisitDate":100}"#,
        )
        .unwrap();
        assert_eq!(link.last_visit_date, Some(100));
        assert_eq!(link.title, None);
    }
}
