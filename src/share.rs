//! Selection <-> URL query codec.
//!
//! One grid is shared as `grid=<NAME>`, several as `grids=<A>,<B>,...` with
//! names sorted and the separating commas left unescaped.

use std::collections::HashSet;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::debug;
use url::Url;
use url::form_urlencoded;

pub const GRID_PARAM: &str = "grid";
pub const GRIDS_PARAM: &str = "grids";

/// Uppercases, trims, drops empties, de-duplicates and sorts.
pub fn normalize_names<S: AsRef<str>>(names: impl IntoIterator<Item = S>) -> Vec<String> {
    let mut out: Vec<String> = names
        .into_iter()
        .map(|n| n.as_ref().trim().to_uppercase())
        .filter(|n| !n.is_empty())
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Characters escaped in a query value: everything but `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Spaces become `%20`, never `+`.
fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Query string (without `?`) carrying `names`, keeping every unrelated
/// parameter of `existing` in place.
fn rebuild_query(existing: Option<&str>, names: &[String]) -> String {
    let mut parts: Vec<String> = existing
        .unwrap_or("")
        .split('&')
        .filter(|part| !part.is_empty())
        .filter(|part| {
            let key = part.split('=').next().unwrap_or("");
            let key: String = form_urlencoded::parse(format!("{key}=").as_bytes())
                .next()
                .map(|(k, _)| k.into_owned())
                .unwrap_or_default();
            key != GRID_PARAM && key != GRIDS_PARAM
        })
        .map(str::to_string)
        .collect();

    match names {
        [] => {}
        [single] => parts.push(format!("{GRID_PARAM}={}", encode_component(single))),
        many => {
            let joined: Vec<String> = many.iter().map(|n| encode_component(n)).collect();
            parts.push(format!("{GRIDS_PARAM}={}", joined.join(",")));
        }
    }
    parts.join("&")
}

/// Rewrites `current` so its query carries exactly the given selection.
///
/// Relative or otherwise unparseable URLs are rebuilt by plain string
/// splitting instead of failing.
pub fn encode_share_url<S: AsRef<str>>(current: &str, names: impl IntoIterator<Item = S>) -> String {
    let names = normalize_names(names);
    match Url::parse(current) {
        Ok(mut url) => {
            let query = rebuild_query(url.query(), &names);
            url.set_query((!query.is_empty()).then_some(query.as_str()));
            url.into()
        }
        Err(err) => {
            debug!(%err, current, "rebuilding share URL by hand");
            let (without_fragment, fragment) = match current.split_once('#') {
                Some((head, frag)) => (head, Some(frag)),
                None => (current, None),
            };
            let (path, query) = match without_fragment.split_once('?') {
                Some((path, query)) => (path, Some(query)),
                None => (without_fragment, None),
            };
            let query = rebuild_query(query, &names);
            let mut out = path.to_string();
            if !query.is_empty() {
                out.push('?');
                out.push_str(&query);
            }
            if let Some(frag) = fragment {
                out.push('#');
                out.push_str(frag);
            }
            out
        }
    }
}

/// Grid names requested by a share URL: `grids` entries followed by `grid`,
/// normalized and de-duplicated in first-seen order.
pub fn decode_share_url(url: &str) -> Vec<String> {
    let query = match Url::parse(url) {
        Ok(parsed) => parsed.query().unwrap_or("").to_string(),
        Err(_) => url
            .split_once('#')
            .map_or(url, |(head, _)| head)
            .split_once('?')
            .map_or("", |(_, q)| q)
            .to_string(),
    };

    let mut grids = Vec::new();
    let mut grid = Vec::new();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            GRIDS_PARAM => grids.extend(value.split(',').map(str::to_string)),
            GRID_PARAM => grid.push(value.into_owned()),
            _ => {}
        }
    }

    let mut seen = HashSet::new();
    grids
        .into_iter()
        .chain(grid)
        .map(|n| n.trim().to_uppercase())
        .filter(|n| !n.is_empty() && seen.insert(n.clone()))
        .collect()
}
