//! (de)serialization helpers for the manifest's comma-separated attribute lists.
//!
//! Manifest XML stores sets like `attributes="foo,bar"` as a single string
//! attribute; the in-memory model wants a `BTreeSet<String>` so attribute
//! propagation (union) and membership tests are cheap and deterministic.

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serializer};

pub fn parse(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

pub fn render(set: &BTreeSet<String>) -> String {
    set.iter().cloned().collect::<Vec<_>>().join(",")
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.map(|s| parse(&s)).unwrap_or_default())
}

pub fn serialize<S>(set: &BTreeSet<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if set.is_empty() {
        serializer.serialize_none()
    } else {
        serializer.serialize_some(&render(set))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trims_and_drops_empties() {
        let set = parse(" a, b ,,c");
        assert_eq!(
            set,
            BTreeSet::from(["a".to_string(), "b".to_string(), "c".to_string()])
        );
    }

    #[test]
    fn render_roundtrips_sorted() {
        let set = parse("z,a,m");
        assert_eq!(render(&set), "a,m,z");
    }
}
