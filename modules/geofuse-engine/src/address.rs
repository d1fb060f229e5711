//! Decide whether an address string is specific enough to show.
//!
//! Bare "postal code + city" or "city, country" strings are technically
//! correct but useless to someone trying to find a property. This check
//! never touches coordinates.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use geofuse_common::{AddressComponent, ComponentKind};

/// "75011 Paris", "75011 Paris, France", "Paris 75011"
static POSTAL_CITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:\d{4,5}\s+\p{L}[\p{L}\s'’\-]*|\p{L}[\p{L}\s'’\-]*\s+\d{4,5})(?:\s*,\s*\p{L}[\p{L}\s'’\-]*)?\s*$",
    )
    .unwrap()
});

/// "Paris, France", "Lyon, Rhône, France"
static CITY_COUNTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*\p{L}[\p{L}\s'’\-]*(?:\s*,\s*\p{L}[\p{L}\s'’\-]*){1,2}\s*$").unwrap()
});

/// A street-type word rescues an otherwise vague-looking address
/// ("Rue de Rivoli, Paris" names a street).
static STREET_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:rue|avenue|boulevard|bd|place|quai|chemin|allée|allee|impasse|cours|passage|route|square|street|road|lane|drive)\b|\b(?:av|st|rd)\.",
    )
    .unwrap()
});

/// True when `address` is empty or only names a postal area, city or country.
pub fn is_too_vague(address: &str) -> bool {
    let address = address.trim();
    if address.is_empty() {
        return true;
    }
    let bare_area = POSTAL_CITY_RE.is_match(address) || CITY_COUNTRY_RE.is_match(address);
    bare_area && !STREET_WORD_RE.is_match(address)
}

/// Structured form of the check, for geocoder responses.
/// Vague when there is neither a street number nor a route, or when the
/// only parts are postal code and locality.
pub fn components_too_vague(components: &[AddressComponent]) -> bool {
    let kinds: HashSet<ComponentKind> = components
        .iter()
        .filter(|c| !c.value.trim().is_empty())
        .map(|c| c.kind)
        .collect();

    let has_street_number = kinds.contains(&ComponentKind::StreetNumber);
    let has_route = kinds.contains(&ComponentKind::Route);
    if !has_street_number && !has_route {
        return true;
    }

    kinds
        .iter()
        .all(|k| matches!(k, ComponentKind::PostalCode | ComponentKind::Locality))
}

/// Address fit for display, or `None` when it is too vague.
pub fn displayable(address: Option<&str>) -> Option<&str> {
    address.filter(|a| !is_too_vague(a))
}
