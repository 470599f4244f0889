// Price text normalization and intra-run deduplication.
use std::collections::HashSet;

use crate::model::{Listing, NormalizationError};

/// Parses locale-formatted price text into a decimal value.
///
/// Retailer pages render prices with a decimal comma, non-breaking spaces
/// as group separators and a trailing euro glyph ("1 234,50 €"); some also
/// leak a literal `&nbsp;` entity through their templates.
pub fn normalize_price(text: &str) -> Result<f64, NormalizationError> {
    let cleaned = text
        .trim()
        .replace(',', ".")
        .replace("&nbsp;", "")
        .replace('\u{a0}', "")
        .replace('€', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Err(NormalizationError(text.to_string()));
    }
    cleaned
        .parse::<f64>()
        .map_err(|_| NormalizationError(text.to_string()))
}

/// Canonical manufacturer casing: first letter upper, the rest lower.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// Removes rows identical in all five fields, keeping first occurrences.
///
/// Adapters call this after every page append; the pagination policy
/// compares lengths before and after to detect pages that add nothing new.
pub fn dedup(listings: Vec<Listing>) -> Vec<Listing> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(listings.len());
    for listing in listings {
        let key = (
            listing.title.clone(),
            listing.manufacturer.clone(),
            listing.eshop.clone(),
            listing.url.clone(),
            listing.price.to_bits(),
        );
        if seen.insert(key) {
            unique.push(listing);
        }
    }
    unique
}
