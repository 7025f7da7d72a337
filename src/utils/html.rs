//! Small helpers over `scraper` for pulling text out of result pages.

use scraper::{ElementRef, Selector};

use super::clean_text;

/// Cleaned, non-empty text of every element matching `selector`
pub fn select_texts(root: ElementRef<'_>, selector: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };
    root.select(&selector)
        .map(|element| clean_text(&element.text().collect::<String>()))
        .filter(|text| !text.is_empty())
        .collect()
}

/// Cleaned text of the first matching element that has any
pub fn select_text(root: ElementRef<'_>, selector: &str) -> Option<String> {
    select_texts(root, selector).into_iter().next()
}

/// Attribute value of the first matching element carrying it
pub fn select_attr(root: ElementRef<'_>, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    root.select(&selector)
        .find_map(|element| element.value().attr(attr))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
