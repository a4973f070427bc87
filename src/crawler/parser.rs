//! HTML and JSON parsers for marketplace pages
//!
//! This module extracts owned data from:
//! - Search result pages (listing links)
//! - Category landing pages (listing counts)
//! - Listing detail pages
//! - Seller profile pages
//! - The category-children JSON endpoint
//!
//! All functions are synchronous and return owned values, so a parsed
//! document never lives across an await point.

use crate::storage::{ProductDetails, ProductSummary, SellerContact, SellerProfile};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

static LISTING_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-o(\d+)\.html").expect("listing id regex should compile"));

static GROUPED_NUMBER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,3}(?:,\d{3})*").expect("count regex should compile"));

static PRICE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("price regex should compile"));

static LAST_UPDATED_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Last Updated\s*:\s*(\d{1,2}-[A-Za-z]{3}-\d{4})")
        .expect("last updated regex should compile")
});

/// Parses one search result page
///
/// # Returns
///
/// * `None` - The page has no listing items, i.e. the results are exhausted
/// * `Some(products)` - The parseable listings on the page, in page order;
///   may be empty when every item was malformed
pub fn parse_listing_page(html: &str, base_url: &Url) -> Option<Vec<ProductSummary>> {
    let document = Html::parse_document(html);
    let item_selector = Selector::parse(".bg-light.latest-list-item").ok()?;
    let link_selector = Selector::parse("div.col.m7.s8 h5 a").ok()?;

    let items: Vec<ElementRef<'_>> = document.select(&item_selector).collect();
    if items.is_empty() {
        return None;
    }

    let mut products = Vec::with_capacity(items.len());
    for item in items {
        match parse_listing_item(item, &link_selector, base_url) {
            Some(product) => products.push(product),
            None => tracing::debug!("Skipping malformed listing item"),
        }
    }

    Some(products)
}

fn parse_listing_item(item: ElementRef<'_>, link: &Selector, base_url: &Url) -> Option<ProductSummary> {
    let anchor = item.select(link).next()?;
    let href = anchor.value().attr("href")?;
    let listing_id = listing_id_from_url(href)?;
    let url = base_url.join(href).ok()?;

    Some(ProductSummary {
        listing_id,
        name: element_text(anchor),
        url: url.to_string(),
    })
}

/// Extracts the marketplace listing id from a listing URL
///
/// Listing URLs end in `-o<digits>.html`, e.g.
/// `/samsung-galaxy-s23-o4412345.html`.
pub fn listing_id_from_url(href: &str) -> Option<i64> {
    LISTING_ID_PATTERN
        .captures_iter(href)
        .last()
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Extracts the listing count shown on a category landing page
///
/// The count is the first comma-grouped number inside `.view-switch`.
pub fn parse_product_count(html: &str) -> Option<u64> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(".view-switch").ok()?;

    document.select(&selector).find_map(|element| {
        let text = element.text().collect::<String>();
        GROUPED_NUMBER_PATTERN
            .find(&text)
            .and_then(|m| m.as_str().replace(',', "").parse().ok())
    })
}

/// Parses the category-children JSON
///
/// The endpoint answers with an array of single-entry objects mapping a
/// category id to its name, e.g. `[{"12":"Phones"},{"13":"Tablets"}]`.
/// Entries whose key is not an integer are skipped; an empty body or `null`
/// means no children.
pub fn parse_category_children(body: &str) -> Result<Vec<(i64, String)>, serde_json::Error> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let entries: Option<Vec<serde_json::Map<String, serde_json::Value>>> =
        serde_json::from_str(body)?;

    let mut children = Vec::new();
    for entry in entries.unwrap_or_default() {
        for (key, value) in entry {
            let id = match key.trim().parse::<i64>() {
                Ok(id) => id,
                Err(_) => {
                    tracing::debug!("Skipping category with non-numeric id {:?}", key);
                    continue;
                }
            };
            let name = match value {
                serde_json::Value::String(name) => name,
                other => other.to_string(),
            };
            children.push((id, name.trim().to_string()));
        }
    }

    Ok(children)
}

/// Parses a listing detail page
///
/// Returns `None` when the page has no listing heading, which is how the
/// marketplace renders removed listings.
pub fn parse_product_details(html: &str, base_url: &Url) -> Option<ProductDetails> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let name = first_text(root, ".iw-details-heading > h5")?;

    let price_text = first_text(root, ".details-page_product-info .price");
    let price = price_text.as_deref().and_then(parse_price);

    let images = select_all(root, "#fullscreen-viewer img")
        .filter_map(|img| img.value().attr("src"))
        .filter_map(|src| base_url.join(src.trim()).ok())
        .map(|url| url.to_string())
        .collect();

    let mut location = None;
    let mut info = Vec::new();
    for (key, value) in parse_info_rows(root) {
        if key.eq_ignore_ascii_case("location") {
            location = Some(value);
        } else {
            info.push((key, value));
        }
    }

    let description = first_text(root, ".iw-description-div");
    let favourite_count = first_text(root, ".no-favorites > span").and_then(|s| s.parse().ok());
    let last_updated = parse_last_updated(&root.text().collect::<String>());

    Some(ProductDetails {
        name: Some(name),
        price,
        price_text,
        images,
        location,
        info,
        description,
        favourite_count,
        last_updated,
        seller: parse_seller_contact(root, base_url),
    })
}

fn parse_info_rows(root: ElementRef<'_>) -> Vec<(String, String)> {
    let (Ok(key_cell), Ok(value_cell)) = (
        Selector::parse("td:nth-child(1)"),
        Selector::parse("td:nth-child(2)"),
    ) else {
        return Vec::new();
    };

    select_all(root, ".item-info-table > table > tbody > tr")
        .filter_map(|row| {
            let key = row.select(&key_cell).next().map(element_text)?;
            let value = row.select(&value_cell).next().map(element_text)?;
            (!key.is_empty()).then_some((key, value))
        })
        .collect()
}

fn parse_seller_contact(root: ElementRef<'_>, base_url: &Url) -> Option<SellerContact> {
    let href = select_all(root, ".iw-user-name")
        .find_map(|link| link.value().attr("href"))?;
    let profile_url = base_url.join(href).ok()?;
    let id = profile_url
        .query_pairs()
        .find(|(key, _)| key == "id")
        .and_then(|(_, value)| value.parse().ok())?;

    Some(SellerContact {
        id,
        name: first_text(root, ".iw-user-name > b"),
        contact_number: first_text(root, ".i-detail-des-n"),
    })
}

/// Parses a price such as `MVR 12,500.00` into `12500.0`
pub fn parse_price(text: &str) -> Option<f64> {
    PRICE_PATTERN
        .find(text)
        .and_then(|m| m.as_str().replace(',', "").parse().ok())
}

/// Finds `Last Updated : 07-Mar-2024` in page text and returns `2024-03-07`
pub fn parse_last_updated(text: &str) -> Option<String> {
    let raw = LAST_UPDATED_PATTERN.captures(text)?.get(1)?.as_str();
    match NaiveDate::parse_from_str(raw, "%d-%b-%Y") {
        Ok(date) => Some(date.format("%Y-%m-%d").to_string()),
        Err(e) => {
            tracing::debug!("Unparseable last-updated date {:?}: {}", raw, e);
            None
        }
    }
}

/// Parses a seller profile page
pub fn parse_seller_profile(html: &str, base_url: &Url) -> SellerProfile {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let image_src = select_all(root, ".bg-light .col.s6.l2 img")
        .find_map(|img| img.value().attr("src"))
        .and_then(|src| base_url.join(src.trim()).ok())
        .map(|url| url.to_string());

    let is_premium = select_all(root, r#".bg-light .col.s6.l4 img[alt="Premium Seller"]"#)
        .next()
        .is_some();

    SellerProfile {
        image_src,
        is_premium,
        description: first_text(root, ".bg-light .col.s12.l6 p"),
        location: first_text(root, ".bg-light .col.s12.l6 p b:nth-child(1)"),
        member_since: first_text(root, ".bg-light .col.s12.l6 p b:nth-child(2)"),
        last_login: parse_last_login(root),
    }
}

/// The last-login value is the text node after the bold label
fn parse_last_login(root: ElementRef<'_>) -> Option<String> {
    let label = select_all(root, ".bg-light .col.s12.l6 p:nth-of-type(3) b").next()?;
    let text = label
        .next_siblings()
        .filter_map(|node| node.value().as_text().map(|t| t.to_string()))
        .collect::<String>();
    let text = text.trim().trim_start_matches(':').trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn select_all<'a>(root: ElementRef<'a>, css: &str) -> impl Iterator<Item = ElementRef<'a>> {
    let elements: Vec<ElementRef<'a>> = match Selector::parse(css) {
        Ok(selector) => root.select(&selector).collect(),
        Err(_) => Vec::new(),
    };
    elements.into_iter()
}

/// Trimmed text of the first match, if non-empty
fn first_text(root: ElementRef<'_>, css: &str) -> Option<String> {
    select_all(root, css)
        .next()
        .map(element_text)
        .filter(|text| !text.is_empty())
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
