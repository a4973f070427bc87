//! Scrape status of stored listings
//!
//! Every listing found by a link or update scan starts out as
//! [`ProductStatus::NotScraped`]; the detail scan moves it to one of the
//! other states.

mod product_state;

pub use product_state::ProductStatus;
