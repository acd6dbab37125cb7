//! Response shapes shared by several endpoints

use serde::{Deserialize, Serialize};

/// A page of results from a paginated list endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Total number of records across all pages
    pub count: u64,

    /// URL of the next page
    pub next: Option<String>,

    /// URL of the previous page
    pub previous: Option<String>,

    /// Records on this page
    pub results: Vec<T>,
}

/// List endpoints answer with either a page or a bare array
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Page(Page<T>),
    Items(Vec<T>),
}

impl<T> Listing<T> {
    /// The records, whatever the envelope
    pub fn into_items(self) -> Vec<T> {
        match self {
            Listing::Page(page) => page.results,
            Listing::Items(items) => items,
        }
    }

    /// View a bare array as a single complete page
    pub fn into_page(self) -> Page<T> {
        match self {
            Listing::Page(page) => page,
            Listing::Items(items) => Page {
                count: items.len() as u64,
                next: None,
                previous: None,
                results: items,
            },
        }
    }
}

/// `{"message": ...}` body returned by action endpoints
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ActionMessage {
    #[serde(default)]
    pub message: Option<String>,
}
