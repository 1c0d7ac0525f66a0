pub mod fields;

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use tracing::debug;

use crate::config;
use fields::Mode;

static LISTING: LazyLock<Selector> = LazyLock::new(|| parse_selector(config::LISTING_SELECTOR));
static NAME: LazyLock<Selector> = LazyLock::new(|| parse_selector(config::NAME_SELECTOR));
static PRICE: LazyLock<Selector> = LazyLock::new(|| parse_selector(config::PRICE_SELECTOR));
static IMAGE: LazyLock<Selector> = LazyLock::new(|| parse_selector(config::IMAGE_SELECTOR));

fn parse_selector(css: &str) -> Selector {
    Selector::parse(css).expect("built-in selector must parse")
}

/// One vehicle offer as found on a category page.
///
/// Every field is optional on its own; a card with nothing extractable still
/// produces a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListingRecord {
    id: Option<String>,
    name: Option<String>,
    price: Option<String>,
    url: Option<String>,
    image_url: Option<String>,
}

impl ListingRecord {
    pub fn new(
        id: Option<String>,
        name: Option<String>,
        price: Option<String>,
        url: Option<String>,
        image_url: Option<String>,
    ) -> Self {
        Self {
            id,
            name,
            price,
            url,
            image_url,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

/// Parse every listing card in a rendered category page, in document order.
pub fn parse_listings(markup: &str) -> Vec<ListingRecord> {
    let document = Html::parse_document(markup);
    let cards: Vec<ElementRef<'_>> = document.select(&LISTING).collect();
    debug!("Found {} product cards", cards.len());

    cards
        .into_iter()
        .enumerate()
        .map(|(index, card)| parse_card(index, card))
        .collect()
}

fn parse_card(index: usize, card: ElementRef<'_>) -> ListingRecord {
    debug!("Processing product card {}", index + 1);

    let name = fields::extract(card.select(&NAME).next(), Mode::Text);
    let price = fields::extract(card.select(&PRICE).next(), Mode::Text);
    let url = fields::extract(Some(card), Mode::Attribute("href"))
        .filter(|href| !href.is_empty())
        .and_then(|href| fields::canonical_url(&href, config::BASE_URL));
    let image_url = fields::extract(card.select(&IMAGE).next(), Mode::Attribute("src"));
    let id = fields::derive_id(image_url.as_deref());

    debug!(
        card = index + 1,
        ?id,
        ?name,
        ?price,
        ?url,
        ?image_url,
        "Extracted card fields"
    );

    ListingRecord::new(id, name, price, url, image_url)
}
