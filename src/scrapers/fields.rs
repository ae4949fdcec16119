use crate::scrapers::types::CompiledRules;
use reqwest::Url;
use scraper::{ElementRef, Selector};

pub const TITLE_NOT_FOUND: &str = "title not found";
pub const PRICE_NOT_FOUND: &str = "price not found";

/// Title, price and images of one listing container, with sentinels applied
#[derive(Debug, Clone, PartialEq)]
pub struct CardFields {
    pub title: String,
    pub price: String,
    pub image_urls: Vec<String>,
}

/// Field extraction with per-field fallback rules
pub struct FieldReader<'a> {
    rules: &'a CompiledRules,
    base_url: Option<Url>,
    placeholder_image: &'a str,
}

impl<'a> FieldReader<'a> {
    pub fn new(rules: &'a CompiledRules, base_url: &str, placeholder_image: &'a str) -> Self {
        Self {
            rules,
            base_url: Url::parse(base_url).ok(),
            placeholder_image,
        }
    }

    pub fn read(&self, container: ElementRef<'_>) -> CardFields {
        CardFields {
            title: first_text(container, &self.rules.title)
                .unwrap_or_else(|| TITLE_NOT_FOUND.to_string()),
            price: first_text(container, &self.rules.price)
                .unwrap_or_else(|| PRICE_NOT_FOUND.to_string()),
            image_urls: self.images(container),
        }
    }

    pub fn address(&self, container: ElementRef<'_>) -> Option<String> {
        first_text(container, &self.rules.address)
    }

    /// Every image inside the container's media region, in DOM order.
    ///
    /// Never empty: the placeholder URL stands in when nothing is found.
    pub fn images(&self, container: ElementRef<'_>) -> Vec<String> {
        let region = self
            .rules
            .media
            .iter()
            .find_map(|sel| container.select(sel).next())
            .unwrap_or(container);

        let mut urls: Vec<String> = Vec::new();
        for img in all_matches(region, &self.rules.image) {
            let Some(src) = self
                .rules
                .image_attrs
                .iter()
                .filter_map(|attr| img.value().attr(attr))
                .map(str::trim)
                .find(|src| !src.is_empty() && !src.starts_with("data:"))
            else {
                continue;
            };

            let url = self.absolute(src);
            if !urls.contains(&url) {
                urls.push(url);
            }
        }

        if urls.is_empty() {
            urls.push(self.placeholder_image.to_string());
        }
        urls
    }

    /// Position token from the first configured attribute present on `marker`.
    pub fn token(&self, marker: ElementRef<'_>) -> Option<String> {
        self.rules
            .token_attrs
            .iter()
            .filter_map(|attr| marker.value().attr(attr))
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(str::to_string)
    }

    fn absolute(&self, src: &str) -> String {
        match &self.base_url {
            Some(base) => base
                .join(src)
                .map(|url| url.to_string())
                .unwrap_or_else(|_| src.to_string()),
            None => src.to_string(),
        }
    }
}

/// Text of the first selector that yields non-blank text, whitespace collapsed.
pub fn first_text(scope: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|sel| {
        scope
            .select(sel)
            .map(|el| collapse_whitespace(el.text()))
            .find(|text| !text.is_empty())
    })
}

/// First element matching any selector, rules tried in order.
pub fn first_match<'a>(scope: ElementRef<'a>, selectors: &[Selector]) -> Option<ElementRef<'a>> {
    selectors.iter().find_map(|sel| scope.select(sel).next())
}

/// All elements matching any selector, in document order, each once.
pub fn all_matches<'a>(scope: ElementRef<'a>, selectors: &[Selector]) -> Vec<ElementRef<'a>> {
    scope
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| selectors.iter().any(|sel| sel.matches(el)))
        .collect()
}

/// Nearest ancestor (or the element itself) matching any selector.
pub fn closest<'a>(element: ElementRef<'a>, selectors: &[Selector]) -> Option<ElementRef<'a>> {
    std::iter::once(element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .find(|el| selectors.iter().any(|sel| sel.matches(el)))
}

fn collapse_whitespace<'s>(parts: impl Iterator<Item = &'s str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
