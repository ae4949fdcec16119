use crate::scrapers::fields::FieldReader;
use crate::scrapers::interactive::InteractivePopupStrategy;
use crate::scrapers::marker_token::MarkerTokenStrategy;
use crate::scrapers::static_card::StaticCardStrategy;
use crate::scrapers::traits::ExtractionStrategy;
use crate::scrapers::types::{CompiledRules, StrategyKind, Timings};
use std::sync::Arc;

/// Everything a strategy needs besides the page itself
#[derive(Debug, Clone)]
pub struct ExtractContext {
    pub rules: CompiledRules,
    pub timings: Timings,
    /// Page URL, used to absolutize relative image links
    pub base_url: String,
    pub placeholder_image: String,
}

impl ExtractContext {
    pub fn reader(&self) -> FieldReader<'_> {
        FieldReader::new(&self.rules, &self.base_url, &self.placeholder_image)
    }
}

/// Pick the strategy named in configuration
pub fn build_strategy(kind: StrategyKind, ctx: ExtractContext) -> Arc<dyn ExtractionStrategy> {
    match kind {
        StrategyKind::StaticCard => Arc::new(StaticCardStrategy::new(ctx)),
        StrategyKind::MarkerToken => Arc::new(MarkerTokenStrategy::new(ctx)),
        StrategyKind::Interactive => Arc::new(InteractivePopupStrategy::new(ctx)),
    }
}

#[cfg(test)]
pub(crate) fn test_context() -> ExtractContext {
    use crate::scrapers::types::SelectorRules;

    ExtractContext {
        rules: SelectorRules::default().compile().expect("default rules"),
        timings: Timings::default(),
        base_url: "https://homereserve.ru/BeWaidhbbl".to_string(),
        placeholder_image: "https://homereserve.ru/static/no-photo.png".to_string(),
    }
}
