/// Crawl phase definitions for tracking session progress
///
/// A crawl session always moves forward through these phases; the discovery
/// phase may be skipped when the page quota is met during the sitemap phase.
use std::fmt;

/// Represents the current phase of a crawl session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// Loading the keys of pages already stored for the knowledge base
    Init,

    /// Following links out of stored pages without re-fetching their content
    SeedLinks,

    /// Fetching the root and sitemap-declared URLs in priority order
    SitemapPhase,

    /// Fetching URLs discovered by following links, in lexicographic passes
    DiscoveryPhase,

    /// Session finished; the output list is final
    Done,
}

impl CrawlPhase {
    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        matches!(
            (self, next),
            (Self::Init, Self::SeedLinks)
                | (Self::SeedLinks, Self::SitemapPhase)
                | (Self::SitemapPhase, Self::DiscoveryPhase)
                | (Self::SitemapPhase, Self::Done)
                | (Self::DiscoveryPhase, Self::Done)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::SeedLinks => "seed_links",
            Self::SitemapPhase => "sitemap",
            Self::DiscoveryPhase => "discovery",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
