use std::sync::Arc;

use crate::config::RankingConfig;
use crate::ingest::Ingestor;
use crate::models::Pagination;
use crate::ranking::RankQuery;
use crate::storage::ProfileSource;

#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<Ingestor>,
    pub ranks: RankQuery,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl AppState {
    pub fn new(
        ingestor: Arc<Ingestor>,
        profiles: Arc<dyn ProfileSource>,
        config: &RankingConfig,
    ) -> Self {
        let ranks = RankQuery::new(
            ingestor.store(),
            profiles,
            ingestor.state(),
            config.storage_timeout(),
        );
        Self {
            ingestor,
            ranks,
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }
    }

    /// Pagination clamped to the configured page sizes.
    pub fn pagination(&self, page: Option<u32>, page_size: Option<u32>) -> Pagination {
        Pagination::with_limits(page, page_size, self.default_page_size, self.max_page_size)
    }
}
