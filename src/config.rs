use serde::{Deserialize, Serialize};
use std::time::Duration;

/// List endpoint of the anime index. `{page}` and `{page_size}` are filled in per request.
pub const DEFAULT_CATALOG_ENDPOINT: &str = "https://api.bilibili.com/pgc/season/index/result?st=1&order=3&season_version=-1&spoken_language_type=-1&area=-1&is_finish=-1&copyright=-1&season_status=-1&season_month=-1&year=-1&style_id=-1&sort=0&page={page}&season_type=1&pagesize={page_size}&type=1";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36";

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_WORKERS: usize = 5;

/// Settings shared by every run of a controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// URL template of the paginated list endpoint.
    pub catalog_endpoint: String,
    pub page_size: u32,
    /// Maximum number of covers downloaded at the same time.
    pub workers: usize,
    pub page_timeout: Duration,
    pub image_timeout: Duration,
    pub user_agent: String,
    /// Fetch every page a second time in the download phase instead of
    /// reusing the results of the counting pass.
    pub refetch_pages: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            catalog_endpoint: DEFAULT_CATALOG_ENDPOINT.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            workers: DEFAULT_WORKERS,
            page_timeout: Duration::from_secs(15),
            image_timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            refetch_pages: false,
        }
    }
}

impl CrawlerConfig {
    /// Builds the list URL for one page.
    pub fn page_url(&self, page: i64) -> String {
        self.catalog_endpoint
            .replace("{page}", &page.to_string())
            .replace("{page_size}", &self.page_size.to_string())
    }

    /// Pool size, never below one slot.
    pub fn pool_size(&self) -> usize {
        self.workers.max(1)
    }
}
