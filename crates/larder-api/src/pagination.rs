use serde::Deserialize;

pub const DEFAULT_PAGE_SIZE: u32 = 6;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    /// 1-based page number.
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    /// `(limit, offset)` for SQL, with the page size clamped to 1..=MAX_PAGE_SIZE.
    pub fn window(&self) -> (i64, i64) {
        page_window(self.page, self.limit)
    }
}

pub fn page_window(page: Option<u32>, limit: Option<u32>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE) as i64;
    let page = page.unwrap_or(1).max(1) as i64;
    (limit, (page - 1) * limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_defaults_and_clamps() {
        assert_eq!(page_window(None, None), (6, 0));
        assert_eq!(page_window(Some(3), Some(10)), (10, 20));
        assert_eq!(page_window(Some(0), Some(0)), (1, 0));
        assert_eq!(page_window(Some(2), Some(1000)), (100, 100));
    }
}
