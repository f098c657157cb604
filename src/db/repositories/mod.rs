pub mod api_key;
pub mod blogger;
pub mod note;
pub mod user;
pub mod user_settings;

/// Zero-based page index for a 1-based `page`, or `None` when the row offset
/// would not fit in an SQL `OFFSET`.
pub(crate) fn page_index(page: u64, page_size: u64) -> Option<u64> {
    let index = page.saturating_sub(1);
    index
        .checked_mul(page_size.max(1))
        .filter(|offset| i64::try_from(*offset).is_ok())
        .map(|_| index)
}

#[cfg(test)]
mod tests {
    use super::page_index;

    #[test]
    fn test_page_index() {
        assert_eq!(page_index(0, 20), Some(0));
        assert_eq!(page_index(1, 20), Some(0));
        assert_eq!(page_index(3, 20), Some(2));
        assert_eq!(page_index(u64::MAX, 100), None);
        assert_eq!(page_index(u64::MAX / 2, 4), None);
    }
}
