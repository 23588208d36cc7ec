//! The paging envelope shared by every listing.

use crate::error::{CheckpostError, CheckpostResult};
use api_shared::PageRes;

/// Cuts page `page` (zero-based) of `page_size` records out of `records`.
///
/// `totalPages` is `ceil(totalRecords / pageSize)`. A page past the end comes
/// back with no records but with the totals filled in.
pub fn paginate<T>(records: Vec<T>, page: usize, page_size: usize) -> CheckpostResult<PageRes<T>> {
    if page_size == 0 {
        return Err(CheckpostError::InvalidInput(
            "page size must be greater than zero".into(),
        ));
    }

    let total_records = records.len();
    let total_pages = total_records.div_ceil(page_size);
    let records = records
        .into_iter()
        .skip(page.saturating_mul(page_size))
        .take(page_size)
        .collect();

    Ok(PageRes {
        total_records,
        page_size,
        total_pages,
        current_page: page,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twenty_five_records_in_pages_of_ten() {
        let records: Vec<u32> = (1..=25).collect();

        let first = paginate(records.clone(), 0, 10).unwrap();
        let second = paginate(records.clone(), 1, 10).unwrap();
        let third = paginate(records.clone(), 2, 10).unwrap();

        assert_eq!(first.records.len(), 10);
        assert_eq!(second.records.len(), 10);
        assert_eq!(third.records, vec![21, 22, 23, 24, 25]);
        for page in [&first, &second, &third] {
            assert_eq!(page.total_pages, 3);
            assert_eq!(page.total_records, 25);
            assert_eq!(page.page_size, 10);
        }
        assert_eq!(third.current_page, 2);
    }

    #[test]
    fn test_page_past_end_is_empty() {
        let page = paginate(vec![1, 2, 3], 5, 10).unwrap();
        assert!(page.records.is_empty());
        assert_eq!(page.total_records, 3);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn test_empty_listing_has_zero_pages() {
        let page = paginate(Vec::<u8>::new(), 0, 10).unwrap();
        assert_eq!(page.total_pages, 0);
    }

    #[test]
    fn test_zero_page_size_is_rejected() {
        assert!(matches!(
            paginate(vec![1], 0, 0),
            Err(CheckpostError::InvalidInput(_))
        ));
    }
}
