use serde::Serialize;

/// One page of results plus the metadata clients need to walk the rest.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
  pub data: Vec<T>,
  pub page: u64,
  pub page_size: u64,
  pub total: u64,
  pub page_count: u64,
}

/// Build the pagination metadata for a query once the total is known.
///
/// The returned closure wraps the page's records. `page_count` is the
/// ceiling of `total / page_size`, and zero when `page_size` is zero.
pub fn paginate<T>(page_size: u64, page_no: u64, count: u64) -> impl Fn(Vec<T>) -> Page<T> {
  let page_count = if page_size == 0 {
    0
  } else {
    count.div_ceil(page_size)
  };

  move |data| Page {
    data,
    page: page_no,
    page_size,
    total: count,
    page_count,
  }
}
