//! Pure helpers: retry schedule, status classification, header parsing.

mod headers;
mod retry;
mod validation;

pub use headers::{content_length, content_range_total, parse_http_date};
pub use retry::{RETRY_STATUSES, is_retryable_status, retry_delay};
pub use validation::{is_redirect, is_success, url_file_name};
