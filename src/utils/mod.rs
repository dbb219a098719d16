pub mod month_year;
pub mod request_context;

pub use month_year::{MonthYear, is_month_year};
pub use request_context::{REQUEST_ID_HEADER, RequestContext};
