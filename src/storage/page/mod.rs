mod header_page;

pub use header_page::{HeaderPage, HeaderPageRef};
