//! One [`super::Fetcher`] implementation per [`super::Engine`] variant.

mod browser;
mod http;
mod index;
mod pdf;

pub use browser::BrowserFetcher;
pub use http::HttpFetcher;
pub use index::IndexFetcher;
pub use pdf::PdfFetcher;
