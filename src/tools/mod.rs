//! Data Clients
//!
//! External information sources the concrete agents read from.

mod documents;
mod market_data;
mod web_search;

pub use documents::{DocumentChunk, DocumentStore, IndexedDocumentStore, INDEX_FILE};
pub use market_data::{MarketDataSource, Quote, YahooQuoteSource};
pub use web_search::{format_results, DuckDuckGoSearch, SearchBackend, SearchResult, SerperSearch};
