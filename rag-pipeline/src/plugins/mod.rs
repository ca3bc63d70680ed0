//! Concrete plugins for every stage spec §4 names, registered against the
//! `EventManager` in `build_default_manager` (see `lib.rs`).

mod filter;
mod merge;
mod rerank;
mod rewrite;
mod search;
mod stream;

pub use filter::FilterPlugin;
pub use merge::MergePlugin;
pub use rerank::RerankPlugin;
pub use rewrite::RewritePlugin;
pub use search::SearchPlugin;
pub use stream::StreamingPlugin;
