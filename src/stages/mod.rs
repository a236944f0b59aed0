pub mod discovery;
pub mod names;
pub mod normalize;
pub mod readership;

pub use discovery::{discover_newspapers, discover_tv_channels};
pub use names::{resolve_names, NameOutcome};
pub use normalize::normalize_readership;
pub use readership::{add_bypassed_totals, extract_raw_readership};
