pub mod cache;
pub mod config;
pub mod error;
pub mod handle;
pub mod index;
pub mod instrumentation;
pub mod logging;
pub mod lookup;
pub mod model;
mod modification;

pub use cache::{CacheStats, ClassCache, NodeChangeListener};
pub use config::ClassCacheConfig;
pub use error::{ClassCacheError, Result};
pub use handle::ClassCacheHandle;
pub use instrumentation::{
    ClassCacheSearchNarrower, InstrumentableClass, InstrumentationApplier, SearchNarrower,
    SharedApplier,
};
pub use lookup::LookupService;
