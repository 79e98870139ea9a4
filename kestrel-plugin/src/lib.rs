//! Types shared between the kestrel daemon, its native sources and
//! out-of-process plugins.

pub mod contract;
mod error;
pub mod provider;
mod query;
mod searchable;
mod source;

pub use error::{ContractError, SourceError};
pub use query::{Category, Query, SearchFilters};
pub use searchable::{
    App, Article, Calculation, CalendarEvent, Contact, File, Kind, Location, Placeholder,
    PluginEntity, PluginItem, Searchable, SystemSetting, Tag, UnitConversion, Website, make_key,
};
pub use source::{Batch, NATIVE_INIT_SYMBOL, NativeSource, ResultStream, Source};
