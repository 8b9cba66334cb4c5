// SearchBar suggestion engine - autocomplete for KQL queries as the user types

pub mod catalog;
pub mod debounce;
pub mod engine;
pub mod providers;
pub mod recent;

pub use catalog::FieldCatalog;
pub use debounce::{Debouncer, LatestRequest, Ticket};
pub use engine::{SuggestConfig, SuggestionEngine};
pub use providers::{
    ConjunctionProvider, FieldProvider, OperatorProvider, ProviderTable, SuggestError,
    SuggestionContext, SuggestionProvider, ValueProvider,
};
pub use recent::RecentSearches;
