//! Traversal Parser, Filter Tree, Subquery Core, Wrapper Query and Keyword
//! Search Builder (spec §4.3–§4.7).

pub mod error;
pub mod filter;
pub mod keyword;
pub mod params;
pub mod subquery;
pub mod traversal;
pub mod wrapper;

pub use error::{QueryError, QueryResult};
pub use filter::{ClauseKind, Comparison, FilterNode, FilterValue, Operator};
pub use keyword::{build_keyword_search, normalize_keywords, KeywordSearchOptions, MIN_WORD_SIZE};
pub use params::ParamBinder;
pub use subquery::{FixedSubquery, Subquery, Target, MAX_NEIGHBORS, MAX_TRAVEL_DEPTH};
pub use traversal::{parse_traversal_string, parse_traversal_value, Direction, PathStep, TraversalPath};
pub use wrapper::{OrderDirection, QueryCore, WrapperQuery, MAX_LIMIT};
