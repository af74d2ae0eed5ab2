pub mod extract_attribute_vector;
pub mod format_response;
pub mod predict_attributes;
pub mod prompts;
pub mod similarity_search;
pub mod utils;

pub use extract_attribute_vector::{ExtractAttributeVectorTask, EXTRACT_ATTRIBUTE_VECTOR};
pub use format_response::{FormatResponseTask, FORMAT_RESPONSE, NO_SONGS_FOUND};
pub use predict_attributes::{PredictAttributesTask, PREDICT_ATTRIBUTES};
pub use similarity_search::{SimilaritySearchTask, SEARCH_LIMIT, SIMILARITY_SEARCH};
