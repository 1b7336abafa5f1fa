pub mod association;
pub mod embedding;
pub mod information;
pub mod matrix;
pub mod measures;
pub mod normalize;
pub mod placement;
pub mod projection;
pub mod smoothing;

pub use embedding::{embed_features, embed_genesets, embed_swne, project_swne};
pub use embedding::{SwneEmbedding, SwneParams};
pub use matrix::{CoordTable, NamedMatrix, SimilarityMatrix};
