// Pipeline processing: source schema, normalization, and graph extraction

pub mod extract;
pub mod normalize;
pub mod schema;
