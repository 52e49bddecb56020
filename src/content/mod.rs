pub mod model;
pub mod sanitize;
