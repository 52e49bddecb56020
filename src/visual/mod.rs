pub mod background;
pub mod frame;
pub mod text;
