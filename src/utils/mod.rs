pub mod export;
pub mod text;
