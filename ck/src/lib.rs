pub mod markup;
pub mod models;
pub mod wav;
