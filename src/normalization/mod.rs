pub mod header;
pub mod price;
