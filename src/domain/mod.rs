pub mod character;
pub mod data;
pub mod elevator;
pub mod floor;
