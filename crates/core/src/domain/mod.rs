pub mod cart;
pub mod conversation;
pub mod order;
pub mod slots;
pub mod unit;
