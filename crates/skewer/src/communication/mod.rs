mod item;
mod ticket;

pub use item::{Item, ItemId};
pub use ticket::Ticket;
