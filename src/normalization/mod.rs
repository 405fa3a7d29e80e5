pub mod price;
pub mod slug;

pub use price::parse_price_cents;
pub use slug::slugify;
