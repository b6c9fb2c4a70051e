pub mod association;
pub mod category;
pub mod category_tree;
pub mod discount;
pub mod image;
pub mod order;
pub mod pagination;
pub mod price;
pub mod product;
pub mod user;
