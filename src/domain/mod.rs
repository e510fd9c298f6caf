pub mod entity;
pub mod ordered_list;
pub mod types;

pub use entity::Entity;
pub use ordered_list::OrderedList;
pub use types::{
    relative_time, ActivityKind, CollapseToggle, Direction, EntityKind, VoteDirection,
};
