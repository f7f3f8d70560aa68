//! Content store core: records, indices, ranking and the persistence
//! coordinator, behind the `ContentStore` facade.

pub mod auth;
pub mod comments;
pub mod forms;
pub mod persistence;
pub mod posts;
pub mod ranking;
pub mod search;
pub mod store;
pub mod tags;
pub mod text;

pub use auth::can_mutate;
pub use forms::{CommentForm, PostForm};
pub use posts::PostPatch;
pub use ranking::{Page, PopularityWeights};
pub use store::{ContentStore, StoreOptions, StoreStats};
