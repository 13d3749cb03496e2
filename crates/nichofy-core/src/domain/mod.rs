//! Domain entities - the core business objects.

mod post;
mod query;

pub use post::{NewPost, Post, PostPatch, PostStats};
pub use query::{
    Cursor, PostFilters, PostPage, PostQuery, PostSort, SortDirection, SortField,
    SortValue,
};
