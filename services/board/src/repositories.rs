//! Repositories for database operations

pub mod comment;
pub mod like;
pub mod post;
pub mod user;

pub use comment::CommentRepository;
pub use like::LikeRepository;
pub use post::PostRepository;
pub use user::UserRepository;
