//! Database rows and request/response payloads

pub mod comment;
pub mod like;
pub mod post;
pub mod user;

pub use comment::{Comment, CommentOwner, CommentRequest};
pub use like::LikeToggle;
pub use post::{NewPost, PostChanges, PostDetail, PostOwner, PostSummary};
pub use user::{LoginRequest, NewUser, SessionUser, UpdatePasswordRequest, User};
