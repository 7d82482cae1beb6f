mod chat;
mod document;
mod user;

pub use chat::*;
pub use document::*;
pub use user::*;
