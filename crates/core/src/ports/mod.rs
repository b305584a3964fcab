mod mailer;
mod paging;
mod repository;

pub use mailer::*;
pub use paging::*;
pub use repository::*;
