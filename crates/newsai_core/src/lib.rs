pub mod arxiv;
pub mod config;
pub mod error;
pub mod models;
pub mod storage;

pub use config::{LogFormat, Settings};
pub use error::{Error, Result};
pub use models::*;
pub use storage::{
    ArticleStore, FieldStore, InterestStore, PaperStore, PromptStore, SessionStore, Storage,
    UserStore,
};

pub mod prelude {
    pub use crate::{Error, Result, Settings, Storage};
    pub use crate::models::*;
}
