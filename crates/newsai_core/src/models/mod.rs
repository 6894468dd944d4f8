pub mod article;
pub mod interest;
pub mod paper;
pub mod prompt;
pub mod session;
pub mod taxonomy;
pub mod user;

pub use article::{
    slugify, validate_blocks, Article, ArticleBlock, ArticleDetail, BlockType, BlockView,
    NewArticle, NewBlock,
};
pub use interest::{nest_interests, InterestRow, UserFieldInterest};
pub use paper::{
    AuthorProfile, CreditedAuthor, NewAuthor, NewPaper, Paper, PaperAuthor, PaperSummary,
};
pub use prompt::{ArticlePrompt, NewPrompt, Prompt, PromptType};
pub use session::SessionData;
pub use taxonomy::{build_field_tree, sort_fields, Field, FieldNode, NewField, SubField};
pub use user::{NewUser, Permission, Role, RoleRef, User, UserProfile};
