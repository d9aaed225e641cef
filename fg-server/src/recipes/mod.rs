//! The recipe aggregate: a recipe together with its ingredient lines and tags.

pub mod reader;
pub mod shopping_list;
pub mod short_link;
pub mod validation;
pub mod writer;

pub use reader::{FullRecipe, UserProfile, Viewer};
pub use short_link::ShortLinkError;
pub use validation::RecipeError;
