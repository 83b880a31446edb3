// Copyright 2023 Remi Bernotavicius

use crate::composition::ValidationError;
use crate::database::models::{IngredientId, RecipeId, UserId};
use crate::membership::MembershipKind;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid recipe: {0}")]
    Validation(#[from] ValidationError),

    #[error("user {actor} is not the author of recipe {recipe}")]
    Forbidden { actor: UserId, recipe: RecipeId },

    #[error("{object} is already in {kind} of user {subject}")]
    AlreadyExists {
        kind: MembershipKind,
        subject: UserId,
        object: i32,
    },

    #[error("{object} wasn't in {kind} of user {subject}")]
    NotFound {
        kind: MembershipKind,
        subject: UserId,
        object: i32,
    },

    #[error("users cannot subscribe to themselves")]
    SelfReferenceNotAllowed,

    #[error("recipe {0} does not exist")]
    RecipeNotFound(RecipeId),

    #[error("user {0} does not exist")]
    UserNotFound(UserId),

    #[error("ingredient {0} does not exist")]
    IngredientNotFound(IngredientId),

    #[error("total amount of {name} ({measurement_unit}) is too large")]
    AmountOverflow {
        name: String,
        measurement_unit: String,
    },

    #[error("an account with email or username of {email:?} already exists")]
    AccountExists { email: String },

    #[error("database path {0:?} is not valid UTF-8")]
    InvalidDatabasePath(PathBuf),

    #[error(transparent)]
    Database(#[from] diesel::result::Error),

    #[error(transparent)]
    Connection(#[from] diesel::ConnectionError),

    #[error("failed to migrate database: {0}")]
    Migration(Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("malformed ingredient list: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the caller can fix the failure by changing its request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::Forbidden { .. }
                | Self::AlreadyExists { .. }
                | Self::NotFound { .. }
                | Self::SelfReferenceNotAllowed
                | Self::RecipeNotFound(_)
                | Self::UserNotFound(_)
                | Self::IngredientNotFound(_)
                | Self::AccountExists { .. }
        )
    }
}
