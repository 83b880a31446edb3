// Copyright 2023 Remi Bernotavicius

//! Structural checks run before a recipe write is committed. Everything here is pure: the only
//! outside knowledge needed is which ingredient ids exist in the catalog, and the caller passes
//! that in.

use crate::database::models::{Amount, IngredientId};
use std::collections::{BTreeMap, HashSet};

pub const RECIPE_NAME_MAX_LENGTH: usize = 200;
pub const MIN_COOKING_TIME: i32 = 1;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("a recipe needs at least one ingredient")]
    EmptyComposition,
    #[error("ingredient {0} does not exist")]
    UnknownIngredient(IngredientId),
    #[error("ingredient {0} is listed more than once")]
    DuplicateIngredient(IngredientId),
    #[error("ingredient {0} has amount {1}, it must be at least 1")]
    AmountTooSmall(IngredientId, Amount),
    #[error("ingredient {0} has amount {1}, it must be at most 9999.99")]
    AmountTooLarge(IngredientId, Amount),
    #[error("ingredients are required when updating a recipe")]
    CompositionRequired,
    #[error("recipe name is empty")]
    EmptyName,
    #[error("recipe name is longer than {max} characters")]
    NameTooLong { max: usize },
    #[error("recipe image is missing")]
    MissingImage,
    #[error("cooking time of {0} minutes is less than 1")]
    CookingTimeTooShort(i32),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CompositionEntry {
    pub ingredient_id: IngredientId,
    pub amount: Amount,
}

impl CompositionEntry {
    pub fn new(ingredient_id: IngredientId, amount: Amount) -> Self {
        Self {
            ingredient_id,
            amount,
        }
    }
}

/// A validated composition: non-empty, every ingredient known and present once, every amount at
/// least [`Amount::MIN_INGREDIENT`] and at most [`Amount::MAX_INGREDIENT`]. Iterates in ingredient
/// id order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composition(BTreeMap<IngredientId, Amount>);

impl Composition {
    pub fn iter(&self) -> impl Iterator<Item = (IngredientId, Amount)> + '_ {
        self.0.iter().map(|(&id, &amount)| (id, amount))
    }

    pub fn get(&self, ingredient_id: IngredientId) -> Option<Amount> {
        self.0.get(&ingredient_id).copied()
    }

    pub fn contains(&self, ingredient_id: IngredientId) -> bool {
        self.0.contains_key(&ingredient_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The rules are checked one at a time over the whole candidate, so the first rule broken anywhere
/// is the one reported.
pub fn validate_composition(
    candidate: &[CompositionEntry],
    known: &HashSet<IngredientId>,
) -> Result<Composition, ValidationError> {
    if candidate.is_empty() {
        return Err(ValidationError::EmptyComposition);
    }

    if let Some(unknown) = candidate.iter().find(|e| !known.contains(&e.ingredient_id)) {
        return Err(ValidationError::UnknownIngredient(unknown.ingredient_id));
    }

    let mut seen = HashSet::new();
    if let Some(repeated) = candidate.iter().find(|e| !seen.insert(e.ingredient_id)) {
        return Err(ValidationError::DuplicateIngredient(
            repeated.ingredient_id,
        ));
    }

    if let Some(small) = candidate
        .iter()
        .find(|e| e.amount < Amount::MIN_INGREDIENT)
    {
        return Err(ValidationError::AmountTooSmall(
            small.ingredient_id,
            small.amount,
        ));
    }

    if let Some(large) = candidate
        .iter()
        .find(|e| e.amount > Amount::MAX_INGREDIENT)
    {
        return Err(ValidationError::AmountTooLarge(
            large.ingredient_id,
            large.amount,
        ));
    }

    Ok(Composition(
        candidate
            .iter()
            .map(|e| (e.ingredient_id, e.amount))
            .collect(),
    ))
}

/// The recipe attributes other than its composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeFields {
    pub name: String,
    /// Reference handed back by the image store.
    pub image: String,
    pub text: String,
    /// Minutes.
    pub cooking_time: i32,
}

pub fn validate_fields(fields: &RecipeFields) -> Result<(), ValidationError> {
    if fields.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if fields.name.chars().count() > RECIPE_NAME_MAX_LENGTH {
        return Err(ValidationError::NameTooLong {
            max: RECIPE_NAME_MAX_LENGTH,
        });
    }
    if fields.image.trim().is_empty() {
        return Err(ValidationError::MissingImage);
    }
    if fields.cooking_time < MIN_COOKING_TIME {
        return Err(ValidationError::CookingTimeTooShort(fields.cooking_time));
    }
    Ok(())
}
