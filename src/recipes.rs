// Copyright 2023 Remi Bernotavicius

//! The recipe store. A recipe and its composition rows are always written in one immediate
//! transaction, and reads of a recipe with its composition happen in one read transaction, so no
//! reader sees a recipe half-way through an update.

use crate::catalog;
use crate::composition::{self, Composition, CompositionEntry, RecipeFields, ValidationError};
use crate::database;
use crate::database::models::{
    Amount, IngredientId, Recipe, RecipeId, RecipeIngredient, RecipeSummary, UserId,
};
use crate::membership::{Favorites, MembershipSet, ShoppingCart};
use crate::users::{self, UserView, Viewer};
use crate::{Error, Result};
use diesel::deserialize::Queryable;
use diesel::prelude::OptionalExtension as _;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::Connection as _;
use diesel::ExpressionMethods as _;
use diesel::QueryDsl as _;
use diesel::RunQueryDsl as _;
use diesel::SelectableHelper as _;
use std::collections::{HashMap, HashSet};

/// One line of a recipe's composition, resolved against the catalog.
#[derive(Queryable, Debug, Clone, PartialEq, Eq)]
pub struct IngredientAmount {
    pub id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeView {
    pub id: RecipeId,
    pub author: UserView,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub created_at: chrono::NaiveDateTime,
    pub ingredients: Vec<IngredientAmount>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecipeFilter {
    pub author: Option<UserId>,
    /// Only recipes the viewer has favorited. Ignored for anonymous viewers.
    pub is_favorited: bool,
    /// Only recipes in the viewer's shopping cart. Ignored for anonymous viewers.
    pub is_in_shopping_cart: bool,
    pub limit: Option<u32>,
}

fn validated(
    conn: &mut database::Connection,
    candidate: &[CompositionEntry],
) -> Result<Composition> {
    let ids: Vec<IngredientId> = candidate.iter().map(|e| e.ingredient_id).collect();
    let known = catalog::existing_ids(conn, &ids)?;
    Ok(composition::validate_composition(candidate, &known)?)
}

fn load(conn: &mut database::Connection, recipe_id: RecipeId) -> Result<Recipe> {
    use database::schema::recipes::dsl::*;

    recipes
        .select(Recipe::as_select())
        .filter(id.eq(recipe_id))
        .get_result(conn)
        .optional()?
        .ok_or(Error::RecipeNotFound(recipe_id))
}

fn load_owned(
    conn: &mut database::Connection,
    recipe_id: RecipeId,
    actor: UserId,
) -> Result<Recipe> {
    let recipe = load(conn, recipe_id)?;
    if recipe.author_id != actor {
        log::warn!("user {actor} tried to modify recipe {recipe_id} of user {}", recipe.author_id);
        return Err(Error::Forbidden {
            actor,
            recipe: recipe_id,
        });
    }
    Ok(recipe)
}

fn insert_composition(
    conn: &mut database::Connection,
    new_recipe_id: RecipeId,
    entries: impl Iterator<Item = (IngredientId, Amount)>,
) -> Result<()> {
    use database::schema::recipe_ingredients::dsl::*;

    let rows: Vec<_> = entries
        .map(|(new_ingredient_id, new_amount)| {
            (
                recipe_id.eq(new_recipe_id),
                ingredient_id.eq(new_ingredient_id),
                amount.eq(new_amount),
            )
        })
        .collect();
    if !rows.is_empty() {
        diesel::insert_into(recipe_ingredients)
            .values(rows)
            .execute(conn)?;
    }
    Ok(())
}

/// Brings the stored composition in line with `target` by touching only the rows that differ.
fn apply_composition(
    conn: &mut database::Connection,
    target_recipe_id: RecipeId,
    target: &Composition,
) -> Result<()> {
    use database::schema::recipe_ingredients::dsl::*;

    let current: Vec<RecipeIngredient> = recipe_ingredients
        .select(RecipeIngredient::as_select())
        .filter(recipe_id.eq(target_recipe_id))
        .load(conn)?;

    let stale: Vec<_> = current
        .iter()
        .filter(|row| !target.contains(row.ingredient_id))
        .map(|row| row.id)
        .collect();
    if !stale.is_empty() {
        diesel::delete(recipe_ingredients.filter(id.eq_any(stale))).execute(conn)?;
    }

    for row in &current {
        if let Some(new_amount) = target.get(row.ingredient_id) {
            if new_amount != row.amount {
                diesel::update(recipe_ingredients.filter(id.eq(row.id)))
                    .set(amount.eq(new_amount))
                    .execute(conn)?;
            }
        }
    }

    let present: HashSet<IngredientId> = current.iter().map(|row| row.ingredient_id).collect();
    insert_composition(
        conn,
        target_recipe_id,
        target.iter().filter(|(i, _)| !present.contains(i)),
    )
}

/// Turns stored recipes into what a viewer sees. Compositions, authors and the viewer's favorites
/// and cart are each fetched with a single query for the whole batch.
fn project(
    conn: &mut database::Connection,
    found: Vec<Recipe>,
    viewer: Viewer,
) -> Result<Vec<RecipeView>> {
    use database::schema::{ingredients, recipe_ingredients};

    let ids: Vec<RecipeId> = found.iter().map(|r| r.id).collect();

    let mut compositions: HashMap<RecipeId, Vec<IngredientAmount>> = HashMap::new();
    let rows: Vec<(RecipeId, IngredientAmount)> = recipe_ingredients::table
        .inner_join(ingredients::table)
        .select((
            recipe_ingredients::recipe_id,
            (
                ingredients::id,
                ingredients::name,
                ingredients::measurement_unit,
                recipe_ingredients::amount,
            ),
        ))
        .filter(recipe_ingredients::recipe_id.eq_any(ids.clone()))
        .order_by(recipe_ingredients::id.asc())
        .load(conn)?;
    for (recipe, line) in rows {
        compositions.entry(recipe).or_default().push(line);
    }

    let author_ids: Vec<UserId> = found
        .iter()
        .map(|r| r.author_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let authors = users::views(conn, &author_ids, viewer)?;

    let (favorited, in_cart) = match viewer.user() {
        Some(subject) => (
            Favorites::members_among(conn, subject, &ids)?,
            ShoppingCart::members_among(conn, subject, &ids)?,
        ),
        None => Default::default(),
    };

    found
        .into_iter()
        .map(|recipe| -> Result<RecipeView> {
            let author = authors
                .get(&recipe.author_id)
                .cloned()
                .ok_or(Error::UserNotFound(recipe.author_id))?;
            Ok(RecipeView {
                author,
                ingredients: compositions.remove(&recipe.id).unwrap_or_default(),
                is_favorited: favorited.contains(&recipe.id),
                is_in_shopping_cart: in_cart.contains(&recipe.id),
                id: recipe.id,
                name: recipe.name,
                image: recipe.image,
                text: recipe.text,
                cooking_time: recipe.cooking_time,
                created_at: recipe.created_at,
            })
        })
        .collect()
}

fn project_one(
    conn: &mut database::Connection,
    recipe: Recipe,
    viewer: Viewer,
) -> Result<RecipeView> {
    let recipe_id = recipe.id;
    project(conn, vec![recipe], viewer)?
        .pop()
        .ok_or(Error::RecipeNotFound(recipe_id))
}

pub fn create(
    conn: &mut database::Connection,
    author: UserId,
    fields: RecipeFields,
    candidate: &[CompositionEntry],
) -> Result<RecipeView> {
    use database::schema::recipes::dsl::*;

    composition::validate_fields(&fields)?;

    let view = conn.immediate_transaction::<_, Error, _>(|conn| {
        let new_composition = validated(conn, candidate)?;

        let recipe: Recipe = diesel::insert_into(recipes)
            .values((
                author_id.eq(author),
                name.eq(&fields.name),
                image.eq(&fields.image),
                text.eq(&fields.text),
                cooking_time.eq(fields.cooking_time),
                created_at.eq(chrono::Utc::now().naive_utc()),
            ))
            .returning(Recipe::as_returning())
            .get_result(conn)
            .map_err(|e| match e {
                DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                    Error::UserNotFound(author)
                }
                e => e.into(),
            })?;
        insert_composition(conn, recipe.id, new_composition.iter())?;

        project_one(conn, recipe, Viewer::User(author))
    })?;

    log::info!(
        "user {author} created recipe {} with {} ingredients",
        view.id,
        view.ingredients.len()
    );
    Ok(view)
}

/// Replaces every field and the whole composition. The composition must be supplied; `None` is
/// rejected with [`ValidationError::CompositionRequired`] rather than read as "unchanged".
pub fn update(
    conn: &mut database::Connection,
    recipe_id: RecipeId,
    actor: UserId,
    fields: RecipeFields,
    candidate: Option<&[CompositionEntry]>,
) -> Result<RecipeView> {
    use database::schema::recipes::dsl::*;

    let view = conn.immediate_transaction::<_, Error, _>(|conn| {
        load_owned(conn, recipe_id, actor)?;

        let candidate = candidate.ok_or(ValidationError::CompositionRequired)?;
        composition::validate_fields(&fields)?;
        let new_composition = validated(conn, candidate)?;

        let recipe: Recipe = diesel::update(recipes.filter(id.eq(recipe_id)))
            .set((
                name.eq(&fields.name),
                image.eq(&fields.image),
                text.eq(&fields.text),
                cooking_time.eq(fields.cooking_time),
            ))
            .returning(Recipe::as_returning())
            .get_result(conn)?;
        apply_composition(conn, recipe_id, &new_composition)?;

        project_one(conn, recipe, Viewer::User(actor))
    })?;

    log::info!("user {actor} updated recipe {recipe_id}");
    Ok(view)
}

/// Deletes the recipe. Its composition rows and every favorite and cart edge pointing at it go
/// with it through the foreign keys, inside the same transaction.
pub fn delete(conn: &mut database::Connection, recipe_id: RecipeId, actor: UserId) -> Result<()> {
    use database::schema::recipes::dsl::*;

    conn.immediate_transaction::<_, Error, _>(|conn| {
        load_owned(conn, recipe_id, actor)?;
        diesel::delete(recipes.filter(id.eq(recipe_id))).execute(conn)?;
        Ok(())
    })?;

    log::info!("user {actor} deleted recipe {recipe_id}");
    Ok(())
}

pub fn read(
    conn: &mut database::Connection,
    recipe_id: RecipeId,
    viewer: Viewer,
) -> Result<RecipeView> {
    conn.transaction::<_, Error, _>(|conn| {
        let recipe = load(conn, recipe_id)?;
        project_one(conn, recipe, viewer)
    })
}

/// Newest first.
pub fn list(
    conn: &mut database::Connection,
    filter: &RecipeFilter,
    viewer: Viewer,
) -> Result<Vec<RecipeView>> {
    use database::schema::{favorites, recipes, shopping_carts};

    conn.transaction::<_, Error, _>(|conn| {
        let mut query = recipes::table
            .select(Recipe::as_select())
            .order_by(recipes::id.desc())
            .into_boxed();

        if let Some(author) = filter.author {
            query = query.filter(recipes::author_id.eq(author));
        }
        if let Some(subject) = viewer.user() {
            if filter.is_favorited {
                query = query.filter(
                    recipes::id.eq_any(
                        favorites::table
                            .select(favorites::recipe_id)
                            .filter(favorites::user_id.eq(subject)),
                    ),
                );
            }
            if filter.is_in_shopping_cart {
                query = query.filter(
                    recipes::id.eq_any(
                        shopping_carts::table
                            .select(shopping_carts::recipe_id)
                            .filter(shopping_carts::user_id.eq(subject)),
                    ),
                );
            }
        }
        if let Some(limit) = filter.limit {
            query = query.limit(i64::from(limit));
        }

        let found = query.load(conn)?;
        project(conn, found, viewer)
    })
}

/// The short representation returned when a recipe is favorited or added to a cart.
pub fn summary(conn: &mut database::Connection, recipe_id: RecipeId) -> Result<RecipeSummary> {
    use database::schema::recipes::dsl::*;

    recipes
        .select(RecipeSummary::as_select())
        .filter(id.eq(recipe_id))
        .get_result(conn)
        .optional()?
        .ok_or(Error::RecipeNotFound(recipe_id))
}

/// Adds the recipe to one of the user's recipe sets ([`Favorites`] or [`ShoppingCart`]) and
/// returns its short form.
pub fn add_to<S>(
    conn: &mut database::Connection,
    user: UserId,
    recipe_id: RecipeId,
) -> Result<RecipeSummary>
where
    S: MembershipSet<Object = RecipeId>,
{
    conn.immediate_transaction::<_, Error, _>(|conn| {
        S::add(conn, user, recipe_id)?;
        summary(conn, recipe_id)
    })
}

pub fn short_link(
    conn: &mut database::Connection,
    recipe_id: RecipeId,
    base: &str,
) -> Result<String> {
    let recipe = summary(conn, recipe_id)?;
    Ok(format!("{}/s/{:03x}", base.trim_end_matches('/'), recipe.id.0))
}
