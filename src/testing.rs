// Copyright 2023 Remi Bernotavicius

use crate::catalog;
use crate::composition::{CompositionEntry, RecipeFields};
use crate::database::{self, models::*};
use crate::recipes;
use crate::users;
use std::path::Path;
use std::time::Duration;

pub fn connection() -> database::Connection {
    database::establish_connection(":memory:", Duration::from_secs(1)).unwrap()
}

pub fn connection_at(path: &Path) -> database::Connection {
    database::establish_connection(path, Duration::from_secs(10)).unwrap()
}

pub fn user(conn: &mut database::Connection, username: &str) -> UserId {
    users::register(
        conn,
        NewUser {
            email: format!("{username}@example.com"),
            username: username.into(),
            first_name: username.into(),
            last_name: "Testov".into(),
        },
    )
    .unwrap()
    .id
}

pub fn ingredient(conn: &mut database::Connection, name: &str, unit: &str) -> IngredientId {
    catalog::get_or_create(conn, name, unit).unwrap().id
}

pub fn fields(name: &str) -> RecipeFields {
    RecipeFields {
        name: name.into(),
        image: format!("recipes/{name}.png"),
        text: format!("How to make {name}"),
        cooking_time: 10,
    }
}

pub fn recipe(
    conn: &mut database::Connection,
    author: UserId,
    name: &str,
    composition: &[(IngredientId, Amount)],
) -> RecipeId {
    let composition: Vec<_> = composition
        .iter()
        .map(|&(id, amount)| CompositionEntry::new(id, amount))
        .collect();
    recipes::create(conn, author, fields(name), &composition)
        .unwrap()
        .id
}

/// A recipe with a single ingredient, for tests that don't care about the composition.
pub fn simple_recipe(conn: &mut database::Connection, author: UserId, name: &str) -> RecipeId {
    let bread = ingredient(conn, "bread", "slice");
    recipe(conn, author, name, &[(bread, Amount::whole(1))])
}
