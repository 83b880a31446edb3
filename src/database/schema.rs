// Copyright 2023 Remi Bernotavicius

//! Table definitions matching `migrations/`. Edit alongside any new migration.

diesel::table! {
    favorites (id) {
        id -> Integer,
        user_id -> Integer,
        recipe_id -> Integer,
    }
}

diesel::table! {
    ingredients (id) {
        id -> Integer,
        name -> Text,
        measurement_unit -> Text,
    }
}

diesel::table! {
    recipe_ingredients (id) {
        id -> Integer,
        recipe_id -> Integer,
        ingredient_id -> Integer,
        amount -> BigInt,
    }
}

diesel::table! {
    recipes (id) {
        id -> Integer,
        author_id -> Integer,
        name -> Text,
        image -> Text,
        text -> Text,
        cooking_time -> Integer,
        created_at -> Timestamp,
    }
}

diesel::table! {
    shopping_carts (id) {
        id -> Integer,
        user_id -> Integer,
        recipe_id -> Integer,
    }
}

diesel::table! {
    subscriptions (id) {
        id -> Integer,
        user_id -> Integer,
        author_id -> Integer,
    }
}

diesel::table! {
    users (id) {
        id -> Integer,
        email -> Text,
        username -> Text,
        first_name -> Text,
        last_name -> Text,
    }
}

diesel::joinable!(favorites -> recipes (recipe_id));
diesel::joinable!(favorites -> users (user_id));
diesel::joinable!(recipe_ingredients -> ingredients (ingredient_id));
diesel::joinable!(recipe_ingredients -> recipes (recipe_id));
diesel::joinable!(recipes -> users (author_id));
diesel::joinable!(shopping_carts -> recipes (recipe_id));
diesel::joinable!(shopping_carts -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    favorites,
    ingredients,
    recipe_ingredients,
    recipes,
    shopping_carts,
    subscriptions,
    users,
);
