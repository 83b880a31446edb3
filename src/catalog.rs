// Copyright 2023 Remi Bernotavicius

//! The ingredient catalog. Ingredients are identified by their `(name, measurement_unit)` pair
//! and the table carries a uniqueness constraint on it, so loading the same record twice never
//! produces a duplicate.

use crate::database;
use crate::database::models::{Ingredient, IngredientId, NewIngredient};
use crate::{Error, Result};
use diesel::prelude::OptionalExtension as _;
use diesel::BoolExpressionMethods as _;
use diesel::ExpressionMethods as _;
use diesel::QueryDsl as _;
use diesel::RunQueryDsl as _;
use diesel::SelectableHelper as _;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: usize,
    pub skipped: usize,
}

/// Bulk-loads ingredients. Pairs already in the catalog are left untouched.
pub fn import(
    conn: &mut database::Connection,
    records: impl IntoIterator<Item = NewIngredient>,
) -> Result<ImportReport> {
    use database::schema::ingredients::dsl::*;

    let records: Vec<NewIngredient> = records.into_iter().collect();
    let total = records.len();

    let inserted = conn.immediate_transaction::<_, Error, _>(|conn| {
        let mut inserted = 0;
        const BATCH_SIZE: usize = 500;
        for batch in records.chunks(BATCH_SIZE) {
            inserted += diesel::insert_or_ignore_into(ingredients)
                .values(batch)
                .execute(conn)?;
        }
        Ok(inserted)
    })?;

    let report = ImportReport {
        inserted,
        skipped: total - inserted,
    };
    log::info!(
        "imported {} ingredients ({} already present)",
        report.inserted,
        report.skipped
    );
    Ok(report)
}

/// Reads an ingredient list of the form `[{"name": ..., "measurement_unit": ...}, ...]`.
pub fn load_json(path: impl AsRef<Path>) -> Result<Vec<NewIngredient>> {
    let file = std::io::BufReader::new(std::fs::File::open(path)?);
    Ok(serde_json::from_reader(file)?)
}

pub fn import_json(
    conn: &mut database::Connection,
    path: impl AsRef<Path>,
) -> Result<ImportReport> {
    import(conn, load_json(path)?)
}

/// Returns the ingredient for the pair, inserting it on first reference.
pub fn get_or_create(
    conn: &mut database::Connection,
    new_name: &str,
    new_unit: &str,
) -> Result<Ingredient> {
    use database::schema::ingredients::dsl::*;

    conn.immediate_transaction(|conn| {
        diesel::insert_or_ignore_into(ingredients)
            .values((name.eq(new_name), measurement_unit.eq(new_unit)))
            .execute(conn)?;
        Ok(ingredients
            .select(Ingredient::as_select())
            .filter(name.eq(new_name).and(measurement_unit.eq(new_unit)))
            .get_result(conn)?)
    })
}

pub fn get(conn: &mut database::Connection, ingredient_id: IngredientId) -> Result<Ingredient> {
    use database::schema::ingredients::dsl::*;

    ingredients
        .select(Ingredient::as_select())
        .filter(id.eq(ingredient_id))
        .get_result(conn)
        .optional()?
        .ok_or(Error::IngredientNotFound(ingredient_id))
}

/// Case-insensitive name prefix search, ordered by name. Case is folded for any script, not just
/// ASCII.
pub fn search(conn: &mut database::Connection, prefix: &str) -> Result<Vec<Ingredient>> {
    use database::fold_case;
    use database::schema::ingredients::dsl::*;
    use diesel::expression_methods::EscapeExpressionMethods as _;
    use diesel::expression_methods::TextExpressionMethods as _;

    let escaped: String = prefix
        .to_lowercase()
        .chars()
        .flat_map(|c| match c {
            '%' | '_' | '\\' => vec!['\\', c],
            c => vec![c],
        })
        .collect();

    Ok(ingredients
        .select(Ingredient::as_select())
        .filter(fold_case(name).like(format!("{escaped}%")).escape('\\'))
        .order_by((name.asc(), measurement_unit.asc()))
        .load(conn)?)
}

/// Which of the given ids refer to catalog entries.
pub fn existing_ids(
    conn: &mut database::Connection,
    candidates: &[IngredientId],
) -> Result<HashSet<IngredientId>> {
    use database::schema::ingredients::dsl::*;

    Ok(ingredients
        .select(id)
        .filter(id.eq_any(candidates.to_vec()))
        .load::<IngredientId>(conn)?
        .into_iter()
        .collect())
}
