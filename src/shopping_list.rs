// Copyright 2023 Remi Bernotavicius

//! Collapses everything in a user's shopping cart into one list of ingredients to buy.

use crate::database;
use crate::database::models::{Amount, UserId};
use crate::{Error, Result};
use diesel::ExpressionMethods as _;
use diesel::JoinOnDsl as _;
use diesel::QueryDsl as _;
use diesel::RunQueryDsl as _;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub total: Amount,
}

impl fmt::Display for ShoppingListItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} – {} {}", self.name, self.total, self.measurement_unit)
    }
}

/// Items are ordered by ingredient name, then unit.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShoppingList {
    items: Vec<ShoppingListItem>,
}

impl ShoppingList {
    pub fn iter(&self) -> std::slice::Iter<'_, ShoppingListItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::from("Shopping list:\n\n");
        let lines: Vec<String> = self.items.iter().map(|i| i.to_string()).collect();
        out.push_str(&lines.join("\n"));
        out
    }
}

impl IntoIterator for ShoppingList {
    type Item = ShoppingListItem;
    type IntoIter = std::vec::IntoIter<ShoppingListItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a ShoppingList {
    type Item = &'a ShoppingListItem;
    type IntoIter = std::slice::Iter<'a, ShoppingListItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

fn fold(
    lines: impl IntoIterator<Item = (String, String, Amount)>,
) -> Result<BTreeMap<(String, String), Amount>> {
    let mut totals = BTreeMap::new();
    for (name, unit, amount) in lines {
        let key = (name, unit);
        let total = totals.get(&key).copied().unwrap_or(Amount::ZERO);
        let total = total.checked_add(amount).ok_or_else(|| Error::AmountOverflow {
            name: key.0.clone(),
            measurement_unit: key.1.clone(),
        })?;
        totals.insert(key, total);
    }
    Ok(totals)
}

/// Sums the composition of every recipe in the user's cart. Ingredients are grouped by name and
/// unit, so the same name measured in different units gives separate items. Nothing is cached;
/// every call reads the cart afresh.
pub fn aggregate(conn: &mut database::Connection, user: UserId) -> Result<ShoppingList> {
    use database::schema::{ingredients, recipe_ingredients, shopping_carts};

    let lines: Vec<(String, String, Amount)> = shopping_carts::table
        .inner_join(
            recipe_ingredients::table
                .on(recipe_ingredients::recipe_id.eq(shopping_carts::recipe_id)),
        )
        .inner_join(ingredients::table.on(ingredients::id.eq(recipe_ingredients::ingredient_id)))
        .filter(shopping_carts::user_id.eq(user))
        .select((
            ingredients::name,
            ingredients::measurement_unit,
            recipe_ingredients::amount,
        ))
        .load(conn)?;

    let items: Vec<ShoppingListItem> = fold(lines)?
        .into_iter()
        .map(|((name, measurement_unit), total)| ShoppingListItem {
            name,
            measurement_unit,
            total,
        })
        .collect();
    log::debug!("shopping list for user {user} has {} items", items.len());
    Ok(ShoppingList { items })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::{CompositionEntry, ValidationError};
    use crate::membership::{MembershipSet as _, ShoppingCart};
    use crate::recipes;
    use crate::testing;

    fn item(name: &str, unit: &str, total: Amount) -> ShoppingListItem {
        ShoppingListItem {
            name: name.into(),
            measurement_unit: unit.into(),
            total,
        }
    }

    #[test]
    fn sums_across_recipes() {
        let mut conn = testing::connection();
        let cook = testing::user(&mut conn, "cook");
        let flour = testing::ingredient(&mut conn, "Flour", "g");
        let salt = testing::ingredient(&mut conn, "Salt", "g");
        let egg = testing::ingredient(&mut conn, "Egg", "pcs");

        let a = testing::recipe(
            &mut conn,
            cook,
            "A",
            &[(flour, Amount::whole(200)), (salt, Amount::whole(5))],
        );
        let b = testing::recipe(
            &mut conn,
            cook,
            "B",
            &[(flour, Amount::whole(100)), (egg, Amount::whole(2))],
        );
        ShoppingCart::add(&mut conn, cook, a).unwrap();
        ShoppingCart::add(&mut conn, cook, b).unwrap();

        let list: Vec<_> = aggregate(&mut conn, cook).unwrap().into_iter().collect();
        assert_eq!(
            list,
            vec![
                item("Egg", "pcs", Amount::whole(2)),
                item("Flour", "g", Amount::whole(300)),
                item("Salt", "g", Amount::whole(5)),
            ]
        );
    }

    #[test]
    fn units_stay_separate() {
        let mut conn = testing::connection();
        let cook = testing::user(&mut conn, "cook");
        let sugar_g = testing::ingredient(&mut conn, "sugar", "g");
        let sugar_spoon = testing::ingredient(&mut conn, "sugar", "tbsp");

        let tea = testing::recipe(&mut conn, cook, "tea", &[(sugar_spoon, Amount::whole(2))]);
        let cake = testing::recipe(
            &mut conn,
            cook,
            "cake",
            &[
                (sugar_g, Amount::whole(150)),
                (sugar_spoon, Amount::from_hundredths(150)),
            ],
        );
        ShoppingCart::add(&mut conn, cook, tea).unwrap();
        ShoppingCart::add(&mut conn, cook, cake).unwrap();

        let list: Vec<_> = aggregate(&mut conn, cook).unwrap().into_iter().collect();
        assert_eq!(
            list,
            vec![
                item("sugar", "g", Amount::whole(150)),
                item("sugar", "tbsp", Amount::from_hundredths(350)),
            ]
        );
    }

    #[test]
    fn only_the_users_cart_counts() {
        let mut conn = testing::connection();
        let cook = testing::user(&mut conn, "cook");
        let other = testing::user(&mut conn, "other");
        let rice = testing::ingredient(&mut conn, "rice", "g");
        let pilaf = testing::recipe(&mut conn, cook, "pilaf", &[(rice, Amount::whole(300))]);

        assert!(aggregate(&mut conn, cook).unwrap().is_empty());

        ShoppingCart::add(&mut conn, other, pilaf).unwrap();
        assert!(aggregate(&mut conn, cook).unwrap().is_empty());
        assert_eq!(aggregate(&mut conn, other).unwrap().len(), 1);
    }

    #[test]
    fn recomputed_after_changes() {
        let mut conn = testing::connection();
        let cook = testing::user(&mut conn, "cook");
        let rice = testing::ingredient(&mut conn, "rice", "g");
        let pilaf = testing::recipe(&mut conn, cook, "pilaf", &[(rice, Amount::whole(300))]);
        ShoppingCart::add(&mut conn, cook, pilaf).unwrap();

        let before = aggregate(&mut conn, cook).unwrap();
        assert_eq!(before.iter().next().unwrap().total, Amount::whole(300));

        recipes::delete(&mut conn, pilaf, cook).unwrap();
        assert!(aggregate(&mut conn, cook).unwrap().is_empty());
        assert_eq!(before.len(), 1);
    }

    #[test]
    fn overflowing_total_is_an_error() {
        let huge = Amount::from_hundredths(i64::MAX / 2 + 1);
        let lines = vec![
            ("Flour".to_string(), "g".to_string(), huge),
            ("Flour".to_string(), "g".to_string(), huge),
        ];
        assert!(matches!(
            fold(lines),
            Err(Error::AmountOverflow { name, measurement_unit })
                if name == "Flour" && measurement_unit == "g"
        ));
    }

    #[test]
    fn oversized_amounts_never_reach_the_cart() {
        let mut conn = testing::connection();
        let cook = testing::user(&mut conn, "cook");
        let flour = testing::ingredient(&mut conn, "Flour", "g");
        let huge = Amount::from_hundredths(i64::MAX / 2 + 1);

        let created = recipes::create(
            &mut conn,
            cook,
            testing::fields("brick"),
            &[CompositionEntry::new(flour, huge)],
        );
        assert!(matches!(
            created,
            Err(Error::Validation(ValidationError::AmountTooLarge(_, _)))
        ));

        let most = testing::recipe(&mut conn, cook, "most", &[(flour, Amount::MAX_INGREDIENT)]);
        let more = testing::recipe(&mut conn, cook, "more", &[(flour, Amount::MAX_INGREDIENT)]);
        ShoppingCart::add(&mut conn, cook, most).unwrap();
        ShoppingCart::add(&mut conn, cook, more).unwrap();
        let list: Vec<_> = aggregate(&mut conn, cook).unwrap().into_iter().collect();
        assert_eq!(
            list,
            vec![item("Flour", "g", Amount::from_hundredths(1_999_998))]
        );
    }

    #[test]
    fn render() {
        let list = ShoppingList {
            items: vec![
                item("Egg", "pcs", Amount::whole(2)),
                item("Flour", "g", Amount::from_hundredths(30050)),
            ],
        };
        assert_eq!(
            list.render(),
            "Shopping list:\n\nEgg – 2 pcs\nFlour – 300.5 g"
        );
        assert_eq!(ShoppingList::default().render(), "Shopping list:\n\n");
    }
}
