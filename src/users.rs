// Copyright 2023 Remi Bernotavicius

//! Users are owned by the authentication service. This crate keeps only the profile columns it
//! needs so that recipes and edges can reference their owners, and so that deleting an account
//! cascades.

use crate::database;
use crate::database::models::{NewUser, RecipeSummary, User, UserId};
use crate::membership::{MembershipSet as _, Subscriptions};
use crate::{Error, Result};
use diesel::prelude::OptionalExtension as _;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::Connection as _;
use diesel::ExpressionMethods as _;
use diesel::JoinOnDsl as _;
use diesel::QueryDsl as _;
use diesel::RunQueryDsl as _;
use diesel::SelectableHelper as _;
use std::collections::HashMap;

/// Who is asking, as established by the authentication service.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    User(UserId),
}

impl Viewer {
    pub fn user(self) -> Option<UserId> {
        match self {
            Self::Anonymous => None,
            Self::User(id) => Some(id),
        }
    }
}

impl From<UserId> for Viewer {
    fn from(id: UserId) -> Self {
        Self::User(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserView {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl UserView {
    fn new(user: User, is_subscribed: bool) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            is_subscribed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionView {
    pub author: UserView,
    pub recipes: Vec<RecipeSummary>,
    pub recipes_count: usize,
}

pub fn register(conn: &mut database::Connection, new_user: NewUser) -> Result<User> {
    use database::schema::users::dsl::*;

    diesel::insert_into(users)
        .values(&new_user)
        .returning(User::as_returning())
        .get_result(conn)
        .map_err(|e| match e {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                Error::AccountExists {
                    email: new_user.email.clone(),
                }
            }
            e => e.into(),
        })
}

pub fn get(conn: &mut database::Connection, user_id: UserId) -> Result<User> {
    use database::schema::users::dsl::*;

    users
        .select(User::as_select())
        .filter(id.eq(user_id))
        .get_result(conn)
        .optional()?
        .ok_or(Error::UserNotFound(user_id))
}

/// Removes the account along with the user's recipes and every edge touching either.
pub fn delete(conn: &mut database::Connection, user_id: UserId) -> Result<()> {
    use database::schema::users::dsl::*;

    let deleted = diesel::delete(users.filter(id.eq(user_id))).execute(conn)?;
    if deleted == 0 {
        return Err(Error::UserNotFound(user_id));
    }
    log::info!("deleted user {user_id}");
    Ok(())
}

pub fn profile(
    conn: &mut database::Connection,
    user_id: UserId,
    viewer: Viewer,
) -> Result<UserView> {
    conn.transaction(|conn| {
        let user = get(conn, user_id)?;
        let is_subscribed = match viewer.user() {
            Some(subject) => Subscriptions::exists(conn, subject, user_id)?,
            None => false,
        };
        Ok(UserView::new(user, is_subscribed))
    })
}

/// Profiles for a set of users with one query for the users and one for the viewer's
/// subscriptions.
pub(crate) fn views(
    conn: &mut database::Connection,
    ids: &[UserId],
    viewer: Viewer,
) -> Result<HashMap<UserId, UserView>> {
    use database::schema::users::dsl::*;

    let found: Vec<User> = users
        .select(User::as_select())
        .filter(id.eq_any(ids.to_vec()))
        .load(conn)?;
    let subscribed = match viewer.user() {
        Some(subject) => Subscriptions::members_among(conn, subject, ids)?,
        None => Default::default(),
    };
    Ok(found
        .into_iter()
        .map(|u| {
            let is_subscribed = subscribed.contains(&u.id);
            (u.id, UserView::new(u, is_subscribed))
        })
        .collect())
}

/// The authors `user` follows, ordered by username, each with their newest recipes (at most
/// `recipes_limit` of them) and their total recipe count.
pub fn subscriptions(
    conn: &mut database::Connection,
    user: UserId,
    recipes_limit: Option<usize>,
) -> Result<Vec<SubscriptionView>> {
    use database::schema::{recipes, subscriptions, users};

    conn.transaction(|conn| {
        let authors: Vec<User> = users::table
            .inner_join(subscriptions::table.on(subscriptions::author_id.eq(users::id)))
            .filter(subscriptions::user_id.eq(user))
            .select(User::as_select())
            .order_by(users::username.asc())
            .load(conn)?;
        let author_ids: Vec<UserId> = authors.iter().map(|a| a.id).collect();

        let mut by_author: HashMap<UserId, Vec<RecipeSummary>> = HashMap::new();
        let written: Vec<(UserId, RecipeSummary)> = recipes::table
            .select((recipes::author_id, RecipeSummary::as_select()))
            .filter(recipes::author_id.eq_any(author_ids))
            .order_by(recipes::id.desc())
            .load(conn)?;
        for (author, recipe) in written {
            by_author.entry(author).or_default().push(recipe);
        }

        Ok(authors
            .into_iter()
            .map(|author| {
                let mut recipes = by_author.remove(&author.id).unwrap_or_default();
                let recipes_count = recipes.len();
                if let Some(limit) = recipes_limit {
                    recipes.truncate(limit);
                }
                SubscriptionView {
                    author: UserView::new(author, true),
                    recipes,
                    recipes_count,
                }
            })
            .collect())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::{Favorites, ShoppingCart};
    use crate::recipes;
    use crate::testing;

    #[test]
    fn register_twice() {
        let mut conn = testing::connection();
        testing::user(&mut conn, "alice");
        let again = register(
            &mut conn,
            NewUser {
                email: "alice@example.com".into(),
                username: "alice2".into(),
                first_name: "Alice".into(),
                last_name: "Again".into(),
            },
        );
        assert!(matches!(
            again,
            Err(Error::AccountExists { email }) if email == "alice@example.com"
        ));
    }

    #[test]
    fn profile_is_subscribed() {
        let mut conn = testing::connection();
        let fan = testing::user(&mut conn, "fan");
        let chef = testing::user(&mut conn, "chef");

        assert!(!profile(&mut conn, chef, Viewer::User(fan)).unwrap().is_subscribed);
        Subscriptions::add(&mut conn, fan, chef).unwrap();
        assert!(profile(&mut conn, chef, Viewer::User(fan)).unwrap().is_subscribed);
        assert!(!profile(&mut conn, chef, Viewer::Anonymous).unwrap().is_subscribed);
        assert!(!profile(&mut conn, fan, Viewer::User(chef)).unwrap().is_subscribed);

        assert!(matches!(
            profile(&mut conn, UserId(77), Viewer::Anonymous),
            Err(Error::UserNotFound(UserId(77)))
        ));
    }

    #[test]
    fn subscription_listing() {
        let mut conn = testing::connection();
        let fan = testing::user(&mut conn, "fan");
        let zed = testing::user(&mut conn, "zed");
        let amy = testing::user(&mut conn, "amy");
        let ignored = testing::user(&mut conn, "ignored");

        let soup = testing::simple_recipe(&mut conn, zed, "soup");
        let stew = testing::simple_recipe(&mut conn, zed, "stew");
        let pie = testing::simple_recipe(&mut conn, zed, "pie");
        testing::simple_recipe(&mut conn, ignored, "cake");

        Subscriptions::add(&mut conn, fan, zed).unwrap();
        Subscriptions::add(&mut conn, fan, amy).unwrap();

        let listing = subscriptions(&mut conn, fan, Some(2)).unwrap();
        let names: Vec<_> = listing.iter().map(|s| s.author.username.as_str()).collect();
        assert_eq!(names, vec!["amy", "zed"]);
        assert!(listing.iter().all(|s| s.author.is_subscribed));

        assert_eq!(listing[0].recipes_count, 0);
        assert!(listing[0].recipes.is_empty());

        assert_eq!(listing[1].recipes_count, 3);
        let ids: Vec<_> = listing[1].recipes.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![pie, stew]);

        let unlimited = subscriptions(&mut conn, fan, None).unwrap();
        let ids: Vec<_> = unlimited[1].recipes.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![pie, stew, soup]);
    }

    #[test]
    fn delete_cascades() {
        let mut conn = testing::connection();
        let chef = testing::user(&mut conn, "chef");
        let fan = testing::user(&mut conn, "fan");
        let dish = testing::simple_recipe(&mut conn, chef, "dish");
        let fan_dish = testing::simple_recipe(&mut conn, fan, "fan dish");

        Favorites::add(&mut conn, fan, dish).unwrap();
        ShoppingCart::add(&mut conn, fan, dish).unwrap();
        Favorites::add(&mut conn, chef, fan_dish).unwrap();
        Subscriptions::add(&mut conn, fan, chef).unwrap();
        Subscriptions::add(&mut conn, chef, fan).unwrap();

        delete(&mut conn, chef).unwrap();

        assert!(matches!(
            recipes::read(&mut conn, dish, Viewer::Anonymous),
            Err(Error::RecipeNotFound(_))
        ));
        assert!(!Favorites::exists(&mut conn, fan, dish).unwrap());
        assert!(!ShoppingCart::exists(&mut conn, fan, dish).unwrap());
        assert!(!Favorites::exists(&mut conn, chef, fan_dish).unwrap());
        assert!(!Subscriptions::exists(&mut conn, fan, chef).unwrap());
        assert!(!Subscriptions::exists(&mut conn, chef, fan).unwrap());
        assert!(recipes::read(&mut conn, fan_dish, Viewer::Anonymous).is_ok());

        assert!(matches!(
            delete(&mut conn, chef),
            Err(Error::UserNotFound(_))
        ));
    }
}
