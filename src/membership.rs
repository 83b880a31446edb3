// Copyright 2023 Remi Bernotavicius

//! Favorites, shopping carts and subscriptions. Each is a set of `(user, object)` edges with a
//! uniqueness constraint in the database; the constraint, not a prior lookup, decides which of two
//! racing `add` calls wins.

use crate::database;
use crate::database::models::{RecipeId, UserId};
use crate::{Error, Result};
use derive_more::Display;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use std::collections::HashSet;
use std::hash::Hash;
use strum::EnumIter;

#[derive(Debug, Display, EnumIter, Hash, Copy, Clone, PartialEq, Eq)]
pub enum MembershipKind {
    #[display("favorites")]
    Favorites,
    #[display("shopping cart")]
    ShoppingCart,
    #[display("subscriptions")]
    Subscriptions,
}

impl MembershipKind {
    pub fn iter() -> impl Iterator<Item = Self> {
        <Self as strum::IntoEnumIterator>::iter()
    }
}

pub trait MembershipSet {
    type Object: Copy + Eq + Hash;

    const KIND: MembershipKind;

    /// Fails with [`Error::AlreadyExists`] when the edge is already present.
    fn add(conn: &mut database::Connection, subject: UserId, object: Self::Object) -> Result<()>;

    /// Fails with [`Error::NotFound`] when there is no such edge.
    fn remove(conn: &mut database::Connection, subject: UserId, object: Self::Object)
        -> Result<()>;

    fn exists(
        conn: &mut database::Connection,
        subject: UserId,
        object: Self::Object,
    ) -> Result<bool>;

    /// The subset of `objects` the subject has an edge to, in one query.
    fn members_among(
        conn: &mut database::Connection,
        subject: UserId,
        objects: &[Self::Object],
    ) -> Result<HashSet<Self::Object>>;

    /// Every object the subject has an edge to.
    fn objects(conn: &mut database::Connection, subject: UserId) -> Result<Vec<Self::Object>>;

    fn is_self_reference(_subject: UserId, _object: Self::Object) -> bool {
        false
    }
}

/// Tells apart which side of a failed edge insert is missing.
fn user_exists(conn: &mut database::Connection, user: UserId) -> Result<bool> {
    use database::schema::users::dsl::*;
    use diesel::ExpressionMethods as _;
    use diesel::QueryDsl as _;
    use diesel::RunQueryDsl as _;

    let found = diesel::select(diesel::dsl::exists(users.filter(id.eq(user))))
        .get_result(conn)?;
    Ok(found)
}

macro_rules! membership_set {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:ident, $table:ident, $column:ident, $object:ty, $missing:path
        $(, { $($extra:tt)* })?
    ) => {
        $(#[$meta])*
        pub struct $name;

        impl MembershipSet for $name {
            type Object = $object;

            const KIND: MembershipKind = MembershipKind::$kind;

            fn add(
                conn: &mut database::Connection,
                subject: UserId,
                object: $object,
            ) -> Result<()> {
                use database::schema::$table::dsl;
                use diesel::ExpressionMethods as _;
                use diesel::RunQueryDsl as _;

                if Self::is_self_reference(subject, object) {
                    log::warn!("user {subject} tried to add themselves to their {}", Self::KIND);
                    return Err(Error::SelfReferenceNotAllowed);
                }

                let inserted = diesel::insert_into(dsl::$table)
                    .values((dsl::user_id.eq(subject), dsl::$column.eq(object)))
                    .execute(conn);
                match inserted {
                    Ok(_) => {
                        log::debug!("added {object} to {} of user {subject}", Self::KIND);
                        Ok(())
                    }
                    Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                        Err(Error::AlreadyExists {
                            kind: Self::KIND,
                            subject,
                            object: object.0,
                        })
                    }
                    Err(DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _)) => {
                        if user_exists(conn, subject)? {
                            Err($missing(object))
                        } else {
                            Err(Error::UserNotFound(subject))
                        }
                    }
                    Err(e) => Err(e.into()),
                }
            }

            fn remove(
                conn: &mut database::Connection,
                subject: UserId,
                object: $object,
            ) -> Result<()> {
                use database::schema::$table::dsl;
                use diesel::ExpressionMethods as _;
                use diesel::QueryDsl as _;
                use diesel::RunQueryDsl as _;

                let deleted = diesel::delete(
                    dsl::$table
                        .filter(dsl::user_id.eq(subject))
                        .filter(dsl::$column.eq(object)),
                )
                .execute(conn)?;
                if deleted == 0 {
                    return Err(Error::NotFound {
                        kind: Self::KIND,
                        subject,
                        object: object.0,
                    });
                }
                log::debug!("removed {object} from {} of user {subject}", Self::KIND);
                Ok(())
            }

            fn exists(
                conn: &mut database::Connection,
                subject: UserId,
                object: $object,
            ) -> Result<bool> {
                use database::schema::$table::dsl;
                use diesel::ExpressionMethods as _;
                use diesel::QueryDsl as _;
                use diesel::RunQueryDsl as _;

                Ok(diesel::select(diesel::dsl::exists(
                    dsl::$table
                        .filter(dsl::user_id.eq(subject))
                        .filter(dsl::$column.eq(object)),
                ))
                .get_result(conn)?)
            }

            fn members_among(
                conn: &mut database::Connection,
                subject: UserId,
                objects: &[$object],
            ) -> Result<HashSet<$object>> {
                use database::schema::$table::dsl;
                use diesel::ExpressionMethods as _;
                use diesel::QueryDsl as _;
                use diesel::RunQueryDsl as _;

                if objects.is_empty() {
                    return Ok(HashSet::new());
                }
                Ok(dsl::$table
                    .select(dsl::$column)
                    .filter(dsl::user_id.eq(subject))
                    .filter(dsl::$column.eq_any(objects.to_vec()))
                    .load::<$object>(conn)?
                    .into_iter()
                    .collect())
            }

            fn objects(
                conn: &mut database::Connection,
                subject: UserId,
            ) -> Result<Vec<$object>> {
                use database::schema::$table::dsl;
                use diesel::ExpressionMethods as _;
                use diesel::QueryDsl as _;
                use diesel::RunQueryDsl as _;

                Ok(dsl::$table
                    .select(dsl::$column)
                    .filter(dsl::user_id.eq(subject))
                    .order_by(dsl::id.asc())
                    .load(conn)?)
            }

            $($($extra)*)?
        }
    };
}

membership_set!(
    /// Recipes a user has marked as favorite.
    Favorites,
    Favorites,
    favorites,
    recipe_id,
    RecipeId,
    Error::RecipeNotFound
);

membership_set!(
    /// Recipes a user wants to shop for.
    ShoppingCart,
    ShoppingCart,
    shopping_carts,
    recipe_id,
    RecipeId,
    Error::RecipeNotFound
);

membership_set!(
    /// Authors a user follows.
    Subscriptions,
    Subscriptions,
    subscriptions,
    author_id,
    UserId,
    Error::UserNotFound,
    {
        fn is_self_reference(subject: UserId, author: UserId) -> bool {
            subject == author
        }
    }
);
