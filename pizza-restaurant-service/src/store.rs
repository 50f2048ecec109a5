use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PoolError};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::{debug, info};

use crate::models::{
    NewPizza, NewRestaurant, NewRestaurantPizza, Pizza, Restaurant, RestaurantPizza,
};
use crate::schema::{pizzas, restaurant_pizzas, restaurants};
use crate::validation::ValidationError;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

pub const IN_MEMORY: &str = ":memory:";

pub type SqlitePool = Pool<ConnectionManager<SqliteConnection>>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{}", .0.join(", "))]
    ReferentialIntegrity(Vec<String>),
    #[error("database error: {0}")]
    Database(#[from] DieselError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] PoolError),
    #[error("storage task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),
    #[error("migration failed: {0}")]
    Migration(String),
}

#[derive(Debug)]
struct ConnectionOptions;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Handle to the relational store, passed to request handlers through axum
/// state.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn connect(database_url: &str, pool_size: u32) -> Result<Self, StoreError> {
        let manager = ConnectionManager::<SqliteConnection>::new(database_url);
        let builder = SqlitePool::builder().connection_customizer(Box::new(ConnectionOptions));

        // every connection to :memory: opens its own database
        let pool = if database_url == IN_MEMORY {
            builder
                .max_size(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .build(manager)?
        } else {
            builder
                .max_size(pool_size.max(1))
                .connection_timeout(Duration::from_secs(10))
                .build(manager)?
        };

        debug!(database_url, "connection pool ready");
        Ok(Self { pool })
    }

    /// Private in-memory database with the schema already applied.
    pub fn in_memory() -> Result<Self, StoreError> {
        let store = Self::connect(IN_MEMORY, 1)?;
        store.migrate()?;
        Ok(store)
    }

    pub fn migrate(&self) -> Result<usize, StoreError> {
        let mut conn = self.pool.get()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        for version in &applied {
            info!(%version, "applied migration");
        }
        Ok(applied.len())
    }

    /// Runs `f` with a pooled connection on the blocking thread pool.
    pub async fn run<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut *conn)
        })
        .await?
    }

    pub fn get(
        &self,
    ) -> Result<diesel::r2d2::PooledConnection<ConnectionManager<SqliteConnection>>, StoreError>
    {
        Ok(self.pool.get()?)
    }
}

pub fn list_restaurants(conn: &mut SqliteConnection) -> QueryResult<Vec<Restaurant>> {
    restaurants::table
        .select(Restaurant::as_select())
        .order(restaurants::id.asc())
        .load(conn)
}

pub fn find_restaurant(conn: &mut SqliteConnection, id: i32) -> QueryResult<Option<Restaurant>> {
    restaurants::table
        .find(id)
        .select(Restaurant::as_select())
        .first(conn)
        .optional()
}

pub fn create_restaurant(
    conn: &mut SqliteConnection,
    restaurant: &NewRestaurant,
) -> QueryResult<Restaurant> {
    diesel::insert_into(restaurants::table)
        .values(restaurant)
        .returning(Restaurant::as_returning())
        .get_result(conn)
}

/// Removes the restaurant together with every restaurant pizza that
/// references it. Returns `false` when no such restaurant exists.
///
/// Write transactions are `BEGIN IMMEDIATE`: a deferred one that reads first
/// cannot upgrade its lock while another connection holds a read lock.
pub fn delete_restaurant(conn: &mut SqliteConnection, id: i32) -> Result<bool, StoreError> {
    conn.immediate_transaction::<_, StoreError, _>(|conn| {
        let Some(restaurant) = find_restaurant(conn, id)? else {
            return Ok(false);
        };

        let removed = diesel::delete(RestaurantPizza::belonging_to(&restaurant)).execute(conn)?;
        diesel::delete(restaurants::table.find(restaurant.id)).execute(conn)?;

        debug!(restaurant_id = id, removed, "deleted restaurant");
        Ok(true)
    })
}

pub fn list_pizzas(conn: &mut SqliteConnection) -> QueryResult<Vec<Pizza>> {
    pizzas::table
        .select(Pizza::as_select())
        .order(pizzas::id.asc())
        .load(conn)
}

pub fn find_pizza(conn: &mut SqliteConnection, id: i32) -> QueryResult<Option<Pizza>> {
    pizzas::table
        .find(id)
        .select(Pizza::as_select())
        .first(conn)
        .optional()
}

pub fn create_pizza(conn: &mut SqliteConnection, pizza: &NewPizza) -> QueryResult<Pizza> {
    diesel::insert_into(pizzas::table)
        .values(pizza)
        .returning(Pizza::as_returning())
        .get_result(conn)
}

pub fn find_restaurant_pizza(
    conn: &mut SqliteConnection,
    id: i32,
) -> QueryResult<Option<RestaurantPizza>> {
    restaurant_pizzas::table
        .find(id)
        .select(RestaurantPizza::as_select())
        .first(conn)
        .optional()
}

pub fn create_restaurant_pizza(
    conn: &mut SqliteConnection,
    restaurant_pizza: &NewRestaurantPizza,
) -> Result<RestaurantPizza, StoreError> {
    create_restaurant_pizza_then(conn, restaurant_pizza, |_, created| Ok(created))
}

/// Inserts the restaurant pizza and hands the stored row to `then` inside the
/// same write transaction. An error from `then` rolls the insert back.
pub fn create_restaurant_pizza_then<T, F>(
    conn: &mut SqliteConnection,
    restaurant_pizza: &NewRestaurantPizza,
    then: F,
) -> Result<T, StoreError>
where
    F: FnOnce(&mut SqliteConnection, RestaurantPizza) -> Result<T, StoreError>,
{
    conn.immediate_transaction::<_, StoreError, _>(|conn| {
        let created = insert_restaurant_pizza(conn, restaurant_pizza)?;
        then(conn, created)
    })
}

/// Existence-checked insert without a transaction of its own; callers must
/// already be inside one.
pub fn insert_restaurant_pizza(
    conn: &mut SqliteConnection,
    restaurant_pizza: &NewRestaurantPizza,
) -> Result<RestaurantPizza, StoreError> {
    let mut missing = Vec::new();
    if find_pizza(conn, restaurant_pizza.pizza_id())?.is_none() {
        missing.push("Pizza not found".to_string());
    }
    if find_restaurant(conn, restaurant_pizza.restaurant_id())?.is_none() {
        missing.push("Restaurant not found".to_string());
    }
    if !missing.is_empty() {
        return Err(StoreError::ReferentialIntegrity(missing));
    }

    insert_restaurant_pizza_row(conn, restaurant_pizza)
}

fn insert_restaurant_pizza_row(
    conn: &mut SqliteConnection,
    restaurant_pizza: &NewRestaurantPizza,
) -> Result<RestaurantPizza, StoreError> {
    diesel::insert_into(restaurant_pizzas::table)
        .values(restaurant_pizza)
        .returning(RestaurantPizza::as_returning())
        .get_result(conn)
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                StoreError::ReferentialIntegrity(vec![info.message().to_string()])
            }
            err => StoreError::Database(err),
        })
}

pub fn restaurant_pizzas_of_restaurant(
    conn: &mut SqliteConnection,
    restaurant: &Restaurant,
) -> QueryResult<Vec<RestaurantPizza>> {
    RestaurantPizza::belonging_to(restaurant)
        .select(RestaurantPizza::as_select())
        .order(restaurant_pizzas::id.asc())
        .load(conn)
}

pub fn restaurant_pizzas_of_pizza(
    conn: &mut SqliteConnection,
    pizza: &Pizza,
) -> QueryResult<Vec<RestaurantPizza>> {
    RestaurantPizza::belonging_to(pizza)
        .select(RestaurantPizza::as_select())
        .order(restaurant_pizzas::id.asc())
        .load(conn)
}

/// Pizzas served by the restaurant, reached through its restaurant pizzas.
pub fn pizzas_of_restaurant(
    conn: &mut SqliteConnection,
    restaurant: &Restaurant,
) -> QueryResult<Vec<Pizza>> {
    RestaurantPizza::belonging_to(restaurant)
        .inner_join(pizzas::table)
        .select(Pizza::as_select())
        .order(restaurant_pizzas::id.asc())
        .load(conn)
}

/// Restaurants serving the pizza, reached through its restaurant pizzas.
pub fn restaurants_of_pizza(
    conn: &mut SqliteConnection,
    pizza: &Pizza,
) -> QueryResult<Vec<Restaurant>> {
    RestaurantPizza::belonging_to(pizza)
        .inner_join(restaurants::table)
        .select(Restaurant::as_select())
        .order(restaurant_pizzas::id.asc())
        .load(conn)
}

pub fn count_restaurant_pizzas(conn: &mut SqliteConnection) -> QueryResult<i64> {
    restaurant_pizzas::table.count().get_result(conn)
}

/// Deletes every row, children first. Runs in the caller's transaction.
pub fn delete_all(conn: &mut SqliteConnection) -> QueryResult<()> {
    diesel::delete(restaurant_pizzas::table).execute(conn)?;
    diesel::delete(pizzas::table).execute(conn)?;
    diesel::delete(restaurants::table).execute(conn)?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::validation::Price;

    pub(crate) fn seeded_store() -> Store {
        let store = Store::in_memory().unwrap();
        let conn = &mut store.get().unwrap();
        create_restaurant(
            conn,
            &NewRestaurant {
                name: "Karen's Pizza Shack",
                address: "address1",
            },
        )
        .unwrap();
        create_pizza(
            conn,
            &NewPizza {
                name: "Emma",
                ingredients: "Dough, Tomato Sauce, Cheese",
            },
        )
        .unwrap();
        store
    }

    #[test]
    fn test_find_missing_restaurant_is_none() {
        let store = Store::in_memory().unwrap();
        let conn = &mut store.get().unwrap();

        assert_eq!(find_restaurant(conn, 1).unwrap(), None);
        assert!(list_restaurants(conn).unwrap().is_empty());
    }

    #[test]
    fn test_create_restaurant_pizza() {
        let store = seeded_store();
        let conn = &mut store.get().unwrap();

        let created = create_restaurant_pizza(
            conn,
            &NewRestaurantPizza::new(Price::new(12).unwrap(), 1, 1),
        )
        .unwrap();

        assert_eq!(created.price, 12);
        assert_eq!(find_restaurant_pizza(conn, created.id).unwrap(), Some(created));
        assert_eq!(count_restaurant_pizzas(conn).unwrap(), 1);
    }

    #[test]
    fn test_create_restaurant_pizza_missing_references() {
        let store = seeded_store();
        let conn = &mut store.get().unwrap();

        let err = create_restaurant_pizza(
            conn,
            &NewRestaurantPizza::new(Price::new(5).unwrap(), 42, 7),
        )
        .unwrap_err();

        match err {
            StoreError::ReferentialIntegrity(messages) => assert_eq!(
                messages,
                vec!["Pizza not found".to_string(), "Restaurant not found".to_string()]
            ),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(count_restaurant_pizzas(conn).unwrap(), 0);
    }

    #[test]
    fn test_foreign_keys_enforced_by_store() {
        let store = seeded_store();
        let conn = &mut store.get().unwrap();

        let result = diesel::insert_into(restaurant_pizzas::table)
            .values(&NewRestaurantPizza::new(Price::new(5).unwrap(), 99, 1))
            .execute(conn);

        assert!(matches!(result, Err(DieselError::DatabaseError(..))));
        assert_eq!(count_restaurant_pizzas(conn).unwrap(), 0);
    }

    #[test]
    fn test_foreign_key_violation_is_referential_integrity() {
        let store = seeded_store();
        let conn = &mut store.get().unwrap();

        let err = insert_restaurant_pizza_row(
            conn,
            &NewRestaurantPizza::new(Price::new(5).unwrap(), 99, 1),
        )
        .unwrap_err();

        assert!(matches!(err, StoreError::ReferentialIntegrity(ref messages) if messages.len() == 1));
        assert_eq!(count_restaurant_pizzas(conn).unwrap(), 0);
    }

    #[test]
    fn test_create_restaurant_pizza_then_rolls_back() {
        let store = seeded_store();
        let conn = &mut store.get().unwrap();

        let result: Result<(), StoreError> = create_restaurant_pizza_then(
            conn,
            &NewRestaurantPizza::new(Price::new(5).unwrap(), 1, 1),
            |conn, created| {
                assert_eq!(find_restaurant_pizza(conn, created.id)?, Some(created));
                let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
                Err(StoreError::Serialization(err))
            },
        );

        assert!(matches!(result, Err(StoreError::Serialization(_))));
        assert_eq!(count_restaurant_pizzas(conn).unwrap(), 0);
    }

    #[test]
    fn test_delete_restaurant_cascades() {
        let store = seeded_store();
        let conn = &mut store.get().unwrap();
        let ids = (1..=3)
            .map(|p| {
                create_restaurant_pizza(
                    conn,
                    &NewRestaurantPizza::new(Price::new(p).unwrap(), 1, 1),
                )
                .unwrap()
                .id
            })
            .collect::<Vec<_>>();

        assert!(delete_restaurant(conn, 1).unwrap());

        assert_eq!(find_restaurant(conn, 1).unwrap(), None);
        assert_eq!(count_restaurant_pizzas(conn).unwrap(), 0);
        for id in ids {
            assert_eq!(find_restaurant_pizza(conn, id).unwrap(), None);
        }
        // pizzas are not owned by the restaurant
        assert_eq!(list_pizzas(conn).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_missing_restaurant() {
        let store = seeded_store();
        let conn = &mut store.get().unwrap();

        assert!(!delete_restaurant(conn, 404).unwrap());
        assert_eq!(list_restaurants(conn).unwrap().len(), 1);
    }

    #[test]
    fn test_derived_views() {
        let store = seeded_store();
        let conn = &mut store.get().unwrap();
        create_restaurant_pizza(conn, &NewRestaurantPizza::new(Price::new(9).unwrap(), 1, 1))
            .unwrap();

        let restaurant = find_restaurant(conn, 1).unwrap().unwrap();
        let pizza = find_pizza(conn, 1).unwrap().unwrap();

        assert_eq!(pizzas_of_restaurant(conn, &restaurant).unwrap(), vec![pizza.clone()]);
        assert_eq!(restaurants_of_pizza(conn, &pizza).unwrap(), vec![restaurant]);
    }

    #[test]
    fn test_delete_all() {
        let store = seeded_store();
        let conn = &mut store.get().unwrap();
        create_restaurant_pizza(conn, &NewRestaurantPizza::new(Price::new(9).unwrap(), 1, 1))
            .unwrap();

        delete_all(conn).unwrap();

        assert!(list_restaurants(conn).unwrap().is_empty());
        assert!(list_pizzas(conn).unwrap().is_empty());
        assert_eq!(count_restaurant_pizzas(conn).unwrap(), 0);
    }
}
