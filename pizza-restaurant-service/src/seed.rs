use diesel::prelude::*;

use crate::models::{NewPizza, NewRestaurant, NewRestaurantPizza};
use crate::store::{self, StoreError};
use crate::validation::Price;

const RESTAURANTS: &[(&str, &str)] = &[
    ("Karen's Pizza Shack", "address1"),
    ("Sanjay's Pizza", "address2"),
    ("Kiki's Pizza", "address3"),
];

const PIZZAS: &[(&str, &str)] = &[
    ("Emma", "Dough, Tomato Sauce, Cheese"),
    ("Geri", "Dough, Tomato Sauce, Cheese, Pepperoni"),
    ("Melanie", "Dough, Sauce, Ricotta, Red peppers, Mustard"),
];

// (price, pizza index, restaurant index)
const RESTAURANT_PIZZAS: &[(i64, usize, usize)] = &[(1, 0, 0), (4, 1, 1), (5, 2, 2)];

#[derive(Debug, Default, PartialEq)]
pub struct SeedSummary {
    pub restaurants: usize,
    pub pizzas: usize,
    pub restaurant_pizzas: usize,
}

/// Replaces everything in the store with a small sample data set.
pub fn seed(conn: &mut SqliteConnection) -> Result<SeedSummary, StoreError> {
    conn.immediate_transaction::<_, StoreError, _>(|conn| {
        store::delete_all(conn)?;

        let restaurants = RESTAURANTS
            .iter()
            .map(|&(name, address)| store::create_restaurant(conn, &NewRestaurant { name, address }))
            .collect::<QueryResult<Vec<_>>>()?;
        let pizzas = PIZZAS
            .iter()
            .map(|&(name, ingredients)| store::create_pizza(conn, &NewPizza { name, ingredients }))
            .collect::<QueryResult<Vec<_>>>()?;

        for &(price, pizza, restaurant) in RESTAURANT_PIZZAS {
            let new = NewRestaurantPizza::new(
                Price::new(price)?,
                pizzas[pizza].id,
                restaurants[restaurant].id,
            );
            store::insert_restaurant_pizza(conn, &new)?;
        }

        Ok(SeedSummary {
            restaurants: restaurants.len(),
            pizzas: pizzas.len(),
            restaurant_pizzas: RESTAURANT_PIZZAS.len(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn test_seed_replaces_existing_rows() {
        let store = Store::in_memory().unwrap();
        let conn = &mut store.get().unwrap();

        let first = seed(conn).unwrap();
        let second = seed(conn).unwrap();

        assert_eq!(first, second);
        assert_eq!(store::list_restaurants(conn).unwrap().len(), 3);
        assert_eq!(store::list_pizzas(conn).unwrap().len(), 3);
        assert_eq!(store::count_restaurant_pizzas(conn).unwrap(), 3);
    }
}
