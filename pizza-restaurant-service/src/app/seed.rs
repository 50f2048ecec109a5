use tracing::info;

use pizza_restaurant_service::seed::seed;

use super::DatabaseArgs;

pub fn main(database: &DatabaseArgs) -> anyhow::Result<()> {
    let store = database.connect()?;
    let conn = &mut store.get()?;

    let summary = seed(conn)?;
    info!(
        restaurants = summary.restaurants,
        pizzas = summary.pizzas,
        restaurant_pizzas = summary.restaurant_pizzas,
        "seeded database"
    );

    Ok(())
}
