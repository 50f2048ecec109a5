use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::models::NewRestaurantPizza;
use crate::validation::Price;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRestaurantPizzaRequest {
    /// Price between 1 and 30
    #[schema(value_type = i32, minimum = 1, maximum = 30)]
    pub price: Option<Value>,
    /// Identifier of an existing pizza
    #[schema(value_type = i32)]
    pub pizza_id: Option<Value>,
    /// Identifier of an existing restaurant
    #[schema(value_type = i32)]
    pub restaurant_id: Option<Value>,
}

impl CreateRestaurantPizzaRequest {
    /// Checks every field and reports all problems at once.
    pub fn validate(self) -> Result<NewRestaurantPizza, Vec<String>> {
        let mut errors = Vec::new();

        let price = match self.price.as_ref() {
            None => {
                errors.push("price is required".to_string());
                None
            }
            Some(value) => Price::from_json(value)
                .map_err(|err| errors.push(err.to_string()))
                .ok(),
        };
        let pizza_id = id_field("pizza_id", self.pizza_id.as_ref(), &mut errors);
        let restaurant_id = id_field("restaurant_id", self.restaurant_id.as_ref(), &mut errors);

        match (price, pizza_id, restaurant_id) {
            (Some(price), Some(pizza_id), Some(restaurant_id)) => {
                Ok(NewRestaurantPizza::new(price, pizza_id, restaurant_id))
            }
            _ => Err(errors),
        }
    }
}

fn id_field(name: &str, value: Option<&Value>, errors: &mut Vec<String>) -> Option<i32> {
    let Some(value) = value else {
        errors.push(format!("{name} is required"));
        return None;
    };
    let id = value.as_i64().and_then(|id| i32::try_from(id).ok());
    if id.is_none() {
        errors.push(format!("{name} must be an integer"));
    }
    id
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorResponse {
    /// Error message
    pub error: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorsResponse {
    /// Every problem found with the request
    pub errors: Vec<String>,
}
