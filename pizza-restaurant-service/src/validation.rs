use serde_json::Value;

pub const MIN_PRICE: i64 = 1;
pub const MAX_PRICE: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Price must be between 1 and 30.")]
    PriceOutOfRange,
}

/// A restaurant pizza price that is known to lie within `[1, 30]`.
///
/// There is no other way to build one, so anything that stores a price has
/// already been through [`Price::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Price(i32);

impl Price {
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if (MIN_PRICE..=MAX_PRICE).contains(&value) {
            Ok(Price(value as i32))
        } else {
            Err(ValidationError::PriceOutOfRange)
        }
    }

    /// Integral floats such as `15.0` are accepted; strings, booleans and
    /// fractional numbers are not.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let Value::Number(number) = value else {
            return Err(ValidationError::PriceOutOfRange);
        };
        if let Some(i) = number.as_i64() {
            return Price::new(i);
        }
        match number.as_f64() {
            Some(f) if f.fract() == 0.0 && f >= MIN_PRICE as f64 && f <= MAX_PRICE as f64 => {
                Price::new(f as i64)
            }
            _ => Err(ValidationError::PriceOutOfRange),
        }
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_price_accepts_whole_range() {
        for p in 1..=30 {
            assert_eq!(Price::new(p).unwrap().get(), p as i32);
        }
    }

    #[test]
    fn test_price_rejects_out_of_range() {
        for p in [i64::MIN, -1, 0, 31, 99, i64::MAX] {
            assert_eq!(Price::new(p), Err(ValidationError::PriceOutOfRange));
        }
    }

    #[test]
    fn test_price_error_message() {
        assert_eq!(
            ValidationError::PriceOutOfRange.to_string(),
            "Price must be between 1 and 30."
        );
    }

    #[test]
    fn test_price_from_json() {
        assert_eq!(Price::from_json(&json!(15)).unwrap().get(), 15);
        assert_eq!(Price::from_json(&json!(30.0)).unwrap().get(), 30);
        assert!(Price::from_json(&json!(15.5)).is_err());
        assert!(Price::from_json(&json!(0)).is_err());
        assert!(Price::from_json(&json!(-3.0)).is_err());
        assert!(Price::from_json(&json!("15")).is_err());
        assert!(Price::from_json(&json!(true)).is_err());
        assert!(Price::from_json(&json!(null)).is_err());
        assert!(Price::from_json(&json!(1e300)).is_err());
    }
}
