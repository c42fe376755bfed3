//! Input validation helpers
//!
//! Mutations are validated before any remote call so a rejected input never
//! consumes a retry budget or touches local state.

use shared::{GeoPoint, PriceTier, ReviewCreate};
use shared::models::{RestaurantCreate, RestaurantPatch};

use crate::error::{ClientError, ClientResult};

// ── Text length limits ──────────────────────────────────────────────

/// Restaurant, type, city and user names
pub const MAX_NAME_LEN: usize = 200;

/// Notes and review comments
pub const MAX_NOTE_LEN: usize = 1000;

/// Street addresses
pub const MAX_ADDRESS_LEN: usize = 500;

/// Password bounds
pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_PASSWORD_LEN: usize = 128;

/// Ratings are on a 0-10 scale
pub const MIN_RATING: f32 = 0.0;
pub const MAX_RATING: f32 = 10.0;

// ── Validation helpers ──────────────────────────────────────────────

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> ClientResult<()> {
    if value.trim().is_empty() {
        return Err(ClientError::validation(format!("{field} must not be empty")));
    }
    if value.chars().count() > max_len {
        return Err(ClientError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            value.chars().count()
        )));
    }
    Ok(())
}

/// Validate that an optional string, if present, is within the length limit.
pub fn validate_optional_text(value: Option<&str>, field: &str, max_len: usize) -> ClientResult<()> {
    if let Some(v) = value
        && v.chars().count() > max_len
    {
        return Err(ClientError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            v.chars().count()
        )));
    }
    Ok(())
}

pub fn validate_rating(rating: Option<f32>) -> ClientResult<()> {
    if let Some(r) = rating
        && !(MIN_RATING..=MAX_RATING).contains(&r)
    {
        return Err(ClientError::validation(format!(
            "rating must be between {MIN_RATING} and {MAX_RATING}"
        )));
    }
    Ok(())
}

pub fn validate_price(price: Option<u8>) -> ClientResult<()> {
    if let Some(p) = price
        && PriceTier::new(p).is_none()
    {
        return Err(ClientError::validation(format!(
            "price must be between {} and {}",
            PriceTier::MIN,
            PriceTier::MAX
        )));
    }
    Ok(())
}

fn validate_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> ClientResult<()> {
    match (latitude, longitude) {
        (None, None) => Ok(()),
        (Some(lat), Some(lon)) if GeoPoint::new(lat, lon).is_valid() => Ok(()),
        (Some(_), Some(_)) => Err(ClientError::validation("coordinates out of range")),
        _ => Err(ClientError::validation(
            "latitude and longitude must be set together",
        )),
    }
}

pub fn validate_password(password: &str) -> ClientResult<()> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(ClientError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(ClientError::validation(format!(
            "password must be at most {MAX_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_restaurant_create(input: &RestaurantCreate) -> ClientResult<()> {
    validate_required_text(&input.name, "name", MAX_NAME_LEN)?;
    validate_optional_text(input.notes.as_deref(), "notes", MAX_NOTE_LEN)?;
    validate_optional_text(input.address.as_deref(), "address", MAX_ADDRESS_LEN)?;
    validate_price(input.price)?;
    validate_rating(input.rating)?;
    validate_coordinates(input.latitude, input.longitude)
}

pub fn validate_restaurant_patch(patch: &RestaurantPatch) -> ClientResult<()> {
    if patch.is_empty() {
        return Err(ClientError::validation("nothing to update"));
    }
    if let Some(name) = &patch.name {
        validate_required_text(name, "name", MAX_NAME_LEN)?;
    }
    validate_optional_text(patch.notes.as_deref(), "notes", MAX_NOTE_LEN)?;
    validate_optional_text(patch.address.as_deref(), "address", MAX_ADDRESS_LEN)?;
    validate_price(patch.price)?;
    validate_rating(patch.rating)?;
    if let (Some(lat), Some(lon)) = (patch.latitude, patch.longitude) {
        validate_coordinates(Some(lat), Some(lon))?;
    }
    Ok(())
}

pub fn validate_review(input: &ReviewCreate) -> ClientResult<()> {
    validate_rating(Some(input.rating))?;
    validate_optional_text(input.comment.as_deref(), "comment", MAX_NOTE_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_text() {
        assert!(validate_required_text("Noma", "name", MAX_NAME_LEN).is_ok());
        assert!(validate_required_text("   ", "name", MAX_NAME_LEN).is_err());
        assert!(validate_required_text(&"x".repeat(201), "name", MAX_NAME_LEN).is_err());
    }

    #[test]
    fn test_restaurant_create_rules() {
        let mut input = RestaurantCreate::new("Noma");
        assert!(validate_restaurant_create(&input).is_ok());

        input.price = Some(5);
        assert!(matches!(
            validate_restaurant_create(&input),
            Err(ClientError::Validation(_))
        ));

        input.price = Some(4);
        input.rating = Some(10.5);
        assert!(validate_restaurant_create(&input).is_err());

        input.rating = Some(7.5);
        input.latitude = Some(55.68);
        assert!(validate_restaurant_create(&input).is_err());
        input.longitude = Some(12.61);
        assert!(validate_restaurant_create(&input).is_ok());
    }

    #[test]
    fn test_empty_patch_rejected() {
        assert!(validate_restaurant_patch(&RestaurantPatch::default()).is_err());
        let patch = RestaurantPatch {
            rating: Some(6.0),
            ..Default::default()
        };
        assert!(validate_restaurant_patch(&patch).is_ok());
    }

    #[test]
    fn test_password_length() {
        assert!(validate_password("abc").is_err());
        assert!(validate_password("correct horse").is_ok());
    }
}
