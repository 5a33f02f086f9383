//! Column widths of the durable schema, checked before any store access.

use crate::{InventoryError, Result};

pub const PRODUCT_NAME_MAX: usize = 100;
pub const PRODUCT_DESCRIPTION_MAX: usize = 255;
pub const PRODUCT_IMAGE_URL_MAX: usize = 500;

pub const SHIPPING_NAME_MAX: usize = 100;
pub const SHIPPING_PHONE_MAX: usize = 20;
pub const SHIPPING_ADDRESS_MAX: usize = 255;
pub const SHIPPING_ZIP_CODE_MAX: usize = 10;

/// Fails with `InvalidArgument` if `value` is longer than `max` characters.
pub fn check_length(field: &str, value: &str, max: usize) -> Result<()> {
    let len = value.chars().count();
    if len > max {
        return Err(InventoryError::InvalidArgument(format!(
            "{field} must be at most {max} characters, got {len}"
        )));
    }
    Ok(())
}
