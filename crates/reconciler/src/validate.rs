//! Config-time validation of names and throughput values.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

// Hardcoded patterns; covered by the tests below.
#[allow(clippy::expect_used)]
static ACCOUNT_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").expect("hardcoded regex pattern is valid")
});

#[allow(clippy::expect_used)]
static RESOURCE_GROUP_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-\w._()]*[-\w_()]$").expect("hardcoded regex pattern is valid")
});

const MIN_THROUGHPUT: i64 = 400;
const MIN_AUTOSCALE_THROUGHPUT: i64 = 4000;

/// Database (entity) names: 1 to 255 characters, none of `/ \ # ?`, no
/// trailing space.
pub fn entity_name(field: &str, value: &str) -> Result<()> {
    let len = value.chars().count();
    if !(1..=255).contains(&len) {
        return Err(Error::invalid_config(
            field,
            "must be between 1 and 255 characters",
        ));
    }
    if value.ends_with(' ') {
        return Err(Error::invalid_config(field, "must not end with a space"));
    }
    if value.contains(['/', '\\', '#', '?']) {
        return Err(Error::invalid_config(
            field,
            "must not contain any of the characters '/', '\\', '#' or '?'",
        ));
    }
    Ok(())
}

/// Account names: 3 to 44 lowercase letters, digits or hyphens, not starting
/// or ending with a hyphen.
pub fn account_name(field: &str, value: &str) -> Result<()> {
    if !(3..=44).contains(&value.len()) {
        return Err(Error::invalid_config(
            field,
            "must be between 3 and 44 characters",
        ));
    }
    if !ACCOUNT_NAME_REGEX.is_match(value) {
        return Err(Error::invalid_config(
            field,
            "may only contain lowercase letters, numbers and hyphens, and must not start or end with a hyphen",
        ));
    }
    Ok(())
}

/// Resource group names: 1 to 90 characters of letters, digits, `_ - . ( )`,
/// not ending with a period.
pub fn resource_group_name(field: &str, value: &str) -> Result<()> {
    if value.is_empty() || value.chars().count() > 90 {
        return Err(Error::invalid_config(
            field,
            "must be between 1 and 90 characters",
        ));
    }
    if !RESOURCE_GROUP_REGEX.is_match(value) {
        return Err(Error::invalid_config(
            field,
            "may only contain alphanumeric characters, dashes, underscores, parentheses and periods, and must not end with a period",
        ));
    }
    Ok(())
}

/// Manual throughput: at least 400 and a multiple of 100.
pub fn throughput(field: &str, value: i64) -> Result<()> {
    if value < MIN_THROUGHPUT {
        return Err(Error::invalid_config(
            field,
            format!("must be a minimum of {MIN_THROUGHPUT}"),
        ));
    }
    if value % 100 != 0 {
        return Err(Error::invalid_config(field, "must be set in increments of 100"));
    }
    Ok(())
}

/// Autoscale ceiling: at least 4000 and a multiple of 1000.
pub fn max_throughput(field: &str, value: i64) -> Result<()> {
    if value < MIN_AUTOSCALE_THROUGHPUT {
        return Err(Error::invalid_config(
            field,
            format!("must be a minimum of {MIN_AUTOSCALE_THROUGHPUT}"),
        ));
    }
    if value % 1000 != 0 {
        return Err(Error::invalid_config(field, "must be set in increments of 1000"));
    }
    Ok(())
}
