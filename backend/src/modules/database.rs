use crate::configuration::DatabaseSettings;
use anyhow::Context;
use sqlx::migrate;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use time::OffsetDateTime;

pub async fn get_sqlite_pool(config: DatabaseSettings) -> anyhow::Result<SqlitePool> {
    let options = config
        .connect_options()
        .context("Invalid database configuration")?;
    let pool = SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .context("Cannot establish sqlite connection")?;
    if config.is_migrating() {
        migrate!("./migrations")
            .run(&pool)
            .await
            .context("Auto migration failed")?;
    }
    Ok(pool)
}

/// Stored form of a timestamp: unix nanoseconds. Only 1677-09-21 to 2262-04-11 fits.
pub fn to_db_timestamp(value: OffsetDateTime) -> anyhow::Result<i64> {
    i64::try_from(value.unix_timestamp_nanos())
        .with_context(|| format!("Timestamp {value} does not fit in storage"))
}

pub fn is_storable(value: OffsetDateTime) -> bool {
    to_db_timestamp(value).is_ok()
}

pub fn from_db_timestamp(value: i64) -> anyhow::Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(value as i128)
        .with_context(|| format!("Stored timestamp {value} is out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn timestamps_survive_storage() {
        let value = datetime!(2018-01-01 10:10:10.123456789 UTC);
        let stored = to_db_timestamp(value).unwrap();
        assert_eq!(from_db_timestamp(stored).unwrap(), value);
    }

    #[test]
    fn out_of_range_timestamps_are_refused() {
        assert!(is_storable(datetime!(2262-04-11 00:00:00 UTC)));
        assert!(!is_storable(datetime!(2300-01-01 00:00:00 UTC)));
        assert!(!is_storable(datetime!(1600-01-01 00:00:00 UTC)));
        assert!(to_db_timestamp(datetime!(9999-12-31 23:59:59 UTC)).is_err());
    }

    #[test]
    fn stored_order_follows_time_order() {
        let earlier = datetime!(2017-12-25 10:10:10 UTC);
        let later = datetime!(2018-01-08 10:10:10 UTC);
        assert!(to_db_timestamp(earlier).unwrap() < to_db_timestamp(later).unwrap());
    }
}
