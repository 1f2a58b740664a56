use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One day of close data in a backfilled series.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyQuote {
    pub date: NaiveDate,
    pub close: Decimal,
}

impl DailyQuote {
    pub fn new(date: NaiveDate, close: Decimal) -> Self {
        Self { date, close }
    }
}
