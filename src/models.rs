use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ===== Source Columns =====

pub const COL_CUSTOMER_ID: &str = "Customer Id";
pub const COL_FIRST_NAME: &str = "First Name";
pub const COL_LAST_NAME: &str = "Last Name";
pub const COL_COMPANY: &str = "Company";
pub const COL_CITY: &str = "City";
pub const COL_COUNTRY: &str = "Country";
pub const COL_PHONE1: &str = "Phone 1";
pub const COL_PHONE2: &str = "Phone 2";
pub const COL_EMAIL: &str = "Email";
pub const COL_SUBSCRIPTION_DATE: &str = "Subscription Date";
pub const COL_WEBSITE: &str = "Website";

/// Source header columns, in the order they appear in a customer export.
pub const CUSTOMER_COLUMNS: [&str; 11] = [
    COL_CUSTOMER_ID,
    COL_FIRST_NAME,
    COL_LAST_NAME,
    COL_COMPANY,
    COL_CITY,
    COL_COUNTRY,
    COL_PHONE1,
    COL_PHONE2,
    COL_EMAIL,
    COL_SUBSCRIPTION_DATE,
    COL_WEBSITE,
];

// ===== Destination Rows =====

/// One validated customer, shaped like a row of the destination table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CustomerRecord {
    pub customer_id: String,
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub city: String,
    pub country: String,
    pub phone1: String,
    pub phone2: String,
    pub email: String,
    /// Serialized and stored as `YYYY-MM-DD`.
    pub subscription_date: NaiveDate,
    pub website: String,
}
