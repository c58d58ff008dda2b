//! Row validation and mapping into [`CustomerRecord`].
//!
//! The only field that is checked or converted is the subscription date, which
//! arrives as `DD-MM-YYYY` and must name a real calendar day. Everything else
//! is copied verbatim; empty strings are fine, absent columns are not.

use crate::error::ValidationError;
use crate::import::reader::RawRow;
use crate::models::{
    COL_CITY, COL_COMPANY, COL_COUNTRY, COL_CUSTOMER_ID, COL_EMAIL, COL_FIRST_NAME, COL_LAST_NAME,
    COL_PHONE1, COL_PHONE2, COL_SUBSCRIPTION_DATE, COL_WEBSITE, CustomerRecord,
};
use chrono::NaiveDate;

/// Input pattern for the subscription date column.
pub const SUBSCRIPTION_DATE_FORMAT: &str = "%d-%m-%Y";

fn required<'a>(row: &'a RawRow, column: &str) -> Result<&'a str, ValidationError> {
    row.get(column)
        .ok_or_else(|| ValidationError::missing_column(column))
}

// chrono skips leading whitespace and accepts signed or short years, so the
// shape is checked first: 1-2 digit day and month, exactly 4 digit year.
fn has_date_shape(raw: &str) -> bool {
    let digits = |part: &str, min: usize, max: usize| {
        (min..=max).contains(&part.len()) && part.bytes().all(|b| b.is_ascii_digit())
    };
    let mut parts = raw.split('-');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(day), Some(month), Some(year), None) => {
            digits(day, 1, 2) && digits(month, 1, 2) && digits(year, 4, 4)
        }
        _ => false,
    }
}

/// Parse a `DD-MM-YYYY` date, rejecting impossible days such as `31-13-2023`.
pub fn parse_subscription_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    let invalid = |detail: String| {
        ValidationError::new(
            COL_SUBSCRIPTION_DATE,
            format!("`{raw}` is not a valid DD-MM-YYYY date ({detail})"),
        )
    };

    if !has_date_shape(raw) {
        return Err(invalid("expected digits as DD-MM-YYYY".to_string()));
    }
    NaiveDate::parse_from_str(raw, SUBSCRIPTION_DATE_FORMAT).map_err(|err| invalid(err.to_string()))
}

/// Convert one raw row into a customer record.
///
/// Columns are checked in destination order, so a short row reports its first
/// missing column.
pub fn transform(row: &RawRow) -> Result<CustomerRecord, ValidationError> {
    let customer_id = required(row, COL_CUSTOMER_ID)?;
    let first_name = required(row, COL_FIRST_NAME)?;
    let last_name = required(row, COL_LAST_NAME)?;
    let company = required(row, COL_COMPANY)?;
    let city = required(row, COL_CITY)?;
    let country = required(row, COL_COUNTRY)?;
    let phone1 = required(row, COL_PHONE1)?;
    let phone2 = required(row, COL_PHONE2)?;
    let email = required(row, COL_EMAIL)?;
    let subscription_date = parse_subscription_date(required(row, COL_SUBSCRIPTION_DATE)?)?;
    let website = required(row, COL_WEBSITE)?;

    Ok(CustomerRecord {
        customer_id: customer_id.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        company: company.to_string(),
        city: city.to_string(),
        country: country.to_string(),
        phone1: phone1.to_string(),
        phone2: phone2.to_string(),
        email: email.to_string(),
        subscription_date,
        website: website.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::reader::RecordReader;
    use crate::models::CUSTOMER_COLUMNS;

    fn row_from(header: &str, line: &str) -> RawRow {
        let input = format!("{header}\n{line}\n");
        RecordReader::from_reader(input.as_bytes())
            .expect("header parses")
            .next()
            .expect("one row")
            .expect("row decodes")
    }

    fn full_row(date: &str) -> RawRow {
        row_from(
            &CUSTOMER_COLUMNS.join(","),
            &format!(
                "DD37Cf93aecA6Dc,Sheryl,Baxter,Rasmussen Group,East Leonard,Chile,229.077.5154,397.884.0519x718,zunigavanessa@smith.info,{date},http://www.stephenson.com/"
            ),
        )
    }

    #[test]
    fn date_is_reformatted_to_iso() {
        let record = transform(&full_row("25-12-2023")).expect("valid row");
        assert_eq!(
            record.subscription_date,
            NaiveDate::from_ymd_opt(2023, 12, 25).expect("valid date")
        );
        assert_eq!(record.subscription_date.to_string(), "2023-12-25");
    }

    #[test]
    fn fields_are_copied_verbatim() {
        let record = transform(&full_row("01-02-2021")).expect("valid row");
        assert_eq!(record.customer_id, "DD37Cf93aecA6Dc");
        assert_eq!(record.first_name, "Sheryl");
        assert_eq!(record.last_name, "Baxter");
        assert_eq!(record.company, "Rasmussen Group");
        assert_eq!(record.city, "East Leonard");
        assert_eq!(record.country, "Chile");
        assert_eq!(record.phone1, "229.077.5154");
        assert_eq!(record.phone2, "397.884.0519x718");
        assert_eq!(record.email, "zunigavanessa@smith.info");
        assert_eq!(record.website, "http://www.stephenson.com/");
    }

    #[test]
    fn invalid_month_is_rejected() {
        let err = transform(&full_row("31-13-2023")).expect_err("month 13");
        assert_eq!(err.field, "Subscription Date");
        assert!(err.reason.contains("31-13-2023"));
    }

    #[test]
    fn impossible_day_and_wrong_pattern_are_rejected() {
        assert!(transform(&full_row("30-02-2023")).is_err());
        assert!(transform(&full_row("2023-12-25")).is_err());
        assert!(transform(&full_row("")).is_err());
        assert!(transform(&full_row("25-12-2023 10:00")).is_err());
    }

    #[test]
    fn loosely_shaped_dates_are_rejected() {
        for raw in [
            " 25-12-2023",
            "25-12-2023 ",
            "25-12-+2023",
            "25-12-023",
            "25-12-20231",
            "+5-12-2023",
            "25--12-2023",
            "25-12-2023-",
            "٢٥-12-2023",
        ] {
            let err = parse_subscription_date(raw).expect_err(raw);
            assert_eq!(err.field, "Subscription Date");
        }
    }

    #[test]
    fn single_digit_day_and_month_are_accepted() {
        let date = parse_subscription_date("5-6-2020").expect("short day and month");
        assert_eq!(date, NaiveDate::from_ymd_opt(2020, 6, 5).expect("valid date"));
    }

    #[test]
    fn missing_email_column_is_reported() {
        let header: Vec<&str> = CUSTOMER_COLUMNS
            .iter()
            .copied()
            .filter(|column| *column != "Email")
            .collect();
        let row = row_from(
            &header.join(","),
            "id1,Ada,Lovelace,Engines,London,UK,1,2,25-12-2023,http://ada.dev",
        );

        let err = transform(&row).expect_err("email missing");
        assert_eq!(err, ValidationError::missing_column("Email"));
    }

    #[test]
    fn short_row_reports_first_absent_column() {
        let row = row_from(&CUSTOMER_COLUMNS.join(","), "id1,Ada,Lovelace");
        let err = transform(&row).expect_err("short row");
        assert_eq!(err.field, "City");
    }

    #[test]
    fn empty_values_are_allowed() {
        let row = row_from(&CUSTOMER_COLUMNS.join(","), "id1,,,,,,,,,05-06-2020,");
        let record = transform(&row).expect("empty strings are fine");
        assert_eq!(record.email, "");
        assert_eq!(record.website, "");
    }

    #[test]
    fn transform_is_deterministic() {
        let good = full_row("25-12-2023");
        assert_eq!(transform(&good), transform(&good));

        let bad = full_row("31-13-2023");
        assert_eq!(transform(&bad), transform(&bad));
    }
}
