use chrono::{
  Days,
  Local,
  Months,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;

use crate::engine::EngineError;

const ISO_DATE_FORMAT: &str =
  "%Y-%m-%d";

/// Strict `YYYY-MM-DD` calendar date.
pub fn parse_iso_date(
  input: &str
) -> Result<NaiveDate, EngineError> {
  let token = input.trim();
  let iso_re =
    Regex::new(r"^\d{4}-\d{2}-\d{2}$")
      .map_err(|e| {
        EngineError::parse(
          token,
          format!(
            "internal regex compile \
             failure: {e}"
          )
        )
      })?;

  if !iso_re.is_match(token) {
    return Err(EngineError::parse(
      token,
      "expected YYYY-MM-DD"
    ));
  }

  NaiveDate::parse_from_str(
    token,
    ISO_DATE_FORMAT
  )
  .map_err(|e| {
    EngineError::parse(
      token,
      e.to_string()
    )
  })
}

/// Parses a date argument relative to `today`.
///
/// Accepts ISO dates, `today`, `yesterday`, `tomorrow` and signed offsets
/// such as `+10d`, `-2w` or `+3m`. A bare number of days (`+45`) is read
/// as days.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  today: NaiveDate
) -> Result<NaiveDate, EngineError> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return shift_days(today, 1);
    }
    | "yesterday" => {
      return shift_days(today, -1);
    }
    | _ => {}
  }

  let rel_re = Regex::new(
    r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dwm]?)$"
  )
  .map_err(|e| {
    EngineError::parse(
      token,
      format!(
        "internal regex compile \
         failure: {e}"
      )
    )
  })?;

  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let negative = caps
      .name("sign")
      .is_some_and(|m| m.as_str() == "-");
    let num: u32 = caps
      .name("num")
      .map(|m| m.as_str())
      .unwrap_or_default()
      .parse()
      .map_err(|_| {
        EngineError::parse(
          token,
          "offset is too large"
        )
      })?;
    let unit = caps
      .name("unit")
      .map(|m| m.as_str())
      .unwrap_or_default();

    tracing::trace!(
      negative,
      num,
      unit,
      "parsed relative date offset"
    );

    return match unit {
      | "w" => {
        let days = i64::from(num) * 7;
        shift_days(
          today,
          if negative { -days } else { days }
        )
      }
      | "m" => {
        let months = Months::new(num);
        let shifted = if negative {
          today.checked_sub_months(months)
        } else {
          today.checked_add_months(months)
        };
        shifted.ok_or_else(|| {
          EngineError::parse(
            token,
            "month offset leaves the \
             supported calendar"
          )
        })
      }
      | _ => {
        let days = i64::from(num);
        shift_days(
          today,
          if negative { -days } else { days }
        )
      }
    };
  }

  parse_iso_date(token)
}

/// Moves `date` by a signed number of days.
pub fn shift_days(
  date: NaiveDate,
  days: i64
) -> Result<NaiveDate, EngineError> {
  let magnitude =
    Days::new(days.unsigned_abs());
  let shifted = if days < 0 {
    date.checked_sub_days(magnitude)
  } else {
    date.checked_add_days(magnitude)
  };
  shifted.ok_or(
    EngineError::OutOfRange {
      date,
      days
    }
  )
}

/// The current calendar date in `tz`, or in the system zone when unset.
#[must_use]
pub fn today_in(
  tz: Option<&Tz>
) -> NaiveDate {
  match tz {
    | Some(tz) => {
      Utc::now()
        .with_timezone(tz)
        .date_naive()
    }
    | None => Local::now().date_naive()
  }
}

pub fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "resolved timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::warn!(
        source,
        timezone = %trimmed,
        error = %err,
        "invalid timezone; ignoring"
      );
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::{
    parse_date_expr,
    parse_iso_date,
    parse_timezone,
    shift_days
  };
  use crate::engine::EngineError;

  fn date(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn parses_iso_date() {
    assert_eq!(
      parse_iso_date("2024-02-29")
        .expect("leap day"),
      date(2024, 2, 29)
    );
  }

  #[test]
  fn rejects_loose_iso_forms() {
    for bad in [
      "2024-2-29",
      "2023-02-29",
      "20240229",
      "2024-01-01T00:00:00",
      ""
    ] {
      let err = parse_iso_date(bad)
        .expect_err("must reject");
      assert!(matches!(
        err,
        EngineError::Parse { .. }
      ));
    }
  }

  #[test]
  fn parses_named_days() {
    let today = date(2026, 2, 17);
    assert_eq!(
      parse_date_expr("TODAY", today)
        .expect("today"),
      today
    );
    assert_eq!(
      parse_date_expr(
        "tomorrow", today
      )
      .expect("tomorrow"),
      date(2026, 2, 18)
    );
    assert_eq!(
      parse_date_expr(
        "yesterday",
        today
      )
      .expect("yesterday"),
      date(2026, 2, 16)
    );
  }

  #[test]
  fn parses_relative_offsets() {
    let today = date(2026, 1, 31);
    assert_eq!(
      parse_date_expr("+10d", today)
        .expect("days"),
      date(2026, 2, 10)
    );
    assert_eq!(
      parse_date_expr("-2w", today)
        .expect("weeks"),
      date(2026, 1, 17)
    );
    assert_eq!(
      parse_date_expr("+1m", today)
        .expect("months"),
      date(2026, 2, 28)
    );
    assert_eq!(
      parse_date_expr("+45", today)
        .expect("bare days"),
      date(2026, 3, 17)
    );
  }

  #[test]
  fn falls_back_to_iso() {
    assert_eq!(
      parse_date_expr(
        "2024-05-10",
        date(2026, 1, 1)
      )
      .expect("iso"),
      date(2024, 5, 10)
    );
    assert!(
      parse_date_expr(
        "next tuesday",
        date(2026, 1, 1)
      )
      .is_err()
    );
  }

  #[test]
  fn shift_reports_overflow() {
    let err = shift_days(
      NaiveDate::MAX,
      1
    )
    .expect_err("overflow");
    assert!(matches!(
      err,
      EngineError::OutOfRange { .. }
    ));
  }

  #[test]
  fn parses_iana_timezone() {
    assert!(
      parse_timezone(
        "Europe/Paris",
        "test"
      )
      .is_some()
    );
    assert!(
      parse_timezone("Mars/Base", "test")
        .is_none()
    );
  }
}

pub mod iso_date_serde {
  use chrono::NaiveDate;
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    date: &NaiveDate,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &date
        .format(super::ISO_DATE_FORMAT)
        .to_string()
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<NaiveDate, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    super::parse_iso_date(&raw)
      .map_err(serde::de::Error::custom)
  }
}
