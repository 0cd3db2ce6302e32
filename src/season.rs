use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Month (1-based) from which a date belongs to the season starting that year.
const SEASON_START_MONTH: u32 = 7;

/// A league season spanning two calendar years, e.g. 2024-2025.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Season {
    pub start_year: i32,
    pub end_year: i32,
}

impl Season {
    pub fn new(start_year: i32) -> Self {
        Self {
            start_year,
            end_year: start_year + 1,
        }
    }

    pub fn containing(date: NaiveDate) -> Self {
        if date.month() >= SEASON_START_MONTH {
            Self::new(date.year())
        } else {
            Self::new(date.year() - 1)
        }
    }

    pub fn previous(self) -> Self {
        Self {
            start_year: self.start_year - 1,
            end_year: self.end_year - 1,
        }
    }

    pub fn ordinal(self) -> i64 {
        i64::from(self.start_year)
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_year, self.end_year)
    }
}

impl FromStr for Season {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let (start, end) = trimmed
            .split_once(['-', '/', '–'])
            .ok_or_else(|| anyhow!("season '{trimmed}' is not of the form YYYY-YYYY"))?;
        let start_year = start
            .trim()
            .parse::<i32>()
            .map_err(|_| anyhow!("season '{trimmed}' has a non-numeric start year"))?;
        let end = end.trim();
        let end_year = match end.len() {
            2 => {
                let short = end
                    .parse::<i32>()
                    .map_err(|_| anyhow!("season '{trimmed}' has a non-numeric end year"))?;
                let candidate = start_year - start_year.rem_euclid(100) + short;
                if candidate < start_year {
                    candidate + 100
                } else {
                    candidate
                }
            }
            4 => end
                .parse::<i32>()
                .map_err(|_| anyhow!("season '{trimmed}' has a non-numeric end year"))?,
            _ => return Err(anyhow!("season '{trimmed}' has a malformed end year")),
        };
        if end_year != start_year + 1 {
            return Err(anyhow!(
                "season '{trimmed}' must span consecutive years"
            ));
        }
        Ok(Self {
            start_year,
            end_year,
        })
    }
}

impl TryFrom<String> for Season {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Season> for String {
    fn from(value: Season) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_labels() {
        assert_eq!("2024-2025".parse::<Season>().unwrap(), Season::new(2024));
        assert_eq!("2024-25".parse::<Season>().unwrap(), Season::new(2024));
        assert_eq!("1999/00".parse::<Season>().unwrap(), Season::new(1999));
        assert!("2024-2026".parse::<Season>().is_err());
        assert!("2024".parse::<Season>().is_err());
    }

    #[test]
    fn ordering_follows_start_year_not_text() {
        let mut seasons = vec![Season::new(2010), Season::new(2009), Season::new(2023)];
        seasons.sort();
        assert_eq!(
            seasons,
            vec![Season::new(2009), Season::new(2010), Season::new(2023)]
        );
        assert_eq!(Season::new(2010).previous(), Season::new(2009));
    }

    #[test]
    fn season_of_date_switches_in_july() {
        let may = NaiveDate::from_ymd_opt(2024, 5, 19).unwrap();
        let aug = NaiveDate::from_ymd_opt(2024, 8, 17).unwrap();
        assert_eq!(Season::containing(may), Season::new(2023));
        assert_eq!(Season::containing(aug), Season::new(2024));
    }

    #[test]
    fn serializes_as_label() {
        let json = serde_json::to_string(&Season::new(2022)).unwrap();
        assert_eq!(json, "\"2022-2023\"");
        let back: Season = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Season::new(2022));
    }
}
