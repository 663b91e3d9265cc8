// Reporting period domain model
use chrono::Month;
use serde::{Deserialize, Serialize};
use std::fmt;

const SPANISH_MONTHS: [&str; 12] = [
    "Enero",
    "Febrero",
    "Marzo",
    "Abril",
    "Mayo",
    "Junio",
    "Julio",
    "Agosto",
    "Septiembre",
    "Octubre",
    "Noviembre",
    "Diciembre",
];

/// One of the two six-month reporting windows of a calendar year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum HalfYear {
    First,
    Second,
}

impl HalfYear {
    pub fn number(self) -> u8 {
        match self {
            HalfYear::First => 1,
            HalfYear::Second => 2,
        }
    }

    /// The half-year a calendar month (1-12) falls into
    pub fn of_month(month: u32) -> Option<Self> {
        match month {
            1..=6 => Some(HalfYear::First),
            7..=12 => Some(HalfYear::Second),
            _ => None,
        }
    }

    /// Calendar months covered, in calendar order
    pub fn months(self) -> [Month; 6] {
        match self {
            HalfYear::First => [
                Month::January,
                Month::February,
                Month::March,
                Month::April,
                Month::May,
                Month::June,
            ],
            HalfYear::Second => [
                Month::July,
                Month::August,
                Month::September,
                Month::October,
                Month::November,
                Month::December,
            ],
        }
    }

    pub fn contains(self, month: u32) -> bool {
        Self::of_month(month) == Some(self)
    }
}

impl TryFrom<u8> for HalfYear {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(HalfYear::First),
            2 => Ok(HalfYear::Second),
            other => Err(format!("half-year must be 1 or 2, got {}", other)),
        }
    }
}

impl From<HalfYear> for u8 {
    fn from(half: HalfYear) -> Self {
        half.number()
    }
}

/// Cache index: a (year, half-year) reporting window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PeriodKey {
    pub year: i32,
    pub half: HalfYear,
}

impl PeriodKey {
    pub fn new(year: i32, half: HalfYear) -> Self {
        Self { year, half }
    }

    /// Period containing the given date
    pub fn containing<D: chrono::Datelike>(date: &D) -> Self {
        let half = if date.month() <= 6 {
            HalfYear::First
        } else {
            HalfYear::Second
        };
        Self::new(date.year(), half)
    }

    pub fn months(&self) -> [Month; 6] {
        self.half.months()
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-H{}", self.year, self.half.number())
    }
}

/// Language used for month labels on the chart axis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonthLocale {
    #[default]
    En,
    Es,
}

impl MonthLocale {
    pub fn label(self, month: Month) -> &'static str {
        match self {
            MonthLocale::En => month.name(),
            MonthLocale::Es => SPANISH_MONTHS[month.number_from_month() as usize - 1],
        }
    }
}
