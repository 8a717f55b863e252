//! Locale routing
//!
//! Pages live under `/<locale>/...`. The bare root redirects to the default
//! locale and unknown locales are not found.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    Zh,
    Ja,
    Ko,
    Ru,
    Fr,
}

impl Locale {
    pub const ALL: [Locale; 6] = [
        Locale::En,
        Locale::Zh,
        Locale::Ja,
        Locale::Ko,
        Locale::Ru,
        Locale::Fr,
    ];

    pub const DEFAULT: Locale = Locale::Zh;

    pub fn code(self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Zh => "zh",
            Locale::Ja => "ja",
            Locale::Ko => "ko",
            Locale::Ru => "ru",
            Locale::Fr => "fr",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Locale::ALL
            .into_iter()
            .find(|l| l.code() == s)
            .ok_or_else(|| s.to_string())
    }
}
