//! Musical key, scale, and Camelot wheel types
//!
//! The Camelot wheel is a 24-position DJ-friendly encoding of musical key and
//! mode. Major keys are numbered by ascending fifths and carry the suffix "B";
//! each relative minor shares its major's number with the suffix "A"
//! (C major = 8B, A minor = 8A). Adjacent positions are harmonically
//! compatible, which is what makes the code useful for mix sequencing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the 12 pitch classes. Sharp spellings are canonical; flat and
/// enharmonic spellings are accepted on parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    #[serde(rename = "C#")]
    CSharp,
    D,
    #[serde(rename = "D#")]
    DSharp,
    E,
    F,
    #[serde(rename = "F#")]
    FSharp,
    G,
    #[serde(rename = "G#")]
    GSharp,
    A,
    #[serde(rename = "A#")]
    ASharp,
    B,
}

impl PitchClass {
    /// Parse a pitch class from a tag value such as "C", "c#", "Db", or "Bb".
    ///
    /// Returns `None` for anything that is not a recognizable pitch spelling.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "C" | "B#" => Some(Self::C),
            "C#" | "DB" => Some(Self::CSharp),
            "D" => Some(Self::D),
            "D#" | "EB" => Some(Self::DSharp),
            "E" | "FB" => Some(Self::E),
            "F" | "E#" => Some(Self::F),
            "F#" | "GB" => Some(Self::FSharp),
            "G" => Some(Self::G),
            "G#" | "AB" => Some(Self::GSharp),
            "A" => Some(Self::A),
            "A#" | "BB" => Some(Self::ASharp),
            "B" | "CB" => Some(Self::B),
            _ => None,
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::C => "C",
            Self::CSharp => "C#",
            Self::D => "D",
            Self::DSharp => "D#",
            Self::E => "E",
            Self::F => "F",
            Self::FSharp => "F#",
            Self::G => "G",
            Self::GSharp => "G#",
            Self::A => "A",
            Self::ASharp => "A#",
            Self::B => "B",
        };
        write!(f, "{}", name)
    }
}

/// Major or minor mode, as reported by key-detection analyzers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    Major,
    Minor,
}

impl Scale {
    /// Parse a scale from a tag value such as "major" or "Min".
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "major" | "maj" => Some(Self::Major),
            "minor" | "min" => Some(Self::Minor),
            _ => None,
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
        }
    }
}

/// Wheel half: "A" for minor keys, "B" for major keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelSide {
    A,
    B,
}

/// A position on the Camelot wheel, e.g. `8B` for C major.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CamelotCode {
    number: u8,
    side: WheelSide,
}

impl CamelotCode {
    /// Wheel position number (1-12).
    pub fn number(&self) -> u8 {
        self.number
    }

    /// Wheel half (A = minor, B = major).
    pub fn side(&self) -> WheelSide {
        self.side
    }

    /// Look up the wheel position for a key and scale.
    ///
    /// This is the fixed 24-entry mapping: majors numbered by ascending
    /// fifths with suffix B, relative minors sharing the number with suffix A.
    pub fn from_key(pitch: PitchClass, scale: Scale) -> Self {
        use PitchClass::*;
        let number = match scale {
            Scale::Major => match pitch {
                B => 1,
                FSharp => 2,
                CSharp => 3,
                GSharp => 4,
                DSharp => 5,
                ASharp => 6,
                F => 7,
                C => 8,
                G => 9,
                D => 10,
                A => 11,
                E => 12,
            },
            Scale::Minor => match pitch {
                GSharp => 1,
                DSharp => 2,
                ASharp => 3,
                F => 4,
                C => 5,
                G => 6,
                D => 7,
                A => 8,
                E => 9,
                B => 10,
                FSharp => 11,
                CSharp => 12,
            },
        };
        let side = match scale {
            Scale::Major => WheelSide::B,
            Scale::Minor => WheelSide::A,
        };
        Self { number, side }
    }

    /// Whether two wheel positions are harmonic-mixing neighbours:
    /// the same number on either side, or an adjacent number on the same side
    /// (wrapping 12 back to 1).
    pub fn is_compatible(&self, other: &CamelotCode) -> bool {
        if self.number == other.number {
            return true;
        }
        if self.side != other.side {
            return false;
        }
        let diff = (i16::from(self.number) - i16::from(other.number)).rem_euclid(12);
        diff == 1 || diff == 11
    }
}

impl fmt::Display for CamelotCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = match self.side {
            WheelSide::A => "A",
            WheelSide::B => "B",
        };
        write!(f, "{}{}", self.number, side)
    }
}

impl FromStr for CamelotCode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let side = match s.chars().last() {
            Some('A') | Some('a') => WheelSide::A,
            Some('B') | Some('b') => WheelSide::B,
            _ => {
                return Err(crate::Error::InvalidInput(format!(
                    "invalid Camelot code: {}",
                    s
                )))
            }
        };
        let digits = &s[..s.len() - 1];
        let number: u8 = digits
            .parse()
            .map_err(|_| crate::Error::InvalidInput(format!("invalid Camelot code: {}", s)))?;
        if !(1..=12).contains(&number) {
            return Err(crate::Error::InvalidInput(format!(
                "Camelot number out of range: {}",
                s
            )));
        }
        Ok(Self { number, side })
    }
}

impl Serialize for CamelotCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CamelotCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
