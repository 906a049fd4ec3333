use anyhow::{Result, anyhow};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Generic CSS families that terminate a font stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericFamily {
    SansSerif,
    Serif,
    Monospace,
    Cursive,
}

/// One entry of a CSS font stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackEntry {
    Named(&'static str),
    Generic(GenericFamily),
}

/// The fonts offered by the editor. Stored and transported by [`FontFamily::id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FontFamily {
    #[default]
    SystemDefault,
    Arial,
    Impact,
    Georgia,
    TimesNewRoman,
    CourierNew,
    Verdana,
    TrebuchetMs,
    ComicSansMs,
}

impl FontFamily {
    pub const ALL: [FontFamily; 9] = [
        FontFamily::SystemDefault,
        FontFamily::Arial,
        FontFamily::Impact,
        FontFamily::Georgia,
        FontFamily::TimesNewRoman,
        FontFamily::CourierNew,
        FontFamily::Verdana,
        FontFamily::TrebuchetMs,
        FontFamily::ComicSansMs,
    ];

    pub fn id(self) -> &'static str {
        match self {
            FontFamily::SystemDefault => "system-default",
            FontFamily::Arial => "arial",
            FontFamily::Impact => "impact",
            FontFamily::Georgia => "georgia",
            FontFamily::TimesNewRoman => "times-new-roman",
            FontFamily::CourierNew => "courier-new",
            FontFamily::Verdana => "verdana",
            FontFamily::TrebuchetMs => "trebuchet-ms",
            FontFamily::ComicSansMs => "comic-sans-ms",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FontFamily::SystemDefault => "System Default",
            FontFamily::Arial => "Arial",
            FontFamily::Impact => "Impact",
            FontFamily::Georgia => "Georgia",
            FontFamily::TimesNewRoman => "Times New Roman",
            FontFamily::CourierNew => "Courier New",
            FontFamily::Verdana => "Verdana",
            FontFamily::TrebuchetMs => "Trebuchet MS",
            FontFamily::ComicSansMs => "Comic Sans MS",
        }
    }

    /// CSS `font-family` value used by the on-screen preview.
    pub fn css_stack(self) -> &'static str {
        match self {
            FontFamily::SystemDefault => "system-ui, -apple-system, sans-serif",
            FontFamily::Arial => "Arial, Helvetica, sans-serif",
            FontFamily::Impact => "Impact, Haettenschweiler, sans-serif",
            FontFamily::Georgia => "Georgia, serif",
            FontFamily::TimesNewRoman => "'Times New Roman', Times, serif",
            FontFamily::CourierNew => "'Courier New', Courier, monospace",
            FontFamily::Verdana => "Verdana, Geneva, sans-serif",
            FontFamily::TrebuchetMs => "'Trebuchet MS', Helvetica, sans-serif",
            FontFamily::ComicSansMs => "'Comic Sans MS', cursive",
        }
    }

    /// The same stack as [`FontFamily::css_stack`], resolved for font lookup.
    /// `system-ui` and `-apple-system` have no installable face and are skipped.
    pub fn stack(self) -> &'static [StackEntry] {
        use GenericFamily::*;
        use StackEntry::*;
        match self {
            FontFamily::SystemDefault => &[Generic(SansSerif)],
            FontFamily::Arial => &[Named("Arial"), Named("Helvetica"), Generic(SansSerif)],
            FontFamily::Impact => &[Named("Impact"), Named("Haettenschweiler"), Generic(SansSerif)],
            FontFamily::Georgia => &[Named("Georgia"), Generic(Serif)],
            FontFamily::TimesNewRoman => {
                &[Named("Times New Roman"), Named("Times"), Generic(Serif)]
            }
            FontFamily::CourierNew => &[Named("Courier New"), Named("Courier"), Generic(Monospace)],
            FontFamily::Verdana => &[Named("Verdana"), Named("Geneva"), Generic(SansSerif)],
            FontFamily::TrebuchetMs => {
                &[Named("Trebuchet MS"), Named("Helvetica"), Generic(SansSerif)]
            }
            FontFamily::ComicSansMs => &[Named("Comic Sans MS"), Generic(Cursive)],
        }
    }
}

impl fmt::Display for FontFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FontFamily {
    type Err = anyhow::Error;

    /// Accepts the id, the display label or the CSS stack (case-insensitive).
    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        FontFamily::ALL
            .into_iter()
            .find(|font| {
                font.id().eq_ignore_ascii_case(value)
                    || font.label().eq_ignore_ascii_case(value)
                    || font.css_stack().eq_ignore_ascii_case(value)
            })
            .ok_or_else(|| anyhow!("unknown font family '{}'", value))
    }
}

impl Serialize for FontFamily {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.id())
    }
}

impl<'de> Deserialize<'de> for FontFamily {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    Normal,
    #[default]
    Bold,
}

impl FontWeight {
    pub fn css_value(self) -> &'static str {
        match self {
            FontWeight::Normal => "normal",
            FontWeight::Bold => "bold",
        }
    }

    pub fn numeric(self) -> u16 {
        match self {
            FontWeight::Normal => 400,
            FontWeight::Bold => 700,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_labels_and_stacks_round_trip() {
        for font in FontFamily::ALL {
            assert_eq!(font.id().parse::<FontFamily>().expect("id"), font);
            assert_eq!(font.label().parse::<FontFamily>().expect("label"), font);
            assert_eq!(font.css_stack().parse::<FontFamily>().expect("stack"), font);
            assert!(!font.stack().is_empty());
        }
    }

    #[test]
    fn unknown_fonts_are_rejected() {
        assert!("Wingdings".parse::<FontFamily>().is_err());
        let err = serde_json::from_str::<FontFamily>("\"papyrus\"").expect_err("unknown");
        assert!(err.to_string().contains("unknown font family"));
    }

    #[test]
    fn every_stack_ends_with_a_generic_family() {
        for font in FontFamily::ALL {
            assert!(matches!(font.stack().last(), Some(StackEntry::Generic(_))));
        }
    }
}
