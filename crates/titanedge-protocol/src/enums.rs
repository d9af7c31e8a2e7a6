//! Closed enumerations carried in configuration payloads.
//!
//! Each enumeration has a hand-maintained token table. Wire tokens are not a
//! mechanical case transform of the variant name (`ColorimetryConversion::Default`
//! is sent as `"bt709"`), so every table is a full `match`.

use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// A closed enumeration with a fixed wire vocabulary.
pub trait WireToken: Copy + PartialEq + Sized + 'static {
    /// Enumeration name used in error messages.
    const NAME: &'static str;

    /// Every variant. Canonical variants come before any alias sharing their token.
    const ALL: &'static [Self];

    /// The token sent on the wire for this variant.
    fn token(self) -> &'static str;

    /// Resolve a wire token to its canonical variant.
    fn from_token(token: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|value| value.token() == token)
    }

    /// Fold aliases onto the variant that owns their token.
    fn canonical(self) -> Self {
        Self::from_token(self.token()).unwrap_or(self)
    }

    /// Like [`WireToken::from_token`], failing with `UndefinedEnumValue`.
    fn parse_token(token: &str) -> Result<Self, ValidationError> {
        Self::from_token(token).ok_or_else(|| ValidationError::UndefinedEnumValue {
            enumeration: Self::NAME,
            value: token.to_string(),
        })
    }
}

macro_rules! wire_text {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.token())
                }
            }

            impl FromStr for $ty {
                type Err = ValidationError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    <$ty as WireToken>::parse_token(s)
                }
            }
        )+
    };
}

/// Operating mode a configuration field applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConfigMode {
    #[default]
    Encoder,
    Decoder,
}

impl WireToken for ConfigMode {
    const NAME: &'static str = "ConfigMode";
    const ALL: &'static [Self] = &[Self::Encoder, Self::Decoder];

    fn token(self) -> &'static str {
        match self {
            Self::Encoder => "encoder",
            Self::Decoder => "decoder",
        }
    }
}

/// Decoder or gateway input type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InputType {
    #[default]
    Ip,
    Asi,
    Sat,
    Terrestrial,
    Zixi,
    Srt,
    Rist,
    Internal,
    Hls,
    Rtmp,
}

impl WireToken for InputType {
    const NAME: &'static str = "InputType";
    const ALL: &'static [Self] = &[
        Self::Ip,
        Self::Asi,
        Self::Sat,
        Self::Terrestrial,
        Self::Zixi,
        Self::Srt,
        Self::Rist,
        Self::Internal,
        Self::Hls,
        Self::Rtmp,
    ];

    fn token(self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::Asi => "asi",
            Self::Sat => "sat",
            Self::Terrestrial => "terrestrial",
            Self::Zixi => "zixi",
            Self::Srt => "srt",
            Self::Rist => "rist",
            Self::Internal => "internal",
            Self::Hls => "hls",
            Self::Rtmp => "rtmp",
        }
    }
}

/// Source-specific multicast filter mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SourceSpecificMulticastMode {
    #[default]
    Include,
    Exclude,
}

impl WireToken for SourceSpecificMulticastMode {
    const NAME: &'static str = "SourceSpecificMulticastMode";
    const ALL: &'static [Self] = &[Self::Include, Self::Exclude];

    fn token(self) -> &'static str {
        match self {
            Self::Include => "include",
            Self::Exclude => "exclude",
        }
    }
}

/// SMPTE 2022-7 network skew class.
///
/// Low is below 10 ms, moderate below 50 ms, high below 450 ms. Custom uses
/// the separately configured custom skew.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SmpteSkew {
    #[default]
    Low,
    Moderate,
    High,
    Custom,
}

impl WireToken for SmpteSkew {
    const NAME: &'static str = "SmpteSkew";
    const ALL: &'static [Self] = &[Self::Low, Self::Moderate, Self::High, Self::Custom];

    fn token(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::Custom => "custom",
        }
    }
}

/// Acceleration hardware or API used for an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccelerationType {
    Disabled,
    #[default]
    Rivermax,
}

impl WireToken for AccelerationType {
    const NAME: &'static str = "AccelerationType";
    const ALL: &'static [Self] = &[Self::Disabled, Self::Rivermax];

    fn token(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Rivermax => "rivermax",
        }
    }
}

/// SDI format of an output connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SdiType {
    Disabled,
    #[default]
    AutoSdi,
    SdSdi,
    HdSdi,
    Sdi720p,
    Sdi1080p,
    UhdSdi,
}

impl WireToken for SdiType {
    const NAME: &'static str = "SdiType";
    const ALL: &'static [Self] = &[
        Self::Disabled,
        Self::AutoSdi,
        Self::SdSdi,
        Self::HdSdi,
        Self::Sdi720p,
        Self::Sdi1080p,
        Self::UhdSdi,
    ];

    fn token(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::AutoSdi => "auto_sdi",
            Self::SdSdi => "sd_sdi",
            Self::HdSdi => "hd_sdi",
            Self::Sdi720p => "720p_sdi",
            Self::Sdi1080p => "1080p_sdi",
            Self::UhdSdi => "uhd_sdi",
        }
    }
}

/// Colorimetry conversion applied on an output connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorimetryConversion {
    /// Alias of [`ColorimetryConversion::Bt709`].
    #[default]
    Default,
    Bt601_525i,
    Bt601_625i,
    Bt709,
    SdrWcg,
    Pq10,
    Hdr10,
    Hlg,
}

impl WireToken for ColorimetryConversion {
    const NAME: &'static str = "ColorimetryConversion";
    const ALL: &'static [Self] = &[
        Self::Bt601_525i,
        Self::Bt601_625i,
        Self::Bt709,
        Self::SdrWcg,
        Self::Pq10,
        Self::Hdr10,
        Self::Hlg,
        Self::Default,
    ];

    fn token(self) -> &'static str {
        match self {
            Self::Bt601_525i => "bt601_525i",
            Self::Bt601_625i => "bt601_625i",
            Self::Bt709 | Self::Default => "bt709",
            Self::SdrWcg => "sdrWcg",
            Self::Pq10 => "pq10",
            Self::Hdr10 => "hdr10",
            Self::Hlg => "hlg",
        }
    }
}

/// Lookup table used by the colorimetry conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IutName {
    /// Alias of [`IutName::EotfScaling`].
    #[default]
    Default,
    EotfScaling,
    Hable,
    Normative,
    /// Applied without checking whether the LUT is required.
    Nbcu1,
}

impl WireToken for IutName {
    const NAME: &'static str = "IutName";
    const ALL: &'static [Self] = &[
        Self::EotfScaling,
        Self::Hable,
        Self::Normative,
        Self::Nbcu1,
        Self::Default,
    ];

    fn token(self) -> &'static str {
        match self {
            Self::EotfScaling | Self::Default => "eotfScaling",
            Self::Hable => "hable",
            Self::Normative => "normative",
            Self::Nbcu1 => "nbcu1",
        }
    }
}

wire_text!(
    ConfigMode,
    InputType,
    SourceSpecificMulticastMode,
    SmpteSkew,
    AccelerationType,
    SdiType,
    ColorimetryConversion,
    IutName,
);

/// Distinct tokens of an enumeration, in table order.
pub fn tokens<T: WireToken>() -> Vec<&'static str> {
    let mut out: Vec<&'static str> = Vec::with_capacity(T::ALL.len());
    for value in T::ALL {
        let token = value.token();
        if !out.contains(&token) {
            out.push(token);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn assert_table<T: WireToken + fmt::Debug>(aliases: &[T]) {
        let mut seen = HashSet::new();
        for value in T::ALL {
            let token = value.token();
            assert!(!token.is_empty(), "{:?} has an empty token", value);
            if !seen.insert(token) {
                assert!(aliases.contains(value), "{:?} reuses token {token}", value);
            }
            assert_eq!(T::from_token(token), Some(value.canonical()));
        }
        assert_eq!(tokens::<T>().len(), T::ALL.len() - aliases.len());
    }

    #[test]
    fn every_table_is_exhaustive_and_unique() {
        assert_table::<ConfigMode>(&[]);
        assert_table::<InputType>(&[]);
        assert_table::<SourceSpecificMulticastMode>(&[]);
        assert_table::<SmpteSkew>(&[]);
        assert_table::<AccelerationType>(&[]);
        assert_table::<SdiType>(&[]);
        assert_table::<ColorimetryConversion>(&[ColorimetryConversion::Default]);
        assert_table::<IutName>(&[IutName::Default]);
    }

    #[test]
    fn all_lists_every_variant() {
        assert_eq!(InputType::ALL.len(), 10);
        assert_eq!(SdiType::ALL.len(), 7);
        assert_eq!(ColorimetryConversion::ALL.len(), 8);
        assert_eq!(IutName::ALL.len(), 5);
    }

    #[test]
    fn defaults_map_to_documented_tokens() {
        assert_eq!(ColorimetryConversion::Default.token(), "bt709");
        assert_eq!(IutName::Default.token(), "eotfScaling");
        assert_eq!(SdiType::default().token(), "auto_sdi");
        assert_eq!(SmpteSkew::default().token(), "low");
    }

    #[test]
    fn aliases_fold_to_canonical_variant() {
        assert_eq!(
            ColorimetryConversion::Default.canonical(),
            ColorimetryConversion::Bt709
        );
        assert_eq!(IutName::Default.canonical(), IutName::EotfScaling);
        assert_eq!(SdiType::HdSdi.canonical(), SdiType::HdSdi);
    }

    #[test]
    fn non_mechanical_tokens() {
        assert_eq!(SdiType::Sdi720p.token(), "720p_sdi");
        assert_eq!(ColorimetryConversion::SdrWcg.token(), "sdrWcg");
        assert_eq!(ColorimetryConversion::Bt601_625i.token(), "bt601_625i");
    }

    #[test]
    fn from_str_rejects_unknown_token() {
        assert_eq!("srt".parse::<InputType>().unwrap(), InputType::Srt);
        let err = "999".parse::<InputType>().unwrap_err();
        assert_eq!(
            err,
            ValidationError::UndefinedEnumValue {
                enumeration: "InputType",
                value: "999".to_string(),
            }
        );
        assert!("Ip".parse::<InputType>().is_err());
    }

    #[test]
    fn display_renders_token() {
        assert_eq!(IutName::Nbcu1.to_string(), "nbcu1");
        assert_eq!(ConfigMode::Decoder.to_string(), "decoder");
    }
}
