use binrw::binrw;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Pixel format enumerant of a texture.
///
/// The value is opaque to the package: it is carried from the source texture to the
/// consumer unchanged. The named constants cover the formats texture mods commonly use.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PixelFormat(pub i32);

impl PixelFormat {
    pub const UNKNOWN: Self = Self(0);
    pub const A32B32G32R32F: Self = Self(1);
    pub const A8R8G8B8: Self = Self(2);
    pub const G8: Self = Self(3);
    pub const G16: Self = Self(4);
    pub const DXT1: Self = Self(5);
    pub const DXT3: Self = Self(6);
    pub const DXT5: Self = Self(7);
    pub const FLOAT_RGB: Self = Self(9);
    pub const FLOAT_RGBA: Self = Self(10);
    pub const G16R16: Self = Self(15);
    pub const A2B10G10R10: Self = Self(19);
    pub const A16B16G16R16: Self = Self(20);
    pub const BC5: Self = Self(24);
    pub const V8U8: Self = Self(25);
    pub const A1: Self = Self(26);

    const NAMES: &'static [(PixelFormat, &'static str)] = &[
        (Self::UNKNOWN, "PF_Unknown"),
        (Self::A32B32G32R32F, "PF_A32B32G32R32F"),
        (Self::A8R8G8B8, "PF_A8R8G8B8"),
        (Self::G8, "PF_G8"),
        (Self::G16, "PF_G16"),
        (Self::DXT1, "PF_DXT1"),
        (Self::DXT3, "PF_DXT3"),
        (Self::DXT5, "PF_DXT5"),
        (Self::FLOAT_RGB, "PF_FloatRGB"),
        (Self::FLOAT_RGBA, "PF_FloatRGBA"),
        (Self::G16R16, "PF_G16R16"),
        (Self::A2B10G10R10, "PF_A2B10G10R10"),
        (Self::A16B16G16R16, "PF_A16B16G16R16"),
        (Self::BC5, "PF_BC5"),
        (Self::V8U8, "PF_V8U8"),
        (Self::A1, "PF_A1"),
    ];

    /// The `PF_*` name of a known format.
    pub fn name(&self) -> Option<&'static str> {
        Self::NAMES
            .iter()
            .find(|(format, _)| format == self)
            .map(|(_, name)| *name)
    }

    /// Look up a format by its `PF_*` name (case insensitive, prefix optional).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .find(|(_, known)| {
                known.eq_ignore_ascii_case(name) || known[3..].eq_ignore_ascii_case(name)
            })
            .map(|(format, _)| *format)
    }
}

impl Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "PF_{}", self.0),
        }
    }
}

impl From<i32> for PixelFormat {
    fn from(value: i32) -> Self {
        Self(value)
    }
}
